//! Bloques, sentencias y expresiones.

use super::{builtin_type, Parse, Parser};
use crate::{
    ast::{
        Binary, BinaryOp, Block, Call, Construct, DeclaredType, ExprStatement, IntegerKind,
        Literal, NodeId, Reference, Return, VariableDecl,
    },
    lex::{Keyword, Token, TokenKind},
    notice::Diagnostic,
    source::Location,
};

impl<'a> Parser<'a> {
    /// `{ sentencia* }`
    ///
    /// Cada sentencia se agrega al bloque una vez que se construyó por
    /// completo; una declaración repetida en el mismo bloque aborta.
    pub(super) fn block(&mut self) -> Parse<NodeId> {
        self.nested(Self::unbounded_block)
    }

    fn unbounded_block(&mut self) -> Parse<NodeId> {
        let (location, block) = self
            .mapped(|p| {
                p.skip_over(TokenKind::OpenCurly)?;
                let block = p.ast.alloc(Construct::Block(Block::default()), None);

                while !p.is(TokenKind::CloseCurly) {
                    let statement = p.statement()?;
                    if p.ast.append_statement(block, statement).is_err() {
                        let name = p.ast.variable_decl(statement).name.clone();
                        let location = p
                            .ast
                            .location(statement)
                            .cloned()
                            .unwrap_or_else(|| p.here());

                        return p.fail_at(Diagnostic::DuplicateVariable { name }, location);
                    }
                }

                p.skip_over(TokenKind::CloseCurly)?;
                Ok(block)
            })?
            .split();

        self.ast.set_location(block, location);
        Ok(block)
    }

    fn statement(&mut self) -> Parse<NodeId> {
        match self.current_kind() {
            TokenKind::OpenCurly => self.block(),
            TokenKind::Keyword(Keyword::Return) => self.ret(),
            TokenKind::Keyword(Keyword::Let) => self.variable_decl(),
            TokenKind::Keyword(keyword) if builtin_type(keyword).is_some() => self.variable_decl(),

            // `Punto p = ...`
            TokenKind::Id if self.is_next(TokenKind::Id) => self.variable_decl(),

            _ => self.node(|p| {
                let expression = p.expression()?;
                p.skip_over(TokenKind::Semicolon)?;

                Ok(Construct::ExprStatement(ExprStatement { expression }))
            }),
        }
    }

    /// `(let | tipo) nombre = expresión ;`
    fn variable_decl(&mut self) -> Parse<NodeId> {
        self.node(|p| {
            let ty = if p.is(TokenKind::Keyword(Keyword::Let)) {
                p.advance();
                DeclaredType::Inferred
            } else {
                DeclaredType::Explicit(p.type_ref()?)
            };

            let name = p.id()?.into_inner();
            p.skip_over(TokenKind::Assign)?;
            let value = p.expression()?;
            p.skip_over(TokenKind::Semicolon)?;

            Ok(Construct::VariableDecl(VariableDecl { name, ty, value }))
        })
    }

    fn ret(&mut self) -> Parse<NodeId> {
        self.node(|p| {
            p.keyword(Keyword::Return)?;

            let value = if p.is(TokenKind::Semicolon) {
                None
            } else {
                Some(p.expression()?)
            };

            p.skip_over(TokenKind::Semicolon)?;
            Ok(Construct::Return(Return { value }))
        })
    }

    pub(super) fn expression(&mut self) -> Parse<NodeId> {
        self.nested(|p| p.binary(0))
    }

    /// Precedence climbing.
    fn binary(&mut self, min_precedence: u8) -> Parse<NodeId> {
        let start = self.tokens.current().location().clone();
        let mut lhs = self.primary()?;

        while let Some(operator) = binary_operator(self.current_kind()) {
            if operator.precedence() < min_precedence {
                break;
            }

            let next = if operator.is_right_associative() {
                operator.precedence()
            } else {
                operator.precedence() + 1
            };

            self.advance();
            let rhs = self.binary(next)?;

            let location = Location::span(start.clone(), &self.last_consumed());
            lhs = self
                .ast
                .alloc(Construct::Binary(Binary { operator, lhs, rhs }), Some(location));
        }

        Ok(lhs)
    }

    fn primary(&mut self) -> Parse<NodeId> {
        match self.current_kind() {
            TokenKind::IntLiteral
            | TokenKind::CharLiteral
            | TokenKind::Minus
            | TokenKind::Keyword(Keyword::True | Keyword::False) => self.literal(),

            TokenKind::Id if self.is_next(TokenKind::OpenParen) => self.call(),
            TokenKind::Id => self.node(|p| {
                let name = p.id()?.into_inner();
                Ok(Construct::Reference(Reference { name }))
            }),

            TokenKind::OpenParen => {
                self.advance();
                let inner = self.expression()?;
                self.skip_over(TokenKind::CloseParen)?;

                Ok(inner)
            }

            found => self.fail(Diagnostic::ExpectedExpression { found }),
        }
    }

    /// `nombre ( (expresión (, expresión)*)? )`
    fn call(&mut self) -> Parse<NodeId> {
        self.node(|p| {
            let callee = p.id()?.into_inner();
            p.skip_over(TokenKind::OpenParen)?;
            let arguments = p.comma_separated(TokenKind::CloseParen, Self::expression)?;

            Ok(Construct::Call(Call { callee, arguments }))
        })
    }

    /// Un entero (posiblemente negado), `true`, `false` o un carácter.
    pub(super) fn literal(&mut self) -> Parse<NodeId> {
        self.node(|p| {
            let negative = p.is(TokenKind::Minus);
            if negative {
                p.advance();
                p.expect(TokenKind::IntLiteral)?;
            }

            let literal = match p.tokens.current().as_ref() {
                &Token::IntLiteral(value) => {
                    let value = if negative { -value } else { value };
                    Literal::Integer {
                        value,
                        kind: IntegerKind::fitting(value),
                    }
                }

                Token::Keyword(Keyword::True) => Literal::Bool(true),
                Token::Keyword(Keyword::False) => Literal::Bool(false),
                &Token::CharLiteral(value) => Literal::Char(value),

                other => {
                    let found = other.kind();
                    return p.fail(Diagnostic::ExpectedLiteral { found });
                }
            };

            p.advance();
            Ok(Construct::Literal(literal))
        })
    }
}

fn binary_operator(kind: TokenKind) -> Option<BinaryOp> {
    let operator = match kind {
        TokenKind::Plus => BinaryOp::Add,
        TokenKind::Minus => BinaryOp::Sub,
        TokenKind::Times => BinaryOp::Mul,
        TokenKind::Slash => BinaryOp::Div,
        TokenKind::Percent => BinaryOp::Mod,
        TokenKind::Caret => BinaryOp::Pow,
        TokenKind::Less => BinaryOp::Less,
        TokenKind::Greater => BinaryOp::Greater,
        _ => return None,
    };

    Some(operator)
}
