//! Pasadas sobre el árbol.
//!
//! Una pasada es un [`Pass`]: un método `visit_*` por cada clase de
//! constructo, todos con una implementación por omisión que no hace
//! nada. [`Ast::accept()`] despacha un nodo exactamente al método de su
//! clase; como el despacho es un `match` exhaustivo, agregar una clase
//! de constructo sin extender este trait es un error de compilación.
//!
//! El orden de visita lo decide cada pasada. [`walk()`] ofrece el
//! recorrido más simple: primero el nodo y luego sus hijos, en el orden
//! que define [`Construct::children()`].

use std::convert::Infallible;

use crate::ast::{Ast, Construct, ErrorMarker, NodeId};

macro_rules! visitors {
    ($($method:ident),* $(,)?) => {
        $(
            fn $method(&mut self, ast: &Ast, id: NodeId) -> Result<(), Self::Error> {
                let _ = (ast, id);
                Ok(())
            }
        )*
    };
}

pub trait Pass {
    type Error;

    visitors!(
        visit_module,
        visit_function,
        visit_extern,
        visit_prototype,
        visit_argument_list,
        visit_block,
        visit_struct,
        visit_global,
        visit_attribute,
        visit_variable_decl,
        visit_return,
        visit_expr_statement,
        visit_literal,
        visit_reference,
        visit_call,
        visit_binary,
        visit_resolvable,
        visit_error_marker,
    );
}

impl Ast {
    /// Despacha `id` al método de `pass` que corresponde a su clase.
    pub fn accept<P: Pass + ?Sized>(&self, id: NodeId, pass: &mut P) -> Result<(), P::Error> {
        match self.get(id) {
            Construct::Module(_) => pass.visit_module(self, id),
            Construct::Function(_) => pass.visit_function(self, id),
            Construct::Extern(_) => pass.visit_extern(self, id),
            Construct::Prototype(_) => pass.visit_prototype(self, id),
            Construct::ArgumentList(_) => pass.visit_argument_list(self, id),
            Construct::Block(_) => pass.visit_block(self, id),
            Construct::Struct(_) => pass.visit_struct(self, id),
            Construct::Global(_) => pass.visit_global(self, id),
            Construct::Attribute(_) => pass.visit_attribute(self, id),
            Construct::VariableDecl(_) => pass.visit_variable_decl(self, id),
            Construct::Return(_) => pass.visit_return(self, id),
            Construct::ExprStatement(_) => pass.visit_expr_statement(self, id),
            Construct::Literal(_) => pass.visit_literal(self, id),
            Construct::Reference(_) => pass.visit_reference(self, id),
            Construct::Call(_) => pass.visit_call(self, id),
            Construct::Binary(_) => pass.visit_binary(self, id),
            Construct::Resolvable(_) => pass.visit_resolvable(self, id),
            Construct::ErrorMarker(_) => pass.visit_error_marker(self, id),
        }
    }
}

/// Visita `root` y luego, recursivamente, a cada uno de sus hijos.
pub fn walk<P: Pass + ?Sized>(ast: &Ast, root: NodeId, pass: &mut P) -> Result<(), P::Error> {
    ast.accept(root, pass)?;
    for child in ast.children(root) {
        walk(ast, child, pass)?;
    }

    Ok(())
}

/// Encuentra los marcadores de error alcanzables desde una raíz.
#[derive(Debug, Default)]
pub struct ErrorScan {
    found: Vec<(NodeId, ErrorMarker)>,
}

impl ErrorScan {
    /// Marcadores alcanzables desde `root`, en orden de recorrido.
    pub fn run(ast: &Ast, root: NodeId) -> Vec<(NodeId, ErrorMarker)> {
        let mut scan = ErrorScan::default();
        match walk(ast, root, &mut scan) {
            Ok(()) => scan.found,
            Err(never) => match never {},
        }
    }
}

impl Pass for ErrorScan {
    type Error = Infallible;

    fn visit_error_marker(&mut self, ast: &Ast, id: NodeId) -> Result<(), Infallible> {
        if let Construct::ErrorMarker(marker) = ast.get(id) {
            self.found.push((id, *marker));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{Block, ExprStatement, Literal, Return},
        lex::{self, TokenKind},
        notice::{Diagnostic, NoticeStack},
    };

    /// Cuenta visitas por clase, para verificar el despacho.
    #[derive(Default)]
    struct Census {
        blocks: usize,
        literals: usize,
        returns: usize,
        order: Vec<NodeId>,
    }

    impl Pass for Census {
        type Error = ();

        fn visit_block(&mut self, _: &Ast, id: NodeId) -> Result<(), ()> {
            self.blocks += 1;
            self.order.push(id);
            Ok(())
        }

        fn visit_literal(&mut self, _: &Ast, id: NodeId) -> Result<(), ()> {
            self.literals += 1;
            self.order.push(id);
            Ok(())
        }

        fn visit_return(&mut self, _: &Ast, id: NodeId) -> Result<(), ()> {
            self.returns += 1;
            self.order.push(id);
            Err(())
        }
    }

    fn literal_statement(ast: &mut Ast) -> (NodeId, NodeId) {
        let expression = ast.alloc(Construct::Literal(Literal::Bool(true)), None);
        let statement = ast.alloc(Construct::ExprStatement(ExprStatement { expression }), None);

        (statement, expression)
    }

    #[test]
    fn walk_visits_parents_before_children() {
        let mut ast = Ast::new();
        let (first, first_literal) = literal_statement(&mut ast);
        let (second, second_literal) = literal_statement(&mut ast);

        let block = ast.alloc(Construct::Block(Block::default()), None);
        ast.append_statement(block, first).unwrap();
        ast.append_statement(block, second).unwrap();

        let mut census = Census::default();
        walk(&ast, block, &mut census).unwrap();

        assert_eq!(census.blocks, 1);
        assert_eq!(census.literals, 2);
        assert_eq!(census.order, vec![block, first_literal, second_literal]);
    }

    #[test]
    fn visitor_errors_stop_the_walk() {
        let mut ast = Ast::new();
        let ret = ast.alloc(Construct::Return(Return { value: None }), None);
        let (after, _) = literal_statement(&mut ast);

        let block = ast.alloc(Construct::Block(Block::default()), None);
        ast.append_statement(block, ret).unwrap();
        ast.append_statement(block, after).unwrap();

        let mut census = Census::default();
        assert_eq!(walk(&ast, block, &mut census), Err(()));
        assert_eq!(census.returns, 1);
        assert_eq!(census.literals, 0);
    }

    #[test]
    fn error_scan_finds_materialized_markers() {
        let location = lex::tokenize("x", "<test>").unwrap()[0].location().clone();
        let mut notices = NoticeStack::new();
        let notice = notices
            .report(Diagnostic::ExpectedExpression {
                found: TokenKind::Semicolon,
            })
            .at(location.clone())
            .commit();

        let mut ast = Ast::new();
        let marker = ErrorMarker { notice };
        let broken = ast.alloc_error(marker, Some(location));
        let statement = ast.alloc(Construct::ExprStatement(ExprStatement { expression: broken }), None);

        let block = ast.alloc(Construct::Block(Block::default()), None);
        ast.append_statement(block, statement).unwrap();

        assert_eq!(ErrorScan::run(&ast, block), vec![(broken, marker)]);

        let (clean, _) = literal_statement(&mut ast);
        assert!(ErrorScan::run(&ast, clean).is_empty());
    }
}
