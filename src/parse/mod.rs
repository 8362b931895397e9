//! Análisis sintáctico.
//!
//! # Estrategia
//! El parser es de descenso recursivo con un token de lookahead. Cada
//! producción crea sus nodos en el [`Ast`] de abajo hacia arriba: un
//! constructo se asigna cuando todos sus hijos ya existen, de modo que
//! la arena adjunta los hijos en ese mismo momento.
//!
//! # Errores
//! Una producción que falla registra primero un aviso en la
//! [`NoticeStack`] y luego retorna un [`ErrorMarker`] que apunta a ese
//! aviso. Ambas cosas ocurren siempre juntas en [`Parser::fail()`]. Los
//! nodos que una producción fallida alcanzó a crear quedan en la arena
//! pero son inalcanzables desde el módulo.
//!
//! La recuperación ocurre únicamente a nivel de módulo: la declaración
//! fallida se descarta y se saltan tokens hasta el inicio de la próxima
//! declaración de nivel superior, la llave que cierra el módulo o el fin
//! de la entrada. Esto permite reportar varios errores por ejecución.

use crate::{
    ast::{
        ArgumentList, Ast, Attribute, Construct, ErrorMarker, Extern, Function, Global,
        IntegerKind, Module, NodeId, Prototype, Resolvable, Struct, SymbolTable, Type,
    },
    lex::{Identifier, Keyword, Token, TokenKind},
    notice::{Diagnostic, NoticeStack},
    source::{Located, Location},
};

mod body;
mod stream;

pub use stream::TokenStream;

/// Máximo anidamiento de expresiones y bloques.
pub const MAX_NESTING: usize = 128;

/// Resultado de una producción.
pub type Parse<T> = Result<T, ErrorMarker>;

/// Construye el árbol de un módulo a partir de sus tokens.
///
/// Los tokens deben terminar en [`Token::Eof`], como los que produce
/// [`crate::lex::tokenize()`]. Todo lo que se diagnostica queda en
/// `notices`, incluso cuando el resultado es `Ok`: un módulo puede
/// construirse habiendo descartado declaraciones inválidas.
pub fn parse_module(
    tokens: &[Located<Token>],
    ast: &mut Ast,
    notices: &mut NoticeStack,
) -> Parse<NodeId> {
    let mut parser = Parser::new(tokens, ast, notices);

    let module = parser.module()?;
    parser.expect(TokenKind::Eof)?;

    Ok(module)
}

pub struct Parser<'a> {
    tokens: TokenStream<'a>,
    ast: &'a mut Ast,
    notices: &'a mut NoticeStack,

    /// Inicios de las producciones en curso, de la más externa a la
    /// más interna.
    mappings: Vec<Location>,

    /// Profundidad de llaves consumidas.
    depth: usize,

    /// Expresiones y bloques en curso.
    nesting: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Located<Token>], ast: &'a mut Ast, notices: &'a mut NoticeStack) -> Self {
        Parser {
            tokens: TokenStream::new(tokens),
            ast,
            notices,
            mappings: Vec::new(),
            depth: 0,
            nesting: 0,
        }
    }

    /// `module nombre { declaración* }`
    pub fn module(&mut self) -> Parse<NodeId> {
        let (location, (module, attempted)) = self
            .mapped(|p| {
                p.keyword(Keyword::Module)?;
                let name = p.id()?.into_inner();
                p.skip_over(TokenKind::OpenCurly)?;

                let module = p.ast.alloc(
                    Construct::Module(Module {
                        name,
                        items: Vec::new(),
                        scope: SymbolTable::new(),
                    }),
                    None,
                );

                let depth = p.depth;
                let mut attempted = false;

                while !p.is(TokenKind::CloseCurly) {
                    p.expect_more(TokenKind::CloseCurly)?;
                    attempted = true;

                    let start = p.tokens.position();
                    match p.top_level() {
                        Ok(item) => p.register(module, item),
                        Err(_) => p.synchronize(start, depth),
                    }
                }

                p.skip_over(TokenKind::CloseCurly)?;
                Ok((module, attempted))
            })?
            .split();

        if !attempted {
            let name = self.ast.module(module).name.clone();
            self.notices
                .report(Diagnostic::EmptyModule { name })
                .at(location.clone())
                .commit();
        }

        self.ast.set_location(module, location);
        Ok(module)
    }

    /// Determina si el token actual es de la clase indicada.
    pub fn is(&self, kind: TokenKind) -> bool {
        self.current_kind() == kind
    }

    /// Determina si el token siguiente al actual es de la clase indicada.
    pub fn is_next(&self, kind: TokenKind) -> bool {
        self.tokens.peek().as_ref().kind() == kind
    }

    /// Falla si el token actual no es de la clase indicada. No consume.
    pub fn expect(&mut self, kind: TokenKind) -> Parse<()> {
        if self.is(kind) {
            Ok(())
        } else {
            let found = self.current_kind();
            self.fail(Diagnostic::UnexpectedToken {
                expected: kind,
                found,
            })
        }
    }

    /// Como [`Parser::expect()`], pero además consume el token.
    pub fn skip_over(&mut self, kind: TokenKind) -> Parse<()> {
        self.expect(kind)?;
        self.advance();

        Ok(())
    }

    /// Ejecuta una producción registrando su extensión en el fuente.
    ///
    /// El inicio se apila antes de la producción y se desapila al salir
    /// de ella por cualquier camino. Los avisos emitidos dentro abarcan
    /// desde ese inicio hasta el token actual.
    pub fn mapped<T, F>(&mut self, rule: F) -> Parse<Located<T>>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        let depth = self.mappings.len();
        let start = self.tokens.current().location().clone();

        self.mappings.push(start.clone());
        let result = rule(self);
        self.mappings.pop();

        assert_eq!(self.mappings.len(), depth, "unbalanced source mapping");

        let value = result?;
        Ok(Located::at(value, Location::span(start, &self.last_consumed())))
    }

    /// Ejecuta una producción que puede contenerse a sí misma.
    ///
    /// Más allá de [`MAX_NESTING`] niveles la producción falla en vez de
    /// seguir descendiendo.
    pub fn nested<T, F>(&mut self, rule: F) -> Parse<T>
    where
        F: FnOnce(&mut Self) -> Parse<T>,
    {
        if self.nesting >= MAX_NESTING {
            return self.fail(Diagnostic::NestingTooDeep { limit: MAX_NESTING });
        }

        self.nesting += 1;
        let result = rule(self);
        self.nesting -= 1;

        result
    }

    /// Registra un aviso y aborta la producción actual.
    pub fn fail<T>(&mut self, diagnostic: Diagnostic) -> Parse<T> {
        let location = self.here();
        self.fail_at(diagnostic, location)
    }

    fn fail_at<T>(&mut self, diagnostic: Diagnostic, location: Location) -> Parse<T> {
        let notice = self.notices.report(diagnostic).at(location).commit();
        Err(ErrorMarker { notice })
    }

    fn top_level(&mut self) -> Parse<NodeId> {
        let attributes = self.attributes()?;

        match self.current_kind() {
            TokenKind::Keyword(Keyword::Fn) => self.function(attributes),
            TokenKind::Keyword(Keyword::Extern) => self.external(attributes),

            found if !attributes.is_empty() => self.fail(Diagnostic::UnexpectedToken {
                expected: TokenKind::Keyword(Keyword::Fn),
                found,
            }),

            TokenKind::Keyword(Keyword::Global) => self.global(),
            TokenKind::Keyword(Keyword::Struct) => self.structure(),

            found => self.fail(Diagnostic::InternalUnexpectedToken { found }),
        }
    }

    fn register(&mut self, module: NodeId, item: NodeId) {
        let name = match self.ast.item_name(item) {
            Some(name) => name.clone(),
            None => return,
        };

        match self.ast.add_item(module, name.clone(), item) {
            Ok(()) => {
                tracing::debug!(%name, kind = %self.ast.kind(item), "declaration parsed");
            }

            Err(_) => {
                let location = self
                    .ast
                    .location(item)
                    .cloned()
                    .unwrap_or_else(|| self.here());

                self.notices
                    .report(Diagnostic::DuplicateDefinition { name })
                    .at(location)
                    .commit();
            }
        }
    }

    /// Salta hasta un punto desde el cual el módulo puede continuar.
    fn synchronize(&mut self, start: usize, depth: usize) {
        if self.tokens.position() == start {
            self.advance();
        }

        let mut skipped = 0;
        while self.tokens.has_next() && self.depth >= depth {
            let kind = self.current_kind();
            if self.depth == depth && (kind == TokenKind::CloseCurly || starts_declaration(kind)) {
                break;
            }

            self.advance();
            skipped += 1;
        }

        tracing::trace!(skipped, "resynchronized after failed declaration");
    }

    /// `(@ nombre)*`
    fn attributes(&mut self) -> Parse<Vec<NodeId>> {
        let mut attributes = Vec::new();
        while self.is(TokenKind::At) {
            let attribute = self.node(|p| {
                p.skip_over(TokenKind::At)?;
                let name = p.id()?.into_inner();

                Ok(Construct::Attribute(Attribute { name }))
            })?;

            attributes.push(attribute);
        }

        Ok(attributes)
    }

    fn function(&mut self, attributes: Vec<NodeId>) -> Parse<NodeId> {
        self.node(|p| {
            p.keyword(Keyword::Fn)?;
            let prototype = p.prototype()?;
            let body = p.block()?;

            Ok(Construct::Function(Function {
                attributes,
                prototype,
                body,
            }))
        })
    }

    fn external(&mut self, attributes: Vec<NodeId>) -> Parse<NodeId> {
        self.node(|p| {
            p.keyword(Keyword::Extern)?;
            p.keyword(Keyword::Fn)?;
            let prototype = p.prototype()?;
            p.skip_over(TokenKind::Semicolon)?;

            Ok(Construct::Extern(Extern {
                attributes,
                prototype,
            }))
        })
    }

    /// `nombre ( argumentos ) (-> tipo)?`
    fn prototype(&mut self) -> Parse<NodeId> {
        self.node(|p| {
            let name = p.id()?.into_inner();
            let arguments = p.arguments(&name)?;

            let return_type = if p.is(TokenKind::Arrow) {
                p.advance();
                p.type_ref()?
            } else {
                let location = p.last_consumed();
                p.ast.alloc(
                    Construct::Resolvable(Resolvable::Resolved(Type::Void)),
                    Some(location),
                )
            };

            Ok(Construct::Prototype(Prototype {
                name,
                arguments,
                return_type,
            }))
        })
    }

    /// `( (tipo nombre (, tipo nombre)*)? (, ...)? )`
    fn arguments(&mut self, function: &Identifier) -> Parse<NodeId> {
        self.node(|p| {
            p.skip_over(TokenKind::OpenParen)?;

            let mut list = ArgumentList::default();
            if !p.is(TokenKind::CloseParen) {
                loop {
                    if p.is(TokenKind::Ellipsis) {
                        p.advance();
                        list.variadic = true;
                        break;
                    }

                    let ty = p.type_ref()?;
                    let (location, argument) = p.id()?.split();

                    if list.scope.insert(argument.clone(), ty).is_err() {
                        let function = function.clone();
                        return p.fail_at(Diagnostic::DuplicateArgument { argument, function }, location);
                    }

                    if p.is(TokenKind::Comma) {
                        p.advance();
                    } else {
                        break;
                    }
                }
            }

            p.skip_over(TokenKind::CloseParen)?;
            Ok(Construct::ArgumentList(list))
        })
    }

    /// `global tipo nombre (= literal)? ;`
    fn global(&mut self) -> Parse<NodeId> {
        self.node(|p| {
            p.keyword(Keyword::Global)?;
            let ty = p.type_ref()?;
            let name = p.id()?.into_inner();

            let value = if p.is(TokenKind::Assign) {
                p.advance();
                Some(p.literal()?)
            } else {
                None
            };

            p.skip_over(TokenKind::Semicolon)?;
            Ok(Construct::Global(Global { name, ty, value }))
        })
    }

    /// `struct nombre { (tipo campo ;)* }`
    fn structure(&mut self) -> Parse<NodeId> {
        self.node(|p| {
            p.keyword(Keyword::Struct)?;
            let name = p.id()?.into_inner();
            p.skip_over(TokenKind::OpenCurly)?;

            let mut fields = SymbolTable::new();
            while !p.is(TokenKind::CloseCurly) {
                let ty = p.type_ref()?;
                let (location, field) = p.id()?.split();
                p.skip_over(TokenKind::Semicolon)?;

                if fields.insert(field.clone(), ty).is_err() {
                    let structure = name.clone();
                    return p.fail_at(Diagnostic::DuplicateField { field, structure }, location);
                }
            }

            p.skip_over(TokenKind::CloseCurly)?;
            Ok(Construct::Struct(Struct { name, fields }))
        })
    }

    /// Un tipo primitivo o el nombre de una estructura.
    fn type_ref(&mut self) -> Parse<NodeId> {
        self.node(|p| {
            let ty = match p.tokens.current().as_ref() {
                Token::Id(name) => Some(Resolvable::Unresolved(name.clone())),
                Token::Keyword(keyword) => builtin_type(*keyword).map(Resolvable::Resolved),
                _ => None,
            };

            let ty = match ty {
                Some(ty) => ty,
                None => {
                    let found = p.current_kind();
                    return p.fail(Diagnostic::ExpectedType { found });
                }
            };

            p.advance();
            Ok(Construct::Resolvable(ty))
        })
    }

    /// Asigna el constructo que produce `rule` con la extensión que ocupó.
    fn node<F>(&mut self, rule: F) -> Parse<NodeId>
    where
        F: FnOnce(&mut Self) -> Parse<Construct>,
    {
        let (location, construct) = self.mapped(rule)?.split();
        Ok(self.ast.alloc(construct, Some(location)))
    }

    /// Elementos separados por comas hasta `close`, que se consume.
    fn comma_separated<T, F>(&mut self, close: TokenKind, mut rule: F) -> Parse<Vec<T>>
    where
        F: FnMut(&mut Self) -> Parse<T>,
    {
        let mut items = Vec::new();
        if !self.is(close) {
            loop {
                items.push(rule(self)?);
                if self.is(TokenKind::Comma) {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        self.skip_over(close)?;
        Ok(items)
    }

    fn id(&mut self) -> Parse<Located<Identifier>> {
        let token = self.tokens.current();
        match token.as_ref() {
            Token::Id(id) => {
                self.advance();
                Ok(Located::at(id.clone(), token.location().clone()))
            }

            other => {
                let found = other.kind();
                self.fail(Diagnostic::UnexpectedToken {
                    expected: TokenKind::Id,
                    found,
                })
            }
        }
    }

    fn keyword(&mut self, keyword: Keyword) -> Parse<()> {
        self.skip_over(TokenKind::Keyword(keyword))
    }

    /// Falla con `expected` si ya no quedan tokens.
    fn expect_more(&mut self, expected: TokenKind) -> Parse<()> {
        if self.tokens.has_next() {
            Ok(())
        } else {
            self.expect(expected)
        }
    }

    fn advance(&mut self) -> &'a Located<Token> {
        let token = self.tokens.advance();
        match token.as_ref() {
            Token::OpenCurly => self.depth += 1,
            Token::CloseCurly => self.depth = self.depth.saturating_sub(1),
            _ => (),
        }

        token
    }

    fn current_kind(&self) -> TokenKind {
        self.tokens.current().as_ref().kind()
    }

    /// Extensión de la producción en curso hasta el token actual.
    fn here(&self) -> Location {
        let current = self.tokens.current().location();
        match self.mappings.last() {
            Some(start) => Location::span(start.clone(), current),
            None => current.clone(),
        }
    }

    fn last_consumed(&self) -> Location {
        self.tokens
            .previous()
            .unwrap_or_else(|| self.tokens.current())
            .location()
            .clone()
    }
}

fn starts_declaration(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::At
            | TokenKind::Keyword(Keyword::Fn | Keyword::Extern | Keyword::Global | Keyword::Struct)
    )
}

fn builtin_type(keyword: Keyword) -> Option<Type> {
    let ty = match keyword {
        Keyword::I8 => Type::Integer(IntegerKind::I8),
        Keyword::I16 => Type::Integer(IntegerKind::I16),
        Keyword::I32 => Type::Integer(IntegerKind::I32),
        Keyword::I64 => Type::Integer(IntegerKind::I64),
        Keyword::Bool => Type::Bool,
        Keyword::Char => Type::Char,
        Keyword::Void => Type::Void,
        _ => return None,
    };

    Some(ty)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ast::ConstructKind, lex, notice::Severity, pass::ErrorScan};

    fn parse(text: &str) -> (Ast, NoticeStack, Parse<NodeId>) {
        let tokens = lex::tokenize(text, "<test>").unwrap();
        let mut ast = Ast::new();
        let mut notices = NoticeStack::new();

        let result = parse_module(&tokens, &mut ast, &mut notices);
        (ast, notices, result)
    }

    fn item_names(ast: &Ast, module: NodeId) -> Vec<String> {
        ast.module(module)
            .items
            .iter()
            .filter_map(|&item| ast.item_name(item))
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn well_formed_module_has_no_notices() {
        let (ast, notices, result) = parse(
            "module math {
                 struct Point { i32 x; i32 y; }
                 global i64 counter = -1;
                 extern fn puts(char c, ...) -> i32;
                 @inline fn add(i32 a, i32 b) -> i32 { return a + b; }
             }",
        );

        let module = result.unwrap();
        assert!(notices.is_empty());
        assert_eq!(item_names(&ast, module), ["Point", "counter", "puts", "add"]);
        assert!(ErrorScan::run(&ast, module).is_empty());

        let puts = ast.module(module).scope.lookup(&"PUTS".into()).unwrap();
        let prototype = ast.prototype(ast.external(puts).prototype);
        assert!(ast.argument_list(prototype.arguments).variadic);
    }

    #[test]
    fn every_child_points_back_to_its_parent() {
        let (ast, _, result) = parse(
            "module m {
                 fn f(i32 a) -> i32 { let b = a * 2; { return b; } }
                 global bool flag = true;
             }",
        );

        let module = result.unwrap();
        let mut pending = vec![module];
        let mut visited = 0;

        while let Some(node) = pending.pop() {
            for child in ast.children(node) {
                assert_eq!(ast.parent(child), Some(node));
                pending.push(child);
            }

            assert!(ast.location(node).is_some());
            visited += 1;
        }

        assert!(visited > 10);
        assert_eq!(ast.parent(module), None);
    }

    #[test]
    fn duplicate_field_yields_exactly_one_diagnostic() {
        let (_, notices, result) = parse("module m { struct S { i32 a; i32 a; } }");

        assert!(result.is_ok());
        assert_eq!(notices.len(), 1);

        let diagnostic = notices.iter().next().unwrap().diagnostic().clone();
        assert_eq!(
            diagnostic,
            Diagnostic::DuplicateField {
                field: "a".into(),
                structure: "S".into(),
            }
        );
    }

    #[test]
    fn recovery_keeps_later_declarations() {
        let (ast, notices, result) =
            parse("module m { global 5 x; struct { } global i32 y = 1; }");

        let module = result.unwrap();
        assert_eq!(notices.errors().count(), 2);
        assert_eq!(item_names(&ast, module), ["y"]);

        let kinds: Vec<_> = notices.iter().map(|notice| notice.diagnostic().clone()).collect();
        assert_eq!(
            kinds,
            [
                Diagnostic::ExpectedType {
                    found: TokenKind::IntLiteral
                },
                Diagnostic::UnexpectedToken {
                    expected: TokenKind::Id,
                    found: TokenKind::OpenCurly
                },
            ]
        );
    }

    #[test]
    fn recovery_skips_nested_braces() {
        let (ast, notices, result) = parse(
            "module m {
                 fn broken() { let x = ; { fn inner() {} } }
                 fn fine() { return; }
             }",
        );

        let module = result.unwrap();
        assert_eq!(notices.len(), 1);
        assert_eq!(item_names(&ast, module), ["fine"]);
    }

    #[test]
    fn stray_token_at_top_level_is_an_internal_fork_failure() {
        let (ast, notices, result) = parse("module m { 42 global i8 z; }");

        let module = result.unwrap();
        assert_eq!(item_names(&ast, module), ["z"]);
        assert_eq!(
            notices.iter().next().unwrap().diagnostic(),
            &Diagnostic::InternalUnexpectedToken {
                found: TokenKind::IntLiteral
            }
        );
    }

    #[test]
    fn duplicate_definitions_keep_the_first() {
        let (ast, notices, result) = parse("module m { global i32 x; global bool X; }");

        let module = result.unwrap();
        let first = ast.module(module).items[0];
        assert_eq!(ast.module(module).items.len(), 1);
        assert_eq!(ast.module(module).scope.lookup(&"x".into()), Some(first));
        assert_eq!(
            notices.iter().next().unwrap().diagnostic(),
            &Diagnostic::DuplicateDefinition { name: "X".into() }
        );
    }

    #[test]
    fn duplicate_arguments_are_diagnosed() {
        let (_, notices, _) = parse("module m { extern fn f(i32 a, bool a); }");

        assert_eq!(
            notices.iter().next().unwrap().diagnostic(),
            &Diagnostic::DuplicateArgument {
                argument: "a".into(),
                function: "f".into(),
            }
        );
    }

    #[test]
    fn empty_module_is_a_warning() {
        let (ast, notices, result) = parse("module nothing { }");

        let module = result.unwrap();
        assert!(ast.module(module).items.is_empty());
        assert_eq!(notices.len(), 1);
        assert!(!notices.has_errors());
        assert_eq!(notices.iter().next().unwrap().severity(), Severity::Warning);
    }

    #[test]
    fn unterminated_module_fails() {
        let (_, notices, result) = parse("module m { global i32 x;");

        assert!(result.is_err());
        let marker = result.unwrap_err();
        assert_eq!(
            notices.get(marker.notice).unwrap().diagnostic(),
            &Diagnostic::UnexpectedToken {
                expected: TokenKind::CloseCurly,
                found: TokenKind::Eof,
            }
        );
    }

    #[test]
    fn notice_locations_span_the_failed_production() {
        let (_, notices, _) = parse("module m {\nglobal i32 = 5;\n}");

        let location = notices.iter().next().unwrap().location().to_string();
        assert_eq!(location, "<test>:[2:1-2:12]");
    }

    #[test]
    fn mapping_stack_is_balanced_after_failures() {
        let tokens = lex::tokenize("module m { fn f( { } }", "<test>").unwrap();
        let mut ast = Ast::new();
        let mut notices = NoticeStack::new();

        let mut parser = Parser::new(&tokens, &mut ast, &mut notices);
        let module = parser.module();

        assert!(module.is_ok());
        assert!(parser.mappings.is_empty());
        drop(parser);

        assert_eq!(notices.len(), 1);
        assert_eq!(ast.kind(module.unwrap()), ConstructKind::Module);
    }
}
