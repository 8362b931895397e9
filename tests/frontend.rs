use kiln::{
    ast::{
        Ast, ArgumentList, Construct, IntegerKind, Literal, NodeId, Prototype, ResolveError, Resolvable,
        Type,
    },
    lex,
    notice::{Diagnostic, NoticeStack, Severity},
    parse::{parse_module, Parse},
    pass::ErrorScan,
};

fn parse(text: &str) -> (Ast, NoticeStack, Parse<NodeId>) {
    let tokens = lex::tokenize(text, "main.kn").unwrap();

    let mut ast = Ast::new();
    let mut notices = NoticeStack::new();
    let module = parse_module(&tokens, &mut ast, &mut notices);

    (ast, notices, module)
}

fn item(ast: &Ast, module: NodeId, name: &str) -> Option<NodeId> {
    ast.module(module).scope.lookup(&name.into())
}

fn diagnostics(notices: &NoticeStack) -> Vec<Diagnostic> {
    notices.iter().map(|notice| notice.diagnostic().clone()).collect()
}

#[test]
fn global_with_initializer() {
    let (ast, notices, module) = parse("module M { global i32 x = 5; }");
    let module = module.unwrap();

    assert!(notices.is_empty());
    assert_eq!(ast.module(module).name.to_string(), "M");
    assert_eq!(ast.module(module).items.len(), 1);

    let x = item(&ast, module, "x").unwrap();
    let global = ast.global(x);
    assert_eq!(
        ast.resolvable(global.ty).resolve(&ast, x).unwrap(),
        Type::Integer(IntegerKind::I32)
    );

    let value = global.value.unwrap();
    assert!(matches!(ast.literal(value), Literal::Integer { value: 5, .. }));
    assert_eq!(ast.parent(x), Some(module));
}

#[test]
fn duplicate_fields_discard_the_struct() {
    let (ast, notices, module) = parse("module m { struct S { i32 a; i32 a; } }");
    let module = module.unwrap();

    assert_eq!(
        diagnostics(&notices),
        [Diagnostic::DuplicateField {
            field: "a".into(),
            structure: "S".into(),
        }]
    );

    assert_eq!(item(&ast, module, "S"), None);
    assert!(ast.module(module).items.is_empty());
}

#[test]
fn splitting_preserves_statement_order() {
    let text = "module m { fn f() { let a = 1; let b = a + 2; f(); return; } }";

    for at in 0..4 {
        let (mut ast, notices, module) = parse(text);
        let module = module.unwrap();
        assert!(notices.is_empty());

        let function = item(&ast, module, "f").unwrap();
        let body = ast.function(function).body;
        let original = ast.block(body).statements.clone();

        let tail = ast.split(body, at).unwrap();
        let mut joined = ast.block(body).statements.clone();
        joined.extend(&ast.block(tail).statements);

        assert_eq!(joined, original);
        assert_eq!(ast.block(body).statements.len(), at);
        assert_eq!(ast.parent(tail), Some(function));

        for &statement in &ast.block(tail).statements {
            assert_eq!(ast.parent(statement), Some(tail));
        }
    }
}

#[test]
fn mangling_is_deterministic() {
    let (ast, _, module) = parse(
        "module net {
             struct Packet { i32 size; }
             extern fn send(Packet packet, i16 port) -> bool;
         }",
    );

    let module = module.unwrap();
    let send = item(&ast, module, "send").unwrap();
    let prototype = ast.external(send).prototype;

    let first = ast.mangled_name(prototype);
    assert_eq!(first.as_deref(), Some("net_bool_send_Packet_packet_i16_port"));
    assert_eq!(ast.mangled_name(prototype), first);
}

#[test]
fn mangling_requires_a_function_parent() {
    let (mut ast, _, module) = parse("module m { fn f() { } }");
    let module = module.unwrap();
    let body = ast.function(item(&ast, module, "f").unwrap()).body;

    let return_type = ast.alloc(Construct::Resolvable(Resolvable::Resolved(Type::Void)), None);
    let arguments = ast.alloc(Construct::ArgumentList(ArgumentList::default()), None);
    let prototype = ast.alloc(
        Construct::Prototype(Prototype {
            name: "loose".into(),
            arguments,
            return_type,
        }),
        None,
    );

    assert_eq!(ast.mangled_name(prototype), None);

    ast.attach(prototype, body);
    assert_eq!(ast.mangled_name(prototype), None);
}

#[test]
fn recovery_continues_after_failed_declarations() {
    let (ast, notices, module) = parse(
        "module m {
             global = 3;
             fn (;
             global i32 y = 1;
         }",
    );

    let module = module.unwrap();
    assert_eq!(notices.errors().count(), 2);
    assert!(matches!(
        diagnostics(&notices)[0],
        Diagnostic::ExpectedType {
            found: lex::TokenKind::Assign
        }
    ));

    let y = item(&ast, module, "y").unwrap();
    assert_eq!(ast.module(module).items, [y]);
    assert!(ErrorScan::run(&ast, module).is_empty());
}

#[test]
fn inferred_declarations_take_the_initializer_type() {
    let (ast, notices, module) = parse(
        "module m {
             extern fn wide() -> i64;
             fn f() { let a = wide(); let b = a < 1; let c = 'z'; return; }
         }",
    );

    let module = module.unwrap();
    assert!(notices.is_empty());

    let body = ast.function(item(&ast, module, "f").unwrap()).body;
    let types: Vec<_> = ast.block(body).statements[..3]
        .iter()
        .map(|&decl| ast.declared_type(decl).unwrap())
        .collect();

    assert_eq!(
        types,
        [Type::Integer(IntegerKind::I64), Type::Bool, Type::Char]
    );
}

#[test]
fn empty_modules_only_warn() {
    let (_, notices, module) = parse("module quiet { }");

    assert!(module.is_ok());
    assert!(!notices.has_errors());

    let notice = notices.iter().next().unwrap();
    assert_eq!(notice.severity(), Severity::Warning);
    assert_eq!(notice.diagnostic(), &Diagnostic::EmptyModule { name: "quiet".into() });
}

#[test]
fn notices_carry_source_locations() {
    let (_, notices, module) = parse("module m {\n  global i32 = 4;\n}");

    assert!(module.is_ok());
    let notice = notices.errors().next().unwrap();

    // Abarca la declaración desde `global` hasta el token inesperado
    let location = notice.location();
    assert_eq!(location.start().line(), 2);
    assert_eq!(location.start().column(), 3);
    assert_eq!(location.end().line(), 2);
    assert!(location.end().column() >= 14);
    assert_eq!(location.source().name(), "main.kn");
}

#[test]
fn declarations_see_only_earlier_names() {
    let (ast, notices, module) = parse(
        "module m {
             global i64 a = 1;
             fn f() { let a = a; let b = c; let c = 'c'; return; }
         }",
    );

    let module = module.unwrap();
    assert!(notices.is_empty());

    let body = ast.function(item(&ast, module, "f").unwrap()).body;
    let statements = &ast.block(body).statements;

    // El inicializador de `a` nombra al global, no a la propia declaración
    assert_eq!(ast.declared_type(statements[0]), Ok(Type::Integer(IntegerKind::I64)));
    assert_eq!(
        ast.declared_type(statements[1]),
        Err(ResolveError::Undefined("c".into()))
    );
    assert_eq!(ast.declared_type(statements[2]), Ok(Type::Char));
}
