//! Traducción del AST a IR.
//!
//! # Pilas de operandos
//! Los métodos de una [`Pass`] no retornan el resultado de la visita, por
//! lo cual el lowering se comunica mediante dos pilas: una de valores
//! ([`ir::Value`]) y otra de tipos ([`ir::Type`]). Para reducir un nodo se
//! reducen primero los hijos que hagan falta, se sacan sus resultados de
//! la pila correspondiente y se apila exactamente un resultado propio.
//! Las sentencias no apilan nada; emiten instrucciones en el cuerpo de la
//! función en curso. Un desbalance en cualquiera de las pilas es un error
//! de implementación y aborta el proceso.
//!
//! # Errores
//! A diferencia del parser, el lowering no se recupera: el primer error
//! semántico detiene la traducción y se reporta como [`LoweringError`].
//! Un árbol que todavía contiene marcadores de error no se traduce.

use std::collections::HashMap;
use thiserror::Error;

use crate::{
    ast::{self, Ast, Construct, DeclaredType, Literal, NodeId, ResolveError},
    ir::{self, Constant, FunctionBody, FunctionRef, Instruction, Local, Signature, Value},
    lex::Identifier,
    pass::{ErrorScan, Pass},
    source::{Located, Location},
};

mod backend;

pub use backend::Backend;

pub type Lower<T> = Result<T, Located<LoweringError>>;

#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LoweringError {
    #[error("Refusing to lower a tree with {count} unresolved syntax error(s)")]
    ErroneousTree { count: usize },

    #[error("Function `{name}` already has a body")]
    Redefinition { name: Identifier },

    #[error("`{name}` was previously declared with {expected} argument(s), found {found}")]
    ArgumentCountMismatch {
        name: Identifier,
        expected: usize,
        found: usize,
    },

    #[error("Symbol `{name}` is undefined")]
    Unresolved { name: Identifier },

    #[error("`{name}` is not a value")]
    NotAValue { name: Identifier },

    #[error("`{name}` is not a function")]
    NotAFunction { name: Identifier },

    #[error("Unknown type `{name}`")]
    UnknownType { name: Identifier },

    #[error("`{name}` takes {expected} argument(s), but {found} were supplied")]
    CallArity {
        name: Identifier,
        expected: usize,
        found: usize,
    },

    #[error("Function `{name}` does not return a value on every path")]
    MissingReturn { name: Identifier },

    #[error("Global `{name}` is declared as {expected} but initialized with {found}")]
    InitializerMismatch {
        name: Identifier,
        expected: ir::Type,
        found: ir::Type,
    },
}

impl From<ResolveError> for LoweringError {
    fn from(error: ResolveError) -> Self {
        match error {
            ResolveError::UndefinedType(name) | ResolveError::NotAType(name) => {
                LoweringError::UnknownType { name }
            }

            ResolveError::Undefined(name) => LoweringError::Unresolved { name },
            ResolveError::NotAValue(name) => LoweringError::NotAValue { name },
            ResolveError::NotAFunction(name) => LoweringError::NotAFunction { name },
        }
    }
}

/// Traduce un módulo completo hacia `backend`.
///
/// # Panics
/// Si algún constructo involucrado en un error carece de ubicación, lo
/// cual no ocurre con árboles construidos por [`crate::parse`].
pub fn lower_module<B: Backend + ?Sized>(ast: &Ast, module: NodeId, backend: &mut B) -> Lower<()> {
    let markers = ErrorScan::run(ast, module);
    if let Some(&(first, _)) = markers.first() {
        let error = LoweringError::ErroneousTree {
            count: markers.len(),
        };

        return Err(Located::at(error, locate(ast, first)));
    }

    let mut lowering = Lowering::new(backend);
    ast.accept(module, &mut lowering)?;

    let target = lowering.backend.target();
    tracing::debug!(
        module = %ast.module(module).name,
        functions = target.functions.len(),
        globals = target.globals.len(),
        "module lowered"
    );

    Ok(())
}

/// Pasada de lowering.
pub struct Lowering<'b, B: Backend + ?Sized> {
    backend: &'b mut B,
    values: Vec<Value>,
    types: Vec<ir::Type>,
    function: Option<FunctionState>,
}

/// Estado de la función cuyo cuerpo se está traduciendo.
struct FunctionState {
    /// Argumentos (por nodo de tipo) y declaraciones (por nodo de
    /// declaración) ya ligados a un valor.
    bindings: HashMap<NodeId, Value>,
    next_local: u32,
    body: Vec<Instruction>,
}

impl FunctionState {
    fn alloc_local(&mut self) -> Local {
        let local = Local(self.next_local);
        self.next_local += 1;
        local
    }
}

impl<'b, B: Backend + ?Sized> Lowering<'b, B> {
    pub fn new(backend: &'b mut B) -> Self {
        Lowering {
            backend,
            values: Vec::new(),
            types: Vec::new(),
            function: None,
        }
    }

    /// Reduce un nodo que debe apilar exactamente un valor.
    pub fn lower_value(&mut self, ast: &Ast, id: NodeId) -> Lower<Value> {
        let (values, types) = (self.values.len(), self.types.len());
        ast.accept(id, self)?;

        assert_eq!(self.values.len(), values + 1, "{} left an unbalanced value stack", ast.kind(id));
        assert_eq!(self.types.len(), types, "{} touched the type stack", ast.kind(id));

        Ok(self.values.pop().expect("value stack was checked"))
    }

    /// Reduce un nodo que debe apilar exactamente un tipo.
    pub fn lower_type(&mut self, ast: &Ast, id: NodeId) -> Lower<ir::Type> {
        let (values, types) = (self.values.len(), self.types.len());
        ast.accept(id, self)?;

        assert_eq!(self.types.len(), types + 1, "{} left an unbalanced type stack", ast.kind(id));
        assert_eq!(self.values.len(), values, "{} touched the value stack", ast.kind(id));

        Ok(self.types.pop().expect("type stack was checked"))
    }

    /// Reduce un nodo que no apila nada.
    pub fn lower_statement(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        let (values, types) = (self.values.len(), self.types.len());
        ast.accept(id, self)?;

        assert_eq!(self.values.len(), values, "{} left a value behind", ast.kind(id));
        assert_eq!(self.types.len(), types, "{} left a type behind", ast.kind(id));

        Ok(())
    }

    fn lower_function_ref(&mut self, ast: &Ast, prototype: NodeId) -> Lower<FunctionRef> {
        match self.lower_value(ast, prototype)? {
            Value::Function(handle) => Ok(handle),
            other => panic!("prototype lowered to {:?}", other),
        }
    }

    fn state(&mut self) -> &mut FunctionState {
        self.function
            .as_mut()
            .expect("statement lowered outside of a function body")
    }

    fn emit(&mut self, instruction: Instruction) {
        self.state().body.push(instruction);
    }

    fn bind(&mut self, node: NodeId, value: Value) {
        self.state().bindings.insert(node, value);
    }
}

impl<B: Backend + ?Sized> Pass for Lowering<'_, B> {
    type Error = Located<LoweringError>;

    fn visit_module(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        let module = ast.module(id);

        let target = self.backend.target();
        if target.name.is_empty() {
            target.name = module.name.to_string();
        }

        for &item in &module.items {
            self.lower_statement(ast, item)?;
        }

        Ok(())
    }

    fn visit_struct(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        let structure = ast.structure(id);

        let mut fields = Vec::with_capacity(structure.fields.len());
        for (field, ty) in structure.fields.iter() {
            fields.push((field.to_string(), self.lower_type(ast, ty)?));
        }

        let name = structure.name.to_string();
        let target = self.backend.target();
        if target.structure(&name).is_none() {
            target.structs.push(ir::StructType { name, fields });
        }

        Ok(())
    }

    fn visit_global(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        let global = ast.global(id);

        let ty = self.lower_type(ast, global.ty)?;
        let init = match global.value {
            Some(value) => match coerce(constant(*ast.literal(value)), &ty) {
                Ok(init) => Some(init),
                Err(found) => {
                    let error = LoweringError::InitializerMismatch {
                        name: global.name.clone(),
                        expected: ty,
                        found,
                    };

                    return Err(Located::at(error, locate(ast, value)));
                }
            },

            None => None,
        };

        let name = global.name.to_string();
        let target = self.backend.target();
        if target
            .globals
            .iter()
            .any(|other| unicase::eq_ascii(other.name.as_str(), name.as_str()))
        {
            let name = global.name.clone();
            return Err(Located::at(LoweringError::Redefinition { name }, locate(ast, id)));
        }

        target.globals.push(ir::Global { name, ty, init });
        Ok(())
    }

    fn visit_extern(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        self.lower_function_ref(ast, ast.external(id).prototype)?;
        Ok(())
    }

    fn visit_function(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        let function = ast.function(id);
        let handle = self.lower_function_ref(ast, function.prototype)?;

        let prototype = ast.prototype(function.prototype);
        let arguments = ast.argument_list(prototype.arguments);

        let mut state = FunctionState {
            bindings: HashMap::new(),
            next_local: 0,
            body: Vec::new(),
        };

        for argument in arguments.scope.nodes() {
            let local = state.alloc_local();
            state.bindings.insert(argument, Value::Local(local));
        }

        let previous = self.function.replace(state);
        assert!(previous.is_none(), "nested function bodies");

        let lowered = self.lower_statement(ast, function.body);
        let state = self.function.take().expect("function state vanished");
        lowered?;

        let mut body = state.body;
        let terminated = ast
            .last_statement(function.body)
            .map_or(false, |last| ast.is_terminal(last));

        if !terminated {
            if self.backend.function(handle).signature.return_type != ir::Type::Void {
                let name = prototype.name.clone();
                return Err(Located::at(LoweringError::MissingReturn { name }, locate(ast, id)));
            }

            body.push(Instruction::Return(None));
        }

        tracing::trace!(function = %prototype.name, instructions = body.len(), "body lowered");
        self.backend.function_mut(handle).body = FunctionBody::Generated(body);

        Ok(())
    }

    fn visit_prototype(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        let prototype = ast.prototype(id);
        let arguments = ast.argument_list(prototype.arguments);
        let count = arguments.scope.len();

        let fail = |error| Err(Located::at(error, locate(ast, id)));
        let name = prototype.name.as_ref();

        let handle = match self.backend.lookup_function(name) {
            Some(handle) => {
                let existing = self.backend.function(handle);
                if existing.has_body() {
                    return fail(LoweringError::Redefinition {
                        name: prototype.name.clone(),
                    });
                }

                let expected = existing.signature.parameters.len();
                if expected != count {
                    return fail(LoweringError::ArgumentCountMismatch {
                        name: prototype.name.clone(),
                        expected,
                        found: count,
                    });
                }

                tracing::trace!(%name, "reusing registered prototype");
                handle
            }

            None => {
                let mut parameters = Vec::with_capacity(count);
                for ty in arguments.scope.nodes() {
                    parameters.push(self.lower_type(ast, ty)?);
                }

                let signature = Signature {
                    parameters,
                    variadic: arguments.variadic,
                    return_type: self.lower_type(ast, prototype.return_type)?,
                };

                tracing::trace!(%name, "registering prototype");
                self.backend.get_or_insert_function(name, signature)
            }
        };

        let lowered = self.backend.function(handle).signature.parameters.len();
        if lowered != count {
            return fail(LoweringError::ArgumentCountMismatch {
                name: prototype.name.clone(),
                expected: lowered,
                found: count,
            });
        }

        self.values.push(Value::Function(handle));
        Ok(())
    }

    fn visit_block(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        for &statement in &ast.block(id).statements {
            self.lower_statement(ast, statement)?;
        }

        Ok(())
    }

    fn visit_variable_decl(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        let decl = ast.variable_decl(id);
        if let DeclaredType::Explicit(ty) = decl.ty {
            self.lower_type(ast, ty)?;
        }

        let value = self.lower_value(ast, decl.value)?;
        let local = self.state().alloc_local();

        self.emit(Instruction::Move(value, local));
        self.bind(id, Value::Local(local));

        Ok(())
    }

    fn visit_return(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        let value = match ast.ret(id).value {
            Some(value) => Some(self.lower_value(ast, value)?),
            None => None,
        };

        self.emit(Instruction::Return(value));
        Ok(())
    }

    fn visit_expr_statement(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        self.lower_value(ast, ast.expr_statement(id).expression)?;
        Ok(())
    }

    fn visit_literal(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        self.values.push(Value::Constant(constant(*ast.literal(id))));
        Ok(())
    }

    fn visit_reference(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        let name = &ast.reference(id).name;
        let fail = |error| Err(Located::at(error, locate(ast, id)));

        let target = match ast.lookup(id, name) {
            Some(target) => target,
            None => return fail(LoweringError::Unresolved { name: name.clone() }),
        };

        let value = match ast.get(target) {
            Construct::VariableDecl(_) | Construct::Resolvable(_) => {
                match self.state().bindings.get(&target) {
                    Some(&value) => value,
                    None => return fail(LoweringError::Unresolved { name: name.clone() }),
                }
            }

            Construct::Global(global) => {
                let local = self.state().alloc_local();
                self.emit(Instruction::LoadGlobal(global.name.to_string(), local));
                Value::Local(local)
            }

            _ => return fail(LoweringError::NotAValue { name: name.clone() }),
        };

        self.values.push(value);
        Ok(())
    }

    fn visit_call(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        let call = ast.call(id);
        let fail = |error: LoweringError| Err(Located::at(error, locate(ast, id)));

        let prototype = match ast.callee_prototype(id, &call.callee) {
            Ok(prototype) => prototype,
            Err(error) => return fail(error.into()),
        };

        let callee = &ast.prototype(prototype).name;
        let target = match self.backend.lookup_function(callee.as_ref()) {
            Some(handle) => handle,
            None => self.lower_function_ref(ast, prototype)?,
        };

        let signature = &self.backend.function(target).signature;
        let expected = signature.parameters.len();
        let found = call.arguments.len();

        if found < expected || (found > expected && !signature.variadic) {
            let name = callee.clone();
            return fail(LoweringError::CallArity {
                name,
                expected,
                found,
            });
        }

        let returns = signature.return_type != ir::Type::Void;

        let mut arguments = Vec::with_capacity(found);
        for &argument in &call.arguments {
            arguments.push(self.lower_value(ast, argument)?);
        }

        let output = if returns {
            Some(self.state().alloc_local())
        } else {
            None
        };

        self.emit(Instruction::Call {
            target,
            arguments,
            output,
        });

        self.values.push(output.map_or(Value::Void, Value::Local));
        Ok(())
    }

    fn visit_binary(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        let binary = ast.binary(id);

        let lhs = self.lower_value(ast, binary.lhs)?;
        let rhs = self.lower_value(ast, binary.rhs)?;
        let output = self.state().alloc_local();

        self.emit(Instruction::Binary {
            operator: binary.operator,
            lhs,
            rhs,
            output,
        });

        self.values.push(Value::Local(output));
        Ok(())
    }

    fn visit_resolvable(&mut self, ast: &Ast, id: NodeId) -> Lower<()> {
        let ty = match ast.resolvable(id).resolve(ast, id) {
            Ok(ty) => ty,
            Err(error) => return Err(Located::at(error.into(), locate(ast, id))),
        };

        self.types.push(ir_type(&ty));
        Ok(())
    }

    fn visit_error_marker(&mut self, _: &Ast, id: NodeId) -> Lower<()> {
        panic!("error marker {:?} reached lowering", id)
    }
}

fn ir_type(ty: &ast::Type) -> ir::Type {
    match ty {
        ast::Type::Integer(kind) => ir::Type::Int(kind.bits()),
        ast::Type::Bool => ir::Type::Bool,
        ast::Type::Char => ir::Type::Char,
        ast::Type::Void => ir::Type::Void,
        ast::Type::Struct { name, .. } => ir::Type::Struct(name.to_string()),
    }
}

fn constant(literal: Literal) -> Constant {
    match literal {
        Literal::Integer { value, kind } => Constant::Int {
            value,
            bits: kind.bits(),
        },

        Literal::Bool(value) => Constant::Bool(value),
        Literal::Char(value) => Constant::Char(value),
    }
}

/// Ajusta una constante al tipo con que se declaró su global.
///
/// Los enteros se ensanchan o estrechan si el valor cabe; cualquier otro
/// desacuerdo retorna el tipo encontrado.
fn coerce(constant: Constant, ty: &ir::Type) -> Result<Constant, ir::Type> {
    match (constant, ty) {
        (Constant::Int { value, .. }, &ir::Type::Int(bits)) => {
            let fits = match bits {
                8 => i8::try_from(value).is_ok(),
                16 => i16::try_from(value).is_ok(),
                32 => i32::try_from(value).is_ok(),
                _ => true,
            };

            if fits {
                Ok(Constant::Int { value, bits })
            } else {
                Err(constant.ty())
            }
        }

        (constant, ty) if constant.ty() == *ty => Ok(constant),
        (constant, _) => Err(constant.ty()),
    }
}

/// Ubicación del nodo o, en su defecto, la de su ancestro más cercano.
fn locate(ast: &Ast, id: NodeId) -> Location {
    ast.ancestors(id)
        .find_map(|node| ast.location(node))
        .cloned()
        .unwrap_or_else(|| panic!("{} {:?} has no source location", ast.kind(id), id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ast::{ErrorMarker, ExprStatement},
        ir::BinaryOp,
        lex::{self, TokenKind},
        notice::{Diagnostic, NoticeStack},
        parse::parse_module,
    };

    fn parse(ast: &mut Ast, text: &str) -> NodeId {
        let tokens = lex::tokenize(text, "<test>").unwrap();
        let mut notices = NoticeStack::new();

        let module = parse_module(&tokens, ast, &mut notices).unwrap();
        assert!(!notices.has_errors(), "{:?}", notices.into_vec());

        module
    }

    fn item(ast: &Ast, module: NodeId, name: &str) -> NodeId {
        ast.module(module).scope.lookup(&name.into()).unwrap()
    }

    fn lower(text: &str) -> (ir::Module, Lower<()>) {
        let mut ast = Ast::new();
        let module = parse(&mut ast, text);

        let mut target = ir::Module::default();
        let result = lower_module(&ast, module, &mut target);

        (target, result)
    }

    fn body(function: &ir::Function) -> &[Instruction] {
        match &function.body {
            FunctionBody::Generated(body) => body,
            FunctionBody::External => panic!("`{}` has no body", function.name),
        }
    }

    fn int(value: i64) -> Value {
        Value::Constant(Constant::Int { value, bits: 32 })
    }

    #[test]
    fn externs_can_be_lowered_repeatedly() {
        let mut ast = Ast::new();
        let module = parse(&mut ast, "module m { extern fn puts(char c) -> i32; }");
        let puts = item(&ast, module, "puts");

        let mut target = ir::Module::new("m");
        let mut lowering = Lowering::new(&mut target);
        lowering.lower_statement(&ast, puts).unwrap();
        lowering.lower_statement(&ast, puts).unwrap();

        assert_eq!(target.functions.len(), 1);
        assert!(!target.functions[0].has_body());
        assert_eq!(
            target.functions[0].signature,
            Signature {
                parameters: vec![ir::Type::Char],
                variadic: false,
                return_type: ir::Type::Int(32),
            }
        );
    }

    #[test]
    fn function_bodies_cannot_be_lowered_twice() {
        let mut ast = Ast::new();
        let module = parse(&mut ast, "module m { fn answer() -> i32 { return 42; } }");
        let answer = item(&ast, module, "answer");

        let mut target = ir::Module::new("m");
        let mut lowering = Lowering::new(&mut target);
        lowering.lower_statement(&ast, answer).unwrap();

        let error = lowering.lower_statement(&ast, answer).unwrap_err();
        assert_eq!(
            error.into_inner(),
            LoweringError::Redefinition {
                name: "answer".into()
            }
        );

        assert_eq!(body(&target.functions[0]), [Instruction::Return(Some(int(42)))]);
    }

    #[test]
    fn redeclaration_with_other_arity_is_rejected() {
        let mut ast = Ast::new();
        let first = parse(&mut ast, "module a { extern fn f(i32 x); }");
        let second = parse(&mut ast, "module b { fn f(i32 x, i32 y) { return; } }");

        let mut target = ir::Module::default();
        lower_module(&ast, first, &mut target).unwrap();

        let error = lower_module(&ast, second, &mut target).unwrap_err();
        assert_eq!(
            error.as_ref(),
            &LoweringError::ArgumentCountMismatch {
                name: "f".into(),
                expected: 1,
                found: 2,
            }
        );

        assert_eq!(target.functions.len(), 1);
        assert!(!target.functions[0].has_body());
    }

    #[test]
    fn definitions_complete_earlier_declarations() {
        let mut ast = Ast::new();
        let declaration = parse(&mut ast, "module a { extern fn twice(i32 x) -> i32; }");
        let definition = parse(&mut ast, "module b { fn twice(i32 x) -> i32 { return x * 2; } }");

        let mut target = ir::Module::default();
        lower_module(&ast, declaration, &mut target).unwrap();
        lower_module(&ast, definition, &mut target).unwrap();

        assert_eq!(target.name, "a");
        assert_eq!(target.functions.len(), 1);
        assert_eq!(
            body(&target.functions[0]),
            [
                Instruction::Binary {
                    operator: BinaryOp::Mul,
                    lhs: Value::Local(Local(0)),
                    rhs: int(2),
                    output: Local(1),
                },
                Instruction::Return(Some(Value::Local(Local(1)))),
            ]
        );
    }

    #[test]
    fn bodies_lower_to_linear_instructions() {
        let (target, result) = lower(
            "module m {
                 global i32 base = 10;
                 extern fn log(i32 v, ...);
                 fn scale(i32 x) -> i32 { let y = x + base; log(y, 1); return helper(y); }
                 fn helper(i32 v) -> i32 { return v; }
             }",
        );

        result.unwrap();

        let names: Vec<_> = target.functions.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["log", "scale", "helper"]);

        assert_eq!(
            body(&target.functions[1]),
            [
                Instruction::LoadGlobal("base".into(), Local(1)),
                Instruction::Binary {
                    operator: BinaryOp::Add,
                    lhs: Value::Local(Local(0)),
                    rhs: Value::Local(Local(1)),
                    output: Local(2),
                },
                Instruction::Move(Value::Local(Local(2)), Local(3)),
                Instruction::Call {
                    target: FunctionRef(0),
                    arguments: vec![Value::Local(Local(3)), int(1)],
                    output: None,
                },
                Instruction::Call {
                    target: FunctionRef(2),
                    arguments: vec![Value::Local(Local(3))],
                    output: Some(Local(4)),
                },
                Instruction::Return(Some(Value::Local(Local(4)))),
            ]
        );

        assert_eq!(
            body(&target.functions[2]),
            [Instruction::Return(Some(Value::Local(Local(0))))]
        );

        assert_eq!(target.globals.len(), 1);
        assert_eq!(target.globals[0].init, Some(Constant::Int { value: 10, bits: 32 }));
    }

    #[test]
    fn void_bodies_return_implicitly() {
        let (target, result) = lower(
            "module m {
                 fn noop() { }
                 fn broken() -> bool { let a = true; }
             }",
        );

        assert_eq!(
            result.unwrap_err().into_inner(),
            LoweringError::MissingReturn {
                name: "broken".into()
            }
        );

        assert_eq!(body(&target.functions[0]), [Instruction::Return(None)]);
    }

    #[test]
    fn call_arity_is_checked() {
        let (_, result) = lower("module m { fn f(i32 a) { return; } fn g() { f(); } }");

        assert_eq!(
            result.unwrap_err().into_inner(),
            LoweringError::CallArity {
                name: "f".into(),
                expected: 1,
                found: 0,
            }
        );
    }

    #[test]
    fn names_must_resolve() {
        let (_, result) = lower("module m { fn g() { return nothing; } }");
        assert_eq!(
            result.unwrap_err().into_inner(),
            LoweringError::Unresolved {
                name: "nothing".into()
            }
        );

        let (_, result) = lower("module m { fn f(Q q) { return; } }");
        assert_eq!(
            result.unwrap_err().into_inner(),
            LoweringError::UnknownType { name: "Q".into() }
        );

        let (_, result) = lower("module m { struct S { } fn f() { return S; } }");
        assert_eq!(
            result.unwrap_err().into_inner(),
            LoweringError::NotAValue { name: "S".into() }
        );
    }

    #[test]
    fn struct_types_are_registered_once() {
        let (target, result) = lower(
            "module m {
                 struct Point { i32 x; i64 y; }
                 fn origin(Point p) -> Point { return p; }
             }",
        );

        result.unwrap();
        assert_eq!(target.structs.len(), 1);
        assert_eq!(
            target.structs[0].fields,
            [
                ("x".to_string(), ir::Type::Int(32)),
                ("y".to_string(), ir::Type::Int(64)),
            ]
        );

        let signature = &target.functions[0].signature;
        assert_eq!(signature.parameters, [ir::Type::Struct("Point".into())]);
        assert_eq!(signature.return_type, ir::Type::Struct("Point".into()));
    }

    #[test]
    fn erroneous_trees_are_refused() {
        let mut ast = Ast::new();
        let module = parse(&mut ast, "module m { fn f() { return; } }");
        let body = ast.function(item(&ast, module, "f")).body;
        let location = ast.location(body).cloned().unwrap();

        let mut notices = NoticeStack::new();
        let notice = notices
            .report(Diagnostic::ExpectedExpression {
                found: TokenKind::Semicolon,
            })
            .at(location.clone())
            .commit();

        let marker = ast.alloc_error(ErrorMarker { notice }, Some(location.clone()));
        let statement = ast.alloc(
            Construct::ExprStatement(ExprStatement { expression: marker }),
            Some(location),
        );

        ast.append_statement(body, statement).unwrap();

        let mut target = ir::Module::default();
        let error = lower_module(&ast, module, &mut target).unwrap_err();

        assert_eq!(error.into_inner(), LoweringError::ErroneousTree { count: 1 });
        assert!(target.functions.is_empty());
    }

    #[test]
    #[should_panic(expected = "unbalanced value stack")]
    fn statements_do_not_produce_values() {
        let mut ast = Ast::new();
        let module = parse(&mut ast, "module m { extern fn f(); }");
        let f = item(&ast, module, "f");

        let mut target = ir::Module::default();
        let _ = Lowering::new(&mut target).lower_value(&ast, f);
    }

    #[test]
    fn global_initializers_take_the_declared_width() {
        let (target, result) = lower(
            "module m { global i64 counter = -1; global i8 small = 3; global char c = 'c'; }",
        );
        result.unwrap();

        for global in &target.globals {
            assert_eq!(global.init.map(|init| init.ty()), Some(global.ty.clone()));
        }

        assert_eq!(target.globals[0].init, Some(Constant::Int { value: -1, bits: 64 }));
        assert_eq!(target.globals[1].init, Some(Constant::Int { value: 3, bits: 8 }));
    }

    #[test]
    fn global_initializers_must_fit() {
        let (target, result) = lower("module m { global i8 big = 300; }");
        assert_eq!(
            result.unwrap_err().into_inner(),
            LoweringError::InitializerMismatch {
                name: "big".into(),
                expected: ir::Type::Int(8),
                found: ir::Type::Int(32),
            }
        );
        assert!(target.globals.is_empty());

        let (_, result) = lower("module m { global bool flag = 1; }");
        assert_eq!(
            result.unwrap_err().into_inner(),
            LoweringError::InitializerMismatch {
                name: "flag".into(),
                expected: ir::Type::Bool,
                found: ir::Type::Int(32),
            }
        );
    }
}
