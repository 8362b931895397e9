//! Taxonomía de constructos.
//!
//! Todo nodo del árbol es una variante de [`Construct`]. Los hijos se
//! referencian por [`NodeId`] y pertenecen al [`Ast`](super::Ast); un
//! constructo nunca es dueño directo de otro.

use std::fmt::{self, Display};

use super::{IntegerKind, NodeId, Resolvable, SymbolTable, Type};
use crate::{
    lex::Identifier,
    notice::NoticeId,
};

/// Un nodo del AST.
#[derive(Debug, Clone)]
pub enum Construct {
    Module(Module),
    Function(Function),
    Extern(Extern),
    Prototype(Prototype),
    ArgumentList(ArgumentList),
    Block(Block),
    Struct(Struct),
    Global(Global),
    Attribute(Attribute),
    VariableDecl(VariableDecl),
    Return(Return),
    ExprStatement(ExprStatement),
    Literal(Literal),
    Reference(Reference),
    Call(Call),
    Binary(Binary),
    Resolvable(Resolvable<Type>),
    ErrorMarker(ErrorMarker),
}

/// Clase de un constructo.
///
/// Se deriva de la variante de [`Construct`], por lo cual no puede
/// cambiar luego de la creación del nodo.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ConstructKind {
    Module,
    Function,
    Extern,
    Prototype,
    ArgumentList,
    Block,
    Struct,
    Global,
    Attribute,
    VariableDecl,
    Return,
    ExprStatement,
    Literal,
    Reference,
    Call,
    Binary,
    Resolvable,
    ErrorMarker,
}

impl Construct {
    pub fn kind(&self) -> ConstructKind {
        match self {
            Construct::Module(_) => ConstructKind::Module,
            Construct::Function(_) => ConstructKind::Function,
            Construct::Extern(_) => ConstructKind::Extern,
            Construct::Prototype(_) => ConstructKind::Prototype,
            Construct::ArgumentList(_) => ConstructKind::ArgumentList,
            Construct::Block(_) => ConstructKind::Block,
            Construct::Struct(_) => ConstructKind::Struct,
            Construct::Global(_) => ConstructKind::Global,
            Construct::Attribute(_) => ConstructKind::Attribute,
            Construct::VariableDecl(_) => ConstructKind::VariableDecl,
            Construct::Return(_) => ConstructKind::Return,
            Construct::ExprStatement(_) => ConstructKind::ExprStatement,
            Construct::Literal(_) => ConstructKind::Literal,
            Construct::Reference(_) => ConstructKind::Reference,
            Construct::Call(_) => ConstructKind::Call,
            Construct::Binary(_) => ConstructKind::Binary,
            Construct::Resolvable(_) => ConstructKind::Resolvable,
            Construct::ErrorMarker(_) => ConstructKind::ErrorMarker,
        }
    }

    /// Hijos directos, en un orden fijo por clase.
    pub fn children(&self) -> Vec<NodeId> {
        match self {
            Construct::Module(module) => module.items.clone(),

            Construct::Function(function) => {
                let mut children = function.attributes.clone();
                children.extend([function.prototype, function.body]);
                children
            }

            Construct::Extern(external) => {
                let mut children = external.attributes.clone();
                children.push(external.prototype);
                children
            }

            Construct::Prototype(prototype) => vec![prototype.arguments, prototype.return_type],
            Construct::ArgumentList(arguments) => arguments.scope.nodes().collect(),
            Construct::Block(block) => block.statements.clone(),
            Construct::Struct(structure) => structure.fields.nodes().collect(),

            Construct::Global(global) => {
                let mut children = vec![global.ty];
                children.extend(global.value);
                children
            }

            Construct::VariableDecl(decl) => match decl.ty {
                DeclaredType::Explicit(ty) => vec![ty, decl.value],
                DeclaredType::Inferred => vec![decl.value],
            },

            Construct::Return(ret) => ret.value.into_iter().collect(),
            Construct::ExprStatement(statement) => vec![statement.expression],
            Construct::Call(call) => call.arguments.clone(),
            Construct::Binary(binary) => vec![binary.lhs, binary.rhs],

            Construct::Literal(_)
            | Construct::Reference(_)
            | Construct::Attribute(_)
            | Construct::Resolvable(_)
            | Construct::ErrorMarker(_) => Vec::new(),
        }
    }

    /// Nombre bajo el que este constructo se registra en su ámbito.
    pub fn name(&self) -> Option<&Identifier> {
        match self {
            Construct::Module(module) => Some(&module.name),
            Construct::Prototype(prototype) => Some(&prototype.name),
            Construct::Struct(structure) => Some(&structure.name),
            Construct::Global(global) => Some(&global.name),
            Construct::Attribute(attribute) => Some(&attribute.name),
            Construct::VariableDecl(decl) => Some(&decl.name),
            _ => None,
        }
    }
}

impl Display for ConstructKind {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        use ConstructKind::*;

        let name = match self {
            Module => "module",
            Function => "function",
            Extern => "extern",
            Prototype => "prototype",
            ArgumentList => "argument list",
            Block => "block",
            Struct => "struct",
            Global => "global",
            Attribute => "attribute",
            VariableDecl => "variable declaration",
            Return => "return",
            ExprStatement => "expression statement",
            Literal => "literal",
            Reference => "reference",
            Call => "call",
            Binary => "binary operation",
            Resolvable => "type reference",
            ErrorMarker => "error marker",
        };

        fmt.write_str(name)
    }
}

/// Raíz de una unidad de compilación.
#[derive(Debug, Clone)]
pub struct Module {
    pub name: Identifier,

    /// Declaraciones de nivel superior, en orden de aparición.
    pub items: Vec<NodeId>,

    /// Ámbito global: funciones, externs, globales y estructuras.
    pub scope: SymbolTable,
}

/// Función con cuerpo.
#[derive(Debug, Clone)]
pub struct Function {
    pub attributes: Vec<NodeId>,
    pub prototype: NodeId,
    pub body: NodeId,
}

/// Función definida fuera de esta unidad.
#[derive(Debug, Clone)]
pub struct Extern {
    pub attributes: Vec<NodeId>,
    pub prototype: NodeId,
}

/// Firma de una función o extern.
#[derive(Debug, Clone)]
pub struct Prototype {
    pub name: Identifier,

    /// Nodo [`ArgumentList`].
    pub arguments: NodeId,

    /// Nodo [`Construct::Resolvable`].
    pub return_type: NodeId,
}

/// Parámetros de un prototipo.
///
/// Cada entrada asocia el nombre de un argumento al nodo de su tipo.
#[derive(Debug, Clone, Default)]
pub struct ArgumentList {
    pub scope: SymbolTable,
    pub variadic: bool,
}

/// Secuencia ordenada de sentencias.
///
/// Su tabla de símbolos contiene únicamente las declaraciones de
/// variables hechas directamente en este bloque.
#[derive(Debug, Clone, Default)]
pub struct Block {
    pub statements: Vec<NodeId>,
    pub scope: SymbolTable,
}

#[derive(Debug, Clone)]
pub struct Struct {
    pub name: Identifier,

    /// Campo a nodo de tipo, en orden de declaración.
    pub fields: SymbolTable,
}

#[derive(Debug, Clone)]
pub struct Global {
    pub name: Identifier,
    pub ty: NodeId,
    pub value: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct Attribute {
    pub name: Identifier,
}

#[derive(Debug, Clone)]
pub struct VariableDecl {
    pub name: Identifier,
    pub ty: DeclaredType,
    pub value: NodeId,
}

/// Tipo de una declaración de variable.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeclaredType {
    /// Escrito explícitamente; nodo [`Construct::Resolvable`].
    Explicit(NodeId),

    /// `let`: el tipo es exactamente el del inicializador.
    Inferred,
}

#[derive(Debug, Clone)]
pub struct Return {
    pub value: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub struct ExprStatement {
    pub expression: NodeId,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Literal {
    Integer { value: i64, kind: IntegerKind },
    Bool(bool),
    Char(char),
}

impl Literal {
    /// Tipo intrínseco del literal.
    pub fn ty(&self) -> Type {
        match self {
            Literal::Integer { kind, .. } => Type::Integer(*kind),
            Literal::Bool(_) => Type::Bool,
            Literal::Char(_) => Type::Char,
        }
    }
}

/// Uso de un nombre como valor.
#[derive(Debug, Clone)]
pub struct Reference {
    pub name: Identifier,
}

#[derive(Debug, Clone)]
pub struct Call {
    pub callee: Identifier,
    pub arguments: Vec<NodeId>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Pow,
    Less,
    Greater,
}

impl BinaryOp {
    /// Precedencia; un número mayor enlaza más fuerte.
    pub fn precedence(self) -> u8 {
        match self {
            BinaryOp::Less | BinaryOp::Greater => 10,
            BinaryOp::Add | BinaryOp::Sub => 20,
            BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => 30,
            BinaryOp::Pow => 40,
        }
    }

    /// `a ^ b ^ c` es `a ^ (b ^ c)`; los demás asocian a la izquierda.
    pub fn is_right_associative(self) -> bool {
        self == BinaryOp::Pow
    }

    pub fn is_comparison(self) -> bool {
        matches!(self, BinaryOp::Less | BinaryOp::Greater)
    }
}

impl Display for BinaryOp {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "add",
            BinaryOp::Sub => "sub",
            BinaryOp::Mul => "mul",
            BinaryOp::Div => "div",
            BinaryOp::Mod => "mod",
            BinaryOp::Pow => "pow",
            BinaryOp::Less => "lt",
            BinaryOp::Greater => "gt",
        };

        fmt.write_str(symbol)
    }
}

#[derive(Debug, Clone)]
pub struct Binary {
    pub operator: BinaryOp,
    pub lhs: NodeId,
    pub rhs: NodeId,
}

/// Centinela de una producción fallida.
///
/// El aviso que explica la falla ya se encuentra registrado cuando
/// se crea el marcador. Un marcador no tiene hijos y ninguna pasada
/// debe tratarlo como el constructo que reemplaza.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ErrorMarker {
    pub notice: NoticeId,
}
