//! Representación intermedia.
//!
//! Un [`Module`] de IR es el destino vivo de la pasada de lowering:
//! estructuras, globales y funciones, estas últimas con un cuerpo de
//! instrucciones lineales sobre locales numeradas. Las funciones se
//! referencian por un [`FunctionRef`] estable dentro de su módulo.

use std::fmt::{self, Display};

pub use crate::ast::BinaryOp;

#[derive(Debug, Default)]
pub struct Module {
    pub name: String,
    pub structs: Vec<StructType>,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Module {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Module {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn structure(&self, name: &str) -> Option<&StructType> {
        self.structs
            .iter()
            .find(|structure| unicase::eq_ascii(structure.name.as_str(), name))
    }
}

/// Índice de una función dentro de su [`Module`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct FunctionRef(pub u32);

#[derive(Debug)]
pub struct Function {
    pub name: String,
    pub signature: Signature,
    pub body: FunctionBody,
}

impl Function {
    pub fn has_body(&self) -> bool {
        matches!(self.body, FunctionBody::Generated(_))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    pub parameters: Vec<Type>,
    pub variadic: bool,
    pub return_type: Type,
}

#[derive(Debug)]
pub enum FunctionBody {
    External,
    Generated(Vec<Instruction>),
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Type {
    Int(u32),
    Bool,
    Char,
    Void,
    Struct(String),
}

#[derive(Debug)]
pub struct StructType {
    pub name: String,
    pub fields: Vec<(String, Type)>,
}

#[derive(Debug)]
pub struct Global {
    pub name: String,
    pub ty: Type,
    pub init: Option<Constant>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Local(pub u32);

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Constant {
    Int { value: i64, bits: u32 },
    Bool(bool),
    Char(char),
}

impl Constant {
    pub fn ty(&self) -> Type {
        match self {
            Constant::Int { bits, .. } => Type::Int(*bits),
            Constant::Bool(_) => Type::Bool,
            Constant::Char(_) => Type::Char,
        }
    }
}

/// Un operando ya reducido.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Value {
    Local(Local),
    Constant(Constant),
    Function(FunctionRef),

    /// Resultado de una llamada a una función `void`.
    Void,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Instruction {
    Move(Value, Local),
    LoadGlobal(String, Local),
    Binary {
        operator: BinaryOp,
        lhs: Value,
        rhs: Value,
        output: Local,
    },
    Call {
        target: FunctionRef,
        arguments: Vec<Value>,
        output: Option<Local>,
    },
    Return(Option<Value>),
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int(bits) => write!(fmt, "i{}", bits),
            Type::Bool => fmt.write_str("bool"),
            Type::Char => fmt.write_str("char"),
            Type::Void => fmt.write_str("void"),
            Type::Struct(name) => write!(fmt, "%{}", name),
        }
    }
}

impl Display for Local {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "%{}", self.0)
    }
}

impl Display for Constant {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int { value, bits } => write!(fmt, "i{} {}", bits, value),
            Constant::Bool(value) => write!(fmt, "bool {}", value),
            Constant::Char(value) => write!(fmt, "char {:?}", value),
        }
    }
}
