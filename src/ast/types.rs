//! Tipos del lenguaje y referencias diferidas.

use std::fmt::{self, Display};
use thiserror::Error;

use super::{Ast, ConstructKind, NodeId};
use crate::lex::Identifier;

/// Ancho de un tipo entero.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IntegerKind {
    I8,
    I16,
    I32,
    I64,
}

impl IntegerKind {
    pub fn bits(self) -> u32 {
        match self {
            IntegerKind::I8 => 8,
            IntegerKind::I16 => 16,
            IntegerKind::I32 => 32,
            IntegerKind::I64 => 64,
        }
    }

    /// El tipo más estrecho de los dos usados por literales en que cabe `value`.
    pub fn fitting(value: i64) -> Self {
        if i32::try_from(value).is_ok() {
            IntegerKind::I32
        } else {
            IntegerKind::I64
        }
    }
}

/// Un tipo ya resuelto.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Type {
    Integer(IntegerKind),
    Bool,
    Char,
    Void,

    /// Estructura declarada en el módulo, junto al nodo que la define.
    Struct { name: Identifier, node: NodeId },
}

impl Display for Type {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Integer(kind) => write!(fmt, "i{}", kind.bits()),
            Type::Bool => fmt.write_str("bool"),
            Type::Char => fmt.write_str("char"),
            Type::Void => fmt.write_str("void"),
            Type::Struct { name, .. } => name.fmt(fmt),
        }
    }
}

/// Un valor que puede estar resuelto o pendiente de resolución.
///
/// Las referencias a tipos se capturan tal cual aparecen en el código
/// fuente, de modo que una estructura puede usarse antes de declararse.
/// No existe conversión implícita entre ambos estados: se pasa de uno
/// al otro únicamente mediante [`Resolvable::resolve()`].
#[derive(Clone, Debug, PartialEq)]
pub enum Resolvable<T> {
    Unresolved(Identifier),
    Resolved(T),
}

impl<T> Resolvable<T> {
    pub fn is_resolved(&self) -> bool {
        matches!(self, Resolvable::Resolved(_))
    }

    pub fn resolved(&self) -> Option<&T> {
        match self {
            Resolvable::Resolved(value) => Some(value),
            Resolvable::Unresolved(_) => None,
        }
    }

    /// Identificador con que se escribió la referencia, si lo hubo.
    pub fn id(&self) -> Option<&Identifier> {
        match self {
            Resolvable::Unresolved(id) => Some(id),
            Resolvable::Resolved(_) => None,
        }
    }
}

impl Resolvable<Type> {
    /// Resuelve contra el ámbito global del módulo que contiene a `scope`.
    ///
    /// Los tipos nombrados solo pueden ser estructuras, y estas solo se
    /// declaran a nivel de módulo.
    pub fn resolve(&self, ast: &Ast, scope: NodeId) -> Result<Type, ResolveError> {
        let id = match self {
            Resolvable::Resolved(typ) => return Ok(typ.clone()),
            Resolvable::Unresolved(id) => id,
        };

        let module = ast
            .module_of(scope)
            .ok_or_else(|| ResolveError::UndefinedType(id.clone()))?;

        match ast.module(module).scope.lookup(id) {
            Some(node) if ast.kind(node) == ConstructKind::Struct => Ok(Type::Struct {
                name: ast.structure(node).name.clone(),
                node,
            }),

            Some(_) => Err(ResolveError::NotAType(id.clone())),
            None => Err(ResolveError::UndefinedType(id.clone())),
        }
    }

    /// Nombre con el que este tipo participa de un nombre decorado.
    ///
    /// Es el identificador del sitio de declaración si lo hay, o bien
    /// el nombre intrínseco del tipo resuelto.
    pub fn name_or_id(&self) -> String {
        match self {
            Resolvable::Unresolved(id) => id.to_string(),
            Resolvable::Resolved(typ) => typ.to_string(),
        }
    }
}

/// Falla al resolver un nombre.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ResolveError {
    #[error("Type `{0}` is undefined")]
    UndefinedType(Identifier),

    #[error("`{0}` does not name a type")]
    NotAType(Identifier),

    #[error("Symbol `{0}` is undefined")]
    Undefined(Identifier),

    #[error("`{0}` does not name a value")]
    NotAValue(Identifier),

    #[error("`{0}` does not name a function")]
    NotAFunction(Identifier),
}
