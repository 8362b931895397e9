//! Front end del compilador kiln.
//!
//! # Fases
//! Cada programa deriva de un único archivo de código fuente. Este
//! archivo se somete primero a análisis léxico en [`lex`], de lo cual se
//! obtiene un flujo de tokens. El flujo de tokens se dispone en un árbol
//! de constructos ([`ast`]) por medio de análisis sintáctico en
//! [`parse`]. El parser no se detiene ante el primer error: reporta
//! avisos en un [`notice::NoticeStack`], descarta la declaración fallida
//! y continúa con la siguiente, de modo que una sola corrida revela
//! tantos errores como sea posible. Los nodos [`ast::ErrorMarker`] solo
//! existen si alguien los materializa con [`ast::Ast::alloc_error`], y
//! [`lower`] rechaza los árboles que los contienen.
//!
//! Un árbol libre de errores se recorre con pasadas ([`pass`]). La
//! pasada de [`lower`] lo traduce a la representación intermedia de
//! [`ir`], la cual finalmente se puede listar en texto con [`emit`].
//!
//! # Diagnósticos
//! Toda fase ubica sus errores en el código fuente mediante
//! [`source::Located`]. El módulo [`error`] los presenta citando las
//! líneas afectadas.

#[macro_use]
mod macros;

pub mod ast;
pub mod emit;
pub mod error;
pub mod ir;
pub mod lex;
pub mod lower;
pub mod notice;
pub mod parse;
pub mod pass;
pub mod source;
