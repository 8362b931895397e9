//! Canal de avisos.
//!
//! Durante el análisis sintáctico los errores no detienen la compilación
//! de inmediato: cada falla se registra como un [`Notice`] en una
//! [`NoticeStack`] y el parser continúa desde el punto de recuperación
//! más cercano. La pila solo crece; ningún aviso se descarta antes de
//! que termine la sesión.
//!
//! Un aviso se construye en pasos: se elige una plantilla
//! ([`Diagnostic`], cuyos argumentos quedan fijados por el tipo), se
//! le asocia una ubicación y finalmente se confirma con
//! [`PendingNotice::commit()`]. Confirmar agrega exactamente un aviso.

use crate::{
    lex::{Identifier, TokenKind},
    source::Location,
};

use std::fmt::{self, Display};
use thiserror::Error;

/// Gravedad de un aviso.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Severity {
    /// Impide continuar a las siguientes fases.
    Error,

    /// Informativo, no detiene la compilación.
    Warning,
}

impl Display for Severity {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => fmt.write_str("error"),
            Severity::Warning => fmt.write_str("warning"),
        }
    }
}

/// Plantillas de diagnóstico.
///
/// Cada variante fija los argumentos que su mensaje requiere.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Diagnostic {
    #[error("Expected {expected}, found {found} instead")]
    UnexpectedToken {
        expected: TokenKind,
        found: TokenKind,
    },

    /// Un punto de bifurcación interno del parser no tiene producción
    /// para el token actual.
    #[error("Unexpected {found}, no construct may begin here")]
    InternalUnexpectedToken { found: TokenKind },

    #[error("Field `{field}` is defined more than once in struct `{structure}`")]
    DuplicateField {
        field: Identifier,
        structure: Identifier,
    },

    #[error("Duplicate definition of `{name}`")]
    DuplicateDefinition { name: Identifier },

    #[error("Argument `{argument}` of `{function}` is declared more than once")]
    DuplicateArgument {
        argument: Identifier,
        function: Identifier,
    },

    #[error("Variable `{name}` is already declared in this block")]
    DuplicateVariable { name: Identifier },

    #[error("Expected a type, found {found} instead")]
    ExpectedType { found: TokenKind },

    #[error("Expected an expression, found {found} instead")]
    ExpectedExpression { found: TokenKind },

    #[error("Expected a literal, found {found} instead")]
    ExpectedLiteral { found: TokenKind },

    #[error("Module `{name}` declares nothing")]
    EmptyModule { name: Identifier },

    #[error("Expressions and blocks may not nest more than {limit} levels deep")]
    NestingTooDeep { limit: usize },
}

impl Diagnostic {
    /// Gravedad que se asume si el emisor no indica otra.
    pub fn default_severity(&self) -> Severity {
        match self {
            Diagnostic::EmptyModule { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }
}

/// Un aviso registrado.
#[derive(Debug, Clone)]
pub struct Notice {
    severity: Severity,
    diagnostic: Diagnostic,
    location: Location,
}

impl Notice {
    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn diagnostic(&self) -> &Diagnostic {
        &self.diagnostic
    }

    pub fn location(&self) -> &Location {
        &self.location
    }
}

impl Display for Notice {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}: {} ({})", self.severity, self.diagnostic, self.location)
    }
}

/// Índice de un aviso dentro de su pila.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct NoticeId(usize);

impl NoticeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Registro ordenado de avisos de una sesión.
#[derive(Debug, Default)]
pub struct NoticeStack {
    notices: Vec<Notice>,
}

impl NoticeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inicia la construcción de un aviso a partir de una plantilla.
    pub fn report(&mut self, diagnostic: Diagnostic) -> NoticeBuilder<'_> {
        NoticeBuilder {
            severity: diagnostic.default_severity(),
            diagnostic,
            stack: self,
        }
    }

    pub fn get(&self, id: NoticeId) -> Option<&Notice> {
        self.notices.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.notices.iter()
    }

    /// Avisos de gravedad [`Severity::Error`], en orden de registro.
    pub fn errors(&self) -> impl Iterator<Item = &Notice> {
        self.iter()
            .filter(|notice| notice.severity == Severity::Error)
    }

    pub fn has_errors(&self) -> bool {
        self.errors().next().is_some()
    }

    pub fn len(&self) -> usize {
        self.notices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notices.is_empty()
    }

    pub fn into_vec(self) -> Vec<Notice> {
        self.notices
    }

    fn push(&mut self, notice: Notice) -> NoticeId {
        self.notices.push(notice);
        NoticeId(self.notices.len() - 1)
    }
}

/// Aviso en construcción al que aún le falta una ubicación.
#[must_use = "a notice is only recorded after `.at(..).commit()`"]
pub struct NoticeBuilder<'a> {
    stack: &'a mut NoticeStack,
    diagnostic: Diagnostic,
    severity: Severity,
}

impl<'a> NoticeBuilder<'a> {
    pub fn severity(self, severity: Severity) -> Self {
        NoticeBuilder { severity, ..self }
    }

    /// Asocia la ubicación del aviso.
    pub fn at(self, location: Location) -> PendingNotice<'a> {
        PendingNotice {
            builder: self,
            location,
        }
    }
}

/// Aviso completo, listo para confirmarse.
#[must_use = "a notice is only recorded after `.commit()`"]
pub struct PendingNotice<'a> {
    builder: NoticeBuilder<'a>,
    location: Location,
}

impl PendingNotice<'_> {
    pub fn severity(mut self, severity: Severity) -> Self {
        self.builder.severity = severity;
        self
    }

    /// Agrega el aviso a la pila.
    pub fn commit(self) -> NoticeId {
        let PendingNotice { builder, location } = self;
        let NoticeBuilder {
            stack,
            diagnostic,
            severity,
        } = builder;

        tracing::trace!(%diagnostic, %location, "notice recorded");
        stack.push(Notice {
            severity,
            diagnostic,
            location,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lex;

    fn somewhere() -> Location {
        lex::tokenize("x", "<test>").unwrap()[0].location().clone()
    }

    #[test]
    fn commit_appends_exactly_one_notice() {
        let mut notices = NoticeStack::new();

        let first = notices
            .report(Diagnostic::UnexpectedToken {
                expected: TokenKind::Semicolon,
                found: TokenKind::Eof,
            })
            .at(somewhere())
            .commit();

        let second = notices
            .report(Diagnostic::DuplicateField {
                field: "a".into(),
                structure: "S".into(),
            })
            .at(somewhere())
            .commit();

        assert_eq!(notices.len(), 2);
        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);

        let message = notices.get(second).unwrap().diagnostic().to_string();
        assert_eq!(message, "Field `a` is defined more than once in struct `S`");
    }

    #[test]
    fn severity_defaults_per_template() {
        let mut notices = NoticeStack::new();
        notices
            .report(Diagnostic::EmptyModule { name: "m".into() })
            .at(somewhere())
            .commit();

        assert_eq!(notices.len(), 1);
        assert!(!notices.has_errors());

        notices
            .report(Diagnostic::EmptyModule { name: "m".into() })
            .at(somewhere())
            .severity(Severity::Error)
            .commit();

        assert!(notices.has_errors());
        assert_eq!(notices.errors().count(), 1);
    }

    #[test]
    fn unexpected_token_message_names_both_kinds() {
        let diagnostic = Diagnostic::UnexpectedToken {
            expected: TokenKind::CloseCurly,
            found: TokenKind::Id,
        };

        assert_eq!(
            diagnostic.to_string(),
            "Expected `}`, found identifier instead"
        );
    }
}
