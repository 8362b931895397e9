//! Presentación de errores ubicados.
//!
//! Cualquier fase puede entregar sus errores como [`Located`], y los
//! avisos del parser llegan como [`Notice`]. Ambos se presentan aquí
//! citando la línea original y subrayando el rango afectado.

use crate::{
    notice::{Notice, NoticeStack, Severity},
    source::{Located, Location},
};

use std::{
    error::Error,
    fmt::{self, Display},
};

mod sealed {
    pub trait Sealed {}
}

pub trait LocatedError: sealed::Sealed {
    fn source(&self) -> &dyn Error;
    fn location(&self) -> &Location;

    fn severity(&self) -> Severity {
        Severity::Error
    }
}

pub struct Diagnostics {
    kind: &'static str,
    errors: Vec<Box<dyn 'static + LocatedError>>,
}

impl Diagnostics {
    pub fn kind(self, kind: &'static str) -> Self {
        Diagnostics { kind, ..self }
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// Determina si al menos una entrada impide continuar.
    pub fn has_errors(&self) -> bool {
        self.errors
            .iter()
            .any(|error| error.severity() == Severity::Error)
    }
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics {
            kind: "error",
            errors: Default::default(),
        }
    }
}

impl<E: 'static + LocatedError> From<E> for Diagnostics {
    fn from(error: E) -> Self {
        Diagnostics {
            errors: vec![Box::new(error)],
            ..Default::default()
        }
    }
}

impl<E: 'static + LocatedError> From<Vec<E>> for Diagnostics {
    fn from(errors: Vec<E>) -> Self {
        let errors = errors
            .into_iter()
            .map(|error| {
                let errors: Box<dyn LocatedError> = Box::new(error);
                errors
            })
            .collect();

        Diagnostics {
            errors,
            ..Default::default()
        }
    }
}

impl From<NoticeStack> for Diagnostics {
    fn from(notices: NoticeStack) -> Self {
        Diagnostics::from(notices.into_vec())
    }
}

impl Display for Diagnostics {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Diagnostics { kind, errors } = self;

        if errors.is_empty() {
            return writeln!(fmt, "No errors were reported");
        }

        for error in errors {
            let label = match error.severity() {
                Severity::Error => kind,
                Severity::Warning => "warning",
            };

            writeln!(fmt, "{}: {}", label, error.source())?;

            let location = error.location();
            writeln!(fmt, " --> {}", location)?;

            let digits = location.end().line().to_string().chars().count();
            writeln!(fmt, "{:digits$} |", "", digits = digits)?;

            for line_number in location.start().line()..=location.end().line() {
                location.source().with_line(line_number, |line| {
                    writeln!(fmt, "{:>digits$} | {}", line_number, line, digits = digits)
                })?
            }

            let from = location.start().column();
            let to = location.end().column().saturating_sub(1).max(1);
            let min = from.min(to);
            let max = from.max(to);

            let skip = (min - 1) as usize;
            let highlight = (max - min + 1) as usize;

            writeln!(
                fmt,
                "{:digits$} | {:skip$}{:^<highlight$}",
                "",
                "",
                "",
                digits = digits,
                skip = skip,
                highlight = highlight
            )?;

            writeln!(fmt)?;
        }

        let failures = errors
            .iter()
            .filter(|error| error.severity() == Severity::Error)
            .count();

        if failures == 0 {
            return Ok(());
        }

        let error_or_errors = if failures == 1 { "error" } else { "errors" };
        writeln!(fmt, "Build failed with {} {}", failures, error_or_errors)
    }
}

impl<E: Error> sealed::Sealed for Located<E> {}

impl<E: Error> LocatedError for Located<E> {
    fn source(&self) -> &dyn Error {
        self.as_ref()
    }

    fn location(&self) -> &Location {
        Located::location(self)
    }
}

impl sealed::Sealed for Notice {}

impl LocatedError for Notice {
    fn source(&self) -> &dyn Error {
        self.diagnostic()
    }

    fn location(&self) -> &Location {
        Notice::location(self)
    }

    fn severity(&self) -> Severity {
        Notice::severity(self)
    }
}
