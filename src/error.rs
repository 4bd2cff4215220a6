//! Error types reported by the schema parser.

use std::io;

use thiserror::Error;

/// Classification of a parse/validation failure.
///
/// Every error the library reports belongs to exactly one of these kinds;
/// the kind determines nothing about control flow (all errors are fatal at
/// the end of the phase that produced them) but lets callers and tests
/// distinguish user mistakes from environmental failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed XML or unusable document structure.
    BadXml,
    /// Violation of a DSL rule.
    SchemaRule,
    /// A reference target is missing across the whole document set.
    UnresolvedReference,
    /// Name collision where uniqueness is required.
    DuplicateName,
    /// `sinceVersion` / `deprecated` outside their lawful bounds.
    VersionError,
    /// A condition expression refers to an incompatible or missing field.
    ConditionError,
    /// Filesystem failure on read or write.
    IoError,
}

/// Error produced while loading or validating schema files.
///
/// The human-readable message (including the `file:line` prefix when one is
/// known) has already been routed through the [`Logger`](crate::Logger) by
/// the time the error is returned, so callers normally only inspect
/// [`kind`](Error::kind).
#[derive(Debug, Error)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

impl Error {
    /// Creates an error of the given kind; the message should already carry
    /// a `file:line` prefix when one is known.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Error::new(ErrorKind::IoError, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_maps_to_io_kind() {
        let err: Error = io::Error::new(io::ErrorKind::NotFound, "gone").into();
        assert_eq!(ErrorKind::IoError, err.kind());
        assert!(err.to_string().contains("gone"));
    }
}
