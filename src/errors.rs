use std::{fmt, io, num::TryFromIntError};
use quick_xml::events::attributes::AttrError;

/// Broad class of a failure, so callers can tell an aborted parse from a
/// configuration or I/O problem without matching on messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed markup or a violated structural precondition.
    Syntax,
    Io,
    Config,
    /// A request the loader accepts but does not implement yet.
    Unsupported,
    /// An entity table outgrew its index type.
    Capacity,
}

#[derive(Debug)]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }

    pub fn syntax(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Syntax, message)
    }

    /// Syntax error annotated with the tokenizer's byte offset.
    pub fn syntax_at(offset: usize, message: impl fmt::Display) -> Self {
        Error::syntax(message.to_string()).at(offset)
    }

    /// Append the tokenizer's byte offset to a syntax error.
    pub fn at(mut self, offset: usize) -> Self {
        if self.kind == ErrorKind::Syntax {
            self.message = format!("{} (at byte {offset})", self.message);
        }
        self
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Unsupported, message)
    }

    pub fn is_syntax(&self) -> bool {
        self.kind == ErrorKind::Syntax
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} error: {}", self.kind, self.message)
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        Error {
            kind: ErrorKind::Io,
            message: value.to_string()
        }
    }
}

impl From<quick_xml::Error> for Error {
    fn from(value: quick_xml::Error) -> Self {
        Error {
            kind: ErrorKind::Syntax,
            message: value.to_string()
        }
    }
}

impl From<AttrError> for Error {
    fn from(value: AttrError) -> Self {
        Error {
            kind: ErrorKind::Syntax,
            message: value.to_string()
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::Config,
            message: value.to_string()
        }
    }
}

impl From<TryFromIntError> for Error {
    fn from(value: TryFromIntError) -> Self {
        Error {
            kind: ErrorKind::Capacity,
            message: value.to_string()
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
