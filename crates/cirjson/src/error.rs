use crate::location::Location;
use crate::token::NumberKind;
use std::io;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Error taxonomy of the streaming core. Two roots: I/O failures of the
/// underlying transport (wrapped, preserving the original error as source)
/// and stream errors (lexical, structural, coercion, resource limits,
/// misuse). Every stream error carries the location at which it was raised;
/// the rendered message suffixes it on its own line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Failure of the underlying transport. The location identifies the
    /// owning reader or writer through its content reference.
    #[error("I/O failure: {source}\n at {location}")]
    Io {
        #[source]
        source: io::Error,
        location: Location,
    },

    /// Lexical or structural error while reading, including a missing or
    /// misplaced identity element.
    #[error("{message}\n at {location}")]
    StreamRead { message: String, location: Location },

    /// A writer operation that would produce invalid CirJSON output.
    #[error("{message}\n at {location}")]
    StreamWrite { message: String, location: Location },

    /// A valid token whose value is not representable in the requested
    /// type, e.g. `int_value` on a number overflowing 32 bits.
    #[error("{message}\n at {location}")]
    InputCoercion {
        message: String,
        /// The numeric type the caller requested, when applicable.
        target: Option<NumberKind>,
        location: Location,
    },

    /// A configured resource bound was exceeded (nesting depth, string or
    /// number length, symbol-table collisions).
    #[error("{message}\n at {location}")]
    ConstraintViolation { message: String, location: Location },

    /// API misuse: an operation invoked in a state that disallows it, or
    /// out-of-range buffer offsets.
    #[error("{message}")]
    Misuse { message: String },
}

impl Error {
    pub fn stream_read(message: impl Into<String>, location: Location) -> Self {
        Error::StreamRead {
            message: message.into(),
            location,
        }
    }

    pub fn stream_write(message: impl Into<String>, location: Location) -> Self {
        Error::StreamWrite {
            message: message.into(),
            location,
        }
    }

    pub fn coercion(
        message: impl Into<String>,
        target: Option<NumberKind>,
        location: Location,
    ) -> Self {
        Error::InputCoercion {
            message: message.into(),
            target,
            location,
        }
    }

    pub fn constraint(message: impl Into<String>, location: Location) -> Self {
        Error::ConstraintViolation {
            message: message.into(),
            location,
        }
    }

    pub fn misuse(message: impl Into<String>) -> Self {
        Error::Misuse {
            message: message.into(),
        }
    }

    pub fn io(source: io::Error, location: Location) -> Self {
        Error::Io { source, location }
    }

    /// The location attached at throw time, if any.
    pub fn location(&self) -> Option<&Location> {
        match self {
            Error::Io { location, .. }
            | Error::StreamRead { location, .. }
            | Error::StreamWrite { location, .. }
            | Error::InputCoercion { location, .. }
            | Error::ConstraintViolation { location, .. } => Some(location),
            Error::Misuse { .. } => None,
        }
    }

    /// The original message, without the location suffix.
    pub fn original_message(&self) -> String {
        match self {
            Error::Io { source, .. } => format!("I/O failure: {source}"),
            Error::StreamRead { message, .. }
            | Error::StreamWrite { message, .. }
            | Error::InputCoercion { message, .. }
            | Error::ConstraintViolation { message, .. }
            | Error::Misuse { message } => message.clone(),
        }
    }
}
