//! Engine-level error type
//!
//! Wraps the format-layer taxonomy with backend I/O failures and the
//! by-name lookup misses the mutation operations report.

use std::fmt;

use h5f_core::FormatError;

#[derive(Debug)]
pub enum Error {
    /// A structural, semantic or capacity error from the format codecs
    Format(FormatError),
    /// The underlying byte source or sink failed
    Io(std::io::Error),
    /// No attribute with this name exists on the object
    AttributeNotFound(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Format(err) => write!(f, "{err}"),
            Error::Io(err) => write!(f, "i/o error: {err}"),
            Error::AttributeNotFound(name) => write!(f, "attribute not found: {name}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Format(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::AttributeNotFound(_) => None,
        }
    }
}

impl From<FormatError> for Error {
    fn from(err: FormatError) -> Self {
        Error::Format(err)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err)
    }
}

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_chains_context() {
        let err = Error::from(FormatError::Truncated("b-tree v2 leaf"));
        assert!(err.to_string().contains("b-tree v2 leaf"));

        let err = Error::AttributeNotFound(String::from("units"));
        assert!(err.to_string().contains("units"));
    }
}
