//! Error types for cqlbind

use std::fmt;
use thiserror::Error;

/// Result type alias for cqlbind operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for type resolution, binding and decoding
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Bind position does not exist
    #[error("Index {index} out of bounds (positions: {count})")]
    IndexOutOfBounds { index: usize, count: usize },

    /// Value is not compatible with the resolved schema type
    #[error("Invalid value type: {0}")]
    InvalidValueType(String),

    /// Map collection bound with an odd number of items
    #[error("Invalid item count: map collections need an even number of items, got {count}")]
    InvalidItemCount { count: usize },

    /// Malformed marshal class string
    #[error("Type parse error: {0}")]
    Parse(String),

    /// Name-based lookup matched nothing
    #[error("Name does not exist: {0}")]
    NameNotFound(String),

    /// Type nesting exceeded the configured depth
    #[error("Type nested deeper than {max_depth} levels")]
    TypeTooDeep { max_depth: usize },

    /// Truncated or malformed response bytes
    #[error("Decode error: {0}")]
    Decode(String),

    /// Schema refresh rejected
    #[error("Schema error: {0}")]
    Schema(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl Error {
    /// Create an invalid value type error
    pub fn invalid_value_type(msg: impl Into<String>) -> Self {
        Self::InvalidValueType(msg.into())
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Create a name not found error
    pub fn name_not_found(name: impl Into<String>) -> Self {
        Self::NameNotFound(name.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a schema error
    pub fn schema(msg: impl Into<String>) -> Self {
        Self::Schema(msg.into())
    }

    /// Create a configuration error
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::IndexOutOfBounds { .. }
            | Error::InvalidValueType(_)
            | Error::InvalidItemCount { .. }
            | Error::NameNotFound(_) => ErrorCategory::Bind,
            Error::Parse(_) | Error::TypeTooDeep { .. } => ErrorCategory::Type,
            Error::Decode(_) => ErrorCategory::Data,
            Error::Schema(_) => ErrorCategory::Schema,
            Error::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}

/// Error categories for grouping related errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Rejected bind calls
    Bind,
    /// Type resolution failures
    Type,
    /// Response data errors
    Data,
    /// Schema refresh failures
    Schema,
    /// Configuration errors
    Configuration,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Bind => "Bind",
            ErrorCategory::Type => "Type",
            ErrorCategory::Data => "Data",
            ErrorCategory::Schema => "Schema",
            ErrorCategory::Configuration => "Configuration",
        };
        write!(f, "{}", name)
    }
}

impl From<hex::FromHexError> for Error {
    fn from(err: hex::FromHexError) -> Self {
        Error::Parse(format!("invalid hex: {}", err))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Configuration(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::parse("expected ')'");
        assert!(matches!(err, Error::Parse(_)));
        assert_eq!(err.to_string(), "Type parse error: expected ')'");
    }

    #[test]
    fn test_error_categories() {
        assert_eq!(
            Error::IndexOutOfBounds { index: 3, count: 2 }.category(),
            ErrorCategory::Bind
        );
        assert_eq!(Error::TypeTooDeep { max_depth: 8 }.category(), ErrorCategory::Type);
        assert_eq!(Error::schema("test").category(), ErrorCategory::Schema);
    }

    #[test]
    fn test_hex_error_is_parse_error() {
        let err: Error = hex::decode("abc").unwrap_err().into();
        assert!(matches!(err, Error::Parse(_)));
    }
}
