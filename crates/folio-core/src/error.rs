//! Error types for folio.

use thiserror::Error;

/// Result type alias using folio's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for folio operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation failed (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid weight, duplicate field, missing search column)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Message safe to show an end user.
    ///
    /// Storage and internal details stay in operator logs; callers only ever
    /// see a generic description of what went wrong.
    pub fn user_message(&self) -> &'static str {
        match self {
            Error::Database(_) => "search unavailable",
            Error::NotFound(_) => "not found",
            Error::InvalidInput(_) | Error::Serialization(_) => "invalid request",
            Error::Config(_) => "internal error",
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(e: serde_yaml::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_config() {
        let err = Error::Config("missing search column".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: missing search column"
        );
    }

    #[test]
    fn test_error_display_invalid_input() {
        let err = Error::InvalidInput("unknown column".to_string());
        assert_eq!(err.to_string(), "Invalid input: unknown column");
    }

    #[test]
    fn test_error_display_not_found() {
        let err = Error::NotFound("books/42".to_string());
        assert_eq!(err.to_string(), "Not found: books/42");
    }

    #[test]
    fn test_user_message_hides_database_detail() {
        let err = Error::Database(sqlx::Error::Protocol(
            "relation \"books\" does not exist".to_string(),
        ));
        assert_eq!(err.user_message(), "search unavailable");
        assert!(!err.user_message().contains("books"));
    }

    #[test]
    fn test_user_message_for_input_errors() {
        assert_eq!(
            Error::InvalidInput("x".to_string()).user_message(),
            "invalid request"
        );
        assert_eq!(
            Error::Config("x".to_string()).user_message(),
            "internal error"
        );
    }

    #[test]
    fn test_from_serde_json_error() {
        let json_err = serde_json::from_str::<i32>("not a number").unwrap_err();
        let err: Error = json_err.into();
        match err {
            Error::Serialization(msg) => assert!(!msg.is_empty()),
            _ => panic!("Expected Serialization error"),
        }
    }

    #[test]
    fn test_from_serde_yaml_error() {
        let yaml_err = serde_yaml::from_str::<Vec<i32>>("{ not: [a list").unwrap_err();
        let err: Error = yaml_err.into();
        assert!(err.to_string().starts_with("Serialization error:"));
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}

        assert_send::<Error>();
        assert_sync::<Error>();
    }
}
