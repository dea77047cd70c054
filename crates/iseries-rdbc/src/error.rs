//! Error types for iseries-rdbc
//!
//! Provides granular error classification for retry handling:
//! - Retriable errors (communication, connection, SQL execution, timeout)
//! - Non-retriable errors (arguments, type conversion, configuration)
//! - Terminal errors (retry budget exhausted)

use std::fmt;
use thiserror::Error;

/// Result type for iseries-rdbc operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Invalid caller input (empty statement text)
    Argument,
    /// Column value could not be converted (not retriable)
    TypeConversion,
    /// Communication link failure (retriable)
    Communication,
    /// Connection could not be created or opened (retriable)
    Connection,
    /// Statement execution failed on the server (retriable)
    Query,
    /// Timeout errors (retriable)
    Timeout,
    /// Retry budget exhausted
    RetryExhausted,
    /// Configuration error
    Configuration,
    /// Unknown/other errors
    Other,
}

impl ErrorCategory {
    /// Whether errors in this category are retried by the resilient service
    #[inline]
    pub const fn is_retriable(self) -> bool {
        matches!(
            self,
            Self::Communication | Self::Connection | Self::Query | Self::Timeout
        )
    }
}

/// Structured diagnostic fields reported by the remote server.
///
/// `message_code` and `message_details` are only present for SQL and
/// communication errors; every other error carries just the message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostics {
    /// First-level message text
    pub message: String,
    /// Server message code (e.g. SQL0204)
    pub message_code: Option<i32>,
    /// Second-level message text
    pub message_details: Option<String>,
}

impl fmt::Display for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Message={}", self.message)?;
        if let Some(code) = self.message_code {
            write!(f, ", MessageCode={code}")?;
        }
        if let Some(details) = &self.message_details {
            write!(f, ", MessageDetails={details}")?;
        }
        Ok(())
    }
}

/// Main error type for iseries-rdbc
#[derive(Error, Debug)]
#[allow(missing_docs)]
pub enum Error {
    /// Invalid argument (empty statement text)
    #[error("invalid argument `{name}`: {message}")]
    Argument { name: String, message: String },

    /// Type conversion failed while reading a column
    #[error("type conversion error: {message}")]
    TypeConversion { message: String },

    /// Column not present in the row
    #[error("column not found: {column}")]
    ColumnNotFound { column: String },

    /// Communication link to the server failed
    #[error("communication error: {message}")]
    Communication {
        message: String,
        message_code: Option<i32>,
        message_details: Option<String>,
    },

    /// Connection failed
    #[error("connection error: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// SQL statement failed on the server
    #[error("sql error: {message}")]
    Sql {
        message: String,
        message_code: Option<i32>,
        message_details: Option<String>,
        sql: Option<String>,
    },

    /// Operation timed out
    #[error("timeout: {message}")]
    Timeout { message: String },

    /// All retry attempts failed
    #[error("retry exhausted after {attempts} attempts: {last}")]
    RetryExhausted {
        attempts: u32,
        #[source]
        last: Box<Error>,
    },

    /// Configuration error
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Connection manager was disposed
    #[error("connection manager has been disposed")]
    Disposed,

    /// Operation was cancelled while waiting to retry
    #[error("operation cancelled")]
    Cancelled,

    /// Internal error
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl Error {
    /// Get the error category
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Argument { .. } => ErrorCategory::Argument,
            Self::TypeConversion { .. } | Self::ColumnNotFound { .. } => {
                ErrorCategory::TypeConversion
            }
            Self::Communication { .. } => ErrorCategory::Communication,
            Self::Connection { .. } => ErrorCategory::Connection,
            Self::Sql { .. } => ErrorCategory::Query,
            Self::Timeout { .. } => ErrorCategory::Timeout,
            Self::RetryExhausted { .. } => ErrorCategory::RetryExhausted,
            Self::Configuration { .. } => ErrorCategory::Configuration,
            Self::Disposed | Self::Cancelled | Self::Internal { .. } => ErrorCategory::Other,
        }
    }

    /// Whether this error is retriable
    #[inline]
    pub fn is_retriable(&self) -> bool {
        self.category().is_retriable()
    }

    /// Structured fields for logging.
    ///
    /// SQL and communication errors expose their code and details; all other
    /// errors report their display text as the message.
    pub fn diagnostics(&self) -> Diagnostics {
        match self {
            Self::Communication {
                message,
                message_code,
                message_details,
            }
            | Self::Sql {
                message,
                message_code,
                message_details,
                ..
            } => Diagnostics {
                message: message.clone(),
                message_code: *message_code,
                message_details: message_details.clone(),
            },
            Self::RetryExhausted { last, .. } => last.diagnostics(),
            other => Diagnostics {
                message: other.to_string(),
                message_code: None,
                message_details: None,
            },
        }
    }

    /// Short name of the error kind, used in log lines
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Argument { .. } => "ArgumentError",
            Self::TypeConversion { .. } => "TypeConversionError",
            Self::ColumnNotFound { .. } => "ColumnNotFoundError",
            Self::Communication { .. } => "CommunicationError",
            Self::Connection { .. } => "ConnectionError",
            Self::Sql { .. } => "SqlError",
            Self::Timeout { .. } => "TimeoutError",
            Self::RetryExhausted { .. } => "RetryExhaustedError",
            Self::Configuration { .. } => "ConfigurationError",
            Self::Disposed => "DisposedError",
            Self::Cancelled => "CancelledError",
            Self::Internal { .. } => "InternalError",
        }
    }

    /// Create an argument error
    pub fn argument(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Argument {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Create a type conversion error
    pub fn type_conversion(message: impl Into<String>) -> Self {
        Self::TypeConversion {
            message: message.into(),
        }
    }

    /// Create a communication error with the server's diagnostic fields
    pub fn communication(
        message: impl Into<String>,
        message_code: Option<i32>,
        message_details: Option<String>,
    ) -> Self {
        Self::Communication {
            message: message.into(),
            message_code,
            message_details,
        }
    }

    /// Create a connection error
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error with source
    pub fn connection_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a SQL error
    pub fn sql(message: impl Into<String>, message_code: Option<i32>) -> Self {
        Self::Sql {
            message: message.into(),
            message_code,
            message_details: None,
            sql: None,
        }
    }

    /// Attach the statement text to a SQL error; other variants are unchanged
    pub fn with_sql(self, statement: impl Into<String>) -> Self {
        match self {
            Self::Sql {
                message,
                message_code,
                message_details,
                ..
            } => Self::Sql {
                message,
                message_code,
                message_details,
                sql: Some(statement.into()),
            },
            other => other,
        }
    }

    /// Create a timeout error
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument => write!(f, "argument"),
            Self::TypeConversion => write!(f, "type_conversion"),
            Self::Communication => write!(f, "communication"),
            Self::Connection => write!(f, "connection"),
            Self::Query => write!(f, "query"),
            Self::Timeout => write!(f, "timeout"),
            Self::RetryExhausted => write!(f, "retry_exhausted"),
            Self::Configuration => write!(f, "configuration"),
            Self::Other => write!(f, "other"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_category_retriable() {
        assert!(ErrorCategory::Communication.is_retriable());
        assert!(ErrorCategory::Connection.is_retriable());
        assert!(ErrorCategory::Query.is_retriable());
        assert!(ErrorCategory::Timeout.is_retriable());

        assert!(!ErrorCategory::Argument.is_retriable());
        assert!(!ErrorCategory::TypeConversion.is_retriable());
        assert!(!ErrorCategory::RetryExhausted.is_retriable());
        assert!(!ErrorCategory::Configuration.is_retriable());
    }

    #[test]
    fn test_column_not_found_is_conversion_class() {
        let err = Error::ColumnNotFound {
            column: "CUSNUM".into(),
        };
        assert_eq!(err.category(), ErrorCategory::TypeConversion);
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_diagnostics_for_communication_error() {
        let err = Error::communication("link down", Some(33), Some("host ended job".into()));
        let diag = err.diagnostics();

        assert_eq!(diag.message, "link down");
        assert_eq!(diag.message_code, Some(33));
        assert_eq!(diag.message_details.as_deref(), Some("host ended job"));
        assert_eq!(
            diag.to_string(),
            "Message=link down, MessageCode=33, MessageDetails=host ended job"
        );
    }

    #[test]
    fn test_diagnostics_for_generic_error() {
        let diag = Error::timeout("30s elapsed").diagnostics();
        assert_eq!(diag.message, "timeout: 30s elapsed");
        assert_eq!(diag.message_code, None);
        assert_eq!(diag.to_string(), "Message=timeout: 30s elapsed");
    }

    #[test]
    fn test_retry_exhausted_keeps_last_error() {
        let err = Error::RetryExhausted {
            attempts: 5,
            last: Box::new(Error::sql("row lock timeout", Some(-913))),
        };

        assert_eq!(err.category(), ErrorCategory::RetryExhausted);
        assert_eq!(err.diagnostics().message_code, Some(-913));
        assert!(err.to_string().contains("5 attempts"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_with_sql_only_touches_sql_errors() {
        let err = Error::sql("bad column", Some(-206)).with_sql("SELECT X FROM T");
        assert!(matches!(err, Error::Sql { sql: Some(ref s), .. } if s == "SELECT X FROM T"));

        let err = Error::timeout("slow").with_sql("SELECT 1");
        assert!(matches!(err, Error::Timeout { .. }));
    }
}
