use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::redact_connection_string;

/// Boxed source error carried by [`SqlHelperError`].
pub type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Coarse classification of a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// The connection string could not be used, or the cached validity flag is unset.
    Connection,
    /// Ad-hoc SQL (query, XML query, insert, update) failed.
    Sql,
    /// A stored procedure, function or table-valued function failed.
    StoredProcedure,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorCategory::Connection => "Connection",
            ErrorCategory::Sql => "SQL",
            ErrorCategory::StoredProcedure => "Stored procedure",
        };
        f.write_str(label)
    }
}

/// The one error type returned by every helper operation.
///
/// Carries the message (operation prefix plus driver message), the connection string that was
/// in use when the failure happened, and the category of the failing operation.
#[derive(Error)]
#[error("{category} error: {message}")]
pub struct SqlHelperError {
    message: String,
    connection_string: String,
    category: ErrorCategory,
    #[source]
    source: Option<BoxedSource>,
}

impl SqlHelperError {
    #[must_use]
    pub fn new(
        category: ErrorCategory,
        message: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            message: message.into(),
            connection_string: connection_string.into(),
            category,
            source: None,
        }
    }

    /// Wrap a driver (or other lower-level) error raised while running `operation`.
    ///
    /// The message becomes `"<operation> failed: <source message>"`.
    #[must_use]
    pub fn wrap<E>(
        category: ErrorCategory,
        operation: &str,
        connection_string: &str,
        source: E,
    ) -> Self
    where
        E: Into<BoxedSource>,
    {
        let source = source.into();
        Self {
            message: format!("{operation} failed: {source}"),
            connection_string: connection_string.to_owned(),
            category,
            source: Some(source),
        }
    }

    pub(crate) fn connection(message: impl Into<String>, connection_string: &str) -> Self {
        Self::new(ErrorCategory::Connection, message, connection_string)
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The connection string in use at failure time (password included).
    #[must_use]
    pub fn connection_string(&self) -> &str {
        &self.connection_string
    }

    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        self.category
    }
}

/// Name, category and connection string of the operation in flight, used to wrap failures.
#[derive(Debug, Clone, Copy)]
pub(crate) struct OperationContext<'a> {
    pub operation: &'static str,
    pub category: ErrorCategory,
    pub connection_string: &'a str,
}

impl<'a> OperationContext<'a> {
    pub(crate) fn new(
        operation: &'static str,
        category: ErrorCategory,
        connection_string: &'a str,
    ) -> Self {
        Self {
            operation,
            category,
            connection_string,
        }
    }

    pub(crate) fn fail<E: Into<BoxedSource>>(&self, source: E) -> SqlHelperError {
        let err = SqlHelperError::wrap(
            self.category,
            self.operation,
            self.connection_string,
            source,
        );
        tracing::debug!(operation = self.operation, error = %err, "operation failed");
        err
    }

    /// A failure detected by the helper itself, before or without a driver error.
    pub(crate) fn reject(&self, reason: &str) -> SqlHelperError {
        SqlHelperError::new(
            self.category,
            format!("{} failed: {reason}", self.operation),
            self.connection_string,
        )
    }
}

impl fmt::Debug for SqlHelperError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlHelperError")
            .field("category", &self.category)
            .field("message", &self.message)
            .field(
                "connection_string",
                &redact_connection_string(&self.connection_string),
            )
            .field("source", &self.source)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONN: &str = "Data Source=db01;Initial Catalog=sales;Integrated Security=False;User ID=app;Password=hunter2;TrustServerCertificate=True";

    #[test]
    fn wrap_prefixes_operation_and_keeps_source_message() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = SqlHelperError::wrap(ErrorCategory::Sql, "RunQuery", CONN, io);
        assert_eq!(err.message(), "RunQuery failed: refused");
        assert_eq!(err.connection_string(), CONN);
        assert_eq!(err.category(), ErrorCategory::Sql);
        assert!(std::error::Error::source(&err).is_some());
        assert_eq!(err.to_string(), "SQL error: RunQuery failed: refused");
    }

    #[test]
    fn debug_output_hides_password() {
        let err = SqlHelperError::connection("probe failed", CONN);
        let rendered = format!("{err:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(rendered.contains("Password=***"));
        assert_eq!(err.connection_string(), CONN);
    }
}
