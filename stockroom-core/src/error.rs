//! Error types shared by the Stockroom crates
//!
//! Structured variants carry an [`ErrorContext`] that says where the failure
//! happened and what the operator can do about it. The auth layer wraps these
//! in its own error type; the CLI reports them through `anyhow`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{error, warn};
use uuid::Uuid;

pub type StockroomResult<T> = Result<T, StockroomError>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Where a failure happened and how to get past it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Correlates the log line with what the user saw
    pub error_id: Uuid,
    pub occurred_at: DateTime<Utc>,
    /// Subsystem, e.g. `file_store` or `config`
    pub component: String,
    pub operation: Option<String>,
    pub details: BTreeMap<String, String>,
    pub suggestions: Vec<String>,
}

impl ErrorContext {
    pub fn new(component: &str) -> Self {
        Self {
            error_id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            component: component.to_string(),
            operation: None,
            details: BTreeMap::new(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_operation(mut self, operation: &str) -> Self {
        self.operation = Some(operation.to_string());
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

impl std::fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.operation {
            Some(operation) => write!(f, "{}::{} [{}]", self.component, operation, self.error_id),
            None => write!(f, "{} [{}]", self.component, self.error_id),
        }
    }
}

#[derive(Error, Debug)]
pub enum StockroomError {
    /// A key-value store could not be read or written
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        /// Storage key involved, if the failure concerned one
        key: Option<String>,
        #[source]
        source: Option<BoxError>,
        context: ErrorContext,
    },

    #[error("Configuration error: {message}")]
    Config {
        message: String,
        #[source]
        source: Option<BoxError>,
        context: ErrorContext,
    },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<BoxError>,
        context: ErrorContext,
    },

    /// A configuration value is present but unusable
    #[error("Invalid value for {field}: {message}")]
    Validation {
        field: String,
        message: String,
        context: ErrorContext,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StockroomError {
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            StockroomError::Storage { context, .. }
            | StockroomError::Config { context, .. }
            | StockroomError::Network { context, .. }
            | StockroomError::Validation { context, .. } => Some(context),
            StockroomError::Io(_) | StockroomError::Serialization(_) => None,
        }
    }

    pub fn suggestions(&self) -> &[String] {
        self.context()
            .map(|c| c.suggestions.as_slice())
            .unwrap_or_default()
    }

    /// Might the same operation succeed if retried?
    pub fn is_transient(&self) -> bool {
        match self {
            StockroomError::Network { .. } => true,
            StockroomError::Io(e) => matches!(
                e.kind(),
                std::io::ErrorKind::Interrupted
                    | std::io::ErrorKind::TimedOut
                    | std::io::ErrorKind::WouldBlock
            ),
            _ => false,
        }
    }

    /// Log at a level matching how much the failure matters to the caller
    ///
    /// Storage and network failures degrade a session rather than end the
    /// program, so they log as warnings.
    pub fn log(&self) {
        let context = self.context().map(|c| c.to_string());

        match self {
            StockroomError::Storage { key, .. } => {
                warn!(context = ?context, key = ?key, error = %self, "Storage failure");
            }
            StockroomError::Network { .. } => {
                warn!(context = ?context, error = %self, "Backend unreachable");
            }
            StockroomError::Config { .. } | StockroomError::Validation { .. } => {
                error!(context = ?context, error = %self, "Configuration problem");
            }
            StockroomError::Io(_) | StockroomError::Serialization(_) => {
                error!(error = %self, "Unexpected failure");
            }
        }
    }
}

/// Storage failure for `key`
///
/// Optionally wraps a source error, and takes an explicit [`ErrorContext`]
/// when the caller knows the component and operation.
#[macro_export]
macro_rules! storage_error {
    ($msg:expr, $key:expr) => {
        $crate::StockroomError::Storage {
            message: $msg.to_string(),
            key: Some($key.to_string()),
            source: None,
            context: $crate::ErrorContext::new("storage"),
        }
    };
    ($msg:expr, $key:expr, $source:expr) => {
        $crate::storage_error!($msg, $key, $source, $crate::ErrorContext::new("storage"))
    };
    ($msg:expr, $key:expr, $source:expr, $context:expr) => {
        $crate::StockroomError::Storage {
            message: $msg.to_string(),
            key: Some($key.to_string()),
            source: Some(Box::new($source)),
            context: $context,
        }
    };
}

#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::StockroomError::Config {
            message: $msg.to_string(),
            source: None,
            context: $crate::ErrorContext::new("config")
                .with_suggestion("Run `stockroom config --init` to write a default configuration")
                .with_suggestion("Run `stockroom config --validate` after editing"),
        }
    };
}

/// Validation failure for the dotted config `field`
#[macro_export]
macro_rules! validation_error {
    ($field:expr, $msg:expr) => {
        $crate::StockroomError::Validation {
            field: $field.to_string(),
            message: $msg.to_string(),
            context: $crate::ErrorContext::new("config")
                .with_operation("validate")
                .with_suggestion(format!("Fix `{}` in the configuration file", $field)),
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_display_names_the_operation() {
        let context = ErrorContext::new("file_store").with_operation("set");
        let rendered = context.to_string();

        assert!(rendered.starts_with("file_store::set ["));
        assert!(rendered.contains(&context.error_id.to_string()));
    }

    #[test]
    fn only_network_and_interrupted_io_are_transient() {
        let timed_out = StockroomError::Io(std::io::Error::from(std::io::ErrorKind::TimedOut));
        let denied = StockroomError::Io(std::io::Error::from(
            std::io::ErrorKind::PermissionDenied,
        ));

        assert!(timed_out.is_transient());
        assert!(!denied.is_transient());
        assert!(!crate::config_error!("bad").is_transient());
    }
}
