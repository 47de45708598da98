use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::observability::Stage;

/// Result type for reconciliation operations
pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Errors raised while reconciling a tenant.
///
/// Tenant-level callers receive these directly from `upsert_from_config`.
/// Stage-level code never lets them escape: it converts them into
/// [`ItemError`] records and moves on to the next item.
#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("{message}")]
    Validation { message: String, errors: Value },

    #[error("Invalid item: {0}")]
    InvalidItem(String),

    #[error("Unresolved dependency: {0}")]
    Dependency(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Persistence failure during {operation}: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ReconcileError {
    pub fn validation(message: impl Into<String>, errors: Value) -> Self {
        Self::Validation {
            message: message.into(),
            errors,
        }
    }

    pub fn invalid_item(msg: impl Into<String>) -> Self {
        Self::InvalidItem(msg.into())
    }

    pub fn dependency(msg: impl Into<String>) -> Self {
        Self::Dependency(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Wrap a gateway failure, tagging the operation that produced it.
    pub fn persistence<E>(operation: &'static str, source: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Persistence {
            operation,
            source: source.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::InvalidItem(_) | Self::Conflict(_) => ErrorKind::Item,
            Self::Dependency(_) => ErrorKind::Dependency,
            Self::Persistence { .. } | Self::Serialization(_) | Self::Internal(_) => {
                ErrorKind::Persistence
            }
        }
    }

    /// Field-level validation errors, if this is a validation failure.
    pub fn field_errors(&self) -> Option<&Value> {
        match self {
            Self::Validation { errors, .. } => Some(errors),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ReconcileError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<bcrypt::BcryptError> for ReconcileError {
    fn from(err: bcrypt::BcryptError) -> Self {
        Self::Internal(format!("password hashing failed: {err}"))
    }
}

/// Error taxonomy, with Feathers-ish status codes and class names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    /// Malformed base tenant fields. Fatal to the tenant.
    Validation,
    /// Malformed or unresolvable stage item. Recorded and skipped.
    Item,
    /// Upstream organization/business unit could not be resolved.
    Dependency,
    /// Gateway failure.
    Persistence,
}

impl ErrorKind {
    pub fn status_code(&self) -> u16 {
        match self {
            ErrorKind::Validation => 422,
            ErrorKind::Item => 400,
            ErrorKind::Dependency => 424,
            ErrorKind::Persistence => 500,
        }
    }

    pub fn class_name(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Item => "item",
            ErrorKind::Dependency => "dependency",
            ErrorKind::Persistence => "persistence",
        }
    }
}

/// A non-fatal failure collected while processing one stage item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemError {
    pub stage: Stage,
    /// Identity of the failing item (route key, menu key, component
    /// identity, user email), or its position when it has none.
    pub item: String,
    pub kind: ErrorKind,
    pub message: String,
}

impl ItemError {
    pub fn new(
        stage: Stage,
        item: impl Into<String>,
        kind: ErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            stage,
            item: item.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn from_error(stage: Stage, item: impl Into<String>, err: &ReconcileError) -> Self {
        Self::new(stage, item, err.kind(), err.to_string())
    }

    pub fn invalid(stage: Stage, item: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(stage, item, ErrorKind::Item, message)
    }
}

impl std::fmt::Display for ItemError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.stage.as_str(),
            self.item,
            self.kind.class_name(),
            self.message
        )
    }
}
