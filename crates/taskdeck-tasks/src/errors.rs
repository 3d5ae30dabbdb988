//! Task engine error types.
//!
//! `NotFound` and `Forbidden` are surfaced to callers verbatim. Storage
//! failures keep their source error and collapse to [`ErrorKind::Internal`].

use thiserror::Error;

/// Errors from task engine operations.
#[derive(Debug, Error)]
pub enum TaskError {
    /// Entity absent or soft-deleted.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Entity type (e.g., "Task").
        entity: &'static str,
        /// The ID that was looked up.
        id: String,
    },

    /// Entity exists but belongs to another owner.
    #[error("Unauthorized access to task {id}")]
    Forbidden {
        /// The ID that was accessed.
        id: String,
    },

    /// Input outside the accepted domain.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Reserved for duplicate-position detection.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Unexpected failure, usually wrapped with operation context.
    #[error("{0}")]
    Internal(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Connection pool error.
    #[error("Connection pool error: {0}")]
    Pool(#[from] r2d2::Error),

    /// Schema migration failed.
    #[error("Migration error: {message}")]
    Migration {
        /// Description of the failure.
        message: String,
    },
}

/// Caller-facing error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Absent or soft-deleted.
    NotFound,
    /// Owner mismatch.
    Forbidden,
    /// Bad input.
    InvalidArgument,
    /// Duplicate position (reserved).
    Conflict,
    /// Store unavailable or unexpected failure.
    Internal,
}

impl ErrorKind {
    /// Stable machine-readable code.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::Forbidden => "forbidden",
            Self::InvalidArgument => "invalid_argument",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

impl TaskError {
    /// Create a not-found error for a task.
    pub fn task_not_found(id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: "Task",
            id: id.into(),
        }
    }

    /// Create a forbidden error for a task.
    pub fn forbidden(id: impl Into<String>) -> Self {
        Self::Forbidden { id: id.into() }
    }

    /// Classify this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::Forbidden { .. } => ErrorKind::Forbidden,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Internal(_) | Self::Database(_) | Self::Pool(_) | Self::Migration { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Wrap unexpected failures with context. Caller-facing errors pass through.
    #[must_use]
    pub fn with_context(self, context: &str) -> Self {
        match self.kind() {
            ErrorKind::Internal => Self::Internal(format!("{context}: {self}")),
            _ => self,
        }
    }
}

/// Result type for task engine operations.
pub type Result<T> = std::result::Result<T, TaskError>;
