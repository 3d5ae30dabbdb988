//! Core types for the task engine.
//!
//! All serializable types use `camelCase` on the wire.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::TaskError;

/// Page used when a list request omits `page`.
pub const DEFAULT_PAGE: i64 = 1;

/// Page size used when a list request omits `limit`.
pub const DEFAULT_LIMIT: i64 = 10;

// ─────────────────────────────────────────────────────────────────────────────
// Enums
// ─────────────────────────────────────────────────────────────────────────────

/// Task status in the workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    /// Not started.
    Pending,
    /// Currently being worked on.
    InProgress,
    /// Done.
    Completed,
}

impl TaskStatus {
    /// All statuses, in workflow order.
    pub const ALL: [Self; 3] = [Self::Pending, Self::InProgress, Self::Completed];

    /// SQL string representation (matches `SQLite` CHECK constraint values).
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in-progress",
            Self::Completed => "completed",
        }
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for TaskStatus {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_sql() == s)
            .ok_or_else(|| {
                TaskError::InvalidArgument(format!(
                    "status must be one of pending, in-progress, completed (got {s:?})"
                ))
            })
    }
}

/// Task priority level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    /// Low priority.
    Low,
    /// Default priority.
    Medium,
    /// Elevated priority.
    High,
}

impl TaskPriority {
    /// All priorities, lowest first.
    pub const ALL: [Self; 3] = [Self::Low, Self::Medium, Self::High];

    /// SQL string representation.
    #[must_use]
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_sql())
    }
}

impl FromStr for TaskPriority {
    type Err = TaskError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|priority| priority.as_sql() == s)
            .ok_or_else(|| {
                TaskError::InvalidArgument(format!(
                    "priority must be one of low, medium, high (got {s:?})"
                ))
            })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Records
// ─────────────────────────────────────────────────────────────────────────────

/// A task record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Opaque unique ID (`task-<uuid v7>`).
    pub id: String,
    /// Non-empty title.
    pub title: String,
    /// Optional free-text description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Workflow status.
    pub status: TaskStatus,
    /// Priority.
    pub priority: TaskPriority,
    /// Owning user. Opaque; the store does not track user lifecycle.
    pub owner_id: String,
    /// Soft-delete marker.
    pub is_deleted: bool,
    /// Zero-based rank among the owner's live tasks.
    pub position: i64,
    /// Creation timestamp (RFC 3339).
    pub created_at: String,
    /// Last modification timestamp (RFC 3339).
    pub updated_at: String,
}

/// Parameters for creating a task. Position is always allocated by the engine.
#[derive(Debug, Clone)]
pub struct TaskCreateParams {
    /// Title (must be non-empty).
    pub title: String,
    /// Optional description.
    pub description: Option<String>,
    /// Initial status.
    pub status: TaskStatus,
    /// Initial priority.
    pub priority: TaskPriority,
}

impl TaskCreateParams {
    /// Params with the given title, `pending` status and `medium` priority.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            status: TaskStatus::Pending,
            priority: TaskPriority::Medium,
        }
    }
}

/// Partial update. `None` fields are left untouched; position is never patched.
#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New status.
    pub status: Option<TaskStatus>,
    /// New priority.
    pub priority: Option<TaskPriority>,
}

impl TaskPatch {
    /// Whether the patch changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.status.is_none()
            && self.priority.is_none()
    }
}

/// Filter for listing an owner's live tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Exact status match.
    pub status: Option<TaskStatus>,
    /// Exact priority match.
    pub priority: Option<TaskPriority>,
    /// Free-text search. Whitespace selects phrase search.
    pub search: Option<String>,
    /// 1-based page (default [`DEFAULT_PAGE`]).
    pub page: Option<i64>,
    /// Page size (default [`DEFAULT_LIMIT`]).
    pub limit: Option<i64>,
}

/// Pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    /// Count of all matching records before pagination.
    pub total: u64,
    /// Requested page.
    pub page: i64,
    /// Requested page size.
    pub limit: i64,
    /// `ceil(total / limit)`, or 0 when `limit` is not positive.
    pub pages: u64,
}

/// One page of tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPage {
    /// Records on this page.
    pub data: Vec<Task>,
    /// Pagination metadata.
    pub meta: PageMeta,
}

/// Result of soft-deleting a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteOutcome {
    /// Position the task held when it was deleted.
    pub deleted_position: i64,
}
