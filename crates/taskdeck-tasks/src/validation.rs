//! Input validation run before engine operations.
//!
//! Each check returns [`TaskError::InvalidArgument`] on failure.

use crate::errors::{Result, TaskError};
use crate::types::{TaskCreateParams, TaskPatch, TaskPriority, TaskStatus};

/// Reject an empty or whitespace-only owner id.
pub fn validate_owner(owner_id: &str) -> Result<()> {
    if owner_id.trim().is_empty() {
        return Err(TaskError::InvalidArgument("owner id must not be empty".into()));
    }
    Ok(())
}

/// Reject an empty or whitespace-only title.
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(TaskError::InvalidArgument("title must not be empty".into()));
    }
    Ok(())
}

/// Reject negative positions.
pub fn validate_position(position: i64) -> Result<()> {
    if position < 0 {
        return Err(TaskError::InvalidArgument(format!(
            "position must be a non-negative integer (got {position})"
        )));
    }
    Ok(())
}

/// Validate create params.
pub fn validate_create(params: &TaskCreateParams) -> Result<()> {
    validate_title(&params.title)
}

/// Validate a patch. Only supplied fields are checked.
pub fn validate_patch(patch: &TaskPatch) -> Result<()> {
    if let Some(ref title) = patch.title {
        validate_title(title)?;
    }
    Ok(())
}

/// Parse an optional status string.
pub fn parse_status(raw: Option<&str>) -> Result<Option<TaskStatus>> {
    raw.map(str::parse).transpose()
}

/// Parse an optional priority string.
pub fn parse_priority(raw: Option<&str>) -> Result<Option<TaskPriority>> {
    raw.map(str::parse).transpose()
}

/// Coerce an optional integer parameter such as `page` or `limit`.
///
/// Range is not checked here; see [`crate::planner`].
pub fn parse_integer(name: &str, raw: Option<&str>) -> Result<Option<i64>> {
    let Some(raw) = raw else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse::<i64>()
        .map(Some)
        .map_err(|_| TaskError::InvalidArgument(format!("{name} must be an integer (got {raw:?})")))
}
