//! `/api` request handlers.
//!
//! Engine calls block on `SQLite`, so each one runs on the blocking pool.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use taskdeck_tasks::validation::{parse_integer, parse_priority, parse_status};
use taskdeck_tasks::{
    AuditEntry, Task, TaskCreateParams, TaskEngine, TaskError, TaskFilter, TaskPage, TaskPatch,
};

use crate::body::JsonBody;
use crate::errors::ApiError;
use crate::identity::Caller;
use crate::server::AppState;

/// Run an engine call on the blocking pool, tracked by the drain.
async fn blocking<T, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&TaskEngine) -> taskdeck_tasks::Result<T> + Send + 'static,
{
    let engine = Arc::clone(&state.engine);
    Ok(state.drain.run(move || f(engine.as_ref())).await??)
}

fn required<T>(field: &str, value: Option<T>) -> Result<T, ApiError> {
    value.ok_or_else(|| TaskError::InvalidArgument(format!("{field} is required")).into())
}

// ─────────────────────────────────────────────────────────────────────────────
// Request / response bodies
// ─────────────────────────────────────────────────────────────────────────────

/// `POST /api/tasks` body.
#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    /// Title.
    #[serde(default)]
    pub title: String,
    /// Description.
    pub description: Option<String>,
    /// Status, required.
    pub status: Option<String>,
    /// Priority, required.
    pub priority: Option<String>,
}

impl CreateTaskRequest {
    fn into_params(self) -> Result<TaskCreateParams, ApiError> {
        Ok(TaskCreateParams {
            title: self.title,
            description: self.description,
            status: required("status", parse_status(self.status.as_deref())?)?,
            priority: required("priority", parse_priority(self.priority.as_deref())?)?,
        })
    }
}

/// `PUT /api/tasks/{id}` body.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    /// New title.
    pub title: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New status.
    pub status: Option<String>,
    /// New priority.
    pub priority: Option<String>,
}

impl UpdateTaskRequest {
    fn into_patch(self) -> Result<TaskPatch, ApiError> {
        Ok(TaskPatch {
            title: self.title,
            description: self.description,
            status: parse_status(self.status.as_deref())?,
            priority: parse_priority(self.priority.as_deref())?,
        })
    }
}

/// `PATCH /api/tasks/{id}/position` body.
#[derive(Debug, Deserialize)]
pub struct PositionRequest {
    /// Target position.
    pub position: i64,
}

/// `GET /api/tasks` query string, kept raw so bad integers map to 400.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Status filter.
    pub status: Option<String>,
    /// Priority filter.
    pub priority: Option<String>,
    /// Search text.
    pub search: Option<String>,
    /// Page number.
    pub page: Option<String>,
    /// Page size.
    pub limit: Option<String>,
}

impl ListQuery {
    fn into_filter(self) -> Result<TaskFilter, ApiError> {
        Ok(TaskFilter {
            status: parse_status(self.status.as_deref())?,
            priority: parse_priority(self.priority.as_deref())?,
            search: self.search,
            page: parse_integer("page", self.page.as_deref())?,
            limit: parse_integer("limit", self.limit.as_deref())?,
        })
    }
}

/// Response carrying a message and the affected task.
#[derive(Debug, Serialize)]
pub struct TaskMessage<T> {
    /// Outcome message.
    pub message: &'static str,
    /// Affected task.
    pub task: T,
}

/// `DELETE /api/tasks/{id}` response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    /// Outcome message.
    pub message: &'static str,
    /// Position the task held.
    pub deleted_position: i64,
}

/// `POST /api/tasks/repair` response.
#[derive(Debug, Serialize)]
pub struct RepairResponse {
    /// Outcome message.
    pub message: String,
    /// Number of tasks renumbered.
    pub repaired: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/tasks
pub async fn create_task(
    State(state): State<AppState>,
    caller: Caller,
    JsonBody(body): JsonBody<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let params = body.into_params()?;
    let task = blocking(&state, move |engine| {
        engine.create_task(&caller.user_id, &params)
    })
    .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/tasks
pub async fn list_tasks(
    State(state): State<AppState>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<Json<TaskPage>, ApiError> {
    let filter = query.into_filter()?;
    let page = blocking(&state, move |engine| {
        engine.list_tasks(&caller.user_id, &filter)
    })
    .await?;
    Ok(Json(page))
}

/// PUT /api/tasks/{id}
pub async fn update_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(task_id): Path<String>,
    JsonBody(body): JsonBody<UpdateTaskRequest>,
) -> Result<Json<TaskMessage<Task>>, ApiError> {
    let patch = body.into_patch()?;
    let task = blocking(&state, move |engine| {
        engine.update_task(&task_id, &caller.user_id, &patch)
    })
    .await?;
    Ok(Json(TaskMessage {
        message: "Task updated",
        task,
    }))
}

/// DELETE /api/tasks/{id}
pub async fn delete_task(
    State(state): State<AppState>,
    caller: Caller,
    Path(task_id): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    let outcome = blocking(&state, move |engine| {
        engine.delete_task(&task_id, &caller.user_id)
    })
    .await?;
    Ok(Json(DeleteResponse {
        message: "Task deleted",
        deleted_position: outcome.deleted_position,
    }))
}

/// PATCH /api/tasks/{id}/position
pub async fn set_position(
    State(state): State<AppState>,
    caller: Caller,
    Path(task_id): Path<String>,
    JsonBody(body): JsonBody<PositionRequest>,
) -> Result<Json<TaskMessage<Task>>, ApiError> {
    let task = blocking(&state, move |engine| {
        engine.set_position(&task_id, &caller.user_id, body.position)
    })
    .await?;
    Ok(Json(TaskMessage {
        message: "Task position updated",
        task,
    }))
}

/// POST /api/tasks/repair
pub async fn repair_positions(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<RepairResponse>, ApiError> {
    let repaired = blocking(&state, move |engine| {
        engine.repair_positions(&caller.user_id)
    })
    .await?;
    Ok(Json(RepairResponse {
        message: format!("Repaired {repaired} task positions"),
        repaired,
    }))
}

/// GET /api/admin/logs
pub async fn list_audit_logs(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<AuditEntry>>, ApiError> {
    caller.require_admin()?;
    let audit_log = state.audit_log.clone();
    let entries = state.drain.run(move || audit_log.entries()).await??;
    Ok(Json(entries))
}

#[cfg(test)]
mod tests {
    use super::*;

    use taskdeck_tasks::{TaskPriority, TaskStatus};

    #[test]
    fn create_request_parses_fields() {
        let req: CreateTaskRequest =
            serde_json::from_str(r#"{"title": "a", "status": "pending", "priority": "low"}"#)
                .unwrap();
        let params = req.into_params().unwrap();
        assert_eq!(params.status, TaskStatus::Pending);
        assert_eq!(params.priority, TaskPriority::Low);
    }

    #[test]
    fn create_request_requires_status_and_priority() {
        let req: CreateTaskRequest =
            serde_json::from_str(r#"{"title": "a", "priority": "low"}"#).unwrap();
        let err = req.into_params().unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: status is required");

        let req: CreateTaskRequest =
            serde_json::from_str(r#"{"title": "a", "status": "pending"}"#).unwrap();
        assert!(req.into_params().is_err());
    }

    #[test]
    fn create_request_rejects_unknown_status() {
        let req: CreateTaskRequest =
            serde_json::from_str(r#"{"title": "a", "status": "done"}"#).unwrap();
        assert!(req.into_params().is_err());
    }

    #[test]
    fn list_query_parses_integers() {
        let query = ListQuery {
            page: Some("2".into()),
            limit: Some(" 5 ".into()),
            status: Some("in-progress".into()),
            ..Default::default()
        };
        let filter = query.into_filter().unwrap();
        assert_eq!(filter.page, Some(2));
        assert_eq!(filter.limit, Some(5));
        assert_eq!(filter.status, Some(TaskStatus::InProgress));
    }

    #[test]
    fn list_query_rejects_non_integer_page() {
        let query = ListQuery {
            page: Some("two".into()),
            ..Default::default()
        };
        assert!(query.into_filter().is_err());
    }

    #[test]
    fn update_request_empty_is_empty_patch() {
        let patch = UpdateTaskRequest::default().into_patch().unwrap();
        assert!(patch.is_empty());
    }
}
