//! SQL data access layer for tasks.
//!
//! All methods take a `&Connection` and are stateless. Ordering invariants
//! are not enforced here; see [`crate::allocator`] and [`crate::engine`].

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::errors::{Result, TaskError};
use crate::planner::{QueryPlan, SortOrder, TextPredicate};
use crate::types::{Task, TaskCreateParams, TaskPatch, TaskPriority, TaskStatus};

/// Generate a prefixed UUID v7 ID.
fn generate_id(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::now_v7())
}

/// Current UTC timestamp, RFC 3339 with milliseconds.
pub(crate) fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

/// Task repository for SQL CRUD operations.
pub struct TaskRepository;

impl TaskRepository {
    // ─────────────────────────────────────────────────────────────────────
    // Task CRUD
    // ─────────────────────────────────────────────────────────────────────

    /// Insert a live task at `position`.
    pub fn insert_task(
        conn: &Connection,
        owner_id: &str,
        params: &TaskCreateParams,
        position: i64,
    ) -> Result<Task> {
        let id = generate_id("task");
        let now = now_iso();

        let _ = conn.execute(
            "INSERT INTO tasks (id, owner_id, title, description, status, priority,
             is_deleted, position, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7, ?8, ?8)",
            params![
                id,
                owner_id,
                params.title,
                params.description,
                params.status,
                params.priority,
                position,
                now,
            ],
        )?;

        Self::get_task(conn, &id)?.ok_or_else(|| TaskError::task_not_found(&id))
    }

    /// Get a task by ID, live or soft-deleted.
    pub fn get_task(conn: &Connection, id: &str) -> Result<Option<Task>> {
        let task = conn
            .query_row("SELECT * FROM tasks WHERE id = ?1", params![id], task_from_row)
            .optional()?;
        Ok(task)
    }

    /// Apply a patch to a live task. Returns `None` if no live task matched.
    pub fn update_fields(conn: &Connection, id: &str, patch: &TaskPatch) -> Result<Option<Task>> {
        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(ref title) = patch.title {
            sets.push("title = ?");
            values.push(Box::new(title.clone()));
        }
        if let Some(ref description) = patch.description {
            sets.push("description = ?");
            values.push(Box::new(description.clone()));
        }
        if let Some(status) = patch.status {
            sets.push("status = ?");
            values.push(Box::new(status));
        }
        if let Some(priority) = patch.priority {
            sets.push("priority = ?");
            values.push(Box::new(priority));
        }

        sets.push("updated_at = ?");
        values.push(Box::new(now_iso()));
        values.push(Box::new(id.to_string()));

        let sql = format!(
            "UPDATE tasks SET {} WHERE id = ? AND is_deleted = 0",
            sets.join(", ")
        );
        let params_refs: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();
        let changed = conn.execute(&sql, params_refs.as_slice())?;

        if changed == 0 {
            return Ok(None);
        }
        Self::get_task(conn, id)
    }

    /// Set one live task's position. Peers are untouched.
    pub fn set_position(conn: &Connection, id: &str, position: i64) -> Result<Option<Task>> {
        let changed = conn.execute(
            "UPDATE tasks SET position = ?1, updated_at = ?2 WHERE id = ?3 AND is_deleted = 0",
            params![position, now_iso(), id],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Self::get_task(conn, id)
    }

    /// Soft-delete a live task. Returns false if it was absent or already deleted.
    pub fn mark_deleted(conn: &Connection, id: &str) -> Result<bool> {
        let changed = conn.execute(
            "UPDATE tasks SET is_deleted = 1, updated_at = ?1 WHERE id = ?2 AND is_deleted = 0",
            params![now_iso(), id],
        )?;
        Ok(changed > 0)
    }

    /// Soft-delete every live task of an owner.
    pub fn mark_all_deleted(conn: &Connection, owner_id: &str) -> Result<usize> {
        let changed = conn.execute(
            "UPDATE tasks SET is_deleted = 1, updated_at = ?1 WHERE owner_id = ?2 AND is_deleted = 0",
            params![now_iso(), owner_id],
        )?;
        Ok(changed)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Position queries
    // ─────────────────────────────────────────────────────────────────────

    /// Highest position among an owner's live tasks.
    pub fn max_live_position(conn: &Connection, owner_id: &str) -> Result<Option<i64>> {
        let max = conn.query_row(
            "SELECT MAX(position) FROM tasks WHERE owner_id = ?1 AND is_deleted = 0",
            params![owner_id],
            |row| row.get(0),
        )?;
        Ok(max)
    }

    /// Decrement every live position above `position` by one.
    pub fn shift_down_after(conn: &Connection, owner_id: &str, position: i64) -> Result<usize> {
        let changed = conn.execute(
            "UPDATE tasks SET position = position - 1, updated_at = ?1
             WHERE owner_id = ?2 AND is_deleted = 0 AND position > ?3",
            params![now_iso(), owner_id, position],
        )?;
        Ok(changed)
    }

    /// `(id, position)` of an owner's live tasks in list order.
    ///
    /// Ties on position are broken by creation time, then id.
    pub fn live_ordering(conn: &Connection, owner_id: &str) -> Result<Vec<(String, i64)>> {
        let mut stmt = conn.prepare(
            "SELECT id, position FROM tasks
             WHERE owner_id = ?1 AND is_deleted = 0
             ORDER BY position, created_at, id",
        )?;
        let rows = stmt
            .query_map(params![owner_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Planned queries
    // ─────────────────────────────────────────────────────────────────────

    /// Count records matching a plan, ignoring pagination.
    pub fn count(conn: &Connection, plan: &QueryPlan) -> Result<u64> {
        let (from_where, values) = render_predicate(plan);
        let sql = format!("SELECT COUNT(*) FROM {from_where}");
        let params_refs: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();
        let total: i64 = conn.query_row(&sql, params_refs.as_slice(), |row| row.get(0))?;
        Ok(u64::try_from(total).unwrap_or_default())
    }

    /// Fetch one page of records matching a plan.
    pub fn find(conn: &Connection, plan: &QueryPlan) -> Result<Vec<Task>> {
        let (from_where, mut values) = render_predicate(plan);
        let order_by = match plan.sort {
            SortOrder::Relevance => "bm25(tasks_fts), t.position, t.id",
            SortOrder::Position => "t.position, t.created_at, t.id",
        };
        let sql = format!("SELECT t.* FROM {from_where} ORDER BY {order_by} LIMIT ? OFFSET ?");

        values.push(Box::new(plan.row_limit()));
        values.push(Box::new(plan.offset()));
        let params_refs: Vec<&dyn ToSql> = values.iter().map(AsRef::as_ref).collect();

        let mut stmt = conn.prepare(&sql)?;
        let tasks = stmt
            .query_map(params_refs.as_slice(), task_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tasks)
    }
}

/// Render the `FROM ... WHERE ...` part of a plan plus its bound values.
fn render_predicate(plan: &QueryPlan) -> (String, Vec<Box<dyn ToSql>>) {
    let mut conditions: Vec<&str> = vec!["t.owner_id = ?", "t.is_deleted = 0"];
    let mut values: Vec<Box<dyn ToSql>> = vec![Box::new(plan.owner_id.clone())];
    let mut from = String::from("tasks t");

    if let Some(status) = plan.status {
        conditions.push("t.status = ?");
        values.push(Box::new(status));
    }
    if let Some(priority) = plan.priority {
        conditions.push("t.priority = ?");
        values.push(Box::new(priority));
    }
    match plan.text {
        Some(TextPredicate::Phrase(ref phrase)) => {
            from.push_str(" JOIN tasks_fts ON tasks_fts.task_id = t.id");
            conditions.push("tasks_fts MATCH ?");
            values.push(Box::new(phrase.clone()));
        }
        Some(TextPredicate::Pattern(ref pattern)) => {
            conditions.push("(regexp(?, t.title) OR regexp(?, t.description))");
            values.push(Box::new(pattern.clone()));
            values.push(Box::new(pattern.clone()));
        }
        None => {}
    }

    (format!("{from} WHERE {}", conditions.join(" AND ")), values)
}

// ─────────────────────────────────────────────────────────────────────────────
// Row conversion
// ─────────────────────────────────────────────────────────────────────────────

impl ToSql for TaskStatus {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_sql()))
    }
}

impl FromSql for TaskStatus {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: TaskError| FromSqlError::Other(Box::new(e)))
    }
}

impl ToSql for TaskPriority {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_sql()))
    }
}

impl FromSql for TaskPriority {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: TaskError| FromSqlError::Other(Box::new(e)))
    }
}

fn task_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get("id")?,
        title: row.get("title")?,
        description: row.get("description")?,
        status: row.get("status")?,
        priority: row.get("priority")?,
        owner_id: row.get("owner_id")?,
        is_deleted: row.get("is_deleted")?,
        position: row.get("position")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
