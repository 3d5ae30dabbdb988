//! Audit sink contract and the bundled `SQLite` audit log.
//!
//! The engine records one entry per successful mutation. Sinks may fail;
//! the engine logs and discards those failures.

use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::repository::now_iso;
use crate::sqlite::ConnectionPool;

/// Mutation recorded in the audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A task was created.
    CreateTask,
    /// A task's fields were updated.
    UpdateTask,
    /// A task was soft-deleted.
    DeleteTask,
    /// A task was moved to an explicit position.
    UpdateTaskPosition,
    /// An owner's positions were renumbered.
    RepairTaskPositions,
}

impl AuditAction {
    /// Action tag as stored.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateTask => "create_task",
            Self::UpdateTask => "update_task",
            Self::DeleteTask => "delete_task",
            Self::UpdateTaskPosition => "update_task_position",
            Self::RepairTaskPositions => "repair_task_positions",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver for audit events.
pub trait AuditSink: Send + Sync {
    /// Append one event.
    fn record(&self, actor_id: &str, action: AuditAction, details: &str) -> Result<()>;
}

/// Sink that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _actor_id: &str, _action: AuditAction, _details: &str) -> Result<()> {
        Ok(())
    }
}

/// A stored audit entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    /// Row id, increasing with insertion order.
    pub id: i64,
    /// Acting user.
    pub actor_id: String,
    /// Action tag (see [`AuditAction::as_str`]).
    pub action: String,
    /// Human-readable detail.
    pub details: String,
    /// Client address, `"unknown"` when not captured.
    pub ip_address: String,
    /// Client location, `"Unknown"` when not captured.
    pub location: String,
    /// Insertion timestamp (RFC 3339).
    pub created_at: String,
}

/// SQL access for the `audit_logs` table.
pub struct AuditLogRepo;

impl AuditLogRepo {
    /// Insert an entry. Returns its row id.
    pub fn insert(conn: &Connection, actor_id: &str, action: &str, details: &str) -> Result<i64> {
        let _ = conn.execute(
            "INSERT INTO audit_logs (actor_id, action, details, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![actor_id, action, details, now_iso()],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All entries in insertion order.
    pub fn list_all(conn: &Connection) -> Result<Vec<AuditEntry>> {
        let mut stmt = conn.prepare(
            "SELECT id, actor_id, action, details, ip_address, location, created_at
             FROM audit_logs ORDER BY id",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(AuditEntry {
                    id: row.get(0)?,
                    actor_id: row.get(1)?,
                    action: row.get(2)?,
                    details: row.get(3)?,
                    ip_address: row.get(4)?,
                    location: row.get(5)?,
                    created_at: row.get(6)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(entries)
    }
}

/// Audit sink writing to `audit_logs` through the shared pool.
#[derive(Clone)]
pub struct SqliteAuditLog {
    pool: ConnectionPool,
}

impl SqliteAuditLog {
    /// Create a sink over a migrated pool.
    pub fn new(pool: ConnectionPool) -> Self {
        Self { pool }
    }

    /// All stored entries, oldest first.
    pub fn entries(&self) -> Result<Vec<AuditEntry>> {
        let conn = self.pool.get()?;
        AuditLogRepo::list_all(&conn)
    }
}

impl AuditSink for SqliteAuditLog {
    fn record(&self, actor_id: &str, action: AuditAction, details: &str) -> Result<()> {
        let conn = self.pool.get()?;
        let _ = AuditLogRepo::insert(&conn, actor_id, action.as_str(), details)?;
        Ok(())
    }
}
