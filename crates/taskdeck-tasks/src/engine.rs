//! High-level transactional `TaskEngine` API.
//!
//! Composes repository, allocator and planner steps into owner-scoped
//! operations. Every mutation runs in a single `BEGIN IMMEDIATE` transaction
//! and emits one audit event after it commits.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use std::time::Duration;

use rusqlite::{Transaction, TransactionBehavior};
use tracing::{debug, instrument, warn};

use crate::allocator::PositionAllocator;
use crate::audit::{AuditAction, AuditSink};
use crate::errors::{Result, TaskError};
use crate::planner::QueryPlan;
use crate::repository::TaskRepository;
use crate::sqlite::{ConnectionPool, PooledConnection};
use crate::types::{DeleteOutcome, Task, TaskCreateParams, TaskFilter, TaskPage, TaskPatch};
use crate::validation;

/// Owner-scoped task engine over a connection pool and an audit sink.
///
/// INVARIANT: writes for one owner are serialized by an in-process mutex
/// (`with_owner_write_lock`), so an owner's live positions are `0..k` after
/// every create and delete. Different owners never contend on these locks.
pub struct TaskEngine {
    pool: ConnectionPool,
    audit: Arc<dyn AuditSink>,
    owner_write_locks: Mutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl TaskEngine {
    const SQLITE_BUSY_MAX_RETRIES: u32 = 32;

    /// Create an engine. The pool must already be migrated.
    pub fn new(pool: ConnectionPool, audit: Arc<dyn AuditSink>) -> Self {
        Self {
            pool,
            audit,
            owner_write_locks: Mutex::new(HashMap::new()),
        }
    }

    /// The underlying connection pool.
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    fn acquire_owner_write_lock(&self, owner_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self
            .owner_write_locks
            .lock()
            .map_err(|_| TaskError::Internal("owner lock map poisoned".into()))?;

        if locks.len() > 128 {
            locks.retain(|_, weak| weak.strong_count() > 0);
        }

        if let Some(existing) = locks.get(owner_id).and_then(Weak::upgrade) {
            return Ok(existing);
        }

        let lock = Arc::new(Mutex::new(()));
        let _ = locks.insert(owner_id.to_string(), Arc::downgrade(&lock));
        Ok(lock)
    }

    fn with_owner_write_lock<T>(&self, owner_id: &str, f: impl FnMut() -> Result<T>) -> Result<T> {
        let owner_lock = self.acquire_owner_write_lock(owner_id)?;
        let _guard = owner_lock
            .lock()
            .map_err(|_| TaskError::Internal("owner write lock poisoned".into()))?;
        self.retry_on_sqlite_busy(f)
    }

    /// Retry an operation on `SQLite` BUSY/LOCKED with linear backoff + jitter.
    #[allow(clippy::unused_self)]
    fn retry_on_sqlite_busy<T>(&self, mut f: impl FnMut() -> Result<T>) -> Result<T> {
        let mut attempts = 0;

        loop {
            match f() {
                Ok(value) => return Ok(value),
                Err(err)
                    if Self::is_sqlite_busy_or_locked(&err)
                        && attempts < Self::SQLITE_BUSY_MAX_RETRIES =>
                {
                    attempts += 1;
                    let base_ms = u64::from(attempts).saturating_mul(10).min(500);
                    let jitter_range = base_ms / 4;
                    let jitter = if jitter_range > 0 {
                        rand::random::<u64>() % (jitter_range * 2 + 1)
                    } else {
                        0
                    };
                    let backoff_ms = base_ms.saturating_sub(jitter_range) + jitter;
                    debug!(attempts, backoff_ms, "sqlite busy, retrying");
                    std::thread::sleep(Duration::from_millis(backoff_ms));
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn is_sqlite_busy_or_locked(err: &TaskError) -> bool {
        match err {
            TaskError::Database(rusqlite::Error::SqliteFailure(code, _)) => matches!(
                code.code,
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
            ),
            _ => false,
        }
    }

    fn conn(&self) -> Result<PooledConnection> {
        Ok(self.pool.get()?)
    }

    /// Run `f` inside an immediate write transaction.
    fn write<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let conn = self.conn()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    /// Hand an event to the audit sink. Failures are logged and dropped.
    fn record(&self, actor_id: &str, action: AuditAction, details: &str) {
        if let Err(error) = self.audit.record(actor_id, action, details) {
            warn!(actor_id, %action, %error, "failed to record audit event");
        }
    }

    // ─────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────

    /// Create a task at the end of the owner's list.
    #[instrument(skip(self, params))]
    pub fn create_task(&self, owner_id: &str, params: &TaskCreateParams) -> Result<Task> {
        validation::validate_owner(owner_id)?;
        validation::validate_create(params)?;

        let task = self.with_owner_write_lock(owner_id, || {
            self.write(|tx| {
                let position = PositionAllocator::next_position(tx, owner_id)?;
                TaskRepository::insert_task(tx, owner_id, params, position)
            })
        })?;

        debug!(task_id = %task.id, position = task.position, "task created");
        self.record(
            owner_id,
            AuditAction::CreateTask,
            &format!("Task {} created at position {}", task.id, task.position),
        );
        Ok(task)
    }

    /// Update title, description, status or priority. Position is unaffected.
    #[instrument(skip(self, patch))]
    pub fn update_task(&self, task_id: &str, owner_id: &str, patch: &TaskPatch) -> Result<Task> {
        validation::validate_patch(patch)?;

        let task = self
            .with_owner_write_lock(owner_id, || {
                self.write(|tx| {
                    let _ = PositionAllocator::load_owned(tx, task_id, owner_id)?;
                    TaskRepository::update_fields(tx, task_id, patch)?
                        .ok_or_else(|| TaskError::task_not_found(task_id))
                })
            })
            .map_err(|e| e.with_context("Failed to update task"))?;

        self.record(owner_id, AuditAction::UpdateTask, &format!("Task {task_id} updated"));
        Ok(task)
    }

    /// Soft-delete a task and close the gap it leaves.
    #[instrument(skip(self))]
    pub fn delete_task(&self, task_id: &str, owner_id: &str) -> Result<DeleteOutcome> {
        let deleted_position = self.with_owner_write_lock(owner_id, || {
            self.write(|tx| {
                let task = PositionAllocator::load_owned(tx, task_id, owner_id)?;
                if !TaskRepository::mark_deleted(tx, task_id)? {
                    return Err(TaskError::task_not_found(task_id));
                }
                let _ = PositionAllocator::compact_after_delete(tx, owner_id, task.position)?;
                Ok(task.position)
            })
        })?;

        self.record(
            owner_id,
            AuditAction::DeleteTask,
            &format!("Task {task_id} deleted from position {deleted_position}"),
        );
        Ok(DeleteOutcome { deleted_position })
    }

    /// Move a task to an explicit position without shifting its peers.
    ///
    /// The owner's list may hold gaps or duplicates afterwards;
    /// [`Self::repair_positions`] renumbers it.
    #[instrument(skip(self))]
    pub fn set_position(&self, task_id: &str, owner_id: &str, position: i64) -> Result<Task> {
        validation::validate_position(position)?;

        let task = self.with_owner_write_lock(owner_id, || {
            self.write(|tx| {
                let _ = PositionAllocator::load_owned(tx, task_id, owner_id)?;
                PositionAllocator::reposition(tx, task_id, position)
            })
        })?;

        self.record(
            owner_id,
            AuditAction::UpdateTaskPosition,
            &format!("Task {task_id} position updated to {position}"),
        );
        Ok(task)
    }

    /// Soft-delete every live task of an owner. Returns how many were deleted.
    #[instrument(skip(self))]
    pub fn delete_all_for_owner(&self, owner_id: &str) -> Result<usize> {
        let deleted = self.with_owner_write_lock(owner_id, || {
            self.write(|tx| TaskRepository::mark_all_deleted(tx, owner_id))
        })?;
        debug!(deleted, "owner tasks soft-deleted");
        Ok(deleted)
    }

    /// Renumber an owner's live tasks to `0..k`. Returns how many moved.
    #[instrument(skip(self))]
    pub fn repair_positions(&self, owner_id: &str) -> Result<usize> {
        let moved = self.with_owner_write_lock(owner_id, || {
            self.write(|tx| PositionAllocator::repair(tx, owner_id))
        })?;

        if moved > 0 {
            self.record(
                owner_id,
                AuditAction::RepairTaskPositions,
                &format!("Repaired {moved} task positions"),
            );
        }
        Ok(moved)
    }

    // ─────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────

    /// List one page of the owner's live tasks.
    #[instrument(skip(self, filter))]
    pub fn list_tasks(&self, owner_id: &str, filter: &TaskFilter) -> Result<TaskPage> {
        let plan = QueryPlan::build(owner_id, filter)?;
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let total = TaskRepository::count(&tx, &plan)?;
        let data = TaskRepository::find(&tx, &plan)?;
        tx.commit()?;

        debug!(total, returned = data.len(), sort = ?plan.sort, "tasks listed");
        Ok(TaskPage {
            data,
            meta: plan.meta(total),
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(unused_results)]
mod tests {
    use super::*;
    use crate::allocator::is_dense;
    use crate::audit::NoopAuditSink;
    use crate::errors::ErrorKind;
    use crate::sqlite::{ConnectionConfig, new_file, new_in_memory, run_migrations};
    use crate::types::{TaskPriority, TaskStatus};
    use proptest::prelude::*;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<(String, AuditAction, String)>>,
    }

    impl RecordingSink {
        fn events(&self) -> Vec<(String, AuditAction, String)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl AuditSink for RecordingSink {
        fn record(&self, actor_id: &str, action: AuditAction, details: &str) -> Result<()> {
            self.events
                .lock()
                .unwrap()
                .push((actor_id.to_string(), action, details.to_string()));
            Ok(())
        }
    }

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn record(&self, _: &str, _: AuditAction, _: &str) -> Result<()> {
            Err(TaskError::Internal("audit store offline".into()))
        }
    }

    fn memory_pool() -> ConnectionPool {
        let pool = new_in_memory(&ConnectionConfig {
            pool_size: 1,
            ..Default::default()
        })
        .unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();
        pool
    }

    fn setup_engine() -> (TaskEngine, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let engine = TaskEngine::new(memory_pool(), sink.clone());
        (engine, sink)
    }

    fn create(engine: &TaskEngine, owner: &str, title: &str) -> Task {
        engine
            .create_task(owner, &TaskCreateParams::new(title))
            .unwrap()
    }

    fn live_positions(engine: &TaskEngine, owner: &str) -> Vec<i64> {
        let conn = engine.pool().get().unwrap();
        TaskRepository::live_ordering(&conn, owner)
            .unwrap()
            .into_iter()
            .map(|(_, p)| p)
            .collect()
    }

    fn stored(engine: &TaskEngine, id: &str) -> Task {
        let conn = engine.pool().get().unwrap();
        TaskRepository::get_task(&conn, id).unwrap().unwrap()
    }

    // ── create ──────────────────────────────────────────────────────

    #[test]
    fn create_allocates_max_plus_one() {
        let (engine, _) = setup_engine();
        assert_eq!(create(&engine, "u", "a").position, 0);
        assert_eq!(create(&engine, "u", "b").position, 1);
        assert_eq!(create(&engine, "u", "c").position, 2);
        assert_eq!(create(&engine, "u", "d").position, 3);
        assert_eq!(create(&engine, "other", "x").position, 0);
    }

    #[test]
    fn create_keeps_fields() {
        let (engine, _) = setup_engine();
        let params = TaskCreateParams {
            title: "Ship release".into(),
            description: Some("tag and publish".into()),
            status: TaskStatus::InProgress,
            priority: TaskPriority::High,
        };
        let task = engine.create_task("u", &params).unwrap();
        assert_eq!(task.title, "Ship release");
        assert_eq!(task.description.as_deref(), Some("tag and publish"));
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.owner_id, "u");
        assert!(!task.is_deleted);
    }

    #[test]
    fn create_rejects_empty_title() {
        let (engine, sink) = setup_engine();
        let err = engine.create_task("u", &TaskCreateParams::new("  ")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(sink.events().is_empty());
    }

    #[test]
    fn create_records_audit_event() {
        let (engine, sink) = setup_engine();
        let task = create(&engine, "u", "a");
        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "u");
        assert_eq!(events[0].1, AuditAction::CreateTask);
        assert_eq!(events[0].2, format!("Task {} created at position 0", task.id));
    }

    #[test]
    fn audit_failure_does_not_fail_mutation() {
        let engine = TaskEngine::new(memory_pool(), Arc::new(FailingSink));
        let task = create(&engine, "u", "still saved");
        assert_eq!(stored(&engine, &task.id).title, "still saved");
        let outcome = engine.delete_task(&task.id, "u").unwrap();
        assert_eq!(outcome.deleted_position, 0);
    }

    // ── delete ──────────────────────────────────────────────────────

    #[test]
    fn delete_compacts_tail() {
        let (engine, _) = setup_engine();
        let tasks: Vec<Task> = ["a", "b", "c", "d"].iter().map(|t| create(&engine, "u", t)).collect();

        let outcome = engine.delete_task(&tasks[1].id, "u").unwrap();
        assert_eq!(outcome.deleted_position, 1);
        assert_eq!(live_positions(&engine, "u"), vec![0, 1, 2]);
        assert_eq!(stored(&engine, &tasks[2].id).position, 1);
        assert_eq!(stored(&engine, &tasks[3].id).position, 2);

        let deleted = stored(&engine, &tasks[1].id);
        assert!(deleted.is_deleted);
        assert_eq!(deleted.position, 1);
    }

    #[test]
    fn delete_twice_is_not_found() {
        let (engine, sink) = setup_engine();
        let tasks: Vec<Task> = ["a", "b", "c"].iter().map(|t| create(&engine, "u", t)).collect();
        engine.delete_task(&tasks[0].id, "u").unwrap();
        let before = live_positions(&engine, "u");

        let err = engine.delete_task(&tasks[0].id, "u").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(live_positions(&engine, "u"), before);
        let deletes = sink
            .events()
            .iter()
            .filter(|e| e.1 == AuditAction::DeleteTask)
            .count();
        assert_eq!(deletes, 1);
    }

    #[test]
    fn delete_records_position() {
        let (engine, sink) = setup_engine();
        create(&engine, "u", "a");
        let b = create(&engine, "u", "b");
        engine.delete_task(&b.id, "u").unwrap();
        let last = sink.events().pop().unwrap();
        assert_eq!(last.1, AuditAction::DeleteTask);
        assert_eq!(last.2, format!("Task {} deleted from position 1", b.id));
    }

    #[test]
    fn failed_compaction_rolls_back_delete() {
        let (engine, sink) = setup_engine();
        let tasks: Vec<Task> = ["a", "b", "c"].iter().map(|t| create(&engine, "u", t)).collect();
        engine
            .pool()
            .get()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER block_shift BEFORE UPDATE OF position ON tasks
                 BEGIN SELECT RAISE(ABORT, 'shift blocked'); END;",
            )
            .unwrap();

        let err = engine.delete_task(&tasks[0].id, "u").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Internal);
        assert!(!stored(&engine, &tasks[0].id).is_deleted);
        assert_eq!(live_positions(&engine, "u"), vec![0, 1, 2]);
        assert!(sink.events().iter().all(|e| e.1 != AuditAction::DeleteTask));
    }

    #[test]
    fn create_after_delete_appends() {
        let (engine, _) = setup_engine();
        let tasks: Vec<Task> = ["a", "b", "c"].iter().map(|t| create(&engine, "u", t)).collect();
        engine.delete_task(&tasks[2].id, "u").unwrap();
        assert_eq!(create(&engine, "u", "d").position, 2);
        engine.delete_task(&tasks[0].id, "u").unwrap();
        assert_eq!(create(&engine, "u", "e").position, 2);
        assert_eq!(live_positions(&engine, "u"), vec![0, 1, 2]);
    }

    // ── ownership ───────────────────────────────────────────────────

    #[test]
    fn foreign_task_is_forbidden() {
        let (engine, _) = setup_engine();
        let task = create(&engine, "alice", "private");

        let patch = TaskPatch {
            title: Some("hijacked".into()),
            ..Default::default()
        };
        let err = engine.update_task(&task.id, "mallory", &patch).unwrap_err();
        assert!(matches!(err, TaskError::Forbidden { .. }));
        assert!(matches!(
            engine.delete_task(&task.id, "mallory").unwrap_err(),
            TaskError::Forbidden { .. }
        ));
        assert!(matches!(
            engine.set_position(&task.id, "mallory", 3).unwrap_err(),
            TaskError::Forbidden { .. }
        ));

        let unchanged = stored(&engine, &task.id);
        assert_eq!(unchanged.title, "private");
        assert!(!unchanged.is_deleted);
        assert_eq!(unchanged.position, 0);
    }

    #[test]
    fn foreign_deleted_task_is_not_found() {
        let (engine, _) = setup_engine();
        let task = create(&engine, "alice", "gone");
        engine.delete_task(&task.id, "alice").unwrap();

        let err = engine
            .update_task(&task.id, "mallory", &TaskPatch::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(
            engine.delete_task(&task.id, "mallory").unwrap_err().kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            engine.set_position(&task.id, "mallory", 0).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn listing_never_leaks_other_owners() {
        let (engine, _) = setup_engine();
        create(&engine, "alice", "alice milk");
        create(&engine, "bob", "bob milk");
        let page = engine
            .list_tasks(
                "bob",
                &TaskFilter {
                    search: Some("milk".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(page.meta.total, 1);
        assert_eq!(page.data[0].owner_id, "bob");
    }

    // ── update ──────────────────────────────────────────────────────

    #[test]
    fn update_changes_fields_not_position() {
        let (engine, sink) = setup_engine();
        create(&engine, "u", "a");
        let b = create(&engine, "u", "b");
        let patch = TaskPatch {
            title: Some("b2".into()),
            status: Some(TaskStatus::Completed),
            ..Default::default()
        };
        let updated = engine.update_task(&b.id, "u", &patch).unwrap();
        assert_eq!(updated.title, "b2");
        assert_eq!(updated.status, TaskStatus::Completed);
        assert_eq!(updated.position, 1);
        assert_eq!(
            sink.events().pop().unwrap().2,
            format!("Task {} updated", b.id)
        );
    }

    #[test]
    fn update_missing_is_not_found() {
        let (engine, _) = setup_engine();
        let err = engine
            .update_task("task-missing", "u", &TaskPatch::default())
            .unwrap_err();
        assert!(matches!(err, TaskError::NotFound { .. }));
    }

    #[test]
    fn update_rejects_empty_title() {
        let (engine, _) = setup_engine();
        let task = create(&engine, "u", "a");
        let patch = TaskPatch {
            title: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(
            engine.update_task(&task.id, "u", &patch).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    // ── set_position / repair ───────────────────────────────────────

    #[test]
    fn set_position_does_not_shift_peers() {
        let (engine, sink) = setup_engine();
        let tasks: Vec<Task> = ["a", "b", "c"].iter().map(|t| create(&engine, "u", t)).collect();
        let moved = engine.set_position(&tasks[2].id, "u", 0).unwrap();
        assert_eq!(moved.position, 0);
        assert_eq!(stored(&engine, &tasks[0].id).position, 0);
        assert_eq!(stored(&engine, &tasks[1].id).position, 1);
        assert_eq!(
            sink.events().pop().unwrap().2,
            format!("Task {} position updated to 0", tasks[2].id)
        );
    }

    #[test]
    fn set_position_rejects_negative() {
        let (engine, _) = setup_engine();
        let task = create(&engine, "u", "a");
        assert_eq!(
            engine.set_position(&task.id, "u", -1).unwrap_err().kind(),
            ErrorKind::InvalidArgument
        );
    }

    #[test]
    fn repair_restores_density() {
        let (engine, sink) = setup_engine();
        let tasks: Vec<Task> = ["a", "b", "c", "d"].iter().map(|t| create(&engine, "u", t)).collect();
        engine.set_position(&tasks[0].id, "u", 10).unwrap();
        engine.set_position(&tasks[3].id, "u", 7).unwrap();
        assert!(!is_dense(&live_positions(&engine, "u")));

        let moved = engine.repair_positions("u").unwrap();
        assert!(moved > 0);
        assert_eq!(live_positions(&engine, "u"), vec![0, 1, 2, 3]);
        assert_eq!(stored(&engine, &tasks[1].id).position, 0);
        assert_eq!(stored(&engine, &tasks[0].id).position, 3);
        assert_eq!(sink.events().pop().unwrap().1, AuditAction::RepairTaskPositions);

        assert_eq!(engine.repair_positions("u").unwrap(), 0);
    }

    #[test]
    fn delete_all_for_owner() {
        let (engine, _) = setup_engine();
        for title in ["a", "b", "c"] {
            create(&engine, "u", title);
        }
        create(&engine, "other", "x");
        assert_eq!(engine.delete_all_for_owner("u").unwrap(), 3);
        assert!(live_positions(&engine, "u").is_empty());
        assert_eq!(live_positions(&engine, "other"), vec![0]);
        assert_eq!(create(&engine, "u", "fresh").position, 0);
    }

    // ── list ────────────────────────────────────────────────────────

    #[test]
    fn list_paginates() {
        let (engine, _) = setup_engine();
        for i in 0..25 {
            create(&engine, "u", &format!("task {i}"));
        }
        let page = |n| {
            engine
                .list_tasks(
                    "u",
                    &TaskFilter {
                        page: Some(n),
                        limit: Some(10),
                        ..Default::default()
                    },
                )
                .unwrap()
        };

        let first = page(1);
        assert_eq!(first.data.len(), 10);
        assert_eq!(first.meta.pages, 3);
        assert_eq!(first.data[0].position, 0);

        let third = page(3);
        assert_eq!(third.data.len(), 5);
        assert_eq!(third.meta.total, 25);

        let fourth = page(4);
        assert!(fourth.data.is_empty());
        assert_eq!(fourth.meta.total, 25);
        assert_eq!(fourth.meta.page, 4);
    }

    #[test]
    fn list_defaults() {
        let (engine, _) = setup_engine();
        create(&engine, "u", "a");
        let page = engine.list_tasks("u", &TaskFilter::default()).unwrap();
        assert_eq!(page.meta.page, 1);
        assert_eq!(page.meta.limit, 10);
        assert_eq!(page.meta.pages, 1);
    }

    #[test]
    fn list_excludes_deleted() {
        let (engine, _) = setup_engine();
        let a = create(&engine, "u", "a");
        create(&engine, "u", "b");
        engine.delete_task(&a.id, "u").unwrap();
        let page = engine.list_tasks("u", &TaskFilter::default()).unwrap();
        assert_eq!(page.meta.total, 1);
        assert_eq!(page.data[0].title, "b");
        assert_eq!(page.data[0].position, 0);
    }

    #[test]
    fn list_substring_search_is_case_insensitive() {
        let (engine, _) = setup_engine();
        create(&engine, "u", "Buy MILK");
        create(&engine, "u", "walk dog");
        engine
            .create_task(
                "u",
                &TaskCreateParams {
                    description: Some("Milkshake run".into()),
                    ..TaskCreateParams::new("treats")
                },
            )
            .unwrap();

        let page = engine
            .list_tasks(
                "u",
                &TaskFilter {
                    search: Some("milk".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        let titles: Vec<&str> = page.data.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, vec!["Buy MILK", "treats"]);
    }

    #[test]
    fn list_phrase_search_counts_matches() {
        let (engine, _) = setup_engine();
        create(&engine, "u", "buy milk");
        create(&engine, "u", "milk then buy");
        create(&engine, "u", "please buy milk soon");
        let page = engine
            .list_tasks(
                "u",
                &TaskFilter {
                    search: Some("buy milk".into()),
                    limit: Some(1),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(page.meta.total, 2);
        assert_eq!(page.meta.pages, 2);
        assert_eq!(page.data.len(), 1);
    }

    #[test]
    fn list_invalid_pattern_is_invalid_argument() {
        let (engine, _) = setup_engine();
        let err = engine
            .list_tasks(
                "u",
                &TaskFilter {
                    search: Some("[milk".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    // ── concurrency ─────────────────────────────────────────────────

    #[test]
    fn concurrent_creates_stay_dense() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.db");
        let pool = new_file(
            path.to_str().unwrap(),
            &ConnectionConfig {
                pool_size: 8,
                ..Default::default()
            },
        )
        .unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();
        let engine = Arc::new(TaskEngine::new(pool, Arc::new(NoopAuditSink)));

        let handles: Vec<_> = (0..8)
            .map(|worker| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        let owner = if i % 2 == 0 { "shared" } else { "other" };
                        engine
                            .create_task(owner, &TaskCreateParams::new(format!("w{worker} t{i}")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let shared = live_positions(&engine, "shared");
        assert_eq!(shared.len(), 40);
        assert!(is_dense(&shared));
        assert!(is_dense(&live_positions(&engine, "other")));
    }

    #[test]
    fn concurrent_deletes_and_creates_stay_dense() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tasks.db");
        let pool = new_file(
            path.to_str().unwrap(),
            &ConnectionConfig {
                pool_size: 6,
                ..Default::default()
            },
        )
        .unwrap();
        run_migrations(&pool.get().unwrap()).unwrap();
        let engine = Arc::new(TaskEngine::new(pool, Arc::new(NoopAuditSink)));

        let seeded: Vec<Task> = (0..20).map(|i| create(&engine, "u", &format!("seed {i}"))).collect();

        let deleters: Vec<_> = seeded
            .chunks(5)
            .map(|chunk| {
                let engine = Arc::clone(&engine);
                let ids: Vec<String> = chunk.iter().map(|t| t.id.clone()).collect();
                std::thread::spawn(move || {
                    for id in ids {
                        engine.delete_task(&id, "u").unwrap();
                    }
                })
            })
            .collect();
        let creators: Vec<_> = (0..2)
            .map(|worker| {
                let engine = Arc::clone(&engine);
                std::thread::spawn(move || {
                    for i in 0..10 {
                        engine
                            .create_task("u", &TaskCreateParams::new(format!("new {worker}-{i}")))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in deleters.into_iter().chain(creators) {
            handle.join().unwrap();
        }

        let positions = live_positions(&engine, "u");
        assert_eq!(positions.len(), 20);
        assert!(is_dense(&positions));
    }

    // ── properties ──────────────────────────────────────────────────

    #[derive(Debug, Clone)]
    enum Op {
        Create,
        Delete(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::Create),
            2 => any::<usize>().prop_map(Op::Delete),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(48))]

        #[test]
        fn density_holds_for_any_create_delete_sequence(ops in prop::collection::vec(op_strategy(), 1..40)) {
            let engine = TaskEngine::new(memory_pool(), Arc::new(NoopAuditSink));
            let mut live: Vec<String> = Vec::new();

            for op in ops {
                match op {
                    Op::Create => {
                        let task = engine.create_task("u", &TaskCreateParams::new("t")).unwrap();
                        prop_assert_eq!(task.position, i64::try_from(live.len()).unwrap());
                        live.push(task.id);
                    }
                    Op::Delete(pick) => {
                        if live.is_empty() {
                            continue;
                        }
                        let id = live.remove(pick % live.len());
                        engine.delete_task(&id, "u").unwrap();
                    }
                }
                let positions = live_positions(&engine, "u");
                prop_assert_eq!(positions.len(), live.len());
                prop_assert!(is_dense(&positions));
            }
        }
    }
}
