//! Position allocation and repair.
//!
//! These are the individual store steps behind create, delete, reposition and
//! repair. They assume the caller holds the owner's write lock and an open
//! transaction; [`crate::engine::TaskEngine`] provides both.

use rusqlite::Connection;
use tracing::debug;

use crate::errors::{Result, TaskError};
use crate::repository::TaskRepository;
use crate::types::Task;

/// Stateless position operations over `&Connection`.
pub struct PositionAllocator;

impl PositionAllocator {
    /// Position for a new task: one past the highest live position, or 0.
    pub fn next_position(conn: &Connection, owner_id: &str) -> Result<i64> {
        Ok(TaskRepository::max_live_position(conn, owner_id)?.map_or(0, |max| max + 1))
    }

    /// Close the gap left at `deleted_position`.
    pub fn compact_after_delete(
        conn: &Connection,
        owner_id: &str,
        deleted_position: i64,
    ) -> Result<usize> {
        let shifted = TaskRepository::shift_down_after(conn, owner_id, deleted_position)?;
        debug!(owner_id, deleted_position, shifted, "compacted positions");
        Ok(shifted)
    }

    /// Load a live task the caller owns.
    ///
    /// Absent and soft-deleted tasks are both `NotFound`; a live task owned by
    /// someone else is `Forbidden`.
    pub fn load_owned(conn: &Connection, task_id: &str, owner_id: &str) -> Result<Task> {
        let task = TaskRepository::get_task(conn, task_id)?
            .filter(|task| !task.is_deleted)
            .ok_or_else(|| TaskError::task_not_found(task_id))?;
        if task.owner_id != owner_id {
            return Err(TaskError::forbidden(task_id));
        }
        Ok(task)
    }

    /// Move one task to `position`. Other tasks keep their positions.
    pub fn reposition(conn: &Connection, task_id: &str, position: i64) -> Result<Task> {
        TaskRepository::set_position(conn, task_id, position)?
            .ok_or_else(|| TaskError::task_not_found(task_id))
    }

    /// Renumber an owner's live tasks to `0..k` in list order.
    ///
    /// Returns how many tasks moved.
    pub fn repair(conn: &Connection, owner_id: &str) -> Result<usize> {
        let ordering = TaskRepository::live_ordering(conn, owner_id)?;
        let mut moved = 0;
        for (expected, (id, position)) in (0_i64..).zip(ordering) {
            if position != expected {
                let _ = TaskRepository::set_position(conn, &id, expected)?;
                moved += 1;
            }
        }
        Ok(moved)
    }
}

/// Whether `positions` is exactly `{0, 1, ..., n-1}`.
pub fn is_dense(positions: &[i64]) -> bool {
    let mut sorted = positions.to_vec();
    sorted.sort_unstable();
    (0_i64..).zip(sorted).all(|(expected, p)| p == expected)
}
