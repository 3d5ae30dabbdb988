//! # taskdeck-tasks
//!
//! Task ordering and query engine.
//!
//! Every owner has an ordered list of live tasks whose positions are always
//! `0..k`. Creates append at the end, deletes compact the tail, and an
//! explicit repair pass renumbers a list that has drifted.
//!
//! # Architecture
//!
//! - **[`sqlite`]**: `r2d2` connection pool and embedded schema migrations.
//! - **[`repository`]**: stateless SQL over `&Connection`.
//! - **[`allocator`]**: position allocation, compaction, and repair steps.
//! - **[`planner`]**: turns a [`TaskFilter`] into a [`QueryPlan`] with
//!   pagination math.
//! - **[`audit`]**: the [`AuditSink`] contract plus a `SQLite` audit log.
//! - **[`engine`]**: [`TaskEngine`], the transactional entry point with
//!   per-owner write serialization.
//! - **[`validation`]**: explicit input checks returning
//!   [`TaskError::InvalidArgument`].

#![deny(unsafe_code)]

pub mod allocator;
pub mod audit;
pub mod engine;
pub mod errors;
pub mod planner;
pub mod repository;
pub mod sqlite;
pub mod types;
pub mod validation;

pub use audit::{AuditAction, AuditEntry, AuditLogRepo, AuditSink, NoopAuditSink, SqliteAuditLog};
pub use engine::TaskEngine;
pub use errors::{ErrorKind, Result, TaskError};
pub use planner::{QueryPlan, SortOrder, TextPredicate};
pub use sqlite::{ConnectionConfig, ConnectionPool, new_file, new_in_memory, run_migrations};
pub use types::*;
