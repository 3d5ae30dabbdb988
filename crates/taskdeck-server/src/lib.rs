//! # taskdeck-server
//!
//! Axum HTTP surface for the task engine.
//!
//! - `/api/tasks` CRUD, reposition and repair, scoped to the calling user
//! - `/api/admin/logs` audit listing for administrators
//! - `/health` liveness with uptime
//! - Graceful shutdown that waits for in-flight engine calls

#![deny(unsafe_code)]

pub mod body;
pub mod config;
pub mod drain;
pub mod errors;
pub mod handlers;
pub mod health;
pub mod identity;
pub mod server;

pub use body::JsonBody;
pub use config::ServerConfig;
pub use drain::EngineDrain;
pub use errors::ApiError;
pub use identity::{Caller, Role};
pub use server::{AppState, TaskdeckServer};
