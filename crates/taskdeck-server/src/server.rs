//! `TaskdeckServer`: Axum HTTP server over the task engine.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::extract::State;
use axum::http::HeaderValue;
use axum::response::Json;
use axum::routing::{get, patch, post, put};
use taskdeck_tasks::{ConnectionPool, SqliteAuditLog, TaskEngine};
use tokio::task::JoinHandle;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::config::ServerConfig;
use crate::drain::EngineDrain;
use crate::handlers;
use crate::health::{self, HealthResponse};

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Task engine.
    pub engine: Arc<TaskEngine>,
    /// Audit log read by the admin route.
    pub audit_log: SqliteAuditLog,
    /// Tracks blocking engine calls until shutdown.
    pub drain: Arc<EngineDrain>,
    /// When the server started.
    pub start_time: Instant,
}

/// The taskdeck HTTP server.
pub struct TaskdeckServer {
    config: ServerConfig,
    engine: Arc<TaskEngine>,
    audit_log: SqliteAuditLog,
    drain: Arc<EngineDrain>,
    start_time: Instant,
}

impl TaskdeckServer {
    /// Create a server over a migrated pool. Mutations are audited to the
    /// same database.
    pub fn new(config: ServerConfig, pool: ConnectionPool) -> Self {
        let audit_log = SqliteAuditLog::new(pool.clone());
        let engine = TaskEngine::new(pool, Arc::new(audit_log.clone()));
        Self {
            config,
            engine: Arc::new(engine),
            audit_log,
            drain: Arc::new(EngineDrain::new()),
            start_time: Instant::now(),
        }
    }

    /// Build the Axum router with all routes.
    pub fn router(&self) -> Router {
        let state = AppState {
            engine: self.engine.clone(),
            audit_log: self.audit_log.clone(),
            drain: self.drain.clone(),
            start_time: self.start_time,
        };

        let api = Router::new()
            .route(
                "/tasks",
                post(handlers::create_task).get(handlers::list_tasks),
            )
            .route("/tasks/repair", post(handlers::repair_positions))
            .route(
                "/tasks/{id}",
                put(handlers::update_task).delete(handlers::delete_task),
            )
            .route("/tasks/{id}/position", patch(handlers::set_position))
            .route("/admin/logs", get(handlers::list_audit_logs));

        Router::new()
            .route("/health", get(health_handler))
            .nest("/api", api)
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&self.config.cors_origins))
            .with_state(state)
    }

    /// Bind and serve in a background task until the drain starts.
    ///
    /// Returns the bound address (useful with port 0) and the serve task,
    /// which belongs in [`EngineDrain::drain`].
    pub async fn listen(&self) -> std::io::Result<(SocketAddr, JoinHandle<()>)> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr()).await?;
        let addr = listener.local_addr()?;
        let router = self.router();
        let token = self.drain.token();

        let handle = tokio::spawn(async move {
            if let Err(error) = axum::serve(listener, router)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!(%error, "server stopped with error");
            }
        });

        info!(%addr, "taskdeck listening");
        Ok((addr, handle))
    }

    /// The task engine.
    pub fn engine(&self) -> &Arc<TaskEngine> {
        &self.engine
    }

    /// The engine call drain.
    pub fn drain(&self) -> &Arc<EngineDrain> {
        &self.drain
    }

    /// The server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Any origin when `origins` is empty, otherwise exactly the listed ones.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() {
        return layer.allow_origin(Any);
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(%origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// GET /health
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health::health_check(state.start_time))
}
