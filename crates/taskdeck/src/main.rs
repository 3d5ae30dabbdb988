//! # taskdeck
//!
//! taskdeck server binary. Loads settings, opens and migrates the task
//! database, then serves the HTTP API until ctrl-c.

#![deny(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use taskdeck_logging::LogFormat;
use taskdeck_server::{ServerConfig, TaskdeckServer};
use taskdeck_settings::{SettingsError, TaskdeckSettings};
use taskdeck_tasks::{ConnectionConfig, ConnectionPool};

/// taskdeck server.
#[derive(Parser, Debug)]
#[command(name = "taskdeck", about = "Multi-tenant ordered task service")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind, 0 for auto-assign (overrides settings).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the `SQLite` database (overrides settings).
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Log filter, e.g. `info` or `taskdeck_tasks=debug` (overrides settings).
    #[arg(long)]
    log_level: Option<String>,
}

impl Cli {
    /// Fold command-line overrides into loaded settings.
    fn apply(&self, settings: &mut TaskdeckSettings) {
        if let Some(ref host) = self.host {
            settings.server.host.clone_from(host);
        }
        if let Some(port) = self.port {
            settings.server.port = port;
        }
        if let Some(ref path) = self.db_path {
            settings.database.path = path.to_string_lossy().into_owned();
        }
        if let Some(ref level) = self.log_level {
            settings.logging.level.clone_from(level);
        }
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    Ok(())
}

/// Load settings from `path`. A bad file falls back to defaults, still with
/// the `TASKDECK_*` overrides from `lookup`, and the error is handed back for
/// logging once the subscriber is up.
fn resolve_settings(
    path: &Path,
    lookup: impl Fn(&str) -> Option<String>,
) -> (TaskdeckSettings, Option<SettingsError>) {
    match taskdeck_settings::load_settings_with(path, &lookup) {
        Ok(settings) => (settings, None),
        Err(err) => {
            let mut settings = TaskdeckSettings::default();
            taskdeck_settings::apply_overrides(&mut settings, &lookup);
            (settings, Some(err))
        }
    }
}

/// Open the pool and bring the schema up to date.
fn open_database(settings: &TaskdeckSettings) -> Result<ConnectionPool> {
    let db_path = Path::new(&settings.database.path);
    ensure_parent_dir(db_path)?;

    let config = ConnectionConfig {
        pool_size: settings.database.pool_size,
        busy_timeout_ms: settings.database.busy_timeout_ms,
        ..ConnectionConfig::default()
    };
    let pool = taskdeck_tasks::new_file(&settings.database.path, &config)
        .context("Failed to open database")?;
    {
        let conn = pool.get().context("Failed to get DB connection")?;
        let applied = taskdeck_tasks::run_migrations(&conn).context("Failed to run migrations")?;
        tracing::debug!(applied, "migrations complete");
    }
    Ok(pool)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    let settings_path = taskdeck_settings::settings_path();
    let (mut settings, load_error) =
        resolve_settings(&settings_path, |name| std::env::var(name).ok());
    args.apply(&mut settings);
    let _ = taskdeck_settings::init_settings(settings.clone());

    taskdeck_logging::init_subscriber(
        &settings.logging.level,
        LogFormat::from_json_flag(settings.logging.json),
    );
    if let Some(error) = load_error {
        tracing::warn!(path = %settings_path.display(), %error, "ignoring settings file");
    }

    let pool = open_database(&settings)?;
    tracing::info!(path = %settings.database.path, "database ready");

    let server = TaskdeckServer::new(ServerConfig::from(&settings.server), pool);
    let (addr, handle) = server.listen().await.context("Failed to bind server")?;
    tracing::info!("taskdeck listening on http://{addr}");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl-c")?;

    tracing::info!("Shutting down...");
    if server.drain().drain(handle, None).await {
        tracing::info!("Shutdown complete");
    }
    Ok(())
}
