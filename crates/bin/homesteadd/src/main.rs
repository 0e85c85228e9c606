//! # homesteadd — homestead daemon
//!
//! Composition root that wires all adapters together and runs the
//! automation scheduler.
//!
//! ## Responsibilities
//! - Parse configuration (TOML file, env vars)
//! - Initialize the `SQLite` connection pool and run migrations
//! - Construct repository implementations (adapters)
//! - Construct the script engine/runner, the driver service, and the
//!   automation engine, injecting everything via port traits
//! - Start the scheduler and activate the automation system
//! - Handle graceful shutdown (SIGTERM/SIGINT): deactivate the automation
//!   system, then stop the scheduler
//!
//! ## Dependency rule
//! This is the **only** crate that depends on all other crates.
//! It is the wiring layer — no domain logic belongs here.

mod config;

use std::sync::Arc;
use std::time::Duration;

use homestead_adapter_script_rhai::{RhaiScriptEngine, RhaiScriptRunner};
use homestead_adapter_storage_sqlite_sqlx::{
    Config as DbConfig, SqliteAutomationRepository, SqliteDeviceRepository, SqliteDriverRepository,
    SqliteEventLog, SqliteNotifier, SqliteScriptRepository, SqliteSingletonRepository,
};
use homestead_app::ports::StaticServerConfig;
use homestead_app::scheduler::CronScheduler;
use homestead_app::services::automation_service::AutomationEngine;
use homestead_app::services::driver_service::DriverService;
use homestead_app::singleton_store::SingletonStore;
use tracing_subscriber::EnvFilter;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&config.logging.filter))
        .init();

    // Database
    let db = DbConfig {
        database_url: config.database_url().to_string(),
    }
    .build()
    .await?;
    let pool = db.pool().clone();

    // Repositories and sinks
    let automation_repo = SqliteAutomationRepository::new(pool.clone());
    let driver_repo = SqliteDriverRepository::new(pool.clone());
    let device_repo = SqliteDeviceRepository::new(pool.clone());
    let singleton_repo = SqliteSingletonRepository::new(pool.clone());
    let script_repo = SqliteScriptRepository::new(pool.clone());
    let notifier = SqliteNotifier::new(pool.clone());
    let events = SqliteEventLog::new(pool);

    // Script engine
    let budget = Duration::from_secs(config.automation.script_budget_secs);
    let script_engine = RhaiScriptEngine::new();
    let script_runner = RhaiScriptRunner::new(script_repo, budget);

    // Services
    let server_config = Arc::new(StaticServerConfig::new(
        config.automation.enabled,
        config.location.latitude,
        config.location.longitude,
    ));
    let driver_service = Arc::new(DriverService::new(
        driver_repo,
        device_repo,
        SingletonStore::new(singleton_repo),
        script_engine,
        budget,
    ));
    let scheduler = Arc::new(CronScheduler::new());
    let engine = Arc::new(AutomationEngine::new(
        automation_repo,
        Arc::clone(&server_config),
        notifier,
        events,
        script_runner,
        scheduler,
    ));

    engine.scheduler().start();
    if config.automation.enabled {
        let activated = engine.activate_system().await?;
        tracing::info!(activated, "automation system activated");
    } else {
        tracing::info!("automation system disabled by configuration");
    }

    match driver_service.health_check_all().await {
        Ok(results) => {
            let healthy = results.iter().filter(|(_, r)| r.success).count();
            tracing::info!(healthy, total = results.len(), "device health check complete");
        }
        Err(err) => tracing::error!(%err, "device health check failed"),
    }

    tracing::info!("homesteadd running");
    shutdown_signal().await;

    tracing::info!("shutting down");
    if let Err(err) = engine.deactivate_system().await {
        tracing::error!(%err, "failed to deactivate automation system");
    }
    engine.scheduler().stop().await;

    Ok(())
}

/// Resolves when the process receives a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix both signals are handled so container orchestrators trigger a
/// clean deactivation pass. On non-Unix only Ctrl-C (SIGINT) is available.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let sigterm = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => tracing::error!(%err, "failed to install SIGTERM handler"),
        }
    };
    #[cfg(not(unix))]
    let sigterm = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = sigterm => {}
    }
}
