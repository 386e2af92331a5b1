use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use quickswap::config::{get_config, CliArgs};
use quickswap::{create_app, db, run_migrations, AppState};

/// Sets up console logging plus, when `log_dir` is set, a daily JSON log file
///
/// The returned guard flushes the file writer and must live until exit.
fn init_tracing(debug: bool, log_dir: Option<&str>) -> Option<WorkerGuard> {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("quickswap={0},tower_http={0}", default_level)));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "quickswap.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().json().with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    guard
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let args = CliArgs::parse();
    let debug = args.debug;
    let config = get_config(args)?;
    let _guard = init_tracing(debug, config.log_dir.as_deref());

    info!("Starting QuickSwap on {}", config.bind_address);

    // Initialize the database pool
    let pool = db::init_pool(&config.database_url).context("Failed to create database pool")?;
    {
        let mut conn = pool.get().context("Failed to get a database connection")?;
        run_migrations(&mut conn).map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;
    }

    std::fs::create_dir_all(&config.static_dir)
        .with_context(|| format!("Failed to create static directory {}", config.static_dir))?;

    let state = AppState::new(&config, Arc::new(pool))?;
    let app = create_app(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}
