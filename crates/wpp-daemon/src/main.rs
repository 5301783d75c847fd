// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;
use wpp_config::Config;
use wpp_daemon::{AppState, SqlRawEventSink, build_app};
use wpp_worker::{WorkerSettings, run_worker};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("load configuration")?;
    wpp_telemetry::init(&config.log_level);

    let pool = wpp_store::connect_pool(&config.db, config.pool_size)
        .await
        .context("connect database")?;
    wpp_store::ensure_schema(&pool)
        .await
        .context("ensure raw event schema")?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(run_worker(
        pool.clone(),
        WorkerSettings {
            batch_size: config.batch_size,
            interval_ms: config.interval_ms,
            max_attempts: wpp_core::MAX_ATTEMPTS,
            blocked_as_opt_out: config.blocked_as_opt_out,
            user_phone_column: config.user_phone_column.clone(),
        },
        shutdown_rx,
    ));

    let state = Arc::new(AppState {
        sink: Arc::new(SqlRawEventSink::new(pool.clone())),
        secret: config.webhook_secret.clone(),
        preview_chars: config.payload_preview_chars,
        verbose_logs: config.verbose_logs,
    });
    let app = build_app(state);

    let listener = TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("bind port {}", config.port))?;
    info!(port = config.port, "wpp-daemon listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;

    // Server has drained; stop ticking, let the in-flight tick settle,
    // then release the pool.
    let _ = shutdown_tx.send(true);
    let _ = worker.await;
    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("install ctrl-c handler");
    };
    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("install sigterm handler")
            .recv()
            .await;
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("shutdown signal received");
}
