//! `cardshop serve`

use std::net::SocketAddr;

use anyhow::Context;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use cardshop_ebay::{AppConfig, SyncScheduler};
use cardshop_server::{app_router, build_state};

pub async fn run(config: AppConfig, with_scheduler: bool) -> anyhow::Result<()> {
    let addr = config.server.bind_address();
    let tick = config.sync.scheduler_tick();

    if config.server.admin_token.is_none() {
        warn!("server.admin_token is not set; admin routes will answer 503");
    }

    let state = build_state(config).await?;

    let scheduler = if with_scheduler {
        let (scheduler, handle) = SyncScheduler::new(state.engine.clone(), tick);
        let task = tokio::spawn(scheduler.run());
        info!(?tick, "Sync scheduler started");
        Some((handle, task))
    } else {
        info!("Sync scheduler disabled");
        None
    };

    let listener = TcpListener::bind(addr.as_str())
        .await
        .with_context(|| format!("binding {addr}"))?;
    info!(%addr, "Card shop server listening");

    let app = app_router(state.clone());
    let served = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    if let Some((handle, task)) = scheduler {
        handle.shutdown().await;
        if let Err(e) = task.await {
            error!(error = %e, "Scheduler task ended abnormally");
        }
    }
    state.db.close().await;
    info!("Server shutdown complete");

    served.context("HTTP server error")
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received, starting graceful shutdown...");
}
