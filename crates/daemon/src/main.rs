//! Listing watch daemon
//!
//! Runs the scheduler that checks every due task and, unless disabled, the
//! REST API used by the front-end to manage users and tasks.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use lw_core::{FileStore, Repository};
use lw_scheduler::{
    ConcurrencyGuard, Fetcher, HttpFetcher, Notifier, Scheduler, TaskRunner, TelegramNotifier,
};

use crate::config::Config;
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "lw_daemon=info,lw_scheduler=info,lw_core=info,tower_http=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env().context("Invalid configuration")?;
    tracing::info!("Using data directory: {:?}", config.data_dir);

    let store = Arc::new(
        FileStore::new(config.store_path())
            .await
            .context("Failed to open store")?,
    );
    let fetcher = HttpFetcher::new(config.fetcher_url.clone(), config.fetch_timeout)?;
    let notifier = TelegramNotifier::new(
        config.telegram_api.clone(),
        config.telegram_token.clone(),
        config.notify_timeout,
    )?;

    let runner = Arc::new(TaskRunner::new(
        Arc::clone(&store) as Arc<dyn Repository>,
        Arc::new(fetcher) as Arc<dyn Fetcher>,
        Arc::new(notifier) as Arc<dyn Notifier>,
        config.runner.clone(),
    ));
    let guard = Arc::new(ConcurrencyGuard::new());
    let scheduler = Scheduler::new(
        Arc::clone(&store) as Arc<dyn Repository>,
        runner,
        Arc::clone(&guard),
        config.scheduler.clone(),
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            // Keep the sender alive so nothing observes a shutdown
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown requested");
        let _ = shutdown_tx.send(true);
    });

    let scheduler_shutdown = wait_for_shutdown(shutdown_rx.clone());
    let scheduler_handle = tokio::spawn(async move {
        scheduler.run_until(scheduler_shutdown).await;
    });

    if config.api_enabled {
        let app_state = AppState::new(Arc::clone(&store), config.limits.clone(), guard);
        let rest_app = routes::router()
            .with_state(app_state)
            .layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            )
            .layer(TraceLayer::new_for_http());

        let listener = tokio::net::TcpListener::bind(config.api_addr)
            .await
            .with_context(|| format!("Failed to bind {}", config.api_addr))?;
        tracing::info!("REST API listening on {}", config.api_addr);

        axum::serve(listener, rest_app)
            .with_graceful_shutdown(wait_for_shutdown(shutdown_rx))
            .await
            .context("REST server failed")?;
    }

    scheduler_handle.await.context("Scheduler task panicked")?;
    Ok(())
}

async fn wait_for_shutdown(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}
