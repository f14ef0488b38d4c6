//! # holdcert-api: Binary Entry Point
//!
//! Loads configuration, starts the daily expiry monitor and serves the HTTP
//! API plus `/metrics`.

use std::sync::Arc;

use anyhow::Context;
use axum::routing::get;
use metrics_exporter_prometheus::PrometheusBuilder;

use holdcert_api::config::AppConfig;
use holdcert_api::scheduler::spawn_daily_monitor;
use holdcert_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = AppConfig::load().context("loading configuration")?;
    tracing::info!(?config, "configuration loaded");

    let metrics = PrometheusBuilder::new()
        .install_recorder()
        .context("installing metrics recorder")?;

    let schedule = config.monitor.schedule()?;
    let state = AppState::from_config(&config).context("initialising storage and certificate registry")?;
    tracing::info!(
        signing_mode = %state.service.public_key().mode,
        run_at = %schedule.at(),
        "certificate service ready"
    );
    let _monitor = spawn_daily_monitor(Arc::clone(&state.monitor), schedule);

    let app = holdcert_api::app(state).route(
        "/metrics",
        get(move || {
            let metrics = metrics.clone();
            async move { metrics.render() }
        }),
    );

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("holdcert API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app).await?;

    Ok(())
}
