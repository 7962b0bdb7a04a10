// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Review API server
//!
//! `remedy serve` wires the configured stack, optionally exposes Prometheus
//! metrics, and serves the review API until Ctrl+C or SIGTERM.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::info;

use remedy_core::presentation::api::{app, AppState};

use crate::bootstrap::{build_services, load_config};

#[derive(Args)]
pub struct ServeCommand {
    /// Override `spec.server.host`
    #[arg(long, env = "REMEDY_HOST")]
    host: Option<String>,

    /// Override `spec.server.port`
    #[arg(long, env = "REMEDY_PORT")]
    port: Option<u16>,
}

pub async fn execute(cmd: ServeCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = load_config(config_path)?;
    let services = build_services(&config).await?;

    if let Some(metrics_port) = config.spec.server.metrics_port {
        let metrics_addr: SocketAddr = format!("{}:{}", config.spec.server.host, metrics_port)
            .parse()
            .context("Invalid metrics listen address")?;
        PrometheusBuilder::new()
            .with_http_listener(metrics_addr)
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exporter listening on {}", metrics_addr);
    }

    let state = AppState {
        lifecycle: services.lifecycle.clone(),
        review: services.review.clone(),
        orchestrator: services.orchestrator.clone(),
        default_batch_size: config.spec.deduplication.batch_size,
        start_time: Instant::now(),
    };

    let host = cmd.host.unwrap_or_else(|| config.spec.server.host.clone());
    let port = cmd.port.unwrap_or(config.spec.server.port);
    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Review API listening on {}", addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server shutting down");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}
