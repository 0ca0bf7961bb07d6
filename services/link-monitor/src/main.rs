//! Link monitor
//!
//! Operational harness around the prioritized SRV client:
//! 1. Resolves the configured service and keeps a connection up
//! 2. Logs every link event with its reason
//! 3. Marks the link established after a configurable quiet period
//! 4. Exposes the client's counters over Prometheus

mod config;

use std::pin::Pin;
use std::time::Duration;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use prio_client::{LinkEvent, PrioClient};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and LOG_LEVEL / RUST_LOG support
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting link-monitor");

    // CLI: simple --config flag parsing
    let args: Vec<String> = std::env::args().collect();
    let cli_config_path = args
        .iter()
        .position(|a| a == "--config")
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str());

    let config_path = Config::resolve_path(cli_config_path);
    info!(path = %config_path.display(), "loading configuration");

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    info!(
        service = %config.service.name,
        proto = %config.service.proto,
        domain = %config.service.domain,
        static_records = config.static_records.len(),
        "configuration loaded"
    );

    PrometheusBuilder::new()
        .with_http_listener(config.monitor.metrics_addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    info!(addr = %config.monitor.metrics_addr, "metrics exposed");

    let (client, mut events) = PrioClient::new().context("failed to create client")?;
    client.set_service(
        &config.service.name,
        &config.service.proto,
        &config.service.domain,
    );
    for rr in &config.static_records {
        client.add_static_srv_record(rr.ttl, rr.priority, rr.weight, rr.port, &rr.target);
    }
    client.set_reconnect_min_time(config.reconnect.min_ms);
    client.set_reconnect_max_time(config.reconnect.max_ms);
    client.set_reconnect_backoff_percent(config.reconnect.backoff_percent);
    client.set_reconnect_randomize_percent(config.reconnect.randomize_percent);

    info!(service = %client.service(), "connecting");
    client.connect();

    let established_after = Duration::from_secs(config.monitor.established_after_secs);
    let mut establish_timer: Option<Pin<Box<tokio::time::Sleep>>> = None;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,

            event = events.recv() => {
                match event {
                    Some(LinkEvent::Connected) => {
                        info!(primary = client.is_primary(), "link up");
                        establish_timer =
                            Some(Box::pin(tokio::time::sleep(established_after)));
                    }
                    Some(LinkEvent::Disconnected(reason)) => {
                        warn!(reason = %reason, "link down");
                        establish_timer = None;
                    }
                    Some(LinkEvent::Data(data)) => {
                        debug!(len = data.len(), "data received");
                    }
                    None => break,
                }
            }

            _ = quiet_period(&mut establish_timer) => {
                client.mark_as_established();
                establish_timer = None;
                info!("link marked as established");
            }
        }
    }

    client.disconnect();
    info!("shutdown complete");
    Ok(())
}

/// Resolve when the post-connect quiet period elapses; never resolves while
/// no connection is waiting to be marked established.
async fn quiet_period(timer: &mut Option<Pin<Box<tokio::time::Sleep>>>) {
    match timer.as_mut() {
        Some(sleep) => sleep.await,
        None => std::future::pending().await,
    }
}

/// Wait for SIGTERM or SIGINT for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received SIGINT, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}
