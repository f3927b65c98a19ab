/*
 * 5D Labs Scan Controller - Controller Service
 * Copyright (C) 2025 5D Labs
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published
 * by the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 */

//! Controller Service - Kubernetes Controller for the `ClusterScan` CRD
//!
//! This service:
//! - Watches `ClusterScan` resources and the `Job`/`CronJob` children they own
//! - Creates exactly one child workload per scan and reports its state in status
//! - Serves `/health` and `/ready` endpoints

use scan_controller::controller::run_scan_controller;
use scan_controller::health::{self, Readiness};
use scan_controller::ControllerConfig;
use std::future::Future;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG_PATH: &str = "/config/config.yaml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!(
        "Starting 5D Labs Scan Controller v{}",
        env!("CARGO_PKG_VERSION")
    );

    let config = Arc::new(load_controller_config());
    config.validate()?;
    let health_addr: SocketAddr = config.health.bind_address.parse()?;

    let client = kube::Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let readiness = Readiness::new();

    let health_handle = tokio::spawn({
        let readiness = readiness.clone();
        async move {
            if let Err(e) = health::serve(health_addr, readiness, shutdown_signal()).await {
                error!("Health server error: {}", e);
            }
        }
    });

    // Returns once the controller has drained after SIGINT/SIGTERM
    if let Err(e) = run_scan_controller(client, config, readiness).await {
        error!("Controller error: {}", e);
        health_handle.abort();
        return Err(e.into());
    }

    if let Err(e) = health_handle.await {
        warn!("Health server task ended abnormally: {}", e);
    }

    info!("Scan controller stopped");
    Ok(())
}

/// `LOG_FORMAT=json` switches to structured JSON lines
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,scan_controller=debug".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}

fn load_controller_config() -> ControllerConfig {
    let override_path = std::env::var("CONTROLLER_CONFIG_PATH").ok();
    let config_path = override_path
        .as_deref()
        .filter(|path| Path::new(path).exists())
        .unwrap_or(DEFAULT_CONFIG_PATH);

    let mut config = match ControllerConfig::from_mounted_file(config_path) {
        Ok(cfg) => {
            info!("Loaded controller configuration from {}", config_path);
            cfg
        }
        Err(err) => {
            warn!(
                "Failed to load configuration from {}: {}. Using defaults.",
                config_path, err
            );
            ControllerConfig::default()
        }
    };

    if let Ok(namespace) = std::env::var("WATCH_NAMESPACE") {
        if !namespace.trim().is_empty() {
            config.namespace = Some(namespace);
        }
    }

    config
}

async fn shutdown_signal() {
    let ctrl_c = signal_received("Ctrl+C", signal::ctrl_c());

    #[cfg(unix)]
    let terminate = signal_received("SIGTERM", async {
        let mut sig = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        sig.recv().await;
        Ok::<(), std::io::Error>(())
    });

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}

/// Resolves when `signal` fires. A handler that failed to install never
/// resolves, so it cannot be mistaken for a shutdown request.
async fn signal_received(name: &str, signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        error!("Failed to install {} handler: {}", name, e);
        std::future::pending::<()>().await;
    }
}
