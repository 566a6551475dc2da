// Copyright 2025 AgentReplay (https://github.com/agentreplay)
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

pub mod api;
pub mod config;
pub mod exporter;
pub mod refresh;
pub mod sources;

use anyhow::Result;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use api::AppState;
use clustercost_core::{
    ClusterCache, EventApplier, EventApplierConfig, InstanceCatalog, SnapshotOrchestrator,
};
use config::{LogFormat, LoggingConfig, ServerConfig};
use exporter::CostExporter;
use refresh::CatalogRefresher;
use sources::{FileCatalogSource, HttpUsageSource};

const DEFAULT_LOG_FILTER: &str = "clustercost_server=info,clustercost_core=info,tower_http=info";

/// Install the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init_tracing(logging: &LoggingConfig) {
    let fallback = logging
        .level
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));

    let registry = tracing_subscriber::registry().with(filter);
    match logging.format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }
}

pub async fn run_server(config: ServerConfig) -> Result<()> {
    init_tracing(&config.logging);

    tracing::info!("Starting Cluster Cost Exporter");
    tracing::info!("Configuration: {:#?}", config);

    config.validate()?;
    let addr = config.socket_addr()?;

    // Catalog first: without it nothing can be costed
    let catalog = Arc::new(InstanceCatalog::new(config.cpu_memory_ratio()?));
    let catalog_source = Arc::new(FileCatalogSource::new(
        config.pricing.catalog_file.clone(),
        config.pricing.region.clone(),
    ));
    let refresher = CatalogRefresher::new(
        catalog.clone(),
        catalog_source.clone(),
        catalog_source,
        config.refresh_interval(),
    );
    let start = Instant::now();
    if let Err(e) = refresher.load_initial().await {
        tracing::error!("{:#}", e);
        return Err(e);
    }
    tracing::info!(
        "Initial catalog load took {:?} ({} instance types, region {})",
        start.elapsed(),
        catalog.len(),
        config.pricing.region
    );

    let cache = Arc::new(ClusterCache::new(catalog));
    let events = EventApplier::new(
        EventApplierConfig {
            channel_capacity: config.cluster.event_channel_capacity,
        },
        cache.clone(),
    )
    .spawn();

    let usage = Arc::new(HttpUsageSource::new(
        config.usage.endpoint.clone(),
        Duration::from_secs(config.usage.request_timeout_secs),
    )?);
    let orchestrator = Arc::new(SnapshotOrchestrator::new(cache.clone(), usage));

    let projection = config.label_projection();
    let exporter = Arc::new(CostExporter::new(&projection)?);

    let state = AppState {
        cache: cache.clone(),
        orchestrator,
        exporter,
        events,
        projection: Arc::new(projection),
        metrics_path: Arc::from(config.server.metrics_path.as_str()),
        started_at: Instant::now(),
    };

    let app = api::router(state).layer(TraceLayer::new_for_http());

    let refresh_handle = refresher.spawn();
    let sync_handle = spawn_sync_watch(
        cache,
        Duration::from_secs(config.cluster.sync_timeout_secs),
    );

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Listening on http://{} (metrics at {})", addr, config.server.metrics_path);

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await;

    refresh_handle.abort();
    sync_handle.abort();
    tracing::info!("HTTP server stopped");

    served?;
    Ok(())
}

/// Log when the cache-synced barrier is reached, or warn if it takes longer
/// than `timeout`. Metrics stay unavailable until then either way.
fn spawn_sync_watch(cache: Arc<ClusterCache>, timeout: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let start = Instant::now();
        if tokio::time::timeout(timeout, cache.wait_until_synced())
            .await
            .is_err()
        {
            tracing::warn!(
                "Cluster state not synced after {:?}, metrics remain unavailable",
                timeout
            );
            cache.wait_until_synced().await;
        }
        tracing::info!("Cluster state synced after {:?}", start.elapsed());
    })
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        futures::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
