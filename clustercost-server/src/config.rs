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

use anyhow::{Context, Result};
use clustercost_core::{parse_label_list, CpuMemoryRatio, LabelProjection, DEFAULT_CPU_MEMORY_RATIO};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api;

/// Clustercost Exporter Configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub server: HttpServerConfig,
    #[serde(default)]
    pub pricing: PricingConfig,
    #[serde(default)]
    pub usage: UsageConfig,
    #[serde(default)]
    pub cluster: ClusterConfig,
    #[serde(default)]
    pub labels: LabelsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpServerConfig {
    /// HTTP listen address (e.g., "0.0.0.0:9090")
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,

    /// Path serving the Prometheus exposition
    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: default_listen_addr(),
            metrics_path: default_metrics_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PricingConfig {
    /// Region whose prices are loaded from the catalog
    #[serde(default = "default_region")]
    pub region: String,

    /// Cost of one vCPU-hour expressed in GiB-hours of memory
    #[serde(default = "default_cpu_memory_ratio")]
    pub cpu_memory_ratio: f64,

    /// Catalog file with instance shapes and per-region prices (TOML or JSON)
    #[serde(default = "default_catalog_file")]
    pub catalog_file: PathBuf,

    /// Seconds between catalog reloads
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            region: default_region(),
            cpu_memory_ratio: default_cpu_memory_ratio(),
            catalog_file: default_catalog_file(),
            refresh_interval_secs: default_refresh_interval(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UsageConfig {
    /// Pod metrics endpoint (metrics.k8s.io PodMetricsList)
    #[serde(default = "default_usage_endpoint")]
    pub endpoint: String,

    /// Request timeout in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for UsageConfig {
    fn default() -> Self {
        Self {
            endpoint: default_usage_endpoint(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ClusterConfig {
    /// Seconds to wait for the initial listing before warning
    #[serde(default = "default_sync_timeout")]
    pub sync_timeout_secs: u64,

    /// Per-table event channel capacity
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            sync_timeout_secs: default_sync_timeout(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LabelsConfig {
    /// Workload label keys exported as extra metric labels
    #[serde(default)]
    pub workload: Vec<String>,

    /// Node label keys exported as extra metric labels
    #[serde(default)]
    pub node: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Filter directive; `RUST_LOG` wins when set
    #[serde(default)]
    pub level: Option<String>,

    #[serde(default)]
    pub format: LogFormat,
}

// Default values
fn default_listen_addr() -> String {
    "0.0.0.0:9090".to_string()
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_cpu_memory_ratio() -> f64 {
    DEFAULT_CPU_MEMORY_RATIO
}

fn default_catalog_file() -> PathBuf {
    PathBuf::from("./catalog.toml")
}

fn default_refresh_interval() -> u64 {
    3600
}

fn default_usage_endpoint() -> String {
    "http://127.0.0.1:8001/apis/metrics.k8s.io/v1beta1/pods".to_string()
}

fn default_request_timeout() -> u64 {
    10
}

fn default_sync_timeout() -> u64 {
    300
}

fn default_event_channel_capacity() -> usize {
    1024
}

impl ServerConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("parsing config file {}", path.display()))?;
        Ok(config)
    }

    /// Load configuration with priority: env > file > defaults.
    /// Command-line flags are applied on top by the binary.
    pub fn load(config_file: Option<PathBuf>) -> Result<Self> {
        let mut config = match config_file {
            Some(path) if path.exists() => {
                tracing::info!("Loading configuration from file: {:?}", path);
                Self::from_file(&path)?
            }
            Some(path) => {
                tracing::warn!("Config file not found: {:?}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from environment variables.
    ///
    /// Supported environment variables:
    /// - CLUSTERCOST_LISTEN_ADDRESS: HTTP listen address
    /// - CLUSTERCOST_METRICS_PATH: metrics path
    /// - CLUSTERCOST_REGION: pricing region
    /// - CLUSTERCOST_CPU_MEMORY_RATIO: cpu:memory price ratio
    /// - CLUSTERCOST_CATALOG_FILE: catalog file path
    /// - CLUSTERCOST_USAGE_ENDPOINT: pod metrics endpoint
    /// - CLUSTERCOST_LOG_LEVEL / CLUSTERCOST_LOG_FORMAT: logging
    /// - CLUSTERCOST_POD_LABELS / CLUSTERCOST_NODE_LABELS: comma-separated label keys
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("CLUSTERCOST_LISTEN_ADDRESS") {
            self.server.listen_addr = addr;
        }
        if let Some(path) = lookup("CLUSTERCOST_METRICS_PATH") {
            self.server.metrics_path = path;
        }
        if let Some(region) = lookup("CLUSTERCOST_REGION") {
            self.pricing.region = region;
        }
        if let Some(ratio) = lookup("CLUSTERCOST_CPU_MEMORY_RATIO") {
            match ratio.parse() {
                Ok(val) => self.pricing.cpu_memory_ratio = val,
                Err(_) => tracing::warn!("Ignoring CLUSTERCOST_CPU_MEMORY_RATIO={:?}", ratio),
            }
        }
        if let Some(file) = lookup("CLUSTERCOST_CATALOG_FILE") {
            self.pricing.catalog_file = PathBuf::from(file);
        }
        if let Some(endpoint) = lookup("CLUSTERCOST_USAGE_ENDPOINT") {
            self.usage.endpoint = endpoint;
        }
        if let Some(level) = lookup("CLUSTERCOST_LOG_LEVEL") {
            self.logging.level = Some(level);
        }
        if let Some(format) = lookup("CLUSTERCOST_LOG_FORMAT") {
            match format.to_ascii_lowercase().as_str() {
                "json" => self.logging.format = LogFormat::Json,
                "text" => self.logging.format = LogFormat::Text,
                _ => tracing::warn!("Ignoring CLUSTERCOST_LOG_FORMAT={:?}", format),
            }
        }
        if let Some(labels) = lookup("CLUSTERCOST_POD_LABELS") {
            self.labels.workload = parse_label_list(&labels);
        }
        if let Some(labels) = lookup("CLUSTERCOST_NODE_LABELS") {
            self.labels.node = parse_label_list(&labels);
        }
    }

    /// Parse listen address as SocketAddr
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.server
            .listen_addr
            .parse()
            .with_context(|| format!("invalid listen address {:?}", self.server.listen_addr))
    }

    pub fn cpu_memory_ratio(&self) -> Result<CpuMemoryRatio> {
        Ok(CpuMemoryRatio::new(self.pricing.cpu_memory_ratio)?)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.pricing.refresh_interval_secs)
    }

    pub fn label_projection(&self) -> LabelProjection {
        LabelProjection {
            workload_labels: self.labels.workload.clone(),
            node_labels: self.labels.node.clone(),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        self.cpu_memory_ratio()?;

        let path = &self.server.metrics_path;
        if !path.starts_with('/') {
            anyhow::bail!("metrics path must start with '/', got {:?}", path);
        }
        if api::RESERVED_PATHS.contains(&path.as_str()) {
            anyhow::bail!("metrics path {:?} collides with a built-in route", path);
        }

        if self.pricing.refresh_interval_secs == 0 {
            anyhow::bail!("pricing.refresh_interval_secs must be greater than 0");
        }

        if self.cluster.event_channel_capacity == 0 {
            anyhow::bail!("cluster.event_channel_capacity must be greater than 0");
        }

        Ok(())
    }
}
