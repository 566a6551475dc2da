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

use anyhow::Result;
use clap::Parser;
use clustercost_core::parse_label_list;
use clustercost_server::{config::ServerConfig, run_server};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Per-workload cost exporter for Kubernetes", long_about = None)]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(short, long, env = "CLUSTERCOST_CONFIG")]
    config: Option<PathBuf>,

    /// HTTP listen address (overrides config file)
    #[arg(long, env = "CLUSTERCOST_LISTEN_ADDRESS")]
    listen_address: Option<String>,

    /// Path under which to expose metrics
    #[arg(long, env = "CLUSTERCOST_METRICS_PATH")]
    metrics_path: Option<String>,

    /// Log filter directive (e.g. "info" or "clustercost_core=debug")
    #[arg(long, env = "CLUSTERCOST_LOG_LEVEL")]
    log_level: Option<String>,

    /// Comma-separated pod label keys to add as metric labels
    #[arg(long, env = "CLUSTERCOST_POD_LABELS")]
    add_pod_labels: Option<String>,

    /// Comma-separated node label keys to add as metric labels
    #[arg(long, env = "CLUSTERCOST_NODE_LABELS")]
    add_node_labels: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = ServerConfig::load(args.config)?;

    // Apply CLI overrides
    if let Some(addr) = args.listen_address {
        config.server.listen_addr = addr;
    }
    if let Some(path) = args.metrics_path {
        config.server.metrics_path = path;
    }
    if let Some(level) = args.log_level {
        config.logging.level = Some(level);
    }
    if let Some(labels) = args.add_pod_labels {
        config.labels.workload = parse_label_list(&labels);
    }
    if let Some(labels) = args.add_node_labels {
        config.labels.node = parse_label_list(&labels);
    }

    run_server(config).await
}
