// Copyright 2025 Sushanth (https://github.com/sushanthpy)
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Membership Event Appliers
//!
//! Each cache table has exactly one writer task fed by a bounded channel, so
//! events for one table are applied in arrival order:
//!
//! ```text
//! watch ─► EventApplierHandle ─┬─► node loop     ─► ClusterCache (nodes)
//!                              └─► workload loop ─► ClusterCache (workloads)
//! ```
//!
//! Ordering *between* the two tables is not guaranteed; the cache tolerates
//! a workload that names a node it has not seen yet.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::cluster::ClusterCache;
use crate::error::{ClusterCostError, Result};
use crate::model::{NodeRecord, WorkloadRecord};

/// One delivery from a membership watch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "object", rename_all = "snake_case")]
pub enum WatchEvent<T> {
    Added(T),
    Updated(T),
    Removed(T),
    /// Initial listing is complete
    Synced,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "resource", content = "event", rename_all = "snake_case")]
pub enum ClusterEvent {
    Node(WatchEvent<NodeRecord>),
    Workload(WatchEvent<WorkloadRecord>),
}

#[derive(Debug, Clone)]
pub struct EventApplierConfig {
    /// Per-table channel buffer (backpressure on the watch)
    pub channel_capacity: usize,
}

impl Default for EventApplierConfig {
    fn default() -> Self {
        Self {
            channel_capacity: 1024,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ApplierStats {
    pub node_events: u64,
    pub workload_events: u64,
}

#[derive(Default)]
struct ApplierStatsInternal {
    node_events: AtomicU64,
    workload_events: AtomicU64,
}

impl ApplierStatsInternal {
    fn snapshot(&self) -> ApplierStats {
        ApplierStats {
            node_events: self.node_events.load(Ordering::Relaxed),
            workload_events: self.workload_events.load(Ordering::Relaxed),
        }
    }
}

/// Handle for feeding events to the appliers.
#[derive(Clone)]
pub struct EventApplierHandle {
    nodes: mpsc::Sender<WatchEvent<NodeRecord>>,
    workloads: mpsc::Sender<WatchEvent<WorkloadRecord>>,
    stats: Arc<ApplierStatsInternal>,
}

impl EventApplierHandle {
    /// Queue an event for its table. Waits when the table's channel is full.
    pub async fn send(&self, event: ClusterEvent) -> Result<()> {
        match event {
            ClusterEvent::Node(event) => self
                .nodes
                .send(event)
                .await
                .map_err(|_| ClusterCostError::ApplierClosed("node")),
            ClusterEvent::Workload(event) => self
                .workloads
                .send(event)
                .await
                .map_err(|_| ClusterCostError::ApplierClosed("workload")),
        }
    }

    pub fn stats(&self) -> ApplierStats {
        self.stats.snapshot()
    }
}

pub struct EventApplier {
    config: EventApplierConfig,
    cache: Arc<ClusterCache>,
}

impl EventApplier {
    pub fn new(config: EventApplierConfig, cache: Arc<ClusterCache>) -> Self {
        Self { config, cache }
    }

    /// Spawn one writer task per table and return the handle feeding them.
    ///
    /// Both tasks exit once every handle has been dropped.
    pub fn spawn(self) -> EventApplierHandle {
        let (nodes, node_rx) = mpsc::channel(self.config.channel_capacity);
        let (workloads, workload_rx) = mpsc::channel(self.config.channel_capacity);
        let stats = Arc::new(ApplierStatsInternal::default());

        tokio::spawn(run_node_loop(self.cache.clone(), node_rx, stats.clone()));
        tokio::spawn(run_workload_loop(self.cache, workload_rx, stats.clone()));

        info!(
            "Event appliers started with channel_capacity={}",
            self.config.channel_capacity
        );

        EventApplierHandle {
            nodes,
            workloads,
            stats,
        }
    }
}

async fn run_node_loop(
    cache: Arc<ClusterCache>,
    mut receiver: mpsc::Receiver<WatchEvent<NodeRecord>>,
    stats: Arc<ApplierStatsInternal>,
) {
    while let Some(event) = receiver.recv().await {
        stats.node_events.fetch_add(1, Ordering::Relaxed);
        match event {
            WatchEvent::Added(node) => {
                debug!("Node added: {}", node.name);
                cache.on_node_added(&node);
            }
            WatchEvent::Updated(node) => cache.on_node_updated(&node),
            WatchEvent::Removed(node) => {
                debug!("Node removed: {}", node.name);
                cache.on_node_removed(&node);
            }
            WatchEvent::Synced => cache.mark_nodes_synced(),
        }
    }
    info!("Node event applier shutting down");
}

async fn run_workload_loop(
    cache: Arc<ClusterCache>,
    mut receiver: mpsc::Receiver<WatchEvent<WorkloadRecord>>,
    stats: Arc<ApplierStatsInternal>,
) {
    while let Some(event) = receiver.recv().await {
        stats.workload_events.fetch_add(1, Ordering::Relaxed);
        match event {
            WatchEvent::Added(workload) => cache.on_workload_added(&workload),
            WatchEvent::Updated(workload) => cache.on_workload_updated(&workload),
            WatchEvent::Removed(workload) => {
                debug!("Workload removed: {}", workload.key());
                cache.on_workload_removed(&workload);
            }
            WatchEvent::Synced => cache.mark_workloads_synced(),
        }
    }
    info!("Workload event applier shutting down");
}
