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

//! Cluster State Cache
//!
//! Two tables, each behind its own reader/writer lock:
//!
//! ```text
//! nodes:     name          -> Arc<Node>
//! workloads: namespace/name -> Workload (holds Weak<Node>)
//! ```
//!
//! The two locks are never held at the same time. Anything that needs a node
//! while touching a workload copies the `Arc` out of the node table first and
//! releases that lock before taking the workload lock.
//!
//! Handlers are idempotent under redelivery and accept events in any order: a
//! workload naming a node that has not arrived yet simply stays unbound.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::watch;

use crate::catalog::{InstanceCatalog, PriceClass, FIXED_RATE_TYPE};
use crate::cost::workload_cost;
use crate::model::{
    CapacityClass, CostBreakdown, Node, NodeRecord, Workload, WorkloadKey, WorkloadRecord,
    WorkloadResources, INSTANCE_TYPE_LABEL,
};

/// Read-only copy of one workload, taken under the workload read lock.
#[derive(Debug, Clone, Serialize)]
pub struct WorkloadView {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub node_name: Option<String>,
    pub instance_type: Option<String>,
    pub price_class: Option<PriceClass>,
    pub reservation: WorkloadResources,
    pub usage: WorkloadResources,
    pub cost: Option<CostBreakdown>,
}

/// Point-in-time view of both tables.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pub nodes: Vec<Arc<Node>>,
    pub workloads: Vec<WorkloadView>,
}

/// Counters from one full recomputation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RecomputeStats {
    pub workloads: usize,
    pub costed: usize,
    pub uncosted: usize,
    pub usage_updated: usize,
}

#[derive(Debug, Clone, Copy, Default)]
struct SyncState {
    nodes: bool,
    workloads: bool,
}

impl SyncState {
    fn complete(&self) -> bool {
        self.nodes && self.workloads
    }
}

pub struct ClusterCache {
    catalog: Arc<InstanceCatalog>,
    nodes: RwLock<HashMap<String, Arc<Node>>>,
    workloads: RwLock<HashMap<WorkloadKey, Workload>>,
    /// Bumped whenever a node `Arc` is replaced or dropped, before its
    /// workloads are rebound.
    node_epoch: AtomicU64,
    synced: watch::Sender<SyncState>,
}

impl ClusterCache {
    pub fn new(catalog: Arc<InstanceCatalog>) -> Self {
        let (synced, _) = watch::channel(SyncState::default());
        Self {
            catalog,
            nodes: RwLock::new(HashMap::new()),
            workloads: RwLock::new(HashMap::new()),
            node_epoch: AtomicU64::new(0),
            synced,
        }
    }

    pub fn catalog(&self) -> &Arc<InstanceCatalog> {
        &self.catalog
    }

    // ============ Nodes ============

    /// Record a new node, resolving its price tier once.
    ///
    /// Redelivery of an add for a known node changes nothing.
    pub fn on_node_added(&self, record: &NodeRecord) {
        if self.nodes.read().contains_key(&record.name) {
            tracing::debug!("Node {} already known, ignoring add", record.name);
            return;
        }

        let node = Arc::new(self.resolve_node(record));
        self.nodes
            .write()
            .entry(record.name.clone())
            .or_insert(node);
    }

    /// Refresh a node's labels. The instance type and resolved rate never
    /// change for the lifetime of a node.
    pub fn on_node_updated(&self, record: &NodeRecord) {
        let replacement = {
            let mut nodes = self.nodes.write();
            let Some(existing) = nodes.get(&record.name).cloned() else {
                drop(nodes);
                tracing::debug!("Update for unknown node {}, treating as add", record.name);
                self.on_node_added(record);
                return;
            };

            if existing.labels == record.labels {
                return;
            }

            let updated = Arc::new(Node {
                name: existing.name.clone(),
                zone: record.zone().to_string(),
                region: record.region().to_string(),
                labels: record.labels.clone(),
                instance_type: existing.instance_type.clone(),
                resolved_rate: existing.resolved_rate.clone(),
            });
            nodes.insert(record.name.clone(), updated.clone());
            updated
        };

        self.node_epoch.fetch_add(1, Ordering::SeqCst);
        self.rebind_workloads(&record.name, Arc::downgrade(&replacement));
    }

    /// Forget a node. Workloads that referenced it become uncosted.
    pub fn on_node_removed(&self, record: &NodeRecord) {
        let removed = self.nodes.write().remove(&record.name);
        if removed.is_some() {
            self.node_epoch.fetch_add(1, Ordering::SeqCst);
            self.rebind_workloads(&record.name, Weak::new());
        }
    }

    pub fn node(&self, name: &str) -> Option<Arc<Node>> {
        self.nodes.read().get(name).cloned()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.read().len()
    }

    fn resolve_node(&self, record: &NodeRecord) -> Node {
        let zone = record.zone().to_string();
        let class = record.capacity_class();

        let (instance_type, resolved_rate) = match class {
            CapacityClass::Serverless => {
                (Some(FIXED_RATE_TYPE.to_string()), self.catalog.fixed_rate())
            }
            CapacityClass::OnDemand | CapacityClass::Spot => {
                let instance_type = record.label(INSTANCE_TYPE_LABEL).map(str::to_string);
                let instance = instance_type
                    .as_deref()
                    .and_then(|t| self.catalog.lookup(t));
                let rate = instance.and_then(|mut instance| {
                    if class == CapacityClass::Spot {
                        if let Some(spot) = instance.spot_by_zone.remove(&zone) {
                            return Some(spot);
                        }
                        tracing::debug!(
                            "No spot price for {} in {:?}, using on-demand",
                            instance.type_id,
                            zone
                        );
                    }
                    instance.on_demand
                });
                (instance_type, rate)
            }
        };

        if resolved_rate.is_none() {
            tracing::debug!(
                "Node {} ({:?}) has no priced rate, its workloads will be uncosted",
                record.name,
                instance_type
            );
        }

        Node {
            name: record.name.clone(),
            zone,
            region: record.region().to_string(),
            labels: record.labels.clone(),
            instance_type,
            resolved_rate,
        }
    }

    fn rebind_workloads(&self, node_name: &str, node: Weak<Node>) {
        let live = node.upgrade();
        let mut workloads = self.workloads.write();
        for workload in workloads.values_mut() {
            if workload.node_name.as_deref() == Some(node_name) {
                workload.node = node.clone();
                workload.cost = workload_cost(workload, live.as_deref());
            }
        }
    }

    // ============ Workloads ============

    /// Record a workload. Unscheduled workloads are ignored until an update
    /// reports a node assignment.
    pub fn on_workload_added(&self, record: &WorkloadRecord) {
        if record.assigned_node().is_none() {
            tracing::debug!("Ignoring unscheduled workload {}", record.key());
            return;
        }
        self.upsert_workload(record);
    }

    /// Apply a workload update. A first node assignment creates the record;
    /// any assignment rebinds the node and recomputes cost immediately.
    pub fn on_workload_updated(&self, record: &WorkloadRecord) {
        if record.assigned_node().is_some() {
            self.upsert_workload(record);
            return;
        }

        let mut workloads = self.workloads.write();
        if let Some(existing) = workloads.get_mut(&record.key()) {
            existing.labels = record.labels.clone();
            existing.reservation = record.reservation();
            existing.provisioned = record.provisioned_capacity();
        }
    }

    pub fn on_workload_removed(&self, record: &WorkloadRecord) {
        self.workloads.write().remove(&record.key());
    }

    pub fn workload(&self, key: &WorkloadKey) -> Option<Workload> {
        self.workloads.read().get(key).cloned()
    }

    pub fn workload_count(&self) -> usize {
        self.workloads.read().len()
    }

    fn upsert_workload(&self, record: &WorkloadRecord) {
        loop {
            let epoch = self.node_epoch.load(Ordering::SeqCst);
            // node lock is released before the workload lock is taken
            let node = record.assigned_node().and_then(|name| self.node(name));
            if node.is_none() {
                tracing::debug!(
                    "Workload {} assigned to unknown node {:?}",
                    record.key(),
                    record.assigned_node()
                );
            }

            if self.try_store_workload(record, node.as_ref(), epoch) {
                return;
            }
            tracing::debug!("Node table changed while binding {}, retrying", record.key());
        }
    }

    /// Write the workload bound to `node`, unless a node was replaced or
    /// removed since `epoch` was read. A concurrent rebind either already ran
    /// (epoch moved, caller retries) or runs after this write.
    fn try_store_workload(
        &self,
        record: &WorkloadRecord,
        node: Option<&Arc<Node>>,
        epoch: u64,
    ) -> bool {
        let reservation = record.reservation();
        let provisioned = record.provisioned_capacity();
        let weak = node.map(Arc::downgrade).unwrap_or_default();

        let mut workloads = self.workloads.write();
        if self.node_epoch.load(Ordering::SeqCst) != epoch {
            return false;
        }

        let workload = workloads.entry(record.key()).or_insert_with(|| Workload {
            name: record.name.clone(),
            namespace: record.namespace.clone(),
            labels: HashMap::new(),
            reservation: WorkloadResources::default(),
            usage: WorkloadResources::default(),
            provisioned: None,
            node_name: None,
            node: Weak::new(),
            cost: None,
        });
        workload.labels = record.labels.clone();
        workload.reservation = reservation;
        workload.provisioned = provisioned;
        workload.node_name = record.assigned_node().map(str::to_string);
        workload.node = weak;
        workload.cost = workload_cost(workload, node.map(|n| &**n));
        true
    }

    // ============ Recompute ============

    /// Overwrite usage and recompute every workload's cost in one pass.
    ///
    /// The workload write lock is held for the whole pass, so readers see
    /// either the previous or the new set of costs. Node references are
    /// re-resolved by name from a copy of the node table taken beforehand.
    /// Workloads missing from `usage` keep their previous usage.
    pub fn recompute(&self, usage: Option<&HashMap<WorkloadKey, WorkloadResources>>) -> RecomputeStats {
        let (nodes, mut workloads) = loop {
            let epoch = self.node_epoch.load(Ordering::SeqCst);
            let nodes = self.nodes.read().clone();
            let workloads = self.workloads.write();
            if self.node_epoch.load(Ordering::SeqCst) == epoch {
                break (nodes, workloads);
            }
        };

        let mut stats = RecomputeStats::default();
        for (key, workload) in workloads.iter_mut() {
            if let Some(sample) = usage.and_then(|u| u.get(key)) {
                workload.usage = *sample;
                stats.usage_updated += 1;
            }

            let node = workload
                .node_name
                .as_deref()
                .and_then(|name| nodes.get(name))
                .cloned();
            workload.node = node.as_ref().map(Arc::downgrade).unwrap_or_default();
            workload.cost = workload_cost(workload, node.as_deref());

            stats.workloads += 1;
            if workload.cost.is_some() {
                stats.costed += 1;
            } else {
                stats.uncosted += 1;
            }
        }
        stats
    }

    /// Copy both tables for reporting. The node table is copied first and
    /// released before the workload table is read.
    pub fn snapshot(&self) -> ClusterSnapshot {
        let mut nodes: Vec<Arc<Node>> = self.nodes.read().values().cloned().collect();
        nodes.sort_by(|a, b| a.name.cmp(&b.name));

        let mut workloads: Vec<WorkloadView> = self
            .workloads
            .read()
            .values()
            .map(|w| {
                let node = w.node();
                WorkloadView {
                    name: w.name.clone(),
                    namespace: w.namespace.clone(),
                    labels: w.labels.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                    node_name: w.node_name.clone(),
                    instance_type: node.as_ref().and_then(|n| n.instance_type.clone()),
                    price_class: node
                        .as_ref()
                        .and_then(|n| n.resolved_rate.as_ref())
                        .map(|r| r.class().clone()),
                    reservation: w.reservation,
                    usage: w.usage,
                    cost: w.cost,
                }
            })
            .collect();
        workloads.sort_by(|a, b| (&a.namespace, &a.name).cmp(&(&b.namespace, &b.name)));

        ClusterSnapshot { nodes, workloads }
    }

    // ============ Cache-synced barrier ============

    pub fn mark_nodes_synced(&self) {
        self.synced.send_modify(|s| s.nodes = true);
        tracing::info!("Node table synced ({} nodes)", self.node_count());
    }

    pub fn mark_workloads_synced(&self) {
        self.synced.send_modify(|s| s.workloads = true);
        tracing::info!("Workload table synced ({} workloads)", self.workload_count());
    }

    /// Both tables have ingested their initial listing.
    pub fn is_synced(&self) -> bool {
        self.synced.borrow().complete()
    }

    /// Wait for the cache-synced barrier.
    pub async fn wait_until_synced(&self) {
        let mut rx = self.synced.subscribe();
        // the sender lives in `self`, so the channel cannot close while we wait
        let _ = rx.wait_for(SyncState::complete).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ContainerRequests, CAPACITY_PROVISIONED_ANNOTATION, GIB};

    fn catalog() -> Arc<InstanceCatalog> {
        let catalog = InstanceCatalog::default();
        catalog.upsert_shape("m5.large", 2, 8192).unwrap();
        catalog.upsert_on_demand_price("m5.large", 0.096).unwrap();
        catalog.upsert_spot_price("m5.large", "us-east-1a", 0.035).unwrap();
        catalog.set_fixed_rate(0.04048, 0.004445).unwrap();
        Arc::new(catalog)
    }

    fn node_record(name: &str, labels: &[(&str, &str)]) -> NodeRecord {
        let mut all: HashMap<String, String> = [
            ("topology.kubernetes.io/zone", "us-east-1a"),
            ("topology.kubernetes.io/region", "us-east-1"),
            ("node.kubernetes.io/instance-type", "m5.large"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        for (k, v) in labels {
            all.insert(k.to_string(), v.to_string());
        }
        NodeRecord {
            name: name.into(),
            labels: all,
        }
    }

    fn workload_record(name: &str, node: Option<&str>) -> WorkloadRecord {
        WorkloadRecord {
            name: name.into(),
            namespace: "default".into(),
            node_name: node.map(str::to_string),
            containers: vec![ContainerRequests {
                cpu: Some("1".into()),
                memory: Some("1Gi".into()),
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_node_price_tier_resolution() {
        let cache = ClusterCache::new(catalog());
        cache.on_node_added(&node_record("od", &[]));
        cache.on_node_added(&node_record("spot", &[("karpenter.sh/capacity-type", "spot")]));
        cache.on_node_added(&node_record(
            "spot-other-zone",
            &[
                ("karpenter.sh/capacity-type", "spot"),
                ("topology.kubernetes.io/zone", "us-east-1f"),
            ],
        ));
        cache.on_node_added(&node_record(
            "fargate-ip-1",
            &[("eks.amazonaws.com/compute-type", "fargate")],
        ));
        cache.on_node_added(&node_record(
            "legacy",
            &[("node.kubernetes.io/instance-type", "m1.small")],
        ));

        let class = |name: &str| {
            cache
                .node(name)
                .unwrap()
                .resolved_rate
                .as_ref()
                .map(|r| r.class().clone())
        };
        assert_eq!(class("od"), Some(PriceClass::OnDemand));
        assert_eq!(
            class("spot"),
            Some(PriceClass::Spot {
                zone: "us-east-1a".into()
            })
        );
        assert_eq!(class("spot-other-zone"), Some(PriceClass::OnDemand));
        assert_eq!(class("fargate-ip-1"), Some(PriceClass::FixedRate));
        assert_eq!(class("legacy"), None);
        assert_eq!(cache.node_count(), 5);
    }

    #[test]
    fn test_node_add_redelivery_is_idempotent() {
        let cache = ClusterCache::new(catalog());
        let record = node_record("n1", &[]);
        cache.on_node_added(&record);
        let first = cache.node("n1").unwrap();

        cache.on_node_added(&node_record("n1", &[("karpenter.sh/capacity-type", "spot")]));
        let second = cache.node("n1").unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.resolved_rate, second.resolved_rate);
    }

    #[test]
    fn test_node_update_keeps_rate() {
        let cache = ClusterCache::new(catalog());
        cache.on_node_added(&node_record("n1", &[]));
        cache.on_workload_added(&workload_record("w1", Some("n1")));

        cache.on_node_updated(&node_record(
            "n1",
            &[("karpenter.sh/capacity-type", "spot"), ("team", "data")],
        ));

        let node = cache.node("n1").unwrap();
        assert_eq!(node.labels.get("team").map(String::as_str), Some("data"));
        assert_eq!(
            node.resolved_rate.as_ref().map(|r| r.class().clone()),
            Some(PriceClass::OnDemand)
        );

        let workload = cache.workload(&WorkloadKey::new("default", "w1")).unwrap();
        assert!(workload.node().is_some());
        assert!(workload.cost.is_some());
    }

    #[test]
    fn test_unscheduled_workload_is_ignored() {
        let cache = ClusterCache::new(catalog());
        cache.on_workload_added(&workload_record("pending", None));
        assert_eq!(cache.workload_count(), 0);

        cache.on_workload_updated(&workload_record("pending", None));
        assert_eq!(cache.workload_count(), 0);
    }

    #[test]
    fn test_update_with_assignment_creates_workload() {
        let cache = ClusterCache::new(catalog());
        cache.on_node_added(&node_record("n1", &[]));
        cache.on_workload_added(&workload_record("w1", None));
        cache.on_workload_updated(&workload_record("w1", Some("n1")));

        let workload = cache.workload(&WorkloadKey::new("default", "w1")).unwrap();
        assert_eq!(workload.reservation.cpu_millicores, 1000);
        // usage is zero until the first poll, so reservation sets the floor
        let cost = workload.cost.unwrap();
        assert!((cost.total - (cost.cpu_reserved_cost + cost.memory_reserved_cost)).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_order_node_arrival() {
        let cache = ClusterCache::new(catalog());
        let key = WorkloadKey::new("default", "w1");

        cache.on_workload_updated(&workload_record("w1", Some("late-node")));
        let workload = cache.workload(&key).unwrap();
        assert!(workload.node().is_none());
        assert!(workload.cost.is_none());

        cache.on_node_added(&node_record("late-node", &[]));
        cache.on_workload_updated(&workload_record("w1", Some("late-node")));
        let workload = cache.workload(&key).unwrap();
        assert_eq!(workload.node().unwrap().name, "late-node");
        assert!(workload.cost.is_some());
    }

    #[test]
    fn test_node_removal_uncosts_workloads() {
        let cache = ClusterCache::new(catalog());
        let key = WorkloadKey::new("default", "w1");
        cache.on_node_added(&node_record("n1", &[]));
        cache.on_workload_added(&workload_record("w1", Some("n1")));
        assert!(cache.workload(&key).unwrap().cost.is_some());

        cache.on_node_removed(&node_record("n1", &[]));
        let workload = cache.workload(&key).unwrap();
        assert!(workload.node().is_none());
        assert!(workload.cost.is_none());

        let stats = cache.recompute(None);
        assert_eq!(stats.uncosted, 1);
        assert!(cache.workload(&key).unwrap().cost.is_none());
    }

    #[test]
    fn test_binding_against_removed_node_is_retried() {
        let cache = ClusterCache::new(catalog());
        let key = WorkloadKey::new("default", "w1");
        let record = workload_record("w1", Some("n1"));
        cache.on_node_added(&node_record("n1", &[]));

        // node copied out, then removed before the workload lock is taken
        let epoch = cache.node_epoch.load(Ordering::SeqCst);
        let stale = cache.node("n1");
        cache.on_node_removed(&node_record("n1", &[]));

        assert!(!cache.try_store_workload(&record, stale.as_ref(), epoch));
        assert!(cache.workload(&key).is_none());

        cache.on_workload_added(&record);
        let workload = cache.workload(&key).unwrap();
        assert!(workload.node().is_none());
        assert!(workload.cost.is_none());
    }

    #[test]
    fn test_recompute_applies_usage_and_rebinds() {
        let cache = ClusterCache::new(catalog());
        let key = WorkloadKey::new("default", "w1");
        cache.on_workload_added(&workload_record("w1", Some("n1")));
        cache.on_node_added(&node_record("n1", &[]));

        let mut usage = HashMap::new();
        usage.insert(key.clone(), WorkloadResources::new(2000, 2 * GIB as u64));
        let stats = cache.recompute(Some(&usage));

        assert_eq!(
            stats,
            RecomputeStats {
                workloads: 1,
                costed: 1,
                uncosted: 0,
                usage_updated: 1,
            }
        );
        let workload = cache.workload(&key).unwrap();
        let cost = workload.cost.unwrap();
        assert!(cost.cpu_cost > cost.cpu_reserved_cost);
        assert!((cost.total - (cost.cpu_cost + cost.memory_cost)).abs() < 1e-12);

        // a later pass without usage keeps the last sample
        cache.recompute(None);
        assert_eq!(cache.workload(&key).unwrap().usage.cpu_millicores, 2000);
    }

    #[test]
    fn test_serverless_workload_costing() {
        let cache = ClusterCache::new(catalog());
        cache.on_node_added(&node_record(
            "fargate-ip-1",
            &[("eks.amazonaws.com/compute-type", "fargate")],
        ));

        let mut good = workload_record("good", Some("fargate-ip-1"));
        good.annotations
            .insert(CAPACITY_PROVISIONED_ANNOTATION.into(), "0.25vCPU 0.5GB".into());
        let mut bad = workload_record("bad", Some("fargate-ip-1"));
        bad.annotations
            .insert(CAPACITY_PROVISIONED_ANNOTATION.into(), "quarter".into());
        cache.on_workload_added(&good);
        cache.on_workload_added(&bad);

        let good = cache.workload(&WorkloadKey::new("default", "good")).unwrap();
        assert!((good.cost.unwrap().total - (0.25 * 0.04048 + 0.5 * 0.004445)).abs() < 1e-12);
        assert!(cache
            .workload(&WorkloadKey::new("default", "bad"))
            .unwrap()
            .cost
            .is_none());
    }

    #[test]
    fn test_snapshot_projects_node_details() {
        let cache = ClusterCache::new(catalog());
        cache.on_node_added(&node_record("n1", &[]));
        cache.on_workload_added(&workload_record("w1", Some("n1")));
        cache.on_workload_added(&workload_record("w2", Some("missing")));

        let snapshot = cache.snapshot();
        assert_eq!(snapshot.nodes.len(), 1);
        assert_eq!(snapshot.workloads.len(), 2);

        let w1 = &snapshot.workloads[0];
        assert_eq!(w1.instance_type.as_deref(), Some("m5.large"));
        assert_eq!(w1.price_class, Some(PriceClass::OnDemand));

        let w2 = &snapshot.workloads[1];
        assert_eq!(w2.node_name.as_deref(), Some("missing"));
        assert!(w2.instance_type.is_none());
        assert!(w2.cost.is_none());
    }

    #[test]
    fn test_workload_removal() {
        let cache = ClusterCache::new(catalog());
        cache.on_workload_added(&workload_record("w1", Some("n1")));
        cache.on_workload_removed(&workload_record("w1", Some("n1")));
        cache.on_workload_removed(&workload_record("w1", Some("n1")));
        assert_eq!(cache.workload_count(), 0);
    }

    #[tokio::test]
    async fn test_sync_barrier() {
        let cache = Arc::new(ClusterCache::new(catalog()));
        assert!(!cache.is_synced());

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move { cache.wait_until_synced().await })
        };

        cache.mark_nodes_synced();
        assert!(!cache.is_synced());
        cache.mark_workloads_synced();
        assert!(cache.is_synced());

        tokio::time::timeout(std::time::Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }
}
