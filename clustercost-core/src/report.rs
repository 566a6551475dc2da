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

//! Cost report: the per-workload and per-node rows served to consumers.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::catalog::PriceClass;
use crate::cluster::ClusterSnapshot;
use crate::model::CostBreakdown;

/// Label keys copied from workload and node labels into extra columns.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelProjection {
    pub workload_labels: Vec<String>,
    pub node_labels: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkloadCostRow {
    pub name: String,
    pub namespace: String,
    pub node_name: Option<String>,
    pub instance_type: Option<String>,
    pub price_class: Option<PriceClass>,
    /// `None` when the workload is uncosted
    pub cost: Option<CostBreakdown>,
    pub extra_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeCostRow {
    pub name: String,
    pub region: String,
    pub zone: String,
    pub instance_type: Option<String>,
    pub price_class: Option<PriceClass>,
    pub total: Option<f64>,
    pub cpu_rate: Option<f64>,
    pub memory_rate: Option<f64>,
    pub extra_labels: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CostReport {
    pub workloads: Vec<WorkloadCostRow>,
    pub nodes: Vec<NodeCostRow>,
}

impl CostReport {
    pub fn build(snapshot: &ClusterSnapshot, projection: &LabelProjection) -> Self {
        let workloads = snapshot
            .workloads
            .iter()
            .map(|w| WorkloadCostRow {
                name: w.name.clone(),
                namespace: w.namespace.clone(),
                node_name: w.node_name.clone(),
                instance_type: w.instance_type.clone(),
                price_class: w.price_class.clone(),
                cost: w.cost,
                extra_labels: project(&projection.workload_labels, |k| w.labels.get(k)),
            })
            .collect();

        let nodes = snapshot
            .nodes
            .iter()
            .map(|n| {
                let rate = n.resolved_rate.as_ref();
                NodeCostRow {
                    name: n.name.clone(),
                    region: n.region.clone(),
                    zone: n.zone.clone(),
                    instance_type: n.instance_type.clone(),
                    price_class: rate.map(|r| r.class().clone()),
                    total: rate.map(|r| r.total_hourly_price()),
                    cpu_rate: rate.map(|r| r.vcpu_rate()),
                    memory_rate: rate.map(|r| r.memory_rate()),
                    extra_labels: project(&projection.node_labels, |k| n.labels.get(k)),
                }
            })
            .collect();

        Self { workloads, nodes }
    }
}

/// Missing labels project as empty strings so every row has every column.
fn project<'a, F>(keys: &[String], lookup: F) -> BTreeMap<String, String>
where
    F: Fn(&str) -> Option<&'a String>,
{
    keys.iter()
        .map(|k| (k.clone(), lookup(k).cloned().unwrap_or_default()))
        .collect()
}

/// Parse a comma-separated allow-list, trimming whitespace and dropping
/// empty entries.
pub fn parse_label_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
