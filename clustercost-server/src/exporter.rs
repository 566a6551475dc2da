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

//! Prometheus exposition of the cost report.
//!
//! Every scrape resets the cost gauges and sets them from the current
//! report, so workloads and nodes that left the cluster disappear from the
//! output. Uncosted rows are exported as zero.

use clustercost_core::{CostBreakdown, CostReport, LabelProjection, PollOutcome};
use parking_lot::Mutex;
use prometheus::{Encoder, Gauge, GaugeVec, IntCounter, Opts, Registry, TextEncoder};
use std::collections::{BTreeMap, HashSet};
use std::time::Duration;
use thiserror::Error;

pub const METRIC_NAMESPACE: &str = "eks_cost";

const POD_LABELS: [&str; 5] = ["pod", "namespace", "node", "type", "lifecycle"];
const NODE_LABELS: [&str; 5] = ["node", "region", "az", "type", "lifecycle"];

#[derive(Debug, Error)]
pub enum ExporterError {
    #[error("metrics registry error: {0}")]
    Registry(#[from] prometheus::Error),

    #[error("metrics output is not valid UTF-8: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),
}

/// Turn a label key such as `app.kubernetes.io/name` into a valid
/// Prometheus label name (`app_kubernetes_io_name`).
pub fn sanitize_label(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if name.is_empty() || name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    name
}

/// Source label key and its metric label name, in allow-list order.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ExtraLabel {
    key: String,
    name: String,
}

fn extra_labels(keys: &[String], reserved: &[&str]) -> Vec<ExtraLabel> {
    let mut taken: HashSet<String> = reserved.iter().map(|s| s.to_string()).collect();
    let mut extras = Vec::with_capacity(keys.len());
    for key in keys {
        let mut name = sanitize_label(key);
        if reserved.contains(&name.as_str()) {
            name = format!("label_{}", name);
        }
        if !taken.insert(name.clone()) {
            tracing::warn!("Label {:?} maps to duplicate metric label {:?}, skipping", key, name);
            continue;
        }
        extras.push(ExtraLabel {
            key: key.clone(),
            name,
        });
    }
    extras
}

fn gauge_vec(
    registry: &Registry,
    name: &str,
    help: &str,
    base: &[&str],
    extras: &[ExtraLabel],
) -> Result<GaugeVec, ExporterError> {
    let labels: Vec<&str> = base
        .iter()
        .copied()
        .chain(extras.iter().map(|e| e.name.as_str()))
        .collect();
    let gauge = GaugeVec::new(Opts::new(name, help).namespace(METRIC_NAMESPACE), &labels)?;
    registry.register(Box::new(gauge.clone()))?;
    Ok(gauge)
}

struct PodGauges {
    total: GaugeVec,
    cpu: GaugeVec,
    memory: GaugeVec,
    cpu_requests: GaugeVec,
    memory_requests: GaugeVec,
}

struct NodeGauges {
    total: GaugeVec,
    cpu: GaugeVec,
    memory: GaugeVec,
}

pub struct CostExporter {
    registry: Registry,
    pod: PodGauges,
    node: NodeGauges,
    pod_extras: Vec<ExtraLabel>,
    node_extras: Vec<ExtraLabel>,
    scrapes_total: IntCounter,
    scrape_duration: Gauge,
    scrape_error: Gauge,
    /// Serializes reset, set and gather across concurrent scrapes
    scrape_lock: Mutex<()>,
}

impl CostExporter {
    pub fn new(projection: &LabelProjection) -> Result<Self, ExporterError> {
        let registry = Registry::new();
        let pod_extras = extra_labels(&projection.workload_labels, &POD_LABELS);
        let node_extras = extra_labels(&projection.node_labels, &NODE_LABELS);

        let pod = PodGauges {
            total: gauge_vec(&registry, "pod_total", "Cost of the pod.", &POD_LABELS, &pod_extras)?,
            cpu: gauge_vec(&registry, "pod_cpu", "Cost of the pod cpu usage.", &POD_LABELS, &pod_extras)?,
            memory: gauge_vec(&registry, "pod_memory", "Cost of the pod memory usage.", &POD_LABELS, &pod_extras)?,
            cpu_requests: gauge_vec(
                &registry,
                "pod_cpu_requests",
                "Cost of the pod cpu requests.",
                &POD_LABELS,
                &pod_extras,
            )?,
            memory_requests: gauge_vec(
                &registry,
                "pod_memory_requests",
                "Cost of the pod memory requests.",
                &POD_LABELS,
                &pod_extras,
            )?,
        };

        let node = NodeGauges {
            total: gauge_vec(&registry, "node_total", "Hourly price of the node.", &NODE_LABELS, &node_extras)?,
            cpu: gauge_vec(&registry, "node_cpu", "Hourly price of one vCPU on the node.", &NODE_LABELS, &node_extras)?,
            memory: gauge_vec(
                &registry,
                "node_memory",
                "Hourly price of one GiB of memory on the node.",
                &NODE_LABELS,
                &node_extras,
            )?,
        };

        let scrapes_total = IntCounter::with_opts(
            Opts::new("scrapes_total", "Total cost scrapes.").namespace(METRIC_NAMESPACE),
        )?;
        let scrape_duration = Gauge::with_opts(
            Opts::new("scrape_duration_seconds", "The scrape duration.").namespace(METRIC_NAMESPACE),
        )?;
        let scrape_error = Gauge::with_opts(
            Opts::new("scrape_error", "The scrape error status.").namespace(METRIC_NAMESPACE),
        )?;
        registry.register(Box::new(scrapes_total.clone()))?;
        registry.register(Box::new(scrape_duration.clone()))?;
        registry.register(Box::new(scrape_error.clone()))?;

        Ok(Self {
            registry,
            pod,
            node,
            pod_extras,
            node_extras,
            scrapes_total,
            scrape_duration,
            scrape_error,
            scrape_lock: Mutex::new(()),
        })
    }

    /// Publish `report` and render the full exposition text.
    pub fn scrape(
        &self,
        report: &CostReport,
        outcome: &PollOutcome,
        elapsed: Duration,
    ) -> Result<String, ExporterError> {
        let _guard = self.scrape_lock.lock();

        self.scrapes_total.inc();
        self.scrape_duration.set(elapsed.as_secs_f64());
        if let PollOutcome::Completed(pass) = outcome {
            self.scrape_error
                .set(if pass.usage_error.is_some() { 1.0 } else { 0.0 });
        }

        self.set_pod_gauges(report);
        self.set_node_gauges(report);

        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }

    fn set_pod_gauges(&self, report: &CostReport) {
        let gauges = [
            &self.pod.total,
            &self.pod.cpu,
            &self.pod.memory,
            &self.pod.cpu_requests,
            &self.pod.memory_requests,
        ];
        for gauge in gauges {
            gauge.reset();
        }

        for row in &report.workloads {
            let lifecycle = row.price_class.as_ref().map(|c| c.label()).unwrap_or_default();
            let base = [
                row.name.as_str(),
                row.namespace.as_str(),
                row.node_name.as_deref().unwrap_or_default(),
                row.instance_type.as_deref().unwrap_or_default(),
                lifecycle,
            ];
            let values = label_values(&base, &self.pod_extras, &row.extra_labels);
            let cost = row.cost.unwrap_or(CostBreakdown::ZERO);

            self.pod.total.with_label_values(&values).set(cost.total);
            self.pod.cpu.with_label_values(&values).set(cost.cpu_cost);
            self.pod.memory.with_label_values(&values).set(cost.memory_cost);
            self.pod.cpu_requests.with_label_values(&values).set(cost.cpu_reserved_cost);
            self.pod
                .memory_requests
                .with_label_values(&values)
                .set(cost.memory_reserved_cost);
        }
    }

    fn set_node_gauges(&self, report: &CostReport) {
        for gauge in [&self.node.total, &self.node.cpu, &self.node.memory] {
            gauge.reset();
        }

        for row in &report.nodes {
            let lifecycle = row.price_class.as_ref().map(|c| c.label()).unwrap_or_default();
            let base = [
                row.name.as_str(),
                row.region.as_str(),
                row.zone.as_str(),
                row.instance_type.as_deref().unwrap_or_default(),
                lifecycle,
            ];
            let values = label_values(&base, &self.node_extras, &row.extra_labels);

            self.node.total.with_label_values(&values).set(row.total.unwrap_or_default());
            self.node.cpu.with_label_values(&values).set(row.cpu_rate.unwrap_or_default());
            self.node
                .memory
                .with_label_values(&values)
                .set(row.memory_rate.unwrap_or_default());
        }
    }
}

fn label_values<'a>(
    base: &[&'a str],
    extras: &[ExtraLabel],
    row_labels: &'a BTreeMap<String, String>,
) -> Vec<&'a str> {
    base.iter()
        .copied()
        .chain(extras.iter().map(|e| {
            row_labels
                .get(&e.key)
                .map(String::as_str)
                .unwrap_or_default()
        }))
        .collect()
}
