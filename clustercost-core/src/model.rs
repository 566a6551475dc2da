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

//! Cluster data model: raw membership records as delivered by the watch, and
//! the Node / Workload records the cache keeps.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use crate::catalog::PriceVariant;
use crate::error::{ClusterCostError, Result};
use crate::quantity::{parse_cpu_millicores, parse_memory_bytes};

pub const ZONE_LABEL: &str = "topology.kubernetes.io/zone";
pub const REGION_LABEL: &str = "topology.kubernetes.io/region";
pub const INSTANCE_TYPE_LABEL: &str = "node.kubernetes.io/instance-type";
pub const COMPUTE_TYPE_LABEL: &str = "eks.amazonaws.com/compute-type";
pub const CAPACITY_TYPE_LABELS: [&str; 2] =
    ["eks.amazonaws.com/capacityType", "karpenter.sh/capacity-type"];
pub const SERVERLESS_COMPUTE_TYPE: &str = "fargate";

/// Annotation carrying the capacity allocated to a serverless workload.
pub const CAPACITY_PROVISIONED_ANNOTATION: &str = "CapacityProvisioned";

/// Bytes per gibibyte.
pub const GIB: f64 = 1_073_741_824.0;

/// CPU and memory amounts, used for both reservation and usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadResources {
    pub cpu_millicores: u64,
    pub memory_bytes: u64,
}

impl WorkloadResources {
    pub fn new(cpu_millicores: u64, memory_bytes: u64) -> Self {
        Self {
            cpu_millicores,
            memory_bytes,
        }
    }

    pub fn vcpus(&self) -> f64 {
        self.cpu_millicores as f64 / 1000.0
    }

    pub fn memory_gib(&self) -> f64 {
        self.memory_bytes as f64 / GIB
    }
}

/// Allocated cost of one workload, per hour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBreakdown {
    pub total: f64,
    pub cpu_cost: f64,
    pub memory_cost: f64,
    pub cpu_reserved_cost: f64,
    pub memory_reserved_cost: f64,
}

impl CostBreakdown {
    pub const ZERO: CostBreakdown = CostBreakdown {
        total: 0.0,
        cpu_cost: 0.0,
        memory_cost: 0.0,
        cpu_reserved_cost: 0.0,
        memory_reserved_cost: 0.0,
    };
}

/// Capacity a serverless platform allocated to a workload.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProvisionedCapacity {
    pub vcpu: f64,
    pub memory_gib: f64,
}

impl ProvisionedCapacity {
    /// Parse an allocation string such as `"0.25vCPU 0.5GB"`.
    pub fn parse(raw: &str) -> Result<Self> {
        let malformed = || ClusterCostError::MalformedCapacity(raw.to_string());
        let mut vcpu = None;
        let mut memory_gib = None;

        for token in raw.split_whitespace() {
            if let Some(n) = token.strip_suffix("vCPU") {
                vcpu = Some(n.parse::<f64>().map_err(|_| malformed())?);
            } else if let Some(n) = token.strip_suffix("GB") {
                memory_gib = Some(n.parse::<f64>().map_err(|_| malformed())?);
            } else {
                return Err(malformed());
            }
        }

        match (vcpu, memory_gib) {
            (Some(vcpu), Some(memory_gib))
                if vcpu.is_finite() && vcpu >= 0.0 && memory_gib.is_finite() && memory_gib >= 0.0 =>
            {
                Ok(Self { vcpu, memory_gib })
            }
            _ => Err(malformed()),
        }
    }
}

/// How a node's capacity is provisioned, read from its labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityClass {
    OnDemand,
    Spot,
    Serverless,
}

/// Namespace-qualified workload name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WorkloadKey {
    pub namespace: String,
    pub name: String,
}

impl WorkloadKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for WorkloadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Node object as delivered by the membership watch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub name: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

impl NodeRecord {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn zone(&self) -> &str {
        self.label(ZONE_LABEL).unwrap_or_default()
    }

    pub fn region(&self) -> &str {
        self.label(REGION_LABEL).unwrap_or_default()
    }

    pub fn capacity_class(&self) -> CapacityClass {
        if self.label(COMPUTE_TYPE_LABEL) == Some(SERVERLESS_COMPUTE_TYPE) {
            return CapacityClass::Serverless;
        }
        let spot = CAPACITY_TYPE_LABELS
            .iter()
            .filter_map(|key| self.label(key))
            .any(|value| value.eq_ignore_ascii_case("spot"));
        if spot {
            CapacityClass::Spot
        } else {
            CapacityClass::OnDemand
        }
    }
}

/// Declared requests of one container, as quantity strings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerRequests {
    #[serde(default)]
    pub cpu: Option<String>,
    #[serde(default)]
    pub memory: Option<String>,
}

/// Workload object as delivered by the membership watch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkloadRecord {
    pub name: String,
    pub namespace: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
    /// Node assignment; absent while the workload is unscheduled
    #[serde(default)]
    pub node_name: Option<String>,
    #[serde(default)]
    pub containers: Vec<ContainerRequests>,
}

impl WorkloadRecord {
    pub fn key(&self) -> WorkloadKey {
        WorkloadKey::new(&self.namespace, &self.name)
    }

    /// Assigned node, treating an empty name as unassigned.
    pub fn assigned_node(&self) -> Option<&str> {
        self.node_name.as_deref().filter(|n| !n.is_empty())
    }

    /// Sum of container requests, saturating at `u64::MAX`. Unparsable
    /// quantities count as zero.
    pub fn reservation(&self) -> WorkloadResources {
        let mut total = WorkloadResources::default();
        for container in &self.containers {
            if let Some(cpu) = &container.cpu {
                total.cpu_millicores = total
                    .cpu_millicores
                    .saturating_add(self.quantity_or_zero(cpu, parse_cpu_millicores));
            }
            if let Some(memory) = &container.memory {
                total.memory_bytes = total
                    .memory_bytes
                    .saturating_add(self.quantity_or_zero(memory, parse_memory_bytes));
            }
        }
        total
    }

    /// Serverless allocation, if annotated. A malformed annotation is logged
    /// and treated as absent.
    pub fn provisioned_capacity(&self) -> Option<ProvisionedCapacity> {
        let raw = self.annotations.get(CAPACITY_PROVISIONED_ANNOTATION)?;
        match ProvisionedCapacity::parse(raw) {
            Ok(capacity) => Some(capacity),
            Err(e) => {
                tracing::warn!("Workload {}: {}", self.key(), e);
                None
            }
        }
    }

    fn quantity_or_zero(&self, raw: &str, parse: fn(&str) -> Result<u64>) -> u64 {
        parse(raw).unwrap_or_else(|e| {
            tracing::warn!("Workload {}: {}, counting as zero", self.key(), e);
            0
        })
    }
}

/// A cluster node and the rate it was priced at when first seen.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub name: String,
    pub zone: String,
    pub region: String,
    pub labels: HashMap<String, String>,
    pub instance_type: Option<String>,
    /// Fixed at creation; `None` when the instance type is not priced
    pub resolved_rate: Option<PriceVariant>,
}

/// A scheduled workload tracked by the cache.
#[derive(Debug, Clone)]
pub struct Workload {
    pub name: String,
    pub namespace: String,
    pub labels: HashMap<String, String>,
    pub reservation: WorkloadResources,
    pub usage: WorkloadResources,
    pub provisioned: Option<ProvisionedCapacity>,
    /// Name of the assigned node, kept for reporting even when the node
    /// itself is unknown or gone
    pub node_name: Option<String>,
    pub node: Weak<Node>,
    /// `None` means uncosted (no node or no rate), distinct from a
    /// legitimately free workload
    pub cost: Option<CostBreakdown>,
}

impl Workload {
    pub fn key(&self) -> WorkloadKey {
        WorkloadKey::new(&self.namespace, &self.name)
    }

    /// Live node, if the reference is still valid.
    pub fn node(&self) -> Option<Arc<Node>> {
        self.node.upgrade()
    }
}
