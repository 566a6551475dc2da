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

//! Clustercost Core
//!
//! Per-workload cost attribution for a Kubernetes cluster: instance prices
//! are split into per-vCPU and per-GiB rates, nodes are priced once when
//! they join, and every workload is billed for the larger of what it used
//! and what it reserved.

pub mod catalog;
pub mod cluster;
pub mod cost;
pub mod error;
pub mod events;
pub mod model;
pub mod quantity;
pub mod rate;
pub mod report;
pub mod snapshot;
pub mod source;

pub use catalog::{
    CatalogLoadStats, Instance, InstanceCatalog, InstanceShape, PriceClass, PriceRecord,
    PriceVariant, FIXED_RATE_TYPE,
};
pub use cluster::{ClusterCache, ClusterSnapshot, RecomputeStats, WorkloadView};
pub use cost::{compute, compute_fixed_rate, workload_cost};
pub use error::{ClusterCostError, Result};
pub use events::{
    ApplierStats, ClusterEvent, EventApplier, EventApplierConfig, EventApplierHandle, WatchEvent,
};
pub use model::{
    CapacityClass, ContainerRequests, CostBreakdown, Node, NodeRecord, ProvisionedCapacity,
    Workload, WorkloadKey, WorkloadRecord, WorkloadResources,
};
pub use rate::{normalize, CpuMemoryRatio, ResourceRates, DEFAULT_CPU_MEMORY_RATIO};
pub use report::{parse_label_list, CostReport, LabelProjection, NodeCostRow, WorkloadCostRow};
pub use snapshot::{PassReport, PollOutcome, PollStats, SnapshotOrchestrator};
pub use source::{
    refresh_catalog, CatalogRefresh, PriceSource, ShapeSource, SourceError, UsageSample,
    UsageSource,
};
