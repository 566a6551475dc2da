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

//! Cost Computation
//!
//! A workload pays for whichever is larger, what it used or what it
//! reserved, per resource:
//!
//! ```text
//! cpu_cost             = usage.vcpus        * vcpu_rate
//! cpu_reserved_cost    = reservation.vcpus  * vcpu_rate
//! memory_cost          = usage.gib          * memory_rate
//! memory_reserved_cost = reservation.gib    * memory_rate
//! total = max(cpu_cost, cpu_reserved_cost) + max(memory_cost, memory_reserved_cost)
//! ```
//!
//! Serverless workloads are billed for exactly what was provisioned, so the
//! usage and reservation columns coincide.

use crate::catalog::{PriceClass, PriceVariant};
use crate::model::{CostBreakdown, Node, ProvisionedCapacity, Workload, WorkloadResources};

/// Cost of a workload on an instance-priced node.
pub fn compute(
    usage: &WorkloadResources,
    reservation: &WorkloadResources,
    rate: &PriceVariant,
) -> CostBreakdown {
    let cpu_cost = usage.vcpus() * rate.vcpu_rate();
    let cpu_reserved_cost = reservation.vcpus() * rate.vcpu_rate();
    let memory_cost = usage.memory_gib() * rate.memory_rate();
    let memory_reserved_cost = reservation.memory_gib() * rate.memory_rate();

    CostBreakdown {
        total: cpu_cost.max(cpu_reserved_cost) + memory_cost.max(memory_reserved_cost),
        cpu_cost,
        memory_cost,
        cpu_reserved_cost,
        memory_reserved_cost,
    }
}

/// Cost of a serverless workload from its provisioned capacity.
pub fn compute_fixed_rate(capacity: &ProvisionedCapacity, rate: &PriceVariant) -> CostBreakdown {
    let cpu_cost = capacity.vcpu * rate.vcpu_rate();
    let memory_cost = capacity.memory_gib * rate.memory_rate();

    CostBreakdown {
        total: cpu_cost + memory_cost,
        cpu_cost,
        memory_cost,
        cpu_reserved_cost: cpu_cost,
        memory_reserved_cost: memory_cost,
    }
}

/// Full cost of a workload given its (possibly missing) node.
///
/// Returns `None` when the workload cannot be costed: no node, a node whose
/// instance type is unpriced, or a serverless workload without a usable
/// capacity annotation.
pub fn workload_cost(workload: &Workload, node: Option<&Node>) -> Option<CostBreakdown> {
    let rate = node?.resolved_rate.as_ref()?;
    match rate.class() {
        PriceClass::OnDemand | PriceClass::Spot { .. } => {
            Some(compute(&workload.usage, &workload.reservation, rate))
        }
        PriceClass::FixedRate => workload
            .provisioned
            .as_ref()
            .map(|capacity| compute_fixed_rate(capacity, rate)),
    }
}
