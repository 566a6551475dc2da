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

//! Rate Normalizer
//!
//! Splits an instance's hourly price into a per-vCPU-hour and a
//! per-GiB-hour rate. Providers do not publish how an instance price divides
//! between CPU and memory, so a fixed cross-resource ratio `R` is assumed:
//! one vCPU-hour costs as much as `R` GiB-hours of memory.
//!
//! ```text
//! memory_rate = price / (R * vcpu + memory_gib)
//! vcpu_rate   = R * memory_rate
//! ```
//!
//! The split is exact: `vcpu_rate * vcpu + memory_rate * memory_gib == price`.

use serde::{Deserialize, Serialize};

use crate::error::{ClusterCostError, Result};

/// Default ratio, borrowed from a published CPU/memory price relationship.
pub const DEFAULT_CPU_MEMORY_RATIO: f64 = 7.2;

/// Mebibytes per gibibyte.
pub const MIB_PER_GIB: f64 = 1024.0;

/// Validated cross-resource price ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct CpuMemoryRatio(f64);

impl CpuMemoryRatio {
    pub fn new(ratio: f64) -> Result<Self> {
        if ratio.is_finite() && ratio > 0.0 {
            Ok(Self(ratio))
        } else {
            Err(ClusterCostError::InvalidRatio(ratio))
        }
    }

    pub fn get(self) -> f64 {
        self.0
    }
}

impl Default for CpuMemoryRatio {
    fn default() -> Self {
        Self(DEFAULT_CPU_MEMORY_RATIO)
    }
}

impl TryFrom<f64> for CpuMemoryRatio {
    type Error = ClusterCostError;

    fn try_from(value: f64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<CpuMemoryRatio> for f64 {
    fn from(value: CpuMemoryRatio) -> Self {
        value.0
    }
}

/// Per-resource hourly rates derived from a total price.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceRates {
    /// Price of one vCPU for one hour
    pub vcpu_rate: f64,
    /// Price of one GiB of memory for one hour
    pub memory_rate: f64,
}

/// Partition `total_hourly_price` across `vcpu_count` vCPUs and `memory_gib`
/// GiB of memory.
///
/// The caller has already validated the shape; a zero or negative input here
/// still returns an error rather than dividing by zero.
pub fn normalize(
    type_id: &str,
    total_hourly_price: f64,
    vcpu_count: u32,
    memory_gib: f64,
    ratio: CpuMemoryRatio,
) -> Result<ResourceRates> {
    if !total_hourly_price.is_finite() || total_hourly_price < 0.0 {
        return Err(ClusterCostError::InvalidPrice {
            type_id: type_id.to_string(),
            price: total_hourly_price,
        });
    }
    if vcpu_count == 0 || memory_gib.is_nan() || memory_gib <= 0.0 {
        return Err(ClusterCostError::InvalidShape {
            type_id: type_id.to_string(),
            vcpu_count,
            memory_mib: (memory_gib.max(0.0) * MIB_PER_GIB) as u64,
        });
    }

    let r = ratio.get();
    let memory_rate = total_hourly_price / (r * f64::from(vcpu_count) + memory_gib);
    let vcpu_rate = r * memory_rate;

    Ok(ResourceRates {
        vcpu_rate,
        memory_rate,
    })
}
