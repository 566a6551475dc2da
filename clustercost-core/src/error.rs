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

use thiserror::Error;

/// Errors raised while building rates or ingesting cluster records.
///
/// None of these abort a costing pass: callers log the error and skip the
/// offending record, leaving the affected workload or node uncosted.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ClusterCostError {
    #[error("unknown instance type: {0}")]
    UnknownInstanceType(String),

    #[error("invalid shape for instance type {type_id}: {vcpu_count} vCPU, {memory_mib} MiB")]
    InvalidShape {
        type_id: String,
        vcpu_count: u32,
        memory_mib: u64,
    },

    #[error("invalid hourly price {price} for instance type {type_id}")]
    InvalidPrice { type_id: String, price: f64 },

    #[error("cpu:memory price ratio must be positive and finite, got {0}")]
    InvalidRatio(f64),

    #[error("malformed resource quantity: {0:?}")]
    MalformedQuantity(String),

    #[error("malformed capacity annotation: {0:?}")]
    MalformedCapacity(String),

    #[error("{0} event applier is not running")]
    ApplierClosed(&'static str),
}

pub type Result<T> = std::result::Result<T, ClusterCostError>;
