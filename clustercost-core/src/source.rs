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

//! External data sources: instance shapes, prices and live usage.
//!
//! Implementations live with the binary; the core only depends on these
//! traits so tests can substitute in-memory sources.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Instant;
use thiserror::Error;

use crate::catalog::{CatalogLoadStats, InstanceCatalog, InstanceShape, PriceRecord};
use crate::model::{WorkloadKey, WorkloadResources};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("network error: {0}")]
    Network(String),

    #[error("failed to parse {what}: {reason}")]
    Parse { what: String, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },
}

/// Hardware shapes of every known instance type.
#[async_trait]
pub trait ShapeSource: Send + Sync {
    async fn list_shapes(&self) -> Result<Vec<InstanceShape>, SourceError>;
}

/// Current hourly prices for the configured region.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn list_prices(&self) -> Result<Vec<PriceRecord>, SourceError>;
}

/// Measured resource usage of one workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSample {
    pub namespace: String,
    pub name: String,
    pub usage: WorkloadResources,
}

/// Point-in-time usage of every running workload.
#[async_trait]
pub trait UsageSource: Send + Sync {
    async fn usage_snapshot(&self) -> Result<Vec<UsageSample>, SourceError>;
}

/// Index samples by workload. A later duplicate wins.
pub fn index_usage(samples: Vec<UsageSample>) -> HashMap<WorkloadKey, WorkloadResources> {
    samples
        .into_iter()
        .map(|s| (WorkloadKey::new(s.namespace, s.name), s.usage))
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogRefresh {
    pub shapes: CatalogLoadStats,
    pub prices: CatalogLoadStats,
}

/// Load shapes, then prices, into the catalog.
///
/// Shapes go first because a price for an unknown type is skipped. Source
/// failures are returned; individual bad records are skipped and counted.
pub async fn refresh_catalog(
    catalog: &InstanceCatalog,
    shapes: &dyn ShapeSource,
    prices: &dyn PriceSource,
) -> Result<CatalogRefresh, SourceError> {
    let start = Instant::now();

    let shape_list = shapes.list_shapes().await?;
    let shapes = catalog.apply_shapes(shape_list);

    let price_list = prices.list_prices().await?;
    let prices = catalog.apply_prices(price_list);

    tracing::info!(
        "Catalog refreshed in {:?}: {} shapes ({} skipped), {} prices ({} skipped)",
        start.elapsed(),
        shapes.applied,
        shapes.skipped,
        prices.applied,
        prices.skipped
    );

    Ok(CatalogRefresh { shapes, prices })
}
