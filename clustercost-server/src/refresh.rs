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

//! Catalog refresh: one fatal load at startup, then periodic reloads that
//! keep the previous catalog on failure.

use anyhow::{Context, Result};
use clustercost_core::{refresh_catalog, CatalogRefresh, InstanceCatalog, PriceSource, ShapeSource};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub struct CatalogRefresher {
    catalog: Arc<InstanceCatalog>,
    shapes: Arc<dyn ShapeSource>,
    prices: Arc<dyn PriceSource>,
    interval: Duration,
}

impl CatalogRefresher {
    pub fn new(
        catalog: Arc<InstanceCatalog>,
        shapes: Arc<dyn ShapeSource>,
        prices: Arc<dyn PriceSource>,
        interval: Duration,
    ) -> Self {
        Self {
            catalog,
            shapes,
            prices,
            interval,
        }
    }

    /// Initial load. Without a catalog nothing can be costed, so any source
    /// failure or an empty result is an error.
    pub async fn load_initial(&self) -> Result<CatalogRefresh> {
        let refresh = refresh_catalog(&self.catalog, self.shapes.as_ref(), self.prices.as_ref())
            .await
            .context("initial catalog load failed")?;
        if self.catalog.is_empty() {
            anyhow::bail!("initial catalog load produced no instance types");
        }
        Ok(refresh)
    }

    /// Reload once; failures are logged and the current catalog is kept.
    pub async fn refresh_once(&self) -> Option<CatalogRefresh> {
        match refresh_catalog(&self.catalog, self.shapes.as_ref(), self.prices.as_ref()).await {
            Ok(refresh) => Some(refresh),
            Err(e) => {
                tracing::warn!("Catalog refresh failed, keeping previous catalog: {}", e);
                None
            }
        }
    }

    /// Reload every interval until the task is aborted.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick fires immediately and the initial load already ran
            ticker.tick().await;

            tracing::info!("Catalog refresh every {:?}", self.interval);
            loop {
                ticker.tick().await;
                self.refresh_once().await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use clustercost_core::{InstanceShape, PriceRecord, SourceError};
    use std::sync::atomic::{AtomicBool, Ordering};

    struct Shapes;

    #[async_trait]
    impl ShapeSource for Shapes {
        async fn list_shapes(&self) -> Result<Vec<InstanceShape>, SourceError> {
            Ok(vec![InstanceShape {
                type_id: "m5.large".into(),
                vcpu_count: 2,
                memory_mib: 8192,
            }])
        }
    }

    /// Serves a price until switched off.
    struct FlakyPrices {
        up: AtomicBool,
        price: f64,
    }

    #[async_trait]
    impl PriceSource for FlakyPrices {
        async fn list_prices(&self) -> Result<Vec<PriceRecord>, SourceError> {
            if self.up.load(Ordering::SeqCst) {
                Ok(vec![PriceRecord::OnDemand {
                    type_id: "m5.large".into(),
                    total_hourly_price: self.price,
                }])
            } else {
                Err(SourceError::Network("pricing API unavailable".into()))
            }
        }
    }

    fn refresher(prices: Arc<FlakyPrices>) -> (Arc<InstanceCatalog>, CatalogRefresher) {
        let catalog = Arc::new(InstanceCatalog::default());
        let refresher = CatalogRefresher::new(
            catalog.clone(),
            Arc::new(Shapes),
            prices,
            Duration::from_secs(60),
        );
        (catalog, refresher)
    }

    #[tokio::test]
    async fn test_initial_load_failure_is_fatal() {
        let prices = Arc::new(FlakyPrices {
            up: AtomicBool::new(false),
            price: 0.096,
        });
        let (_, refresher) = refresher(prices);
        assert!(refresher.load_initial().await.is_err());
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_catalog() {
        let prices = Arc::new(FlakyPrices {
            up: AtomicBool::new(true),
            price: 0.096,
        });
        let (catalog, refresher) = refresher(prices.clone());
        refresher.load_initial().await.unwrap();

        prices.up.store(false, Ordering::SeqCst);
        assert!(refresher.refresh_once().await.is_none());

        let instance = catalog.lookup("m5.large").unwrap();
        assert_eq!(instance.on_demand.unwrap().total_hourly_price(), 0.096);
    }
}
