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

//! Instance Catalog
//!
//! Maps an instance type to its hardware shape and priced variants:
//! - on-demand (one per type)
//! - spot (one per availability zone)
//! - a single fixed-rate variant for serverless capacity
//!
//! Shapes arrive from the inventory feed, prices from the pricing feed. The
//! two feeds are independent, so a price for an unknown type is skipped and
//! logged rather than treated as fatal. Entries are never deleted.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::{ClusterCostError, Result};
use crate::rate::{normalize, CpuMemoryRatio, MIB_PER_GIB};

/// Pricing category of a node or instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceClass {
    OnDemand,
    Spot { zone: String },
    FixedRate,
}

impl PriceClass {
    /// Value used for the `lifecycle` metric label.
    pub fn label(&self) -> &'static str {
        match self {
            PriceClass::OnDemand => "ondemand",
            PriceClass::Spot { .. } => "spot",
            PriceClass::FixedRate => "fargate",
        }
    }
}

impl fmt::Display for PriceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A priced variant of an instance type.
///
/// Rates are derived on construction and cannot be set directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceVariant {
    class: PriceClass,
    total_hourly_price: f64,
    vcpu_rate: f64,
    memory_rate: f64,
}

impl PriceVariant {
    /// Build a variant by normalizing a whole-instance hourly price.
    pub fn normalized(
        class: PriceClass,
        type_id: &str,
        total_hourly_price: f64,
        vcpu_count: u32,
        memory_gib: f64,
        ratio: CpuMemoryRatio,
    ) -> Result<Self> {
        let rates = normalize(type_id, total_hourly_price, vcpu_count, memory_gib, ratio)?;
        Ok(Self {
            class,
            total_hourly_price,
            vcpu_rate: rates.vcpu_rate,
            memory_rate: rates.memory_rate,
        })
    }

    /// Serverless capacity is priced per unit directly and has no
    /// instance-level total.
    pub fn fixed_rate(vcpu_hourly_price: f64, memory_gib_hourly_price: f64) -> Result<Self> {
        for price in [vcpu_hourly_price, memory_gib_hourly_price] {
            if !price.is_finite() || price < 0.0 {
                return Err(ClusterCostError::InvalidPrice {
                    type_id: FIXED_RATE_TYPE.to_string(),
                    price,
                });
            }
        }
        Ok(Self {
            class: PriceClass::FixedRate,
            total_hourly_price: 0.0,
            vcpu_rate: vcpu_hourly_price,
            memory_rate: memory_gib_hourly_price,
        })
    }

    pub fn class(&self) -> &PriceClass {
        &self.class
    }

    pub fn total_hourly_price(&self) -> f64 {
        self.total_hourly_price
    }

    pub fn vcpu_rate(&self) -> f64 {
        self.vcpu_rate
    }

    pub fn memory_rate(&self) -> f64 {
        self.memory_rate
    }
}

/// Instance type reported for serverless nodes.
pub const FIXED_RATE_TYPE: &str = "fargate";

/// Hardware shape plus pricing for one instance type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub type_id: String,
    pub vcpu_count: u32,
    pub memory_mib: u64,
    pub on_demand: Option<PriceVariant>,
    pub spot_by_zone: HashMap<String, PriceVariant>,
}

impl Instance {
    pub fn memory_gib(&self) -> f64 {
        self.memory_mib as f64 / MIB_PER_GIB
    }
}

/// Record from the hardware-shape feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstanceShape {
    pub type_id: String,
    pub vcpu_count: u32,
    pub memory_mib: u64,
}

/// Record from the pricing feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PriceRecord {
    OnDemand {
        type_id: String,
        total_hourly_price: f64,
    },
    Spot {
        type_id: String,
        zone: String,
        total_hourly_price: f64,
    },
    FixedRate {
        vcpu_hourly_price: f64,
        memory_gib_hourly_price: f64,
    },
}

/// Outcome of applying a batch of feed records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CatalogLoadStats {
    pub applied: usize,
    pub skipped: usize,
}

/// Thread-safe, append/update-only instance catalog.
pub struct InstanceCatalog {
    instances: RwLock<HashMap<String, Instance>>,
    fixed_rate: RwLock<Option<PriceVariant>>,
    ratio: CpuMemoryRatio,
}

impl InstanceCatalog {
    pub fn new(ratio: CpuMemoryRatio) -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            fixed_rate: RwLock::new(None),
            ratio,
        }
    }

    pub fn ratio(&self) -> CpuMemoryRatio {
        self.ratio
    }

    /// Insert or overwrite the shape of an instance type.
    ///
    /// Degenerate shapes are excluded. When an existing shape changes, its
    /// priced variants are re-normalized from their stored totals.
    pub fn upsert_shape(&self, type_id: &str, vcpu_count: u32, memory_mib: u64) -> Result<()> {
        if vcpu_count == 0 || memory_mib == 0 {
            tracing::debug!(
                "Skipping instance type {} with degenerate shape ({} vCPU, {} MiB)",
                type_id,
                vcpu_count,
                memory_mib
            );
            return Err(ClusterCostError::InvalidShape {
                type_id: type_id.to_string(),
                vcpu_count,
                memory_mib,
            });
        }

        let mut instances = self.instances.write();
        match instances.get_mut(type_id) {
            Some(existing)
                if existing.vcpu_count == vcpu_count && existing.memory_mib == memory_mib => {}
            Some(existing) => {
                existing.vcpu_count = vcpu_count;
                existing.memory_mib = memory_mib;
                let memory_gib = existing.memory_gib();
                let ratio = self.ratio;
                if let Some(on_demand) = existing.on_demand.take() {
                    existing.on_demand = PriceVariant::normalized(
                        PriceClass::OnDemand,
                        type_id,
                        on_demand.total_hourly_price,
                        vcpu_count,
                        memory_gib,
                        ratio,
                    )
                    .ok();
                }
                existing.spot_by_zone = std::mem::take(&mut existing.spot_by_zone)
                    .into_iter()
                    .filter_map(|(zone, spot)| {
                        PriceVariant::normalized(
                            spot.class,
                            type_id,
                            spot.total_hourly_price,
                            vcpu_count,
                            memory_gib,
                            ratio,
                        )
                        .ok()
                        .map(|v| (zone, v))
                    })
                    .collect();
            }
            None => {
                instances.insert(
                    type_id.to_string(),
                    Instance {
                        type_id: type_id.to_string(),
                        vcpu_count,
                        memory_mib,
                        on_demand: None,
                        spot_by_zone: HashMap::new(),
                    },
                );
            }
        }
        Ok(())
    }

    /// Set the on-demand price of a known instance type.
    pub fn upsert_on_demand_price(&self, type_id: &str, total_hourly_price: f64) -> Result<()> {
        let mut instances = self.instances.write();
        let instance = Self::known(&mut instances, type_id)?;
        instance.on_demand = Some(PriceVariant::normalized(
            PriceClass::OnDemand,
            type_id,
            total_hourly_price,
            instance.vcpu_count,
            instance.memory_gib(),
            self.ratio,
        )?);
        Ok(())
    }

    /// Set the spot price of a known instance type in one availability zone.
    pub fn upsert_spot_price(&self, type_id: &str, zone: &str, total_hourly_price: f64) -> Result<()> {
        let mut instances = self.instances.write();
        let instance = Self::known(&mut instances, type_id)?;
        let variant = PriceVariant::normalized(
            PriceClass::Spot {
                zone: zone.to_string(),
            },
            type_id,
            total_hourly_price,
            instance.vcpu_count,
            instance.memory_gib(),
            self.ratio,
        )?;
        instance.spot_by_zone.insert(zone.to_string(), variant);
        Ok(())
    }

    /// Set the serverless per-vCPU-hour and per-GiB-hour prices.
    pub fn set_fixed_rate(&self, vcpu_hourly_price: f64, memory_gib_hourly_price: f64) -> Result<()> {
        let variant = PriceVariant::fixed_rate(vcpu_hourly_price, memory_gib_hourly_price)?;
        *self.fixed_rate.write() = Some(variant);
        Ok(())
    }

    pub fn lookup(&self, type_id: &str) -> Option<Instance> {
        self.instances.read().get(type_id).cloned()
    }

    pub fn fixed_rate(&self) -> Option<PriceVariant> {
        self.fixed_rate.read().clone()
    }

    pub fn len(&self) -> usize {
        self.instances.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.read().is_empty()
    }

    /// Apply a batch of shape records, skipping invalid ones.
    pub fn apply_shapes<I>(&self, shapes: I) -> CatalogLoadStats
    where
        I: IntoIterator<Item = InstanceShape>,
    {
        let mut stats = CatalogLoadStats::default();
        for shape in shapes {
            match self.upsert_shape(&shape.type_id, shape.vcpu_count, shape.memory_mib) {
                Ok(()) => stats.applied += 1,
                Err(_) => stats.skipped += 1,
            }
        }
        stats
    }

    /// Apply a batch of price records. Prices for types the inventory feed
    /// never reported are dropped with a debug line.
    pub fn apply_prices<I>(&self, prices: I) -> CatalogLoadStats
    where
        I: IntoIterator<Item = PriceRecord>,
    {
        let mut stats = CatalogLoadStats::default();
        for record in prices {
            let outcome = match &record {
                PriceRecord::OnDemand {
                    type_id,
                    total_hourly_price,
                } => self.upsert_on_demand_price(type_id, *total_hourly_price),
                PriceRecord::Spot {
                    type_id,
                    zone,
                    total_hourly_price,
                } => self.upsert_spot_price(type_id, zone, *total_hourly_price),
                PriceRecord::FixedRate {
                    vcpu_hourly_price,
                    memory_gib_hourly_price,
                } => self.set_fixed_rate(*vcpu_hourly_price, *memory_gib_hourly_price),
            };
            match outcome {
                Ok(()) => stats.applied += 1,
                Err(e) => {
                    tracing::debug!("Ignoring price record: {}", e);
                    stats.skipped += 1;
                }
            }
        }
        stats
    }

    fn known<'a>(
        instances: &'a mut HashMap<String, Instance>,
        type_id: &str,
    ) -> Result<&'a mut Instance> {
        instances
            .get_mut(type_id)
            .ok_or_else(|| ClusterCostError::UnknownInstanceType(type_id.to_string()))
    }
}

impl Default for InstanceCatalog {
    fn default() -> Self {
        Self::new(CpuMemoryRatio::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog_with_m5() -> InstanceCatalog {
        let catalog = InstanceCatalog::default();
        catalog.upsert_shape("m5.large", 2, 8192).unwrap();
        catalog
    }

    #[test]
    fn test_on_demand_price_is_normalized() {
        let catalog = catalog_with_m5();
        catalog.upsert_on_demand_price("m5.large", 0.096).unwrap();

        let instance = catalog.lookup("m5.large").unwrap();
        let on_demand = instance.on_demand.unwrap();
        assert_eq!(on_demand.class(), &PriceClass::OnDemand);
        assert_eq!(on_demand.total_hourly_price(), 0.096);
        assert!((on_demand.memory_rate() - 0.0042857).abs() < 1e-6);
        assert!((on_demand.vcpu_rate() - 0.0308571).abs() < 1e-6);
    }

    #[test]
    fn test_price_for_unknown_type_is_skipped() {
        let catalog = catalog_with_m5();
        let err = catalog.upsert_on_demand_price("m1.small", 0.044).unwrap_err();
        assert_eq!(err, ClusterCostError::UnknownInstanceType("m1.small".into()));
        assert!(catalog.lookup("m1.small").is_none());
    }

    #[test]
    fn test_degenerate_shape_is_excluded() {
        let catalog = InstanceCatalog::default();
        assert!(catalog.upsert_shape("weird.none", 0, 1024).is_err());
        assert!(catalog.upsert_shape("weird.nomem", 2, 0).is_err());
        assert!(catalog.is_empty());
    }

    #[test]
    fn test_spot_prices_are_per_zone() {
        let catalog = catalog_with_m5();
        catalog.upsert_spot_price("m5.large", "us-east-1a", 0.035).unwrap();
        catalog.upsert_spot_price("m5.large", "us-east-1b", 0.040).unwrap();

        let instance = catalog.lookup("m5.large").unwrap();
        assert_eq!(instance.spot_by_zone.len(), 2);
        let spot = &instance.spot_by_zone["us-east-1a"];
        assert_eq!(
            spot.class(),
            &PriceClass::Spot {
                zone: "us-east-1a".into()
            }
        );
        assert_eq!(spot.total_hourly_price(), 0.035);
    }

    #[test]
    fn test_shape_change_renormalizes_prices() {
        let catalog = catalog_with_m5();
        catalog.upsert_on_demand_price("m5.large", 0.096).unwrap();
        catalog.upsert_shape("m5.large", 4, 8192).unwrap();

        let on_demand = catalog.lookup("m5.large").unwrap().on_demand.unwrap();
        let rebuilt = on_demand.vcpu_rate() * 4.0 + on_demand.memory_rate() * 8.0;
        assert!((rebuilt - 0.096).abs() < 1e-12);
    }

    #[test]
    fn test_apply_prices_counts_skips() {
        let catalog = catalog_with_m5();
        let stats = catalog.apply_prices(vec![
            PriceRecord::OnDemand {
                type_id: "m5.large".into(),
                total_hourly_price: 0.096,
            },
            PriceRecord::OnDemand {
                type_id: "m1.small".into(),
                total_hourly_price: 0.044,
            },
            PriceRecord::FixedRate {
                vcpu_hourly_price: 0.04048,
                memory_gib_hourly_price: 0.004445,
            },
        ]);
        assert_eq!(stats, CatalogLoadStats { applied: 2, skipped: 1 });

        let fixed = catalog.fixed_rate().unwrap();
        assert_eq!(fixed.class(), &PriceClass::FixedRate);
        assert_eq!(fixed.vcpu_rate(), 0.04048);
    }

    #[test]
    fn test_price_record_json_shape() {
        let json = r#"{"kind":"spot","type_id":"m5.large","zone":"us-east-1a","total_hourly_price":0.035}"#;
        let record: PriceRecord = serde_json::from_str(json).unwrap();
        assert!(matches!(record, PriceRecord::Spot { .. }));
    }
}
