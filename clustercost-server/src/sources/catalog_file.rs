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

//! File-backed instance catalog.
//!
//! The file is re-read on every call so edits are picked up on the next
//! refresh. TOML unless the extension is `.json`:
//!
//! ```toml
//! [[shapes]]
//! type_id = "m5.large"
//! vcpu_count = 2
//! memory_mib = 8192
//!
//! [[regions.us-east-1.prices]]
//! kind = "on_demand"
//! type_id = "m5.large"
//! total_hourly_price = 0.096
//!
//! [[regions.us-east-1.prices]]
//! kind = "fixed_rate"
//! vcpu_hourly_price = 0.04048
//! memory_gib_hourly_price = 0.004445
//! ```

use async_trait::async_trait;
use clustercost_core::{InstanceShape, PriceRecord, PriceSource, ShapeSource, SourceError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CatalogFile {
    #[serde(default)]
    pub shapes: Vec<InstanceShape>,
    #[serde(default)]
    pub regions: HashMap<String, RegionPrices>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegionPrices {
    #[serde(default)]
    pub prices: Vec<PriceRecord>,
}

impl CatalogFile {
    pub fn parse(path: &Path, content: &str) -> Result<Self, SourceError> {
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(content).map_err(|e| e.to_string())
        } else {
            toml::from_str(content).map_err(|e| e.to_string())
        };
        parsed.map_err(|reason| SourceError::Parse {
            what: path.display().to_string(),
            reason,
        })
    }
}

pub struct FileCatalogSource {
    path: PathBuf,
    region: String,
}

impl FileCatalogSource {
    pub fn new(path: impl Into<PathBuf>, region: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            region: region.into(),
        }
    }

    async fn read(&self) -> Result<CatalogFile, SourceError> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        CatalogFile::parse(&self.path, &content)
    }
}

#[async_trait]
impl ShapeSource for FileCatalogSource {
    async fn list_shapes(&self) -> Result<Vec<InstanceShape>, SourceError> {
        Ok(self.read().await?.shapes)
    }
}

#[async_trait]
impl PriceSource for FileCatalogSource {
    async fn list_prices(&self) -> Result<Vec<PriceRecord>, SourceError> {
        let mut catalog = self.read().await?;
        catalog
            .regions
            .remove(&self.region)
            .map(|r| r.prices)
            .ok_or_else(|| SourceError::Parse {
                what: self.path.display().to_string(),
                reason: format!("no prices for region {}", self.region),
            })
    }
}
