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

//! Usage snapshots from a `metrics.k8s.io` PodMetricsList endpoint.

use async_trait::async_trait;
use clustercost_core::quantity::{parse_cpu_millicores, parse_memory_bytes};
use clustercost_core::{SourceError, UsageSample, UsageSource, WorkloadResources};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PodMetricsList {
    #[serde(default)]
    pub items: Vec<PodMetrics>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodMetrics {
    pub metadata: PodMetadata,
    #[serde(default)]
    pub containers: Vec<ContainerMetrics>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PodMetadata {
    pub name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ContainerMetrics {
    #[serde(default)]
    pub usage: HashMap<String, String>,
}

impl PodMetricsList {
    /// Sum container usage per pod, saturating at `u64::MAX`. Unparsable
    /// quantities count as zero.
    pub fn into_samples(self) -> Vec<UsageSample> {
        self.items
            .into_iter()
            .map(|pod| {
                let mut usage = WorkloadResources::default();
                for container in &pod.containers {
                    if let Some(cpu) = container.usage.get("cpu") {
                        let cpu = parse_cpu_millicores(cpu).unwrap_or_else(|e| {
                            tracing::warn!("Pod {}/{}: {}", pod.metadata.namespace, pod.metadata.name, e);
                            0
                        });
                        usage.cpu_millicores = usage.cpu_millicores.saturating_add(cpu);
                    }
                    if let Some(memory) = container.usage.get("memory") {
                        let memory = parse_memory_bytes(memory).unwrap_or_else(|e| {
                            tracing::warn!("Pod {}/{}: {}", pod.metadata.namespace, pod.metadata.name, e);
                            0
                        });
                        usage.memory_bytes = usage.memory_bytes.saturating_add(memory);
                    }
                }
                UsageSample {
                    namespace: pod.metadata.namespace,
                    name: pod.metadata.name,
                    usage,
                }
            })
            .collect()
    }
}

pub struct HttpUsageSource {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpUsageSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Network(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl UsageSource for HttpUsageSource {
    async fn usage_snapshot(&self) -> Result<Vec<UsageSample>, SourceError> {
        let start = Instant::now();

        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| SourceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let list: PodMetricsList = response.json().await.map_err(|e| SourceError::Parse {
            what: self.endpoint.clone(),
            reason: e.to_string(),
        })?;

        let samples = list.into_samples();
        tracing::debug!("Usage snapshot took {:?} ({} pods)", start.elapsed(), samples.len());
        Ok(samples)
    }
}
