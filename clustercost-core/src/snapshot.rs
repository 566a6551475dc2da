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

//! Snapshot Orchestrator
//!
//! One poll = fetch usage, then a single locked pass over the workload table
//! that overwrites usage and recomputes every cost. Polls never overlap: a
//! poll that arrives while another is running is skipped and the caller
//! reads whatever the running pass publishes.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::cluster::{ClusterCache, RecomputeStats};
use crate::source::{index_usage, UsageSource};

/// Result of a poll that ran.
#[derive(Debug, Clone, Serialize)]
pub struct PassReport {
    pub recompute: RecomputeStats,
    pub usage_samples: usize,
    /// Set when usage could not be fetched; previous usage was kept
    pub usage_error: Option<String>,
    pub duration: Duration,
}

#[derive(Debug, Clone)]
pub enum PollOutcome {
    Completed(PassReport),
    /// Another poll was already in flight
    Skipped,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PollStats {
    pub passes: u64,
    pub skipped: u64,
    pub usage_failures: u64,
}

#[derive(Default)]
struct PollStatsInternal {
    passes: AtomicU64,
    skipped: AtomicU64,
    usage_failures: AtomicU64,
}

pub struct SnapshotOrchestrator {
    cache: Arc<ClusterCache>,
    usage: Arc<dyn UsageSource>,
    in_flight: Mutex<()>,
    stats: PollStatsInternal,
}

impl SnapshotOrchestrator {
    pub fn new(cache: Arc<ClusterCache>, usage: Arc<dyn UsageSource>) -> Self {
        Self {
            cache,
            usage,
            in_flight: Mutex::new(()),
            stats: PollStatsInternal::default(),
        }
    }

    pub fn cache(&self) -> &Arc<ClusterCache> {
        &self.cache
    }

    /// Fetch usage and recompute every workload's cost.
    ///
    /// A usage failure is not fatal: the pass still runs with the previous
    /// usage so node or rate changes since the last poll are picked up.
    pub async fn poll(&self) -> PollOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            tracing::debug!("Poll already in flight, skipping");
            return PollOutcome::Skipped;
        };

        let start = Instant::now();

        let (usage, usage_samples, usage_error) = match self.usage.usage_snapshot().await {
            Ok(samples) => {
                let count = samples.len();
                (Some(index_usage(samples)), count, None)
            }
            Err(e) => {
                self.stats.usage_failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!("Usage fetch failed, keeping previous usage: {}", e);
                (None, 0, Some(e.to_string()))
            }
        };

        let recompute = self.cache.recompute(usage.as_ref());
        self.stats.passes.fetch_add(1, Ordering::Relaxed);

        let duration = start.elapsed();
        tracing::debug!(
            "Poll completed in {:?}: {} workloads, {} costed, {} uncosted",
            duration,
            recompute.workloads,
            recompute.costed,
            recompute.uncosted
        );

        PollOutcome::Completed(PassReport {
            recompute,
            usage_samples,
            usage_error,
            duration,
        })
    }

    pub fn stats(&self) -> PollStats {
        PollStats {
            passes: self.stats.passes.load(Ordering::Relaxed),
            skipped: self.stats.skipped.load(Ordering::Relaxed),
            usage_failures: self.stats.usage_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InstanceCatalog;
    use crate::model::{NodeRecord, WorkloadKey, WorkloadRecord, WorkloadResources, INSTANCE_TYPE_LABEL};
    use crate::source::{SourceError, UsageSample};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use tokio::sync::Notify;

    struct FixedUsage(Vec<UsageSample>);

    #[async_trait]
    impl UsageSource for FixedUsage {
        async fn usage_snapshot(&self) -> Result<Vec<UsageSample>, SourceError> {
            Ok(self.0.clone())
        }
    }

    struct FailingUsage;

    #[async_trait]
    impl UsageSource for FailingUsage {
        async fn usage_snapshot(&self) -> Result<Vec<UsageSample>, SourceError> {
            Err(SourceError::Status {
                url: "http://metrics".into(),
                status: 503,
            })
        }
    }

    /// Blocks until released, to hold a poll in flight.
    struct GatedUsage {
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl UsageSource for GatedUsage {
        async fn usage_snapshot(&self) -> Result<Vec<UsageSample>, SourceError> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(Vec::new())
        }
    }

    fn cache() -> Arc<ClusterCache> {
        let catalog = InstanceCatalog::default();
        catalog.upsert_shape("m5.large", 2, 8192).unwrap();
        catalog.upsert_on_demand_price("m5.large", 0.096).unwrap();
        let cache = Arc::new(ClusterCache::new(Arc::new(catalog)));
        cache.on_node_added(&NodeRecord {
            name: "n1".into(),
            labels: HashMap::from([(INSTANCE_TYPE_LABEL.to_string(), "m5.large".to_string())]),
        });
        cache.on_workload_added(&WorkloadRecord {
            name: "api".into(),
            namespace: "default".into(),
            node_name: Some("n1".into()),
            ..Default::default()
        });
        cache
    }

    fn sample(cpu: u64) -> UsageSample {
        UsageSample {
            namespace: "default".into(),
            name: "api".into(),
            usage: WorkloadResources::new(cpu, 0),
        }
    }

    #[tokio::test]
    async fn test_poll_applies_usage() {
        let cache = cache();
        let orchestrator = SnapshotOrchestrator::new(cache.clone(), Arc::new(FixedUsage(vec![sample(500)])));

        let PollOutcome::Completed(report) = orchestrator.poll().await else {
            panic!("poll should run");
        };
        assert_eq!(report.usage_samples, 1);
        assert_eq!(report.recompute.costed, 1);
        assert!(report.usage_error.is_none());

        let workload = cache.workload(&WorkloadKey::new("default", "api")).unwrap();
        assert_eq!(workload.usage.cpu_millicores, 500);
        assert!(workload.cost.unwrap().cpu_cost > 0.0);
    }

    #[tokio::test]
    async fn test_usage_failure_keeps_previous_usage() {
        let cache = cache();
        SnapshotOrchestrator::new(cache.clone(), Arc::new(FixedUsage(vec![sample(750)])))
            .poll()
            .await;

        let orchestrator = SnapshotOrchestrator::new(cache.clone(), Arc::new(FailingUsage));
        let PollOutcome::Completed(report) = orchestrator.poll().await else {
            panic!("poll should run");
        };
        assert!(report.usage_error.is_some());
        assert_eq!(report.recompute.workloads, 1);
        assert_eq!(orchestrator.stats().usage_failures, 1);

        let workload = cache.workload(&WorkloadKey::new("default", "api")).unwrap();
        assert_eq!(workload.usage.cpu_millicores, 750);
    }

    #[tokio::test]
    async fn test_overlapping_poll_is_skipped() {
        let usage = Arc::new(GatedUsage {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let orchestrator = Arc::new(SnapshotOrchestrator::new(cache(), usage.clone()));

        let first = {
            let orchestrator = orchestrator.clone();
            tokio::spawn(async move { orchestrator.poll().await })
        };
        usage.entered.notified().await;

        assert!(matches!(orchestrator.poll().await, PollOutcome::Skipped));

        usage.release.notify_one();
        assert!(matches!(first.await.unwrap(), PollOutcome::Completed(_)));
        assert_eq!(
            orchestrator.stats(),
            PollStats {
                passes: 1,
                skipped: 1,
                usage_failures: 0,
            }
        );
    }
}
