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

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use clustercost_core::{
    ClusterCache, EventApplier, EventApplierConfig, InstanceCatalog, LabelProjection,
    SnapshotOrchestrator, SourceError, UsageSample, UsageSource, WorkloadResources,
};
use clustercost_server::{api, api::AppState, exporter::CostExporter};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower::ServiceExt;

struct StaticUsage(Vec<UsageSample>);

#[async_trait]
impl UsageSource for StaticUsage {
    async fn usage_snapshot(&self) -> Result<Vec<UsageSample>, SourceError> {
        Ok(self.0.clone())
    }
}

struct TestApp {
    router: Router,
    cache: Arc<ClusterCache>,
}

impl TestApp {
    fn new() -> Self {
        let catalog = InstanceCatalog::default();
        catalog.upsert_shape("m5.large", 2, 8192).unwrap();
        catalog.upsert_on_demand_price("m5.large", 0.096).unwrap();
        let cache = Arc::new(ClusterCache::new(Arc::new(catalog)));

        let usage = StaticUsage(vec![UsageSample {
            namespace: "default".into(),
            name: "api".into(),
            usage: WorkloadResources::new(500, 2 * (1 << 30)),
        }]);
        let projection = LabelProjection {
            workload_labels: vec!["app".into()],
            node_labels: vec![],
        };

        let state = AppState {
            cache: cache.clone(),
            orchestrator: Arc::new(SnapshotOrchestrator::new(cache.clone(), Arc::new(usage))),
            exporter: Arc::new(CostExporter::new(&projection).unwrap()),
            events: EventApplier::new(EventApplierConfig::default(), cache.clone()).spawn(),
            projection: Arc::new(projection),
            metrics_path: Arc::from("/metrics"),
            started_at: Instant::now(),
        };

        Self {
            router: api::router(state),
            cache,
        }
    }

    async fn get(&self, uri: &str) -> (StatusCode, String) {
        let response = self
            .router
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    async fn post_events(&self, body: String) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/cluster/events")
                    .header("Content-Type", "application/json")
                    .body(Body::from(body))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&body).unwrap())
    }

    async fn sync_cluster(&self) {
        let events = json!([
            {"resource": "node", "event": {"type": "added", "object": {
                "name": "ip-10-0-0-1",
                "labels": {
                    "node.kubernetes.io/instance-type": "m5.large",
                    "topology.kubernetes.io/zone": "us-east-1a",
                    "topology.kubernetes.io/region": "us-east-1"
                }
            }}},
            {"resource": "node", "event": {"type": "synced"}},
            {"resource": "workload", "event": {"type": "added", "object": {
                "name": "api",
                "namespace": "default",
                "labels": {"app": "api"},
                "node_name": "ip-10-0-0-1",
                "containers": [{"cpu": "1", "memory": "1Gi"}]
            }}},
            {"resource": "workload", "event": {"type": "added", "object": {
                "name": "stray",
                "namespace": "default",
                "node_name": "ip-10-9-9-9"
            }}},
            {"resource": "workload", "event": {"type": "synced"}}
        ]);

        let (status, body) = self.post_events(events.to_string()).await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body["accepted"], 5);

        tokio::time::timeout(Duration::from_secs(2), self.cache.wait_until_synced())
            .await
            .expect("cache should sync");
    }
}

#[tokio::test]
async fn test_not_ready_before_sync() {
    let app = TestApp::new();

    let (status, body) = app.get("/ready").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body.contains("false"));

    let (status, _) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = app.get("/api/v1/costs").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

    let (status, _) = app.get("/health").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_metrics_after_sync() {
    let app = TestApp::new();
    app.sync_cluster().await;

    let (status, _) = app.get("/ready").await;
    assert_eq!(status, StatusCode::OK);

    let (status, text) = app.get("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(text.contains(
        r#"eks_cost_pod_cpu_requests{app="api",lifecycle="ondemand",namespace="default",node="ip-10-0-0-1",pod="api",type="m5.large"}"#
    ));
    // the unbound workload is exported as zero
    assert!(text.contains(
        r#"eks_cost_pod_total{app="",lifecycle="",namespace="default",node="ip-10-9-9-9",pod="stray",type=""} 0"#
    ));
    assert!(text.contains(r#"eks_cost_node_total{az="us-east-1a",lifecycle="ondemand",node="ip-10-0-0-1",region="us-east-1",type="m5.large"} 0.096"#));
    assert!(text.contains("eks_cost_scrapes_total 1"));
}

#[tokio::test]
async fn test_cost_report_json() {
    let app = TestApp::new();
    app.sync_cluster().await;

    let (status, body) = app.get("/api/v1/costs").await;
    assert_eq!(status, StatusCode::OK);
    let report: Value = serde_json::from_str(&body).unwrap();

    assert_eq!(report["fresh"], true);
    let workloads = report["workloads"].as_array().unwrap();
    assert_eq!(workloads.len(), 2);

    let api = &workloads[0];
    assert_eq!(api["name"], "api");
    assert_eq!(api["extra_labels"]["app"], "api");
    // usage 500m / 2Gi against reservation 1 vCPU / 1Gi
    let cost = &api["cost"];
    let total = cost["total"].as_f64().unwrap();
    let expected = cost["cpu_reserved_cost"].as_f64().unwrap() + cost["memory_cost"].as_f64().unwrap();
    assert!((total - expected).abs() < 1e-12);

    assert!(workloads[1]["cost"].is_null());
    assert_eq!(report["nodes"][0]["price_class"]["kind"], "on_demand");
}

#[tokio::test]
async fn test_malformed_events_rejected() {
    let app = TestApp::new();

    let (status, body) = app.post_events(r#"[{"resource":"pod"}]"#.to_string()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Bad request"));
    assert_eq!(app.cache.node_count(), 0);
}

#[tokio::test]
async fn test_landing_page_links_metrics() {
    let app = TestApp::new();
    let (status, body) = app.get("/").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"<a href="/metrics">"#));
}
