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

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use clustercost_core::{ApplierStats, PollStats};
use serde::Serialize;

use crate::api::AppState;

/// Health check response structure
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub synced: bool,
    pub cluster: ClusterHealth,
    pub polls: PollStats,
    pub events: ApplierStats,
}

#[derive(Debug, Serialize)]
pub struct ClusterHealth {
    pub nodes: usize,
    pub workloads: usize,
    pub instance_types: usize,
}

/// GET /health - Liveness plus a summary of cached state
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        synced: state.cache.is_synced(),
        cluster: ClusterHealth {
            nodes: state.cache.node_count(),
            workloads: state.cache.workload_count(),
            instance_types: state.cache.catalog().len(),
        },
        polls: state.orchestrator.stats(),
        events: state.events.stats(),
    })
}

#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub ready: bool,
}

/// GET /ready - 503 until the initial cluster listing has been ingested
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    let ready = state.cache.is_synced();
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(ReadinessResponse { ready }))
}
