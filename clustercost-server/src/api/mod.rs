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

pub mod costs;
pub mod events;
pub mod health;
pub mod metrics;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use clustercost_core::{ClusterCache, EventApplierHandle, LabelProjection, SnapshotOrchestrator};
use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::exporter::CostExporter;

pub use costs::get_costs;
pub use events::ingest_events;
pub use health::{health_check, readiness_check};
pub use metrics::{landing_page, serve_metrics};

/// API error types
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Cluster state not synced yet")]
    NotReady,

    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotReady => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse { error: self.to_string() })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<ClusterCache>,
    pub orchestrator: Arc<SnapshotOrchestrator>,
    pub exporter: Arc<CostExporter>,
    pub events: EventApplierHandle,
    pub projection: Arc<LabelProjection>,
    pub metrics_path: Arc<str>,
    pub started_at: Instant,
}

impl AppState {
    fn ensure_synced(&self) -> Result<(), ApiError> {
        if self.cache.is_synced() {
            Ok(())
        } else {
            Err(ApiError::NotReady)
        }
    }
}

pub const HEALTH_PATH: &str = "/health";
pub const READY_PATH: &str = "/ready";
pub const COSTS_PATH: &str = "/api/v1/costs";
pub const EVENTS_PATH: &str = "/api/v1/cluster/events";

/// Fixed routes; the configurable metrics path must not collide with these.
pub const RESERVED_PATHS: [&str; 5] = ["/", HEALTH_PATH, READY_PATH, COSTS_PATH, EVENTS_PATH];

/// Build the HTTP surface.
pub fn router(state: AppState) -> Router {
    let metrics_path = state.metrics_path.to_string();
    Router::new()
        .route("/", get(landing_page))
        .route(&metrics_path, get(serve_metrics))
        .route(HEALTH_PATH, get(health_check))
        .route(READY_PATH, get(readiness_check))
        .route(COSTS_PATH, get(get_costs))
        .route(EVENTS_PATH, post(ingest_events))
        .with_state(state)
}
