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

use axum::{extract::rejection::JsonRejection, extract::State, http::StatusCode, Json};
use clustercost_core::ClusterEvent;
use serde::Serialize;

use crate::api::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub accepted: usize,
}

/// POST /api/v1/cluster/events - Membership events from the cluster watch
///
/// Events are queued in request order; per-table order is preserved.
pub async fn ingest_events(
    State(state): State<AppState>,
    payload: Result<Json<Vec<ClusterEvent>>, JsonRejection>,
) -> Result<(StatusCode, Json<IngestResponse>), ApiError> {
    let Json(events) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let accepted = events.len();
    for event in events {
        state
            .events
            .send(event)
            .await
            .map_err(|e| ApiError::Internal(e.to_string()))?;
    }
    tracing::debug!("Queued {} cluster events", accepted);

    Ok((StatusCode::ACCEPTED, Json(IngestResponse { accepted })))
}
