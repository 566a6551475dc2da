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

use axum::{extract::State, Json};
use clustercost_core::{CostReport, PollOutcome};
use serde::Serialize;

use crate::api::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct CostsResponse {
    /// False when this request joined a poll already in flight
    pub fresh: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_error: Option<String>,
    #[serde(flatten)]
    pub report: CostReport,
}

/// GET /api/v1/costs - Per-workload and per-node cost report
pub async fn get_costs(State(state): State<AppState>) -> Result<Json<CostsResponse>, ApiError> {
    state.ensure_synced()?;

    let outcome = state.orchestrator.poll().await;
    let report = CostReport::build(&state.cache.snapshot(), &state.projection);

    let (fresh, usage_error) = match outcome {
        PollOutcome::Completed(pass) => (true, pass.usage_error),
        PollOutcome::Skipped => (false, None),
    };

    Ok(Json(CostsResponse {
        fresh,
        usage_error,
        report,
    }))
}
