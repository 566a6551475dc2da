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

use axum::{extract::State, http::header, response::Html, response::IntoResponse};
use clustercost_core::CostReport;
use std::time::Instant;

use crate::api::{ApiError, AppState};

const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// GET / - Landing page
pub async fn landing_page(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "<html>\n<head><title>Cluster Cost Exporter</title></head>\n<body>\n\
         <h1>Cluster Cost Exporter</h1>\n\
         <p><a href=\"{path}\">Metrics</a></p>\n\
         </body>\n</html>\n",
        path = state.metrics_path
    ))
}

/// GET <metrics path> - Poll usage, recompute, and render every gauge
pub async fn serve_metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.ensure_synced()?;

    let start = Instant::now();
    let outcome = state.orchestrator.poll().await;
    let report = CostReport::build(&state.cache.snapshot(), &state.projection);

    let body = state
        .exporter
        .scrape(&report, &outcome, start.elapsed())
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    tracing::debug!("Scrape took {:?}", start.elapsed());

    Ok(([(header::CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)], body))
}
