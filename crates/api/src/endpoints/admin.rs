//! Super administrator endpoints.

use axum::{Router, extract::State, routing::get};
use chrono::{DateTime, Utc};
use clubhub_common::AppResult;
use clubhub_core::models::ClubId;
use clubhub_core::{EnforcementResult, EnforcementState, format_remaining};
use serde::Serialize;
use tracing::debug;

use crate::{extractors::SuperAdmin, middleware::AppState, response::ApiResponse};

/// Create admin router.
pub fn router() -> Router<AppState> {
    Router::new().route("/enforcement", get(enforcement_overview))
}

/// One club's row in the overview.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClubEnforcementResponse {
    pub club_id: ClubId,
    pub state: EnforcementState,
    pub deadline: Option<DateTime<Utc>>,
    pub active_issues: usize,
    pub countdown: Option<String>,
}

impl ClubEnforcementResponse {
    fn new(club_id: ClubId, result: EnforcementResult, now: DateTime<Utc>) -> Self {
        Self {
            club_id,
            state: result.state,
            deadline: result.deadline,
            active_issues: result.active_issues,
            countdown: result.deadline.map(|d| format_remaining(d, now)),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewResponse {
    pub layout: &'static str,
    pub clubs: Vec<ClubEnforcementResponse>,
}

/// Enforcement state of every club with open issues, most severe first.
async fn enforcement_overview(
    SuperAdmin(session): SuperAdmin,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<OverviewResponse>> {
    let provider = state.provider_for(&session);
    let overview = provider.overview().await?;
    let now = provider.clock().now();

    debug!(clubs = overview.len(), "Built enforcement overview");

    Ok(ApiResponse::ok(OverviewResponse {
        layout: session.role.layout(),
        clubs: overview
            .into_iter()
            .map(|(club_id, result)| ClubEnforcementResponse::new(club_id, result, now))
            .collect(),
    }))
}
