//! Club administration endpoints.
//!
//! Every screen is built from one fetch cycle through the shared provider and
//! rendered through the enforcement gate. A failed fetch degrades the screen
//! instead of failing the request, except for authentication failures.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use clubhub_common::{AppError, AppResult};
use clubhub_core::models::{
    ClubId, Escalation, EscalationId, EscalationTime, Event, EventId, MemberId, Membership, NewEvent,
    Severity,
};
use clubhub_core::{
    ClubSnapshot, EnforcementGate, EnforcementSession, EnforcementView, Screen,
    ScreenDecision, enforcement::hours_between, format_remaining,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use validator::Validate;

use crate::{extractors::ClubAdmin, middleware::AppState, response::ApiResponse};

/// Most open issues listed on the dashboard.
const DASHBOARD_ISSUES: usize = 5;

/// Create club router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/dashboard", get(dashboard))
        .route("/issues", get(issues))
        .route("/issues/{id}/resolve", post(resolve_issue))
        .route("/members", get(members))
        .route("/members/{id}/approve", post(approve_member))
        .route("/events", get(events).post(create_event))
        .route("/events/{id}/publish", post(publish_event))
}

/// A rendered club screen.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenResponse<B: Serialize> {
    pub layout: &'static str,
    #[serde(flatten)]
    pub view: EnforcementView,
    /// Remaining time to the deadline when the screen was built.
    pub countdown: Option<String>,
    #[serde(flatten)]
    pub decision: ScreenDecision,
    /// Screen-specific content. Absent when the fetch failed.
    #[serde(flatten)]
    pub body: Option<B>,
}

/// An escalation as listed on the issues screen.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssueResponse {
    pub id: EscalationId,
    pub severity: Severity,
    pub title: Option<String>,
    pub description: Option<String>,
    pub created_at: EscalationTime,
    pub resolved_at: Option<EscalationTime>,
    pub resolution_notes: Option<String>,
    pub is_open: bool,
    /// Hours since the issue was raised, if it is open and its timestamp parses.
    pub hours_open: Option<f64>,
}

impl IssueResponse {
    fn new(escalation: Escalation, now: DateTime<Utc>) -> Self {
        let is_open = escalation.is_open();
        let hours_open = escalation
            .created_at
            .as_datetime()
            .filter(|_| is_open)
            .map(|created| hours_between(created, now));

        Self {
            id: escalation.id,
            severity: escalation.severity,
            title: escalation.title,
            description: escalation.description,
            created_at: escalation.created_at,
            resolved_at: escalation.resolved_at,
            resolution_notes: escalation.resolution_notes,
            is_open,
            hours_open,
        }
    }
}

/// Open issues first, oldest first; resolved issues after, in backend order.
fn issue_list(escalations: Vec<Escalation>, now: DateTime<Utc>) -> Vec<IssueResponse> {
    let (mut open, resolved): (Vec<_>, Vec<_>) =
        escalations.into_iter().partition(Escalation::is_open);
    open.sort_by_key(|e| (e.created_at.as_datetime().is_none(), e.created_at.as_datetime(), e.id));

    open.into_iter()
        .chain(resolved)
        .map(|e| IssueResponse::new(e, now))
        .collect()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardBody {
    pub member_count: u32,
    pub open_issues: Vec<IssueResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuesBody {
    pub issues: Vec<IssueResponse>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembersBody {
    pub members: Vec<Membership>,
}

/// The events screen carries no content of its own.
#[derive(Debug, Serialize)]
pub struct NoBody {}

/// Resolve issue request.
#[derive(Debug, Deserialize, Validate)]
pub struct ResolveIssueRequest {
    #[validate(length(min = 1, max = 2000), custom(function = "not_blank"))]
    pub notes: String,
}

/// Create event request.
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 200), custom(function = "not_blank"))]
    pub title: String,
    #[validate(length(max = 5000))]
    pub description: Option<String>,
    pub starts_at: Option<DateTime<Utc>>,
    #[validate(length(max = 200))]
    pub location: Option<String>,
}

impl From<CreateEventRequest> for NewEvent {
    fn from(req: CreateEventRequest) -> Self {
        Self {
            title: req.title.trim().to_string(),
            description: req.description,
            starts_at: req.starts_at,
            location: req.location,
        }
    }
}

fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}

/// One fetch cycle's outcome, ready to render.
struct Loaded {
    layout: &'static str,
    view: EnforcementView,
    snapshot: Option<ClubSnapshot>,
    now: DateTime<Utc>,
}

impl Loaded {
    fn render<B: Serialize>(
        self,
        screen: Screen,
        body: impl FnOnce(ClubSnapshot, DateTime<Utc>) -> B,
    ) -> ScreenResponse<B> {
        let decision = EnforcementGate::from_view(&self.view).decide(screen);
        let countdown = self
            .view
            .enforcement
            .and_then(|e| e.deadline)
            .map(|deadline| format_remaining(deadline, self.now));
        let now = self.now;

        ScreenResponse {
            layout: self.layout,
            view: self.view,
            countdown,
            decision,
            body: self.snapshot.map(|snapshot| body(snapshot, now)),
        }
    }
}

/// Run one fetch cycle for the admin's club.
async fn load(state: &AppState, admin: &ClubAdmin) -> AppResult<Loaded> {
    let session = EnforcementSession::new(state.provider_for(&admin.session));
    let outcome = session.refresh(admin.context).await;
    loaded(state, admin, &session, outcome)
}

/// Turn a fetch cycle's outcome into something renderable.
fn loaded(
    state: &AppState,
    admin: &ClubAdmin,
    session: &EnforcementSession,
    outcome: Option<AppResult<ClubSnapshot>>,
) -> AppResult<Loaded> {
    let snapshot = match outcome {
        Some(Ok(snapshot)) => Some(snapshot),
        Some(Err(AppError::Unauthorized)) => return Err(AppError::Unauthorized),
        // Recorded in the view; the gate fails closed on it.
        Some(Err(_)) => None,
        None => {
            return Err(AppError::Internal(
                "Enforcement fetch was superseded".to_string(),
            ));
        }
    };

    Ok(Loaded {
        layout: admin.session.role.layout(),
        view: session.view(),
        snapshot,
        now: state.clock.now(),
    })
}

/// Resolve the admin's club without running a fetch cycle.
async fn club_id(state: &AppState, admin: &ClubAdmin) -> AppResult<ClubId> {
    state
        .provider_for(&admin.session)
        .resolve_club_id(&admin.context)
        .await
}

/// Club dashboard.
async fn dashboard(
    admin: ClubAdmin,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<ScreenResponse<DashboardBody>>> {
    let loaded = load(&state, &admin).await?;
    Ok(ApiResponse::ok(loaded.render(
        Screen::Dashboard,
        |snapshot, now| {
            let mut open_issues = issue_list(snapshot.escalations, now);
            open_issues.retain(|issue| issue.is_open);
            open_issues.truncate(DASHBOARD_ISSUES);
            DashboardBody {
                member_count: snapshot.club.member_count,
                open_issues,
            }
        },
    )))
}

/// Issues screen.
async fn issues(
    admin: ClubAdmin,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<ScreenResponse<IssuesBody>>> {
    let loaded = load(&state, &admin).await?;
    Ok(ApiResponse::ok(loaded.render(Screen::Issues, |snapshot, now| {
        IssuesBody {
            issues: issue_list(snapshot.escalations, now),
        }
    })))
}

/// Resolve an issue, then show the issues screen re-fetched.
async fn resolve_issue(
    admin: ClubAdmin,
    State(state): State<AppState>,
    Path(id): Path<EscalationId>,
    Json(req): Json<ResolveIssueRequest>,
) -> AppResult<ApiResponse<ScreenResponse<IssuesBody>>> {
    req.validate()?;

    let session = EnforcementSession::new(state.provider_for(&admin.session));
    let outcome = session.resolve(admin.context, id, req.notes.trim()).await?;

    let loaded = loaded(&state, &admin, &session, outcome)?;
    Ok(ApiResponse::ok(loaded.render(Screen::Issues, |snapshot, now| {
        IssuesBody {
            issues: issue_list(snapshot.escalations, now),
        }
    })))
}

/// Members screen.
async fn members(
    admin: ClubAdmin,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<ScreenResponse<MembersBody>>> {
    let loaded = load(&state, &admin).await?;
    Ok(ApiResponse::ok(loaded.render(Screen::Members, |snapshot, _| {
        let (mut members, rest): (Vec<_>, Vec<_>) =
            snapshot.members.into_iter().partition(Membership::is_pending);
        members.extend(rest);
        MembersBody { members }
    })))
}

/// Approve a pending member.
async fn approve_member(
    admin: ClubAdmin,
    State(state): State<AppState>,
    Path(id): Path<MemberId>,
) -> AppResult<ApiResponse<Membership>> {
    let club_id = club_id(&state, &admin).await?;

    let membership = state
        .provider_for(&admin.session)
        .backend()
        .approve_member(club_id, id)
        .await?;

    info!(club_id = %club_id, member_id = %id, "Member approved");
    Ok(ApiResponse::ok(membership))
}

/// Events screen.
async fn events(
    admin: ClubAdmin,
    State(state): State<AppState>,
) -> AppResult<ApiResponse<ScreenResponse<NoBody>>> {
    let loaded = load(&state, &admin).await?;
    Ok(ApiResponse::ok(
        loaded.render(Screen::Events, |_, _| NoBody {}),
    ))
}

/// Create an event.
async fn create_event(
    admin: ClubAdmin,
    State(state): State<AppState>,
    Json(req): Json<CreateEventRequest>,
) -> AppResult<ApiResponse<Event>> {
    req.validate()?;

    let club_id = club_id(&state, &admin).await?;

    let event = state
        .provider_for(&admin.session)
        .backend()
        .create_event(club_id, &req.into())
        .await?;

    info!(club_id = %club_id, event_id = %event.id, "Event created");
    Ok(ApiResponse::ok(event))
}

/// Publish an event.
async fn publish_event(
    admin: ClubAdmin,
    State(state): State<AppState>,
    Path(id): Path<EventId>,
) -> AppResult<ApiResponse<Event>> {
    let event = state
        .provider_for(&admin.session)
        .backend()
        .publish_event(id)
        .await?;

    info!(event_id = %id, user_id = %admin.session.user_id, "Event published");
    Ok(ApiResponse::ok(event))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use clubhub_core::models::TargetType;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap()
    }

    fn escalation(id: i64, created_at: EscalationTime, resolved: bool) -> Escalation {
        Escalation {
            id: EscalationId(id),
            target_type: TargetType::Club,
            target_id: 7,
            severity: Severity::Escalated,
            created_at,
            resolved_at: resolved.then(|| EscalationTime::Valid(now())),
            resolution_notes: None,
            title: None,
            description: None,
        }
    }

    #[test]
    fn test_issue_list_orders_open_first() {
        let list = issue_list(
            vec![
                escalation(1, EscalationTime::Valid(now() - Duration::hours(1)), true),
                escalation(2, EscalationTime::Malformed("?".to_string()), false),
                escalation(3, EscalationTime::Valid(now() - Duration::hours(10)), false),
                escalation(4, EscalationTime::Valid(now() - Duration::hours(2)), false),
            ],
            now(),
        );

        let ids: Vec<_> = list.iter().map(|i| i.id.0).collect();
        assert_eq!(ids, vec![3, 4, 2, 1]);
        assert_eq!(list[0].hours_open, Some(10.0));
        assert_eq!(list[2].hours_open, None);
        assert_eq!(list[3].hours_open, None);
        assert!(!list[3].is_open);
    }

    #[test]
    fn test_resolve_notes_validation() {
        let ok = ResolveIssueRequest {
            notes: "Minutes uploaded".to_string(),
        };
        assert!(ok.validate().is_ok());

        let blank = ResolveIssueRequest {
            notes: "   ".to_string(),
        };
        assert!(blank.validate().is_err());

        let long = ResolveIssueRequest {
            notes: "x".repeat(2001),
        };
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_create_event_into_new_event() {
        let req = CreateEventRequest {
            title: "  Open night ".to_string(),
            description: None,
            starts_at: None,
            location: Some("Hall B".to_string()),
        };
        assert!(req.validate().is_ok());

        let event: NewEvent = req.into();
        assert_eq!(event.title, "Open night");
        assert_eq!(event.location.as_deref(), Some("Hall B"));
    }
}
