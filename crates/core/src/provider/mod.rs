//! Enforcement data provider.
//!
//! Every screen obtains its club data and enforcement result through
//! [`EnforcementDataProvider`], so the policy in [`crate::enforcement`] is
//! evaluated the same way everywhere.

mod backend;
mod session;

pub use backend::{BackendConnector, ClubBackend};
pub use session::{EnforcementSession, RequestTag};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use clubhub_common::{AppError, AppResult};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::enforcement::{self, EnforcementResult};
use crate::models::{Club, ClubId, Escalation, EscalationId, Membership, UserId};

/// Who is asking, and for which club if known.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClubContext {
    /// The user asking.
    pub user_id: UserId,
    /// Club from the session. When absent, the user's profile is consulted.
    pub club_id: Option<ClubId>,
}

impl ClubContext {
    /// Context with a club already known.
    #[must_use]
    pub const fn for_club(user_id: UserId, club_id: ClubId) -> Self {
        Self {
            user_id,
            club_id: Some(club_id),
        }
    }

    /// Context that resolves the club through the user's profile.
    #[must_use]
    pub const fn for_user(user_id: UserId) -> Self {
        Self {
            user_id,
            club_id: None,
        }
    }
}

/// Everything one fetch cycle produced for a club.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClubSnapshot {
    /// The club record.
    pub club: Club,
    /// Result derived from this fetch.
    pub enforcement: EnforcementResult,
    /// Membership requests awaiting approval.
    pub pending_members_count: usize,
    /// All escalations targeting this club, resolved ones included.
    pub escalations: Vec<Escalation>,
    /// The club's memberships, in backend order.
    pub members: Vec<Membership>,
    /// The "now" the enforcement result was computed at.
    pub evaluated_at: DateTime<Utc>,
}

/// What a screen displays while its data is fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementView {
    /// Club of the last applied fetch.
    pub club: Option<Club>,
    /// Result of the last applied fetch.
    pub enforcement: Option<EnforcementResult>,
    /// Membership requests awaiting approval.
    pub pending_members_count: usize,
    /// A fetch is in flight.
    pub loading: bool,
    /// Why the last fetch failed.
    pub error: Option<String>,
}

impl EnforcementView {
    /// View of a completed fetch.
    #[must_use]
    pub fn from_snapshot(snapshot: &ClubSnapshot) -> Self {
        Self {
            club: Some(snapshot.club.clone()),
            enforcement: Some(snapshot.enforcement),
            pending_members_count: snapshot.pending_members_count,
            loading: false,
            error: None,
        }
    }

    /// View of a failed fetch. Nothing from earlier fetches is kept.
    #[must_use]
    pub fn failed(error: &AppError) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::default()
        }
    }
}

/// Fetches club data and derives its enforcement result.
#[derive(Clone)]
pub struct EnforcementDataProvider {
    backend: Arc<dyn ClubBackend>,
    clock: Arc<dyn Clock>,
}

impl EnforcementDataProvider {
    /// Create a provider.
    #[must_use]
    pub fn new(backend: Arc<dyn ClubBackend>, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// The backend this provider reads from.
    #[must_use]
    pub fn backend(&self) -> &Arc<dyn ClubBackend> {
        &self.backend
    }

    /// The clock enforcement is evaluated against.
    #[must_use]
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Resolve the club of `ctx`, falling back to the user's profile.
    pub async fn resolve_club_id(&self, ctx: &ClubContext) -> AppResult<ClubId> {
        if let Some(club_id) = ctx.club_id {
            return Ok(club_id);
        }

        debug!(user_id = %ctx.user_id, "Resolving club through user profile");
        let profile = self.backend.get_user(ctx.user_id).await?;
        profile.club_id.ok_or_else(|| {
            AppError::NotFound(format!("User {} is not attached to a club", ctx.user_id))
        })
    }

    /// Resolve the club of `ctx` and run a full fetch cycle for it.
    pub async fn load(&self, ctx: &ClubContext) -> AppResult<ClubSnapshot> {
        let club_id = self.resolve_club_id(ctx).await?;
        self.load_club(club_id).await
    }

    /// Fetch club, escalations and members concurrently, then derive.
    pub async fn load_club(&self, club_id: ClubId) -> AppResult<ClubSnapshot> {
        let fetched = tokio::try_join!(
            self.backend.get_club(club_id),
            self.backend.list_escalations(),
            self.backend.list_members(club_id),
        );
        let (club, escalations, members) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(club_id = %club_id, error = %e, "Failed to fetch enforcement data");
                return Err(e);
            }
        };

        let evaluated_at = self.clock.now();
        let enforcement = enforcement::compute(&escalations, club_id, evaluated_at);
        let pending_members_count = members.iter().filter(|m| m.is_pending()).count();

        debug!(
            club_id = %club_id,
            state = %enforcement.state,
            active_issues = enforcement.active_issues,
            pending_members_count,
            "Computed club enforcement"
        );

        let escalations = escalations
            .into_iter()
            .filter(|e| e.concerns_club(club_id))
            .collect();

        Ok(ClubSnapshot {
            club,
            enforcement,
            pending_members_count,
            escalations,
            members,
            evaluated_at,
        })
    }

    /// Resolve an escalation raised against `club_id`.
    ///
    /// Ids that do not target the club are rejected before anything is sent.
    /// The caller re-fetches afterwards; the backend does not push.
    pub async fn resolve_escalation(
        &self,
        club_id: ClubId,
        escalation_id: EscalationId,
        notes: &str,
    ) -> AppResult<()> {
        let escalations = self.backend.list_escalations().await?;
        if !escalations
            .iter()
            .any(|e| e.id == escalation_id && e.concerns_club(club_id))
        {
            return Err(AppError::NotFound(format!(
                "Escalation {escalation_id} not found for club {club_id}"
            )));
        }

        self.backend.resolve_escalation(escalation_id, notes).await?;
        info!(club_id = %club_id, escalation_id = %escalation_id, "Escalation resolved");
        Ok(())
    }

    /// Enforcement results of every club with open escalations.
    pub async fn overview(&self) -> AppResult<Vec<(ClubId, EnforcementResult)>> {
        let escalations = self.backend.list_escalations().await?;
        Ok(enforcement::compute_all(&escalations, self.clock.now()))
    }
}
