//! Club backend interface.

use std::sync::Arc;

use async_trait::async_trait;
use clubhub_common::AppResult;

use crate::models::{
    Club, ClubId, Escalation, EscalationId, Event, EventId, MemberId, Membership, NewEvent,
    UserId, UserProfile,
};

/// Read and mutation operations of the club REST backend.
///
/// Mutations are enforced by the backend itself. A policy refusal surfaces as
/// [`clubhub_common::AppError::PolicyRejected`] carrying the backend's message.
#[async_trait]
pub trait ClubBackend: Send + Sync {
    /// `GET /intelligence/escalations`. Global, unfiltered.
    async fn list_escalations(&self) -> AppResult<Vec<Escalation>>;

    /// `POST /intelligence/escalations/{id}/resolve`.
    async fn resolve_escalation(&self, id: EscalationId, notes: &str) -> AppResult<()>;

    /// `GET /clubs/{id}`.
    async fn get_club(&self, id: ClubId) -> AppResult<Club>;

    /// `GET /clubs/{id}/members`.
    async fn list_members(&self, club_id: ClubId) -> AppResult<Vec<Membership>>;

    /// `GET /users/{id}`.
    async fn get_user(&self, id: UserId) -> AppResult<UserProfile>;

    /// `POST /clubs/{id}/events`.
    async fn create_event(&self, club_id: ClubId, event: &NewEvent) -> AppResult<Event>;

    /// `POST /events/{id}/publish`.
    async fn publish_event(&self, event_id: EventId) -> AppResult<Event>;

    /// `POST /clubs/{id}/members/{member_id}/approve`.
    async fn approve_member(&self, club_id: ClubId, member_id: MemberId) -> AppResult<Membership>;
}

/// Hands out backend handles bound to a caller's credentials.
pub trait BackendConnector: Send + Sync {
    /// A backend acting with `bearer_token`, or anonymously.
    fn connect(&self, bearer_token: Option<&str>) -> Arc<dyn ClubBackend>;
}
