//! Test utilities: an in-memory club backend and record builders.

#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use clubhub_common::{AppError, AppResult};

use crate::models::{
    Club, ClubId, Escalation, EscalationId, EscalationTime, Event, EventId, MemberId,
    MemberStatus, Membership, NewEvent, Severity, TargetType, UserId, UserProfile,
};
use crate::provider::{BackendConnector, ClubBackend};

/// Backend operations, for injecting failures and counting calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    ListEscalations,
    ResolveEscalation,
    GetClub,
    ListMembers,
    GetUser,
    CreateEvent,
    PublishEvent,
    ApproveMember,
}

#[derive(Default)]
struct State {
    escalations: Vec<Escalation>,
    clubs: HashMap<ClubId, Club>,
    members: HashMap<ClubId, Vec<Membership>>,
    users: HashMap<UserId, UserProfile>,
    events: Vec<Event>,
    failures: HashMap<Endpoint, AppError>,
    club_delays: HashMap<ClubId, Duration>,
    latency: Option<Duration>,
    calls: Vec<Endpoint>,
    tokens: Vec<Option<String>>,
}

/// Club backend kept in memory.
///
/// Clones share state, so a test can keep a handle while the code under test
/// owns another.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    state: Arc<Mutex<State>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_club(self, club: Club) -> Self {
        self.lock().clubs.insert(club.id, club);
        self
    }

    #[must_use]
    pub fn with_member(self, club_id: i64, member: Membership) -> Self {
        self.lock()
            .members
            .entry(ClubId(club_id))
            .or_default()
            .push(member);
        self
    }

    #[must_use]
    pub fn with_user(self, user: UserProfile) -> Self {
        self.lock().users.insert(user.id, user);
        self
    }

    #[must_use]
    pub fn with_escalation(self, escalation: Escalation) -> Self {
        self.lock().escalations.push(escalation);
        self
    }

    #[must_use]
    pub fn with_event(self, event: Event) -> Self {
        self.lock().events.push(event);
        self
    }

    /// Make every later call to `endpoint` fail with `error`.
    pub fn fail(&self, endpoint: Endpoint, error: AppError) {
        self.lock().failures.insert(endpoint, error);
    }

    /// Stop failing `endpoint`.
    pub fn heal(&self, endpoint: Endpoint) {
        self.lock().failures.remove(&endpoint);
    }

    /// Delay `GET /clubs/{id}` for one club.
    pub fn delay_club(&self, club_id: ClubId, delay: Duration) {
        self.lock().club_delays.insert(club_id, delay);
    }

    /// Delay every call.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    #[must_use]
    pub fn calls_to(&self, endpoint: Endpoint) -> usize {
        self.lock().calls.iter().filter(|c| **c == endpoint).count()
    }

    /// Bearer tokens seen by [`BackendConnector::connect`].
    #[must_use]
    pub fn tokens(&self) -> Vec<Option<String>> {
        self.lock().tokens.clone()
    }

    #[must_use]
    pub fn escalations(&self) -> Vec<Escalation> {
        self.lock().escalations.clone()
    }

    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self, endpoint: Endpoint, club_id: Option<ClubId>) -> AppResult<()> {
        let delay = {
            let mut state = self.lock();
            state.calls.push(endpoint);
            let club_delay = club_id.and_then(|id| state.club_delays.get(&id).copied());
            club_delay.or(state.latency)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        match self.lock().failures.get(&endpoint) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ClubBackend for InMemoryBackend {
    async fn list_escalations(&self) -> AppResult<Vec<Escalation>> {
        self.enter(Endpoint::ListEscalations, None).await?;
        Ok(self.lock().escalations.clone())
    }

    async fn resolve_escalation(&self, id: EscalationId, notes: &str) -> AppResult<()> {
        self.enter(Endpoint::ResolveEscalation, None).await?;
        let mut state = self.lock();
        let escalation = state
            .escalations
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| AppError::NotFound(format!("Escalation {id} not found")))?;
        escalation.resolved_at = Some(EscalationTime::Valid(Utc::now()));
        escalation.resolution_notes = Some(notes.to_string());
        Ok(())
    }

    async fn get_club(&self, id: ClubId) -> AppResult<Club> {
        self.enter(Endpoint::GetClub, Some(id)).await?;
        self.lock()
            .clubs
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("Club {id} not found")))
    }

    async fn list_members(&self, club_id: ClubId) -> AppResult<Vec<Membership>> {
        self.enter(Endpoint::ListMembers, None).await?;
        Ok(self.lock().members.get(&club_id).cloned().unwrap_or_default())
    }

    async fn get_user(&self, id: UserId) -> AppResult<UserProfile> {
        self.enter(Endpoint::GetUser, None).await?;
        self.lock()
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User {id} not found")))
    }

    async fn create_event(&self, club_id: ClubId, event: &NewEvent) -> AppResult<Event> {
        self.enter(Endpoint::CreateEvent, None).await?;
        let mut state = self.lock();
        let created = Event {
            id: EventId(state.events.len() as i64 + 1),
            club_id,
            title: event.title.clone(),
            description: event.description.clone(),
            starts_at: event.starts_at,
            location: event.location.clone(),
            published: false,
        };
        state.events.push(created.clone());
        Ok(created)
    }

    async fn publish_event(&self, event_id: EventId) -> AppResult<Event> {
        self.enter(Endpoint::PublishEvent, None).await?;
        let mut state = self.lock();
        let event = state
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))?;
        event.published = true;
        Ok(event.clone())
    }

    async fn approve_member(&self, club_id: ClubId, member_id: MemberId) -> AppResult<Membership> {
        self.enter(Endpoint::ApproveMember, None).await?;
        let mut state = self.lock();
        let member = state
            .members
            .get_mut(&club_id)
            .and_then(|members| members.iter_mut().find(|m| m.id == member_id))
            .ok_or_else(|| AppError::NotFound(format!("Member {member_id} not found")))?;
        member.status = MemberStatus::Approved;
        Ok(member.clone())
    }
}

impl BackendConnector for InMemoryBackend {
    fn connect(&self, bearer_token: Option<&str>) -> Arc<dyn ClubBackend> {
        self.lock().tokens.push(bearer_token.map(str::to_string));
        Arc::new(self.clone())
    }
}

/// Fixed reference instant used across tests.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

#[must_use]
pub fn club(id: i64, name: &str) -> Club {
    Club {
        id: ClubId(id),
        name: name.to_string(),
        description: None,
        member_count: 0,
    }
}

#[must_use]
pub fn membership(id: i64, user_id: i64, status: MemberStatus) -> Membership {
    Membership {
        id: MemberId(id),
        user_id: UserId(user_id),
        status,
        name: None,
        joined_at: None,
    }
}

#[must_use]
pub fn escalation(id: i64, club_id: i64, severity: Severity, created_at: DateTime<Utc>) -> Escalation {
    Escalation {
        id: EscalationId(id),
        target_type: TargetType::Club,
        target_id: club_id,
        severity,
        created_at: EscalationTime::Valid(created_at),
        resolved_at: None,
        resolution_notes: None,
        title: None,
        description: None,
    }
}
