//! Club, membership and event records.

#![allow(missing_docs)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ClubId, EventId, MemberId, UserId};

/// A club as returned by `GET /clubs/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Club {
    pub id: ClubId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub member_count: u32,
}

/// Membership status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
    Pending,
    Approved,
    Rejected,
    #[serde(other)]
    Other,
}

/// A membership record as returned by `GET /clubs/{id}/members`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub id: MemberId,
    pub user_id: UserId,
    pub status: MemberStatus,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

impl Membership {
    /// Whether the membership awaits approval.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.status == MemberStatus::Pending
    }
}

/// A club event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub club_id: ClubId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub published: bool,
}

/// Payload for creating an event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEvent {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}
