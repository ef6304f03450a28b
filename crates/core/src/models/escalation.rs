//! Escalation (issue) records raised against clubs.

#![allow(missing_docs)]

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::warn;

use super::{ClubId, EscalationId};

/// What an escalation is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetType {
    Club,
    User,
    Event,
    /// Any target type this service does not know about.
    #[serde(other)]
    Other,
}

/// Severity of an escalation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning = 1,
    Escalated = 2,
    Intervention = 3,
    /// A severity this service does not know about. Never urgent.
    #[serde(other)]
    Unknown = 0,
}

impl Severity {
    /// Whether this severity starts the lock/suspension clock.
    #[must_use]
    pub const fn is_urgent(self) -> bool {
        matches!(self, Self::Escalated | Self::Intervention)
    }
}

/// A timestamp as reported by the backend.
///
/// Unparsable values are kept as [`EscalationTime::Malformed`] instead of
/// failing the whole escalation list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscalationTime {
    Valid(DateTime<Utc>),
    Malformed(String),
}

impl EscalationTime {
    /// Parse a backend timestamp.
    ///
    /// Accepts RFC 3339 and naive `YYYY-MM-DD HH:MM:SS[.f]` / `YYYY-MM-DDTHH:MM:SS[.f]`
    /// (interpreted as UTC).
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Self::Valid(dt.with_timezone(&Utc));
        }
        for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Self::Valid(naive.and_utc());
            }
        }
        Self::Malformed(raw.to_string())
    }

    /// The parsed instant, if the value was well-formed.
    #[must_use]
    pub const fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Valid(dt) => Some(*dt),
            Self::Malformed(_) => None,
        }
    }
}

impl From<DateTime<Utc>> for EscalationTime {
    fn from(dt: DateTime<Utc>) -> Self {
        Self::Valid(dt)
    }
}

impl Serialize for EscalationTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Valid(dt) => {
                serializer.serialize_str(&dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            }
            Self::Malformed(raw) => serializer.serialize_str(raw),
        }
    }
}

impl<'de> Deserialize<'de> for EscalationTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(match value {
            serde_json::Value::String(raw) => Self::parse(&raw),
            // Epoch milliseconds
            serde_json::Value::Number(n) => n
                .as_i64()
                .and_then(DateTime::from_timestamp_millis)
                .map_or_else(|| Self::Malformed(n.to_string()), Self::Valid),
            other => Self::Malformed(other.to_string()),
        })
    }
}

/// An escalation record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Escalation {
    pub id: EscalationId,
    pub target_type: TargetType,
    #[serde(deserialize_with = "numeric_id")]
    pub target_id: i64,
    pub severity: Severity,
    pub created_at: EscalationTime,
    #[serde(default)]
    pub resolved_at: Option<EscalationTime>,
    #[serde(default)]
    pub resolution_notes: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Target ids arrive as numbers or as numeric strings.
fn numeric_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| D::Error::custom(format!("target id {n} is not an integer"))),
        serde_json::Value::String(raw) => raw
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("target id {raw:?} is not numeric"))),
        other => Err(D::Error::custom(format!("unexpected target id {other}"))),
    }
}

/// Decode an escalation list record by record.
///
/// The list is global, so records for other targets may carry shapes this
/// service does not understand. Those are skipped with a warning instead of
/// failing the whole list.
#[must_use]
pub fn decode_escalations(records: Vec<serde_json::Value>) -> Vec<Escalation> {
    records
        .into_iter()
        .filter_map(|record| {
            let id = record.get("id").cloned();
            match serde_json::from_value(record) {
                Ok(escalation) => Some(escalation),
                Err(e) => {
                    warn!(id = ?id, error = %e, "Skipping undecodable escalation");
                    None
                }
            }
        })
        .collect()
}

impl Escalation {
    /// Whether the escalation is still unresolved.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.resolved_at.is_none()
    }

    /// Whether the escalation targets the given club.
    #[must_use]
    pub fn concerns_club(&self, club_id: ClubId) -> bool {
        self.target_type == TargetType::Club && self.target_id == club_id.0
    }

    /// The club this escalation targets, if it targets a club at all.
    #[must_use]
    pub fn club_id(&self) -> Option<ClubId> {
        (self.target_type == TargetType::Club).then_some(ClubId(self.target_id))
    }

    /// Unresolved and targeting the given club.
    #[must_use]
    pub fn is_open_against(&self, club_id: ClubId) -> bool {
        self.is_open() && self.concerns_club(club_id)
    }
}
