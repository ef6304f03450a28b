//! Club enforcement state derivation.
//!
//! The state of a club is never stored. It is derived from scratch, on every
//! evaluation, from the club's unresolved escalations and the current time:
//!
//! | oldest unresolved urgent escalation | state        | deadline                  |
//! |-------------------------------------|--------------|---------------------------|
//! | none, no open escalations           | `normal`     | none                      |
//! | none, only warnings open            | `restricted` | none                      |
//! | at most 48h old                     | `restricted` | `created_at + 48h`        |
//! | older than 48h, at most 168h        | `locked`     | `created_at + 168h`       |
//! | older than 168h                     | `suspended`  | none                      |
//!
//! Every screen goes through [`compute`]; nothing else may compare escalation
//! ages against the thresholds below.

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::models::{ClubId, Escalation, EscalationTime};

/// Age past which an urgent escalation locks its club.
pub const LOCK_AFTER_HOURS: i64 = 48;

/// Age past which an urgent escalation suspends its club.
pub const SUSPEND_AFTER_HOURS: i64 = 168;

const MILLIS_PER_HOUR: f64 = 3_600_000.0;

/// Operational posture of a club. Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnforcementState {
    /// Nothing open against the club.
    Normal,
    /// Open issues; creation is disabled.
    Restricted,
    /// An urgent issue is over 48h old; every screen but issues is blocked.
    Locked,
    /// An urgent issue is over 168h old. Only an institutional administrator
    /// can lift this.
    Suspended,
}

impl EnforcementState {
    /// Lowercase name, as used on the wire.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Restricted => "restricted",
            Self::Locked => "locked",
            Self::Suspended => "suspended",
        }
    }

    /// Whether screens other than the issues screen are blocked.
    #[must_use]
    pub const fn is_blocking(self) -> bool {
        matches!(self, Self::Locked | Self::Suspended)
    }
}

impl std::fmt::Display for EnforcementState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of evaluating a club's escalations at one instant.
///
/// Valid only for the fetch it was computed from; "now" keeps moving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnforcementResult {
    /// Derived state.
    pub state: EnforcementState,
    /// When the state advances further absent resolution.
    pub deadline: Option<DateTime<Utc>>,
    /// Unresolved escalations against the club, of any severity.
    pub active_issues: usize,
}

impl EnforcementResult {
    /// A club with nothing open against it.
    #[must_use]
    pub const fn normal() -> Self {
        Self {
            state: EnforcementState::Normal,
            deadline: None,
            active_issues: 0,
        }
    }

    const fn restricted_without_deadline(active_issues: usize) -> Self {
        Self {
            state: EnforcementState::Restricted,
            deadline: None,
            active_issues,
        }
    }
}

/// Derive the enforcement state of `club_id` at `now`.
///
/// `escalations` may contain resolved records and records for other targets;
/// they are ignored here.
#[must_use]
pub fn compute(escalations: &[Escalation], club_id: ClubId, now: DateTime<Utc>) -> EnforcementResult {
    let mine: Vec<&Escalation> = escalations
        .iter()
        .filter(|e| e.is_open_against(club_id))
        .collect();

    if mine.is_empty() {
        return EnforcementResult::normal();
    }
    let active_issues = mine.len();

    let urgent: Vec<&Escalation> = mine
        .iter()
        .copied()
        .filter(|e| e.severity.is_urgent())
        .collect();

    // Warnings alone hold the club at restricted with no clock running.
    if urgent.is_empty() {
        return EnforcementResult::restricted_without_deadline(active_issues);
    }

    let Some((_, created_at)) = oldest_urgent(&urgent, club_id) else {
        error!(
            club_id = %club_id,
            urgent = urgent.len(),
            "No urgent escalation has a usable created_at, holding club at restricted"
        );
        return EnforcementResult::restricted_without_deadline(active_issues);
    };

    let age = hours_between(created_at, now);
    let (state, deadline) = if age > SUSPEND_AFTER_HOURS as f64 {
        (EnforcementState::Suspended, None)
    } else if age > LOCK_AFTER_HOURS as f64 {
        (
            EnforcementState::Locked,
            created_at.checked_add_signed(Duration::hours(SUSPEND_AFTER_HOURS)),
        )
    } else {
        (
            EnforcementState::Restricted,
            created_at.checked_add_signed(Duration::hours(LOCK_AFTER_HOURS)),
        )
    };

    EnforcementResult {
        state,
        deadline,
        active_issues,
    }
}

/// Derive the state of every club that has at least one unresolved escalation.
///
/// Sorted most severe first, then by nearest deadline, then by club id.
#[must_use]
pub fn compute_all(escalations: &[Escalation], now: DateTime<Utc>) -> Vec<(ClubId, EnforcementResult)> {
    let clubs: BTreeSet<ClubId> = escalations
        .iter()
        .filter(|e| e.is_open())
        .filter_map(Escalation::club_id)
        .collect();

    let mut results: Vec<(ClubId, EnforcementResult)> = clubs
        .into_iter()
        .map(|club_id| (club_id, compute(escalations, club_id, now)))
        .collect();

    results.sort_by(|(a_id, a), (b_id, b)| {
        b.state
            .cmp(&a.state)
            .then_with(|| match (a.deadline, b.deadline) {
                (Some(x), Some(y)) => x.cmp(&y),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            })
            .then_with(|| a_id.cmp(b_id))
    });
    results
}

/// Oldest urgent escalation by `created_at`, lowest id on ties.
///
/// Records whose `created_at` could not be parsed are logged and skipped.
pub(crate) fn oldest_urgent<'a>(
    urgent: &[&'a Escalation],
    club_id: ClubId,
) -> Option<(&'a Escalation, DateTime<Utc>)> {
    urgent
        .iter()
        .filter_map(|e| match &e.created_at {
            EscalationTime::Valid(created_at) => Some((*e, *created_at)),
            EscalationTime::Malformed(raw) => {
                error!(
                    club_id = %club_id,
                    escalation_id = %e.id,
                    created_at = %raw,
                    "Escalation has malformed created_at"
                );
                None
            }
        })
        .min_by_key(|(e, created_at)| (*created_at, e.id))
}

/// Elapsed hours from `from` to `to`, unrounded.
#[must_use]
pub fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / MILLIS_PER_HOUR
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::{EscalationId, Severity, TargetType};
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 14, 9, 0, 0).unwrap()
    }

    fn escalation(id: i64, club: i64, severity: Severity, created_at: DateTime<Utc>) -> Escalation {
        Escalation {
            id: EscalationId(id),
            target_type: TargetType::Club,
            target_id: club,
            severity,
            created_at: EscalationTime::Valid(created_at),
            resolved_at: None,
            resolution_notes: None,
            title: None,
            description: None,
        }
    }

    fn hours_ago(hours: i64) -> DateTime<Utc> {
        now() - Duration::hours(hours)
    }

    #[test]
    fn test_no_matching_escalations_is_normal() {
        let mut resolved = escalation(1, 7, Severity::Intervention, hours_ago(500));
        resolved.resolved_at = Some(EscalationTime::Valid(hours_ago(1)));
        let mut user_target = escalation(2, 7, Severity::Escalated, hours_ago(200));
        user_target.target_type = TargetType::User;
        let other_club = escalation(3, 8, Severity::Escalated, hours_ago(200));

        for set in [vec![], vec![resolved, user_target, other_club]] {
            let result = compute(&set, ClubId(7), now());
            assert_eq!(result, EnforcementResult::normal());
        }
    }

    #[test]
    fn test_warnings_only_is_restricted_without_deadline() {
        let set = vec![
            escalation(1, 7, Severity::Warning, hours_ago(1000)),
            escalation(2, 7, Severity::Warning, hours_ago(3)),
        ];
        let result = compute(&set, ClubId(7), now());

        assert_eq!(result.state, EnforcementState::Restricted);
        assert_eq!(result.deadline, None);
        assert_eq!(result.active_issues, 2);
    }

    #[test]
    fn test_escalated_just_under_two_days_is_restricted() {
        let created_at = now() - Duration::hours(47) - Duration::minutes(59);
        let set = vec![escalation(1, 7, Severity::Escalated, created_at)];
        let result = compute(&set, ClubId(7), now());

        assert_eq!(result.state, EnforcementState::Restricted);
        assert_eq!(result.deadline, Some(created_at + Duration::hours(48)));
        assert_eq!(result.active_issues, 1);
    }

    #[test]
    fn test_exactly_two_days_is_still_restricted() {
        let created_at = hours_ago(48);
        let result = compute(&[escalation(1, 7, Severity::Escalated, created_at)], ClubId(7), now());

        assert_eq!(result.state, EnforcementState::Restricted);
        assert_eq!(result.deadline, Some(now()));
    }

    #[test]
    fn test_intervention_after_two_days_is_locked() {
        let created_at = hours_ago(49);
        let set = vec![escalation(1, 7, Severity::Intervention, created_at)];
        let result = compute(&set, ClubId(7), now());

        assert_eq!(result.state, EnforcementState::Locked);
        assert_eq!(result.deadline, Some(created_at + Duration::hours(168)));
    }

    #[test]
    fn test_escalated_after_seven_days_is_suspended() {
        let set = vec![escalation(1, 7, Severity::Escalated, hours_ago(169))];
        let result = compute(&set, ClubId(7), now());

        assert_eq!(result.state, EnforcementState::Suspended);
        assert_eq!(result.deadline, None);
        assert_eq!(result.active_issues, 1);
    }

    #[test]
    fn test_locked_scenario_for_club_seven() {
        let set = vec![escalation(1, 7, Severity::Escalated, hours_ago(50))];
        let result = compute(&set, ClubId(7), now());

        assert_eq!(
            result,
            EnforcementResult {
                state: EnforcementState::Locked,
                deadline: Some(hours_ago(50) + Duration::hours(168)),
                active_issues: 1,
            }
        );
    }

    #[test]
    fn test_oldest_urgent_escalation_decides() {
        let set = vec![
            escalation(1, 7, Severity::Escalated, hours_ago(10)),
            escalation(2, 7, Severity::Intervention, hours_ago(60)),
            escalation(3, 7, Severity::Warning, hours_ago(400)),
        ];
        let result = compute(&set, ClubId(7), now());

        assert_eq!(result.state, EnforcementState::Locked);
        assert_eq!(result.deadline, Some(hours_ago(60) + Duration::hours(168)));
        // Warnings still count as active issues
        assert_eq!(result.active_issues, 3);
    }

    #[test]
    fn test_compute_is_idempotent() {
        let set = vec![
            escalation(1, 7, Severity::Escalated, hours_ago(30)),
            escalation(2, 7, Severity::Warning, hours_ago(2)),
        ];
        assert_eq!(compute(&set, ClubId(7), now()), compute(&set, ClubId(7), now()));
    }

    #[test]
    fn test_state_never_moves_backward_as_time_advances() {
        let created_at = hours_ago(0);
        let set = vec![
            escalation(1, 7, Severity::Warning, created_at - Duration::hours(5)),
            escalation(2, 7, Severity::Escalated, created_at),
        ];

        let mut previous = EnforcementState::Normal;
        for half_hours in -20..=400 {
            let at = created_at + Duration::minutes(30 * half_hours);
            let state = compute(&set, ClubId(7), at).state;
            assert!(state >= previous, "state went from {previous} to {state} at {at}");
            previous = state;
        }
        assert_eq!(previous, EnforcementState::Suspended);
    }

    #[test]
    fn test_malformed_urgent_timestamp_fails_to_restricted() {
        let mut broken = escalation(1, 7, Severity::Intervention, hours_ago(0));
        broken.created_at = EscalationTime::Malformed("not a date".to_string());
        let result = compute(&[broken], ClubId(7), now());

        assert_eq!(result.state, EnforcementState::Restricted);
        assert_eq!(result.deadline, None);
        assert_eq!(result.active_issues, 1);
    }

    #[test]
    fn test_malformed_timestamp_does_not_mask_valid_one() {
        let mut broken = escalation(1, 7, Severity::Intervention, hours_ago(0));
        broken.created_at = EscalationTime::Malformed(String::new());
        let set = vec![broken, escalation(2, 7, Severity::Escalated, hours_ago(100))];
        let result = compute(&set, ClubId(7), now());

        assert_eq!(result.state, EnforcementState::Locked);
        assert_eq!(result.active_issues, 2);
    }

    #[test]
    fn test_tie_on_created_at_picks_lowest_id() {
        let at = hours_ago(20);
        let a = escalation(9, 7, Severity::Escalated, at);
        let b = escalation(4, 7, Severity::Intervention, at);

        for order in [vec![&a, &b], vec![&b, &a]] {
            let (picked, _) = oldest_urgent(&order, ClubId(7)).unwrap();
            assert_eq!(picked.id, EscalationId(4));
        }
    }

    #[test]
    fn test_future_created_at_stays_restricted() {
        let created_at = now() + Duration::hours(2);
        let result = compute(&[escalation(1, 7, Severity::Escalated, created_at)], ClubId(7), now());

        assert_eq!(result.state, EnforcementState::Restricted);
        assert_eq!(result.deadline, Some(created_at + Duration::hours(48)));
    }

    #[test]
    fn test_compute_all_orders_most_severe_first() {
        let mut resolved = escalation(5, 4, Severity::Intervention, hours_ago(900));
        resolved.resolved_at = Some(EscalationTime::Valid(hours_ago(1)));
        let set = vec![
            escalation(1, 1, Severity::Warning, hours_ago(5)),
            escalation(2, 2, Severity::Escalated, hours_ago(200)),
            escalation(3, 3, Severity::Escalated, hours_ago(60)),
            escalation(4, 5, Severity::Escalated, hours_ago(90)),
            resolved,
        ];
        let results = compute_all(&set, now());
        let order: Vec<(i64, EnforcementState)> =
            results.iter().map(|(id, r)| (id.0, r.state)).collect();

        assert_eq!(
            order,
            vec![
                (2, EnforcementState::Suspended),
                // Club 5 hits suspension first
                (5, EnforcementState::Locked),
                (3, EnforcementState::Locked),
                (1, EnforcementState::Restricted),
            ]
        );
    }

    #[test]
    fn test_hours_between_is_fractional() {
        let from = now();
        let to = from + Duration::minutes(90);
        assert_eq!(hours_between(from, to), 1.5);
    }
}
