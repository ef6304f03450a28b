//! Records exchanged with the club backend.
//!
//! All of these are owned by the backend; this crate only reads them (and
//! forwards the handful of mutations the dashboards are allowed to request).

pub mod club;
pub mod escalation;
pub mod user;

pub use club::{Club, Event, MemberStatus, Membership, NewEvent};
pub use escalation::{Escalation, EscalationTime, Severity, TargetType, decode_escalations};
pub use user::{Role, UserProfile};

macro_rules! id_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                self.0.fmt(f)
            }
        }

        impl std::str::FromStr for $name {
            type Err = std::num::ParseIntError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim().parse().map(Self)
            }
        }
    };
}

id_type!(
    /// Backend identifier of a club.
    ClubId
);
id_type!(
    /// Backend identifier of an escalation (issue).
    EscalationId
);
id_type!(
    /// Backend identifier of a user.
    UserId
);
id_type!(
    /// Backend identifier of a membership record.
    MemberId
);
id_type!(
    /// Backend identifier of a club event.
    EventId
);
