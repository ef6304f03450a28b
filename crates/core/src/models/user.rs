//! User profiles and roles.

#![allow(missing_docs)]

use serde::{Deserialize, Serialize};

use super::{ClubId, UserId};

/// Dashboard role of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Student,
    ClubAdmin,
    SuperAdmin,
}

impl Role {
    /// Layout name the dashboards use for this role.
    #[must_use]
    pub const fn layout(self) -> &'static str {
        match self {
            Self::Student => "student",
            Self::ClubAdmin => "club-admin",
            Self::SuperAdmin => "super-admin",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "student" => Ok(Self::Student),
            "club_admin" => Ok(Self::ClubAdmin),
            "super_admin" => Ok(Self::SuperAdmin),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// A user profile as returned by `GET /users/{id}`.
///
/// Used as the fallback source of `club_id` when the session does not carry one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub club_id: Option<ClubId>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_role_from_header_value() {
        assert_eq!("club_admin".parse::<Role>().unwrap(), Role::ClubAdmin);
        assert_eq!("Super-Admin".parse::<Role>().unwrap(), Role::SuperAdmin);
        assert!("janitor".parse::<Role>().is_err());
    }
}
