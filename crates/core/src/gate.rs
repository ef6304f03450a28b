//! Rendering and permission policy driven by the enforcement state.
//!
//! The gate only shapes what the dashboards show and which controls they
//! enable. The backend independently rejects disallowed actions and remains
//! the authority; a permitted action here can still be refused there.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enforcement::{EnforcementResult, EnforcementState};
use crate::provider::EnforcementView;

/// Dashboard screens of a club administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Screen {
    /// Club overview.
    Dashboard,
    /// Where escalations are resolved. Reachable in every state.
    Issues,
    /// Event list and creation.
    Events,
    /// Membership requests and roster.
    Members,
}

/// Privileged actions a club administrator can take.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Draft a new event.
    CreateEvent,
    /// Post a club announcement.
    CreateAnnouncement,
    /// Make a drafted event public.
    PublishEvent,
    /// Accept a pending membership request.
    ApproveMember,
    /// Resolve an escalation, with notes.
    ResolveIssue,
}

impl Action {
    /// Every action, in display order.
    pub const ALL: [Self; 5] = [
        Self::CreateEvent,
        Self::CreateAnnouncement,
        Self::PublishEvent,
        Self::ApproveMember,
        Self::ResolveIssue,
    ];

    const fn is_creation(self) -> bool {
        matches!(self, Self::CreateEvent | Self::CreateAnnouncement)
    }
}

/// What the gate knows about the club.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Standing {
    /// A fetch is in flight or has not started.
    Loading,
    /// The last fetch failed; the state cannot be determined.
    Unknown {
        /// Why the fetch failed.
        reason: String,
    },
    /// A result from the latest fetch.
    Known(EnforcementResult),
}

/// How a screen should be rendered.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum Presentation {
    /// Normal content, no banner.
    Content,
    /// Loading indicator.
    Loading,
    /// Content with a non-blocking warning banner.
    Banner {
        state: EnforcementState,
        deadline: Option<DateTime<Utc>>,
        active_issues: usize,
    },
    /// Full-screen blocking overlay with a way out to the issues screen.
    Overlay {
        state: EnforcementState,
        deadline: Option<DateTime<Utc>>,
        active_issues: usize,
        /// Suspension can only be lifted by an institutional administrator.
        terminal: bool,
        resolve_at: Screen,
    },
    /// Content with an error notice; privileged actions are disabled.
    Unavailable { reason: String },
}

/// Enabled state of every privileged control, one flag per [`Action`].
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permissions {
    pub create_event: bool,
    pub create_announcement: bool,
    pub publish_event: bool,
    pub approve_member: bool,
    pub resolve_issue: bool,
}

/// Presentation plus permissions for one screen.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenDecision {
    /// The screen decided for.
    pub screen: Screen,
    /// How to render it.
    pub presentation: Presentation,
    /// Which controls to enable on it.
    pub permissions: Permissions,
}

/// Enforcement gate for a single evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnforcementGate {
    standing: Standing,
}

impl EnforcementGate {
    /// Create a gate from what is known about the club.
    #[must_use]
    pub const fn new(standing: Standing) -> Self {
        Self { standing }
    }

    /// Create a gate for a computed result.
    #[must_use]
    pub const fn known(result: EnforcementResult) -> Self {
        Self::new(Standing::Known(result))
    }

    /// Create a gate from a provider view.
    ///
    /// An error wins over any result, and a view without a result is treated
    /// as still loading.
    #[must_use]
    pub fn from_view(view: &EnforcementView) -> Self {
        let standing = if let Some(reason) = &view.error {
            Standing::Unknown {
                reason: reason.clone(),
            }
        } else if view.loading {
            Standing::Loading
        } else if let Some(result) = view.enforcement {
            Standing::Known(result)
        } else {
            Standing::Loading
        };
        Self::new(standing)
    }

    /// What the gate knows.
    #[must_use]
    pub const fn standing(&self) -> &Standing {
        &self.standing
    }

    /// Whether `action` may be offered.
    ///
    /// Fails closed: while loading or after an error only issue resolution
    /// stays available.
    #[must_use]
    pub const fn allows(&self, action: Action) -> bool {
        if matches!(action, Action::ResolveIssue) {
            return true;
        }
        match &self.standing {
            Standing::Loading | Standing::Unknown { .. } => false,
            Standing::Known(result) => match result.state {
                EnforcementState::Normal => true,
                EnforcementState::Restricted => !action.is_creation(),
                EnforcementState::Locked | EnforcementState::Suspended => false,
            },
        }
    }

    /// Enabled state of every privileged control.
    #[must_use]
    pub const fn permissions(&self) -> Permissions {
        Permissions {
            create_event: self.allows(Action::CreateEvent),
            create_announcement: self.allows(Action::CreateAnnouncement),
            publish_event: self.allows(Action::PublishEvent),
            approve_member: self.allows(Action::ApproveMember),
            resolve_issue: self.allows(Action::ResolveIssue),
        }
    }

    /// How `screen` should be rendered.
    #[must_use]
    pub fn presentation(&self, screen: Screen) -> Presentation {
        let result = match &self.standing {
            Standing::Loading => return Presentation::Loading,
            Standing::Unknown { reason } => {
                return Presentation::Unavailable {
                    reason: reason.clone(),
                };
            }
            Standing::Known(result) => *result,
        };

        match result.state {
            EnforcementState::Normal => Presentation::Content,
            // The issues screen must stay usable or a blocked club could never recover.
            state if !state.is_blocking() || screen == Screen::Issues => {
                Presentation::Banner {
                    state,
                    deadline: result.deadline,
                    active_issues: result.active_issues,
                }
            }
            state => Presentation::Overlay {
                state,
                deadline: result.deadline,
                active_issues: result.active_issues,
                terminal: state == EnforcementState::Suspended,
                resolve_at: Screen::Issues,
            },
        }
    }

    /// Presentation and permissions for `screen`.
    #[must_use]
    pub fn decide(&self, screen: Screen) -> ScreenDecision {
        ScreenDecision {
            screen,
            presentation: self.presentation(screen),
            permissions: self.permissions(),
        }
    }
}
