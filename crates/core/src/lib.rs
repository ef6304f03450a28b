//! Core business logic for clubhub.
//!
//! - [`enforcement`]: derives a club's enforcement state from its open escalations
//! - [`provider`]: fetches club data through a [`ClubBackend`] and feeds the calculator
//! - [`gate`]: turns an enforcement state into per-screen rendering and permissions
//! - [`countdown`]: live remaining-time display for an enforcement deadline

pub mod clock;
pub mod countdown;
pub mod enforcement;
pub mod gate;
pub mod models;
pub mod provider;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use clock::{Clock, FixedClock, SystemClock};
pub use countdown::{Countdown, format_remaining};
pub use enforcement::{
    EnforcementResult, EnforcementState, LOCK_AFTER_HOURS, SUSPEND_AFTER_HOURS, compute,
    compute_all,
};
pub use gate::{Action, EnforcementGate, Permissions, Presentation, Screen, ScreenDecision, Standing};
pub use provider::{
    BackendConnector, ClubBackend, ClubContext, ClubSnapshot, EnforcementDataProvider,
    EnforcementSession, EnforcementView, RequestTag,
};
