//! Per-screen fetch cycles with stale-response discard.

use std::sync::{Mutex, PoisonError};

use clubhub_common::AppResult;
use tokio::sync::watch;
use tracing::debug;

use super::{ClubContext, ClubSnapshot, EnforcementDataProvider, EnforcementView};
use crate::models::EscalationId;

/// Identifies one fetch cycle.
///
/// A response is applied only if its tag still names the session's latest
/// request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTag {
    generation: u64,
    context: ClubContext,
}

impl RequestTag {
    /// The context the request was issued for.
    #[must_use]
    pub const fn context(&self) -> &ClubContext {
        &self.context
    }
}

#[derive(Debug, Default)]
struct Inflight {
    generation: u64,
    context: Option<ClubContext>,
}

/// The enforcement state a single screen is showing.
///
/// Each screen owns one session. Nothing is shared between sessions except
/// the provider they fetch through.
pub struct EnforcementSession {
    provider: EnforcementDataProvider,
    view: watch::Sender<EnforcementView>,
    inflight: Mutex<Inflight>,
}

impl EnforcementSession {
    /// Create a session with nothing loaded.
    #[must_use]
    pub fn new(provider: EnforcementDataProvider) -> Self {
        let (view, _) = watch::channel(EnforcementView::default());
        Self {
            provider,
            view,
            inflight: Mutex::new(Inflight::default()),
        }
    }

    /// The provider this session fetches through.
    #[must_use]
    pub const fn provider(&self) -> &EnforcementDataProvider {
        &self.provider
    }

    /// Receive every applied view.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<EnforcementView> {
        self.view.subscribe()
    }

    /// The view currently shown.
    #[must_use]
    pub fn view(&self) -> EnforcementView {
        self.view.borrow().clone()
    }

    /// The context the latest request was issued for.
    #[must_use]
    pub fn context(&self) -> Option<ClubContext> {
        self.lock().context
    }

    /// Start a fetch cycle for `context`, superseding any in flight.
    ///
    /// Switching to a different context drops what was shown for the old one.
    pub fn begin(&self, context: ClubContext) -> RequestTag {
        let mut inflight = self.lock();
        inflight.generation += 1;
        let switched = inflight.context != Some(context);
        inflight.context = Some(context);

        self.view.send_modify(|view| {
            if switched {
                *view = EnforcementView::default();
            }
            view.loading = true;
            view.error = None;
        });

        RequestTag {
            generation: inflight.generation,
            context,
        }
    }

    /// Apply the outcome of the request tagged `tag`.
    ///
    /// Returns `false` when the request was superseded or the session was
    /// detached; the outcome is then discarded.
    pub fn complete(&self, tag: &RequestTag, outcome: AppResult<ClubSnapshot>) -> bool {
        let inflight = self.lock();
        if inflight.generation != tag.generation || inflight.context != Some(tag.context) {
            debug!(
                user_id = %tag.context.user_id,
                club_id = ?tag.context.club_id,
                "Discarding superseded enforcement response"
            );
            return false;
        }

        if let (Ok(snapshot), Some(expected)) = (&outcome, tag.context.club_id)
            && snapshot.club.id != expected
        {
            debug!(
                expected = %expected,
                received = %snapshot.club.id,
                "Discarding enforcement response for another club"
            );
            return false;
        }

        let view = match &outcome {
            Ok(snapshot) => EnforcementView::from_snapshot(snapshot),
            Err(e) => EnforcementView::failed(e),
        };
        self.view.send_replace(view);
        true
    }

    /// Run a full fetch cycle for `context`.
    ///
    /// Returns the snapshot if it was applied.
    pub async fn refresh(&self, context: ClubContext) -> Option<AppResult<ClubSnapshot>> {
        let tag = self.begin(context);
        let outcome = self.provider.load(&context).await;
        self.complete(&tag, outcome.clone()).then_some(outcome)
    }

    /// Re-run the fetch cycle for the current context, if any.
    pub async fn refresh_current(&self) -> Option<AppResult<ClubSnapshot>> {
        let context = self.context()?;
        self.refresh(context).await
    }

    /// Resolve an escalation of `context`'s club, then re-fetch.
    ///
    /// A failed mutation is returned as the error. The re-fetch that follows
    /// is applied the same way as [`Self::refresh`].
    pub async fn resolve(
        &self,
        context: ClubContext,
        escalation_id: EscalationId,
        notes: &str,
    ) -> AppResult<Option<AppResult<ClubSnapshot>>> {
        let club_id = self.provider.resolve_club_id(&context).await?;
        self.provider
            .resolve_escalation(club_id, escalation_id, notes)
            .await?;
        Ok(self
            .refresh(ClubContext::for_club(context.user_id, club_id))
            .await)
    }

    /// Forget the current context; late responses are ignored from now on.
    pub fn detach(&self) {
        let mut inflight = self.lock();
        inflight.generation += 1;
        inflight.context = None;
        self.view.send_replace(EnforcementView::default());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inflight> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::enforcement::EnforcementState;
    use crate::models::{ClubId, MemberStatus, Severity, UserId};
    use crate::test_utils::{Endpoint, InMemoryBackend, club, escalation, membership, now};
    use chrono::Duration;
    use clubhub_common::AppError;
    use std::sync::Arc;

    fn session(backend: &InMemoryBackend) -> EnforcementSession {
        EnforcementSession::new(EnforcementDataProvider::new(
            Arc::new(backend.clone()),
            Arc::new(FixedClock::new(now())),
        ))
    }

    fn seeded() -> InMemoryBackend {
        InMemoryBackend::new()
            .with_club(club(1, "Debate"))
            .with_club(club(2, "Film"))
            .with_member(2, membership(1, 50, MemberStatus::Pending))
            .with_escalation(escalation(1, 1, Severity::Intervention, now() - Duration::hours(100)))
    }

    #[tokio::test]
    async fn test_refresh_applies_result() {
        let backend = seeded();
        let session = session(&backend);
        let applied = session.refresh(ClubContext::for_club(UserId(9), ClubId(1))).await;

        assert!(applied.unwrap().is_ok());
        let view = session.view();
        assert!(!view.loading);
        assert_eq!(view.club.unwrap().id, ClubId(1));
        assert_eq!(view.enforcement.unwrap().state, EnforcementState::Locked);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_response_is_discarded() {
        let backend = seeded();
        backend.delay_club(ClubId(1), std::time::Duration::from_secs(5));
        let session = session(&backend);

        let club_a = ClubContext::for_club(UserId(9), ClubId(1));
        let club_b = ClubContext::for_club(UserId(9), ClubId(2));

        let (a, b) = tokio::join!(session.refresh(club_a), async {
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
            session.refresh(club_b).await
        });

        assert!(a.is_none(), "club A response must be ignored");
        assert!(b.is_some());
        let view = session.view();
        assert_eq!(view.club.unwrap().id, ClubId(2));
        assert_eq!(view.enforcement.unwrap().state, EnforcementState::Normal);
        assert_eq!(view.pending_members_count, 1);
    }

    #[tokio::test]
    async fn test_late_response_after_detach_is_ignored() {
        let backend = seeded();
        let session = session(&backend);
        let context = ClubContext::for_club(UserId(9), ClubId(1));

        let tag = session.begin(context);
        let outcome = session.provider().load(&context).await;
        session.detach();

        assert!(!session.complete(&tag, outcome));
        assert_eq!(session.view(), EnforcementView::default());
    }

    #[tokio::test]
    async fn test_response_for_other_club_is_ignored() {
        let backend = seeded();
        let session = session(&backend);
        let tag = session.begin(ClubContext::for_club(UserId(9), ClubId(1)));
        let wrong = session.provider().load_club(ClubId(2)).await;

        assert!(!session.complete(&tag, wrong));
        assert!(session.view().loading);
    }

    #[tokio::test]
    async fn test_failure_clears_previous_state() {
        let backend = seeded();
        let session = session(&backend);
        let context = ClubContext::for_club(UserId(9), ClubId(1));
        session.refresh(context).await;
        assert!(session.view().enforcement.is_some());

        backend.fail(Endpoint::ListEscalations, AppError::Upstream("timed out".to_string()));
        session.refresh_current().await;

        let view = session.view();
        assert!(!view.loading);
        assert!(view.enforcement.is_none());
        assert!(view.club.is_none());
        assert_eq!(view.error.as_deref(), Some("Upstream error: timed out"));

        backend.heal(Endpoint::ListEscalations);
        session.refresh_current().await;
        assert!(session.view().error.is_none());
        assert!(session.view().enforcement.is_some());
    }

    #[tokio::test]
    async fn test_resolve_refetches_and_recomputes() {
        let backend = seeded();
        let session = session(&backend);
        let applied = session
            .resolve(
                ClubContext::for_club(UserId(9), ClubId(1)),
                EscalationId(1),
                "Minutes uploaded",
            )
            .await
            .unwrap();

        let snapshot = applied.unwrap().unwrap();
        assert_eq!(snapshot.enforcement.state, EnforcementState::Normal);
        assert_eq!(session.view().enforcement.unwrap().state, EnforcementState::Normal);
        assert_eq!(backend.calls_to(Endpoint::ResolveEscalation), 1);
    }

    #[tokio::test]
    async fn test_failed_resolve_leaves_view_untouched() {
        let backend = seeded();
        let session = session(&backend);
        backend.fail(
            Endpoint::ResolveEscalation,
            AppError::PolicyRejected("Notes must reference the report".to_string()),
        );

        let err = session
            .resolve(
                ClubContext::for_club(UserId(9), ClubId(1)),
                EscalationId(1),
                "Done",
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::PolicyRejected(_)));
        assert_eq!(session.view(), EnforcementView::default());
        assert_eq!(backend.calls_to(Endpoint::GetClub), 0);
    }

    #[tokio::test]
    async fn test_switching_club_drops_old_data_while_loading() {
        let backend = seeded();
        let session = session(&backend);
        session.refresh(ClubContext::for_club(UserId(9), ClubId(1))).await;

        session.begin(ClubContext::for_club(UserId(9), ClubId(2)));
        let view = session.view();
        assert!(view.loading);
        assert!(view.club.is_none());
        assert!(view.enforcement.is_none());
    }

    #[tokio::test]
    async fn test_subscribers_see_applied_views() {
        let backend = seeded();
        let session = session(&backend);
        let mut rx = session.subscribe();

        session.refresh(ClubContext::for_club(UserId(9), ClubId(2))).await;
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().club.as_ref().unwrap().name, "Film");
    }
}
