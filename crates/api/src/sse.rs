//! Server-Sent Events for live enforcement updates.
//!
//! Each connection owns one [`EnforcementSession`] and one [`Countdown`].
//! A driver task re-fetches on the configured interval. Closing the connection
//! stops the driver, detaches the session and clears the countdown.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
};
use clubhub_core::{ClubContext, Countdown, EnforcementSession};
use futures::stream::{self, Stream};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, warn};

use crate::{extractors::ClubAdmin, middleware::AppState};

/// Event name carrying an [`clubhub_core::EnforcementView`].
pub const ENFORCEMENT_EVENT: &str = "enforcement";
/// Event name carrying the remaining time, or `null` once cleared.
pub const COUNTDOWN_EVENT: &str = "countdown";

fn event<T: Serialize>(name: &'static str, data: &T) -> Event {
    Event::default()
        .event(name)
        .json_data(data)
        .unwrap_or_else(|_| Event::default().event(name).data("error"))
}

/// Tears the connection's state down when the stream is dropped.
struct StreamGuard {
    driver: JoinHandle<()>,
    session: Arc<EnforcementSession>,
    countdown: Arc<Countdown>,
    context: ClubContext,
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.driver.abort();
        self.session.detach();
        self.countdown.clear();
        debug!(user_id = %self.context.user_id, "Enforcement stream closed");
    }
}

/// Re-fetch every `period` and keep the countdown on the latest deadline.
fn spawn_driver(
    session: Arc<EnforcementSession>,
    countdown: Arc<Countdown>,
    context: ClubContext,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            match session.refresh(context).await {
                Some(Ok(snapshot)) => countdown.set_deadline(snapshot.enforcement.deadline),
                Some(Err(e)) => {
                    warn!(user_id = %context.user_id, error = %e, "Enforcement refresh failed");
                    countdown.clear();
                }
                None => {}
            }
        }
    })
}

/// Live enforcement stream for the admin's club.
async fn enforcement_stream(
    admin: ClubAdmin,
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let session = Arc::new(EnforcementSession::new(state.provider_for(&admin.session)));
    let countdown = Arc::new(Countdown::new(Arc::clone(&state.clock)));

    // Subscribe before the driver starts so the first fetch is not missed.
    let views = WatchStream::from_changes(session.subscribe())
        .map(|view| event(ENFORCEMENT_EVENT, &view));
    let ticks = WatchStream::from_changes(countdown.subscribe())
        .map(|remaining| event(COUNTDOWN_EVENT, &remaining));

    let driver = spawn_driver(
        Arc::clone(&session),
        Arc::clone(&countdown),
        admin.context,
        state.enforcement.refresh_interval(),
    );
    let guard = StreamGuard {
        driver,
        session,
        countdown,
        context: admin.context,
    };

    debug!(user_id = %admin.context.user_id, "Enforcement stream opened");

    let updates = views.merge(ticks).map(move |event| {
        let _ = &guard;
        Ok::<_, Infallible>(event)
    });

    let layout = admin.session.role.layout();
    let initial = stream::once(async move { Ok(Event::default().event("connected").data(layout)) });

    Sse::new(initial.chain(updates)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(30))
            .text("ping"),
    )
}

/// Create SSE router.
pub fn router() -> Router<AppState> {
    Router::new().route("/enforcement/stream", get(enforcement_stream))
}
