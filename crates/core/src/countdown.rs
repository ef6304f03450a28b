//! Live countdown to an enforcement deadline.
//!
//! The countdown is advisory only. It never changes the enforcement state;
//! the next fetch re-derives the state from the current time.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::clock::Clock;

/// How often the displayed remaining time is recomputed.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

/// Remaining time until `deadline` as `HH:MM:SS`, clamped at `00:00:00`.
///
/// Hours are not wrapped at 24.
#[must_use]
pub fn format_remaining(deadline: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (deadline - now).num_seconds().max(0);
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

#[derive(Default)]
struct Ticker {
    deadline: Option<DateTime<Utc>>,
    handle: Option<JoinHandle<()>>,
}

impl Ticker {
    fn abort(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// Ticking remaining-time display for one screen.
///
/// Subscribers see `None` while there is no deadline. Dropping the countdown
/// stops the ticker.
pub struct Countdown {
    clock: Arc<dyn Clock>,
    display: Arc<watch::Sender<Option<String>>>,
    ticker: Mutex<Ticker>,
}

impl Countdown {
    /// Create an idle countdown.
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let (display, _) = watch::channel(None);
        Self {
            clock,
            display: Arc::new(display),
            ticker: Mutex::new(Ticker::default()),
        }
    }

    /// Receive every displayed value.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.display.subscribe()
    }

    /// The value currently displayed.
    #[must_use]
    pub fn current(&self) -> Option<String> {
        self.display.borrow().clone()
    }

    /// Whether the ticker task is still running.
    #[must_use]
    pub fn is_ticking(&self) -> bool {
        self.lock()
            .handle
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Count down to `deadline`, or clear the display when it is `None`.
    ///
    /// Setting the deadline that is already running is a no-op.
    pub fn set_deadline(&self, deadline: Option<DateTime<Utc>>) {
        let mut ticker = self.lock();
        if ticker.deadline == deadline && ticker.handle.is_some() {
            return;
        }
        ticker.abort();
        ticker.deadline = deadline;

        let Some(deadline) = deadline else {
            self.display.send_replace(None);
            return;
        };

        let now = self.clock.now();
        self.display
            .send_replace(Some(format_remaining(deadline, now)));
        if now >= deadline {
            return;
        }

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No async runtime, countdown shows a single snapshot");
            return;
        };

        let clock = Arc::clone(&self.clock);
        let display = Arc::clone(&self.display);
        ticker.handle = Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            loop {
                interval.tick().await;
                let now = clock.now();
                display.send_replace(Some(format_remaining(deadline, now)));
                if now >= deadline {
                    debug!(%deadline, "Countdown reached deadline");
                    break;
                }
            }
        }));
    }

    /// Stop ticking and clear the display.
    pub fn clear(&self) {
        let mut ticker = self.lock();
        ticker.abort();
        ticker.deadline = None;
        self.display.send_replace(None);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Ticker> {
        self.ticker.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.lock().abort();
    }
}
