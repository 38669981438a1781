//! RPC-level responsiveness bookkeeping (§4.6): distinct from, and at a
//! much tighter threshold than, [`eh_protocol::PersistentProtocol`]'s
//! 20s socket-unresponsiveness detector. This one watches whether the
//! peer's `Acknowledged` replies keep pace with our outgoing requests,
//! transitioning to [`ResponsiveState::Unresponsive`] after 3s of
//! silence and back to [`ResponsiveState::Responsive`] on the next ack.

use std::sync::Mutex;
use std::sync::atomic::{AtomicIsize, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::broadcast;

const RESPONSIVE_THRESHOLD: Duration = Duration::from_secs(3);
const POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponsiveState {
    Responsive,
    Unresponsive,
}

pub(crate) struct Unresponsiveness {
    outstanding: AtomicIsize,
    deadline: Mutex<Option<Instant>>,
    state: Mutex<ResponsiveState>,
    events: broadcast::Sender<ResponsiveState>,
}

impl Unresponsiveness {
    pub(crate) fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            outstanding: AtomicIsize::new(0),
            deadline: Mutex::new(None),
            state: Mutex::new(ResponsiveState::Responsive),
            events,
        }
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<ResponsiveState> {
        self.events.subscribe()
    }

    #[must_use]
    pub(crate) fn state(&self) -> ResponsiveState {
        *self.state.lock().unwrap()
    }

    pub(crate) fn poll_interval() -> Duration {
        POLL_INTERVAL
    }

    pub(crate) fn on_will_send_request(&self) {
        self.outstanding.fetch_add(1, Ordering::SeqCst);
        let mut deadline = self.deadline.lock().unwrap();
        if deadline.is_none() {
            *deadline = Some(Instant::now() + RESPONSIVE_THRESHOLD);
        }
    }

    pub(crate) fn on_did_receive_acknowledge(&self) {
        let remaining = self.outstanding.fetch_sub(1, Ordering::SeqCst) - 1;
        {
            let mut deadline = self.deadline.lock().unwrap();
            *deadline = if remaining > 0 { Some(Instant::now() + RESPONSIVE_THRESHOLD) } else { None };
        }
        let mut state = self.state.lock().unwrap();
        if *state == ResponsiveState::Unresponsive {
            *state = ResponsiveState::Responsive;
            let _ = self.events.send(ResponsiveState::Responsive);
        }
    }

    /// Called on each poll tick; transitions to `Unresponsive` and fires
    /// the edge event if the deadline has passed and we are not already
    /// in that state (no spurious repeated edges).
    pub(crate) fn poll(&self) {
        let expired = {
            let deadline = self.deadline.lock().unwrap();
            deadline.is_some_and(|d| Instant::now() >= d)
        };
        if !expired {
            return;
        }
        let mut state = self.state.lock().unwrap();
        if *state == ResponsiveState::Responsive {
            *state = ResponsiveState::Unresponsive;
            let _ = self.events.send(ResponsiveState::Unresponsive);
        }
    }
}
