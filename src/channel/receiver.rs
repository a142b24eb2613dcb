//! Receive loop: one background thread per endpoint
//!
//! State machine:
//!
//! ```text
//! Idle -> Waiting -> Draining -> NotifyAndReset -> Idle
//!   \         \
//!    +---------+--> Stopped   (cancellation)
//! ```
//!
//! The loop sleeps inside the futex wait on the signal the peer raises.
//! Cancellation raises a flag and interrupts that wait, so a sleeping loop
//! stops without another message arriving.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tracing::{debug, trace, warn};

use super::config::ResetPolicy;
use crate::core::{Role, SharedBuffer, SignalPair, WaitOutcome};

pub(crate) type Handler = Arc<dyn Fn(&str) + Send + Sync + 'static>;

/// Where the receive loop currently is
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle = 0,
    Waiting = 1,
    Draining = 2,
    NotifyAndReset = 3,
    Stopped = 4,
}

impl LoopState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Idle,
            1 => Self::Waiting,
            2 => Self::Draining,
            3 => Self::NotifyAndReset,
            _ => Self::Stopped,
        }
    }
}

/// State shared between an endpoint and its receive loop
pub(crate) struct Shared {
    pub name: String,
    pub role: Role,
    pub policy: ResetPolicy,
    /// Process-local write lock; reads take it too
    pub buffer: Mutex<SharedBuffer>,
    pub signals: SignalPair,
    pub handlers: RwLock<Vec<Handler>>,
    pub busy: AtomicBool,
    pub cancel: AtomicBool,
    state: AtomicU8,
}

impl Shared {
    pub fn new(
        name: String,
        role: Role,
        policy: ResetPolicy,
        buffer: SharedBuffer,
        signals: SignalPair,
        handlers: Vec<Handler>,
    ) -> Self {
        Self {
            name,
            role,
            policy,
            buffer: Mutex::new(buffer),
            signals,
            handlers: RwLock::new(handlers),
            busy: AtomicBool::new(false),
            cancel: AtomicBool::new(false),
            state: AtomicU8::new(LoopState::Idle as u8),
        }
    }

    pub fn state(&self) -> LoopState {
        LoopState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn set_state(&self, state: LoopState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn cancelled(&self) -> bool {
        self.cancel.load(Ordering::SeqCst)
    }

    /// Run every registered handler in registration order
    fn notify(&self, message: &str) {
        // Snapshot so a handler may register more handlers
        let handlers: Vec<Handler> = self
            .handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        for handler in handlers {
            if panic::catch_unwind(AssertUnwindSafe(|| handler(message))).is_err() {
                warn!(name = %self.name, "message handler panicked");
            }
        }
    }
}

/// Body of the receive thread
pub(crate) fn run(shared: Arc<Shared>) {
    // Listen for the peer's announcements
    let inbound = shared.signals.get(shared.role.peer());
    debug!(name = %shared.name, role = ?shared.role, signal = inbound.name(), "receive loop started");

    loop {
        shared.set_state(LoopState::Idle);
        if shared.cancelled() {
            break;
        }

        shared.set_state(LoopState::Waiting);
        match inbound.wait_cancellable(&shared.cancel) {
            Ok(WaitOutcome::Signaled) => {}
            Ok(WaitOutcome::Cancelled) | Ok(WaitOutcome::TimedOut) => break,
            Err(e) => {
                warn!(name = %shared.name, error = %e, "wait failed, stopping receive loop");
                break;
            }
        }
        // Cancelled while the wake was in flight: no further notifications
        if shared.cancelled() {
            break;
        }

        shared.set_state(LoopState::Draining);
        let message = shared
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .read_framed();
        trace!(name = %shared.name, len = message.len(), "drained");

        shared.set_state(LoopState::NotifyAndReset);
        match shared.policy {
            ResetPolicy::Return => {
                inbound.reset();
                shared.notify(&message);
            }
            ResetPolicy::WaitFor => {
                shared.notify(&message);
                inbound.reset();
            }
        }
    }

    shared.set_state(LoopState::Stopped);
    debug!(name = %shared.name, role = ?shared.role, "receive loop stopped");
}
