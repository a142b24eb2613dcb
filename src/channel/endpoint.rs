//! Channel endpoint: one side of a two-party channel
//!
//! The endpoint owns local handles to the shared buffer and both signals plus
//! a receive thread. Writing frames the message into the buffer and raises the
//! endpoint's own signal; the peer's receive loop waits on it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, trace};

use super::config::{ChannelConfig, ResetPolicy};
use super::receiver::{self, Handler, LoopState, Shared};
use crate::core::{Role, SharedBuffer, SignalPair};
use crate::error::{Error, Result};

/// Clears the busy flag on every exit path of a write
struct BusyGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> BusyGuard<'a> {
    fn set(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::Release);
        Self { flag }
    }

    fn try_set(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// One side of a channel
///
/// Dropping the endpoint cancels its receive loop, waits for it to stop and
/// releases the local handles. The named objects survive for the peer unless
/// `unlink_on_drop` is set.
pub struct Endpoint {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
    unlink_on_drop: bool,
}

impl Endpoint {
    /// Open (creating if needed) the named objects and start the receive loop
    ///
    /// A message the peer announced before this call is drained as soon as
    /// the loop starts, possibly before a handler is registered. Use
    /// [`open_with_handler`](Self::open_with_handler) to observe it.
    pub fn open(config: ChannelConfig) -> Result<Self> {
        Self::start(config, Vec::new())
    }

    /// Like [`open`](Self::open) with `handler` registered before the
    /// receive loop starts
    pub fn open_with_handler<F>(config: ChannelConfig, handler: F) -> Result<Self>
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        Self::start(config, vec![handler])
    }

    fn start(config: ChannelConfig, handlers: Vec<Handler>) -> Result<Self> {
        config.validate()?;

        let buffer = SharedBuffer::open_or_create(&config.name, config.capacity)?;
        let signals = SignalPair::open_or_create(&config.name)?;

        let shared = Arc::new(Shared::new(
            config.name.clone(),
            config.role,
            config.reset_policy,
            buffer,
            signals,
            handlers,
        ));

        let worker = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(config.receive_thread_name())
                .spawn(move || receiver::run(shared))?
        };

        debug!(
            name = %config.name,
            role = ?config.role,
            policy = %config.reset_policy,
            capacity = config.capacity,
            "endpoint opened"
        );

        Ok(Self {
            shared,
            worker: Some(worker),
            unlink_on_drop: config.unlink_on_drop,
        })
    }

    /// Server endpoint with default settings
    pub fn server(name: impl Into<String>) -> Result<Self> {
        Self::open(ChannelConfig::new(name, Role::Server))
    }

    /// Client endpoint with default settings
    pub fn client(name: impl Into<String>) -> Result<Self> {
        Self::open(ChannelConfig::new(name, Role::Client))
    }

    /// Write `message` to the shared buffer and announce it to the peer
    ///
    /// Overwrites any message the peer has not drained yet.
    pub fn write(&self, message: &str) -> Result<()> {
        let _busy = BusyGuard::set(&self.shared.busy);
        let mut buffer = self
            .shared
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.write_locked(&mut buffer, message)
    }

    /// Like [`write`](Self::write) but fails with [`Error::Busy`] instead of
    /// waiting for another in-flight write from this process.
    pub fn try_write(&self, message: &str) -> Result<()> {
        let _busy = BusyGuard::try_set(&self.shared.busy).ok_or(Error::Busy)?;
        let mut buffer = self
            .shared
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.write_locked(&mut buffer, message)
    }

    fn write_locked(&self, buffer: &mut SharedBuffer, message: &str) -> Result<()> {
        let chars = buffer.write_framed(message)?;
        self.shared.signals.signal(self.shared.role);
        trace!(name = %self.shared.name, role = ?self.shared.role, chars, "message written");
        Ok(())
    }

    /// Register a handler for messages from the peer
    ///
    /// Handlers run on the receive thread in registration order. Under
    /// [`ResetPolicy::WaitFor`] the peer cannot announce the next message
    /// until all of them return.
    pub fn on_message_received<F>(&self, handler: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        self.shared
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::new(handler));
    }

    /// Receive messages from the peer through a channel
    pub fn subscribe(&self) -> mpsc::Receiver<String> {
        let (tx, rx) = mpsc::channel();
        self.on_message_received(move |message| {
            // Receiver dropped: nobody is listening any more
            let _ = tx.send(message.to_string());
        });
        rx
    }

    /// True while a write from this process is in flight
    pub fn is_busy(&self) -> bool {
        self.shared.busy.load(Ordering::Acquire)
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn role(&self) -> Role {
        self.shared.role
    }

    pub fn reset_policy(&self) -> ResetPolicy {
        self.shared.policy
    }

    /// Largest message this channel carries, in UTF-16 code units
    pub fn max_chars(&self) -> usize {
        self.shared
            .buffer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .max_chars()
    }

    pub fn loop_state(&self) -> LoopState {
        self.shared.state()
    }

    /// Whether the signal announcing this endpoint's messages is still set,
    /// i.e. the peer has not consumed the last write yet
    pub fn outbound_pending(&self) -> bool {
        self.shared.signals.get(self.shared.role).is_set()
    }

    /// Whether the signal the receive loop waits on is set
    pub fn inbound_pending(&self) -> bool {
        self.shared.signals.get(self.shared.role.peer()).is_set()
    }

    /// Stop the receive loop and release the handles
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };

        self.shared.cancel.store(true, Ordering::SeqCst);
        self.shared
            .signals
            .get(self.shared.role.peer())
            .interrupt();

        // A handler dropping its own endpoint cannot join itself
        if worker.thread().id() != thread::current().id() && worker.join().is_err() {
            debug!(name = %self.shared.name, "receive thread panicked");
        }

        if self.unlink_on_drop {
            crate::remove(&self.shared.name);
        }
        debug!(name = %self.shared.name, role = ?self.shared.role, "endpoint closed");
    }
}

impl Drop for Endpoint {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    fn test_busy_guard_clears_on_drop() {
        let flag = AtomicBool::new(false);
        {
            let _guard = BusyGuard::set(&flag);
            assert!(flag.load(Ordering::Acquire));
            assert!(BusyGuard::try_set(&flag).is_none());
        }
        assert!(!flag.load(Ordering::Acquire));
        assert!(BusyGuard::try_set(&flag).is_some());
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn test_busy_while_waiting_for_buffer_lock() {
        let name = format!("simplemmf-ep-busy-{}", std::process::id());
        crate::remove(&name);
        let endpoint = Endpoint::open(
            ChannelConfig::new(name.clone(), Role::Server).with_capacity(4096),
        )
        .unwrap();

        // Stand in for the receive loop holding the buffer during a read
        let held = endpoint.shared.buffer.lock().unwrap();

        thread::scope(|s| {
            let writer = s.spawn(|| endpoint.write("queued"));

            let deadline = Instant::now() + Duration::from_secs(5);
            while !endpoint.is_busy() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            assert!(endpoint.is_busy());
            assert!(matches!(endpoint.try_write("other"), Err(Error::Busy)));

            drop(held);
            writer.join().unwrap().unwrap();
        });

        assert!(!endpoint.is_busy());
        assert_eq!(
            endpoint.shared.buffer.lock().unwrap().read_framed(),
            "queued"
        );

        drop(endpoint);
        crate::remove(&name);
    }

    #[test]
    fn test_invalid_name_fails_construction() {
        assert!(matches!(
            Endpoint::server("bad/name"),
            Err(Error::InvalidName(_))
        ));
    }
}
