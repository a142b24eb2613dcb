//! Named manual-reset signals over a shared futex word
//!
//! Each signal is a 4-byte `shm_open` segment holding one `AtomicU32`:
//!
//! - bit 0: signaled flag, stays set until `reset`
//! - bits 1..32: wake generation, bumped by `interrupt` so a local
//!   cancellation can break a blocked wait without touching the flag
//!
//! Waiting uses the shared (non-private) futex ops so waiters in any process
//! mapping the segment are released by `signal`.

use memmap2::MmapMut;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::{Duration, Instant};
use tracing::trace;

use super::shm;
use crate::error::Result;

const SET: u32 = 1;
const GENERATION_STEP: u32 = 2;
const WORD_SIZE: usize = std::mem::size_of::<AtomicU32>();

/// Which side of the channel an endpoint plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Server,
    Client,
}

impl Role {
    /// Suffix of this role's signal name
    pub fn suffix(self) -> &'static str {
        match self {
            Role::Server => "_Server",
            Role::Client => "_Client",
        }
    }

    /// The other side
    pub fn peer(self) -> Role {
        match self {
            Role::Server => Role::Client,
            Role::Client => Role::Server,
        }
    }
}

/// Result of a blocking wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Signaled,
    Cancelled,
    TimedOut,
}

/// Cross-process manual-reset signal
pub struct NamedSignal {
    name: String,
    mmap: MmapMut,
}

impl NamedSignal {
    /// Create the signal in the cleared state, or open it as the peer left it
    pub fn open_or_create(name: &str) -> Result<Self> {
        let mmap = shm::open_or_create(name, WORD_SIZE)?;
        Ok(Self {
            name: name.to_string(),
            mmap,
        })
    }

    #[inline(always)]
    fn word(&self) -> &AtomicU32 {
        // SAFETY: the mapping is page aligned, at least WORD_SIZE long and
        // lives as long as self. Every process only touches it atomically.
        unsafe { &*(self.mmap.as_ptr() as *const AtomicU32) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the signal and release every waiter. Setting an already set
    /// signal is coalesced into the pending one.
    pub fn signal(&self) {
        let prev = self.word().fetch_or(SET, Ordering::SeqCst);
        if prev & SET != 0 {
            trace!(name = %self.name, "signal coalesced");
            return;
        }
        futex_wake(self.word());
        trace!(name = %self.name, "signaled");
    }

    /// Clear the signal
    pub fn reset(&self) {
        self.word().fetch_and(!SET, Ordering::SeqCst);
        trace!(name = %self.name, "reset");
    }

    pub fn is_set(&self) -> bool {
        self.word().load(Ordering::SeqCst) & SET != 0
    }

    /// Block until the signal is set
    pub fn wait(&self) -> io::Result<()> {
        self.wait_until(None, None).map(|_| ())
    }

    /// Block until the signal is set or `timeout` elapses.
    ///
    /// Returns `true` if the signal was set.
    pub fn wait_timeout(&self, timeout: Duration) -> io::Result<bool> {
        let outcome = self.wait_until(Some(Instant::now() + timeout), None)?;
        Ok(outcome == WaitOutcome::Signaled)
    }

    /// Block until the signal is set or `cancel` is raised and followed by
    /// `interrupt`.
    pub fn wait_cancellable(&self, cancel: &AtomicBool) -> io::Result<WaitOutcome> {
        self.wait_until(None, Some(cancel))
    }

    /// Wake every waiter in this process and others without setting the
    /// signal. Waiters re-check their cancellation flag and go back to sleep
    /// if it is not raised.
    pub fn interrupt(&self) {
        self.word().fetch_add(GENERATION_STEP, Ordering::SeqCst);
        futex_wake(self.word());
        trace!(name = %self.name, "interrupted");
    }

    fn wait_until(
        &self,
        deadline: Option<Instant>,
        cancel: Option<&AtomicBool>,
    ) -> io::Result<WaitOutcome> {
        let word = self.word();
        loop {
            let current = word.load(Ordering::SeqCst);
            if current & SET != 0 {
                return Ok(WaitOutcome::Signaled);
            }
            // Checked after loading `current`: an interrupt that lands in
            // between changes the word and futex_wait returns at once.
            if cancel.map_or(false, |c| c.load(Ordering::SeqCst)) {
                return Ok(WaitOutcome::Cancelled);
            }

            let timeout = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Ok(WaitOutcome::TimedOut);
                    }
                    Some(deadline - now)
                }
                None => None,
            };

            futex_wait(word, current, timeout)?;
        }
    }
}

/// The two per-direction signals of one channel
pub struct SignalPair {
    server: NamedSignal,
    client: NamedSignal,
}

impl SignalPair {
    /// Open `{channel}_Server` and `{channel}_Client`
    pub fn open_or_create(channel: &str) -> Result<Self> {
        Ok(Self {
            server: NamedSignal::open_or_create(&signal_name(channel, Role::Server))?,
            client: NamedSignal::open_or_create(&signal_name(channel, Role::Client))?,
        })
    }

    /// Signal announcing messages written by `role`
    pub fn get(&self, role: Role) -> &NamedSignal {
        match role {
            Role::Server => &self.server,
            Role::Client => &self.client,
        }
    }

    pub fn signal(&self, which: Role) {
        self.get(which).signal();
    }

    pub fn wait(&self, which: Role) -> io::Result<()> {
        self.get(which).wait()
    }

    pub fn reset(&self, which: Role) {
        self.get(which).reset();
    }
}

/// OS-level name of the signal `role` raises on `channel`
pub fn signal_name(channel: &str, role: Role) -> String {
    format!("{}{}", channel, role.suffix())
}

fn futex_wait(word: &AtomicU32, expected: u32, timeout: Option<Duration>) -> io::Result<()> {
    let ts = timeout.map(|t| libc::timespec {
        tv_sec: t.as_secs().min(libc::time_t::MAX as u64) as libc::time_t,
        tv_nsec: t.subsec_nanos() as libc::c_long,
    });
    let ts_ptr = ts
        .as_ref()
        .map_or(std::ptr::null(), |t| t as *const libc::timespec);

    // SAFETY: word points into a live shared mapping; FUTEX_WAIT only reads it
    let rc = unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAIT,
            expected,
            ts_ptr,
            std::ptr::null::<u32>(),
            0u32,
        )
    };
    if rc == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    match err.raw_os_error() {
        // Value changed, signal delivery or timeout: the caller re-checks
        Some(libc::EAGAIN) | Some(libc::EINTR) | Some(libc::ETIMEDOUT) => Ok(()),
        _ => Err(err),
    }
}

fn futex_wake(word: &AtomicU32) {
    // SAFETY: word points into a live shared mapping
    unsafe {
        libc::syscall(
            libc::SYS_futex,
            word.as_ptr(),
            libc::FUTEX_WAKE,
            i32::MAX,
            std::ptr::null::<libc::timespec>(),
            std::ptr::null::<u32>(),
            0u32,
        );
    }
}
