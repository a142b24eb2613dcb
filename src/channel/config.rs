//! Channel configuration

use std::fmt;
use std::str::FromStr;

use crate::core::{signal_name, Role, DEFAULT_CAPACITY, MAX_NAME_LEN};
use crate::error::{Error, Result};
use crate::protocol::LEN_PREFIX_SIZE;

/// When the receive loop clears its inbound signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResetPolicy {
    /// Run handlers first, reset after they return. The peer cannot announce
    /// a new message until the current one is fully handled.
    #[default]
    WaitFor,
    /// Reset right after draining the buffer, then run handlers. The peer may
    /// write again while handlers are still running.
    Return,
}

impl FromStr for ResetPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wait-for" | "waitfor" | "wait_for" => Ok(Self::WaitFor),
            "return" => Ok(Self::Return),
            other => Err(format!(
                "unknown reset policy '{}', expected 'wait-for' or 'return'",
                other
            )),
        }
    }
}

impl fmt::Display for ResetPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WaitFor => f.write_str("wait-for"),
            Self::Return => f.write_str("return"),
        }
    }
}

/// Endpoint configuration
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    /// Channel name; must match exactly on both sides
    pub name: String,
    pub role: Role,
    pub reset_policy: ResetPolicy,
    /// Shared region size in bytes; both sides must agree
    pub capacity: usize,
    /// Unlink the named objects when the endpoint is dropped. Off by default:
    /// unlinking while the peer is alive splits the channel in two.
    pub unlink_on_drop: bool,
    /// Receive thread name prefix; the channel name is appended
    pub thread_name: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            name: "Server001".to_string(),
            role: Role::Server,
            reset_policy: ResetPolicy::default(),
            capacity: DEFAULT_CAPACITY,
            unlink_on_drop: false,
            thread_name: "mmf-recv".to_string(),
        }
    }
}

impl ChannelConfig {
    pub fn new(name: impl Into<String>, role: Role) -> Self {
        Self {
            name: name.into(),
            role,
            ..Self::default()
        }
    }

    pub fn with_reset_policy(mut self, reset_policy: ResetPolicy) -> Self {
        self.reset_policy = reset_policy;
        self
    }

    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn with_unlink_on_drop(mut self, unlink_on_drop: bool) -> Self {
        self.unlink_on_drop = unlink_on_drop;
        self
    }

    pub fn with_thread_name(mut self, thread_name: impl Into<String>) -> Self {
        self.thread_name = thread_name.into();
        self
    }

    /// Full name of the receive thread
    pub(crate) fn receive_thread_name(&self) -> String {
        format!("{}-{}", self.thread_name, self.name)
    }

    pub(crate) fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        if self.capacity < LEN_PREFIX_SIZE {
            return Err(Error::CapacityTooSmall(self.capacity));
        }
        Ok(())
    }
}

/// Check that `name` and its derived signal names are valid shm names
pub(crate) fn validate_name(name: &str) -> Result<()> {
    let longest = signal_name(name, Role::Client)
        .len()
        .max(signal_name(name, Role::Server).len());
    if name.is_empty() || name.contains(['/', '\0']) || longest > MAX_NAME_LEN {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(())
}
