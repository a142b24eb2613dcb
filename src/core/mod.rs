//! Core module: named cross-process objects backing a channel
//!
//! Design:
//! - Create-or-open: every object is opened by name, never open-only
//! - Shared buffer: one framed message, no cross-process lock
//! - Signals: manual-reset flags on shared futex words

use tracing::debug;

mod shared_buffer;
mod shm;
mod signal;

pub use shared_buffer::{SharedBuffer, DEFAULT_CAPACITY};
pub use shm::MAX_NAME_LEN;
pub use signal::{signal_name, NamedSignal, Role, SignalPair, WaitOutcome};

/// Best-effort removal of a channel's named objects
///
/// Mappings already open keep working; the next `open_or_create` with this
/// name starts from a fresh, zeroed channel. Errors (for example, objects
/// already gone) are swallowed.
pub fn remove(name: &str) {
    let objects = [
        name.to_string(),
        signal_name(name, Role::Client),
        signal_name(name, Role::Server),
    ];
    for object in &objects {
        if let Err(e) = shm::unlink(object) {
            debug!(object = %object, error = %e, "unlink skipped");
        }
    }
}
