//! Channel layer: endpoints and their receive loops
//!
//! Protocol:
//! - Writer frames into the shared buffer, then raises its own signal
//! - Peer's receive loop wakes, drains, notifies and resets per policy
//! - One outstanding message per direction; an undrained one is overwritten

mod config;
mod endpoint;
mod receiver;

pub use config::{ChannelConfig, ResetPolicy};
pub use endpoint::Endpoint;
pub use receiver::LoopState;
