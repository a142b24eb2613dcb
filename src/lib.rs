//! SimpleMMF - two-party shared-memory messaging channel
//!
//! Architecture:
//! - Shared buffer: one named mmap region, one framed UTF-16 message
//! - Signal pair: named manual-reset signals `{name}_Client` / `{name}_Server`
//! - Endpoint: Server or Client role, write + message notifications
//! - Receive loop: background thread blocking on the peer's signal
//!
//! ```no_run
//! use simplemmf::Endpoint;
//!
//! let server = Endpoint::server("Server001")?;
//! let client = Endpoint::client("Server001")?;
//!
//! let inbox = server.subscribe();
//! client.write("ping")?;
//! assert_eq!(inbox.recv().unwrap(), "ping");
//! # Ok::<(), simplemmf::Error>(())
//! ```

#[cfg(not(target_os = "linux"))]
compile_error!("simplemmf needs Linux futexes and POSIX shared memory");

pub mod channel;
pub mod core;
mod error;
pub mod protocol;

pub use crate::channel::{ChannelConfig, Endpoint, LoopState, ResetPolicy};
pub use crate::core::{remove, Role, DEFAULT_CAPACITY};
pub use crate::error::{Error, Result};
