//! Protocol layer: framing of one message in the shared region
//!
//! - Length-prefixed: `i32` code-unit count at offset 0
//! - UTF-16 payload right after the prefix
//! - Reads never fail; corrupt prefixes read as empty

pub mod codec;
mod frame;

pub use frame::{max_chars, read_frame, read_len, write_frame, LEN_PREFIX_SIZE};
