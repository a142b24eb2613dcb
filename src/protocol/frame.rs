//! Framed message layout inside the shared region
//!
//! Layout:
//! ┌──────────────────────────────┬──────────────────────────────────────┐
//! │ len: i32 (host order, 4 B)   │ len × UTF-16 code units (2 B each)   │
//! └──────────────────────────────┴──────────────────────────────────────┘
//!
//! The prefix counts code units, not bytes. Nothing in the format bounds it;
//! a reader clamps instead of trusting a corrupt prefix.

use super::codec::{self, CHAR_SIZE};
use crate::error::{Error, Result};

/// Size of the length prefix at offset 0.
pub const LEN_PREFIX_SIZE: usize = std::mem::size_of::<i32>();

/// Largest message, in UTF-16 code units, a region of `capacity` bytes holds.
#[inline]
pub fn max_chars(capacity: usize) -> usize {
    let payload = capacity.saturating_sub(LEN_PREFIX_SIZE) / CHAR_SIZE;
    payload.min(i32::MAX as usize)
}

/// Raw length prefix as stored, possibly corrupt.
#[inline]
pub fn read_len(region: &[u8]) -> i32 {
    let mut prefix = [0u8; LEN_PREFIX_SIZE];
    prefix.copy_from_slice(&region[..LEN_PREFIX_SIZE]);
    i32::from_ne_bytes(prefix)
}

/// Write `message` framed at offset 0 of `region`.
///
/// Returns the number of code units written. Fails without touching the
/// region if the message does not fit.
pub fn write_frame(region: &mut [u8], message: &str) -> Result<usize> {
    let chars = codec::utf16_len(message);
    let max = max_chars(region.len());
    if chars > max {
        return Err(Error::MessageTooLarge {
            chars,
            max_chars: max,
        });
    }

    let end = LEN_PREFIX_SIZE + chars * CHAR_SIZE;
    codec::encode_into(message, &mut region[LEN_PREFIX_SIZE..end]);
    region[..LEN_PREFIX_SIZE].copy_from_slice(&(chars as i32).to_ne_bytes());

    Ok(chars)
}

/// Read the framed message at offset 0 of `region`.
///
/// A zero, negative or oversized prefix yields an empty string.
pub fn read_frame(region: &[u8]) -> String {
    if region.len() < LEN_PREFIX_SIZE {
        return String::new();
    }

    let len = read_len(region);
    if len <= 0 || len as usize > max_chars(region.len()) {
        return String::new();
    }

    let end = LEN_PREFIX_SIZE + len as usize * CHAR_SIZE;
    codec::decode(&region[LEN_PREFIX_SIZE..end])
}
