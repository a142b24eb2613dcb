//! UTF-16 text codec for the shared region
//!
//! One character on the wire is one UTF-16 code unit, two bytes, host byte
//! order. Decoding never fails: unpaired surrogates become U+FFFD.

/// Bytes per UTF-16 code unit.
pub const CHAR_SIZE: usize = 2;

/// Number of UTF-16 code units `text` occupies.
#[inline]
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Encode `text` into `dst` as UTF-16 code units.
///
/// Returns number of code units written. `dst` must hold at least
/// `utf16_len(text) * CHAR_SIZE` bytes; extra units are dropped.
#[inline]
pub fn encode_into(text: &str, dst: &mut [u8]) -> usize {
    let mut written = 0;
    for (unit, slot) in text.encode_utf16().zip(dst.chunks_exact_mut(CHAR_SIZE)) {
        slot.copy_from_slice(&unit.to_ne_bytes());
        written += 1;
    }
    written
}

/// Decode UTF-16 code units stored in `src`. A trailing odd byte is ignored.
pub fn decode(src: &[u8]) -> String {
    let units: Vec<u16> = src
        .chunks_exact(CHAR_SIZE)
        .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}
