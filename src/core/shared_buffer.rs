//! Named shared buffer holding one framed message
//!
//! Both parties map the same `shm_open` segment, named exactly after the
//! channel. The buffer has no cross-process lock: the signal protocol decides
//! who may touch it.

use memmap2::MmapMut;
use tracing::{debug, trace};

use super::shm;
use crate::error::{Error, Result};
use crate::protocol::{self, LEN_PREFIX_SIZE};

/// Default region size: 1 GiB, sparse until written.
pub const DEFAULT_CAPACITY: usize = 1 << 30;

/// Mmap-backed region for a single in-flight message
#[derive(Debug)]
pub struct SharedBuffer {
    name: String,
    mmap: MmapMut,
}

impl SharedBuffer {
    /// Create the region, or map it if the peer already created it
    ///
    /// # Arguments
    /// * `name` - OS-level name, identical on both sides
    /// * `capacity` - Region size in bytes, including the 4-byte prefix
    pub fn open_or_create(name: &str, capacity: usize) -> Result<Self> {
        if capacity < LEN_PREFIX_SIZE {
            return Err(Error::CapacityTooSmall(capacity));
        }

        let mmap = shm::open_or_create(name, capacity)?;
        debug!(name, capacity, "shared buffer mapped");

        Ok(Self {
            name: name.to_string(),
            mmap,
        })
    }

    /// Frame `message` into the region
    ///
    /// Callers serialize writes within the process; the peer is kept out by
    /// the signal protocol only.
    pub fn write_framed(&mut self, message: &str) -> Result<usize> {
        let chars = protocol::write_frame(&mut self.mmap, message)?;
        trace!(name = %self.name, chars, "framed write");
        Ok(chars)
    }

    /// Read the framed message. Never fails; corrupt data reads as empty.
    pub fn read_framed(&self) -> String {
        let message = protocol::read_frame(&self.mmap);
        trace!(name = %self.name, len = protocol::read_len(&self.mmap), "framed read");
        message
    }

    /// Maximum message length in UTF-16 code units
    pub fn max_chars(&self) -> usize {
        protocol::max_chars(self.mmap.len())
    }

    pub fn capacity(&self) -> usize {
        self.mmap.len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Mutable raw bytes of the region
    pub fn as_bytes_mut(&mut self) -> &mut [u8] {
        &mut self.mmap
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(tag: &str) -> String {
        format!("simplemmf-buf-{}-{}", tag, std::process::id())
    }

    #[test]
    fn test_shared_buffer_basic() {
        let name = unique("basic");

        {
            let mut buffer = SharedBuffer::open_or_create(&name, 4096).unwrap();
            buffer.write_framed("Hello, peer!").unwrap();
            assert_eq!(buffer.read_framed(), "Hello, peer!");
        }

        shm::unlink(&name).ok();
    }

    #[test]
    fn test_open_twice_sees_same_message() {
        let name = unique("twice");

        {
            let mut writer = SharedBuffer::open_or_create(&name, 4096).unwrap();
            let reader = SharedBuffer::open_or_create(&name, 4096).unwrap();

            writer.write_framed("ping").unwrap();
            assert_eq!(reader.read_framed(), "ping");

            writer.write_framed("pong").unwrap();
            assert_eq!(reader.read_framed(), "pong");
        }

        shm::unlink(&name).ok();
    }

    #[test]
    fn test_persists_while_name_exists() {
        let name = unique("persist");

        {
            let mut buffer = SharedBuffer::open_or_create(&name, 4096).unwrap();
            buffer.write_framed("Persistent data").unwrap();
        }

        {
            let buffer = SharedBuffer::open_or_create(&name, 4096).unwrap();
            assert_eq!(buffer.read_framed(), "Persistent data");
        }

        shm::unlink(&name).ok();
    }

    #[test]
    fn test_capacity_limits() {
        let name = unique("limits");

        {
            let mut buffer = SharedBuffer::open_or_create(&name, 64).unwrap();
            assert_eq!(buffer.capacity(), 64);
            assert_eq!(buffer.max_chars(), 30);

            let fits = "x".repeat(30);
            buffer.write_framed(&fits).unwrap();
            assert_eq!(buffer.read_framed(), fits);

            assert!(buffer.write_framed(&"x".repeat(31)).is_err());
        }

        shm::unlink(&name).ok();
    }

    #[test]
    fn test_corrupt_prefix_reads_empty() {
        let name = unique("corrupt");

        {
            let mut buffer = SharedBuffer::open_or_create(&name, 64).unwrap();
            buffer.write_framed("data").unwrap();
            buffer.as_bytes_mut()[..4].copy_from_slice(&i32::MAX.to_ne_bytes());
            assert_eq!(buffer.read_framed(), "");
        }

        shm::unlink(&name).ok();
    }

    #[test]
    fn test_capacity_too_small() {
        let err = SharedBuffer::open_or_create(&unique("tiny"), 3).unwrap_err();
        assert!(matches!(err, Error::CapacityTooSmall(3)));
    }
}
