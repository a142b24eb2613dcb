//! Named POSIX shared memory objects
//!
//! Every cross-process object in a channel is a `shm_open` segment mapped
//! with memmap2. Opening is always create-or-open so a survivor re-creates an
//! object whose last holder went away.

use memmap2::{MmapMut, MmapOptions};
use std::ffi::CString;
use std::fs::File;
use std::io;
use std::os::unix::io::FromRawFd;

/// Longest name accepted by `shm_open` on Linux, leading slash excluded.
pub const MAX_NAME_LEN: usize = 254;

fn os_name(name: &str) -> io::Result<CString> {
    CString::new(format!("/{}", name))
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "name contains NUL"))
}

/// Create or open the named segment, grow it to at least `len` bytes and map
/// the first `len` bytes read/write.
pub fn open_or_create(name: &str, len: usize) -> io::Result<MmapMut> {
    let c_name = os_name(name)?;

    // SAFETY: c_name is a valid NUL-terminated string
    let fd = unsafe {
        libc::shm_open(
            c_name.as_ptr(),
            libc::O_CREAT | libc::O_RDWR | libc::O_CLOEXEC,
            0o600 as libc::mode_t,
        )
    };
    if fd < 0 {
        return Err(io::Error::last_os_error());
    }

    // SAFETY: fd was just returned by shm_open and is owned by nobody else
    let file = unsafe { File::from_raw_fd(fd) };

    // Never shrink: the peer may already be using a larger mapping
    if file.metadata()?.len() < len as u64 {
        file.set_len(len as u64)?;
    }

    // SAFETY: the segment is at least `len` bytes and stays alive while mapped
    let mmap = unsafe { MmapOptions::new().len(len).map_mut(&file)? };

    Ok(mmap)
}

/// Remove the name. Existing mappings stay valid until dropped.
pub fn unlink(name: &str) -> io::Result<()> {
    let c_name = os_name(name)?;

    // SAFETY: c_name is a valid NUL-terminated string
    if unsafe { libc::shm_unlink(c_name.as_ptr()) } < 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unique(tag: &str) -> String {
        format!("simplemmf-shm-{}-{}", tag, std::process::id())
    }

    #[test]
    fn test_same_name_same_memory() {
        let name = unique("same");

        let mut a = open_or_create(&name, 4096).unwrap();
        let b = open_or_create(&name, 4096).unwrap();

        a[10] = 0xAB;
        assert_eq!(b[10], 0xAB);

        unlink(&name).unwrap();
    }

    #[test]
    fn test_reopen_after_unlink_creates_fresh_segment() {
        let name = unique("fresh");

        {
            let mut a = open_or_create(&name, 4096).unwrap();
            a[0] = 7;
        }
        unlink(&name).unwrap();

        let b = open_or_create(&name, 4096).unwrap();
        assert_eq!(b[0], 0);

        unlink(&name).unwrap();
    }

    #[test]
    fn test_unlink_missing_is_error() {
        let err = unlink(&unique("missing")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
