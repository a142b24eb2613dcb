//! Error types for the channel

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// OS refused to create, size or map a named object
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid channel name {0:?}: must be non-empty and contain no '/' or NUL")]
    InvalidName(String),

    #[error("capacity {0} is too small to hold the length prefix")]
    CapacityTooSmall(usize),

    #[error("message of {chars} UTF-16 units exceeds the {max_chars} unit limit")]
    MessageTooLarge { chars: usize, max_chars: usize },

    /// Another write from this process is in flight
    #[error("endpoint is busy writing")]
    Busy,
}

pub type Result<T> = std::result::Result<T, Error>;
