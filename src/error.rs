//! Error types for index operations.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("key of {len} bytes exceeds the maximum of 64")]
    InvalidKey { len: usize },

    #[error("build can only run once, and only over keys added with add_unsorted")]
    RebuildNotAllowed,

    #[error("position {index} is outside {lo}..={hi} for this key's bucket")]
    PositionOutOfRange { index: usize, lo: usize, hi: usize },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("corrupt index: {0}")]
    Corrupt(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
