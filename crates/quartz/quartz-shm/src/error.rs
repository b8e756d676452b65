use quartz_ring::InvalidParam;
use std::io;

#[derive(Debug, thiserror::Error)]
pub enum ShmError {
    #[error("shared ring I/O failed: {0}")]
    Io(#[from] io::Error),

    #[error("not a quartz ring file (magic {0:#018x})")]
    BadMagic(u64),

    #[error("unsupported layout version {found}, expected {expected}")]
    Version { found: u64, expected: u64 },

    #[error("stored capacity {0} is not a non-zero power of two")]
    Capacity(u64),

    #[error("element size mismatch: file holds {found}-byte elements, expected {expected}")]
    ElementSize { found: u64, expected: u64 },

    #[error("mapping is {len} bytes but the layout needs {needed}")]
    Truncated { len: usize, needed: usize },

    #[error(transparent)]
    InvalidParam(#[from] InvalidParam),
}
