//! # Error Types
//!
//! All fallible operations in mmvkit return [`MmvError`]. Registration and
//! start errors are surfaced to the caller; live `set` errors (type mismatch,
//! value too large) are surfaced; io errors during `stop` are reported but do
//! not prevent the state transition. Decode errors short-circuit and abandon
//! parsing.
//!
//! Internal invariant violations (offset arithmetic escaping a planned
//! layout) are programmer bugs and abort via `assert!` rather than surfacing
//! here.

use thiserror::Error;

use crate::types::MetricType;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, MmvError>;

#[derive(Debug, Error)]
pub enum MmvError {
    #[error("value is not compatible with metric type {ty:?}")]
    TypeMismatch { ty: MetricType },

    #[error("value does not fit the range of metric type {ty:?}")]
    ValueOutOfRange { ty: MetricType },

    #[error("'{0}' is already registered")]
    AlreadyRegistered(String),

    #[error("'{name}' hashes to id {id} already taken by '{existing}'")]
    IdCollision {
        name: String,
        existing: String,
        id: u32,
    },

    #[error("no instance named '{0}' in the metric's instance domain")]
    UnknownInstance(String),

    #[error("the client has not been started")]
    NotStarted,

    #[error("the client has already been started")]
    AlreadyStarted,

    #[error("value of {len} bytes does not fit a {max} byte string slot")]
    ValueTooLarge { len: usize, max: usize },

    #[error("string of {len} bytes exceeds the {max} byte maximum")]
    StringTooLong { len: usize, max: usize },

    #[error("write of {len} bytes at offset {offset} exceeds region of {size} bytes")]
    OutOfBounds {
        offset: usize,
        len: usize,
        size: usize,
    },

    #[error("record at offset {offset} needs {need} bytes past the end of the region")]
    Truncated { offset: u64, need: u64 },

    #[error("bad magic {0:?}, expected \"MMV\"")]
    BadMagic([u8; 4]),

    #[error("unsupported MMV version {0}")]
    VersionSkew(u32),

    #[error("generation mismatch: g1 = {g1}, g2 = {g2}")]
    GenerationMismatch { g1: u64, g2: u64 },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("platform error: {0}")]
    Platform(String),
}
