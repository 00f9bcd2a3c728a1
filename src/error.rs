//! Error types for the mesh engine.
//!
//! Every kind but [`MeshError::OutOfRange`] is fatal to the task that
//! observes it.

use thiserror::Error;

/// Errors surfaced by the store, transport, server and configuration layers.
#[derive(Error, Debug)]
pub enum MeshError {
    /// A key was addressed at a store that does not maintain it, or a key
    /// outside `[0, B)` was requested.
    #[error("bad key: {0}")]
    BadKey(i32),

    /// A send/receive/broadcast call on the process-group substrate failed.
    #[error("transport error: {0}")]
    TransportError(String),

    /// The process-group substrate could not be initialized in a mode that
    /// permits concurrent calls from multiple threads.
    #[error("process group does not support concurrent use from multiple threads")]
    ThreadSafetyUnsupported,

    /// Invalid CLI input, or a registry field accessed before initialization.
    #[error("configuration error: {0}")]
    ConfigError(String),

    /// `position + ceil(size / block_size) > num_blocks` in the public API.
    /// The only recoverable error kind: callers get it back as a value, not
    /// as a process abort.
    #[error("position/size out of range")]
    OutOfRange,
}

/// Result alias used throughout the crate.
pub type MeshResult<T> = Result<T, MeshError>;

impl MeshError {
    /// Maps to the integer return code the public `read`/`write` API
    /// returns: `0` never appears here, `1` for [`MeshError::OutOfRange`].
    /// Any other variant has no defined code because it is meant to abort
    /// the process rather than return to a caller.
    pub fn api_code(&self) -> Option<i32> {
        match self {
            MeshError::OutOfRange => Some(1),
            _ => None,
        }
    }
}
