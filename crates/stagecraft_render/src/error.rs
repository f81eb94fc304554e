//! # Backend Errors

use thiserror::Error;

/// Failures reported by a [`GraphicsBackend`](crate::GraphicsBackend).
///
/// The render manager logs and counts these. They never travel back to the
/// update or producer threads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// The device is gone; every further call will fail.
    #[error("graphics device lost")]
    DeviceLost,

    /// An allocation on the device failed.
    #[error("out of device memory ({requested} bytes requested)")]
    OutOfMemory {
        /// Size of the failed allocation.
        requested: usize,
    },

    /// A handle that the backend never issued, or already destroyed.
    #[error("invalid backend handle {0}")]
    InvalidHandle(u64),

    /// Texture data does not match its declared size.
    #[error("texture data is {actual} bytes, expected {expected}")]
    TextureSize {
        /// `width * height * 4`.
        expected: usize,
        /// Bytes supplied.
        actual: usize,
    },

    /// Any other backend-specific failure.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Result type for backend calls.
pub type BackendResult<T> = Result<T, BackendError>;
