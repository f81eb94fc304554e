//! # Core Errors

use thiserror::Error;

use crate::sync::PropertyKind;

/// Errors raised by the synchronization core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// A fixed-capacity queue had no room for another element.
    #[error("queue is full (capacity {capacity})")]
    QueueFull {
        /// Capacity of the queue.
        capacity: usize,
    },

    /// A value of one property type was written to a property of another.
    #[error("property type mismatch: expected {expected:?}, found {found:?}")]
    PropertyTypeMismatch {
        /// Type of the property.
        expected: PropertyKind,
        /// Type of the offered value.
        found: PropertyKind,
    },

    /// Pool sizes cannot be represented with the requested key layout.
    #[error("invalid pool key layout: {0}")]
    InvalidKeyLayout(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
