//! # Core Constants
//!
//! Tag ranges and allocation defaults.
//!
//! **CRITICAL:** Constraint tag ranges partition ownership between user code
//! and internal subsystems. Bulk removal by range relies on them never
//! overlapping.

// =============================================================================
// CONSTRAINT TAG RANGES
// =============================================================================

/// Tag given to constraints that never had one assigned.
pub const DEFAULT_CONSTRAINT_TAG: u32 = 0;

/// First tag available to application code.
pub const CUSTOM_CONSTRAINT_TAG_START: u32 = 1;

/// Last tag available to application code (inclusive).
pub const CUSTOM_CONSTRAINT_TAG_END: u32 = 1_000_000;

/// First tag of the reserved internal range.
pub const INTERNAL_CONSTRAINT_TAG_START: u32 = CUSTOM_CONSTRAINT_TAG_END + 1;

/// Number of tags in each internal namespace.
pub const INTERNAL_TAG_MAX_COUNT_PER_NAMESPACE: u32 = 10_000;

/// Number of internal namespaces.
pub const INTERNAL_NAMESPACE_COUNT: u32 = 10;

/// Last tag of the reserved internal range (inclusive).
pub const INTERNAL_CONSTRAINT_TAG_END: u32 =
    INTERNAL_CONSTRAINT_TAG_START + INTERNAL_TAG_MAX_COUNT_PER_NAMESPACE * INTERNAL_NAMESPACE_COUNT - 1;

/// First tag of the core namespace.
pub const CORE_CONSTRAINT_TAG_START: u32 = INTERNAL_CONSTRAINT_TAG_START;

/// First tag of the toolkit namespace.
pub const TOOLKIT_CONSTRAINT_TAG_START: u32 =
    CORE_CONSTRAINT_TAG_START + INTERNAL_TAG_MAX_COUNT_PER_NAMESPACE;

// =============================================================================
// ALLOCATION DEFAULTS
// =============================================================================

/// Slots in the first block of a pool.
pub const DEFAULT_POOL_INITIAL_CAPACITY: u32 = 32;

/// Upper bound on the slot count of a single pool block.
pub const DEFAULT_POOL_MAXIMUM_BLOCK_CAPACITY: u32 = 1_048_576;

/// Initial size of a message buffer in bytes.
pub const DEFAULT_MESSAGE_BUFFER_BYTES: usize = 4096;

/// Frames the update thread may run ahead of the render thread.
pub const DEFAULT_MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Number of frame durations kept for statistics.
pub const DEFAULT_FRAME_STATS_WINDOW: usize = 120;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_ranges_do_not_overlap() {
        assert!(DEFAULT_CONSTRAINT_TAG < CUSTOM_CONSTRAINT_TAG_START);
        assert!(CUSTOM_CONSTRAINT_TAG_END < INTERNAL_CONSTRAINT_TAG_START);
        assert!(TOOLKIT_CONSTRAINT_TAG_START < INTERNAL_CONSTRAINT_TAG_END);
        assert_eq!(INTERNAL_CONSTRAINT_TAG_END, 1_100_000);
    }
}
