//! # Stagecraft Shared
//!
//! Common types used by the producer (event) thread, the update thread and
//! the render thread.
//!
//! ## Rule
//!
//! This crate must NEVER depend on:
//! - a threading or channel crate
//! - a graphics backend
//!
//! Synchronization lives in `stagecraft_core`, rendering in `stagecraft_render`.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod constants;
pub mod math;

pub use constants::{
    CORE_CONSTRAINT_TAG_START, CUSTOM_CONSTRAINT_TAG_END, CUSTOM_CONSTRAINT_TAG_START,
    DEFAULT_CONSTRAINT_TAG, INTERNAL_CONSTRAINT_TAG_END, INTERNAL_CONSTRAINT_TAG_START,
    INTERNAL_TAG_MAX_COUNT_PER_NAMESPACE, TOOLKIT_CONSTRAINT_TAG_START,
};
pub use math::{Matrix4, Quaternion, Vec2, Vec3, Vec4};
