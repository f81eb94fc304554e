//! # Update/Render Synchronization
//!
//! ## The Problem
//!
//! ```text
//! Update thread:  WRITE scene properties for frame N+1
//! Render thread:  READ scene properties of frame N
//! ```
//!
//! ## The Solution: Double Buffering
//!
//! ```text
//! Frame N:
//!   Update writes buffer 0
//!   Render reads buffer 1 (last frame's state)
//!
//! Frame N+1:
//!   SWAP (buffer index flip, once per frame)
//!   Update writes buffer 1
//!   Render reads buffer 0
//! ```
//!
//! The index travels with every render batch, so neither side needs a lock
//! on scene data.

mod buffer_index;
mod double_buffer;
mod property;

pub use buffer_index::{BufferIndex, SceneGraphBuffers};
pub use double_buffer::DoubleBuffered;
pub use property::{
    AnimatableProperty, DynamicProperty, InheritedProperty, PropertyKind, PropertyType,
    PropertyValue,
};
