//! # Stagecraft Core
//!
//! Synchronization kernel shared by the update and render sides of a
//! retained-mode scene graph:
//! - Pooled objects addressed by stable 32-bit keys
//! - Double-buffered values flipped once per frame
//! - Zero-allocation message queues between threads
//!
//! ## Architecture Rules
//!
//! 1. **The swap is the only visibility boundary** - render reads last frame's buffer
//! 2. **Messages run once, in order** - per queue, FIFO
//! 3. **No allocation in steady state** - pools and buffers are recycled
//!
//! ## Example
//!
//! ```rust
//! use stagecraft_core::{AnimatableProperty, SceneGraphBuffers};
//!
//! let mut buffers = SceneGraphBuffers::new();
//! let mut opacity = AnimatableProperty::new(1.0_f32);
//!
//! opacity.bake(buffers.update_index(), 0.5);
//! let next = buffers.swap();
//! opacity.on_swap(next);
//! assert_eq!(opacity.get(next), 0.5);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod error;
pub mod memory;
pub mod queue;
pub mod sync;

pub use error::{CoreError, CoreResult};
pub use memory::{Arena, FixedSizePool, KeyLayout, PoolConfig, PoolKey, ThreadSafePool};
pub use queue::{
    message_queue, CircularQueue, DrainStats, Message, MessageBuffer, MessageConsumer,
    MessageProducer, QueueConfig,
};
pub use sync::{
    AnimatableProperty, BufferIndex, DoubleBuffered, DynamicProperty, InheritedProperty,
    PropertyKind, PropertyType, PropertyValue, SceneGraphBuffers,
};
