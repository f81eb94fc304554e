//! # Memory Management
//!
//! Pools and arenas that keep allocation out of the per-frame path.
//!
//! ## Design Philosophy
//!
//! Storage is reserved in blocks and reused. Once a scene has warmed up:
//! - Pools recycle freed slots before growing
//! - Arenas rewind instead of freeing
//! - Keys never move, so other threads can hold them

mod arena;
mod pool;
mod shared_pool;

pub use arena::{Arena, Word};
pub use pool::{FixedSizePool, KeyLayout, PoolConfig, PoolKey};
pub use shared_pool::ThreadSafePool;
