//! # Buffer Indices
//!
//! Which half of every double-buffered value the update thread writes this
//! frame. The render thread reads the other half.

use bytemuck::{Pod, Zeroable};

/// Index of one half of a double buffer. Always 0 or 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct BufferIndex(u8);

impl BufferIndex {
    /// Buffer 0.
    pub const ZERO: Self = Self(0);
    /// Buffer 1.
    pub const ONE: Self = Self(1);

    /// The opposite buffer.
    #[inline]
    #[must_use]
    pub const fn other(self) -> Self {
        Self(1 - self.0)
    }

    /// Index usable for `[T; 2]`.
    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

/// Tracks the update and render buffer indices across frames.
///
/// ```text
/// Frame N:    update writes 0, render reads 1
/// swap()
/// Frame N+1:  update writes 1, render reads 0
/// ```
#[derive(Debug, Default)]
pub struct SceneGraphBuffers {
    update: BufferIndex,
    swaps: u64,
}

impl SceneGraphBuffers {
    /// Starts with the update thread writing buffer 0.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            update: BufferIndex::ZERO,
            swaps: 0,
        }
    }

    /// Buffer the update thread writes this frame.
    #[inline]
    #[must_use]
    pub const fn update_index(&self) -> BufferIndex {
        self.update
    }

    /// Buffer the render thread reads this frame.
    #[inline]
    #[must_use]
    pub const fn render_index(&self) -> BufferIndex {
        self.update.other()
    }

    /// Number of swaps performed.
    #[inline]
    #[must_use]
    pub const fn swap_count(&self) -> u64 {
        self.swaps
    }

    /// Exchanges the roles of the two buffers and returns the new update index.
    pub fn swap(&mut self) -> BufferIndex {
        self.update = self.update.other();
        self.swaps += 1;
        self.update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indices_alternate() {
        let mut buffers = SceneGraphBuffers::new();
        assert_eq!(buffers.update_index(), BufferIndex::ZERO);
        assert_eq!(buffers.render_index(), BufferIndex::ONE);

        assert_eq!(buffers.swap(), BufferIndex::ONE);
        assert_eq!(buffers.render_index(), BufferIndex::ZERO);
        assert_eq!(buffers.swap(), BufferIndex::ZERO);
        assert_eq!(buffers.swap_count(), 2);
    }
}
