//! # Double-Buffered Values
//!
//! Two copies of a value, one per [`BufferIndex`].
//!
//! ## Architecture
//!
//! ```text
//!            bake(0, v)
//!   ┌──────────┐      ┌──────────┐
//!   │ slot 0=v │      │ slot 1   │  pending_copy[1] = true
//!   └──────────┘      └──────────┘
//!                  swap
//!   ┌──────────┐      ┌──────────┐
//!   │ slot 0=v │ ───▶ │ slot 1=v │  on_swap(1) copies
//!   └──────────┘      └──────────┘
//! ```
//!
//! A plain `set` touches only the written slot. A `bake` is permanent, so
//! the other slot is scheduled to receive the value when it next becomes the
//! write slot.

use super::buffer_index::BufferIndex;

/// A value with one copy per buffer and deferred cross-buffer baking.
#[derive(Clone, Debug)]
pub struct DoubleBuffered<T> {
    values: [T; 2],
    pending_copy: [bool; 2],
}

impl<T: Clone> DoubleBuffered<T> {
    /// Both slots start as `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            values: [value.clone(), value],
            pending_copy: [false; 2],
        }
    }

    /// Writes slot `index` and schedules the other slot to follow after the
    /// next swap.
    pub fn bake(&mut self, index: BufferIndex, value: T) {
        self.values[index.as_usize()] = value;
        self.pending_copy[index.as_usize()] = false;
        self.pending_copy[index.other().as_usize()] = true;
    }

    /// Applies a pending bake to the slot that just became the write slot.
    ///
    /// Returns `true` if a copy happened.
    pub fn on_swap(&mut self, new_write_index: BufferIndex) -> bool {
        let target = new_write_index.as_usize();
        if !self.pending_copy[target] {
            return false;
        }
        self.values[target] = self.values[new_write_index.other().as_usize()].clone();
        self.pending_copy[target] = false;
        true
    }
}

impl<T> DoubleBuffered<T> {
    /// Reads slot `index`.
    #[inline]
    #[must_use]
    pub fn get(&self, index: BufferIndex) -> &T {
        &self.values[index.as_usize()]
    }

    /// Mutable access to slot `index`. Counts as a `set`.
    #[inline]
    pub fn get_mut(&mut self, index: BufferIndex) -> &mut T {
        self.pending_copy[index.as_usize()] = false;
        &mut self.values[index.as_usize()]
    }

    /// Writes slot `index` only.
    #[inline]
    pub fn set(&mut self, index: BufferIndex, value: T) {
        self.values[index.as_usize()] = value;
        self.pending_copy[index.as_usize()] = false;
    }

    /// Returns `true` if either slot waits for a bake copy.
    #[inline]
    #[must_use]
    pub fn has_pending_copy(&self) -> bool {
        self.pending_copy[0] || self.pending_copy[1]
    }
}

impl<T: PartialEq> DoubleBuffered<T> {
    /// Both slots hold the same value and nothing is pending.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        !self.has_pending_copy() && self.values[0] == self.values[1]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_touches_one_slot() {
        let mut value = DoubleBuffered::new(1.0_f32);
        value.set(BufferIndex::ZERO, 2.0);
        assert_eq!(*value.get(BufferIndex::ZERO), 2.0);
        assert_eq!(*value.get(BufferIndex::ONE), 1.0);
        assert!(!value.on_swap(BufferIndex::ONE));
        assert_eq!(*value.get(BufferIndex::ONE), 1.0);
    }

    #[test]
    fn test_bake_converges_after_swap() {
        let mut value = DoubleBuffered::new(0_i32);
        value.bake(BufferIndex::ZERO, 9);
        assert!(!value.is_clean());
        assert_eq!(*value.get(BufferIndex::ONE), 0);

        assert!(value.on_swap(BufferIndex::ONE));
        assert_eq!(*value.get(BufferIndex::ONE), 9);
        assert!(value.is_clean());
    }

    #[test]
    fn test_set_overrides_pending_bake() {
        let mut value = DoubleBuffered::new(0_i32);
        value.bake(BufferIndex::ZERO, 5);
        value.set(BufferIndex::ONE, 7);
        assert!(!value.on_swap(BufferIndex::ONE));
        assert_eq!(*value.get(BufferIndex::ONE), 7);
    }
}
