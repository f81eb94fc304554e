//! # Word Arena
//!
//! A growable bump allocator of 16-byte aligned words. Message buffers write
//! variable-sized records into it and rewind it once they are consumed.

use std::mem::MaybeUninit;

/// One arena word. Every record starts on a word boundary.
#[derive(Clone, Copy)]
#[repr(C, align(16))]
pub struct Word([u8; Arena::WORD_SIZE]);

/// A bump-pointer arena over [`Word`]s.
///
/// Allocations bump a cursor. Capacity doubles when a reservation does not
/// fit, and is kept across [`Arena::reset`], so a warmed-up arena stops
/// allocating.
///
/// # Thread Safety
///
/// This arena is NOT thread-safe. It is moved between threads whole.
///
/// # Example
///
/// ```rust
/// use stagecraft_core::memory::Arena;
///
/// let mut arena = Arena::with_capacity_bytes(64);
/// let first = arena.reserve(2);
/// let second = arena.reserve(1);
/// assert_eq!((first, second), (0, 2));
/// arena.reset();
/// assert_eq!(arena.used_words(), 0);
/// ```
pub struct Arena {
    words: Vec<MaybeUninit<Word>>,
    used: usize,
}

impl Arena {
    /// Size and alignment of a [`Word`] in bytes.
    pub const WORD_SIZE: usize = 16;

    /// Creates an arena with room for at least `bytes` bytes.
    #[must_use]
    pub fn with_capacity_bytes(bytes: usize) -> Self {
        let mut words = Vec::new();
        words.resize_with(Self::words_for(bytes), MaybeUninit::uninit);
        Self { words, used: 0 }
    }

    /// Words needed to hold `bytes` bytes.
    #[inline]
    #[must_use]
    pub const fn words_for(bytes: usize) -> usize {
        bytes.div_ceil(Self::WORD_SIZE)
    }

    /// Total capacity in bytes.
    #[inline]
    #[must_use]
    pub fn capacity_bytes(&self) -> usize {
        self.words.len() * Self::WORD_SIZE
    }

    /// Words handed out since the last reset.
    #[inline]
    #[must_use]
    pub const fn used_words(&self) -> usize {
        self.used
    }

    /// Bytes handed out since the last reset.
    #[inline]
    #[must_use]
    pub const fn used_bytes(&self) -> usize {
        self.used * Self::WORD_SIZE
    }

    /// Reserves `count` contiguous words and returns the offset of the first.
    pub fn reserve(&mut self, count: usize) -> usize {
        let offset = self.used;
        let required = offset + count;
        if required > self.words.len() {
            let grown = (self.words.len() * 2).max(required);
            tracing::trace!(
                from = self.capacity_bytes(),
                to = grown * Self::WORD_SIZE,
                "arena grew"
            );
            self.words.resize_with(grown, MaybeUninit::uninit);
        }
        self.used = required;
        offset
    }

    /// Rewinds the cursor. Earlier reservations become reusable.
    #[inline]
    pub fn reset(&mut self) {
        self.used = 0;
    }

    /// Pointer to the word at `offset`.
    ///
    /// The pointer is only valid until the next [`Arena::reserve`], which may
    /// reallocate.
    #[inline]
    pub fn word_ptr(&mut self, offset: usize) -> *mut u8 {
        self.words.as_mut_ptr().wrapping_add(offset).cast::<u8>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arena_reserve_is_contiguous() {
        let mut arena = Arena::with_capacity_bytes(1024);
        assert_eq!(arena.reserve(3), 0);
        assert_eq!(arena.reserve(5), 3);
        assert_eq!(arena.used_bytes(), 8 * Arena::WORD_SIZE);
    }

    #[test]
    fn test_arena_grows_and_keeps_capacity_after_reset() {
        let mut arena = Arena::with_capacity_bytes(32);
        let _ = arena.reserve(10);
        let grown = arena.capacity_bytes();
        assert!(grown >= 10 * Arena::WORD_SIZE);

        arena.reset();
        assert_eq!(arena.used_words(), 0);
        assert_eq!(arena.capacity_bytes(), grown);
    }

    #[test]
    fn test_word_pointers_are_aligned() {
        let mut arena = Arena::with_capacity_bytes(64);
        let offset = arena.reserve(2);
        let ptr = arena.word_ptr(offset + 1);
        assert_eq!(ptr as usize % Arena::WORD_SIZE, 0);
    }
}
