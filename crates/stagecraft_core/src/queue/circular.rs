//! # Circular Queue
//!
//! Fixed-capacity ring buffer. Used for rolling frame statistics.

use std::ops::Index;

use crate::error::{CoreError, CoreResult};

/// A ring buffer that never reallocates.
#[derive(Clone, Debug)]
pub struct CircularQueue<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,
}

impl<T> CircularQueue<T> {
    /// Creates an empty queue holding at most `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            len: 0,
        }
    }

    /// Maximum number of elements.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Number of elements.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if the queue holds nothing.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns `true` if another push would fail.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Appends `value` at the back.
    ///
    /// # Errors
    ///
    /// [`CoreError::QueueFull`] if the queue is at capacity.
    pub fn push_back(&mut self, value: T) -> CoreResult<()> {
        if self.is_full() {
            return Err(CoreError::QueueFull {
                capacity: self.capacity(),
            });
        }
        let tail = self.physical(self.len);
        self.slots[tail] = Some(value);
        self.len += 1;
        Ok(())
    }

    /// Removes and returns the front element.
    pub fn pop_front(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let value = self.slots[self.head].take();
        self.head = (self.head + 1) % self.capacity();
        self.len -= 1;
        value
    }

    /// Oldest element.
    #[must_use]
    pub fn front(&self) -> Option<&T> {
        self.get(0)
    }

    /// Newest element.
    #[must_use]
    pub fn back(&self) -> Option<&T> {
        self.len.checked_sub(1).and_then(|last| self.get(last))
    }

    /// Element `index` positions from the front.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.slots[self.physical(index)].as_ref()
    }

    /// Iterates from front to back.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |index| self.get(index))
    }

    /// Removes every element.
    pub fn clear(&mut self) {
        while self.pop_front().is_some() {}
        self.head = 0;
    }

    #[inline]
    fn physical(&self, index: usize) -> usize {
        (self.head + index) % self.capacity()
    }
}

impl<T> Index<usize> for CircularQueue<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        match self.get(index) {
            Some(value) => value,
            None => panic!(
                "circular queue index {index} out of range (len {})",
                self.len
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_of_twenty() {
        let mut queue = CircularQueue::new(20);
        for i in 0..20 {
            queue.push_back(i).expect("room left");
        }
        assert!(queue.is_full());
        assert_eq!(
            queue.push_back(20),
            Err(CoreError::QueueFull { capacity: 20 })
        );
        assert_eq!(queue[0], 0);
        assert_eq!(queue[19], 19);

        for i in 0..10 {
            assert_eq!(queue.pop_front(), Some(i));
        }
        for i in 20..30 {
            queue.push_back(i).expect("room left");
        }
        // wrapped around the end of storage
        assert_eq!(queue.front(), Some(&10));
        assert_eq!(queue.back(), Some(&29));
        assert_eq!(queue.iter().copied().collect::<Vec<_>>(), (10..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_wrap_by_one_then_drain() {
        let mut queue = CircularQueue::new(20);
        for i in 0..20 {
            queue.push_back(i).expect("room left");
        }
        assert_eq!(queue.pop_front(), Some(0));
        queue.push_back(20).expect("room left");

        assert_eq!(queue.front(), Some(&1));
        assert_eq!(queue.back(), Some(&20));
        assert!(queue.is_full());

        for i in 1..=20 {
            assert_eq!(queue.pop_front(), Some(i));
        }
        assert!(queue.is_empty());
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    fn test_empty_queue() {
        let mut queue = CircularQueue::<u8>::new(3);
        assert!(queue.is_empty());
        assert_eq!(queue.front(), None);
        assert_eq!(queue.back(), None);
        assert_eq!(queue.pop_front(), None);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_index_past_len_panics() {
        let mut queue = CircularQueue::new(4);
        queue.push_back(1).expect("room left");
        let _ = queue[1];
    }
}
