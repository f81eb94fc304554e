//! # Message Buffers
//!
//! Messages are written straight into a [`Arena`] as a header followed by
//! the message value, so queueing a message does not allocate.
//!
//! ## Safety Note
//!
//! Records are type-erased. The header stores monomorphized thunks that
//! know the concrete message type; every unsafe block below relies on the
//! record layout written by [`MessageBuffer::reserve`].

#![allow(unsafe_code)]
//!
//! ## Record Layout
//!
//! ```text
//! word 0..h        word h..h+p
//! ┌──────────────┬─────────────────────┐
//! │ Header<C>    │ message payload (M) │   next record ...
//! │ process      │                     │
//! │ discard      │                     │
//! │ words = h+p  │                     │
//! └──────────────┴─────────────────────┘
//! ```

use std::marker::PhantomData;
use std::mem::{align_of, size_of};

use crate::memory::Arena;
use crate::sync::BufferIndex;

/// A deferred operation on context `C`, run exactly once by the consumer.
///
/// Any `FnOnce(&mut C, BufferIndex) + Send` closure is a message.
pub trait Message<C>: Send {
    /// Applies the message. `buffer_index` is the consumer's current write
    /// buffer.
    fn process(self, context: &mut C, buffer_index: BufferIndex);
}

impl<C, F> Message<C> for F
where
    F: FnOnce(&mut C, BufferIndex) + Send,
{
    #[inline]
    fn process(self, context: &mut C, buffer_index: BufferIndex) {
        self(context, buffer_index);
    }
}

type ProcessFn<C> = unsafe fn(*mut u8, &mut C, BufferIndex);
type DiscardFn = unsafe fn(*mut u8);

struct Header<C> {
    process: ProcessFn<C>,
    discard: DiscardFn,
    /// Header plus payload, in words.
    words: usize,
}

#[inline]
const fn header_words<C>() -> usize {
    Arena::words_for(size_of::<Header<C>>())
}

/// # Safety
///
/// `payload` must point to an initialized `M` that is not read again.
unsafe fn process_message<C, M: Message<C>>(
    payload: *mut u8,
    context: &mut C,
    buffer_index: BufferIndex,
) {
    let message = payload.cast::<M>().read();
    message.process(context, buffer_index);
}

/// # Safety
///
/// `payload` must point to an initialized `M` that is not read again.
unsafe fn discard_message<M>(payload: *mut u8) {
    payload.cast::<M>().drop_in_place();
}

/// A FIFO batch of type-erased messages for context `C`.
///
/// # Example
///
/// ```rust
/// use stagecraft_core::queue::MessageBuffer;
/// use stagecraft_core::sync::BufferIndex;
///
/// let mut buffer = MessageBuffer::<Vec<u32>>::with_capacity_bytes(256);
/// buffer.reserve(|log: &mut Vec<u32>, _: BufferIndex| log.push(1));
/// buffer.reserve(|log: &mut Vec<u32>, _: BufferIndex| log.push(2));
///
/// let mut log = Vec::new();
/// assert_eq!(buffer.process_all(&mut log, BufferIndex::ZERO), 2);
/// assert_eq!(log, [1, 2]);
/// ```
pub struct MessageBuffer<C> {
    arena: Arena,
    count: usize,
    _context: PhantomData<fn(&mut C)>,
}

impl<C> MessageBuffer<C> {
    /// Creates an empty buffer with `bytes` of initial storage.
    #[must_use]
    pub fn with_capacity_bytes(bytes: usize) -> Self {
        Self {
            arena: Arena::with_capacity_bytes(bytes),
            count: 0,
            _context: PhantomData,
        }
    }

    /// Number of queued messages.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if no messages are queued.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Bytes occupied by queued messages.
    #[inline]
    #[must_use]
    pub const fn used_bytes(&self) -> usize {
        self.arena.used_bytes()
    }

    /// Storage reserved, in bytes.
    #[inline]
    #[must_use]
    pub fn capacity_bytes(&self) -> usize {
        self.arena.capacity_bytes()
    }

    /// Constructs `message` in place at the end of the buffer.
    ///
    /// Messages outlive the call that queued them, so they must own
    /// everything they capture:
    ///
    /// ```compile_fail
    /// use stagecraft_core::queue::MessageBuffer;
    /// use stagecraft_core::sync::BufferIndex;
    ///
    /// let mut buffer = MessageBuffer::<Vec<u8>>::with_capacity_bytes(64);
    /// let local = vec![0xAB_u8; 64];
    /// let borrowed = &local;
    /// buffer.reserve(move |out: &mut Vec<u8>, _: BufferIndex| {
    ///     out.extend_from_slice(&borrowed[..4]);
    /// });
    /// drop(local);
    /// buffer.process_all(&mut Vec::new(), BufferIndex::ZERO);
    /// ```
    ///
    /// # Panics
    ///
    /// Panics if `M` needs stricter alignment than an arena word.
    pub fn reserve<M: Message<C> + 'static>(&mut self, message: M) {
        assert!(
            align_of::<M>() <= Arena::WORD_SIZE,
            "message alignment {} exceeds arena word alignment",
            align_of::<M>()
        );
        let header = header_words::<C>();
        let words = header + Arena::words_for(size_of::<M>());
        let offset = self.arena.reserve(words);
        let base = self.arena.word_ptr(offset);

        // SAFETY: `reserve` returned `words` contiguous, word-aligned words
        // starting at `base`. The header fits in the first `header` words and
        // the payload in the rest; both types are at most word-aligned.
        unsafe {
            base.cast::<Header<C>>().write(Header {
                process: process_message::<C, M>,
                discard: discard_message::<M>,
                words,
            });
            base.add(header * Arena::WORD_SIZE).cast::<M>().write(message);
        }
        self.count += 1;
    }

    /// Runs every queued message once, oldest first, then rewinds the buffer.
    ///
    /// Returns the number of messages processed.
    pub fn process_all(&mut self, context: &mut C, buffer_index: BufferIndex) -> usize {
        let processed = self.count;
        self.consume(|header, payload| {
            // SAFETY: `payload` holds the message written with this header
            // and `consume` never yields a record twice.
            unsafe { (header.process)(payload, context, buffer_index) }
        });
        processed
    }

    /// Drops every queued message without running it.
    pub fn clear(&mut self) {
        self.consume(|header, payload| {
            // SAFETY: see `process_all`.
            unsafe { (header.discard)(payload) }
        });
    }

    /// Walks all records and rewinds the arena first, so a panicking message
    /// leaks the rest of the batch instead of running it twice.
    fn consume(&mut self, mut visit: impl FnMut(&Header<C>, *mut u8)) {
        let end = self.arena.used_words();
        self.arena.reset();
        self.count = 0;
        let header_size = header_words::<C>() * Arena::WORD_SIZE;
        let mut offset = 0;
        while offset < end {
            let base = self.arena.word_ptr(offset);
            // SAFETY: every record in `0..end` was written by `reserve` and
            // the arena is not written again during this walk.
            let header = unsafe { base.cast::<Header<C>>().read() };
            visit(&header, base.wrapping_add(header_size));
            offset += header.words;
        }
    }
}

impl<C> Drop for MessageBuffer<C> {
    fn drop(&mut self) {
        self.clear();
    }
}
