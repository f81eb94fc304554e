//! # Producer -> Update Message Queue
//!
//! ```text
//!   producer thread                        update thread
//!   ┌────────────────┐   filled buffers   ┌────────────────┐
//!   │ MessageProducer│ ─────────────────▶ │ MessageConsumer│
//!   │  current buf   │                    │ process_all()  │
//!   │                │ ◀───────────────── │                │
//!   └────────────────┘   empty buffers    └────────────────┘
//! ```
//!
//! Messages are batched in the producer's current buffer until
//! [`MessageProducer::flush`]. Processed buffers travel back for reuse, so a
//! steady stream of frames stops allocating once buffers have grown to size.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use stagecraft_shared::constants::DEFAULT_MESSAGE_BUFFER_BYTES;

use super::message::{Message, MessageBuffer};
use crate::sync::BufferIndex;

/// Sizing for [`message_queue`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct QueueConfig {
    /// Initial storage of each message buffer.
    pub initial_capacity_bytes: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            initial_capacity_bytes: DEFAULT_MESSAGE_BUFFER_BYTES,
        }
    }
}

struct Batch<C> {
    messages: MessageBuffer<C>,
    update_scene: bool,
}

/// Counts from one [`MessageConsumer::process_messages`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DrainStats {
    /// Batches drained.
    pub batches: usize,
    /// Messages run.
    pub messages: usize,
    /// Any drained batch contained a scene-changing message.
    pub scene_update: bool,
}

/// Creates a connected producer/consumer pair for context `C`.
#[must_use]
pub fn message_queue<C>(config: QueueConfig) -> (MessageProducer<C>, MessageConsumer<C>) {
    let (batch_tx, batch_rx) = crossbeam_channel::unbounded();
    let (recycle_tx, recycle_rx) = crossbeam_channel::unbounded();
    let scene_update = Arc::new(AtomicBool::new(false));

    let producer = MessageProducer {
        current: MessageBuffer::with_capacity_bytes(config.initial_capacity_bytes),
        update_scene: false,
        batches: batch_tx,
        recycled: recycle_rx,
        scene_update: Arc::clone(&scene_update),
        initial_capacity_bytes: config.initial_capacity_bytes,
    };
    let consumer = MessageConsumer {
        batches: batch_rx,
        recycle: recycle_tx,
        scene_update,
    };
    (producer, consumer)
}

/// Producer half. Owned by the thread that mutates the scene.
pub struct MessageProducer<C> {
    current: MessageBuffer<C>,
    update_scene: bool,
    batches: Sender<Batch<C>>,
    recycled: Receiver<MessageBuffer<C>>,
    scene_update: Arc<AtomicBool>,
    initial_capacity_bytes: usize,
}

impl<C> MessageProducer<C> {
    /// Appends a message to the current batch.
    ///
    /// `update_scene` marks messages whose effect needs the animate,
    /// constrain and world phases to run.
    pub fn reserve_message<M: Message<C> + 'static>(&mut self, message: M, update_scene: bool) {
        self.current.reserve(message);
        self.update_scene |= update_scene;
    }

    /// Messages queued since the last flush.
    #[inline]
    #[must_use]
    pub fn pending(&self) -> usize {
        self.current.len()
    }

    /// Hands the current batch to the consumer.
    ///
    /// Returns `false` if there was nothing to send.
    pub fn flush(&mut self) -> bool {
        if self.current.is_empty() {
            return false;
        }
        let next = self
            .recycled
            .try_recv()
            .unwrap_or_else(|_| MessageBuffer::with_capacity_bytes(self.initial_capacity_bytes));
        let batch = Batch {
            messages: std::mem::replace(&mut self.current, next),
            update_scene: std::mem::take(&mut self.update_scene),
        };
        let count = batch.messages.len();
        let update_scene = batch.update_scene;
        if self.batches.send(batch).is_err() {
            tracing::warn!(count, "message consumer is gone, batch dropped");
            return false;
        }
        if update_scene {
            self.scene_update.store(true, Ordering::Release);
        }
        tracing::trace!(count, update_scene, "flushed message batch");
        true
    }
}

/// Consumer half. Owned by the update thread.
pub struct MessageConsumer<C> {
    batches: Receiver<Batch<C>>,
    recycle: Sender<MessageBuffer<C>>,
    scene_update: Arc<AtomicBool>,
}

impl<C> MessageConsumer<C> {
    /// Returns `true` if a scene-changing batch has been flushed and not yet
    /// processed.
    #[must_use]
    pub fn is_scene_update_required(&self) -> bool {
        self.scene_update.load(Ordering::Acquire)
    }

    /// Batches waiting to be processed.
    #[must_use]
    pub fn pending_batches(&self) -> usize {
        self.batches.len()
    }

    /// Runs every batch flushed so far, in flush order.
    ///
    /// Batches flushed while this call runs wait for the next one.
    pub fn process_messages(&mut self, context: &mut C, buffer_index: BufferIndex) -> DrainStats {
        self.scene_update.store(false, Ordering::Release);
        let available = self.batches.len();
        let mut stats = DrainStats::default();
        for _ in 0..available {
            let Ok(mut batch) = self.batches.try_recv() else {
                break;
            };
            stats.batches += 1;
            stats.scene_update |= batch.update_scene;
            stats.messages += batch.messages.process_all(context, buffer_index);
            // The producer may be gone; the buffer is then simply dropped.
            let _ = self.recycle.send(batch.messages);
        }
        if stats.messages > 0 {
            tracing::trace!(
                batches = stats.batches,
                messages = stats.messages,
                "processed messages"
            );
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_batches_drain_in_flush_order() {
        let (mut producer, mut consumer) = message_queue::<Vec<u32>>(QueueConfig::default());
        producer.reserve_message(|log: &mut Vec<u32>, _: BufferIndex| log.push(1), false);
        producer.reserve_message(|log: &mut Vec<u32>, _: BufferIndex| log.push(2), false);
        assert!(producer.flush());
        producer.reserve_message(|log: &mut Vec<u32>, _: BufferIndex| log.push(3), true);
        assert!(producer.flush());
        assert!(!producer.flush());

        assert!(consumer.is_scene_update_required());
        assert_eq!(consumer.pending_batches(), 2);

        let mut log = Vec::new();
        let stats = consumer.process_messages(&mut log, BufferIndex::ZERO);
        assert_eq!(log, [1, 2, 3]);
        assert_eq!(stats.messages, 3);
        assert_eq!(stats.batches, 2);
        assert!(stats.scene_update);
        assert!(!consumer.is_scene_update_required());

        let stats = consumer.process_messages(&mut log, BufferIndex::ONE);
        assert_eq!(stats, DrainStats::default());
    }

    #[test]
    fn test_unflushed_messages_stay_with_producer() {
        let (mut producer, mut consumer) = message_queue::<u32>(QueueConfig::default());
        producer.reserve_message(|n: &mut u32, _: BufferIndex| *n += 1, false);
        let mut n = 0;
        assert_eq!(consumer.process_messages(&mut n, BufferIndex::ZERO).messages, 0);
        assert_eq!(producer.pending(), 1);
        producer.flush();
        assert_eq!(consumer.process_messages(&mut n, BufferIndex::ZERO).messages, 1);
        assert_eq!(n, 1);
    }

    #[test]
    fn test_buffers_are_recycled() {
        let (mut producer, mut consumer) = message_queue::<u64>(QueueConfig {
            initial_capacity_bytes: 64,
        });
        let mut total = 0;
        for frame in 0..4_u64 {
            for i in 0..50_u64 {
                producer.reserve_message(move |t: &mut u64, _: BufferIndex| *t += i, false);
            }
            producer.flush();
            consumer.process_messages(&mut total, BufferIndex::ZERO);
            if frame > 0 {
                assert!(producer.current.capacity_bytes() > 64);
            }
        }
        assert_eq!(total, 4 * (0..50).sum::<u64>());
    }

    #[test]
    fn test_cross_thread_fifo() {
        let (mut producer, mut consumer) = message_queue::<Vec<u32>>(QueueConfig::default());
        let handle = thread::spawn(move || {
            for batch in 0..10_u32 {
                for i in 0..100 {
                    let value = batch * 100 + i;
                    producer.reserve_message(
                        move |log: &mut Vec<u32>, _: BufferIndex| log.push(value),
                        false,
                    );
                }
                producer.flush();
            }
        });
        handle.join().expect("producer panicked");

        let mut log = Vec::new();
        consumer.process_messages(&mut log, BufferIndex::ZERO);
        assert_eq!(log, (0..1000).collect::<Vec<_>>());
    }
}
