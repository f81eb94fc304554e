//! # Update -> Render Batches
//!
//! ```text
//!  update thread                                 render thread
//!  RenderDispatcher ── RenderBatch (bounded) ──▶ RenderReceiver
//!        ▲                                            │
//!        └──────────── empty MessageBuffer ◀──────────┘
//! ```
//!
//! The batch channel holds at most `max_frames_in_flight` frames. When the
//! render thread falls that far behind, dispatching blocks the update thread.

use crossbeam_channel::{Receiver, Sender, TryRecvError};
use stagecraft_core::{BufferIndex, MessageBuffer};
use stagecraft_shared::constants::{DEFAULT_MAX_FRAMES_IN_FLIGHT, DEFAULT_MESSAGE_BUFFER_BYTES};

use crate::manager::RenderManager;
use crate::queue::RenderQueue;

/// Sizing for [`render_channel`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderConfig {
    /// Batches that may wait for the render thread.
    pub max_frames_in_flight: usize,
    /// Initial storage of each render message buffer.
    pub initial_capacity_bytes: usize,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_frames_in_flight: DEFAULT_MAX_FRAMES_IN_FLIGHT,
            initial_capacity_bytes: DEFAULT_MESSAGE_BUFFER_BYTES,
        }
    }
}

/// One frame's worth of render work.
pub struct RenderBatch {
    /// Update frame number.
    pub frame: u64,
    /// Buffer the render thread reads for this frame.
    pub buffer_index: BufferIndex,
    /// `false` when nothing changed and drawing can be skipped.
    pub render_required: bool,
    /// Render messages, in the order they were queued.
    pub messages: MessageBuffer<RenderManager>,
}

/// Creates a connected dispatcher/receiver pair.
#[must_use]
pub fn render_channel(config: RenderConfig) -> (RenderDispatcher, RenderReceiver) {
    let (batch_tx, batch_rx) = crossbeam_channel::bounded(config.max_frames_in_flight.max(1));
    let (recycle_tx, recycle_rx) = crossbeam_channel::unbounded();
    (
        RenderDispatcher {
            batches: batch_tx,
            recycled: recycle_rx,
            initial_capacity_bytes: config.initial_capacity_bytes,
        },
        RenderReceiver {
            batches: batch_rx,
            recycle: recycle_tx,
        },
    )
}

/// Update-side sender of render batches.
pub struct RenderDispatcher {
    batches: Sender<RenderBatch>,
    recycled: Receiver<MessageBuffer<RenderManager>>,
    initial_capacity_bytes: usize,
}

impl RenderDispatcher {
    /// Sends buffer `buffer_index` of `queue` as frame `frame`.
    ///
    /// Blocks while `max_frames_in_flight` batches are waiting. Returns
    /// `false` if the render side is gone.
    pub fn dispatch(
        &mut self,
        queue: &mut RenderQueue,
        frame: u64,
        buffer_index: BufferIndex,
        render_required: bool,
    ) -> bool {
        let replacement = self
            .recycled
            .try_recv()
            .unwrap_or_else(|_| MessageBuffer::with_capacity_bytes(self.initial_capacity_bytes));
        let batch = RenderBatch {
            frame,
            buffer_index,
            render_required,
            messages: queue.take(buffer_index, replacement),
        };
        if self.batches.send(batch).is_err() {
            tracing::warn!(frame, "render receiver is gone, batch dropped");
            return false;
        }
        true
    }

    /// Batches sent but not yet picked up.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.batches.len()
    }
}

/// Render-side receiver of render batches.
pub struct RenderReceiver {
    batches: Receiver<RenderBatch>,
    recycle: Sender<MessageBuffer<RenderManager>>,
}

impl RenderReceiver {
    /// Waits for the next batch. `None` once the dispatcher is dropped and
    /// every batch has been received.
    #[must_use]
    pub fn recv(&self) -> Option<RenderBatch> {
        self.batches.recv().ok()
    }

    /// Takes the next batch if one is waiting.
    #[must_use]
    pub fn try_recv(&self) -> Option<RenderBatch> {
        match self.batches.try_recv() {
            Ok(batch) => Some(batch),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Returns a processed buffer to the dispatcher for reuse.
    pub fn recycle(&self, messages: MessageBuffer<RenderManager>) {
        // The dispatcher may already be gone; the buffer is then dropped.
        let _ = self.recycle.send(messages);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::RecordingBackend;
    use crate::resources::TextureId;
    use stagecraft_core::{PoolConfig, ThreadSafePool};
    use std::sync::Arc;

    #[test]
    fn test_batch_carries_queued_messages() {
        let (mut dispatcher, receiver) = render_channel(RenderConfig::default());
        let mut queue = RenderQueue::new(256);
        queue.remove_texture(BufferIndex::ONE, TextureId(1));
        queue.remove_texture(BufferIndex::ZERO, TextureId(2));

        assert!(dispatcher.dispatch(&mut queue, 7, BufferIndex::ONE, true));
        let batch = receiver.try_recv().expect("batch sent");
        assert_eq!(batch.frame, 7);
        assert_eq!(batch.buffer_index, BufferIndex::ONE);
        assert_eq!(batch.messages.len(), 1);
        assert_eq!(queue.pending(BufferIndex::ONE), 0);
        assert_eq!(queue.pending(BufferIndex::ZERO), 1);
    }

    #[test]
    fn test_processed_buffers_are_reused() {
        let (mut dispatcher, receiver) = render_channel(RenderConfig {
            max_frames_in_flight: 1,
            initial_capacity_bytes: 32,
        });
        let pool = Arc::new(ThreadSafePool::new(PoolConfig::default()));
        let mut manager = RenderManager::new(RecordingBackend::new(), pool);
        let mut queue = RenderQueue::new(32);

        for frame in 0..3 {
            for id in 0..20 {
                queue.remove_texture(BufferIndex::ZERO, TextureId(id));
            }
            dispatcher.dispatch(&mut queue, frame, BufferIndex::ZERO, false);
            let mut batch = receiver.recv().expect("batch sent");
            assert_eq!(manager.render(&mut batch).messages, 20);
            receiver.recycle(batch.messages);
        }
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[test]
    fn test_recv_ends_when_dispatcher_dropped() {
        let (dispatcher, receiver) = render_channel(RenderConfig::default());
        drop(dispatcher);
        assert!(receiver.recv().is_none());
    }
}
