//! # Render Queue
//!
//! Update-side staging of render messages, one buffer per [`BufferIndex`].
//! Messages written during a frame leave with that frame's batch.

use std::sync::Arc;

use stagecraft_core::{BufferIndex, Message, MessageBuffer, PoolKey};

use crate::backend::TextureData;
use crate::instruction::RenderInstruction;
use crate::manager::RenderManager;
use crate::resources::{RenderTracker, TextureId, TextureResource};

/// Double-buffered queue of messages for the [`RenderManager`].
pub struct RenderQueue {
    buffers: [MessageBuffer<RenderManager>; 2],
}

impl RenderQueue {
    /// Creates both buffers with `initial_capacity_bytes` of storage.
    #[must_use]
    pub fn new(initial_capacity_bytes: usize) -> Self {
        Self {
            buffers: [
                MessageBuffer::with_capacity_bytes(initial_capacity_bytes),
                MessageBuffer::with_capacity_bytes(initial_capacity_bytes),
            ],
        }
    }

    /// Queues an arbitrary message for buffer `index`.
    pub fn reserve<M>(&mut self, index: BufferIndex, message: M)
    where
        M: Message<RenderManager> + 'static,
    {
        self.buffers[index.as_usize()].reserve(message);
    }

    /// Messages queued for buffer `index`.
    #[must_use]
    pub fn pending(&self, index: BufferIndex) -> usize {
        self.buffers[index.as_usize()].len()
    }

    /// Swaps out buffer `index` for `replacement` and returns the filled one.
    pub fn take(
        &mut self,
        index: BufferIndex,
        replacement: MessageBuffer<RenderManager>,
    ) -> MessageBuffer<RenderManager> {
        std::mem::replace(&mut self.buffers[index.as_usize()], replacement)
    }

    /// Create device state for a pooled renderer.
    pub fn add_renderer(&mut self, index: BufferIndex, key: PoolKey) {
        self.reserve(index, move |manager: &mut RenderManager, _: BufferIndex| {
            manager.add_renderer(key);
        });
    }

    /// Release a renderer and free it from the pool.
    pub fn remove_renderer(&mut self, index: BufferIndex, key: PoolKey) {
        self.reserve(index, move |manager: &mut RenderManager, _: BufferIndex| {
            manager.remove_renderer(key);
        });
    }

    /// Watch a tracker until the next presented frame.
    pub fn add_tracker(&mut self, index: BufferIndex, tracker: RenderTracker) {
        self.reserve(index, move |manager: &mut RenderManager, _: BufferIndex| {
            manager.add_tracker(tracker);
        });
    }

    /// Stop watching a tracker.
    pub fn remove_tracker(&mut self, index: BufferIndex, tracker: RenderTracker) {
        self.reserve(index, move |manager: &mut RenderManager, _: BufferIndex| {
            manager.remove_tracker(&tracker);
        });
    }

    /// Register a texture.
    pub fn add_texture(&mut self, index: BufferIndex, resource: Arc<TextureResource>) {
        self.reserve(index, move |manager: &mut RenderManager, _: BufferIndex| {
            manager.add_texture(resource);
        });
    }

    /// Upload pixel data for a registered texture.
    pub fn upload_texture(&mut self, index: BufferIndex, id: TextureId, data: TextureData) {
        self.reserve(index, move |manager: &mut RenderManager, _: BufferIndex| {
            manager.upload_texture(id, &data);
        });
    }

    /// Unregister a texture.
    pub fn remove_texture(&mut self, index: BufferIndex, id: TextureId) {
        self.reserve(index, move |manager: &mut RenderManager, _: BufferIndex| {
            manager.remove_texture(id);
        });
    }

    /// Replace the instruction drawn by the render thread.
    pub fn set_instruction(&mut self, index: BufferIndex, instruction: RenderInstruction) {
        self.reserve(index, move |manager: &mut RenderManager, _: BufferIndex| {
            manager.set_instruction(instruction);
        });
    }
}
