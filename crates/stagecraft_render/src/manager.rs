//! # Render Manager
//!
//! The context render messages run against. It owns the backend, applies
//! resource changes in message order, and draws the latest instruction.
//!
//! ```text
//! RenderBatch ──▶ process messages ──▶ render_required? ──▶ draw ──▶ present
//!                 (resources, instruction)      │ no
//!                                               └──▶ skipped frame
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use stagecraft_core::{PoolKey, ThreadSafePool};

use crate::backend::{
    BackendHandle, Capability, DrawCommand, GraphicsBackend, ItemUniforms, RendererDesc,
    StateCache, TextureData,
};
use crate::channel::RenderBatch;
use crate::error::BackendError;
use crate::instruction::{RenderInstruction, RenderItem};
use crate::resources::{RenderRenderer, RenderTracker, TextureId, TextureResource, TextureState};

/// Counters kept by the render manager.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Frames drawn and presented.
    pub frames_rendered: u64,
    /// Batches that carried no render request.
    pub frames_skipped: u64,
    /// Draw calls issued.
    pub draw_calls: u64,
    /// Items left out because their renderer or texture was not ready.
    pub items_skipped: u64,
    /// Failed backend calls.
    pub backend_errors: u64,
    /// Messages processed.
    pub messages_processed: u64,
}

/// Outcome of one [`RenderManager::render`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameResult {
    /// Update frame of the batch.
    pub frame: u64,
    /// Messages processed.
    pub messages: usize,
    /// Draw calls issued.
    pub draw_calls: usize,
    /// Whether the frame was drawn and presented.
    pub rendered: bool,
}

struct TextureEntry {
    resource: Arc<TextureResource>,
    handle: Option<BackendHandle>,
}

struct ResolvedDraw {
    renderer: BackendHandle,
    desc: RendererDesc,
    texture: Option<BackendHandle>,
    item: RenderItem,
}

/// Render-thread state. Only render messages and the render thread touch it.
pub struct RenderManager {
    backend: Box<dyn GraphicsBackend>,
    renderers: Arc<ThreadSafePool<RenderRenderer>>,
    textures: HashMap<TextureId, TextureEntry>,
    trackers: Vec<RenderTracker>,
    instruction: Option<RenderInstruction>,
    state_cache: StateCache,
    draw_list: Vec<ResolvedDraw>,
    stats: RenderStats,
}

impl RenderManager {
    /// Creates a manager drawing through `backend`.
    ///
    /// `renderers` is shared with the update thread, which allocates into it.
    pub fn new(
        backend: impl GraphicsBackend + 'static,
        renderers: Arc<ThreadSafePool<RenderRenderer>>,
    ) -> Self {
        Self {
            backend: Box::new(backend),
            renderers,
            textures: HashMap::new(),
            trackers: Vec::new(),
            instruction: None,
            state_cache: StateCache::new(),
            draw_list: Vec::new(),
            stats: RenderStats::default(),
        }
    }

    /// Counters so far.
    #[must_use]
    pub const fn stats(&self) -> RenderStats {
        self.stats
    }

    /// The shared renderer pool.
    #[must_use]
    pub fn renderer_pool(&self) -> &Arc<ThreadSafePool<RenderRenderer>> {
        &self.renderers
    }

    /// Textures currently registered.
    #[must_use]
    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    /// Trackers waiting for a rendered frame.
    #[must_use]
    pub fn pending_trackers(&self) -> usize {
        self.trackers.len()
    }

    /// Instruction drawn by the next rendered frame.
    #[must_use]
    pub fn instruction(&self) -> Option<&RenderInstruction> {
        self.instruction.as_ref()
    }

    /// Creates device state for a pooled renderer.
    pub fn add_renderer(&mut self, key: PoolKey) {
        let Some(desc) = self.renderers.with(key, |renderer| *renderer.desc()) else {
            tracing::warn!(key = key.raw(), "add_renderer for a key that is not in the pool");
            return;
        };
        match self.backend.create_renderer(&desc) {
            Ok(handle) => {
                self.renderers
                    .with_mut(key, |renderer| renderer.set_handle(Some(handle)));
            }
            Err(error) => report(&mut self.stats, "create_renderer", &error),
        }
    }

    /// Releases a renderer's device state and frees it from the pool.
    pub fn remove_renderer(&mut self, key: PoolKey) {
        let Some(renderer) = self.renderers.free_thread_safe(key) else {
            tracing::warn!(key = key.raw(), "remove_renderer for a key that is not in the pool");
            return;
        };
        if let Some(handle) = renderer.handle() {
            if let Err(error) = self.backend.destroy_renderer(handle) {
                report(&mut self.stats, "destroy_renderer", &error);
            }
        }
    }

    /// Starts watching `tracker`; it syncs after the next presented frame.
    pub fn add_tracker(&mut self, tracker: RenderTracker) {
        self.trackers.push(tracker);
    }

    /// Stops watching `tracker` without syncing it.
    pub fn remove_tracker(&mut self, tracker: &RenderTracker) {
        self.trackers.retain(|watched| !watched.same_as(tracker));
    }

    /// Registers a texture. It stays pending until uploaded.
    pub fn add_texture(&mut self, resource: Arc<TextureResource>) {
        self.textures.insert(
            resource.id(),
            TextureEntry {
                resource,
                handle: None,
            },
        );
    }

    /// Uploads pixel data, replacing any earlier upload.
    pub fn upload_texture(&mut self, id: TextureId, data: &TextureData) {
        let Some(entry) = self.textures.get_mut(&id) else {
            tracing::warn!(texture = id.0, "upload for an unregistered texture");
            return;
        };
        if let Some(previous) = entry.handle.take() {
            if let Err(error) = self.backend.destroy_texture(previous) {
                report(&mut self.stats, "destroy_texture", &error);
            }
        }
        match self.backend.upload_texture(data) {
            Ok(handle) => {
                entry.handle = Some(handle);
                entry.resource.set_state(TextureState::Ready);
            }
            Err(error) => {
                entry.resource.set_state(TextureState::Failed);
                report(&mut self.stats, "upload_texture", &error);
            }
        }
    }

    /// Unregisters a texture and releases its device state.
    pub fn remove_texture(&mut self, id: TextureId) {
        let Some(entry) = self.textures.remove(&id) else {
            return;
        };
        if let Some(handle) = entry.handle {
            if let Err(error) = self.backend.destroy_texture(handle) {
                report(&mut self.stats, "destroy_texture", &error);
            }
        }
    }

    /// Replaces the instruction to draw.
    pub fn set_instruction(&mut self, instruction: RenderInstruction) {
        self.instruction = Some(instruction);
    }

    /// Processes a batch's messages, then draws if the batch asks for it.
    pub fn render(&mut self, batch: &mut RenderBatch) -> FrameResult {
        let messages = batch.messages.process_all(self, batch.buffer_index);
        self.stats.messages_processed += messages as u64;

        if !batch.render_required {
            self.stats.frames_skipped += 1;
            tracing::trace!(frame = batch.frame, messages, "render skipped");
            return FrameResult {
                frame: batch.frame,
                messages,
                draw_calls: 0,
                rendered: false,
            };
        }

        let draw_calls = self.draw_frame(batch.frame);
        FrameResult {
            frame: batch.frame,
            messages,
            draw_calls,
            rendered: true,
        }
    }

    fn draw_frame(&mut self, frame: u64) -> usize {
        let Some(instruction) = self.instruction.take() else {
            self.present(frame);
            return 0;
        };

        self.resolve(&instruction);
        if !instruction.lights.is_empty() {
            if let Err(error) = self.backend.set_lights(&instruction.lights) {
                report(&mut self.stats, "set_lights", &error);
            }
        }

        let view = instruction.view_matrix();
        let mut draw_calls = 0;
        for draw in &self.draw_list {
            let mut state_ok = true;
            for capability in Capability::ALL {
                let enabled = draw.desc.capability(capability);
                if let Err(error) = self.state_cache.set(self.backend.as_mut(), capability, enabled) {
                    report(&mut self.stats, "set_capability", &error);
                    state_ok = false;
                }
            }
            if !state_ok {
                continue;
            }
            let command = DrawCommand {
                renderer: draw.renderer,
                texture: draw.texture,
                uniforms: ItemUniforms {
                    model_view: view * draw.item.world_matrix,
                    color: draw.item.color,
                },
            };
            match self.backend.draw(&command) {
                Ok(()) => draw_calls += 1,
                Err(error) => report(&mut self.stats, "draw", &error),
            }
        }
        self.stats.draw_calls += draw_calls as u64;
        self.instruction = Some(instruction);
        self.present(frame);
        draw_calls
    }

    /// Resolves renderer and texture handles into the draw list, holding the
    /// pool lock once for the whole frame.
    fn resolve(&mut self, instruction: &RenderInstruction) {
        self.draw_list.clear();
        let pool = self.renderers.lock();
        for item in &instruction.items {
            let Some((renderer, desc)) = pool
                .get(item.renderer)
                .and_then(|renderer| renderer.handle().map(|handle| (handle, *renderer.desc())))
            else {
                self.stats.items_skipped += 1;
                continue;
            };
            let texture = match item.texture {
                None => None,
                Some(id) => match self.textures.get(&id).and_then(|entry| entry.handle) {
                    Some(handle) => Some(handle),
                    None => {
                        tracing::trace!(texture = id.0, "item skipped, texture not uploaded");
                        self.stats.items_skipped += 1;
                        continue;
                    }
                },
            };
            self.draw_list.push(ResolvedDraw {
                renderer,
                desc,
                texture,
                item: *item,
            });
        }
    }

    fn present(&mut self, frame: u64) {
        match self.backend.present(frame) {
            Ok(()) => {
                self.stats.frames_rendered += 1;
                for tracker in self.trackers.drain(..) {
                    tracker.mark_synced();
                }
            }
            Err(error) => report(&mut self.stats, "present", &error),
        }
    }
}

fn report(stats: &mut RenderStats, operation: &'static str, error: &BackendError) {
    stats.backend_errors += 1;
    tracing::error!(operation, %error, "graphics backend call failed");
}
