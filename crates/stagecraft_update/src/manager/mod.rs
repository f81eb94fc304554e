//! # Frame Driver
//!
//! One call to [`UpdateManager::update`] produces one frame:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │ 0. RESET      dirty properties back to base (update index)     │
//! │ 1. DRAIN      producer batches, FIFO                           │
//! │ 2. ANIMATE    animations + constraint weights      ┐           │
//! │ 3. CONSTRAIN  constraints in insertion order       ├ skipped   │
//! │ 4. DERIVE     world values, depth-first from roots ┘ when idle │
//! │ 5. SWAP       flip buffers, apply pending bakes                │
//! │ 6. EMIT       instruction + resources for the read index       │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The swap happens every frame. A frame with nothing to show still sends
//! a batch, flagged `render_required = false`, so resource messages keep
//! flowing.

mod stats;

pub use stats::FrameStats;

use std::sync::Arc;
use std::time::Instant;

use bitflags::bitflags;
use stagecraft_core::{
    message_queue, BufferIndex, MessageConsumer, PropertyValue, SceneGraphBuffers, ThreadSafePool,
};
use stagecraft_render::{
    render_channel, GraphicsBackend, RenderDispatcher, RenderManager, RenderReceiver,
};

use crate::config::CoreConfig;
use crate::controller::SceneController;
use crate::error::ConfigResult;
use crate::scene::{NodeId, PropertyIndex, SceneGraph, WorldValue};

bitflags! {
    /// Reasons the caller should schedule another update soon.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct KeepUpdating: u32 {
        /// A keep-rendering request has time left.
        const STAGE_KEEP_RENDERING = 1;
        /// An animation plays or a constraint weight is moving.
        const ANIMATIONS_RUNNING = 2;
        /// A tracker or texture waits on the render thread.
        const RENDER_TASK_SYNC = 4;
    }
}

/// Outcome of one [`UpdateManager::update`] call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateStatus {
    /// Frame number, starting at 1.
    pub frame: u64,
    /// Producer messages run this frame.
    pub messages_processed: usize,
    /// Whether the animate, constrain and derive phases ran.
    pub scene_updated: bool,
    /// Whether the render thread was asked to draw.
    pub rendered: bool,
    /// Why another update is needed, empty when idle.
    pub keep_updating: KeepUpdating,
}

/// Owns the scene on the update thread and drives it frame by frame.
pub struct UpdateManager {
    scene: SceneGraph,
    consumer: MessageConsumer<SceneGraph>,
    buffers: SceneGraphBuffers,
    dispatcher: RenderDispatcher,
    stats: FrameStats,
    frame: u64,
    /// Frames still to run after the last change, one per buffer.
    settle_frames: u8,
    /// The last frame waited on the render thread.
    sync_pending: bool,
}

/// A change is written to both buffers before the scene is idle again.
const SETTLE_FRAMES: u8 = 2;

impl UpdateManager {
    fn new(
        scene: SceneGraph,
        consumer: MessageConsumer<SceneGraph>,
        dispatcher: RenderDispatcher,
        stats_window: usize,
    ) -> Self {
        Self {
            scene,
            consumer,
            buffers: SceneGraphBuffers::new(),
            dispatcher,
            stats: FrameStats::new(stats_window),
            frame: 0,
            settle_frames: 0,
            sync_pending: false,
        }
    }

    /// Runs one frame. `elapsed_seconds` advances animations and timers.
    pub fn update(&mut self, elapsed_seconds: f32) -> UpdateStatus {
        let started = Instant::now();
        self.frame += 1;
        let frame = self.frame;
        let update_index = self.buffers.update_index();

        let running =
            self.scene.animations_running() || self.scene.constraints_transitioning();
        let requested = self.consumer.is_scene_update_required() || running;

        let settling = self.settle_frames > 0;
        if requested || settling {
            self.scene.reset_properties(update_index);
        }

        let drained = self.consumer.process_messages(&mut self.scene, update_index);

        let scene_changed = requested
            || drained.scene_update
            || self.scene.animations_running()
            || self.scene.constraints_transitioning();
        let scene_updated = scene_changed || settling;
        if scene_updated {
            self.scene.animate(update_index, elapsed_seconds);
            let constraints = self.scene.apply_constraints(update_index);
            self.scene.update_world(update_index);
            tracing::trace!(frame, constraints, "scene updated");
        }

        let new_update_index = self.buffers.swap();
        self.scene.on_swap(new_update_index);
        let read_index = update_index;

        let mut keep_updating = KeepUpdating::empty();
        if self.scene.tick_keep_rendering(elapsed_seconds) {
            keep_updating |= KeepUpdating::STAGE_KEEP_RENDERING;
        }
        if self.scene.animations_running() || self.scene.constraints_transitioning() {
            keep_updating |= KeepUpdating::ANIMATIONS_RUNNING;
        }
        if self.scene.trackers_pending() || self.scene.textures_pending() {
            keep_updating |= KeepUpdating::RENDER_TASK_SYNC;
        }

        // One more frame after a sync wait, so newly ready textures are drawn.
        let rendered = scene_updated || !keep_updating.is_empty() || self.sync_pending;
        self.sync_pending = keep_updating.contains(KeepUpdating::RENDER_TASK_SYNC);
        if rendered {
            let instruction = self.scene.build_instruction(frame, read_index);
            self.scene
                .render_queue()
                .set_instruction(read_index, instruction);
        }
        if !self
            .dispatcher
            .dispatch(self.scene.render_queue(), frame, read_index, rendered)
        {
            tracing::warn!(frame, "render side is gone");
        }

        self.settle_frames = if scene_changed {
            SETTLE_FRAMES
        } else {
            self.settle_frames.saturating_sub(1)
        };
        let duration = started.elapsed();
        self.stats.record(duration);
        tracing::trace!(
            frame,
            messages = drained.messages,
            scene_updated,
            rendered,
            ?duration,
            "update frame"
        );

        UpdateStatus {
            frame,
            messages_processed: drained.messages,
            scene_updated,
            rendered,
            keep_updating,
        }
    }

    /// Frames run so far.
    #[must_use]
    pub const fn frame(&self) -> u64 {
        self.frame
    }

    /// The scene as the update thread sees it.
    #[must_use]
    pub const fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Recent update durations.
    #[must_use]
    pub const fn stats(&self) -> &FrameStats {
        &self.stats
    }

    /// Buffer the next frame writes.
    #[must_use]
    pub const fn update_index(&self) -> BufferIndex {
        self.buffers.update_index()
    }

    /// Buffer holding the last completed frame.
    #[must_use]
    pub const fn render_index(&self) -> BufferIndex {
        self.buffers.render_index()
    }

    /// A property as of the last completed frame.
    #[must_use]
    pub fn property_value(&self, node: NodeId, index: PropertyIndex) -> Option<PropertyValue> {
        self.scene.node(node)?.value(index, self.render_index())
    }

    /// World state as of the last completed frame.
    #[must_use]
    pub fn world_value(&self, node: NodeId) -> Option<WorldValue> {
        self.scene.node(node).map(|n| n.world(self.render_index()))
    }
}

/// A wired producer, update driver and render manager.
///
/// ```text
/// controller ──messages──▶ update ──batches──▶ receiver ──▶ render
/// ```
pub struct Stage {
    /// Producer side.
    pub controller: SceneController,
    /// Update-thread driver.
    pub update: UpdateManager,
    /// Render-thread context; hand it to `RenderThread::spawn`.
    pub render: RenderManager,
    /// Batches for `render`.
    pub receiver: RenderReceiver,
}

impl Stage {
    /// Wires all three sides from one configuration.
    ///
    /// # Errors
    ///
    /// [`crate::ConfigError::Invalid`] if `config` fails validation.
    pub fn new(config: &CoreConfig, backend: impl GraphicsBackend + 'static) -> ConfigResult<Self> {
        config.validate()?;

        let renderers = Arc::new(ThreadSafePool::new(config.pool_config()));
        let (producer, consumer) = message_queue::<SceneGraph>(config.queue_config());
        let (notify_tx, notify_rx) = crossbeam_channel::unbounded();
        let (dispatcher, receiver) = render_channel(config.render_config());

        let mut scene = SceneGraph::new(
            config.pool_config(),
            config.queue.initial_capacity_bytes,
            Arc::clone(&renderers),
            notify_tx,
        );
        scene.keep_rendering(config.frame.keep_rendering_seconds);

        tracing::debug!(?config, "stage created");
        Ok(Self {
            controller: SceneController::new(producer, notify_rx),
            update: UpdateManager::new(scene, consumer, dispatcher, config.frame.stats_window),
            render: RenderManager::new(backend, renderers),
            receiver,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::NodeDesc;
    use stagecraft_core::PropertyType;
    use stagecraft_render::RecordingBackend;
    use stagecraft_shared::math::Vec3;

    fn stage() -> Stage {
        Stage::new(&CoreConfig::default(), RecordingBackend::new()).unwrap()
    }

    /// Updates once and renders the batch on this thread.
    fn frame(stage: &mut Stage, elapsed_seconds: f32) -> UpdateStatus {
        let status = stage.update.update(elapsed_seconds);
        let mut batch = stage.receiver.try_recv().expect("one batch per update");
        assert_eq!(batch.frame, status.frame);
        assert_eq!(batch.render_required, status.rendered);
        stage.render.render(&mut batch);
        stage.receiver.recycle(batch.messages);
        status
    }

    #[test]
    fn test_idle_frames_skip_the_scene() {
        let mut stage = stage();
        let status = frame(&mut stage, 0.016);
        assert_eq!(status.frame, 1);
        assert!(!status.scene_updated);
        assert!(!status.rendered);
        assert!(status.keep_updating.is_empty());
    }

    #[test]
    fn test_change_settles_both_buffers_then_idles() {
        let mut stage = stage();
        stage.controller.add_node(NodeDesc::new());
        stage.controller.flush();

        let first = frame(&mut stage, 0.016);
        assert_eq!(first.messages_processed, 1);
        assert!(first.scene_updated && first.rendered);
        assert!(frame(&mut stage, 0.016).scene_updated);
        assert!(frame(&mut stage, 0.016).scene_updated);
        let idle = frame(&mut stage, 0.016);
        assert!(!idle.scene_updated && !idle.rendered);
        assert_eq!(stage.update.stats().frames_recorded(), 4);
    }

    #[test]
    fn test_bake_visible_after_one_update() {
        let mut stage = stage();
        let node = stage.controller.add_node(NodeDesc::new());
        stage
            .controller
            .bake_property(node, PropertyIndex::POSITION, Vec3::new(3.0, 0.0, 0.0).into_value())
            .unwrap();
        stage.controller.flush();
        frame(&mut stage, 0.016);

        let update = stage.update.update_index();
        let render = stage.update.render_index();
        let node = stage.update.scene().node(node).unwrap();
        assert_eq!(
            node.value(PropertyIndex::POSITION, update),
            node.value(PropertyIndex::POSITION, render)
        );
        assert_eq!(
            node.value(PropertyIndex::POSITION, render),
            Some(Vec3::new(3.0, 0.0, 0.0).into_value())
        );
    }

    #[test]
    fn test_keep_rendering_from_config() {
        let mut config = CoreConfig::default();
        config.frame.keep_rendering_seconds = 0.03;
        let mut stage = Stage::new(&config, RecordingBackend::new()).unwrap();
        let status = frame(&mut stage, 0.02);
        assert!(status.rendered);
        assert!(status.keep_updating.contains(KeepUpdating::STAGE_KEEP_RENDERING));
        frame(&mut stage, 0.02);
        let status = frame(&mut stage, 0.02);
        assert!(status.keep_updating.is_empty());
        assert!(!status.rendered);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let mut config = CoreConfig::default();
        config.render.max_frames_in_flight = 0;
        assert!(Stage::new(&config, RecordingBackend::new()).is_err());
    }
}
