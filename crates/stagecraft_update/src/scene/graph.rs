//! # Scene Graph Context
//!
//! The update thread's view of the scene. Producer messages run against it
//! during the drain phase; the frame driver then runs the animate,
//! constrain and world phases on it.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crossbeam_channel::Sender;
use stagecraft_core::{
    BufferIndex, FixedSizePool, PoolConfig, PoolKey, PropertyValue, ThreadSafePool,
};
use stagecraft_render::{
    CameraItem, LightItem, RenderInstruction, RenderItem, RenderQueue, RenderRenderer,
    RenderTracker, TextureData, TextureId, TextureResource, TextureState,
};
use stagecraft_shared::math::Vec4;

use super::{Attachment, AttachmentDesc, Node, NodeDesc, NodeId, NodeStore, PropertyIndex, WorldValue};
use crate::animation::{Animation, AnimationId, AnimationInstance, AnimationState};
use crate::constraint::{ConstraintId, ConstraintInstance, ConstraintState};

/// Events reported back to the producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Notification {
    /// The animation played its last loop or was stopped.
    AnimationFinished(AnimationId),
    /// The constraint is gone and its id will not be reported again.
    ConstraintRemoved(ConstraintId),
}

/// The update thread's scene state and message target.
pub struct SceneGraph {
    nodes: NodeStore,
    roots: Vec<NodeId>,
    /// Depth-first order of the last world pass.
    draw_order: Vec<NodeId>,
    constraints: FixedSizePool<ConstraintInstance>,
    constraint_keys: HashMap<ConstraintId, PoolKey>,
    /// Evaluation order.
    constraint_order: Vec<PoolKey>,
    animations: BTreeMap<AnimationId, AnimationInstance>,
    render_queue: RenderQueue,
    renderer_pool: Arc<ThreadSafePool<RenderRenderer>>,
    textures: HashMap<TextureId, Arc<TextureResource>>,
    trackers: Vec<RenderTracker>,
    notifications: Sender<Notification>,
    keep_rendering: f32,
    scratch: Vec<PropertyValue>,
}

impl SceneGraph {
    pub(crate) fn new(
        pool: PoolConfig,
        render_queue_bytes: usize,
        renderer_pool: Arc<ThreadSafePool<RenderRenderer>>,
        notifications: Sender<Notification>,
    ) -> Self {
        Self {
            nodes: NodeStore::new(pool),
            roots: Vec::new(),
            draw_order: Vec::new(),
            constraints: FixedSizePool::new(pool),
            constraint_keys: HashMap::new(),
            constraint_order: Vec::new(),
            animations: BTreeMap::new(),
            render_queue: RenderQueue::new(render_queue_bytes),
            renderer_pool,
            textures: HashMap::new(),
            trackers: Vec::new(),
            notifications,
            keep_rendering: 0.0,
            scratch: Vec::new(),
        }
    }

    // =========================================================================
    // QUERIES
    // =========================================================================

    /// Live nodes.
    #[must_use]
    pub const fn nodes(&self) -> &NodeStore {
        &self.nodes
    }

    /// Node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Parentless nodes in connection order.
    #[must_use]
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    /// Live constraints, including those still being removed.
    #[must_use]
    pub fn constraint_count(&self) -> usize {
        self.constraints.len()
    }

    /// State of a live constraint.
    #[must_use]
    pub fn constraint_state(&self, id: ConstraintId) -> Option<ConstraintState> {
        let key = self.constraint_keys.get(&id)?;
        self.constraints.get(*key).map(ConstraintInstance::state)
    }

    /// Playback state of an animation.
    #[must_use]
    pub fn animation_state(&self, id: AnimationId) -> Option<AnimationState> {
        self.animations.get(&id).map(AnimationInstance::state)
    }

    /// Shared renderer storage.
    #[must_use]
    pub fn renderer_pool(&self) -> &Arc<ThreadSafePool<RenderRenderer>> {
        &self.renderer_pool
    }

    pub(crate) fn render_queue(&mut self) -> &mut RenderQueue {
        &mut self.render_queue
    }

    pub(crate) fn animations_running(&self) -> bool {
        self.animations
            .values()
            .any(|a| a.state() == AnimationState::Playing)
    }

    pub(crate) fn constraints_transitioning(&self) -> bool {
        self.constraints
            .iter()
            .any(|(_, c)| c.is_transitioning())
    }

    /// Drops synced trackers; `true` while any remain.
    pub(crate) fn trackers_pending(&mut self) -> bool {
        self.trackers.retain(|t| !t.is_synced());
        !self.trackers.is_empty()
    }

    pub(crate) fn textures_pending(&self) -> bool {
        self.textures
            .values()
            .any(|t| t.state() == TextureState::Pending)
    }

    /// Counts down the keep-rendering timer; `true` while it runs.
    pub(crate) fn tick_keep_rendering(&mut self, elapsed_seconds: f32) -> bool {
        if self.keep_rendering <= 0.0 {
            return false;
        }
        self.keep_rendering -= elapsed_seconds;
        true
    }

    fn notify(&self, notification: Notification) {
        // The producer may have gone; notifications are then dropped.
        let _ = self.notifications.send(notification);
    }

    // =========================================================================
    // MESSAGE TARGETS
    // =========================================================================

    pub(crate) fn add_node(&mut self, id: NodeId, desc: NodeDesc) {
        self.nodes.insert(Node::new(id, desc));
        self.roots.push(id);
        tracing::debug!(node = id.0, "node added");
    }

    /// Destroys `id` and its descendants.
    pub(crate) fn destroy_node(&mut self, buffer: BufferIndex, id: NodeId) {
        if !self.nodes.contains(id) {
            tracing::warn!(node = id.0, "destroy for unknown node");
            return;
        }
        self.detach(id);

        let mut pending = vec![id];
        while let Some(current) = pending.pop() {
            let Some(node) = self.nodes.remove(current) else {
                continue;
            };
            pending.extend_from_slice(node.children());
            if let Some(Attachment::Renderable { renderer, .. }) = node.attachment() {
                self.render_queue.remove_renderer(buffer, renderer);
            }
            let owned: Vec<ConstraintId> = self
                .constraint_order
                .iter()
                .filter_map(|key| self.constraints.get(*key))
                .filter(|c| c.owner() == current)
                .map(ConstraintInstance::id)
                .collect();
            for constraint in owned {
                self.remove_constraint(buffer, constraint, true);
            }
            tracing::debug!(node = current.0, "node destroyed");
        }
    }

    fn detach(&mut self, child: NodeId) {
        let parent = self.nodes.get_mut(child).and_then(|n| n.parent.take());
        match parent.and_then(|p| self.nodes.get_mut(p)) {
            Some(parent) => parent.children.retain(|c| *c != child),
            None => self.roots.retain(|r| *r != child),
        }
    }

    fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        while let Some(parent) = self.nodes.get(node).and_then(Node::parent) {
            if parent == ancestor {
                return true;
            }
            node = parent;
        }
        false
    }

    pub(crate) fn connect(&mut self, parent: NodeId, child: NodeId) {
        if !self.nodes.contains(parent) || !self.nodes.contains(child) {
            tracing::warn!(parent = parent.0, child = child.0, "connect for unknown node");
            return;
        }
        if parent == child || self.is_ancestor(child, parent) {
            tracing::warn!(parent = parent.0, child = child.0, "connect would create a cycle");
            return;
        }
        self.detach(child);
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
    }

    pub(crate) fn disconnect(&mut self, child: NodeId) {
        if !self.nodes.contains(child) {
            tracing::warn!(node = child.0, "disconnect for unknown node");
            return;
        }
        self.detach(child);
        self.roots.push(child);
    }

    pub(crate) fn write_property(
        &mut self,
        buffer: BufferIndex,
        id: NodeId,
        index: PropertyIndex,
        value: PropertyValue,
        bake: bool,
    ) {
        let Some(property) = self.nodes.get_mut(id).and_then(|n| n.property_mut(index)) else {
            tracing::warn!(node = id.0, index = index.0, "write to unknown property");
            return;
        };
        let written = if bake {
            property.bake_value(buffer, value)
        } else {
            property.set_value(buffer, value)
        };
        if let Err(error) = written {
            tracing::warn!(node = id.0, index = index.0, %error, "property write rejected");
        }
    }

    pub(crate) fn register_property(&mut self, id: NodeId, initial: PropertyValue) {
        match self.nodes.get_mut(id) {
            Some(node) => {
                node.register_property(initial);
            }
            None => tracing::warn!(node = id.0, "property registration for unknown node"),
        }
    }

    pub(crate) fn set_attachment(&mut self, buffer: BufferIndex, id: NodeId, desc: AttachmentDesc) {
        if !self.nodes.contains(id) {
            tracing::warn!(node = id.0, "attachment for unknown node");
            return;
        }
        self.clear_attachment(buffer, id);
        let attachment = match desc {
            AttachmentDesc::Renderable {
                desc,
                texture,
                depth_index,
            } => {
                let renderer = self
                    .renderer_pool
                    .allocate_thread_safe(RenderRenderer::new(desc));
                self.render_queue.add_renderer(buffer, renderer);
                Attachment::Renderable {
                    renderer,
                    texture,
                    depth_index,
                }
            }
            AttachmentDesc::Camera => Attachment::Camera,
            AttachmentDesc::Light => Attachment::Light,
        };
        if let Some(node) = self.nodes.get_mut(id) {
            node.attachment = Some(attachment);
        }
    }

    pub(crate) fn clear_attachment(&mut self, buffer: BufferIndex, id: NodeId) {
        let previous = self.nodes.get_mut(id).and_then(|n| n.attachment.take());
        if let Some(Attachment::Renderable { renderer, .. }) = previous {
            self.render_queue.remove_renderer(buffer, renderer);
        }
    }

    pub(crate) fn add_texture(&mut self, buffer: BufferIndex, resource: Arc<TextureResource>) {
        self.textures.insert(resource.id(), Arc::clone(&resource));
        self.render_queue.add_texture(buffer, resource);
    }

    pub(crate) fn upload_texture(&mut self, buffer: BufferIndex, id: TextureId, data: TextureData) {
        self.render_queue.upload_texture(buffer, id, data);
    }

    pub(crate) fn remove_texture(&mut self, buffer: BufferIndex, id: TextureId) {
        self.textures.remove(&id);
        self.render_queue.remove_texture(buffer, id);
    }

    pub(crate) fn add_tracker(&mut self, buffer: BufferIndex, tracker: RenderTracker) {
        self.trackers.push(tracker.clone());
        self.render_queue.add_tracker(buffer, tracker);
    }

    pub(crate) fn add_constraint(&mut self, buffer: BufferIndex, mut constraint: ConstraintInstance) {
        let id = constraint.id();
        if !self.nodes.contains(constraint.owner()) {
            tracing::warn!(constraint = id.0, "constraint owner is gone, dropped");
            self.notify(Notification::ConstraintRemoved(id));
            return;
        }
        tracing::debug!(constraint = id.0, tag = constraint.tag().raw(), "constraint added");
        constraint.activate(buffer);
        let key = self.constraints.allocate(constraint);
        self.constraint_keys.insert(id, key);
        self.constraint_order.push(key);
    }

    /// Removes a constraint, immediately or after its remove duration.
    pub(crate) fn remove_constraint(&mut self, buffer: BufferIndex, id: ConstraintId, immediate: bool) {
        let Some(key) = self.constraint_keys.get(&id).copied() else {
            return;
        };
        let finish = self
            .constraints
            .get_mut(key)
            .is_some_and(|c| c.begin_removal(buffer, immediate));
        if finish {
            self.finish_constraint(buffer, key);
        }
    }

    fn finish_constraint(&mut self, buffer: BufferIndex, key: PoolKey) {
        let Some(mut constraint) = self.constraints.free(key) else {
            return;
        };
        constraint.finish(&mut self.nodes, buffer);
        self.constraint_keys.remove(&constraint.id());
        self.constraint_order.retain(|k| *k != key);
        self.notify(Notification::ConstraintRemoved(constraint.id()));
    }

    pub(crate) fn add_animation(&mut self, id: AnimationId, animation: Animation) {
        self.animations
            .insert(id, AnimationInstance::new(id, animation));
    }

    pub(crate) fn play_animation(&mut self, id: AnimationId) {
        if let Some(animation) = self.animations.get_mut(&id) {
            animation.play();
        }
    }

    pub(crate) fn pause_animation(&mut self, id: AnimationId) {
        if let Some(animation) = self.animations.get_mut(&id) {
            animation.pause();
        }
    }

    pub(crate) fn stop_animation(&mut self, buffer: BufferIndex, id: AnimationId) {
        let Some(animation) = self.animations.get_mut(&id) else {
            return;
        };
        if animation.stop(&mut self.nodes, buffer) {
            self.notify(Notification::AnimationFinished(id));
        }
    }

    pub(crate) fn destroy_animation(&mut self, buffer: BufferIndex, id: AnimationId) {
        if let Some(mut animation) = self.animations.remove(&id) {
            animation.stop(&mut self.nodes, buffer);
            animation.destroy();
            tracing::debug!(animation = id.0, "animation destroyed");
        }
    }

    pub(crate) fn keep_rendering(&mut self, seconds: f32) {
        self.keep_rendering = self.keep_rendering.max(seconds);
    }

    // =========================================================================
    // FRAME PHASES
    // =========================================================================

    /// Writes base values into `buffer` for every dirty property.
    pub(crate) fn reset_properties(&mut self, buffer: BufferIndex) {
        self.nodes.for_each_mut(|node| node.reset_to_base_value(buffer));
    }

    /// Advances animations and constraint weights.
    pub(crate) fn animate(&mut self, buffer: BufferIndex, elapsed_seconds: f32) {
        for animation in self.animations.values_mut() {
            if animation.update(&mut self.nodes, buffer, elapsed_seconds) {
                tracing::debug!(animation = animation.id().0, "animation finished");
                // The producer may have gone; notifications are then dropped.
                let _ = self
                    .notifications
                    .send(Notification::AnimationFinished(animation.id()));
            }
        }

        let mut finished = Vec::new();
        for key in &self.constraint_order {
            if let Some(constraint) = self.constraints.get_mut(*key) {
                if constraint.animate_weight(buffer, elapsed_seconds) {
                    finished.push(*key);
                }
            }
        }
        for key in finished {
            self.finish_constraint(buffer, key);
        }
    }

    /// Evaluates constraints in insertion order. Returns how many ran.
    pub(crate) fn apply_constraints(&mut self, buffer: BufferIndex) -> usize {
        let mut applied = 0;
        for key in &self.constraint_order {
            if let Some(constraint) = self.constraints.get_mut(*key) {
                if constraint.apply(&mut self.nodes, buffer, &mut self.scratch) {
                    applied += 1;
                }
            }
        }
        applied
    }

    /// Derives world values depth-first from the roots.
    pub(crate) fn update_world(&mut self, buffer: BufferIndex) {
        self.draw_order.clear();
        let mut stack: Vec<(NodeId, WorldValue)> = self
            .roots
            .iter()
            .rev()
            .map(|root| (*root, WorldValue::ROOT))
            .collect();
        while let Some((id, parent)) = stack.pop() {
            let Some(node) = self.nodes.get_mut(id) else {
                continue;
            };
            let world = parent.child(&node.local_value(buffer));
            node.set_world(buffer, &world);
            self.draw_order.push(id);
            stack.extend(node.children().iter().rev().map(|child| (*child, world)));
        }
    }

    /// Applies pending bakes now that `new_write_index` is the update buffer.
    pub(crate) fn on_swap(&mut self, new_write_index: BufferIndex) {
        self.nodes.for_each_mut(|node| node.on_swap(new_write_index));
        for key in &self.constraint_order {
            if let Some(constraint) = self.constraints.get_mut(*key) {
                constraint.on_swap(new_write_index);
            }
        }
    }

    /// Builds what the render thread draws from buffer `read`.
    pub(crate) fn build_instruction(&self, frame: u64, read: BufferIndex) -> RenderInstruction {
        let mut instruction = RenderInstruction::new(frame);
        for id in &self.draw_order {
            let Some(node) = self.nodes.get(*id) else {
                continue;
            };
            let Some(attachment) = node.attachment() else {
                continue;
            };
            let world = node.world(read);
            match attachment {
                Attachment::Renderable {
                    renderer,
                    texture,
                    depth_index,
                } => {
                    if !world.visible {
                        continue;
                    }
                    if let Some(texture) = texture {
                        let ready = self.textures.get(&texture).is_some_and(|t| t.is_ready());
                        if !ready {
                            tracing::warn!(node = id.0, texture = texture.0, "texture not ready, item skipped");
                            continue;
                        }
                    }
                    instruction.items.push(RenderItem {
                        renderer,
                        texture,
                        world_matrix: world.matrix,
                        color: world.color,
                        depth_index,
                    });
                }
                Attachment::Camera => {
                    if instruction.camera.is_none() {
                        instruction.camera = Some(CameraItem {
                            world_position: world.position,
                            world_orientation: world.orientation,
                        });
                    }
                }
                Attachment::Light => instruction.lights.push(LightItem {
                    position: Vec4::new(world.position.x, world.position.y, world.position.z, 1.0),
                    color: world.color,
                }),
            }
        }
        instruction.sort_items();
        instruction
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::{Constraint, PropertyInputs, Source};
    use stagecraft_render::RendererDesc;
    use stagecraft_shared::math::Vec3;

    const UPDATE: BufferIndex = BufferIndex::ZERO;

    fn scene() -> (SceneGraph, crossbeam_channel::Receiver<Notification>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        let pool = Arc::new(ThreadSafePool::new(PoolConfig::default()));
        (SceneGraph::new(PoolConfig::default(), 256, pool, tx), rx)
    }

    fn at(x: f32) -> NodeDesc {
        NodeDesc::new().with_position(Vec3::new(x, 0.0, 0.0))
    }

    fn world_x(scene: &SceneGraph, id: u32) -> f32 {
        scene.node(NodeId(id)).unwrap().world(UPDATE).position.x
    }

    #[test]
    fn test_world_follows_hierarchy() {
        let (mut scene, _rx) = scene();
        scene.add_node(NodeId(1), at(10.0));
        scene.add_node(NodeId(2), at(1.0));
        scene.add_node(NodeId(3), at(0.5));
        scene.connect(NodeId(1), NodeId(2));
        scene.connect(NodeId(2), NodeId(3));
        assert_eq!(scene.roots(), &[NodeId(1)]);

        scene.update_world(UPDATE);
        assert_eq!(world_x(&scene, 2), 11.0);
        assert_eq!(world_x(&scene, 3), 11.5);
        assert_eq!(scene.draw_order, vec![NodeId(1), NodeId(2), NodeId(3)]);

        scene.disconnect(NodeId(2));
        scene.update_world(UPDATE);
        assert_eq!(world_x(&scene, 3), 1.5);
    }

    #[test]
    fn test_cycles_are_refused() {
        let (mut scene, _rx) = scene();
        scene.add_node(NodeId(1), at(0.0));
        scene.add_node(NodeId(2), at(0.0));
        scene.connect(NodeId(1), NodeId(2));
        scene.connect(NodeId(2), NodeId(1));
        assert_eq!(scene.node(NodeId(1)).unwrap().parent(), None);
        assert_eq!(scene.node(NodeId(2)).unwrap().parent(), Some(NodeId(1)));
    }

    #[test]
    fn test_destroy_removes_subtree_and_owned_constraints() {
        let (mut scene, rx) = scene();
        scene.add_node(NodeId(1), at(0.0));
        scene.add_node(NodeId(2), at(0.0));
        scene.connect(NodeId(1), NodeId(2));
        let constraint = Constraint::new(PropertyIndex::POSITION, |_: &mut Vec3, _: &PropertyInputs<'_>| {})
            .with_remove_duration(5.0)
            .into_instance(ConstraintId(7), NodeId(2));
        scene.add_constraint(UPDATE, constraint);
        assert_eq!(scene.constraint_count(), 1);

        scene.destroy_node(UPDATE, NodeId(1));
        assert!(scene.nodes().is_empty());
        assert!(scene.roots().is_empty());
        assert_eq!(scene.constraint_count(), 0);
        assert_eq!(
            rx.try_recv(),
            Ok(Notification::ConstraintRemoved(ConstraintId(7)))
        );
    }

    #[test]
    fn test_renderable_allocates_and_releases_renderer() {
        let (mut scene, _rx) = scene();
        scene.add_node(NodeId(1), at(0.0));
        scene.set_attachment(
            UPDATE,
            NodeId(1),
            AttachmentDesc::Renderable {
                desc: RendererDesc::default(),
                texture: None,
                depth_index: 0,
            },
        );
        assert_eq!(scene.renderer_pool().len(), 1);
        assert_eq!(scene.render_queue().pending(UPDATE), 1);

        scene.clear_attachment(UPDATE, NodeId(1));
        assert_eq!(scene.render_queue().pending(UPDATE), 2);
        assert!(scene.node(NodeId(1)).unwrap().attachment().is_none());
    }

    #[test]
    fn test_instruction_skips_pending_textures_and_hidden_nodes() {
        let (mut scene, _rx) = scene();
        let texture = TextureResource::new(TextureId(3));
        scene.add_texture(UPDATE, Arc::clone(&texture));
        for (id, texture, visible) in [
            (1, None, true),
            (2, Some(TextureId(3)), true),
            (3, None, false),
        ] {
            scene.add_node(NodeId(id), at(0.0).with_visible(visible));
            scene.set_attachment(
                UPDATE,
                NodeId(id),
                AttachmentDesc::Renderable {
                    desc: RendererDesc::default(),
                    texture,
                    depth_index: 0,
                },
            );
        }
        scene.add_node(NodeId(4), at(2.0));
        scene.set_attachment(UPDATE, NodeId(4), AttachmentDesc::Camera);
        scene.update_world(UPDATE);

        assert!(scene.textures_pending());
        let instruction = scene.build_instruction(1, UPDATE);
        assert_eq!(instruction.items.len(), 1);
        assert_eq!(
            instruction.camera.map(|c| c.world_position),
            Some(Vec3::new(2.0, 0.0, 0.0))
        );
    }

    #[test]
    fn test_constraint_on_unknown_owner_is_reported_removed() {
        let (mut scene, rx) = scene();
        let constraint = Constraint::new(PropertyIndex::POSITION, |_: &mut Vec3, _: &PropertyInputs<'_>| {})
            .with_source(Source::Local(PropertyIndex::SCALE))
            .into_instance(ConstraintId(1), NodeId(9));
        scene.add_constraint(UPDATE, constraint);
        assert_eq!(scene.constraint_count(), 0);
        assert_eq!(
            rx.try_recv(),
            Ok(Notification::ConstraintRemoved(ConstraintId(1)))
        );
    }
}
