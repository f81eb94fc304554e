//! # Scene Controller
//!
//! The producer side of the pipeline. Every operation is validated here,
//! synchronously, and only then packaged as a message for the update
//! thread. Nothing is visible to the update thread until [`SceneController::flush`].
//!
//! ```text
//!  producer                          update thread
//!  SceneController ── flush() ──▶ MessageConsumer<SceneGraph>
//!        ▲                                 │
//!        └──── poll_notifications() ◀──────┘
//! ```
//!
//! The controller keeps its own record of nodes, properties and attached
//! constraints, so it never needs to read scene state across threads. A
//! repeated removal finds nothing in that record and sends no message.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crossbeam_channel::Receiver;
use stagecraft_core::{
    BufferIndex, MessageProducer, PropertyKind, PropertyType, PropertyValue,
};
use stagecraft_render::{RenderTracker, TextureData, TextureId, TextureResource};
use stagecraft_shared::constants::CUSTOM_CONSTRAINT_TAG_END;

use crate::animation::{Animation, AnimationId, AnimatorTarget};
use crate::constraint::{Constraint, ConstraintId, ConstraintTag, Source};
use crate::error::{SceneError, SceneResult};
use crate::scene::{AttachmentDesc, NodeDesc, NodeId, Notification, PropertyIndex, SceneGraph};

#[derive(Debug, Default)]
struct NodeRecord {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    custom: Vec<PropertyKind>,
    constraints: Vec<(ConstraintId, ConstraintTag)>,
}

/// Producer-side handle to the scene.
pub struct SceneController {
    producer: MessageProducer<SceneGraph>,
    notifications: Receiver<Notification>,
    nodes: HashMap<NodeId, NodeRecord>,
    constraint_owners: HashMap<ConstraintId, NodeId>,
    animations: HashSet<AnimationId>,
    textures: HashSet<TextureId>,
    next_node: u32,
    next_constraint: u32,
    next_animation: u32,
    next_texture: u32,
}

impl SceneController {
    pub(crate) fn new(
        producer: MessageProducer<SceneGraph>,
        notifications: Receiver<Notification>,
    ) -> Self {
        Self {
            producer,
            notifications,
            nodes: HashMap::new(),
            constraint_owners: HashMap::new(),
            animations: HashSet::new(),
            textures: HashSet::new(),
            next_node: 1,
            next_constraint: 1,
            next_animation: 1,
            next_texture: 1,
        }
    }

    fn send(
        &mut self,
        update_scene: bool,
        message: impl FnOnce(&mut SceneGraph, BufferIndex) + Send + 'static,
    ) {
        self.producer.reserve_message(message, update_scene);
    }

    fn record(&self, node: NodeId) -> SceneResult<&NodeRecord> {
        self.nodes.get(&node).ok_or(SceneError::UnknownNode(node))
    }

    /// Type of any property of `node`.
    fn property_kind(&self, node: NodeId, index: PropertyIndex) -> SceneResult<PropertyKind> {
        let record = self.record(node)?;
        if let Some(kind) = index.builtin_kind() {
            return Ok(kind);
        }
        let n = (index.0 - PropertyIndex::CUSTOM_START.0) as usize;
        record
            .custom
            .get(n)
            .copied()
            .ok_or(SceneError::UnknownProperty { node, index })
    }

    /// Type of a writable property of `node`.
    fn writable_kind(&self, node: NodeId, index: PropertyIndex) -> SceneResult<PropertyKind> {
        let kind = self.property_kind(node, index)?;
        if index.is_read_only() {
            return Err(SceneError::ReadOnlyProperty(index));
        }
        Ok(kind)
    }

    fn check_value(&self, node: NodeId, index: PropertyIndex, value: PropertyValue) -> SceneResult<()> {
        let expected = self.writable_kind(node, index)?;
        if value.kind() != expected {
            return Err(SceneError::PropertyTypeMismatch {
                expected,
                found: value.kind(),
            });
        }
        Ok(())
    }

    // =========================================================================
    // NODES
    // =========================================================================

    /// Creates a parentless node.
    pub fn add_node(&mut self, desc: NodeDesc) -> NodeId {
        let id = NodeId(self.next_node);
        self.next_node += 1;
        let record = NodeRecord {
            custom: desc.custom.iter().map(PropertyValue::kind).collect(),
            ..NodeRecord::default()
        };
        self.nodes.insert(id, record);
        self.send(true, move |scene: &mut SceneGraph, _: BufferIndex| {
            scene.add_node(id, desc);
        });
        id
    }

    /// Destroys a node and its descendants, with every constraint they own.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`].
    pub fn destroy_node(&mut self, node: NodeId) -> SceneResult<()> {
        let parent = self.record(node)?.parent;
        if let Some(parent) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            parent.children.retain(|c| *c != node);
        }
        let mut pending = vec![node];
        while let Some(current) = pending.pop() {
            if let Some(record) = self.nodes.remove(&current) {
                pending.extend(record.children);
                for (constraint, _) in record.constraints {
                    self.constraint_owners.remove(&constraint);
                }
            }
        }
        self.send(true, move |scene: &mut SceneGraph, buffer: BufferIndex| {
            scene.destroy_node(buffer, node);
        });
        Ok(())
    }

    /// Returns `true` if the node exists.
    #[must_use]
    pub fn contains_node(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    fn is_ancestor(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        while let Some(parent) = self.nodes.get(&node).and_then(|r| r.parent) {
            if parent == ancestor {
                return true;
            }
            node = parent;
        }
        false
    }

    /// Makes `child` the last child of `parent`, detaching it first.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`], or [`SceneError::HierarchyCycle`] if
    /// `child` is `parent` or one of its ancestors.
    pub fn connect(&mut self, parent: NodeId, child: NodeId) -> SceneResult<()> {
        self.record(parent)?;
        self.record(child)?;
        if parent == child || self.is_ancestor(child, parent) {
            return Err(SceneError::HierarchyCycle { parent, child });
        }
        self.detach(child);
        if let Some(record) = self.nodes.get_mut(&child) {
            record.parent = Some(parent);
        }
        if let Some(record) = self.nodes.get_mut(&parent) {
            record.children.push(child);
        }
        self.send(true, move |scene: &mut SceneGraph, _: BufferIndex| {
            scene.connect(parent, child);
        });
        Ok(())
    }

    /// Detaches `child` from its parent, making it a root.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`].
    pub fn disconnect(&mut self, child: NodeId) -> SceneResult<()> {
        self.record(child)?;
        self.detach(child);
        self.send(true, move |scene: &mut SceneGraph, _: BufferIndex| {
            scene.disconnect(child);
        });
        Ok(())
    }

    fn detach(&mut self, child: NodeId) {
        let parent = self.nodes.get_mut(&child).and_then(|r| r.parent.take());
        if let Some(record) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            record.children.retain(|c| *c != child);
        }
    }

    // =========================================================================
    // PROPERTIES
    // =========================================================================

    /// Writes a value for the next frame only. The property returns to its
    /// base value once nothing writes it again.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`], [`SceneError::UnknownProperty`],
    /// [`SceneError::ReadOnlyProperty`] or [`SceneError::PropertyTypeMismatch`].
    pub fn set_property(
        &mut self,
        node: NodeId,
        index: PropertyIndex,
        value: PropertyValue,
    ) -> SceneResult<()> {
        self.check_value(node, index, value)?;
        self.send(true, move |scene: &mut SceneGraph, buffer: BufferIndex| {
            scene.write_property(buffer, node, index, value, false);
        });
        Ok(())
    }

    /// Writes a value permanently.
    ///
    /// # Errors
    ///
    /// As [`SceneController::set_property`].
    pub fn bake_property(
        &mut self,
        node: NodeId,
        index: PropertyIndex,
        value: PropertyValue,
    ) -> SceneResult<()> {
        self.check_value(node, index, value)?;
        self.send(true, move |scene: &mut SceneGraph, buffer: BufferIndex| {
            scene.write_property(buffer, node, index, value, true);
        });
        Ok(())
    }

    /// Adds a custom property to an existing node.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`].
    pub fn register_property(
        &mut self,
        node: NodeId,
        initial: PropertyValue,
    ) -> SceneResult<PropertyIndex> {
        let record = self
            .nodes
            .get_mut(&node)
            .ok_or(SceneError::UnknownNode(node))?;
        let index = PropertyIndex::custom(u32::try_from(record.custom.len()).unwrap_or(u32::MAX));
        record.custom.push(initial.kind());
        self.send(true, move |scene: &mut SceneGraph, _: BufferIndex| {
            scene.register_property(node, initial);
        });
        Ok(index)
    }

    // =========================================================================
    // ATTACHMENTS AND RESOURCES
    // =========================================================================

    /// Replaces the node's attachment.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`], or [`SceneError::UnknownTexture`] for a
    /// renderable naming a texture that was never created.
    pub fn set_attachment(&mut self, node: NodeId, attachment: AttachmentDesc) -> SceneResult<()> {
        self.record(node)?;
        if let AttachmentDesc::Renderable {
            texture: Some(texture),
            ..
        } = attachment
        {
            if !self.textures.contains(&texture) {
                return Err(SceneError::UnknownTexture(texture));
            }
        }
        self.send(true, move |scene: &mut SceneGraph, buffer: BufferIndex| {
            scene.set_attachment(buffer, node, attachment);
        });
        Ok(())
    }

    /// Removes the node's attachment.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`].
    pub fn clear_attachment(&mut self, node: NodeId) -> SceneResult<()> {
        self.record(node)?;
        self.send(true, move |scene: &mut SceneGraph, buffer: BufferIndex| {
            scene.clear_attachment(buffer, node);
        });
        Ok(())
    }

    /// Registers a texture. The returned resource reports when the render
    /// thread has uploaded it.
    pub fn create_texture(&mut self) -> Arc<TextureResource> {
        let id = TextureId(self.next_texture);
        self.next_texture += 1;
        self.textures.insert(id);
        let resource = TextureResource::new(id);
        let shared = Arc::clone(&resource);
        self.send(false, move |scene: &mut SceneGraph, buffer: BufferIndex| {
            scene.add_texture(buffer, shared);
        });
        resource
    }

    /// Uploads pixels for a texture.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownTexture`].
    pub fn upload_texture(&mut self, texture: TextureId, data: TextureData) -> SceneResult<()> {
        if !self.textures.contains(&texture) {
            return Err(SceneError::UnknownTexture(texture));
        }
        self.send(true, move |scene: &mut SceneGraph, buffer: BufferIndex| {
            scene.upload_texture(buffer, texture, data);
        });
        Ok(())
    }

    /// Releases a texture.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownTexture`].
    pub fn remove_texture(&mut self, texture: TextureId) -> SceneResult<()> {
        if !self.textures.remove(&texture) {
            return Err(SceneError::UnknownTexture(texture));
        }
        self.send(true, move |scene: &mut SceneGraph, buffer: BufferIndex| {
            scene.remove_texture(buffer, texture);
        });
        Ok(())
    }

    /// Creates a tracker that becomes synced once a frame including every
    /// change sent before it has been presented.
    pub fn create_tracker(&mut self) -> RenderTracker {
        let tracker = RenderTracker::new();
        let shared = tracker.clone();
        self.send(true, move |scene: &mut SceneGraph, buffer: BufferIndex| {
            scene.add_tracker(buffer, shared);
        });
        tracker
    }

    // =========================================================================
    // CONSTRAINTS
    // =========================================================================

    /// Attaches a constraint to `node`.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`] for the owner or an input node,
    /// [`SceneError::UnknownProperty`], [`SceneError::ReadOnlyProperty`] for
    /// a world-property target, or [`SceneError::PropertyTypeMismatch`] if
    /// `T` is not the target's type.
    pub fn apply_constraint<T: PropertyType>(
        &mut self,
        node: NodeId,
        constraint: Constraint<T>,
    ) -> SceneResult<ConstraintId> {
        let expected = self.writable_kind(node, constraint.target())?;
        if expected != T::KIND {
            return Err(SceneError::PropertyTypeMismatch {
                expected,
                found: T::KIND,
            });
        }
        for source in constraint.sources() {
            match *source {
                Source::Local(index) => {
                    self.property_kind(node, index)?;
                }
                Source::Node(other, index) => {
                    self.property_kind(other, index)?;
                }
                // The parent may change before evaluation.
                Source::Parent(_) => {}
            }
        }

        let id = ConstraintId(self.next_constraint);
        self.next_constraint += 1;
        let tag = constraint.tag();
        if let Some(record) = self.nodes.get_mut(&node) {
            record.constraints.push((id, tag));
        }
        self.constraint_owners.insert(id, node);

        let instance = constraint.into_instance(id, node);
        self.send(true, move |scene: &mut SceneGraph, buffer: BufferIndex| {
            scene.add_constraint(buffer, instance);
        });
        Ok(id)
    }

    /// Removes one constraint. Returns `false` if it was already removed.
    pub fn remove_constraint(&mut self, constraint: ConstraintId) -> bool {
        let Some(owner) = self.constraint_owners.remove(&constraint) else {
            return false;
        };
        if let Some(record) = self.nodes.get_mut(&owner) {
            record.constraints.retain(|(id, _)| *id != constraint);
        }
        self.send_removal(vec![constraint]);
        true
    }

    fn remove_where(
        &mut self,
        node: NodeId,
        mut matches: impl FnMut(ConstraintTag) -> bool,
    ) -> SceneResult<usize> {
        let record = self
            .nodes
            .get_mut(&node)
            .ok_or(SceneError::UnknownNode(node))?;
        let mut removed = Vec::new();
        record.constraints.retain(|(id, tag)| {
            if matches(*tag) {
                removed.push(*id);
                false
            } else {
                true
            }
        });
        for id in &removed {
            self.constraint_owners.remove(id);
        }
        let count = removed.len();
        if count > 0 {
            self.send_removal(removed);
        }
        Ok(count)
    }

    fn send_removal(&mut self, constraints: Vec<ConstraintId>) {
        self.send(true, move |scene: &mut SceneGraph, buffer: BufferIndex| {
            for constraint in constraints {
                scene.remove_constraint(buffer, constraint, false);
            }
        });
    }

    /// Removes the node's constraints carrying `tag`.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`].
    pub fn remove_constraints_with_tag(&mut self, node: NodeId, tag: u32) -> SceneResult<usize> {
        self.remove_where(node, |t| t.raw() == tag)
    }

    /// Removes the node's constraints with tags in `begin..=end`.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`].
    pub fn remove_constraints_in_range(
        &mut self,
        node: NodeId,
        begin: u32,
        end: u32,
    ) -> SceneResult<usize> {
        self.remove_where(node, |t| (begin..=end).contains(&t.raw()))
    }

    /// Removes the node's default and custom tagged constraints. Internal
    /// constraints stay.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`].
    pub fn remove_constraints(&mut self, node: NodeId) -> SceneResult<usize> {
        self.remove_where(node, |t| t.raw() <= CUSTOM_CONSTRAINT_TAG_END)
    }

    /// Removes every constraint of the node.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`].
    pub fn remove_all_constraints(&mut self, node: NodeId) -> SceneResult<usize> {
        self.remove_where(node, |_| true)
    }

    /// Constraints the producer believes are attached to `node`.
    #[must_use]
    pub fn constraint_count(&self, node: NodeId) -> usize {
        self.nodes.get(&node).map_or(0, |r| r.constraints.len())
    }

    // =========================================================================
    // ANIMATIONS
    // =========================================================================

    /// Registers an animation in the stopped state.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownNode`], [`SceneError::UnknownProperty`],
    /// [`SceneError::ReadOnlyProperty`], [`SceneError::PropertyTypeMismatch`]
    /// or [`SceneError::EmptyKeyFrames`] for any animator.
    pub fn add_animation(&mut self, animation: Animation) -> SceneResult<AnimationId> {
        for animator in animation.animators() {
            let expected = self.writable_kind(animator.node, animator.property)?;
            let found = match &animator.target {
                AnimatorTarget::To(value) => value.kind(),
                AnimatorTarget::Between(frames) => {
                    if frames.is_empty() {
                        return Err(SceneError::EmptyKeyFrames(animator.node));
                    }
                    frames.check_kind(expected).err().unwrap_or(expected)
                }
            };
            if found != expected {
                return Err(SceneError::PropertyTypeMismatch { expected, found });
            }
        }

        let id = AnimationId(self.next_animation);
        self.next_animation += 1;
        self.animations.insert(id);
        self.send(false, move |scene: &mut SceneGraph, _: BufferIndex| {
            scene.add_animation(id, animation);
        });
        Ok(id)
    }

    fn check_animation(&self, animation: AnimationId) -> SceneResult<()> {
        if self.animations.contains(&animation) {
            Ok(())
        } else {
            Err(SceneError::UnknownAnimation(animation))
        }
    }

    /// Starts or resumes an animation.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownAnimation`].
    pub fn play(&mut self, animation: AnimationId) -> SceneResult<()> {
        self.check_animation(animation)?;
        self.send(true, move |scene: &mut SceneGraph, _: BufferIndex| {
            scene.play_animation(animation);
        });
        Ok(())
    }

    /// Holds an animation at its current progress.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownAnimation`].
    pub fn pause(&mut self, animation: AnimationId) -> SceneResult<()> {
        self.check_animation(animation)?;
        self.send(true, move |scene: &mut SceneGraph, _: BufferIndex| {
            scene.pause_animation(animation);
        });
        Ok(())
    }

    /// Stops and rewinds an animation, applying its end action.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownAnimation`].
    pub fn stop(&mut self, animation: AnimationId) -> SceneResult<()> {
        self.check_animation(animation)?;
        self.send(true, move |scene: &mut SceneGraph, buffer: BufferIndex| {
            scene.stop_animation(buffer, animation);
        });
        Ok(())
    }

    /// Stops and forgets an animation.
    ///
    /// # Errors
    ///
    /// [`SceneError::UnknownAnimation`].
    pub fn destroy_animation(&mut self, animation: AnimationId) -> SceneResult<()> {
        if !self.animations.remove(&animation) {
            return Err(SceneError::UnknownAnimation(animation));
        }
        self.send(true, move |scene: &mut SceneGraph, buffer: BufferIndex| {
            scene.destroy_animation(buffer, animation);
        });
        Ok(())
    }

    // =========================================================================
    // FRAME CONTROL
    // =========================================================================

    /// Keeps frames rendering for at least `seconds`, even when idle.
    pub fn keep_rendering(&mut self, seconds: f32) {
        let seconds = seconds.max(0.0);
        self.send(false, move |scene: &mut SceneGraph, _: BufferIndex| {
            scene.keep_rendering(seconds);
        });
    }

    /// Messages queued since the last flush.
    #[must_use]
    pub fn pending_messages(&self) -> usize {
        self.producer.pending()
    }

    /// Hands queued messages to the update thread. Returns `false` if
    /// nothing was queued.
    pub fn flush(&mut self) -> bool {
        self.producer.flush()
    }

    /// Drains notifications from the update thread.
    pub fn poll_notifications(&mut self) -> Vec<Notification> {
        let notifications: Vec<Notification> = self.notifications.try_iter().collect();
        for notification in &notifications {
            if let Notification::ConstraintRemoved(id) = notification {
                if let Some(owner) = self.constraint_owners.remove(id) {
                    if let Some(record) = self.nodes.get_mut(&owner) {
                        record.constraints.retain(|(c, _)| c != id);
                    }
                }
            }
        }
        notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::PropertyInputs;
    use stagecraft_core::{message_queue, QueueConfig};

    fn controller() -> (SceneController, crossbeam_channel::Sender<Notification>) {
        let (producer, _consumer) = message_queue::<SceneGraph>(QueueConfig::default());
        let (tx, rx) = crossbeam_channel::unbounded();
        (SceneController::new(producer, rx), tx)
    }

    #[test]
    fn test_ancestor_cycles_are_refused() {
        let (mut controller, _tx) = controller();
        let a = controller.add_node(NodeDesc::new());
        let b = controller.add_node(NodeDesc::new());
        let c = controller.add_node(NodeDesc::new());
        controller.connect(a, b).unwrap();
        controller.connect(b, c).unwrap();
        assert_eq!(
            controller.connect(c, a),
            Err(SceneError::HierarchyCycle {
                parent: c,
                child: a
            })
        );
        assert_eq!(controller.pending_messages(), 5);

        // Re-parenting is allowed once the cycle is broken.
        controller.disconnect(b).unwrap();
        controller.connect(c, a).unwrap();
    }

    #[test]
    fn test_destroy_forgets_descendants() {
        let (mut controller, _tx) = controller();
        let parent = controller.add_node(NodeDesc::new());
        let child = controller.add_node(NodeDesc::new());
        controller.connect(parent, child).unwrap();
        controller.destroy_node(parent).unwrap();
        assert!(!controller.contains_node(parent));
        assert!(!controller.contains_node(child));
        assert_eq!(
            controller.set_property(child, PropertyIndex::VISIBLE, false.into_value()),
            Err(SceneError::UnknownNode(child))
        );
    }

    #[test]
    fn test_registered_properties_are_typed() {
        let (mut controller, _tx) = controller();
        let node = controller.add_node(NodeDesc::new().with_custom(1.0_f32.into_value()));
        let index = controller.register_property(node, true.into_value()).unwrap();
        assert_eq!(index, PropertyIndex::custom(1));
        assert!(controller.bake_property(node, index, false.into_value()).is_ok());
        assert_eq!(
            controller.bake_property(node, index, 2.0_f32.into_value()),
            Err(SceneError::PropertyTypeMismatch {
                expected: PropertyKind::Boolean,
                found: PropertyKind::Float
            })
        );
        assert_eq!(
            controller.set_property(node, PropertyIndex::WORLD_COLOR, 1.0_f32.into_value()),
            Err(SceneError::ReadOnlyProperty(PropertyIndex::WORLD_COLOR))
        );
    }

    #[test]
    fn test_removed_notification_forgets_constraint() {
        let (mut controller, tx) = controller();
        let node = controller.add_node(NodeDesc::new());
        let id = controller
            .apply_constraint(
                node,
                Constraint::new(PropertyIndex::VISIBLE, |_: &mut bool, _: &PropertyInputs<'_>| {}),
            )
            .unwrap();
        assert_eq!(controller.constraint_count(node), 1);

        tx.send(Notification::ConstraintRemoved(id)).unwrap();
        assert_eq!(
            controller.poll_notifications(),
            vec![Notification::ConstraintRemoved(id)]
        );
        assert_eq!(controller.constraint_count(node), 0);
        assert!(!controller.remove_constraint(id));
        assert_eq!(controller.remove_all_constraints(node), Ok(0));
    }

    #[test]
    fn test_texture_lifecycle() {
        let (mut controller, _tx) = controller();
        let texture = controller.create_texture();
        let id = texture.id();
        assert!(controller.remove_texture(id).is_ok());
        assert_eq!(
            controller.remove_texture(id),
            Err(SceneError::UnknownTexture(id))
        );
    }
}
