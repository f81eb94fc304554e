//! A scene node: local properties, derived world values, one attachment.

use stagecraft_core::{
    BufferIndex, DoubleBuffered, DynamicProperty, InheritedProperty, PropertyType, PropertyValue,
};
use stagecraft_shared::math::{Matrix4, Quaternion, Vec3, Vec4};

use super::{Attachment, NodeDesc, NodeId, PropertyIndex};

/// World-space state of a node for one buffer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldValue {
    /// World position.
    pub position: Vec3,
    /// World scale.
    pub scale: Vec3,
    /// World orientation.
    pub orientation: Quaternion,
    /// Colour modulated by every ancestor.
    pub color: Vec4,
    /// Visible only if every ancestor is visible.
    pub visible: bool,
    /// Combined world transform.
    pub matrix: Matrix4,
}

impl WorldValue {
    /// The world value of a root's parent.
    pub const ROOT: Self = Self {
        position: Vec3::ZERO,
        scale: Vec3::ONE,
        orientation: Quaternion::IDENTITY,
        color: Vec4::ONE,
        visible: true,
        matrix: Matrix4::IDENTITY,
    };

    /// Combines this parent value with a child's local values.
    #[must_use]
    pub fn child(&self, local: &WorldValue) -> Self {
        let orientation = self.orientation * local.orientation;
        let scale = self.scale.scale_by(local.scale);
        let position =
            self.position + self.orientation.rotate(self.scale.scale_by(local.position));
        Self {
            position,
            scale,
            orientation,
            color: self.color.modulate(local.color),
            visible: self.visible && local.visible,
            matrix: Matrix4::from_trs(position, orientation, scale),
        }
    }
}

/// A node in the scene graph. Owned by the update thread.
#[derive(Debug)]
pub struct Node {
    id: NodeId,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    /// Built-in writable properties followed by custom ones.
    properties: Vec<DynamicProperty>,
    world_position: InheritedProperty<Vec3>,
    world_scale: InheritedProperty<Vec3>,
    world_orientation: InheritedProperty<Quaternion>,
    world_color: InheritedProperty<Vec4>,
    world_visible: InheritedProperty<bool>,
    world_matrix: DoubleBuffered<Matrix4>,
    pub(crate) attachment: Option<Attachment>,
}

impl Node {
    /// Creates a detached node.
    #[must_use]
    pub fn new(id: NodeId, desc: NodeDesc) -> Self {
        let mut properties = Vec::with_capacity(PropertyIndex::LOCAL_COUNT + desc.custom.len());
        properties.push(DynamicProperty::new(desc.position.into_value()));
        properties.push(DynamicProperty::new(desc.scale.into_value()));
        properties.push(DynamicProperty::new(desc.orientation.into_value()));
        properties.push(DynamicProperty::new(desc.size.into_value()));
        properties.push(DynamicProperty::new(desc.color.into_value()));
        properties.push(DynamicProperty::new(desc.visible.into_value()));
        properties.extend(desc.custom.into_iter().map(DynamicProperty::new));

        let local = WorldValue {
            position: desc.position,
            scale: desc.scale,
            orientation: desc.orientation,
            color: desc.color,
            visible: desc.visible,
            matrix: Matrix4::IDENTITY,
        };
        let world = WorldValue::ROOT.child(&local);
        Self {
            id,
            parent: None,
            children: Vec::new(),
            properties,
            world_position: InheritedProperty::new(world.position),
            world_scale: InheritedProperty::new(world.scale),
            world_orientation: InheritedProperty::new(world.orientation),
            world_color: InheritedProperty::new(world.color),
            world_visible: InheritedProperty::new(world.visible),
            world_matrix: DoubleBuffered::new(world.matrix),
            attachment: None,
        }
    }

    /// Node id.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.id
    }

    /// Parent, if connected.
    #[inline]
    #[must_use]
    pub const fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in connection order.
    #[inline]
    #[must_use]
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Current attachment.
    #[inline]
    #[must_use]
    pub const fn attachment(&self) -> Option<Attachment> {
        self.attachment
    }

    /// Number of custom properties.
    #[must_use]
    pub fn custom_count(&self) -> usize {
        self.properties.len() - PropertyIndex::LOCAL_COUNT
    }

    /// Appends a custom property and returns its index.
    pub fn register_property(&mut self, initial: PropertyValue) -> PropertyIndex {
        let n = u32::try_from(self.custom_count()).unwrap_or(u32::MAX);
        self.properties.push(DynamicProperty::new(initial));
        PropertyIndex::custom(n)
    }

    /// Writable property at `index`.
    #[must_use]
    pub fn property(&self, index: PropertyIndex) -> Option<&DynamicProperty> {
        self.properties.get(index.storage_slot()?)
    }

    /// Mutable writable property at `index`.
    pub fn property_mut(&mut self, index: PropertyIndex) -> Option<&mut DynamicProperty> {
        let slot = index.storage_slot()?;
        self.properties.get_mut(slot)
    }

    /// Value of any property in buffer `buffer`.
    #[must_use]
    pub fn value(&self, index: PropertyIndex, buffer: BufferIndex) -> Option<PropertyValue> {
        match index {
            PropertyIndex::WORLD_POSITION => Some(self.world_position.get(buffer).into_value()),
            PropertyIndex::WORLD_SCALE => Some(self.world_scale.get(buffer).into_value()),
            PropertyIndex::WORLD_ORIENTATION => {
                Some(self.world_orientation.get(buffer).into_value())
            }
            PropertyIndex::WORLD_COLOR => Some(self.world_color.get(buffer).into_value()),
            _ => self.property(index).map(|p| p.value(buffer)),
        }
    }

    /// Value of a property as a constraint input.
    ///
    /// World properties yield the most recently computed value, local ones
    /// the value in `buffer`.
    #[must_use]
    pub fn input_value(&self, index: PropertyIndex, buffer: BufferIndex) -> Option<PropertyValue> {
        match index {
            PropertyIndex::WORLD_POSITION => Some(self.world_position.latest().into_value()),
            PropertyIndex::WORLD_SCALE => Some(self.world_scale.latest().into_value()),
            PropertyIndex::WORLD_ORIENTATION => {
                Some(self.world_orientation.latest().into_value())
            }
            PropertyIndex::WORLD_COLOR => Some(self.world_color.latest().into_value()),
            _ => self.value(index, buffer),
        }
    }

    fn local<T: PropertyType>(&self, index: PropertyIndex, buffer: BufferIndex, fallback: T) -> T {
        self.property(index)
            .and_then(DynamicProperty::typed::<T>)
            .map_or(fallback, |p| p.get(buffer))
    }

    /// Local transform, colour and visibility in `buffer`.
    #[must_use]
    pub fn local_value(&self, buffer: BufferIndex) -> WorldValue {
        WorldValue {
            position: self.local(PropertyIndex::POSITION, buffer, Vec3::ZERO),
            scale: self.local(PropertyIndex::SCALE, buffer, Vec3::ONE),
            orientation: self.local(PropertyIndex::ORIENTATION, buffer, Quaternion::IDENTITY),
            color: self.local(PropertyIndex::COLOR, buffer, Vec4::ONE),
            visible: self.local(PropertyIndex::VISIBLE, buffer, true),
            matrix: Matrix4::IDENTITY,
        }
    }

    /// World state in `buffer`.
    #[must_use]
    pub fn world(&self, buffer: BufferIndex) -> WorldValue {
        WorldValue {
            position: self.world_position.get(buffer),
            scale: self.world_scale.get(buffer),
            orientation: self.world_orientation.get(buffer),
            color: self.world_color.get(buffer),
            visible: self.world_visible.get(buffer),
            matrix: *self.world_matrix.get(buffer),
        }
    }

    pub(crate) fn set_world(&mut self, buffer: BufferIndex, world: &WorldValue) {
        self.world_position.set(buffer, world.position);
        self.world_scale.set(buffer, world.scale);
        self.world_orientation.set(buffer, world.orientation);
        self.world_color.set(buffer, world.color);
        self.world_visible.set(buffer, world.visible);
        self.world_matrix.set(buffer, world.matrix);
    }

    /// Writes base values into `buffer` for every dirty property.
    pub fn reset_to_base_value(&mut self, buffer: BufferIndex) {
        for property in &mut self.properties {
            property.reset_to_base_value(buffer);
        }
    }

    /// Applies pending bakes to the new write buffer.
    pub fn on_swap(&mut self, new_write_index: BufferIndex) {
        for property in &mut self.properties {
            property.on_swap(new_write_index);
        }
    }

    /// No property needs a reset.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.properties.iter().all(DynamicProperty::is_clean)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UPDATE: BufferIndex = BufferIndex::ZERO;

    #[test]
    fn test_new_node_world_matches_local() {
        let node = Node::new(
            NodeId(1),
            NodeDesc::new()
                .with_position(Vec3::new(1.0, 2.0, 3.0))
                .with_color(Vec4::new(1.0, 0.0, 0.0, 1.0)),
        );
        let world = node.world(UPDATE);
        assert_eq!(world.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(world.color, Vec4::new(1.0, 0.0, 0.0, 1.0));
        assert_eq!(world.matrix.translation(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_child_world_value() {
        let parent = WorldValue {
            position: Vec3::new(10.0, 0.0, 0.0),
            scale: Vec3::new(2.0, 2.0, 2.0),
            color: Vec4::new(1.0, 1.0, 1.0, 0.5),
            ..WorldValue::ROOT
        };
        let local = WorldValue {
            position: Vec3::new(1.0, 0.0, 0.0),
            visible: false,
            ..WorldValue::ROOT
        };
        let world = parent.child(&local);
        assert_eq!(world.position, Vec3::new(12.0, 0.0, 0.0));
        assert_eq!(world.scale, Vec3::new(2.0, 2.0, 2.0));
        assert_eq!(world.color.w, 0.5);
        assert!(!world.visible);
    }

    #[test]
    fn test_world_properties_are_not_writable() {
        let mut node = Node::new(NodeId(1), NodeDesc::new());
        assert!(node.property_mut(PropertyIndex::WORLD_POSITION).is_none());
        assert!(node.value(PropertyIndex::WORLD_POSITION, UPDATE).is_some());
    }

    #[test]
    fn test_custom_properties() {
        let mut node = Node::new(
            NodeId(1),
            NodeDesc::new().with_custom(PropertyValue::Float(0.25)),
        );
        let second = node.register_property(PropertyValue::Boolean(true));
        assert_eq!(second, PropertyIndex::custom(1));
        assert_eq!(
            node.value(PropertyIndex::custom(0), UPDATE),
            Some(PropertyValue::Float(0.25))
        );
        assert_eq!(
            node.value(second, UPDATE),
            Some(PropertyValue::Boolean(true))
        );
        assert!(node.value(PropertyIndex::custom(2), UPDATE).is_none());
    }

    #[test]
    fn test_inputs_read_latest_world_value() {
        let mut node = Node::new(NodeId(1), NodeDesc::new());
        let moved = WorldValue {
            position: Vec3::new(5.0, 0.0, 0.0),
            ..WorldValue::ROOT
        };
        node.set_world(BufferIndex::ONE, &moved);
        assert_eq!(
            node.input_value(PropertyIndex::WORLD_POSITION, BufferIndex::ZERO),
            Some(PropertyValue::Vector3(Vec3::new(5.0, 0.0, 0.0)))
        );
        assert_eq!(
            node.value(PropertyIndex::WORLD_POSITION, BufferIndex::ZERO),
            Some(PropertyValue::Vector3(Vec3::ZERO))
        );
    }
}
