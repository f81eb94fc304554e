//! # Scene Graph
//!
//! Nodes own double-buffered properties and at most one attachment. The
//! update thread is the only writer; producers describe changes through
//! [`crate::SceneController`].
//!
//! ## Property Indices
//!
//! ```text
//! 0 POSITION      3 SIZE        6 WORLD_POSITION      9 WORLD_COLOR
//! 1 SCALE         4 COLOR       7 WORLD_SCALE        10.. custom
//! 2 ORIENTATION   5 VISIBLE     8 WORLD_ORIENTATION
//! ```
//!
//! World properties are derived each frame and are read-only.

mod graph;
mod node;
mod store;

pub use graph::{Notification, SceneGraph};
pub use node::{Node, WorldValue};
pub use store::NodeStore;

use stagecraft_core::{PropertyKind, PropertyValue};
use stagecraft_render::{RendererDesc, TextureId};
use stagecraft_shared::math::{Quaternion, Vec3, Vec4};

/// Identifier of a scene node, assigned by the producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

/// Index of a property on a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PropertyIndex(pub u32);

impl PropertyIndex {
    /// Local position, [`Vec3`].
    pub const POSITION: Self = Self(0);
    /// Local scale, [`Vec3`].
    pub const SCALE: Self = Self(1);
    /// Local orientation, [`Quaternion`].
    pub const ORIENTATION: Self = Self(2);
    /// Size, [`Vec3`].
    pub const SIZE: Self = Self(3);
    /// Local colour, [`Vec4`].
    pub const COLOR: Self = Self(4);
    /// Local visibility, `bool`.
    pub const VISIBLE: Self = Self(5);
    /// World position, read-only.
    pub const WORLD_POSITION: Self = Self(6);
    /// World scale, read-only.
    pub const WORLD_SCALE: Self = Self(7);
    /// World orientation, read-only.
    pub const WORLD_ORIENTATION: Self = Self(8);
    /// World colour, read-only.
    pub const WORLD_COLOR: Self = Self(9);
    /// First index of registered custom properties.
    pub const CUSTOM_START: Self = Self(10);

    /// Number of writable built-in properties.
    pub(crate) const LOCAL_COUNT: usize = 6;

    /// Returns `true` for world properties.
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        self.0 >= Self::WORLD_POSITION.0 && self.0 < Self::CUSTOM_START.0
    }

    /// Returns `true` for custom property indices.
    #[must_use]
    pub const fn is_custom(self) -> bool {
        self.0 >= Self::CUSTOM_START.0
    }

    /// Type of a built-in property, `None` for custom indices.
    #[must_use]
    pub const fn builtin_kind(self) -> Option<PropertyKind> {
        match self.0 {
            0 | 1 | 3 | 6 | 7 => Some(PropertyKind::Vector3),
            2 | 8 => Some(PropertyKind::Rotation),
            4 | 9 => Some(PropertyKind::Vector4),
            5 => Some(PropertyKind::Boolean),
            _ => None,
        }
    }

    /// Slot in a node's property list for writable indices.
    pub(crate) const fn storage_slot(self) -> Option<usize> {
        if self.0 < Self::WORLD_POSITION.0 {
            Some(self.0 as usize)
        } else if self.is_custom() {
            Some(Self::LOCAL_COUNT + (self.0 - Self::CUSTOM_START.0) as usize)
        } else {
            None
        }
    }

    /// Index of the `n`th custom property.
    #[must_use]
    pub const fn custom(n: u32) -> Self {
        Self(Self::CUSTOM_START.0 + n)
    }
}

/// What a node draws or provides to the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AttachmentDesc {
    /// Draw the node with a renderer.
    Renderable {
        /// Device state for the renderer.
        desc: RendererDesc,
        /// Texture to bind. Items wait until it is uploaded.
        texture: Option<TextureId>,
        /// Draw order; lower draws first.
        depth_index: i32,
    },
    /// Use the node's world transform as the camera.
    Camera,
    /// Light the frame from the node's world position.
    Light,
}

/// An attachment as held by the update thread.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Attachment {
    /// Renderer allocated in the shared renderer pool.
    Renderable {
        /// Key in the shared renderer pool.
        renderer: stagecraft_core::PoolKey,
        /// Texture to bind.
        texture: Option<TextureId>,
        /// Draw order; lower draws first.
        depth_index: i32,
    },
    /// Camera.
    Camera,
    /// Light.
    Light,
}

/// Initial state of a new node.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDesc {
    /// Local position.
    pub position: Vec3,
    /// Local scale.
    pub scale: Vec3,
    /// Local orientation.
    pub orientation: Quaternion,
    /// Size.
    pub size: Vec3,
    /// Local colour.
    pub color: Vec4,
    /// Local visibility.
    pub visible: bool,
    /// Custom properties, registered at `CUSTOM_START` onwards.
    pub custom: Vec<PropertyValue>,
}

impl Default for NodeDesc {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            scale: Vec3::ONE,
            orientation: Quaternion::IDENTITY,
            size: Vec3::ZERO,
            color: Vec4::ONE,
            visible: true,
            custom: Vec::new(),
        }
    }
}

impl NodeDesc {
    /// A node at the origin with unit scale, white and visible.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the local position.
    #[must_use]
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.position = position;
        self
    }

    /// Sets the local scale.
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Sets the local orientation.
    #[must_use]
    pub fn with_orientation(mut self, orientation: Quaternion) -> Self {
        self.orientation = orientation;
        self
    }

    /// Sets the size.
    #[must_use]
    pub fn with_size(mut self, size: Vec3) -> Self {
        self.size = size;
        self
    }

    /// Sets the local colour.
    #[must_use]
    pub fn with_color(mut self, color: Vec4) -> Self {
        self.color = color;
        self
    }

    /// Sets the local visibility.
    #[must_use]
    pub fn with_visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Registers a custom property. Its index is
    /// `PropertyIndex::custom(n)` for the `n`th call.
    #[must_use]
    pub fn with_custom(mut self, initial: PropertyValue) -> Self {
        self.custom.push(initial);
        self
    }
}
