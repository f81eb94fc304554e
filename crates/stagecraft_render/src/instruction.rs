//! # Render Instructions
//!
//! What to draw for one frame, built by the update thread from the read
//! buffer after the swap and handed to the render thread by value.

use bytemuck::{Pod, Zeroable};
use stagecraft_core::PoolKey;
use stagecraft_shared::math::{Matrix4, Quaternion, Vec3, Vec4};

use crate::resources::TextureId;

/// A renderable node in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RenderItem {
    /// Key in the shared renderer pool.
    pub renderer: PoolKey,
    /// Texture to bind, if any.
    pub texture: Option<TextureId>,
    /// Node's world transform.
    pub world_matrix: Matrix4,
    /// Node's world colour.
    pub color: Vec4,
    /// Draw order; lower draws first.
    pub depth_index: i32,
}

/// The viewpoint of the frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraItem {
    /// Camera position in world space.
    pub world_position: Vec3,
    /// Camera orientation in world space.
    pub world_orientation: Quaternion,
}

impl CameraItem {
    /// World-to-view transform.
    #[must_use]
    pub fn view_matrix(&self) -> Matrix4 {
        let inverse = self.world_orientation.conjugate();
        Matrix4::from_trs(
            inverse.rotate(self.world_position * -1.0),
            inverse,
            Vec3::ONE,
        )
    }
}

/// A light in world space, laid out for direct upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct LightItem {
    /// Position, `w = 1`.
    pub position: Vec4,
    /// Colour and intensity.
    pub color: Vec4,
}

/// Everything the render thread needs to draw one frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RenderInstruction {
    /// Update frame that produced the instruction.
    pub frame: u64,
    /// Active camera, identity view if absent.
    pub camera: Option<CameraItem>,
    /// Lights affecting the frame.
    pub lights: Vec<LightItem>,
    /// Items in draw order once [`RenderInstruction::sort_items`] has run.
    pub items: Vec<RenderItem>,
}

impl RenderInstruction {
    /// An empty instruction for `frame`.
    #[must_use]
    pub fn new(frame: u64) -> Self {
        Self {
            frame,
            ..Self::default()
        }
    }

    /// Orders items by depth index. Equal indices keep traversal order.
    pub fn sort_items(&mut self) {
        self.items.sort_by_key(|item| item.depth_index);
    }

    /// World-to-view transform of the camera.
    #[must_use]
    pub fn view_matrix(&self) -> Matrix4 {
        self.camera
            .as_ref()
            .map_or(Matrix4::IDENTITY, CameraItem::view_matrix)
    }

    /// Returns `true` if nothing would be drawn.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(depth_index: i32) -> RenderItem {
        RenderItem {
            renderer: PoolKey::NULL,
            texture: None,
            world_matrix: Matrix4::IDENTITY,
            color: Vec4::ONE,
            depth_index,
        }
    }

    #[test]
    fn test_sort_is_stable_by_depth() {
        let mut instruction = RenderInstruction::new(1);
        instruction.items = vec![item(2), item(0), item(2), item(-1)];
        instruction.items[0].color = Vec4::new(1.0, 0.0, 0.0, 1.0);
        instruction.sort_items();
        let depths: Vec<_> = instruction.items.iter().map(|i| i.depth_index).collect();
        assert_eq!(depths, [-1, 0, 2, 2]);
        assert_eq!(instruction.items[2].color, Vec4::new(1.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_camera_view_undoes_camera_transform() {
        let camera = CameraItem {
            world_position: Vec3::new(0.0, 0.0, 10.0),
            world_orientation: Quaternion::from_axis_angle(Vec3::Y, 0.5),
        };
        let view = camera.view_matrix();
        let origin = view.transform_point(camera.world_position);
        assert!(origin.length() < 1e-4);
    }
}
