//! # Graphics Backend
//!
//! The render manager drives the device through [`GraphicsBackend`]. No
//! concrete GPU backend lives in this crate; [`RecordingBackend`] is a
//! headless implementation that records every call.

mod recording;
mod state_cache;

pub use recording::{BackendCall, RecordingBackend};
pub use state_cache::StateCache;

use bytemuck::{Pod, Zeroable};
use stagecraft_shared::math::{Matrix4, Vec4};

use crate::error::BackendResult;
use crate::instruction::LightItem;

/// Opaque handle to a device object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BackendHandle(pub u64);

/// Pipeline state toggled between draws.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Alpha blending.
    Blend,
    /// Depth testing.
    DepthTest,
    /// Back-face culling.
    CullFace,
}

impl Capability {
    /// Every capability, in cache order.
    pub const ALL: [Self; 3] = [Self::Blend, Self::DepthTest, Self::CullFace];

    #[inline]
    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Blend => 0,
            Self::DepthTest => 1,
            Self::CullFace => 2,
        }
    }
}

/// How a renderer draws its geometry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RendererDesc {
    /// Enable alpha blending.
    pub blend: bool,
    /// Enable depth testing.
    pub depth_test: bool,
    /// Enable back-face culling.
    pub cull_face: bool,
}

impl Default for RendererDesc {
    fn default() -> Self {
        Self {
            blend: true,
            depth_test: false,
            cull_face: false,
        }
    }
}

impl RendererDesc {
    /// Desired state of `capability`.
    #[must_use]
    pub const fn capability(&self, capability: Capability) -> bool {
        match capability {
            Capability::Blend => self.blend,
            Capability::DepthTest => self.depth_test,
            Capability::CullFace => self.cull_face,
        }
    }
}

/// RGBA8 pixel data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureData {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// `width * height * 4` bytes, row-major.
    pub pixels: Vec<u8>,
}

impl TextureData {
    /// Bytes the pixel buffer must hold.
    #[must_use]
    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }
}

/// Per-draw uniform block, laid out for direct upload.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct ItemUniforms {
    /// Model-view matrix.
    pub model_view: Matrix4,
    /// Final colour.
    pub color: Vec4,
}

/// One draw call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DrawCommand {
    /// Renderer to draw with.
    pub renderer: BackendHandle,
    /// Bound texture, if any.
    pub texture: Option<BackendHandle>,
    /// Uniforms for the draw.
    pub uniforms: ItemUniforms,
}

impl DrawCommand {
    /// Uniform block as bytes.
    #[must_use]
    pub fn uniform_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(&self.uniforms)
    }
}

/// The device interface used by the render thread.
pub trait GraphicsBackend: Send {
    /// Creates device state for a renderer.
    ///
    /// # Errors
    ///
    /// Backend-specific.
    fn create_renderer(&mut self, desc: &RendererDesc) -> BackendResult<BackendHandle>;

    /// Releases a renderer.
    ///
    /// # Errors
    ///
    /// Backend-specific.
    fn destroy_renderer(&mut self, handle: BackendHandle) -> BackendResult<()>;

    /// Uploads pixel data as a new texture.
    ///
    /// # Errors
    ///
    /// Backend-specific, including [`BackendError::TextureSize`](crate::BackendError::TextureSize).
    fn upload_texture(&mut self, data: &TextureData) -> BackendResult<BackendHandle>;

    /// Releases a texture.
    ///
    /// # Errors
    ///
    /// Backend-specific.
    fn destroy_texture(&mut self, handle: BackendHandle) -> BackendResult<()>;

    /// Enables or disables a pipeline capability.
    ///
    /// # Errors
    ///
    /// Backend-specific.
    fn set_capability(&mut self, capability: Capability, enabled: bool) -> BackendResult<()>;

    /// Replaces the lights used by following draws.
    ///
    /// # Errors
    ///
    /// Backend-specific.
    fn set_lights(&mut self, lights: &[LightItem]) -> BackendResult<()> {
        let _ = lights;
        Ok(())
    }

    /// Issues one draw.
    ///
    /// # Errors
    ///
    /// Backend-specific.
    fn draw(&mut self, command: &DrawCommand) -> BackendResult<()>;

    /// Finishes the frame.
    ///
    /// # Errors
    ///
    /// Backend-specific.
    fn present(&mut self, frame: u64) -> BackendResult<()>;
}
