//! # Render Resources
//!
//! Objects shared between the update and render threads. Their cross-thread
//! state is a single atomic each; everything else is owned by one side.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use crate::backend::{BackendHandle, RendererDesc};

/// Render-side state of a renderer.
///
/// Lives in the shared renderer pool: the update thread allocates it, the
/// render thread creates its device state and frees it.
#[derive(Debug)]
pub struct RenderRenderer {
    desc: RendererDesc,
    handle: Option<BackendHandle>,
}

impl RenderRenderer {
    /// A renderer with no device state yet.
    #[must_use]
    pub const fn new(desc: RendererDesc) -> Self {
        Self { desc, handle: None }
    }

    /// Draw state of the renderer.
    #[must_use]
    pub const fn desc(&self) -> &RendererDesc {
        &self.desc
    }

    /// Device handle, once created.
    #[must_use]
    pub const fn handle(&self) -> Option<BackendHandle> {
        self.handle
    }

    pub(crate) fn set_handle(&mut self, handle: Option<BackendHandle>) {
        self.handle = handle;
    }
}

/// Identifies a texture across threads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Upload state of a texture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum TextureState {
    /// No successful upload yet.
    Pending = 0,
    /// Uploaded; items using it are drawn.
    Ready = 1,
    /// The last upload failed.
    Failed = 2,
}

/// A texture whose readiness is visible to every thread.
#[derive(Debug)]
pub struct TextureResource {
    id: TextureId,
    state: AtomicU8,
}

impl TextureResource {
    /// A pending texture.
    #[must_use]
    pub fn new(id: TextureId) -> Arc<Self> {
        Arc::new(Self {
            id,
            state: AtomicU8::new(TextureState::Pending as u8),
        })
    }

    /// Identifier.
    #[must_use]
    pub const fn id(&self) -> TextureId {
        self.id
    }

    /// Current upload state.
    #[must_use]
    pub fn state(&self) -> TextureState {
        match self.state.load(Ordering::Acquire) {
            1 => TextureState::Ready,
            2 => TextureState::Failed,
            _ => TextureState::Pending,
        }
    }

    /// Shorthand for `state() == Ready`.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == TextureState::Ready
    }

    pub(crate) fn set_state(&self, state: TextureState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

/// Signals that the render thread has rendered a frame containing it.
///
/// Clones share the flag.
#[derive(Clone, Debug, Default)]
pub struct RenderTracker {
    synced: Arc<AtomicBool>,
}

impl RenderTracker {
    /// An unsynced tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` once the render thread has presented a frame after
    /// the tracker was added.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.synced.load(Ordering::Acquire)
    }

    /// Returns `true` if both trackers share a flag.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.synced, &other.synced)
    }

    pub(crate) fn mark_synced(&self) {
        self.synced.store(true, Ordering::Release);
    }
}
