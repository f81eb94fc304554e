//! # Stagecraft Render
//!
//! The render side of the update/render split. The update thread stages
//! messages in a [`RenderQueue`] and ships one [`RenderBatch`] per frame;
//! the render thread applies them to a [`RenderManager`] and draws through
//! a [`GraphicsBackend`].
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     UPDATE THREAD                            │
//! │  RenderQueue[update index] ◀── resource + instruction msgs   │
//! │         │ swap                                               │
//! │         ▼                                                    │
//! │  RenderDispatcher ── RenderBatch{frame, index, required} ──┐ │
//! └────────────────────────────────────────────────────────────┼─┘
//!                                                              ▼
//! ┌──────────────────────────────────────────────────────────────┐
//! │                     RENDER THREAD                            │
//! │  RenderManager: process msgs → StateCache → backend.draw     │
//! └──────────────────────────────────────────────────────────────┘
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod backend;
pub mod channel;
pub mod error;
pub mod instruction;
pub mod manager;
pub mod queue;
pub mod resources;
pub mod thread;

pub use backend::{
    BackendCall, BackendHandle, Capability, DrawCommand, GraphicsBackend, ItemUniforms,
    RecordingBackend, RendererDesc, StateCache, TextureData,
};
pub use channel::{render_channel, RenderBatch, RenderConfig, RenderDispatcher, RenderReceiver};
pub use error::{BackendError, BackendResult};
pub use instruction::{CameraItem, LightItem, RenderInstruction, RenderItem};
pub use manager::{FrameResult, RenderManager, RenderStats};
pub use queue::RenderQueue;
pub use resources::{RenderRenderer, RenderTracker, TextureId, TextureResource, TextureState};
pub use thread::RenderThread;
