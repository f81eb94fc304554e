//! # Stagecraft Update
//!
//! The update thread of a retained-mode scene graph, and the producer
//! handle that feeds it.
//!
//! ## Architecture
//!
//! ```text
//! SceneController ──messages──────▶ UpdateManager ──batches──▶ RenderManager
//!  (any thread)                      drain, animate,            (render thread)
//!       ▲                            constrain, derive,
//!       └──────notifications──────── swap, emit
//! ```
//!
//! ## Example
//!
//! ```rust
//! use stagecraft_core::PropertyType;
//! use stagecraft_render::RecordingBackend;
//! use stagecraft_shared::math::Vec3;
//! use stagecraft_update::{CoreConfig, NodeDesc, PropertyIndex, Stage};
//!
//! let mut stage = Stage::new(&CoreConfig::default(), RecordingBackend::new()).unwrap();
//! let node = stage.controller.add_node(NodeDesc::new());
//! stage
//!     .controller
//!     .bake_property(node, PropertyIndex::POSITION, Vec3::new(1.0, 2.0, 3.0).into_value())
//!     .unwrap();
//! stage.controller.flush();
//!
//! let status = stage.update.update(1.0 / 60.0);
//! assert!(status.scene_updated);
//! assert_eq!(
//!     stage.update.world_value(node).map(|w| w.position),
//!     Some(Vec3::new(1.0, 2.0, 3.0))
//! );
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod animation;
pub mod config;
pub mod constraint;
pub mod controller;
pub mod error;
pub mod manager;
pub mod scene;

pub use animation::{
    Animation, AnimationId, AnimationState, Animator, AnimatorTarget, Easing, EndAction,
    KeyFrames, TimePeriod,
};
pub use config::CoreConfig;
pub use constraint::{
    Constraint, ConstraintId, ConstraintState, ConstraintTag, InternalTagNamespace,
    PropertyInputs, RemoveAction, Source,
};
pub use controller::SceneController;
pub use error::{ConfigError, ConfigResult, ConstraintError, SceneError, SceneResult};
pub use manager::{FrameStats, KeepUpdating, Stage, UpdateManager, UpdateStatus};
pub use scene::{
    AttachmentDesc, Node, NodeDesc, NodeId, Notification, PropertyIndex, SceneGraph, WorldValue,
};
