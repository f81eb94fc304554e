//! # Update Errors
//!
//! Everything here is raised synchronously on the producer thread, before a
//! message is queued. The update thread never reports failures back.

use stagecraft_core::PropertyKind;
use stagecraft_render::TextureId;
use thiserror::Error;

use crate::animation::AnimationId;
use crate::scene::{NodeId, PropertyIndex};

/// Errors raised when tagging a constraint.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintError {
    /// The tag lies outside the range the setter accepts.
    #[error("constraint tag {tag} is outside the accepted range {start}..={end}")]
    TagOutOfRange {
        /// Rejected tag.
        tag: u32,
        /// First accepted tag.
        start: u32,
        /// Last accepted tag.
        end: u32,
    },

    /// The constraint already carries a tag owned by the other side.
    #[error("constraint tag {current} cannot be replaced by {requested}")]
    TagOwnershipConflict {
        /// Tag currently set.
        current: u32,
        /// Tag that was refused.
        requested: u32,
    },
}

/// Errors raised by [`crate::SceneController`] operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// No live node has this id.
    #[error("unknown node {0:?}")]
    UnknownNode(NodeId),

    /// No live animation has this id.
    #[error("unknown animation {0:?}")]
    UnknownAnimation(AnimationId),

    /// No live texture has this id.
    #[error("unknown texture {0:?}")]
    UnknownTexture(TextureId),

    /// The node has no property at this index.
    #[error("node {node:?} has no property {index:?}")]
    UnknownProperty {
        /// Target node.
        node: NodeId,
        /// Requested index.
        index: PropertyIndex,
    },

    /// The property is derived by the update thread.
    #[error("property {0:?} is read-only")]
    ReadOnlyProperty(PropertyIndex),

    /// The value does not match the property type.
    #[error("property type mismatch: expected {expected:?}, found {found:?}")]
    PropertyTypeMismatch {
        /// Type of the property.
        expected: PropertyKind,
        /// Type of the offered value.
        found: PropertyKind,
    },

    /// Connecting would make a node its own ancestor.
    #[error("connecting {child:?} under {parent:?} would create a cycle")]
    HierarchyCycle {
        /// Requested parent.
        parent: NodeId,
        /// Requested child.
        child: NodeId,
    },

    /// An animator was built with no key frames.
    #[error("animator for {0:?} has no key frames")]
    EmptyKeyFrames(NodeId),

    /// Constraint tagging failed.
    #[error(transparent)]
    Constraint(#[from] ConstraintError),
}

/// Errors raised while loading a [`crate::CoreConfig`].
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for the config schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is out of range or inconsistent with another.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Result type for scene operations.
pub type SceneResult<T> = Result<T, SceneError>;

/// Result type for config loading.
pub type ConfigResult<T> = Result<T, ConfigError>;
