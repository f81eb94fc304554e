//! # Configuration
//!
//! One TOML document sizes every part of the pipeline. Every field has a
//! default, so an empty document is a valid configuration.
//!
//! ```toml
//! [pool]
//! initial_capacity = 32
//! maximum_block_capacity = 1048576
//! maximum_block_count = 27      # omit for unbounded keys
//!
//! [queue]
//! initial_capacity_bytes = 4096
//!
//! [frame]
//! stats_window = 120
//! keep_rendering_seconds = 0.0
//!
//! [render]
//! max_frames_in_flight = 2
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use stagecraft_core::{KeyLayout, PoolConfig, QueueConfig};
use stagecraft_render::RenderConfig;
use stagecraft_shared::constants::{
    DEFAULT_FRAME_STATS_WINDOW, DEFAULT_MAX_FRAMES_IN_FLIGHT, DEFAULT_MESSAGE_BUFFER_BYTES,
    DEFAULT_POOL_INITIAL_CAPACITY, DEFAULT_POOL_MAXIMUM_BLOCK_CAPACITY,
};

use crate::error::{ConfigError, ConfigResult};

/// Pool sizing, shared by the node, constraint and renderer pools.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolSection {
    /// Slots in the first block.
    pub initial_capacity: u32,
    /// Largest block size.
    pub maximum_block_capacity: u32,
    /// Block count for the bounded key layout. `None` selects unbounded keys.
    pub maximum_block_count: Option<u32>,
}

impl Default for PoolSection {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_POOL_INITIAL_CAPACITY,
            maximum_block_capacity: DEFAULT_POOL_MAXIMUM_BLOCK_CAPACITY,
            maximum_block_count: None,
        }
    }
}

impl From<PoolSection> for PoolConfig {
    fn from(section: PoolSection) -> Self {
        Self {
            initial_capacity: section.initial_capacity,
            maximum_block_capacity: section.maximum_block_capacity,
            key_layout: section
                .maximum_block_count
                .map_or(KeyLayout::Unbounded, |maximum_block_count| {
                    KeyLayout::Bounded {
                        maximum_block_count,
                    }
                }),
        }
    }
}

/// Message buffer sizing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueueSection {
    /// Initial bytes per message buffer. Buffers grow on demand.
    pub initial_capacity_bytes: usize,
}

impl Default for QueueSection {
    fn default() -> Self {
        Self {
            initial_capacity_bytes: DEFAULT_MESSAGE_BUFFER_BYTES,
        }
    }
}

/// Frame driver settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FrameSection {
    /// Number of recent update durations kept for statistics.
    pub stats_window: usize,
    /// Seconds to keep rendering after start-up even when idle.
    pub keep_rendering_seconds: f32,
}

impl Default for FrameSection {
    fn default() -> Self {
        Self {
            stats_window: DEFAULT_FRAME_STATS_WINDOW,
            keep_rendering_seconds: 0.0,
        }
    }
}

/// Update to render handoff settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderSection {
    /// Frames the update thread may run ahead of the render thread.
    pub max_frames_in_flight: usize,
}

impl Default for RenderSection {
    fn default() -> Self {
        Self {
            max_frames_in_flight: DEFAULT_MAX_FRAMES_IN_FLIGHT,
        }
    }
}

/// Complete pipeline configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// Pool sizing.
    pub pool: PoolSection,
    /// Message buffer sizing.
    pub queue: QueueSection,
    /// Frame driver settings.
    pub frame: FrameSection,
    /// Render handoff settings.
    pub render: RenderSection,
}

impl CoreConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] for malformed TOML or unknown keys,
    /// [`ConfigError::Invalid`] for values rejected by [`CoreConfig::validate`].
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`CoreConfig::from_toml_str`].
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&source)?;
        tracing::debug!(path = %path.display(), "loaded config");
        Ok(config)
    }

    /// Serializes the configuration back to TOML.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if serialization fails.
    pub fn to_toml_string(&self) -> ConfigResult<String> {
        toml::to_string(self).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    /// Rejects values the pipeline cannot run with.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] naming the offending field.
    pub fn validate(&self) -> ConfigResult<()> {
        self.pool_config()
            .validate()
            .map_err(|e| ConfigError::Invalid(format!("pool: {e}")))?;
        if self.queue.initial_capacity_bytes == 0 {
            return Err(ConfigError::Invalid(
                "queue.initial_capacity_bytes must be greater than zero".into(),
            ));
        }
        if self.frame.stats_window == 0 {
            return Err(ConfigError::Invalid(
                "frame.stats_window must be greater than zero".into(),
            ));
        }
        let keep = self.frame.keep_rendering_seconds;
        if !keep.is_finite() || keep < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "frame.keep_rendering_seconds must be a non-negative number, got {keep}"
            )));
        }
        if self.render.max_frames_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "render.max_frames_in_flight must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Pool settings as a [`PoolConfig`].
    #[must_use]
    pub fn pool_config(&self) -> PoolConfig {
        self.pool.into()
    }

    /// Queue settings as a [`QueueConfig`].
    #[must_use]
    pub const fn queue_config(&self) -> QueueConfig {
        QueueConfig {
            initial_capacity_bytes: self.queue.initial_capacity_bytes,
        }
    }

    /// Render handoff settings as a [`RenderConfig`].
    #[must_use]
    pub const fn render_config(&self) -> RenderConfig {
        RenderConfig {
            max_frames_in_flight: self.render.max_frames_in_flight,
            initial_capacity_bytes: self.queue.initial_capacity_bytes,
        }
    }
}
