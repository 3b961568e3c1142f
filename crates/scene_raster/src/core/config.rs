//! # Engine Configuration
//!
//! Serializable settings for every subsystem of the crate. Values load from
//! TOML or RON through the [`Config`] trait and are checked by `validate`
//! before use.
//!
//! ```toml
//! log_level = "info"
//!
//! [frame_loop]
//! fps = 60
//! duration_in_frames = 0
//!
//! [rasterizer]
//! frames_in_flight = 2
//! layout_matching = "Strict"
//! ```

use serde::{Deserialize, Serialize};

use crate::config::{Config, ConfigError};
use crate::render::descriptors::DescriptorKind;
use crate::render::vertex_layout::LayoutMatching;

/// Frame pacing settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameLoopConfig {
    /// Target frames per second, zero disables pacing
    pub fps: u32,
    /// Number of frames to run, zero runs until stopped
    pub duration_in_frames: u64,
}

impl Default for FrameLoopConfig {
    fn default() -> Self {
        Self {
            fps: 60,
            duration_in_frames: 0,
        }
    }
}

impl FrameLoopConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fps > 1_000_000 {
            return Err(ConfigError::Invalid(format!(
                "fps {} exceeds microsecond pacing resolution",
                self.fps
            )));
        }
        Ok(())
    }
}

/// Descriptors of one kind reserved per set when a pool is created
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PoolRatio {
    /// Descriptor type
    pub kind: DescriptorKind,
    /// Descriptors of that type per set
    pub per_set: f32,
}

/// Growth policy of the per-frame descriptor allocator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorPoolConfig {
    /// Sets in the first pool
    pub initial_sets: u32,
    /// Upper bound of sets in any one pool
    pub max_sets_per_pool: u32,
    /// Multiplier applied to the pool size each time the allocator grows
    pub growth_factor: f32,
    /// Descriptor type ratios
    pub ratios: Vec<PoolRatio>,
}

impl Default for DescriptorPoolConfig {
    fn default() -> Self {
        Self {
            initial_sets: 64,
            max_sets_per_pool: 4096,
            growth_factor: 1.5,
            ratios: vec![
                PoolRatio {
                    kind: DescriptorKind::UniformBuffer,
                    per_set: 2.0,
                },
                PoolRatio {
                    kind: DescriptorKind::CombinedImageSampler,
                    per_set: 4.0,
                },
                PoolRatio {
                    kind: DescriptorKind::StorageBuffer,
                    per_set: 1.0,
                },
            ],
        }
    }
}

impl DescriptorPoolConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_sets == 0 {
            return Err(ConfigError::Invalid("initial_sets must be at least 1".to_string()));
        }
        if self.max_sets_per_pool < self.initial_sets {
            return Err(ConfigError::Invalid(
                "max_sets_per_pool must not be smaller than initial_sets".to_string(),
            ));
        }
        if !(self.growth_factor >= 1.0) {
            return Err(ConfigError::Invalid(format!(
                "growth_factor {} must be at least 1.0",
                self.growth_factor
            )));
        }
        if self.ratios.is_empty() || self.ratios.iter().any(|r| !(r.per_set > 0.0)) {
            return Err(ConfigError::Invalid(
                "descriptor ratios must be present and positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Scene rasterizer settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterizerConfig {
    /// Frames the GPU may still be consuming; sizes the allocator ring and
    /// the global uniform ring
    pub frames_in_flight: usize,
    /// How model layouts are checked against material layouts
    pub layout_matching: LayoutMatching,
    /// `minUniformBufferOffsetAlignment` of the device
    pub uniform_alignment: u64,
    /// Descriptor allocator growth policy
    pub descriptor_pools: DescriptorPoolConfig,
}

impl Default for RasterizerConfig {
    fn default() -> Self {
        Self {
            frames_in_flight: 2,
            layout_matching: LayoutMatching::Strict,
            uniform_alignment: 256,
            descriptor_pools: DescriptorPoolConfig::default(),
        }
    }
}

impl RasterizerConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.frames_in_flight == 0 {
            return Err(ConfigError::Invalid(
                "frames_in_flight must be at least 1".to_string(),
            ));
        }
        if self.frames_in_flight > 8 {
            return Err(ConfigError::Invalid(
                "frames_in_flight should not exceed 8".to_string(),
            ));
        }
        if !self.uniform_alignment.is_power_of_two() {
            return Err(ConfigError::Invalid(format!(
                "uniform_alignment {} is not a power of two",
                self.uniform_alignment
            )));
        }
        self.descriptor_pools.validate()
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `env_logger` filter string
    pub log_level: String,
    /// Frame pacing
    pub frame_loop: FrameLoopConfig,
    /// Scene rasterizer
    pub rasterizer: RasterizerConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            frame_loop: FrameLoopConfig::default(),
            rasterizer: RasterizerConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.frame_loop.validate()?;
        self.rasterizer.validate()
    }
}

impl Config for EngineConfig {}
