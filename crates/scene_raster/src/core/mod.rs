//! # Core Module
//!
//! Shared configuration for the frame loop, the rasterizer and logging.

pub mod config;

pub use config::{DescriptorPoolConfig, EngineConfig, FrameLoopConfig, PoolRatio, RasterizerConfig};
