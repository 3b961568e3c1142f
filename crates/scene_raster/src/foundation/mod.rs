//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the crate:
//! - Math types and GPU-facing matrix conversions
//! - Frame pacing
//! - Time management and the per-thread time registry
//! - Logging utilities

pub mod frame_loop;
pub mod logging;
pub mod math;
pub mod time;
