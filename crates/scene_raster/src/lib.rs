//! # Scene Raster
//!
//! Frame presentation and scene rasterization core over Vulkan.
//!
//! ## Features
//!
//! - **Frame Loop**: Paced iterator yielding per-frame tokens at a target rate
//! - **Display Loop**: Event-pumping iterator over a windowing surface
//! - **Scene Rasterizer**: Bind-cached draw recording with a global set at slot 0
//! - **Materials**: Owned pipeline + layout + descriptor writer
//! - **Vertex Layouts**: Attribute tables with containment checks
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_raster::prelude::*;
//!
//! fn run(surface: &mut impl DisplaySurface) -> Result<(), RenderError> {
//!     let mut frames = FrameLoop::new();
//!     frames.set_fps(60);
//!
//!     for (_display, token) in DisplayLoop::new(surface).zip(frames) {
//!         log::trace!("frame {} took {:?}", token.index, token.last_frame_duration);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod core;

pub mod config;
pub mod foundation;
pub mod render;
pub mod scene;

mod engine;

pub use engine::{FrameSource, LoopSummary, RenderLoop};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        core::config::{DescriptorPoolConfig, EngineConfig, FrameLoopConfig, RasterizerConfig},
        engine::{FrameSource, LoopSummary, RenderLoop},
        foundation::{
            frame_loop::{FrameLoop, FrameToken, LoopStop},
            math::{Mat4, Vec3},
            time::{Stopwatch, TimeRegistry},
        },
        render::{
            api::{CommandLog, CommandSink, GpuDevice, HeadlessDevice, RenderPassTarget},
            descriptors::{DescriptorAllocator, DescriptorWrite},
            material::{Material, MaterialConfig, MaterialId, MaterialInstance, MaterialWriter},
            model::{Model, Shape},
            rasterizer::{FrameReport, FrameStats, Rebinds, SceneRasterizer},
            render_object::RenderObject,
            vertex_layout::{LayoutMatching, VertexComponentKind, VertexLayout},
            window::{DisplayIteration, DisplayLoop, DisplaySurface},
            ErrorKind, GlobalBinding, RenderContext, RenderError, RenderResult, SceneGlobals,
        },
        scene::{draw_list, SceneGraph},
    };
}
