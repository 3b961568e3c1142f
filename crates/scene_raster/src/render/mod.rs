//! Rendering system
//!
//! The render layer is split along the GPU boundary. [`api`] holds the
//! traits the rest of the crate records against ([`api::GpuDevice`],
//! [`api::CommandSink`], [`api::UniformTarget`]) together with their
//! GPU-free implementations. [`vulkan`] implements the same traits over
//! `ash`. Everything above that boundary (materials, vertex layouts, the
//! scene rasterizer) is backend-agnostic.

pub mod api;
pub mod descriptors;
pub mod material;
pub mod model;
pub mod pipeline;
pub mod rasterizer;
pub mod render_object;
pub mod vertex_layout;
pub mod vulkan;
pub mod window;

mod context;
mod error;
mod globals;

pub use context::{GlobalBinding, RenderContext};
pub use error::{ErrorKind, RenderError, RenderResult};
pub use globals::{GlobalUniforms, SceneGlobals};
