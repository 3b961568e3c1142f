//! GPU boundary
//!
//! The scene layer records through these traits only. [`HeadlessDevice`]
//! and [`CommandLog`] implement them without a GPU; the Vulkan backend in
//! [`crate::render::vulkan`] implements them over `ash`.

mod commands;
mod device;
mod headless;
mod uniform;

pub use commands::{CommandLog, CommandSink, IndexedDraw, RecordedCommand, RenderPassTarget};
pub use device::GpuDevice;
pub use headless::HeadlessDevice;
pub use uniform::{HostUniformBuffer, UniformTarget};
pub(crate) use uniform::checked_region;
