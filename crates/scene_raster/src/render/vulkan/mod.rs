//! Vulkan backend
//!
//! Implements the GPU boundary traits over `ash`. Instance, device,
//! swapchain and framebuffer setup belong to the application; these types
//! only wrap handles they are given.

mod commands;
mod device;
mod pipeline;
mod uniform_buffer;

pub use commands::VulkanCommandRecorder;
pub use device::VulkanDevice;
pub use pipeline::build_graphics_pipeline;
pub use uniform_buffer::MappedUniformBuffer;
