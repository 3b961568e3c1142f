use std::fmt;
use std::sync::Arc;

use ash::vk;

use crate::foundation::time::TimeRegistry;
use crate::render::api::{GpuDevice, UniformTarget};

/// Shared services the rasterizer depends on.
///
/// Passed in explicitly; nothing in the crate reaches for a global device
/// or clock.
#[derive(Clone)]
pub struct RenderContext {
    /// Device all GPU objects are created on
    pub device: Arc<dyn GpuDevice>,
    /// Per-thread initial time samples
    pub time: Arc<TimeRegistry>,
}

impl RenderContext {
    /// Context over `device` with a fresh time registry
    pub fn new(device: Arc<dyn GpuDevice>) -> Self {
        Self {
            device,
            time: Arc::new(TimeRegistry::new()),
        }
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("registered_threads", &self.time.len())
            .finish_non_exhaustive()
    }
}

/// Resources behind the global descriptor set (set 0)
pub struct GlobalBinding {
    /// Layout of set 0; must match `set_layouts[0]` of every material
    pub set_layout: vk::DescriptorSetLayout,
    /// Uniform ring holding one [`crate::render::GlobalUniforms`] per frame
    /// in flight
    pub uniforms: Box<dyn UniformTarget>,
}

impl GlobalBinding {
    /// Bundle a set layout with its uniform ring
    pub fn new(set_layout: vk::DescriptorSetLayout, uniforms: impl UniformTarget + 'static) -> Self {
        Self {
            set_layout,
            uniforms: Box::new(uniforms),
        }
    }
}

impl fmt::Debug for GlobalBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalBinding")
            .field("set_layout", &self.set_layout)
            .field("buffer", &self.uniforms.buffer())
            .field("capacity", &self.uniforms.capacity())
            .finish()
    }
}
