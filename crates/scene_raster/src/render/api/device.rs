use ash::vk;

use crate::render::descriptors::DescriptorWrite;
use crate::render::pipeline::{PipelineConfig, PipelineLayoutConfig};
use crate::render::RenderResult;

/// Device-level operations the render layer needs.
///
/// Creation calls return owned handles; the caller is responsible for the
/// matching destroy call. Destroy calls cannot fail.
pub trait GpuDevice: Send + Sync {
    /// Create a pipeline layout
    fn create_pipeline_layout(&self, config: &PipelineLayoutConfig) -> RenderResult<vk::PipelineLayout>;

    /// Destroy a pipeline layout
    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout);

    /// Create a graphics pipeline for subpass 0 of `render_pass`
    fn create_graphics_pipeline(
        &self,
        config: &PipelineConfig,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
    ) -> RenderResult<vk::Pipeline>;

    /// Destroy a graphics pipeline
    fn destroy_pipeline(&self, pipeline: vk::Pipeline);

    /// Create a descriptor pool holding up to `max_sets` sets
    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[vk::DescriptorPoolSize],
    ) -> RenderResult<vk::DescriptorPool>;

    /// Return every set of a pool to it
    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> RenderResult<()>;

    /// Destroy a descriptor pool and every set allocated from it
    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool);

    /// Allocate one descriptor set.
    ///
    /// An exhausted pool reports [`crate::render::ErrorKind::AllocationFailed`].
    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> RenderResult<vk::DescriptorSet>;

    /// Write bindings of a descriptor set
    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) -> RenderResult<()>;
}
