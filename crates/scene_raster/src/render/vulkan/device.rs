//! `GpuDevice` over a logical Vulkan device

use std::slice;

use ash::{vk, Device};

use super::pipeline::build_graphics_pipeline;
use crate::render::api::GpuDevice;
use crate::render::descriptors::DescriptorWrite;
use crate::render::pipeline::{PipelineConfig, PipelineLayoutConfig};
use crate::render::{RenderError, RenderResult};

/// Logical device wrapper. Does not own the device; the application
/// destroys it after every object created through this wrapper is gone.
#[derive(Clone)]
pub struct VulkanDevice {
    device: Device,
}

impl VulkanDevice {
    /// Wrap a loaded logical device
    pub fn new(device: Device) -> Self {
        Self { device }
    }

    /// Raw `ash` device
    pub fn raw(&self) -> &Device {
        &self.device
    }
}

impl GpuDevice for VulkanDevice {
    fn create_pipeline_layout(&self, config: &PipelineLayoutConfig) -> RenderResult<vk::PipelineLayout> {
        let layout_info = vk::PipelineLayoutCreateInfo::builder()
            .set_layouts(&config.set_layouts)
            .push_constant_ranges(&config.push_constant_ranges);

        unsafe { self.device.create_pipeline_layout(&layout_info, None) }
            .map_err(|e| RenderError::from_vk(e, "create pipeline layout"))
    }

    fn destroy_pipeline_layout(&self, layout: vk::PipelineLayout) {
        unsafe {
            self.device.destroy_pipeline_layout(layout, None);
        }
    }

    fn create_graphics_pipeline(
        &self,
        config: &PipelineConfig,
        layout: vk::PipelineLayout,
        render_pass: vk::RenderPass,
    ) -> RenderResult<vk::Pipeline> {
        build_graphics_pipeline(&self.device, config, layout, render_pass)
    }

    fn destroy_pipeline(&self, pipeline: vk::Pipeline) {
        unsafe {
            self.device.destroy_pipeline(pipeline, None);
        }
    }

    fn create_descriptor_pool(
        &self,
        max_sets: u32,
        sizes: &[vk::DescriptorPoolSize],
    ) -> RenderResult<vk::DescriptorPool> {
        // Sets are never freed one by one; the whole pool is reset per frame.
        let pool_info = vk::DescriptorPoolCreateInfo::builder()
            .max_sets(max_sets)
            .pool_sizes(sizes);

        unsafe { self.device.create_descriptor_pool(&pool_info, None) }
            .map_err(|e| RenderError::from_vk(e, "create descriptor pool"))
    }

    fn reset_descriptor_pool(&self, pool: vk::DescriptorPool) -> RenderResult<()> {
        unsafe {
            self.device
                .reset_descriptor_pool(pool, vk::DescriptorPoolResetFlags::empty())
        }
        .map_err(|e| RenderError::from_vk(e, "reset descriptor pool"))
    }

    fn destroy_descriptor_pool(&self, pool: vk::DescriptorPool) {
        unsafe {
            self.device.destroy_descriptor_pool(pool, None);
        }
    }

    fn allocate_descriptor_set(
        &self,
        pool: vk::DescriptorPool,
        layout: vk::DescriptorSetLayout,
    ) -> RenderResult<vk::DescriptorSet> {
        let alloc_info = vk::DescriptorSetAllocateInfo::builder()
            .descriptor_pool(pool)
            .set_layouts(slice::from_ref(&layout));

        let sets = unsafe { self.device.allocate_descriptor_sets(&alloc_info) }
            .map_err(|e| RenderError::from_vk(e, "allocate descriptor set"))?;
        sets.into_iter()
            .next()
            .ok_or_else(|| RenderError::AllocationFailed("driver returned no descriptor set".to_string()))
    }

    fn update_descriptor_set(&self, set: vk::DescriptorSet, writes: &[DescriptorWrite]) -> RenderResult<()> {
        // Infos must stay put until the update call returns.
        let mut buffer_infos = Vec::with_capacity(writes.len());
        let mut image_infos = Vec::with_capacity(writes.len());
        for write in writes {
            match *write {
                DescriptorWrite::UniformBuffer { buffer, offset, range, .. }
                | DescriptorWrite::StorageBuffer { buffer, offset, range, .. } => {
                    buffer_infos.push(vk::DescriptorBufferInfo { buffer, offset, range });
                }
                DescriptorWrite::CombinedImageSampler {
                    sampler,
                    image_view,
                    image_layout,
                    ..
                } => image_infos.push(vk::DescriptorImageInfo {
                    sampler,
                    image_view,
                    image_layout,
                }),
                DescriptorWrite::SampledImage {
                    image_view,
                    image_layout,
                    ..
                } => image_infos.push(vk::DescriptorImageInfo {
                    sampler: vk::Sampler::null(),
                    image_view,
                    image_layout,
                }),
                DescriptorWrite::Sampler { sampler, .. } => image_infos.push(vk::DescriptorImageInfo {
                    sampler,
                    image_view: vk::ImageView::null(),
                    image_layout: vk::ImageLayout::UNDEFINED,
                }),
            }
        }

        let mut next_buffer = 0;
        let mut next_image = 0;
        let descriptor_writes: Vec<vk::WriteDescriptorSet> = writes
            .iter()
            .map(|write| {
                let builder = vk::WriteDescriptorSet::builder()
                    .dst_set(set)
                    .dst_binding(write.binding())
                    .dst_array_element(0)
                    .descriptor_type(write.kind().to_vk());
                match write {
                    DescriptorWrite::UniformBuffer { .. } | DescriptorWrite::StorageBuffer { .. } => {
                        let info = slice::from_ref(&buffer_infos[next_buffer]);
                        next_buffer += 1;
                        builder.buffer_info(info).build()
                    }
                    _ => {
                        let info = slice::from_ref(&image_infos[next_image]);
                        next_image += 1;
                        builder.image_info(info).build()
                    }
                }
            })
            .collect();

        unsafe {
            self.device.update_descriptor_sets(&descriptor_writes, &[]);
        }
        Ok(())
    }
}
