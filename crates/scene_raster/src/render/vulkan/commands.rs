//! Command buffer recording
//!
//! [`VulkanCommandRecorder`] records into a command buffer the application
//! allocated and began. Point it at the next frame's buffer with
//! [`VulkanCommandRecorder::retarget`].

use std::slice;

use ash::{vk, Device};

use crate::render::api::{CommandSink, IndexedDraw, RenderPassTarget};
use crate::render::{RenderError, RenderResult};

/// Command recorder over a primary command buffer
pub struct VulkanCommandRecorder {
    device: Device,
    command_buffer: vk::CommandBuffer,
    in_render_pass: bool,
}

impl VulkanCommandRecorder {
    /// Create a new command recorder
    pub fn new(device: Device, command_buffer: vk::CommandBuffer) -> Self {
        Self {
            device,
            command_buffer,
            in_render_pass: false,
        }
    }

    /// Record into another command buffer from now on
    pub fn retarget(&mut self, command_buffer: vk::CommandBuffer) -> RenderResult<()> {
        if self.in_render_pass {
            return Err(RenderError::WrongState(
                "cannot switch command buffers inside a render pass".to_string(),
            ));
        }
        self.command_buffer = command_buffer;
        Ok(())
    }

    /// Current command buffer
    pub fn command_buffer(&self) -> vk::CommandBuffer {
        self.command_buffer
    }

    /// Set viewport and scissor to cover `area`
    pub fn set_viewport_and_scissor(&mut self, area: vk::Rect2D) -> RenderResult<()> {
        self.require_render_pass("set viewport")?;
        #[allow(clippy::cast_precision_loss)]
        let viewport = vk::Viewport::builder()
            .x(area.offset.x as f32)
            .y(area.offset.y as f32)
            .width(area.extent.width as f32)
            .height(area.extent.height as f32)
            .min_depth(0.0)
            .max_depth(1.0)
            .build();
        unsafe {
            self.device
                .cmd_set_viewport(self.command_buffer, 0, slice::from_ref(&viewport));
            self.device
                .cmd_set_scissor(self.command_buffer, 0, slice::from_ref(&area));
        }
        Ok(())
    }

    fn require_render_pass(&self, operation: &str) -> RenderResult<()> {
        if self.in_render_pass {
            Ok(())
        } else {
            Err(RenderError::WrongState(format!("{operation} outside a render pass")))
        }
    }
}

impl CommandSink for VulkanCommandRecorder {
    fn begin_render_pass(&mut self, target: &RenderPassTarget) -> RenderResult<()> {
        if self.in_render_pass {
            return Err(RenderError::WrongState("render pass already begun".to_string()));
        }

        let render_pass_begin = vk::RenderPassBeginInfo::builder()
            .render_pass(target.render_pass)
            .framebuffer(target.framebuffer)
            .render_area(target.render_area)
            .clear_values(&target.clear_values);

        unsafe {
            self.device.cmd_begin_render_pass(
                self.command_buffer,
                &render_pass_begin,
                vk::SubpassContents::INLINE,
            );
        }
        self.in_render_pass = true;
        self.set_viewport_and_scissor(target.render_area)
    }

    fn end_render_pass(&mut self) -> RenderResult<()> {
        self.require_render_pass("end render pass")?;
        unsafe {
            self.device.cmd_end_render_pass(self.command_buffer);
        }
        self.in_render_pass = false;
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) -> RenderResult<()> {
        self.require_render_pass("bind pipeline")?;
        unsafe {
            self.device
                .cmd_bind_pipeline(self.command_buffer, vk::PipelineBindPoint::GRAPHICS, pipeline);
        }
        Ok(())
    }

    fn bind_descriptor_set(
        &mut self,
        layout: vk::PipelineLayout,
        set_index: u32,
        set: vk::DescriptorSet,
    ) -> RenderResult<()> {
        self.require_render_pass("bind descriptor set")?;
        unsafe {
            self.device.cmd_bind_descriptor_sets(
                self.command_buffer,
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                set_index,
                slice::from_ref(&set),
                &[],
            );
        }
        Ok(())
    }

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: vk::Buffer, offset: vk::DeviceSize) -> RenderResult<()> {
        self.require_render_pass("bind vertex buffer")?;
        unsafe {
            self.device.cmd_bind_vertex_buffers(
                self.command_buffer,
                binding,
                slice::from_ref(&buffer),
                slice::from_ref(&offset),
            );
        }
        Ok(())
    }

    fn bind_index_buffer(
        &mut self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) -> RenderResult<()> {
        self.require_render_pass("bind index buffer")?;
        unsafe {
            self.device
                .cmd_bind_index_buffer(self.command_buffer, buffer, offset, index_type);
        }
        Ok(())
    }

    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> RenderResult<()> {
        self.require_render_pass("push constants")?;
        unsafe {
            self.device
                .cmd_push_constants(self.command_buffer, layout, stages, offset, data);
        }
        Ok(())
    }

    fn draw_indexed(&mut self, draw: IndexedDraw) -> RenderResult<()> {
        self.require_render_pass("draw")?;
        unsafe {
            self.device.cmd_draw_indexed(
                self.command_buffer,
                draw.index_count,
                draw.instance_count,
                draw.first_index,
                draw.vertex_offset,
                draw.first_instance,
            );
        }
        Ok(())
    }
}
