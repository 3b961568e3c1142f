//! Command recording boundary

use std::fmt;

use ash::vk;

use crate::render::{RenderError, RenderResult};

/// Render pass instance a frame records into
#[derive(Clone)]
pub struct RenderPassTarget {
    /// Render pass
    pub render_pass: vk::RenderPass,
    /// Framebuffer of the acquired swapchain image
    pub framebuffer: vk::Framebuffer,
    /// Area to render
    pub render_area: vk::Rect2D,
    /// Clear values by attachment
    pub clear_values: Vec<vk::ClearValue>,
}

impl RenderPassTarget {
    /// Target clearing one color attachment and one depth attachment
    pub fn with_color_depth_clear(
        render_pass: vk::RenderPass,
        framebuffer: vk::Framebuffer,
        extent: vk::Extent2D,
        clear_color: [f32; 4],
    ) -> Self {
        Self {
            render_pass,
            framebuffer,
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            },
            clear_values: vec![
                vk::ClearValue {
                    color: vk::ClearColorValue {
                        float32: clear_color,
                    },
                },
                vk::ClearValue {
                    depth_stencil: vk::ClearDepthStencilValue {
                        depth: 1.0,
                        stencil: 0,
                    },
                },
            ],
        }
    }
}

impl fmt::Debug for RenderPassTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderPassTarget")
            .field("render_pass", &self.render_pass)
            .field("framebuffer", &self.framebuffer)
            .field("render_area", &self.render_area)
            .field("clear_values", &self.clear_values.len())
            .finish()
    }
}

/// Arguments of an indexed draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexedDraw {
    /// Indices to draw
    pub index_count: u32,
    /// Instances to draw
    pub instance_count: u32,
    /// First index in the bound index buffer
    pub first_index: u32,
    /// Added to each index before fetching vertices
    pub vertex_offset: i32,
    /// First instance id
    pub first_instance: u32,
}

/// Sink for recorded draw commands.
///
/// Calls outside a render pass (other than `begin_render_pass`) are
/// rejected with `WrongState`.
pub trait CommandSink {
    /// Begin a render pass with inline subpass contents
    fn begin_render_pass(&mut self, target: &RenderPassTarget) -> RenderResult<()>;

    /// End the current render pass
    fn end_render_pass(&mut self) -> RenderResult<()>;

    /// Bind a graphics pipeline
    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) -> RenderResult<()>;

    /// Bind one descriptor set at `set_index`
    fn bind_descriptor_set(
        &mut self,
        layout: vk::PipelineLayout,
        set_index: u32,
        set: vk::DescriptorSet,
    ) -> RenderResult<()>;

    /// Bind a vertex buffer
    fn bind_vertex_buffer(&mut self, binding: u32, buffer: vk::Buffer, offset: vk::DeviceSize) -> RenderResult<()>;

    /// Bind an index buffer
    fn bind_index_buffer(
        &mut self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) -> RenderResult<()>;

    /// Update push constants
    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> RenderResult<()>;

    /// Record an indexed draw
    fn draw_indexed(&mut self, draw: IndexedDraw) -> RenderResult<()>;
}

/// A command captured by [`CommandLog`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedCommand {
    /// Render pass begun
    BeginRenderPass {
        /// Render pass
        render_pass: vk::RenderPass,
        /// Framebuffer
        framebuffer: vk::Framebuffer,
    },
    /// Render pass ended
    EndRenderPass,
    /// Pipeline bound
    BindPipeline(vk::Pipeline),
    /// Descriptor set bound
    BindDescriptorSet {
        /// Layout the set was bound with
        layout: vk::PipelineLayout,
        /// Set index
        set_index: u32,
        /// Bound set
        set: vk::DescriptorSet,
    },
    /// Vertex buffer bound
    BindVertexBuffer {
        /// Vertex input binding
        binding: u32,
        /// Buffer
        buffer: vk::Buffer,
        /// Byte offset
        offset: vk::DeviceSize,
    },
    /// Index buffer bound
    BindIndexBuffer {
        /// Buffer
        buffer: vk::Buffer,
        /// Byte offset
        offset: vk::DeviceSize,
        /// Index width
        index_type: vk::IndexType,
    },
    /// Push constants updated
    PushConstants {
        /// Layout the constants were pushed with
        layout: vk::PipelineLayout,
        /// Stages that see the constants
        stages: vk::ShaderStageFlags,
        /// Byte offset
        offset: u32,
        /// Raw bytes
        data: Vec<u8>,
    },
    /// Indexed draw
    DrawIndexed(IndexedDraw),
}

/// [`CommandSink`] that records commands in order
#[derive(Debug, Default)]
pub struct CommandLog {
    commands: Vec<RecordedCommand>,
    in_render_pass: bool,
}

impl CommandLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands in recording order
    pub fn commands(&self) -> &[RecordedCommand] {
        &self.commands
    }

    /// Drain the recorded commands
    pub fn take(&mut self) -> Vec<RecordedCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Forget every recorded command
    pub fn clear(&mut self) {
        self.commands.clear();
    }

    /// Number of commands matching `predicate`
    pub fn count(&self, predicate: impl Fn(&RecordedCommand) -> bool) -> usize {
        self.commands.iter().filter(|c| predicate(c)).count()
    }

    /// Number of draw calls
    pub fn draw_count(&self) -> usize {
        self.count(|c| matches!(c, RecordedCommand::DrawIndexed(_)))
    }

    /// Sets bound at `set_index`, in order
    pub fn sets_bound_at(&self, set_index: u32) -> Vec<vk::DescriptorSet> {
        self.commands
            .iter()
            .filter_map(|c| match c {
                RecordedCommand::BindDescriptorSet { set_index: i, set, .. } if *i == set_index => Some(*set),
                _ => None,
            })
            .collect()
    }

    /// Whether a render pass is open
    pub fn in_render_pass(&self) -> bool {
        self.in_render_pass
    }

    fn record(&mut self, command: RecordedCommand) -> RenderResult<()> {
        if !self.in_render_pass {
            return Err(RenderError::WrongState(format!(
                "{command:?} recorded outside a render pass"
            )));
        }
        self.commands.push(command);
        Ok(())
    }
}

impl CommandSink for CommandLog {
    fn begin_render_pass(&mut self, target: &RenderPassTarget) -> RenderResult<()> {
        if self.in_render_pass {
            return Err(RenderError::WrongState("render pass already begun".to_string()));
        }
        self.in_render_pass = true;
        self.commands.push(RecordedCommand::BeginRenderPass {
            render_pass: target.render_pass,
            framebuffer: target.framebuffer,
        });
        Ok(())
    }

    fn end_render_pass(&mut self) -> RenderResult<()> {
        self.record(RecordedCommand::EndRenderPass)?;
        self.in_render_pass = false;
        Ok(())
    }

    fn bind_pipeline(&mut self, pipeline: vk::Pipeline) -> RenderResult<()> {
        self.record(RecordedCommand::BindPipeline(pipeline))
    }

    fn bind_descriptor_set(
        &mut self,
        layout: vk::PipelineLayout,
        set_index: u32,
        set: vk::DescriptorSet,
    ) -> RenderResult<()> {
        self.record(RecordedCommand::BindDescriptorSet { layout, set_index, set })
    }

    fn bind_vertex_buffer(&mut self, binding: u32, buffer: vk::Buffer, offset: vk::DeviceSize) -> RenderResult<()> {
        self.record(RecordedCommand::BindVertexBuffer { binding, buffer, offset })
    }

    fn bind_index_buffer(
        &mut self,
        buffer: vk::Buffer,
        offset: vk::DeviceSize,
        index_type: vk::IndexType,
    ) -> RenderResult<()> {
        self.record(RecordedCommand::BindIndexBuffer {
            buffer,
            offset,
            index_type,
        })
    }

    fn push_constants(
        &mut self,
        layout: vk::PipelineLayout,
        stages: vk::ShaderStageFlags,
        offset: u32,
        data: &[u8],
    ) -> RenderResult<()> {
        self.record(RecordedCommand::PushConstants {
            layout,
            stages,
            offset,
            data: data.to_vec(),
        })
    }

    fn draw_indexed(&mut self, draw: IndexedDraw) -> RenderResult<()> {
        self.record(RecordedCommand::DrawIndexed(draw))
    }
}
