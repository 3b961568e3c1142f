//! Pipeline configuration and type definitions

use ash::vk;

use crate::render::vertex_layout::VertexLayout;

/// Set index of the per-frame global descriptor set
pub const GLOBAL_SET: u32 = 0;
/// Set index of the material instance
pub const MATERIAL_SET: u32 = 1;
/// Set index of the optional per-object descriptor set
pub const OBJECT_SET: u32 = 2;
/// Bytes of the model matrix push constant
pub const MODEL_PUSH_CONSTANT_SIZE: u32 = 64;

/// Blending modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlendMode {
    /// No blending
    #[default]
    Opaque,
    /// Standard alpha blending
    Alpha,
    /// Additive blending for particles and lights
    Additive,
}

/// Face culling modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullMode {
    /// No culling
    None,
    /// Cull front faces
    Front,
    /// Cull back faces
    #[default]
    Back,
}

impl CullMode {
    /// Vulkan cull flags
    pub fn to_vk(self) -> vk::CullModeFlags {
        match self {
            Self::None => vk::CullModeFlags::NONE,
            Self::Front => vk::CullModeFlags::FRONT,
            Self::Back => vk::CullModeFlags::BACK,
        }
    }
}

/// Configuration for a graphics pipeline.
///
/// Shader modules are owned by the caller and must outlive pipeline creation.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Compiled vertex shader
    pub vertex_shader: vk::ShaderModule,
    /// Compiled fragment shader
    pub fragment_shader: vk::ShaderModule,
    /// Vertex attributes the vertex shader consumes
    pub vertex_layout: VertexLayout,
    /// Primitive topology
    pub topology: vk::PrimitiveTopology,
    /// Enable depth testing
    pub depth_test: bool,
    /// Enable depth writing
    pub depth_write: bool,
    /// Color blending
    pub blend_mode: BlendMode,
    /// Cull mode for backface culling
    pub cull_mode: CullMode,
}

impl PipelineConfig {
    /// Opaque triangle-list pipeline with depth test and write
    pub fn opaque(
        vertex_shader: vk::ShaderModule,
        fragment_shader: vk::ShaderModule,
        vertex_layout: VertexLayout,
    ) -> Self {
        Self {
            vertex_shader,
            fragment_shader,
            vertex_layout,
            topology: vk::PrimitiveTopology::TRIANGLE_LIST,
            depth_test: true,
            depth_write: true,
            blend_mode: BlendMode::Opaque,
            cull_mode: CullMode::Back,
        }
    }

    /// Alpha-blended pipeline that tests depth but does not write it
    pub fn transparent(
        vertex_shader: vk::ShaderModule,
        fragment_shader: vk::ShaderModule,
        vertex_layout: VertexLayout,
    ) -> Self {
        Self {
            depth_write: false,
            blend_mode: BlendMode::Alpha,
            cull_mode: CullMode::None,
            ..Self::opaque(vertex_shader, fragment_shader, vertex_layout)
        }
    }

    /// Replace the cull mode
    #[must_use]
    pub fn with_cull_mode(mut self, cull_mode: CullMode) -> Self {
        self.cull_mode = cull_mode;
        self
    }

    /// Replace the topology
    #[must_use]
    pub fn with_topology(mut self, topology: vk::PrimitiveTopology) -> Self {
        self.topology = topology;
        self
    }
}

/// Descriptor set layouts and push constant ranges of a pipeline layout
#[derive(Debug, Clone, Default)]
pub struct PipelineLayoutConfig {
    /// Set layouts by set index
    pub set_layouts: Vec<vk::DescriptorSetLayout>,
    /// Push constant ranges
    pub push_constant_ranges: Vec<vk::PushConstantRange>,
}

impl PipelineLayoutConfig {
    /// Layout with the global set at 0, the material set at 1 and the model
    /// matrix push constant
    pub fn scene(
        global_set_layout: vk::DescriptorSetLayout,
        material_set_layout: vk::DescriptorSetLayout,
    ) -> Self {
        Self {
            set_layouts: vec![global_set_layout, material_set_layout],
            push_constant_ranges: vec![model_push_constant_range()],
        }
    }

    /// Append a set layout for per-object data
    #[must_use]
    pub fn with_set_layout(mut self, layout: vk::DescriptorSetLayout) -> Self {
        self.set_layouts.push(layout);
        self
    }

    /// Whether a range covers the model matrix for the vertex stage
    pub fn has_model_push_constant(&self) -> bool {
        self.push_constant_ranges.iter().any(|range| {
            range.offset == 0
                && range.size >= MODEL_PUSH_CONSTANT_SIZE
                && range.stage_flags.contains(vk::ShaderStageFlags::VERTEX)
        })
    }
}

fn model_push_constant_range() -> vk::PushConstantRange {
    vk::PushConstantRange {
        stage_flags: vk::ShaderStageFlags::VERTEX,
        offset: 0,
        size: MODEL_PUSH_CONSTANT_SIZE,
    }
}
