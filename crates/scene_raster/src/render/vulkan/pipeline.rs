//! Graphics pipeline construction

use std::ffi::CStr;
use std::slice;

use ash::{vk, Device};

use crate::render::pipeline::{BlendMode, PipelineConfig};
use crate::render::{RenderError, RenderResult};

/// Build a graphics pipeline for subpass 0 of `render_pass`.
///
/// Viewport and scissor are dynamic state; the caller sets them per frame.
pub fn build_graphics_pipeline(
    device: &Device,
    config: &PipelineConfig,
    layout: vk::PipelineLayout,
    render_pass: vk::RenderPass,
) -> RenderResult<vk::Pipeline> {
    let entry = CStr::from_bytes_with_nul(b"main\0")
        .map_err(|e| RenderError::BadConfig(format!("shader entry point: {e}")))?;

    let shader_stages = [
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::VERTEX)
            .module(config.vertex_shader)
            .name(entry)
            .build(),
        vk::PipelineShaderStageCreateInfo::builder()
            .stage(vk::ShaderStageFlags::FRAGMENT)
            .module(config.fragment_shader)
            .name(entry)
            .build(),
    ];

    // Vertex input from the layout
    let (binding, attributes) = config.vertex_layout.input_state(0);
    let bindings: &[vk::VertexInputBindingDescription] = if attributes.is_empty() {
        &[]
    } else {
        slice::from_ref(&binding)
    };
    let vertex_input = vk::PipelineVertexInputStateCreateInfo::builder()
        .vertex_binding_descriptions(bindings)
        .vertex_attribute_descriptions(&attributes);

    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo::builder()
        .topology(config.topology)
        .primitive_restart_enable(false);

    let viewport_state = vk::PipelineViewportStateCreateInfo::builder()
        .viewport_count(1)
        .scissor_count(1);

    let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
    let dynamic_state = vk::PipelineDynamicStateCreateInfo::builder().dynamic_states(&dynamic_states);

    let rasterizer = vk::PipelineRasterizationStateCreateInfo::builder()
        .depth_clamp_enable(false)
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        .cull_mode(config.cull_mode.to_vk())
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false);

    let multisampling = vk::PipelineMultisampleStateCreateInfo::builder()
        .sample_shading_enable(false)
        .rasterization_samples(vk::SampleCountFlags::TYPE_1);

    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo::builder()
        .depth_test_enable(config.depth_test)
        .depth_write_enable(config.depth_write)
        .depth_compare_op(vk::CompareOp::LESS)
        .depth_bounds_test_enable(false)
        .stencil_test_enable(false);

    let color_blend_attachment = blend_attachment(config.blend_mode);
    let color_blending = vk::PipelineColorBlendStateCreateInfo::builder()
        .logic_op_enable(false)
        .attachments(slice::from_ref(&color_blend_attachment));

    let pipeline_info = vk::GraphicsPipelineCreateInfo::builder()
        .stages(&shader_stages)
        .vertex_input_state(&vertex_input)
        .input_assembly_state(&input_assembly)
        .viewport_state(&viewport_state)
        .rasterization_state(&rasterizer)
        .multisample_state(&multisampling)
        .depth_stencil_state(&depth_stencil)
        .color_blend_state(&color_blending)
        .dynamic_state(&dynamic_state)
        .layout(layout)
        .render_pass(render_pass)
        .subpass(0);

    let pipelines = unsafe {
        device.create_graphics_pipelines(vk::PipelineCache::null(), slice::from_ref(&*pipeline_info), None)
    }
    .map_err(|(_, e)| RenderError::from_vk(e, "create graphics pipeline"))?;

    let pipeline = pipelines
        .into_iter()
        .next()
        .ok_or_else(|| RenderError::BadConfig("driver returned no pipeline".to_string()))?;
    log::debug!("Built graphics pipeline {:?}", pipeline);
    Ok(pipeline)
}

fn blend_attachment(mode: BlendMode) -> vk::PipelineColorBlendAttachmentState {
    let builder = vk::PipelineColorBlendAttachmentState::builder().color_write_mask(vk::ColorComponentFlags::RGBA);
    let attachment = match mode {
        BlendMode::Opaque => builder.blend_enable(false),
        BlendMode::Alpha => builder
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ZERO)
            .alpha_blend_op(vk::BlendOp::ADD),
        BlendMode::Additive => builder
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE)
            .alpha_blend_op(vk::BlendOp::ADD),
    };
    attachment.build()
}
