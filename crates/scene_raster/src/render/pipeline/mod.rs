//! Pipeline configuration
//!
//! Describes graphics pipelines and their layouts without touching the
//! device. The Vulkan backend turns these into handles.

mod pipeline_config;

pub use pipeline_config::{
    BlendMode, CullMode, PipelineConfig, PipelineLayoutConfig, GLOBAL_SET, MATERIAL_SET,
    MODEL_PUSH_CONSTANT_SIZE, OBJECT_SET,
};
