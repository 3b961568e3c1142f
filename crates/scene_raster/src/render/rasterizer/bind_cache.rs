use ash::vk;

use crate::render::material::MaterialId;

/// Last-bound state within one frame. Never carried across frames.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BindCache {
    pub pipeline: Option<vk::Pipeline>,
    pub material: Option<MaterialId>,
    pub vertex_buffer: Option<vk::Buffer>,
    pub index_buffer: Option<(vk::Buffer, vk::IndexType)>,
}

impl BindCache {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Bind the pipeline; returns true if it changed. A new pipeline
    /// invalidates the material slot.
    pub fn set_pipeline(&mut self, pipeline: vk::Pipeline) -> bool {
        if self.pipeline == Some(pipeline) {
            return false;
        }
        self.pipeline = Some(pipeline);
        self.material = None;
        true
    }

    pub fn set_material(&mut self, material: MaterialId) -> bool {
        replace(&mut self.material, material)
    }

    pub fn set_vertex_buffer(&mut self, buffer: vk::Buffer) -> bool {
        replace(&mut self.vertex_buffer, buffer)
    }

    pub fn set_index_buffer(&mut self, buffer: vk::Buffer, index_type: vk::IndexType) -> bool {
        replace(&mut self.index_buffer, (buffer, index_type))
    }
}

fn replace<T: PartialEq>(slot: &mut Option<T>, value: T) -> bool {
    if slot.as_ref() == Some(&value) {
        false
    } else {
        *slot = Some(value);
        true
    }
}
