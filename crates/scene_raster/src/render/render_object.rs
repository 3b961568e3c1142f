//! Render objects
//!
//! The unit the rasterizer consumes: one shape of one model, drawn with one
//! material at one transform.

use ash::vk;

use crate::foundation::math::Mat4;
use crate::render::material::Material;
use crate::render::model::{Model, Shape};
use crate::render::RenderResult;

/// One draw request
#[derive(Debug, Clone, Copy)]
pub struct RenderObject<'a> {
    /// Material to draw with
    pub material: &'a Material,
    /// Model supplying vertex and index buffers
    pub model: &'a Model,
    /// Index range to draw
    pub shape: Shape,
    /// Per-object descriptor set bound at set 2
    pub object_set: Option<vk::DescriptorSet>,
    /// Model to world
    pub transform: Mat4,
}

impl<'a> RenderObject<'a> {
    /// Draw `shape` of `model` with `material` at `transform`
    pub fn new(material: &'a Material, model: &'a Model, shape: Shape, transform: Mat4) -> Self {
        Self {
            material,
            model,
            shape,
            object_set: None,
            transform,
        }
    }

    /// Draw shape `index` of the model's shape table
    pub fn from_shape_index(
        material: &'a Material,
        model: &'a Model,
        index: usize,
        transform: Mat4,
    ) -> RenderResult<Self> {
        Ok(Self::new(material, model, model.shape(index)?, transform))
    }

    /// Attach a per-object descriptor set
    #[must_use]
    pub fn with_object_set(mut self, set: vk::DescriptorSet) -> Self {
        self.object_set = Some(set);
        self
    }
}
