//! GPU-resident mesh data
//!
//! Model loading is out of scope here; a [`Model`] only names buffers that
//! were filled elsewhere, the layout of the vertex buffer and the shapes
//! (index ranges) that can be drawn from it.

use ash::vk;

use crate::render::vertex_layout::VertexLayout;
use crate::render::{RenderError, RenderResult};

/// Drawable index range of a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Shape {
    /// First index in the index buffer
    pub first_index: u32,
    /// Number of indices
    pub index_count: u32,
    /// Added to every index before vertex fetch
    pub vertex_offset: i32,
}

impl Shape {
    /// Shape covering `index_count` indices from the start
    pub fn whole(index_count: u32) -> Self {
        Self {
            first_index: 0,
            index_count,
            vertex_offset: 0,
        }
    }

    /// Whether drawing this shape records nothing
    pub fn is_empty(&self) -> bool {
        self.index_count == 0
    }
}

/// Vertex and index buffers with their layout and shape table
#[derive(Debug, Clone)]
pub struct Model {
    vertex_buffer: vk::Buffer,
    index_buffer: vk::Buffer,
    index_type: vk::IndexType,
    vertex_layout: VertexLayout,
    shapes: Vec<Shape>,
}

impl Model {
    /// Model without shapes
    pub fn new(
        vertex_buffer: vk::Buffer,
        index_buffer: vk::Buffer,
        index_type: vk::IndexType,
        vertex_layout: VertexLayout,
    ) -> Self {
        Self {
            vertex_buffer,
            index_buffer,
            index_type,
            vertex_layout,
            shapes: Vec::new(),
        }
    }

    /// Add a shape, returning its index
    pub fn add_shape(&mut self, shape: Shape) -> usize {
        self.shapes.push(shape);
        self.shapes.len() - 1
    }

    /// Builder form of [`Self::add_shape`]
    #[must_use]
    pub fn with_shape(mut self, shape: Shape) -> Self {
        self.add_shape(shape);
        self
    }

    /// Shape by index
    pub fn shape(&self, index: usize) -> RenderResult<Shape> {
        self.shapes
            .get(index)
            .copied()
            .ok_or_else(|| RenderError::NotFound(format!("shape {index} of {} in model", self.shapes.len())))
    }

    /// All shapes
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Vertex buffer handle
    pub fn vertex_buffer(&self) -> vk::Buffer {
        self.vertex_buffer
    }

    /// Index buffer handle
    pub fn index_buffer(&self) -> vk::Buffer {
        self.index_buffer
    }

    /// Index width
    pub fn index_type(&self) -> vk::IndexType {
        self.index_type
    }

    /// Layout of the vertex buffer
    pub fn vertex_layout(&self) -> &VertexLayout {
        &self.vertex_layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_lookup() {
        let model = Model::new(
            vk::Buffer::null(),
            vk::Buffer::null(),
            vk::IndexType::UINT32,
            VertexLayout::new(),
        )
        .with_shape(Shape::whole(36))
        .with_shape(Shape {
            first_index: 36,
            index_count: 0,
            vertex_offset: 24,
        });

        assert_eq!(model.shape(0), Ok(Shape::whole(36)));
        assert!(model.shape(1).unwrap().is_empty());
        assert!(matches!(model.shape(2), Err(RenderError::NotFound(_))));
        assert_eq!(model.shapes().len(), 2);
    }
}
