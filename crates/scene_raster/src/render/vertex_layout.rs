//! Vertex layout registry
//!
//! A [`VertexLayout`] is an ordered table of vertex attributes. Each
//! component is appended at the current stride, so offsets are always the
//! prefix sums of the component sizes. Models carry the layout of their
//! vertex buffer, materials carry the layout their pipeline consumes, and the
//! rasterizer refuses to draw a model whose layout does not contain the
//! material's.

use ash::vk;
use serde::{Deserialize, Serialize};

use crate::render::{RenderError, RenderResult};

/// Semantic tag of a vertex attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VertexComponentKind {
    /// Object-space position
    Position,
    /// Surface normal
    Normal,
    /// Tangent frame
    Tangent,
    /// Texture coordinate set `n`
    TexCoord(u8),
    /// Vertex color
    Color,
    /// Skinning bone indices
    BoneIndex,
    /// Skinning bone weights
    BoneWeight,
    /// Application-defined attribute `n`
    Custom(u8),
}

/// How two layouts are compared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LayoutMatching {
    /// Every kind must be present with the same format
    #[default]
    Strict,
    /// Every kind must be present; formats are not compared
    PresenceOnly,
}

/// One attribute of a vertex
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VertexComponent {
    /// Semantic tag
    pub kind: VertexComponentKind,
    /// Attribute format
    pub format: vk::Format,
    /// Byte offset from the start of the vertex
    pub offset: u32,
}

/// Ordered table of vertex attributes with a total stride
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VertexLayout {
    components: Vec<VertexComponent>,
    stride: u32,
}

impl VertexLayout {
    /// Empty layout
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a layout from `(kind, format)` pairs in order
    pub fn from_components(
        components: impl IntoIterator<Item = (VertexComponentKind, vk::Format)>,
    ) -> RenderResult<Self> {
        let mut layout = Self::new();
        for (kind, format) in components {
            layout.push_component(kind, format)?;
        }
        Ok(layout)
    }

    /// Append a component at the current stride.
    ///
    /// A kind may appear only once, and the format must have a known size.
    pub fn push_component(&mut self, kind: VertexComponentKind, format: vk::Format) -> RenderResult<()> {
        if self.find(kind).is_some() {
            return Err(RenderError::BadConfig(format!(
                "vertex component {kind:?} pushed twice"
            )));
        }
        let size = format_size(format).ok_or_else(|| {
            RenderError::BadConfig(format!("vertex format {format:?} has no known size"))
        })?;

        self.components.push(VertexComponent {
            kind,
            format,
            offset: self.stride,
        });
        self.stride += size;
        Ok(())
    }

    /// Strict containment: every kind of `other` is present here with the
    /// same format.
    pub fn contains(&self, other: &Self) -> bool {
        self.contains_with(other, LayoutMatching::Strict)
    }

    /// Containment under an explicit matching mode
    pub fn contains_with(&self, other: &Self, matching: LayoutMatching) -> bool {
        other.components.iter().all(|wanted| match self.find(wanted.kind) {
            Some(found) => matching == LayoutMatching::PresenceOnly || found.format == wanted.format,
            None => false,
        })
    }

    /// Kinds of `other` this layout cannot satisfy
    pub fn missing_from(&self, other: &Self, matching: LayoutMatching) -> Vec<VertexComponentKind> {
        other
            .components
            .iter()
            .filter(|wanted| match self.find(wanted.kind) {
                Some(found) => matching == LayoutMatching::Strict && found.format != wanted.format,
                None => true,
            })
            .map(|wanted| wanted.kind)
            .collect()
    }

    /// Format of a component
    pub fn component_format(&self, kind: VertexComponentKind) -> RenderResult<vk::Format> {
        self.find(kind)
            .map(|c| c.format)
            .ok_or_else(|| RenderError::NotFound(format!("vertex component {kind:?}")))
    }

    /// Byte offset of a component
    pub fn component_offset(&self, kind: VertexComponentKind) -> RenderResult<u32> {
        self.find(kind)
            .map(|c| c.offset)
            .ok_or_else(|| RenderError::NotFound(format!("vertex component {kind:?}")))
    }

    /// Remove every component and reset the stride
    pub fn clear(&mut self) {
        self.components.clear();
        self.stride = 0;
    }

    /// Total bytes per vertex
    pub fn stride(&self) -> u32 {
        self.stride
    }

    /// Components in push order
    pub fn components(&self) -> &[VertexComponent] {
        &self.components
    }

    /// Whether the layout has no components
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Get Vulkan vertex input descriptions for a single interleaved buffer.
    ///
    /// Shader locations follow component order.
    pub fn input_state(
        &self,
        binding: u32,
    ) -> (vk::VertexInputBindingDescription, Vec<vk::VertexInputAttributeDescription>) {
        let binding_description = vk::VertexInputBindingDescription {
            binding,
            stride: self.stride,
            input_rate: vk::VertexInputRate::VERTEX,
        };
        let attributes = self
            .components
            .iter()
            .zip(0u32..)
            .map(|(component, location)| vk::VertexInputAttributeDescription {
                location,
                binding,
                format: component.format,
                offset: component.offset,
            })
            .collect();
        (binding_description, attributes)
    }

    fn find(&self, kind: VertexComponentKind) -> Option<&VertexComponent> {
        self.components.iter().find(|c| c.kind == kind)
    }
}

/// Byte size of the vertex formats this crate understands
pub fn format_size(format: vk::Format) -> Option<u32> {
    let size = match format {
        vk::Format::R8_UNORM | vk::Format::R8_SNORM | vk::Format::R8_UINT | vk::Format::R8_SINT => 1,
        vk::Format::R8G8_UNORM
        | vk::Format::R8G8_SNORM
        | vk::Format::R8G8_UINT
        | vk::Format::R8G8_SINT
        | vk::Format::R16_UNORM
        | vk::Format::R16_SNORM
        | vk::Format::R16_UINT
        | vk::Format::R16_SINT
        | vk::Format::R16_SFLOAT => 2,
        vk::Format::R8G8B8_UNORM | vk::Format::R8G8B8_UINT => 3,
        vk::Format::R8G8B8A8_UNORM
        | vk::Format::R8G8B8A8_SNORM
        | vk::Format::R8G8B8A8_UINT
        | vk::Format::R8G8B8A8_SINT
        | vk::Format::B8G8R8A8_UNORM
        | vk::Format::A2B10G10R10_UNORM_PACK32
        | vk::Format::R16G16_UNORM
        | vk::Format::R16G16_SNORM
        | vk::Format::R16G16_UINT
        | vk::Format::R16G16_SINT
        | vk::Format::R16G16_SFLOAT
        | vk::Format::R32_UINT
        | vk::Format::R32_SINT
        | vk::Format::R32_SFLOAT => 4,
        vk::Format::R16G16B16_SFLOAT => 6,
        vk::Format::R16G16B16A16_UNORM
        | vk::Format::R16G16B16A16_SNORM
        | vk::Format::R16G16B16A16_UINT
        | vk::Format::R16G16B16A16_SINT
        | vk::Format::R16G16B16A16_SFLOAT
        | vk::Format::R32G32_UINT
        | vk::Format::R32G32_SINT
        | vk::Format::R32G32_SFLOAT => 8,
        vk::Format::R32G32B32_UINT | vk::Format::R32G32B32_SINT | vk::Format::R32G32B32_SFLOAT => 12,
        vk::Format::R32G32B32A32_UINT
        | vk::Format::R32G32B32A32_SINT
        | vk::Format::R32G32B32A32_SFLOAT => 16,
        _ => return None,
    };
    Some(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use VertexComponentKind::{Color, Normal, Position, TexCoord};

    fn layout(components: &[(VertexComponentKind, vk::Format)]) -> VertexLayout {
        VertexLayout::from_components(components.iter().copied()).unwrap()
    }

    fn pnt() -> VertexLayout {
        layout(&[
            (Position, vk::Format::R32G32B32_SFLOAT),
            (Normal, vk::Format::R32G32B32_SFLOAT),
            (TexCoord(0), vk::Format::R32G32_SFLOAT),
        ])
    }

    #[test]
    fn test_offsets_are_prefix_sums() {
        let l = layout(&[
            (Position, vk::Format::R32G32B32_SFLOAT),
            (Color, vk::Format::R8G8B8A8_UNORM),
            (TexCoord(0), vk::Format::R16G16_SFLOAT),
            (Normal, vk::Format::R32G32B32A32_SFLOAT),
        ]);

        let mut expected_offset = 0;
        for component in l.components() {
            assert_eq!(component.offset, expected_offset);
            expected_offset += format_size(component.format).unwrap();
        }
        assert_eq!(l.stride(), expected_offset);
        assert_eq!(l.stride(), 12 + 4 + 4 + 16);
    }

    #[test]
    fn test_lookup_by_kind() {
        let l = pnt();
        assert_eq!(l.component_offset(Normal), Ok(12));
        assert_eq!(l.component_format(TexCoord(0)), Ok(vk::Format::R32G32_SFLOAT));
        assert!(matches!(l.component_offset(Color), Err(RenderError::NotFound(_))));
        assert!(matches!(l.component_format(TexCoord(1)), Err(RenderError::NotFound(_))));
    }

    #[test]
    fn test_duplicate_kind_is_rejected() {
        let mut l = pnt();
        let result = l.push_component(Normal, vk::Format::R32G32B32_SFLOAT);
        assert!(matches!(result, Err(RenderError::BadConfig(_))));
        assert_eq!(l.components().len(), 3);
        assert_eq!(l.stride(), 32);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let mut l = VertexLayout::new();
        assert!(l.push_component(Position, vk::Format::D32_SFLOAT).is_err());
        assert!(l.is_empty());
    }

    #[test]
    fn test_clear_resets_stride() {
        let mut l = pnt();
        l.clear();
        assert!(l.is_empty());
        assert_eq!(l.stride(), 0);
        l.push_component(Color, vk::Format::R8G8B8A8_UNORM).unwrap();
        assert_eq!(l.component_offset(Color), Ok(0));
    }

    #[test]
    fn test_containment_is_reflexive() {
        for l in [VertexLayout::new(), pnt(), layout(&[(Color, vk::Format::R8G8B8A8_UNORM)])] {
            assert!(l.contains(&l));
            assert!(l.contains_with(&l, LayoutMatching::PresenceOnly));
        }
    }

    #[test]
    fn test_containment_is_transitive() {
        let a = pnt();
        let b = layout(&[
            (Normal, vk::Format::R32G32B32_SFLOAT),
            (Position, vk::Format::R32G32B32_SFLOAT),
        ]);
        let c = layout(&[(Position, vk::Format::R32G32B32_SFLOAT)]);

        assert!(a.contains(&b));
        assert!(b.contains(&c));
        assert!(a.contains(&c));
        assert!(!c.contains(&a));
    }

    #[test]
    fn test_strict_mode_compares_formats() {
        let model = layout(&[(Position, vk::Format::R16G16B16A16_SFLOAT)]);
        let material = layout(&[(Position, vk::Format::R32G32B32_SFLOAT)]);

        assert!(!model.contains(&material));
        assert!(model.contains_with(&material, LayoutMatching::PresenceOnly));
        assert_eq!(model.missing_from(&material, LayoutMatching::Strict), vec![Position]);
        assert!(model.missing_from(&material, LayoutMatching::PresenceOnly).is_empty());
    }

    #[test]
    fn test_missing_component_breaks_containment() {
        let model = layout(&[(Position, vk::Format::R32G32B32_SFLOAT)]);
        let material = layout(&[
            (Position, vk::Format::R32G32B32_SFLOAT),
            (Normal, vk::Format::R32G32B32_SFLOAT),
        ]);
        assert!(!model.contains_with(&material, LayoutMatching::PresenceOnly));
        assert_eq!(model.missing_from(&material, LayoutMatching::PresenceOnly), vec![Normal]);
    }

    #[test]
    fn test_input_state_matches_layout() {
        let (binding, attributes) = pnt().input_state(0);
        assert_eq!(binding.stride, 32);
        assert_eq!(binding.input_rate, vk::VertexInputRate::VERTEX);
        assert_eq!(attributes.len(), 3);
        assert_eq!(attributes[2].location, 2);
        assert_eq!(attributes[2].offset, 24);
        assert_eq!(attributes[1].format, vk::Format::R32G32B32_SFLOAT);
    }
}
