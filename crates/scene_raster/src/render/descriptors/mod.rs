//! Descriptor resources
//!
//! [`DescriptorWrite`] is the backend-agnostic description of one binding
//! update. [`DescriptorAllocator`] hands out descriptor sets from a chain of
//! growable pools and is reset wholesale once per frame.

mod allocator;

pub use allocator::{DescriptorAllocator, PoolStats};

use ash::vk;
use serde::{Deserialize, Serialize};

/// Descriptor types the engine binds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DescriptorKind {
    /// Uniform buffer
    UniformBuffer,
    /// Storage buffer
    StorageBuffer,
    /// Combined image sampler
    CombinedImageSampler,
    /// Sampled image without sampler
    SampledImage,
    /// Standalone sampler
    Sampler,
}

impl DescriptorKind {
    /// Vulkan descriptor type
    pub fn to_vk(self) -> vk::DescriptorType {
        match self {
            Self::UniformBuffer => vk::DescriptorType::UNIFORM_BUFFER,
            Self::StorageBuffer => vk::DescriptorType::STORAGE_BUFFER,
            Self::CombinedImageSampler => vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
            Self::SampledImage => vk::DescriptorType::SAMPLED_IMAGE,
            Self::Sampler => vk::DescriptorType::SAMPLER,
        }
    }
}

/// One binding update of a descriptor set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorWrite {
    /// Uniform buffer range
    UniformBuffer {
        /// Binding index
        binding: u32,
        /// Source buffer
        buffer: vk::Buffer,
        /// Byte offset into the buffer
        offset: vk::DeviceSize,
        /// Byte length of the range
        range: vk::DeviceSize,
    },
    /// Storage buffer range
    StorageBuffer {
        /// Binding index
        binding: u32,
        /// Source buffer
        buffer: vk::Buffer,
        /// Byte offset into the buffer
        offset: vk::DeviceSize,
        /// Byte length of the range
        range: vk::DeviceSize,
    },
    /// Texture with its sampler
    CombinedImageSampler {
        /// Binding index
        binding: u32,
        /// Sampler
        sampler: vk::Sampler,
        /// Image view
        image_view: vk::ImageView,
        /// Layout the image is in when sampled
        image_layout: vk::ImageLayout,
    },
    /// Texture without sampler
    SampledImage {
        /// Binding index
        binding: u32,
        /// Image view
        image_view: vk::ImageView,
        /// Layout the image is in when sampled
        image_layout: vk::ImageLayout,
    },
    /// Sampler without texture
    Sampler {
        /// Binding index
        binding: u32,
        /// Sampler
        sampler: vk::Sampler,
    },
}

impl DescriptorWrite {
    /// Binding index this write targets
    pub fn binding(&self) -> u32 {
        match *self {
            Self::UniformBuffer { binding, .. }
            | Self::StorageBuffer { binding, .. }
            | Self::CombinedImageSampler { binding, .. }
            | Self::SampledImage { binding, .. }
            | Self::Sampler { binding, .. } => binding,
        }
    }

    /// Descriptor type of this write
    pub fn kind(&self) -> DescriptorKind {
        match self {
            Self::UniformBuffer { .. } => DescriptorKind::UniformBuffer,
            Self::StorageBuffer { .. } => DescriptorKind::StorageBuffer,
            Self::CombinedImageSampler { .. } => DescriptorKind::CombinedImageSampler,
            Self::SampledImage { .. } => DescriptorKind::SampledImage,
            Self::Sampler { .. } => DescriptorKind::Sampler,
        }
    }
}
