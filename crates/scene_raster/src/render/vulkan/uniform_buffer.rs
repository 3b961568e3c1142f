//! Host-visible uniform buffer

use ash::{vk, Device, Instance};

use crate::render::api::UniformTarget;
use crate::render::{RenderError, RenderResult};

/// Uniform buffer in host-visible, host-coherent memory.
///
/// Each write maps the touched range, copies and unmaps.
pub struct MappedUniformBuffer {
    device: Device,
    buffer: vk::Buffer,
    memory: vk::DeviceMemory,
    size: vk::DeviceSize,
}

impl MappedUniformBuffer {
    /// Create a buffer of `size` bytes with memory allocation
    pub fn new(
        device: Device,
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
        size: vk::DeviceSize,
    ) -> RenderResult<Self> {
        let buffer_info = vk::BufferCreateInfo::builder()
            .size(size)
            .usage(vk::BufferUsageFlags::UNIFORM_BUFFER)
            .sharing_mode(vk::SharingMode::EXCLUSIVE);

        let buffer = unsafe { device.create_buffer(&buffer_info, None) }
            .map_err(|e| RenderError::from_vk(e, "create uniform buffer"))?;

        let requirements = unsafe { device.get_buffer_memory_requirements(buffer) };
        let memory_properties = unsafe { instance.get_physical_device_memory_properties(physical_device) };
        let wanted = vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT;
        let Some(memory_type_index) = find_memory_type(&memory_properties, requirements.memory_type_bits, wanted)
        else {
            unsafe { device.destroy_buffer(buffer, None) };
            return Err(RenderError::AllocationFailed(
                "no host-visible coherent memory type for uniform buffer".to_string(),
            ));
        };

        let alloc_info = vk::MemoryAllocateInfo::builder()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type_index);
        let memory = match unsafe { device.allocate_memory(&alloc_info, None) } {
            Ok(memory) => memory,
            Err(e) => {
                unsafe { device.destroy_buffer(buffer, None) };
                return Err(RenderError::from_vk(e, "allocate uniform memory"));
            }
        };

        if let Err(e) = unsafe { device.bind_buffer_memory(buffer, memory, 0) } {
            unsafe {
                device.destroy_buffer(buffer, None);
                device.free_memory(memory, None);
            }
            return Err(RenderError::from_vk(e, "bind uniform memory"));
        }

        log::debug!("Created {} byte uniform buffer {:?}", size, buffer);
        Ok(Self {
            device,
            buffer,
            memory,
            size,
        })
    }
}

impl UniformTarget for MappedUniformBuffer {
    fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    fn capacity(&self) -> vk::DeviceSize {
        self.size
    }

    fn write(&mut self, offset: vk::DeviceSize, bytes: &[u8]) -> RenderResult<()> {
        let capacity = usize::try_from(self.size).unwrap_or(usize::MAX);
        let region = crate::render::api::checked_region(offset, bytes.len(), capacity)?;
        let len = region.len() as vk::DeviceSize;

        let mapped = unsafe {
            self.device
                .map_memory(self.memory, offset, len, vk::MemoryMapFlags::empty())
        }
        .map_err(|e| RenderError::from_vk(e, "map uniform memory"))?;

        unsafe {
            std::ptr::copy_nonoverlapping(bytes.as_ptr(), mapped.cast::<u8>(), bytes.len());
            self.device.unmap_memory(self.memory);
        }
        Ok(())
    }
}

impl Drop for MappedUniformBuffer {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_buffer(self.buffer, None);
            self.device.free_memory(self.memory, None);
        }
    }
}

/// Find memory type with required properties
fn find_memory_type(
    properties: &vk::PhysicalDeviceMemoryProperties,
    type_filter: u32,
    wanted: vk::MemoryPropertyFlags,
) -> Option<u32> {
    (0..properties.memory_type_count).find(|&i| {
        (type_filter & (1 << i)) != 0
            && properties.memory_types[i as usize].property_flags.contains(wanted)
    })
}
