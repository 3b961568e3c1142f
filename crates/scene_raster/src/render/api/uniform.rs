use ash::vk;

use crate::render::{RenderError, RenderResult};

/// Host-writable buffer backing the global uniform ring
pub trait UniformTarget: Send {
    /// Buffer handle bound in descriptor writes
    fn buffer(&self) -> vk::Buffer;

    /// Size in bytes
    fn capacity(&self) -> vk::DeviceSize;

    /// Copy `bytes` to `offset`
    fn write(&mut self, offset: vk::DeviceSize, bytes: &[u8]) -> RenderResult<()>;
}

/// Uniform buffer kept in host memory
#[derive(Debug, Clone)]
pub struct HostUniformBuffer {
    buffer: vk::Buffer,
    bytes: Vec<u8>,
}

impl HostUniformBuffer {
    /// Zeroed buffer of `capacity` bytes named by `buffer`
    pub fn new(buffer: vk::Buffer, capacity: usize) -> Self {
        Self {
            buffer,
            bytes: vec![0; capacity],
        }
    }

    /// Current contents
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// `len` bytes starting at `offset`, if in range
    pub fn read(&self, offset: usize, len: usize) -> Option<&[u8]> {
        self.bytes.get(offset..offset.checked_add(len)?)
    }
}

impl UniformTarget for HostUniformBuffer {
    fn buffer(&self) -> vk::Buffer {
        self.buffer
    }

    fn capacity(&self) -> vk::DeviceSize {
        self.bytes.len() as vk::DeviceSize
    }

    fn write(&mut self, offset: vk::DeviceSize, bytes: &[u8]) -> RenderResult<()> {
        let region = checked_region(offset, bytes.len(), self.bytes.len())?;
        self.bytes[region].copy_from_slice(bytes);
        Ok(())
    }
}

/// Byte range `offset..offset + len` if it fits in `capacity`
pub(crate) fn checked_region(
    offset: vk::DeviceSize,
    len: usize,
    capacity: usize,
) -> RenderResult<std::ops::Range<usize>> {
    usize::try_from(offset)
        .ok()
        .and_then(|start| Some(start..start.checked_add(len)?))
        .filter(|range| range.end <= capacity)
        .ok_or_else(|| {
            RenderError::BadConfig(format!(
                "uniform write of {len} bytes at offset {offset} exceeds {capacity} bytes"
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_back() {
        let mut uniforms = HostUniformBuffer::new(vk::Buffer::null(), 16);
        uniforms.write(4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(uniforms.read(4, 4), Some(&[1u8, 2, 3, 4][..]));
        assert_eq!(uniforms.bytes()[0], 0);
        assert_eq!(uniforms.capacity(), 16);
    }

    #[test]
    fn test_out_of_range_write_is_rejected() {
        let mut uniforms = HostUniformBuffer::new(vk::Buffer::null(), 8);
        assert!(matches!(uniforms.write(6, &[0; 4]), Err(RenderError::BadConfig(_))));
        assert!(uniforms.write(u64::MAX, &[0]).is_err());
        assert!(uniforms.bytes().iter().all(|b| *b == 0));
        assert!(uniforms.read(6, 4).is_none());
    }
}
