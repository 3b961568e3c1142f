//! Per-frame scene globals
//!
//! [`SceneGlobals`] is what the caller hands to the rasterizer once per
//! frame. It is flattened into [`GlobalUniforms`], a std140 block bound at
//! set 0, binding 0.

use bytemuck::{Pod, Zeroable};

use crate::foundation::math::{to_columns, to_padded, Mat4, Vec3};

/// Camera, lighting and time for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct SceneGlobals {
    /// World to view
    pub view: Mat4,
    /// View to clip
    pub projection: Mat4,
    /// Camera position in world space
    pub camera_position: Vec3,
    /// Direction the sunlight travels, world space
    pub sun_direction: Vec3,
    /// Sun color times intensity
    pub sun_color: Vec3,
    /// Ambient light
    pub ambient_color: Vec3,
    /// Seconds since the scene started
    pub time: f32,
}

impl Default for SceneGlobals {
    fn default() -> Self {
        Self {
            view: Mat4::identity(),
            projection: Mat4::identity(),
            camera_position: Vec3::zeros(),
            sun_direction: Vec3::new(0.0, -1.0, 0.0),
            sun_color: Vec3::new(1.0, 1.0, 1.0),
            ambient_color: Vec3::new(0.1, 0.1, 0.1),
            time: 0.0,
        }
    }
}

impl SceneGlobals {
    /// `projection * view`
    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    /// std140 layout of these globals
    pub fn to_uniforms(&self) -> GlobalUniforms {
        let sun_direction = self
            .sun_direction
            .try_normalize(f32::EPSILON)
            .unwrap_or_else(Vec3::zeros);
        GlobalUniforms {
            view: to_columns(&self.view),
            projection: to_columns(&self.projection),
            view_projection: to_columns(&self.view_projection()),
            camera_position: to_padded(&self.camera_position, 1.0),
            sun_direction: to_padded(&sun_direction, 0.0),
            sun_color: to_padded(&self.sun_color, 1.0),
            ambient_color: to_padded(&self.ambient_color, 1.0),
            time: [self.time, 0.0, 0.0, 0.0],
        }
    }
}

/// std140 uniform block for set 0, binding 0
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct GlobalUniforms {
    /// World to view, column-major
    pub view: [[f32; 4]; 4],
    /// View to clip, column-major
    pub projection: [[f32; 4]; 4],
    /// World to clip, column-major
    pub view_projection: [[f32; 4]; 4],
    /// Camera position, w = 1
    pub camera_position: [f32; 4],
    /// Normalized sun direction, w = 0
    pub sun_direction: [f32; 4],
    /// Sun color
    pub sun_color: [f32; 4],
    /// Ambient color
    pub ambient_color: [f32; 4],
    /// Seconds in `x`, rest is padding
    pub time: [f32; 4],
}

impl GlobalUniforms {
    /// Size of the block in bytes
    pub const SIZE: usize = std::mem::size_of::<Self>();

    /// Raw bytes for upload
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_block_is_std140_sized() {
        assert_eq!(GlobalUniforms::SIZE, 272);
        assert_eq!(GlobalUniforms::SIZE % 16, 0);
        assert_eq!(SceneGlobals::default().to_uniforms().as_bytes().len(), 272);
    }

    #[test]
    fn test_view_projection_is_projection_times_view() {
        let globals = SceneGlobals {
            view: Mat4::new_translation(&Vec3::new(0.0, 0.0, -5.0)),
            projection: Mat4::new_perspective(16.0 / 9.0, 1.0, 0.1, 100.0),
            ..SceneGlobals::default()
        };
        let uniforms = globals.to_uniforms();
        let expected = to_columns(&(globals.projection * globals.view));
        for (column, expected) in uniforms.view_projection.iter().zip(expected.iter()) {
            for (value, expected) in column.iter().zip(expected.iter()) {
                assert_relative_eq!(*value, *expected);
            }
        }
    }

    #[test]
    fn test_sun_direction_is_normalized() {
        let globals = SceneGlobals {
            sun_direction: Vec3::new(3.0, 0.0, 4.0),
            time: 2.5,
            ..SceneGlobals::default()
        };
        let uniforms = globals.to_uniforms();
        assert_relative_eq!(uniforms.sun_direction[0], 0.6);
        assert_relative_eq!(uniforms.sun_direction[2], 0.8);
        assert_relative_eq!(uniforms.sun_direction[3], 0.0);
        assert_relative_eq!(uniforms.time[0], 2.5);
    }
}
