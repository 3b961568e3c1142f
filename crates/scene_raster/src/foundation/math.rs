//! Math utilities and types
//!
//! Provides the math types shared by the scene graph, the scene globals and
//! the push-constant path.

pub use nalgebra::{Matrix4, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// Column-major `[[f32; 4]; 4]` as GLSL expects it in std140 blocks.
pub fn to_columns(matrix: &Mat4) -> [[f32; 4]; 4] {
    let mut columns = [[0.0; 4]; 4];
    for (c, column) in columns.iter_mut().enumerate() {
        for (r, value) in column.iter_mut().enumerate() {
            *value = matrix[(r, c)];
        }
    }
    columns
}

/// Pads a 3-vector to a std140 `vec4` slot.
pub fn to_padded(vector: &Vec3, w: f32) -> [f32; 4] {
    [vector.x, vector.y, vector.z, w]
}
