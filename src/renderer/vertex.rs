//! Vertex and instance types for 3D mesh rendering

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};

/// Mesh vertex with position and normal
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    pub const fn new(position: [f32; 3], normal: [f32; 3]) -> Self {
        Self { position, normal }
    }

    pub fn from_vecs(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Per-object instance data: world matrix columns and a material color
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Instance {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

impl Instance {
    pub fn new(model: &Mat4, color: [f32; 4]) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            color,
        }
    }

    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 5] = wgpu::vertex_attr_array![
            2 => Float32x4,
            3 => Float32x4,
            4 => Float32x4,
            5 => Float32x4,
            6 => Float32x4,
        ];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Instance>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &ATTRIBUTES,
        }
    }
}

/// Material colors
pub mod colors {
    pub const CHASSIS: [f32; 4] = [0.85, 0.12, 0.1, 1.0];
    pub const WHEEL: [f32; 4] = [0.12, 0.12, 0.14, 1.0];
    pub const SPHERE: [f32; 4] = [0.95, 0.75, 0.2, 1.0];
    pub const PUSHED_SPHERE: [f32; 4] = [1.0, 0.45, 0.15, 1.0];
    pub const ROAD: [f32; 4] = [0.35, 0.35, 0.38, 1.0];
    pub const SPARK: [f32; 4] = [1.0, 0.9, 0.5, 1.0];
    /// Clear color behind the background gradient
    pub const BACKGROUND: [f32; 4] = [0.3, 0.0, 0.3, 1.0];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_layout_matches_size() {
        assert_eq!(std::mem::size_of::<Instance>(), 80);
        assert_eq!(std::mem::size_of::<Vertex>(), 24);
    }

    #[test]
    fn test_instance_keeps_translation_column() {
        let model = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        let instance = Instance::new(&model, colors::SPHERE);
        assert_eq!(instance.model[3], [1.0, 2.0, 3.0, 1.0]);
    }
}
