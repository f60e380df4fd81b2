//! Procedural mesh generation
//!
//! Fallback geometry for every object kind. Dimensions are in object space; the
//! object's scale is applied by its world matrix.

use glam::Vec3;
use std::f32::consts::{PI, TAU};

use super::mesh::MeshData;
use super::vertex::Vertex;

/// Chassis body half-extents (sits between the wheels)
pub const CHASSIS_HALF_EXTENTS: Vec3 = Vec3::new(6.0, 2.5, 17.0);
/// Wheel radius; puts the tyre bottom on the road surface
pub const WHEEL_RADIUS: f32 = 3.0;
pub const WHEEL_HALF_WIDTH: f32 = 1.2;

/// Axis-aligned box with flat-shaded faces
pub fn cuboid(half: Vec3) -> MeshData {
    // (normal, tangent u, tangent v) with u x v = normal
    let faces = [
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];

    let mut mesh = MeshData::default();
    for (normal, u, v) in faces {
        let base = mesh.vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = (normal + u * su + v * sv) * half;
            mesh.vertices.push(Vertex::from_vecs(p, normal));
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

/// Car body
pub fn chassis() -> MeshData {
    cuboid(CHASSIS_HALF_EXTENTS)
}

/// Small debris cube
pub fn spark() -> MeshData {
    cuboid(Vec3::splat(0.5))
}

/// Cylinder whose axis is x, so spinning about x (pitch) rolls it
pub fn wheel(segments: u32) -> MeshData {
    cylinder_x(WHEEL_RADIUS, WHEEL_HALF_WIDTH, segments.max(3))
}

fn cylinder_x(radius: f32, half_width: f32, segments: u32) -> MeshData {
    let mut mesh = MeshData::default();

    // Side
    for i in 0..=segments {
        let theta = i as f32 / segments as f32 * TAU;
        let radial = Vec3::new(0.0, theta.cos(), theta.sin());
        for x in [-half_width, half_width] {
            let p = Vec3::new(x, 0.0, 0.0) + radial * radius;
            mesh.vertices.push(Vertex::from_vecs(p, radial));
        }
    }
    for i in 0..segments {
        let a = i * 2;
        mesh.indices
            .extend_from_slice(&[a, a + 2, a + 1, a + 1, a + 2, a + 3]);
    }

    // Caps
    for side in [-1.0f32, 1.0] {
        let normal = Vec3::X * side;
        let center = mesh.vertices.len() as u32;
        mesh.vertices
            .push(Vertex::from_vecs(normal * half_width, normal));
        for i in 0..segments {
            let theta = i as f32 / segments as f32 * TAU;
            let p = Vec3::new(side * half_width, theta.cos() * radius, theta.sin() * radius);
            mesh.vertices.push(Vertex::from_vecs(p, normal));
        }
        for i in 0..segments {
            let a = center + 1 + i;
            let b = center + 1 + (i + 1) % segments;
            if side > 0.0 {
                mesh.indices.extend_from_slice(&[center, a, b]);
            } else {
                mesh.indices.extend_from_slice(&[center, b, a]);
            }
        }
    }

    mesh
}

/// UV sphere of diameter 1 (radius 0.5), so scale equals diameter
pub fn uv_sphere(segments: u32, rings: u32) -> MeshData {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut mesh = MeshData::default();

    for ring in 0..=rings {
        let phi = ring as f32 / rings as f32 * PI;
        for seg in 0..=segments {
            let theta = seg as f32 / segments as f32 * TAU;
            let n = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
            mesh.vertices.push(Vertex::from_vecs(n * 0.5, n));
        }
    }

    let stride = segments + 1;
    for ring in 0..rings {
        for seg in 0..segments {
            let a = ring * stride + seg;
            let b = a + stride;
            mesh.indices
                .extend_from_slice(&[a, a + 1, b, a + 1, b + 1, b]);
        }
    }
    mesh
}

/// Unit quad in the xy-plane at z = 0.5, facing -z
pub fn road_quad() -> MeshData {
    let normal = Vec3::NEG_Z;
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
    MeshData {
        vertices: corners
            .iter()
            .map(|&(x, y)| Vertex::from_vecs(Vec3::new(x, y, 0.5), normal))
            .collect(),
        indices: vec![0, 2, 1, 0, 3, 2],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn indices_valid(mesh: &MeshData) -> bool {
        mesh.indices.len() % 3 == 0
            && mesh
                .indices
                .iter()
                .all(|&i| (i as usize) < mesh.vertices.len())
    }

    #[test]
    fn test_cuboid_bounds() {
        let mesh = cuboid(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        assert!(indices_valid(&mesh));
        for v in &mesh.vertices {
            let p = Vec3::from(v.position);
            assert!((p.x.abs() - 1.0).abs() < 1e-6);
            assert!((p.y.abs() - 2.0).abs() < 1e-6);
            assert!((p.z.abs() - 3.0).abs() < 1e-6);
            // The normal points out of the face the vertex lies on
            assert!(p.dot(Vec3::from(v.normal)) > 0.0);
        }
    }

    #[test]
    fn test_sphere_radius_and_normals() {
        let mesh = uv_sphere(16, 8);
        assert!(indices_valid(&mesh));
        for v in &mesh.vertices {
            let p = Vec3::from(v.position);
            let n = Vec3::from(v.normal);
            assert!((p.length() - 0.5).abs() < 1e-5);
            assert!((n.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_wheel_touches_road() {
        let mesh = wheel(12);
        assert!(indices_valid(&mesh));
        let lowest = mesh
            .vertices
            .iter()
            .map(|v| v.position[1])
            .fold(f32::INFINITY, f32::min);
        // Wheel hub sits 3 below the chassis; the road surface is at y = -6
        assert!((crate::consts::WHEEL_Y + lowest - -6.0).abs() < 1e-4);
    }

    #[test]
    fn test_road_quad_plane() {
        let mesh = road_quad();
        assert_eq!(mesh.triangle_count(), 2);
        assert!(mesh.vertices.iter().all(|v| v.position[2] == 0.5));
    }
}
