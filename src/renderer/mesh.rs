//! Indexed triangle meshes and JSON mesh import
//!
//! Accepts the layout produced by common scene-to-JSON exporters:
//! `{"meshes":[{"vertices":[x,y,z,..],"normals":[x,y,z,..],"faces":[[a,b,c],..]}]}`.
//! All sub-meshes are merged into a single index space.

use glam::Vec3;
use serde::Deserialize;
use thiserror::Error;

use super::vertex::Vertex;

/// Errors raised while importing a mesh
#[derive(Debug, Error)]
pub enum MeshError {
    #[error("invalid mesh JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("mesh contains no triangles")]
    Empty,
    #[error("mesh {mesh}: {field} has {len} floats, not a multiple of 3")]
    Ragged {
        mesh: usize,
        field: &'static str,
        len: usize,
    },
    #[error("mesh {mesh}: {normals} normals for {vertices} vertices")]
    NormalCount {
        mesh: usize,
        vertices: usize,
        normals: usize,
    },
    #[error("mesh {mesh}: face {face} has {len} indices, expected 3")]
    NotTriangle { mesh: usize, face: usize, len: usize },
    #[error("mesh {mesh}: index {index} out of range for {vertices} vertices")]
    IndexOutOfRange {
        mesh: usize,
        index: u32,
        vertices: usize,
    },
}

/// CPU-side mesh ready for upload
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

#[derive(Deserialize)]
struct SceneJson {
    meshes: Vec<MeshJson>,
}

#[derive(Deserialize)]
struct MeshJson {
    vertices: Vec<f32>,
    #[serde(default)]
    normals: Vec<f32>,
    faces: Vec<Vec<u32>>,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Append another mesh, rebasing its indices
    pub fn append(&mut self, other: &MeshData) {
        let base = self.vertices.len() as u32;
        self.vertices.extend_from_slice(&other.vertices);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    /// Parse a JSON mesh description. Missing normals are rebuilt from faces.
    pub fn from_json_str(json: &str) -> Result<Self, MeshError> {
        let scene: SceneJson = serde_json::from_str(json)?;
        let mut merged = MeshData::default();

        for (mesh_index, mesh) in scene.meshes.iter().enumerate() {
            merged.append(&convert_mesh(mesh_index, mesh)?);
        }

        if merged.indices.is_empty() {
            return Err(MeshError::Empty);
        }
        Ok(merged)
    }

    /// Area-weighted vertex normals from the triangle list
    pub fn recompute_normals(&mut self) {
        let mut accum = vec![Vec3::ZERO; self.vertices.len()];
        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| i as usize);
            let pa = Vec3::from(self.vertices[a].position);
            let pb = Vec3::from(self.vertices[b].position);
            let pc = Vec3::from(self.vertices[c].position);
            let n = (pb - pa).cross(pc - pa);
            accum[a] += n;
            accum[b] += n;
            accum[c] += n;
        }
        for (vertex, n) in self.vertices.iter_mut().zip(accum) {
            vertex.normal = n.normalize_or(Vec3::Y).to_array();
        }
    }
}

fn convert_mesh(mesh_index: usize, mesh: &MeshJson) -> Result<MeshData, MeshError> {
    if mesh.vertices.len() % 3 != 0 {
        return Err(MeshError::Ragged {
            mesh: mesh_index,
            field: "vertices",
            len: mesh.vertices.len(),
        });
    }
    if mesh.normals.len() % 3 != 0 {
        return Err(MeshError::Ragged {
            mesh: mesh_index,
            field: "normals",
            len: mesh.normals.len(),
        });
    }

    let vertex_count = mesh.vertices.len() / 3;
    let has_normals = !mesh.normals.is_empty();
    if has_normals && mesh.normals.len() != mesh.vertices.len() {
        return Err(MeshError::NormalCount {
            mesh: mesh_index,
            vertices: vertex_count,
            normals: mesh.normals.len() / 3,
        });
    }

    let vertices = mesh
        .vertices
        .chunks_exact(3)
        .enumerate()
        .map(|(i, p)| {
            let normal = if has_normals {
                [mesh.normals[i * 3], mesh.normals[i * 3 + 1], mesh.normals[i * 3 + 2]]
            } else {
                [0.0, 1.0, 0.0]
            };
            Vertex::new([p[0], p[1], p[2]], normal)
        })
        .collect();

    let mut indices = Vec::with_capacity(mesh.faces.len() * 3);
    for (face_index, face) in mesh.faces.iter().enumerate() {
        if face.len() != 3 {
            return Err(MeshError::NotTriangle {
                mesh: mesh_index,
                face: face_index,
                len: face.len(),
            });
        }
        for &index in face {
            if index as usize >= vertex_count {
                return Err(MeshError::IndexOutOfRange {
                    mesh: mesh_index,
                    index,
                    vertices: vertex_count,
                });
            }
            indices.push(index);
        }
    }

    let mut data = MeshData { vertices, indices };
    if !has_normals {
        data.recompute_normals();
    }
    Ok(data)
}
