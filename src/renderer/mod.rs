//! WebGPU rendering module
//!
//! Instanced, lit meshes over a fullscreen background. Mesh geometry comes from
//! procedural shapes or imported JSON models.

pub mod mesh;
pub mod pipeline;
pub mod shapes;
pub mod vertex;

pub use mesh::{MeshData, MeshError};
pub use pipeline::{Batch, MeshKind, MeshLibrary, RenderError, SceneRenderState, batch_instances};
pub use vertex::{Instance, Vertex};
