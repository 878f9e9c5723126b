//! Renderable output and GPU interfaces

pub mod context;
pub mod mesh;

pub use context::GpuContext;
pub use mesh::ChunkMesh;
