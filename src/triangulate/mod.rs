//! Marching-squares triangulation of voxel chunks

pub mod kernel;
pub mod state;
pub mod cpu;
pub mod gpu;
pub mod resources;
pub mod pipeline;

pub use kernel::{Triangle, KernelParams, TriangulationKernel, max_triangles};
pub use state::StateBuffer;
pub use cpu::CpuKernel;
pub use gpu::GpuKernel;
pub use resources::{BufferShape, TriangulationResources};
pub use pipeline::{TriangulationPipeline, TriangulationStats};
