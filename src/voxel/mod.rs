//! Voxel lattice data structures and editing

pub mod chunk;
pub mod stencil;
pub mod edit;
pub mod map;

pub use chunk::{ChunkCoord, ChunkNeighbors, VoxelChunk};
pub use stencil::{FillType, Stencil, StencilShape};
pub use edit::{AffectedRange, EditQueue, EditReport, EditRequest};
pub use map::VoxelMap;
