//! voxmap - editable 2D voxel maps triangulated with marching squares

pub mod core;
pub mod voxel;
pub mod triangulate;
pub mod render;
