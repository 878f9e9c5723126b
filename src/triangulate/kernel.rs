//! Triangulation kernel boundary.
//!
//! A kernel consumes one chunk's state buffer and appends an unordered list
//! of triangles to a capacity-bounded output, counting every triangle it
//! produced (including any that did not fit). The caller reads the count
//! first and then exactly that many records.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;

use crate::core::types::Result;

/// Workgroup edge used by the compute kernel; cells are dispatched in
/// `WORKGROUP_SIZE`×`WORKGROUP_SIZE` tiles.
pub const WORKGROUP_SIZE: u32 = 8;

/// Most triangles any single marching-squares cell emits
pub const MAX_TRIANGLES_PER_CELL: u32 = 3;

/// Output capacity for one chunk of `voxel_resolution` voxels per edge.
///
/// The (R+1)×(R+1) state grid has R×R cells.
pub fn max_triangles(voxel_resolution: u32) -> u32 {
    MAX_TRIANGLES_PER_CELL * voxel_resolution * voxel_resolution
}

/// One output triangle in normalized lattice space.
///
/// Layout matches the `Triangle` struct of the compute shader (24 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Triangle {
    pub a: Vec2,
    pub b: Vec2,
    pub c: Vec2,
}

impl Triangle {
    pub fn new(a: Vec2, b: Vec2, c: Vec2) -> Self {
        Self { a, b, c }
    }

    pub fn vertices(&self) -> [Vec2; 3] {
        [self.a, self.b, self.c]
    }

    /// Signed area, positive for counter-clockwise winding
    pub fn signed_area(&self) -> f32 {
        (self.b - self.a).perp_dot(self.c - self.a) * 0.5
    }
}

/// Uniform parameters of one dispatch
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct KernelParams {
    pub voxel_resolution: u32,
    pub chunk_resolution: u32,
    /// Triangle slots in the output buffer
    pub capacity: u32,
    pub _pad: u32,
}

impl KernelParams {
    pub fn new(voxel_resolution: u32, chunk_resolution: u32, capacity: u32) -> Self {
        Self {
            voxel_resolution,
            chunk_resolution,
            capacity,
            _pad: 0,
        }
    }

    /// Workgroups per axis covering R cells
    pub fn workgroups(&self) -> u32 {
        self.voxel_resolution.div_ceil(WORKGROUP_SIZE)
    }

    /// Factor mapping a grid position to normalized lattice space
    pub fn inverse_extent(&self) -> f32 {
        1.0 / (self.voxel_resolution * self.chunk_resolution) as f32
    }
}

// ---------------------------------------------------------------------------
// Marching-squares case table (mirrored in shaders/marching_squares.wgsl)
// ---------------------------------------------------------------------------

/// Cell-relative positions, counter-clockwise from the lower-left corner:
/// corners at even indices, edge midpoints at odd indices.
pub const CELL_POINTS: [Vec2; 8] = [
    Vec2::new(0.0, 0.0),
    Vec2::new(0.5, 0.0),
    Vec2::new(1.0, 0.0),
    Vec2::new(1.0, 0.5),
    Vec2::new(1.0, 1.0),
    Vec2::new(0.5, 1.0),
    Vec2::new(0.0, 1.0),
    Vec2::new(0.0, 0.5),
];

/// Triangles emitted per case
pub const CASE_COUNTS: [u8; 16] = [0, 1, 1, 2, 1, 2, 2, 3, 1, 2, 2, 3, 2, 3, 3, 2];

/// Triangles per case as `CELL_POINTS` indices; unused slots are zero.
///
/// Case bits: 1 = lower-left, 2 = lower-right, 4 = upper-left, 8 = upper-right.
/// Opposite-corner cases (6, 9) keep the corners separate.
pub static CASE_TRIANGLES: [[[u8; 3]; 3]; 16] = [
    [[0, 0, 0], [0, 0, 0], [0, 0, 0]],
    [[0, 1, 7], [0, 0, 0], [0, 0, 0]],
    [[1, 2, 3], [0, 0, 0], [0, 0, 0]],
    [[0, 2, 3], [0, 3, 7], [0, 0, 0]],
    [[7, 5, 6], [0, 0, 0], [0, 0, 0]],
    [[0, 1, 5], [0, 5, 6], [0, 0, 0]],
    [[1, 2, 3], [7, 5, 6], [0, 0, 0]],
    [[0, 2, 3], [0, 3, 5], [0, 5, 6]],
    [[3, 4, 5], [0, 0, 0], [0, 0, 0]],
    [[0, 1, 7], [3, 4, 5], [0, 0, 0]],
    [[1, 2, 4], [1, 4, 5], [0, 0, 0]],
    [[0, 2, 4], [0, 4, 5], [0, 5, 7]],
    [[7, 3, 4], [7, 4, 6], [0, 0, 0]],
    [[0, 1, 3], [0, 3, 4], [0, 4, 6]],
    [[1, 2, 4], [1, 4, 6], [1, 6, 7]],
    [[0, 2, 4], [0, 4, 6], [0, 0, 0]],
];

/// Case index of a cell from its four corner states, or `None` when any
/// corner is the absent-neighbour sentinel.
pub fn cell_case(lower_left: i32, lower_right: i32, upper_left: i32, upper_right: i32) -> Option<usize> {
    if lower_left < 0 || lower_right < 0 || upper_left < 0 || upper_right < 0 {
        return None;
    }
    let bit = |state: i32, mask: usize| if state > 0 { mask } else { 0 };
    Some(bit(lower_left, 1) | bit(lower_right, 2) | bit(upper_left, 4) | bit(upper_right, 8))
}

/// Triangles of cell (i, j) for `case` in normalized lattice space.
///
/// Grid point (i, j) sits at the centre of voxel (i, j).
pub fn cell_triangles(case: usize, i: u32, j: u32, inverse_extent: f32) -> impl Iterator<Item = Triangle> {
    let base = Vec2::new(i as f32 + 0.5, j as f32 + 0.5);
    let count = CASE_COUNTS[case] as usize;
    CASE_TRIANGLES[case][..count].iter().map(move |&[a, b, c]| {
        let at = |k: u8| (base + CELL_POINTS[k as usize]) * inverse_extent;
        Triangle::new(at(a), at(b), at(c))
    })
}

/// A device or host routine that triangulates one state buffer.
///
/// Calls follow a fixed protocol per chunk: `dispatch`, then `read_count`,
/// then `read_triangles` with exactly that count. Output buffers are owned
/// by the kernel and sized by `acquire`.
pub trait TriangulationKernel {
    /// Short name for logs
    fn name(&self) -> &'static str;

    /// Allocate input/output buffers for `voxel_resolution` with room for
    /// `capacity` triangles. Any previous allocation is released first.
    fn acquire(&mut self, voxel_resolution: u32, capacity: u32) -> Result<()>;

    /// Free every buffer. Idempotent.
    fn release(&mut self);

    /// Run the kernel over `states` ((R+1)² values of -1, 0 or 1)
    fn dispatch(&mut self, states: &[i32], params: &KernelParams) -> Result<()>;

    /// Triangles produced by the last dispatch. May exceed the capacity.
    fn read_count(&mut self) -> Result<u32>;

    /// Replace `out` with exactly `count` triangles of the last dispatch.
    ///
    /// Fails with [`crate::core::Error::ReadbackMismatch`] when `count`
    /// differs from what the dispatch actually stored.
    fn read_triangles(&mut self, count: u32, out: &mut Vec<Triangle>) -> Result<()>;
}
