//! Chunk system for managing square tiles of the voxel lattice

use glam::{IVec2, Vec2};

use crate::render::mesh::ChunkMesh;
use crate::voxel::stencil::Stencil;

/// Integer coordinate identifying a chunk in the lattice
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: u32,
    pub y: u32,
}

impl ChunkCoord {
    /// Create a new chunk coordinate
    pub fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// Row-major arena index in a lattice `chunk_resolution` chunks wide
    pub fn index(&self, chunk_resolution: u32) -> usize {
        (self.y * chunk_resolution + self.x) as usize
    }

    /// Inverse of [`ChunkCoord::index`]
    pub fn from_index(index: usize, chunk_resolution: u32) -> Self {
        let c = chunk_resolution as usize;
        Self {
            x: (index % c) as u32,
            y: (index / c) as u32,
        }
    }

    /// Lattice voxel coordinate of this chunk's voxel (0, 0)
    pub fn voxel_origin(&self, voxel_resolution: u32) -> IVec2 {
        IVec2::new(
            (self.x * voxel_resolution) as i32,
            (self.y * voxel_resolution) as i32,
        )
    }
}

/// Arena indices of the three forward neighbours.
///
/// `None` means the chunk sits on the lattice edge in that direction; the
/// triangulation pipeline turns it into the absent-neighbour sentinel.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChunkNeighbors {
    /// Chunk at (x+1, y)
    pub right: Option<usize>,
    /// Chunk at (x, y+1)
    pub up: Option<usize>,
    /// Chunk at (x+1, y+1)
    pub diagonal: Option<usize>,
}

impl ChunkNeighbors {
    /// Neighbour indices for `coord` in a `chunk_resolution`-wide lattice
    pub fn for_coord(coord: ChunkCoord, chunk_resolution: u32) -> Self {
        let has_right = coord.x + 1 < chunk_resolution;
        let has_up = coord.y + 1 < chunk_resolution;
        let at = |x, y| ChunkCoord::new(x, y).index(chunk_resolution);

        Self {
            right: has_right.then(|| at(coord.x + 1, coord.y)),
            up: has_up.then(|| at(coord.x, coord.y + 1)),
            diagonal: (has_right && has_up).then(|| at(coord.x + 1, coord.y + 1)),
        }
    }
}

/// One square tile of the lattice: an R×R voxel grid and the mesh derived from it
#[derive(Clone, Debug)]
pub struct VoxelChunk {
    coord: ChunkCoord,
    resolution: u32,
    /// Row-major voxel states, `y * resolution + x`
    voxels: Vec<bool>,
    neighbors: ChunkNeighbors,
    /// Lattice-local position of the chunk's lower-left corner
    origin: Vec2,
    mesh: ChunkMesh,
}

impl VoxelChunk {
    /// Create a chunk with every voxel set to `filled`
    pub fn new(
        coord: ChunkCoord,
        resolution: u32,
        origin: Vec2,
        neighbors: ChunkNeighbors,
        filled: bool,
    ) -> Self {
        Self {
            coord,
            resolution,
            voxels: vec![filled; (resolution * resolution) as usize],
            neighbors,
            origin,
            mesh: ChunkMesh::new(),
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    /// Voxels per edge (R)
    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn neighbors(&self) -> ChunkNeighbors {
        self.neighbors
    }

    /// Placement of the chunk inside the lattice, used by the scene to
    /// position the chunk-local mesh
    pub fn origin(&self) -> Vec2 {
        self.origin
    }

    pub fn voxels(&self) -> &[bool] {
        &self.voxels
    }

    /// State of voxel (x, y)
    ///
    /// # Panics
    /// Panics if either coordinate is outside `[0, R)`.
    pub fn voxel(&self, x: u32, y: u32) -> bool {
        assert!(x < self.resolution && y < self.resolution, "voxel ({x}, {y}) out of range");
        self.voxels[(y * self.resolution + x) as usize]
    }

    /// Number of filled voxels
    pub fn filled_count(&self) -> usize {
        self.voxels.iter().filter(|&&v| v).count()
    }

    pub fn mesh(&self) -> &ChunkMesh {
        &self.mesh
    }

    pub(crate) fn mesh_mut(&mut self) -> &mut ChunkMesh {
        &mut self.mesh
    }

    #[cfg(test)]
    pub(crate) fn set_voxel(&mut self, x: u32, y: u32, state: bool) {
        let index = (y * self.resolution + x) as usize;
        self.voxels[index] = state;
    }

    /// Apply a stencil whose centre is expressed in this chunk's voxel
    /// coordinates. Only voxels inside `[0, R)` are touched.
    ///
    /// Returns the number of voxels whose state changed.
    pub fn apply(&mut self, stencil: &Stencil) -> usize {
        let Some(footprint) = stencil.footprint(self.resolution) else {
            return 0;
        };

        let value = stencil.fill().value();
        let center = stencil.center();
        let mut changed = 0;

        for y in footprint.y_start..=footprint.y_end {
            for x in footprint.x_start..=footprint.x_end {
                let dx = x as i64 - center.x as i64;
                let dy = y as i64 - center.y as i64;
                if !stencil.contains(dx, dy) {
                    continue;
                }
                let index = (y * self.resolution + x) as usize;
                if self.voxels[index] != value {
                    self.voxels[index] = value;
                    changed += 1;
                }
            }
        }

        changed
    }
}
