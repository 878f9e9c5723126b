//! State buffer assembly: one chunk's voxels plus the border ring borrowed
//! from its right, up and diagonal neighbours.

use crate::core::error::Error;
use crate::core::types::Result;
use crate::voxel::chunk::VoxelChunk;

/// State of a grid point whose neighbour chunk does not exist
pub const STATE_ABSENT: i32 = -1;
pub const STATE_EMPTY: i32 = 0;
pub const STATE_FILLED: i32 = 1;

fn encode(filled: bool) -> i32 {
    if filled { STATE_FILLED } else { STATE_EMPTY }
}

/// Flattened (R+1)×(R+1) kernel input with row stride R+1.
///
/// Own voxel (x, y) lives at `y*(R+1) + x`. Column R holds the right
/// neighbour's column 0, row R the up neighbour's row 0 and the last entry the
/// diagonal neighbour's voxel (0, 0).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StateBuffer {
    voxel_resolution: u32,
    states: Vec<i32>,
}

impl StateBuffer {
    /// Buffer for `voxel_resolution` with every point absent
    pub fn new(voxel_resolution: u32) -> Self {
        let side = voxel_resolution as usize + 1;
        Self {
            voxel_resolution,
            states: vec![STATE_ABSENT; side * side],
        }
    }

    pub fn voxel_resolution(&self) -> u32 {
        self.voxel_resolution
    }

    fn stride(&self) -> usize {
        self.voxel_resolution as usize + 1
    }

    /// State at grid point (x, y), both in `[0, R]`
    pub fn get(&self, x: u32, y: u32) -> i32 {
        self.states[y as usize * self.stride() + x as usize]
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.states
    }

    /// Column R, bottom to top, excluding the corner
    pub fn border_column(&self) -> Vec<i32> {
        let r = self.voxel_resolution;
        (0..r).map(|y| self.get(r, y)).collect()
    }

    /// Row R, left to right, excluding the corner
    pub fn border_row(&self) -> Vec<i32> {
        let r = self.voxel_resolution;
        (0..r).map(|x| self.get(x, r)).collect()
    }

    /// Point (R, R)
    pub fn corner(&self) -> i32 {
        let r = self.voxel_resolution;
        self.get(r, r)
    }

    /// Overwrite the whole buffer from `chunk` and its forward neighbours.
    ///
    /// Every chunk must share the buffer's voxel resolution.
    pub fn assemble(
        &mut self,
        chunk: &VoxelChunk,
        right: Option<&VoxelChunk>,
        up: Option<&VoxelChunk>,
        diagonal: Option<&VoxelChunk>,
    ) -> Result<()> {
        for other in [Some(chunk), right, up, diagonal].into_iter().flatten() {
            if other.resolution() != self.voxel_resolution {
                return Err(Error::ResolutionMismatch {
                    expected: self.voxel_resolution,
                    actual: other.resolution(),
                });
            }
        }

        let r = self.voxel_resolution as usize;
        let stride = r + 1;

        for (row, voxels) in chunk.voxels().chunks_exact(r).enumerate() {
            let start = row * stride;
            for (slot, &voxel) in self.states[start..start + r].iter_mut().zip(voxels) {
                *slot = encode(voxel);
            }
        }

        for y in 0..r {
            self.states[y * stride + r] = match right {
                Some(neighbor) => encode(neighbor.voxels()[y * r]),
                None => STATE_ABSENT,
            };
        }

        for x in 0..r {
            self.states[r * stride + x] = match up {
                Some(neighbor) => encode(neighbor.voxels()[x]),
                None => STATE_ABSENT,
            };
        }

        self.states[stride * stride - 1] = match diagonal {
            Some(neighbor) => encode(neighbor.voxels()[0]),
            None => STATE_ABSENT,
        };

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;
    use crate::voxel::chunk::{ChunkCoord, ChunkNeighbors};

    fn chunk(resolution: u32, filled: bool) -> VoxelChunk {
        VoxelChunk::new(ChunkCoord::new(0, 0), resolution, Vec2::ZERO, ChunkNeighbors::default(), filled)
    }

    #[test]
    fn test_new_is_absent() {
        let buffer = StateBuffer::new(4);
        assert_eq!(buffer.as_slice().len(), 25);
        assert!(buffer.as_slice().iter().all(|&s| s == STATE_ABSENT));
    }

    #[test]
    fn test_own_voxels_use_stride() {
        let mut own = chunk(4, false);
        own.set_voxel(3, 0, true);
        own.set_voxel(0, 1, true);
        own.set_voxel(2, 3, true);

        let mut buffer = StateBuffer::new(4);
        buffer.assemble(&own, None, None, None).unwrap();

        assert_eq!(buffer.as_slice()[3], STATE_FILLED);
        assert_eq!(buffer.as_slice()[5], STATE_FILLED); // (0, 1)
        assert_eq!(buffer.get(2, 3), STATE_FILLED);
        assert_eq!(buffer.get(1, 1), STATE_EMPTY);
        // Column 4 of row 0 is border, not voxel (0, 1)
        assert_eq!(buffer.as_slice()[4], STATE_ABSENT);
    }

    #[test]
    fn test_border_absent_without_neighbors() {
        let own = chunk(4, true);
        let mut buffer = StateBuffer::new(4);
        buffer.assemble(&own, None, None, None).unwrap();

        assert_eq!(buffer.border_column(), vec![STATE_ABSENT; 4]);
        assert_eq!(buffer.border_row(), vec![STATE_ABSENT; 4]);
        assert_eq!(buffer.corner(), STATE_ABSENT);
        for y in 0..4 {
            for x in 0..4 {
                assert_eq!(buffer.get(x, y), STATE_FILLED);
            }
        }
    }

    #[test]
    fn test_border_column_copies_right_neighbor() {
        let own = chunk(4, false);
        let mut right = chunk(4, false);
        right.set_voxel(0, 0, true);
        right.set_voxel(0, 2, true);
        right.set_voxel(1, 1, true); // not column 0

        let mut buffer = StateBuffer::new(4);
        buffer.assemble(&own, Some(&right), None, None).unwrap();

        let expected: Vec<i32> = (0..4).map(|y| encode(right.voxel(0, y))).collect();
        assert_eq!(buffer.border_column(), expected);
        assert_eq!(buffer.border_column(), vec![1, 0, 1, 0]);
        assert_eq!(buffer.border_row(), vec![STATE_ABSENT; 4]);
    }

    #[test]
    fn test_border_row_and_corner() {
        let own = chunk(4, false);
        let mut up = chunk(4, false);
        up.set_voxel(1, 0, true);
        up.set_voxel(3, 0, true);
        let diagonal = chunk(4, true);

        let mut buffer = StateBuffer::new(4);
        buffer.assemble(&own, None, Some(&up), Some(&diagonal)).unwrap();

        assert_eq!(buffer.border_row(), vec![0, 1, 0, 1]);
        assert_eq!(buffer.corner(), STATE_FILLED);
        assert_eq!(buffer.border_column(), vec![STATE_ABSENT; 4]);
    }

    #[test]
    fn test_reassemble_overwrites_previous_border() {
        let own = chunk(4, false);
        let right = chunk(4, true);
        let mut buffer = StateBuffer::new(4);

        buffer.assemble(&own, Some(&right), None, None).unwrap();
        assert_eq!(buffer.border_column(), vec![STATE_FILLED; 4]);

        buffer.assemble(&own, None, None, None).unwrap();
        assert_eq!(buffer.border_column(), vec![STATE_ABSENT; 4]);
    }

    #[test]
    fn test_resolution_mismatch_is_rejected() {
        let own = chunk(8, false);
        let mut buffer = StateBuffer::new(4);
        let err = buffer.assemble(&own, None, None, None).unwrap_err();
        assert!(matches!(err, Error::ResolutionMismatch { expected: 4, actual: 8 }));
        assert!(!err.is_retryable());
    }
}
