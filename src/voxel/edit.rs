//! Edit requests, affected chunk ranges and the per-tick edit queue.

use std::collections::VecDeque;

use glam::Vec3;

use crate::voxel::chunk::ChunkCoord;
use crate::voxel::stencil::{FillType, Stencil, StencilShape};

/// One edit as delivered by the input collaborator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EditRequest {
    /// Lattice-local point (the lattice is centred on the origin); z is ignored
    pub point: Vec3,
    pub shape: StencilShape,
    pub fill: FillType,
    /// Radius in voxels
    pub radius: u32,
}

impl EditRequest {
    pub fn new(point: Vec3, shape: StencilShape, fill: FillType, radius: u32) -> Self {
        Self {
            point,
            shape,
            fill,
            radius,
        }
    }

    /// Stencil for this edit, not yet centred
    pub fn stencil(&self) -> Stencil {
        Stencil::new(self.shape, self.fill, self.radius)
    }
}

/// Inclusive chunk-index bounds touched by an edit.
///
/// Empty when the edit lies entirely outside the lattice.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AffectedRange {
    pub x_start: i64,
    pub x_end: i64,
    pub y_start: i64,
    pub y_end: i64,
}

impl AffectedRange {
    pub const EMPTY: AffectedRange = AffectedRange {
        x_start: 0,
        x_end: -1,
        y_start: 0,
        y_end: -1,
    };

    pub fn is_empty(&self) -> bool {
        self.x_start > self.x_end || self.y_start > self.y_end
    }

    /// Number of chunks in the range
    pub fn len(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        ((self.x_end - self.x_start + 1) * (self.y_end - self.y_start + 1)) as usize
    }

    /// Chunks in application order: y from high to low, then x from high to low.
    ///
    /// Applying upper/right chunks first means every chunk is triangulated
    /// after the neighbours it borrows border state from have been edited.
    pub fn iter(&self) -> impl Iterator<Item = ChunkCoord> + '_ {
        let (x_start, x_end) = (self.x_start, self.x_end);
        let ys = if self.is_empty() { 0..=-1 } else { self.y_start..=self.y_end };
        ys.rev().flat_map(move |y| {
            (x_start..=x_end)
                .rev()
                .map(move |x| ChunkCoord::new(x as u32, y as u32))
        })
    }
}

/// Outcome of one applied edit
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EditReport {
    /// Chunks visited, in application order
    pub chunks: Vec<ChunkCoord>,
    /// Voxels whose state changed across all chunks
    pub voxels_changed: usize,
    /// Triangles produced by the chunks that re-triangulated successfully
    pub triangles: u32,
    /// Chunks whose triangulation failed with a retryable error and still
    /// show their previous mesh
    pub stale: Vec<ChunkCoord>,
}

impl EditReport {
    pub fn is_noop(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// FIFO of edits waiting for the next apply pass
#[derive(Debug, Default)]
pub struct EditQueue {
    pending: VecDeque<EditRequest>,
}

impl EditQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, request: EditRequest) {
        self.pending.push_back(request);
    }

    /// Take every queued edit, oldest first
    pub fn drain(&mut self) -> Vec<EditRequest> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
