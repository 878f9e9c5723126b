//! The chunk lattice: construction, edit routing and re-triangulation.

use std::collections::BTreeSet;

use glam::{IVec2, Vec2, Vec3};

use crate::core::config::MapConfig;
use crate::core::types::Result;
use crate::triangulate::kernel::TriangulationKernel;
use crate::triangulate::pipeline::{TriangulationPipeline, TriangulationStats};
use crate::voxel::chunk::{ChunkCoord, ChunkNeighbors, VoxelChunk};
use crate::voxel::edit::{AffectedRange, EditQueue, EditReport, EditRequest};

/// A C×C lattice of voxel chunks centred on the origin.
///
/// Chunks live in a row-major arena and refer to their forward neighbours by
/// index. Every voxel change is followed by re-triangulation of the touched
/// chunks, so after any successful call each chunk mesh reflects its voxels
/// and border ring. Chunks whose triangulation failed with a retryable error
/// keep their previous mesh and are tracked as stale until
/// [`VoxelMap::retry_stale`] or a later edit succeeds.
pub struct VoxelMap {
    config: MapConfig,
    chunks: Vec<VoxelChunk>,
    pipeline: TriangulationPipeline,
    stale: BTreeSet<usize>,
    queue: EditQueue,
}

impl VoxelMap {
    /// Build an empty map and triangulate every chunk once
    pub fn new(config: MapConfig, kernel: Box<dyn TriangulationKernel>) -> Result<Self> {
        Self::with_fill(config, kernel, false)
    }

    /// Build a map whose voxels all start as `filled`
    pub fn with_fill(config: MapConfig, kernel: Box<dyn TriangulationKernel>, filled: bool) -> Result<Self> {
        config.validate()?;

        let mut map = Self {
            config,
            chunks: build_chunks(&config, filled),
            pipeline: TriangulationPipeline::new(config, kernel),
            stale: BTreeSet::new(),
            queue: EditQueue::new(),
        };

        log::info!(
            "Building {}x{} chunk map ({} voxels per edge, chunk size {}) on the {} kernel",
            config.chunk_resolution,
            config.chunk_resolution,
            config.voxel_resolution,
            config.chunk_size,
            map.pipeline.kernel_name()
        );
        map.rebuild_all()?;
        Ok(map)
    }

    pub fn config(&self) -> &MapConfig {
        &self.config
    }

    pub fn kernel_name(&self) -> &'static str {
        self.pipeline.kernel_name()
    }

    pub fn chunks(&self) -> &[VoxelChunk] {
        &self.chunks
    }

    /// Chunk at `coord`, if inside the lattice
    pub fn chunk(&self, coord: ChunkCoord) -> Option<&VoxelChunk> {
        let c = self.config.chunk_resolution;
        if coord.x >= c || coord.y >= c {
            return None;
        }
        self.chunks.get(coord.index(c))
    }

    /// Lattice footprint as (min, max) corners in lattice-local space
    pub fn bounds(&self) -> (Vec2, Vec2) {
        let half = self.config.half_extent();
        (Vec2::splat(-half), Vec2::splat(half))
    }

    /// Global voxel coordinate containing `point`. Points outside the
    /// lattice map to coordinates outside `[0, R·C)`.
    pub fn voxel_center(&self, point: Vec3) -> IVec2 {
        let (x, y) = self.voxel_center_wide(point);
        IVec2::new(saturate(x), saturate(y))
    }

    /// Float-to-int casts saturate, so far-away points land on the i64
    /// extremes; callers combine these with saturating arithmetic only.
    fn voxel_center_wide(&self, point: Vec3) -> (i64, i64) {
        let half = self.config.half_extent();
        let size = self.config.voxel_size();
        (
            ((point.x + half) / size).floor() as i64,
            ((point.y + half) / size).floor() as i64,
        )
    }

    /// Chunks whose voxels or border ring intersect a stencil of `radius`
    /// voxels centred at `point`.
    ///
    /// The start bound reaches one voxel further than the stencil so the
    /// chunk below/left, which borrows column/row 0 of its neighbour, is
    /// re-triangulated too. Empty for non-finite points and points too far
    /// outside the lattice to touch it.
    pub fn affected_chunks(&self, point: Vec3, radius: u32) -> AffectedRange {
        if !point.is_finite() {
            return AffectedRange::EMPTY;
        }

        let (cx, cy) = self.voxel_center_wide(point);
        let r = radius as i64;
        let resolution = self.config.voxel_resolution as i64;
        let last = self.config.chunk_resolution as i64 - 1;

        let lower = |c: i64| c.saturating_sub(r).saturating_sub(1).div_euclid(resolution).max(0);
        let upper = |c: i64| c.saturating_add(r).div_euclid(resolution).min(last);

        let range = AffectedRange {
            x_start: lower(cx),
            x_end: upper(cx),
            y_start: lower(cy),
            y_end: upper(cy),
        };

        if range.is_empty() { AffectedRange::EMPTY } else { range }
    }

    /// Apply one edit now and re-triangulate every affected chunk.
    ///
    /// Chunks are visited top-right to bottom-left so each one is
    /// triangulated after the neighbours it borrows border state from.
    pub fn apply_edit(&mut self, request: EditRequest) -> Result<EditReport> {
        let range = self.affected_chunks(request.point, request.radius);
        let mut report = EditReport {
            chunks: Vec::with_capacity(range.len()),
            ..EditReport::default()
        };
        if range.is_empty() {
            log::trace!("Edit at {:?} misses the lattice", request.point);
            return Ok(report);
        }

        let (cx, cy) = self.voxel_center_wide(request.point);
        let mut stencil = request.stencil();
        let c = self.config.chunk_resolution;
        let resolution = self.config.voxel_resolution;

        for coord in range.iter() {
            let index = coord.index(c);
            let origin = coord.voxel_origin(resolution);
            stencil.set_center(
                saturate(cx.saturating_sub(origin.x as i64)),
                saturate(cy.saturating_sub(origin.y as i64)),
            );

            report.voxels_changed += self.chunks[index].apply(&stencil);
            report.chunks.push(coord);

            match self.triangulate_index(index)? {
                Some(stats) => report.triangles += stats.triangles,
                None => report.stale.push(coord),
            }
        }

        log::debug!(
            "{} {} edit (radius {}) touched {} chunks, changed {} voxels",
            request.fill.name(),
            request.shape.name(),
            request.radius,
            report.chunks.len(),
            report.voxels_changed
        );
        Ok(report)
    }

    /// Queue an edit for the next [`VoxelMap::apply_pending`] pass
    pub fn submit(&mut self, request: EditRequest) {
        self.queue.push(request);
    }

    pub fn pending_edits(&self) -> usize {
        self.queue.len()
    }

    /// Apply every queued edit in submission order.
    ///
    /// A fatal error stops the pass; edits after the failing one are
    /// dropped.
    pub fn apply_pending(&mut self) -> Result<Vec<EditReport>> {
        let pending = self.queue.drain();
        let mut reports = Vec::with_capacity(pending.len());
        for request in pending {
            reports.push(self.apply_edit(request)?);
        }
        Ok(reports)
    }

    /// Re-triangulate every chunk. Returns the chunks left stale.
    pub fn rebuild_all(&mut self) -> Result<Vec<ChunkCoord>> {
        let mut triangles = 0u64;
        for index in 0..self.chunks.len() {
            if let Some(stats) = self.triangulate_index(index)? {
                triangles += stats.triangles as u64;
            }
        }

        log::info!(
            "Triangulated {} chunks: {} triangles, {} stale",
            self.chunks.len(),
            triangles,
            self.stale.len()
        );
        Ok(self.stale_chunks())
    }

    /// Chunks still showing a mesh older than their voxels
    pub fn stale_chunks(&self) -> Vec<ChunkCoord> {
        self.stale
            .iter()
            .map(|&index| self.chunks[index].coord())
            .collect()
    }

    /// Re-triangulate stale chunks. Returns the ones that are still stale.
    pub fn retry_stale(&mut self) -> Result<Vec<ChunkCoord>> {
        let pending: Vec<usize> = self.stale.iter().rev().copied().collect();
        if !pending.is_empty() {
            log::debug!("Retrying {} stale chunks", pending.len());
        }
        for index in pending {
            self.triangulate_index(index)?;
        }
        Ok(self.stale_chunks())
    }

    /// Rebuild the lattice for new construction parameters.
    ///
    /// Every chunk is recreated empty, queued edits are discarded and the
    /// kernel buffers are reallocated for the new voxel resolution.
    pub fn reconfigure(&mut self, config: MapConfig) -> Result<Vec<ChunkCoord>> {
        config.validate()?;
        log::info!(
            "Reconfiguring map: {}x{} chunks, {} voxels per edge, chunk size {}",
            config.chunk_resolution,
            config.chunk_resolution,
            config.voxel_resolution,
            config.chunk_size
        );

        self.pipeline.reconfigure(config);
        self.config = config;
        self.chunks = build_chunks(&config, false);
        self.stale.clear();
        self.queue.clear();
        self.rebuild_all()
    }

    /// Release the kernel buffers. The next triangulation reacquires them.
    pub fn shutdown(&mut self) {
        self.pipeline.release();
    }

    /// Triangulate one chunk, tracking retryable failures as stale.
    fn triangulate_index(&mut self, index: usize) -> Result<Option<TriangulationStats>> {
        match self.pipeline.triangulate(&mut self.chunks, index) {
            Ok(stats) => {
                self.stale.remove(&index);
                Ok(Some(stats))
            }
            Err(err) if err.is_retryable() => {
                let coord = self.chunks[index].coord();
                log::warn!("Chunk ({}, {}) left stale: {}", coord.x, coord.y, err);
                self.stale.insert(index);
                Ok(None)
            }
            Err(err) => {
                let coord = self.chunks[index].coord();
                log::error!("Triangulating chunk ({}, {}) failed: {}", coord.x, coord.y, err);
                Err(err)
            }
        }
    }
}

/// Allocate the C×C arena row-major with neighbour indices wired
fn build_chunks(config: &MapConfig, filled: bool) -> Vec<VoxelChunk> {
    let c = config.chunk_resolution;
    let half = config.half_extent();

    (0..config.chunk_count())
        .map(|index| {
            let coord = ChunkCoord::from_index(index, c);
            let origin = Vec2::new(
                coord.x as f32 * config.chunk_size - half,
                coord.y as f32 * config.chunk_size - half,
            );
            VoxelChunk::new(
                coord,
                config.voxel_resolution,
                origin,
                ChunkNeighbors::for_coord(coord, c),
                filled,
            )
        })
        .collect()
}

fn saturate(value: i64) -> i32 {
    value.clamp(i32::MIN as i64, i32::MAX as i64) as i32
}
