//! Per-chunk triangulation: border assembly, kernel dispatch, count-first
//! readback and mesh replacement.

use glam::{Vec2, Vec3};

use crate::core::config::MapConfig;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::voxel::chunk::VoxelChunk;
use super::kernel::{Triangle, TriangulationKernel};
use super::resources::TriangulationResources;
use super::state::StateBuffer;

/// Outcome of one successful chunk triangulation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TriangulationStats {
    pub triangles: u32,
    pub capacity: u32,
}

/// Map a normalized kernel vertex into chunk-local space
pub fn scale_vertex(vertex: Vec2, scale: f32) -> Vec3 {
    let scaled = vertex * scale;
    Vec3::new(scaled.x, scaled.y, 0.0)
}

/// Rebuilds chunk meshes from voxel state through a triangulation kernel.
///
/// One state buffer and one set of kernel buffers are reused for every
/// chunk.
pub struct TriangulationPipeline {
    config: MapConfig,
    states: StateBuffer,
    resources: TriangulationResources,
    /// Readback scratch, reused across chunks
    triangles: Vec<Triangle>,
}

impl TriangulationPipeline {
    pub fn new(config: MapConfig, kernel: Box<dyn TriangulationKernel>) -> Self {
        Self {
            config,
            states: StateBuffer::new(config.voxel_resolution),
            resources: TriangulationResources::new(kernel),
            triangles: Vec::new(),
        }
    }

    pub fn kernel_name(&self) -> &'static str {
        self.resources.kernel_name()
    }

    pub fn resources(&self) -> &TriangulationResources {
        &self.resources
    }

    /// Adopt new construction parameters. Buffers sized for another voxel
    /// resolution are released and reacquired on the next triangulation.
    pub fn reconfigure(&mut self, config: MapConfig) {
        if config.voxel_resolution != self.config.voxel_resolution {
            self.resources.release();
            self.states = StateBuffer::new(config.voxel_resolution);
        }
        self.config = config;
    }

    /// Release the kernel buffers
    pub fn release(&mut self) {
        self.resources.release();
    }

    /// Assemble the state buffer of `chunks[index]` without dispatching
    pub fn assemble(&mut self, chunks: &[VoxelChunk], index: usize) -> Result<&StateBuffer> {
        let chunk = &chunks[index];
        let neighbors = chunk.neighbors();
        self.states.assemble(
            chunk,
            neighbors.right.map(|i| &chunks[i]),
            neighbors.up.map(|i| &chunks[i]),
            neighbors.diagonal.map(|i| &chunks[i]),
        )?;
        Ok(&self.states)
    }

    /// Re-triangulate `chunks[index]` and replace its mesh.
    ///
    /// On failure the chunk keeps its previous mesh. Retryable failures also
    /// release the kernel buffers so the next call starts from fresh ones.
    pub fn triangulate(&mut self, chunks: &mut [VoxelChunk], index: usize) -> Result<TriangulationStats> {
        self.assemble(chunks, index)?;

        let stats = match self.run_kernel() {
            Ok(stats) => stats,
            Err(err) => {
                if err.is_retryable() {
                    self.resources.release();
                }
                return Err(err);
            }
        };

        let scale = self.config.output_scale();
        let vertices: Vec<Vec3> = self
            .triangles
            .iter()
            .flat_map(Triangle::vertices)
            .map(|v| scale_vertex(v, scale))
            .collect();
        let indices: Vec<u32> = (0..vertices.len() as u32).collect();

        let chunk = &mut chunks[index];
        chunk.mesh_mut().replace(vertices, indices);
        log::debug!(
            "Triangulated chunk ({}, {}): {} / {} triangles",
            chunk.coord().x,
            chunk.coord().y,
            stats.triangles,
            stats.capacity
        );
        Ok(stats)
    }

    /// Dispatch, read the count, validate it, then read exactly that many
    /// triangles into the scratch buffer.
    fn run_kernel(&mut self) -> Result<TriangulationStats> {
        let shape = self.resources.acquire(self.config.voxel_resolution)?;
        self.resources.dispatch(&self.states, self.config.chunk_resolution)?;

        let count = self.resources.read_count()?;
        log::trace!("Kernel reported {} triangles (capacity {})", count, shape.capacity);
        if count > shape.capacity {
            return Err(Error::BufferCapacityExceeded {
                count,
                capacity: shape.capacity,
            });
        }

        self.resources.read_triangles(count, &mut self.triangles)?;
        if self.triangles.len() != count as usize {
            return Err(Error::ReadbackMismatch {
                expected: count as usize,
                actual: self.triangles.len(),
            });
        }

        Ok(TriangulationStats {
            triangles: count,
            capacity: shape.capacity,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triangulate::cpu::CpuKernel;
    use crate::triangulate::kernel::KernelParams;
    use crate::voxel::chunk::{ChunkCoord, ChunkNeighbors};

    /// Kernel that reports a fixed count and stores a fixed list
    struct ScriptedKernel {
        reported: u32,
        stored: Vec<Triangle>,
        /// Extra records appended to `out` beyond what was asked for
        over_read: usize,
    }

    impl TriangulationKernel for ScriptedKernel {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn acquire(&mut self, _voxel_resolution: u32, _capacity: u32) -> Result<()> {
            Ok(())
        }

        fn release(&mut self) {}

        fn dispatch(&mut self, _states: &[i32], _params: &KernelParams) -> Result<()> {
            Ok(())
        }

        fn read_count(&mut self) -> Result<u32> {
            Ok(self.reported)
        }

        fn read_triangles(&mut self, count: u32, out: &mut Vec<Triangle>) -> Result<()> {
            out.clear();
            let take = (count as usize + self.over_read).min(self.stored.len());
            out.extend_from_slice(&self.stored[..take]);
            Ok(())
        }
    }

    /// Kernel whose device is gone
    struct LostKernel;

    impl TriangulationKernel for LostKernel {
        fn name(&self) -> &'static str {
            "lost"
        }

        fn acquire(&mut self, _voxel_resolution: u32, _capacity: u32) -> Result<()> {
            Err(Error::KernelUnavailable("device lost".to_string()))
        }

        fn release(&mut self) {}

        fn dispatch(&mut self, _states: &[i32], _params: &KernelParams) -> Result<()> {
            unreachable!()
        }

        fn read_count(&mut self) -> Result<u32> {
            unreachable!()
        }

        fn read_triangles(&mut self, _count: u32, _out: &mut Vec<Triangle>) -> Result<()> {
            unreachable!()
        }
    }

    fn lattice(config: &MapConfig, filled: bool) -> Vec<VoxelChunk> {
        let c = config.chunk_resolution;
        (0..config.chunk_count())
            .map(|i| {
                let coord = ChunkCoord::from_index(i, c);
                VoxelChunk::new(
                    coord,
                    config.voxel_resolution,
                    Vec2::ZERO,
                    ChunkNeighbors::for_coord(coord, c),
                    filled,
                )
            })
            .collect()
    }

    fn seeded_mesh(chunks: &mut [VoxelChunk], index: usize) {
        chunks[index]
            .mesh_mut()
            .replace(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![0, 1, 2]);
    }

    #[test]
    fn test_scale_vertex() {
        let config = MapConfig::new(2.0, 4, 2);
        let v = scale_vertex(Vec2::new(0.5, 0.5), config.output_scale());
        assert_eq!(v, Vec3::new(2.0, 2.0, 0.0));
    }

    #[test]
    fn test_triangulate_replaces_mesh() {
        let config = MapConfig::new(2.0, 4, 2);
        let mut chunks = lattice(&config, true);
        let mut pipeline = TriangulationPipeline::new(config, Box::new(CpuKernel::new()));

        // Chunk (0, 0) has all three neighbours: 16 full cells
        let stats = pipeline.triangulate(&mut chunks, 0).unwrap();
        assert_eq!(stats, TriangulationStats { triangles: 32, capacity: 48 });

        let mesh = chunks[0].mesh();
        assert_eq!(mesh.triangle_count(), 32);
        assert_eq!(mesh.vertices().len(), 96);
        assert_eq!(mesh.indices(), (0..96).collect::<Vec<u32>>().as_slice());
        assert!(mesh.normals().iter().all(|n| *n == Vec3::Z));

        // Vertices span voxel centres 0.25 .. 2.25 in chunk-local space
        let max_x = mesh.vertices().iter().map(|v| v.x).fold(f32::MIN, f32::max);
        let min_x = mesh.vertices().iter().map(|v| v.x).fold(f32::MAX, f32::min);
        assert!((min_x - 0.25).abs() < 1e-6);
        assert!((max_x - 2.25).abs() < 1e-6);
    }

    #[test]
    fn test_edge_chunk_stops_at_last_voxel() {
        let config = MapConfig::new(2.0, 4, 2);
        let mut chunks = lattice(&config, true);
        let mut pipeline = TriangulationPipeline::new(config, Box::new(CpuKernel::new()));

        // Chunk (1, 1) has no neighbours: (R-1)² cells
        let stats = pipeline.triangulate(&mut chunks, 3).unwrap();
        assert_eq!(stats.triangles, 18);
    }

    #[test]
    fn test_capacity_exceeded_keeps_previous_mesh() {
        let config = MapConfig::new(2.0, 4, 1);
        let mut chunks = lattice(&config, false);
        seeded_mesh(&mut chunks, 0);
        let before = chunks[0].mesh().clone();

        let kernel = ScriptedKernel { reported: 49, stored: vec![Triangle::default(); 48], over_read: 0 };
        let mut pipeline = TriangulationPipeline::new(config, Box::new(kernel));

        let err = pipeline.triangulate(&mut chunks, 0).unwrap_err();
        assert!(matches!(err, Error::BufferCapacityExceeded { count: 49, capacity: 48 }));
        assert!(err.is_retryable());
        assert_eq!(chunks[0].mesh(), &before);
        // Buffers dropped so the retry reallocates
        assert!(!pipeline.resources().is_acquired());
    }

    #[test]
    fn test_short_read_fails() {
        let config = MapConfig::new(2.0, 4, 1);
        let mut chunks = lattice(&config, false);
        seeded_mesh(&mut chunks, 0);
        let before = chunks[0].mesh().clone();

        let kernel = ScriptedKernel { reported: 10, stored: vec![Triangle::default(); 4], over_read: 0 };
        let mut pipeline = TriangulationPipeline::new(config, Box::new(kernel));

        let err = pipeline.triangulate(&mut chunks, 0).unwrap_err();
        assert!(matches!(err, Error::ReadbackMismatch { expected: 10, actual: 4 }));
        assert_eq!(chunks[0].mesh(), &before);
    }

    #[test]
    fn test_over_read_fails() {
        let config = MapConfig::new(2.0, 4, 1);
        let mut chunks = lattice(&config, false);

        let kernel = ScriptedKernel { reported: 2, stored: vec![Triangle::default(); 6], over_read: 1 };
        let mut pipeline = TriangulationPipeline::new(config, Box::new(kernel));

        let err = pipeline.triangulate(&mut chunks, 0).unwrap_err();
        assert!(matches!(err, Error::ReadbackMismatch { expected: 2, actual: 3 }));
        assert!(chunks[0].mesh().is_empty());
        assert_eq!(chunks[0].mesh().generation(), 0);
    }

    #[test]
    fn test_kernel_unavailable_is_retryable() {
        let config = MapConfig::new(2.0, 4, 1);
        let mut chunks = lattice(&config, false);
        let mut pipeline = TriangulationPipeline::new(config, Box::new(LostKernel));

        let err = pipeline.triangulate(&mut chunks, 0).unwrap_err();
        assert!(matches!(err, Error::KernelUnavailable(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_reconfigure_resizes_state_buffer() {
        let config = MapConfig::new(2.0, 4, 1);
        let mut chunks = lattice(&config, true);
        let mut pipeline = TriangulationPipeline::new(config, Box::new(CpuKernel::new()));
        pipeline.triangulate(&mut chunks, 0).unwrap();
        assert_eq!(pipeline.resources().shape().map(|s| s.voxel_resolution), Some(4));

        let bigger = MapConfig::new(2.0, 8, 1);
        pipeline.reconfigure(bigger);
        assert!(!pipeline.resources().is_acquired());

        let mut chunks = lattice(&bigger, true);
        let stats = pipeline.triangulate(&mut chunks, 0).unwrap();
        assert_eq!(stats.triangles, 2 * 7 * 7);
        assert_eq!(stats.capacity, 192);
    }

    #[test]
    fn test_chunks_of_other_resolution_are_rejected() {
        let config = MapConfig::new(2.0, 4, 1);
        let mut pipeline = TriangulationPipeline::new(config, Box::new(CpuKernel::new()));
        pipeline.reconfigure(MapConfig::new(2.0, 8, 1));

        let mut chunks = lattice(&config, true);
        let err = pipeline.triangulate(&mut chunks, 0).unwrap_err();
        assert!(matches!(err, Error::ResolutionMismatch { expected: 8, actual: 4 }));
        assert!(!err.is_retryable());
    }
}
