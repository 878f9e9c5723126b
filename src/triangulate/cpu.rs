//! Host marching-squares kernel, parallel over cell rows with rayon.

use rayon::prelude::*;

use crate::core::error::Error;
use crate::core::types::Result;
use super::kernel::{cell_case, cell_triangles, KernelParams, Triangle, TriangulationKernel};

/// Marching squares on the CPU.
///
/// Behaves like an append buffer: every produced triangle is counted, only
/// the first `capacity` are stored.
#[derive(Debug, Default)]
pub struct CpuKernel {
    /// Stored triangles of the last dispatch
    output: Vec<Triangle>,
    /// Produced triangles of the last dispatch
    counter: u32,
    /// (voxel_resolution, capacity) while acquired
    acquired: Option<(u32, u32)>,
}

impl CpuKernel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_acquired(&self) -> bool {
        self.acquired.is_some()
    }
}

impl TriangulationKernel for CpuKernel {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn acquire(&mut self, voxel_resolution: u32, capacity: u32) -> Result<()> {
        self.release();
        self.output = Vec::with_capacity(capacity as usize);
        self.acquired = Some((voxel_resolution, capacity));
        Ok(())
    }

    fn release(&mut self) {
        self.output = Vec::new();
        self.counter = 0;
        self.acquired = None;
    }

    fn dispatch(&mut self, states: &[i32], params: &KernelParams) -> Result<()> {
        let Some((voxel_resolution, capacity)) = self.acquired else {
            return Err(Error::KernelUnavailable("cpu kernel buffers not acquired".to_string()));
        };
        let side = voxel_resolution as usize + 1;
        if params.voxel_resolution != voxel_resolution || states.len() != side * side {
            return Err(Error::ResolutionMismatch {
                expected: voxel_resolution,
                actual: params.voxel_resolution,
            });
        }

        let r = voxel_resolution;
        let inverse_extent = params.inverse_extent();
        let at = |x: u32, y: u32| states[y as usize * side + x as usize];

        let produced: Vec<Triangle> = (0..r)
            .into_par_iter()
            .flat_map_iter(|j| {
                (0..r).flat_map(move |i| {
                    let case = cell_case(at(i, j), at(i + 1, j), at(i, j + 1), at(i + 1, j + 1));
                    case.into_iter()
                        .flat_map(move |case| cell_triangles(case, i, j, inverse_extent))
                })
            })
            .collect();

        self.counter = produced.len() as u32;
        self.output.clear();
        self.output
            .extend_from_slice(&produced[..produced.len().min(capacity as usize)]);
        Ok(())
    }

    fn read_count(&mut self) -> Result<u32> {
        if self.acquired.is_none() {
            return Err(Error::KernelUnavailable("cpu kernel buffers not acquired".to_string()));
        }
        Ok(self.counter)
    }

    fn read_triangles(&mut self, count: u32, out: &mut Vec<Triangle>) -> Result<()> {
        let stored = self.output.len();
        if count as usize != stored {
            return Err(Error::ReadbackMismatch {
                expected: count as usize,
                actual: stored,
            });
        }
        out.clear();
        out.extend_from_slice(&self.output);
        Ok(())
    }
}
