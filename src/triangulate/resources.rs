//! Scoped ownership of the kernel's buffers.

use crate::core::error::Error;
use crate::core::types::Result;
use super::kernel::{max_triangles, KernelParams, Triangle, TriangulationKernel};
use super::state::StateBuffer;

/// Size of the currently acquired buffers
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferShape {
    pub voxel_resolution: u32,
    /// Triangle slots in the output buffer
    pub capacity: u32,
}

impl BufferShape {
    pub fn for_resolution(voxel_resolution: u32) -> Self {
        Self {
            voxel_resolution,
            capacity: max_triangles(voxel_resolution),
        }
    }
}

/// A triangulation kernel plus the buffers it is currently sized for.
///
/// Buffers are acquired once per voxel resolution and reused for every chunk
/// and edit. Acquiring for a different resolution releases the old buffers
/// first; dropping the resources releases them.
pub struct TriangulationResources {
    kernel: Box<dyn TriangulationKernel>,
    shape: Option<BufferShape>,
}

impl TriangulationResources {
    pub fn new(kernel: Box<dyn TriangulationKernel>) -> Self {
        Self { kernel, shape: None }
    }

    pub fn kernel_name(&self) -> &'static str {
        self.kernel.name()
    }

    pub fn shape(&self) -> Option<BufferShape> {
        self.shape
    }

    pub fn is_acquired(&self) -> bool {
        self.shape.is_some()
    }

    /// Make sure buffers sized for `voxel_resolution` are held. A no-op when
    /// they already are.
    pub fn acquire(&mut self, voxel_resolution: u32) -> Result<BufferShape> {
        let wanted = BufferShape::for_resolution(voxel_resolution);
        if self.shape == Some(wanted) {
            return Ok(wanted);
        }

        self.release();
        self.kernel.acquire(wanted.voxel_resolution, wanted.capacity)?;
        self.shape = Some(wanted);
        log::debug!(
            "Acquired {} kernel buffers: resolution {}, capacity {} triangles",
            self.kernel.name(),
            wanted.voxel_resolution,
            wanted.capacity
        );
        Ok(wanted)
    }

    /// Free the kernel's buffers. Idempotent.
    pub fn release(&mut self) {
        if let Some(shape) = self.shape.take() {
            self.kernel.release();
            log::debug!(
                "Released {} kernel buffers (resolution {})",
                self.kernel.name(),
                shape.voxel_resolution
            );
        }
    }

    /// Dispatch the kernel over `states`.
    ///
    /// The buffers must have been acquired for the state buffer's resolution;
    /// anything else is a programming error.
    pub fn dispatch(&mut self, states: &StateBuffer, chunk_resolution: u32) -> Result<BufferShape> {
        let Some(shape) = self.shape else {
            return Err(Error::KernelUnavailable(format!(
                "{} kernel buffers not acquired",
                self.kernel.name()
            )));
        };
        if shape.voxel_resolution != states.voxel_resolution() {
            log::error!(
                "State buffer of resolution {} dispatched on buffers sized for {}",
                states.voxel_resolution(),
                shape.voxel_resolution
            );
            return Err(Error::ResolutionMismatch {
                expected: shape.voxel_resolution,
                actual: states.voxel_resolution(),
            });
        }

        let params = KernelParams::new(shape.voxel_resolution, chunk_resolution, shape.capacity);
        self.kernel.dispatch(states.as_slice(), &params)?;
        Ok(shape)
    }

    pub fn read_count(&mut self) -> Result<u32> {
        self.kernel.read_count()
    }

    pub fn read_triangles(&mut self, count: u32, out: &mut Vec<Triangle>) -> Result<()> {
        self.kernel.read_triangles(count, out)
    }
}

impl Drop for TriangulationResources {
    fn drop(&mut self) {
        self.release();
    }
}
