//! Compute-shader marching squares with an atomic append buffer.
//!
//! One invocation per cell. Each invocation reserves its slots with an atomic
//! add on the counter and only writes them when they fit, so the counter
//! always holds the number of triangles produced.

use std::mem::size_of;

use crate::core::error::Error;
use crate::core::types::Result;
use crate::render::context::GpuContext;
use super::kernel::{KernelParams, Triangle, TriangulationKernel};

/// Buffers sized for one voxel resolution
struct KernelBuffers {
    voxel_resolution: u32,
    capacity: u32,
    params_buffer: wgpu::Buffer,
    state_buffer: wgpu::Buffer,
    triangle_buffer: wgpu::Buffer,
    triangle_staging: wgpu::Buffer,
    counter_buffer: wgpu::Buffer,
    counter_staging: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl KernelBuffers {
    fn destroy(&self) {
        self.params_buffer.destroy();
        self.state_buffer.destroy();
        self.triangle_buffer.destroy();
        self.triangle_staging.destroy();
        self.counter_buffer.destroy();
        self.counter_staging.destroy();
    }
}

/// Marching squares on the GPU
pub struct GpuKernel {
    context: GpuContext,
    pipeline: wgpu::ComputePipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    buffers: Option<KernelBuffers>,
    /// Counter value read back after the last dispatch
    last_count: Option<u32>,
}

impl GpuKernel {
    /// Create a kernel on a fresh headless device
    pub fn new() -> Result<Self> {
        let context = GpuContext::headless_blocking()
            .map_err(|e| Error::KernelUnavailable(e.to_string()))?;
        Ok(Self::with_context(context))
    }

    /// Create a kernel on an existing device
    pub fn with_context(context: GpuContext) -> Self {
        let device = &context.device;

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("marching_squares_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../shaders/marching_squares.wgsl").into()),
        });

        let buffer_entry = |binding, ty| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("marching_squares_layout"),
            entries: &[
                // Params
                buffer_entry(0, wgpu::BufferBindingType::Uniform),
                // States
                buffer_entry(1, wgpu::BufferBindingType::Storage { read_only: true }),
                // Triangles
                buffer_entry(2, wgpu::BufferBindingType::Storage { read_only: false }),
                // Counter
                buffer_entry(3, wgpu::BufferBindingType::Storage { read_only: false }),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("marching_squares_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("marching_squares_pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("main"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self {
            context,
            pipeline,
            bind_group_layout,
            buffers: None,
            last_count: None,
        }
    }

    fn buffers(&self) -> Result<&KernelBuffers> {
        self.buffers
            .as_ref()
            .ok_or_else(|| Error::KernelUnavailable("gpu kernel buffers not acquired".to_string()))
    }

    /// Copy `size` bytes of `source` into `staging` and wait for the copy
    fn copy_to_staging(&self, source: &wgpu::Buffer, staging: &wgpu::Buffer, size: u64) {
        let mut encoder = self.context.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("marching_squares_readback_encoder"),
        });
        encoder.copy_buffer_to_buffer(source, 0, staging, 0, size);
        self.context.queue.submit(std::iter::once(encoder.finish()));
    }
}

impl TriangulationKernel for GpuKernel {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn acquire(&mut self, voxel_resolution: u32, capacity: u32) -> Result<()> {
        self.release();
        let device = &self.context.device;

        let side = voxel_resolution as u64 + 1;
        let state_size = side * side * size_of::<i32>() as u64;
        // Zero-sized bindings are invalid
        let triangle_size = capacity.max(1) as u64 * size_of::<Triangle>() as u64;
        let counter_size = size_of::<u32>() as u64;

        let params_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("marching_squares_params"),
            size: size_of::<KernelParams>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let state_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("marching_squares_states"),
            size: state_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let triangle_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("marching_squares_triangles"),
            size: triangle_size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let triangle_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("marching_squares_triangle_staging"),
            size: triangle_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let counter_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("marching_squares_counter"),
            size: counter_size,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let counter_staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("marching_squares_counter_staging"),
            size: counter_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("marching_squares_bind_group"),
            layout: &self.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: state_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: triangle_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: counter_buffer.as_entire_binding(),
                },
            ],
        });

        self.buffers = Some(KernelBuffers {
            voxel_resolution,
            capacity,
            params_buffer,
            state_buffer,
            triangle_buffer,
            triangle_staging,
            counter_buffer,
            counter_staging,
            bind_group,
        });
        Ok(())
    }

    fn release(&mut self) {
        if let Some(buffers) = self.buffers.take() {
            buffers.destroy();
        }
        self.last_count = None;
    }

    fn dispatch(&mut self, states: &[i32], params: &KernelParams) -> Result<()> {
        let buffers = self.buffers()?;
        let side = buffers.voxel_resolution as usize + 1;
        if params.voxel_resolution != buffers.voxel_resolution || states.len() != side * side {
            return Err(Error::ResolutionMismatch {
                expected: buffers.voxel_resolution,
                actual: params.voxel_resolution,
            });
        }

        let queue = &self.context.queue;
        queue.write_buffer(&buffers.params_buffer, 0, bytemuck::bytes_of(params));
        queue.write_buffer(&buffers.state_buffer, 0, bytemuck::cast_slice(states));

        let mut encoder = self.context.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("marching_squares_encoder"),
        });
        encoder.clear_buffer(&buffers.counter_buffer, 0, None);
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("marching_squares_pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &buffers.bind_group, &[]);
            let groups = params.workgroups();
            pass.dispatch_workgroups(groups, groups, 1);
        }
        encoder.copy_buffer_to_buffer(
            &buffers.counter_buffer,
            0,
            &buffers.counter_staging,
            0,
            size_of::<u32>() as u64,
        );
        queue.submit(std::iter::once(encoder.finish()));

        self.last_count = None;
        Ok(())
    }

    fn read_count(&mut self) -> Result<u32> {
        let buffers = self.buffers()?;
        let slice = buffers.counter_staging.slice(..);
        self.context.map_read(slice).map_err(|e| Error::KernelUnavailable(e.to_string()))?;

        let count = {
            let data = slice.get_mapped_range();
            bytemuck::pod_read_unaligned::<u32>(&data[..size_of::<u32>()])
        };
        buffers.counter_staging.unmap();

        self.last_count = Some(count);
        Ok(count)
    }

    fn read_triangles(&mut self, count: u32, out: &mut Vec<Triangle>) -> Result<()> {
        let buffers = self.buffers()?;
        let stored = self.last_count.unwrap_or(0).min(buffers.capacity);
        if count != stored || self.last_count.is_none() {
            return Err(Error::ReadbackMismatch {
                expected: count as usize,
                actual: stored as usize,
            });
        }

        out.clear();
        if count == 0 {
            return Ok(());
        }

        let size = count as u64 * size_of::<Triangle>() as u64;
        self.copy_to_staging(&buffers.triangle_buffer, &buffers.triangle_staging, size);

        let slice = buffers.triangle_staging.slice(..size);
        self.context.map_read(slice).map_err(|e| Error::KernelUnavailable(e.to_string()))?;
        {
            let data = slice.get_mapped_range();
            out.extend(data.chunks_exact(size_of::<Triangle>()).map(bytemuck::pod_read_unaligned::<Triangle>));
        }
        buffers.triangle_staging.unmap();

        log::trace!("Read back {} triangles", count);
        Ok(())
    }
}

impl Drop for GpuKernel {
    fn drop(&mut self) {
        self.release();
    }
}
