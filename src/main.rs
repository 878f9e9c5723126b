//! voxmap - headless editing session
//!
//! Builds a filled map, runs a scripted sequence of fill and clear edits
//! through the edit queue and logs per-edit triangle statistics.
//!
//! Options:
//!   --config <PATH>      JSON map config (fields default when missing)
//!   --kernel cpu|gpu     triangulation kernel (default: cpu)
//!   --chunk-size <F32>   overrides chunk_size
//!   --voxels <U32>       overrides voxel_resolution
//!   --chunks <U32>       overrides chunk_resolution

use glam::Vec3;

use voxmap::core::{logging, MapConfig, Result};
use voxmap::triangulate::{CpuKernel, GpuKernel, TriangulationKernel};
use voxmap::voxel::{EditRequest, FillType, StencilShape, VoxelMap};

fn main() {
    logging::init();

    if let Err(err) = run() {
        log::error!("{}", err);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();

    let mut config = match parse_str_arg(&args, "--config") {
        Some(path) => MapConfig::load(path)?,
        None => MapConfig::default(),
    };
    if let Some(size) = parse_f32_arg(&args, "--chunk-size") {
        config.chunk_size = size;
    }
    if let Some(voxels) = parse_u32_arg(&args, "--voxels") {
        config.voxel_resolution = voxels;
    }
    if let Some(chunks) = parse_u32_arg(&args, "--chunks") {
        config.chunk_resolution = chunks;
    }
    config.validate()?;

    let kernel = select_kernel(parse_str_arg(&args, "--kernel").as_deref());
    let mut map = VoxelMap::with_fill(config, kernel, true)?;

    for request in scripted_edits(&config) {
        map.submit(request);
    }
    log::info!("Applying {} queued edits", map.pending_edits());

    for (i, report) in map.apply_pending()?.iter().enumerate() {
        log::info!(
            "Edit {}: {} chunks, {} voxels changed, {} triangles, {} stale",
            i,
            report.chunks.len(),
            report.voxels_changed,
            report.triangles,
            report.stale.len()
        );
    }

    let stale = map.retry_stale()?;
    if !stale.is_empty() {
        log::warn!("{} chunks still stale after retry", stale.len());
    }

    let triangles: usize = map.chunks().iter().map(|c| c.mesh().triangle_count()).sum();
    let filled: usize = map.chunks().iter().map(|c| c.filled_count()).sum();
    log::info!(
        "Final map: {} triangles, {} / {} voxels filled",
        triangles,
        filled,
        config.chunk_count() * config.voxels_per_chunk()
    );

    map.shutdown();
    Ok(())
}

/// Kernel named on the command line, falling back to the CPU kernel when no
/// adapter is available
fn select_kernel(name: Option<&str>) -> Box<dyn TriangulationKernel> {
    match name {
        Some("gpu") => match GpuKernel::new() {
            Ok(kernel) => Box::new(kernel),
            Err(err) => {
                log::warn!("{}; falling back to the cpu kernel", err);
                Box::new(CpuKernel::new())
            }
        },
        Some("cpu") | None => Box::new(CpuKernel::new()),
        Some(other) => {
            log::warn!("Unknown kernel '{}', using cpu", other);
            Box::new(CpuKernel::new())
        }
    }
}

/// Carve and refill a few spots across the lattice with every stencil
fn scripted_edits(config: &MapConfig) -> Vec<EditRequest> {
    let quarter = config.half_extent() * 0.5;
    let spots = [
        Vec3::ZERO,
        Vec3::new(-quarter, -quarter, 0.0),
        Vec3::new(quarter, -quarter, 0.0),
        Vec3::new(quarter, quarter, 0.0),
    ];

    let mut edits = Vec::new();
    for (i, point) in spots.into_iter().enumerate() {
        let shape = StencilShape::ALL[i % StencilShape::ALL.len()];
        let radius = (i as u32 + 1).min(5);
        edits.push(EditRequest::new(point, shape, FillType::Empty, radius));
    }
    // Refill the centre with a smaller stencil
    edits.push(EditRequest::new(Vec3::ZERO, StencilShape::Square, FillType::Filled, 0));
    edits
}

fn parse_f32_arg(args: &[String], flag: &str) -> Option<f32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_u32_arg(args: &[String], flag: &str) -> Option<u32> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .and_then(|s| s.parse().ok())
}

fn parse_str_arg(args: &[String], flag: &str) -> Option<String> {
    args.iter().position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
