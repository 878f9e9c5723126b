use criterion::{criterion_group, criterion_main, Criterion, black_box};

use glam::Vec3;

use voxmap::core::MapConfig;
use voxmap::triangulate::CpuKernel;
use voxmap::voxel::{EditRequest, FillType, StencilShape, VoxelMap};

fn filled_map(voxels: u32, chunks: u32) -> VoxelMap {
    VoxelMap::with_fill(MapConfig::new(2.0, voxels, chunks), Box::new(CpuKernel::new()), true)
        .expect("cpu map")
}

fn bench_rebuild_all_8x2(c: &mut Criterion) {
    let mut map = filled_map(8, 2);

    c.bench_function("rebuild_all_8x2", |b| {
        b.iter(|| black_box(map.rebuild_all().expect("rebuild")));
    });
}

fn bench_rebuild_all_64x4(c: &mut Criterion) {
    let mut map = filled_map(64, 4);

    c.bench_function("rebuild_all_64x4", |b| {
        b.iter(|| black_box(map.rebuild_all().expect("rebuild")));
    });
}

fn bench_edit_circle_seam(c: &mut Criterion) {
    let mut map = filled_map(32, 4);
    let carve = EditRequest::new(Vec3::ZERO, StencilShape::Circle, FillType::Empty, 5);
    let fill = EditRequest::new(Vec3::ZERO, StencilShape::Circle, FillType::Filled, 5);

    // The centre touches four chunks
    c.bench_function("edit_circle_seam_32x4", |b| {
        let mut carving = true;
        b.iter(|| {
            let request = if carving { carve } else { fill };
            carving = !carving;
            black_box(map.apply_edit(black_box(request)).expect("edit"))
        });
    });
}

fn bench_edit_square_interior(c: &mut Criterion) {
    let mut map = filled_map(32, 4);
    let point = Vec3::new(-3.0, -3.0, 0.0);

    c.bench_function("edit_square_interior_32x4", |b| {
        let mut fill = FillType::Empty;
        b.iter(|| {
            let request = EditRequest::new(point, StencilShape::Square, fill, 3);
            fill = if fill == FillType::Empty { FillType::Filled } else { FillType::Empty };
            black_box(map.apply_edit(black_box(request)).expect("edit"))
        });
    });
}

fn bench_affected_chunks(c: &mut Criterion) {
    let map = filled_map(8, 16);

    c.bench_function("affected_chunks", |b| {
        let mut frame = 0u32;
        b.iter(|| {
            frame += 1;
            let point = Vec3::new(
                (frame as f32 * 0.1).sin() * 15.0,
                (frame as f32 * 0.1).cos() * 15.0,
                0.0,
            );
            black_box(map.affected_chunks(black_box(point), 3))
        });
    });
}

criterion_group!(
    benches,
    bench_rebuild_all_8x2,
    bench_rebuild_all_64x4,
    bench_edit_circle_seam,
    bench_edit_square_interior,
    bench_affected_chunks,
);
criterion_main!(benches);
