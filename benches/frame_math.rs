//! CPU-side renderer math benchmarks: frame slot rotation, descriptor
//! pool sizing, mip chain math, and scene-graph traversal. None of these
//! require a Vulkan driver.

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use pbr_renderer::renderer::scene::{draw_order, Node};
use pbr_renderer::renderer::texture::{mip_extent, mip_level_count};
use pbr_renderer::renderer::slot_for_frame;
use pbr_renderer::vulkan::scene_pool_sizes;

fn frame_rotation(c: &mut Criterion) {
    c.bench_function("slot_rotation_1000_frames", |b| {
        b.iter(|| {
            let mut last = 0;
            for frame in 0..1000usize {
                last = slot_for_frame(frame, 3);
            }
            last
        })
    });
}

fn pool_sizing(c: &mut Criterion) {
    let mut group = c.benchmark_group("descriptor_pool_sizing");
    for materials in [1u32, 10, 100] {
        group.bench_with_input(
            BenchmarkId::new("scene_pool_sizes", materials),
            &materials,
            |b, &m| b.iter(|| scene_pool_sizes(m, m * 2)),
        );
    }
    group.finish();
}

fn mip_chain(c: &mut Criterion) {
    c.bench_function("mip_chain_1024", |b| {
        b.iter(|| {
            let levels = mip_level_count(1024);
            let mut total = 0u32;
            for level in 0..levels {
                total += mip_extent(1024, level);
            }
            total
        })
    });
}

fn scene_traversal(c: &mut Criterion) {
    let mut group = c.benchmark_group("scene_traversal");

    for node_count in [10usize, 100, 1000] {
        // Balanced binary tree expressed as an index arena.
        let nodes: Vec<Node> = (0..node_count)
            .map(|index| {
                let left = index * 2 + 1;
                let right = index * 2 + 2;
                let mut children = Vec::new();
                if left < node_count {
                    children.push(left);
                }
                if right < node_count {
                    children.push(right);
                }
                Node {
                    mesh: Some(0),
                    children,
                }
            })
            .collect();

        group.bench_with_input(
            BenchmarkId::new("draw_order", node_count),
            &nodes,
            |b, nodes| b.iter(|| draw_order(nodes, &[0]).unwrap().len()),
        );
    }

    group.finish();
}

criterion_group!(benches, frame_rotation, pool_sizing, mip_chain, scene_traversal);
criterion_main!(benches);
