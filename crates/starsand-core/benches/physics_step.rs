use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

use starsand_core::{GrainSimulation, VesselParams};

const DT: f32 = 1.0 / 60.0;

/// Bottle with `grains` poured in and given time to land
fn filled(grains: u32) -> GrainSimulation {
    let mut sim = GrainSimulation::initialize(VesselParams::default(), grains as usize).unwrap();
    sim.trigger_pour_grains(grains);
    sim.warmup(grains / 2 + 120);
    sim
}

fn bench_settled_pile(c: &mut Criterion) {
    let mut sim = filled(500);
    c.bench_function("frame_500_settled", |b| {
        b.iter(|| {
            black_box(sim.advance_frame(black_box(DT)).len());
        })
    });
}

fn bench_shaken_pile(c: &mut Criterion) {
    let mut sim = filled(500);
    c.bench_function("frame_500_shaken", |b| {
        b.iter(|| {
            sim.shake(0.5);
            black_box(sim.advance_frame(black_box(DT)).len());
        })
    });
}

fn bench_pouring(c: &mut Criterion) {
    c.bench_function("pour_200_one_second", |b| {
        b.iter(|| {
            let mut sim = GrainSimulation::initialize(VesselParams::default(), 200).unwrap();
            sim.trigger_pour_grains(200);
            for _ in 0..60 {
                sim.advance_frame(DT);
            }
            black_box(sim.alive_count())
        })
    });
}

criterion_group!(benches, bench_settled_pile, bench_shaken_pile, bench_pouring);
criterion_main!(benches);
