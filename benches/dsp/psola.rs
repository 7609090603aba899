//! Benchmarks for PSOLA pitch shifting.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_render::dsp::psola::shift_pitch;

use crate::SAMPLE_RATE;

pub fn bench_psola(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/psola");

    // Half a second of a 220 Hz tone with a couple of harmonics
    let source: Vec<f32> = (0..SAMPLE_RATE as usize / 2)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            let w = std::f32::consts::TAU * 220.0 * t;
            0.6 * w.sin() + 0.3 * (2.0 * w).sin() + 0.1 * (3.0 * w).sin()
        })
        .collect();

    for &ratio in &[0.75f64, 1.5] {
        group.bench_with_input(BenchmarkId::new("shift", ratio), &ratio, |b, &r| {
            b.iter(|| shift_pitch(black_box(&source), SAMPLE_RATE, r))
        });
    }

    group.finish();
}
