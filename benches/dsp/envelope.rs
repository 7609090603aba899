//! Benchmarks for envelope rendering.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_render::dsp::envelope::{Adsr, Curve, Envelope, WoodwindEnvelope};

use crate::SAMPLE_RATE;

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/envelope");

    for &seconds in &[0.25, 1.0] {
        let label = format!("{}ms", (seconds * 1000.0) as u32);

        let linear = Adsr::new(1.5, 0.05, 0.1, 0.3).with_curve(Curve::Linear);
        group.bench_with_input(BenchmarkId::new("adsr_linear", &label), &seconds, |b, &s| {
            b.iter(|| linear.render(black_box(s), SAMPLE_RATE))
        });

        // Polynomial shaping costs a powf per sample
        let shaped = Adsr::new(1.5, 0.05, 0.1, 0.3);
        group.bench_with_input(BenchmarkId::new("adsr_flat_top", &label), &seconds, |b, &s| {
            b.iter(|| shaped.render(black_box(s), SAMPLE_RATE))
        });

        let woodwind = WoodwindEnvelope::new(1.2, 0.1, 0.1, 0.05).with_linear_fraction(0.4);
        group.bench_with_input(BenchmarkId::new("woodwind", &label), &seconds, |b, &s| {
            b.iter(|| woodwind.render(black_box(s), SAMPLE_RATE))
        });
    }

    group.finish();
}
