//! One note through each instrument.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_render::instruments::{instrument_by_name, INSTRUMENT_NAMES};

use crate::SAMPLE_RATE;

pub fn bench_instruments(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/instruments");
    group.sample_size(20);

    for &name in INSTRUMENT_NAMES {
        let Some(instrument) = instrument_by_name(name, SAMPLE_RATE) else {
            continue;
        };
        // A4 for half a second, as a typical melody note
        group.bench_with_input(BenchmarkId::new(name, "A4_500ms"), &name, |b, _| {
            b.iter(|| instrument.generate(black_box(440.0), black_box(0.8), black_box(0.5)))
        });
    }

    group.finish();
}
