//! One rendered note through each effect.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_render::effects::{effect_by_name, EFFECT_NAMES};
use saavy_render::instruments::{Instrument, PureTone};

use crate::SAMPLE_RATE;

pub fn bench_effects(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/effects");
    group.sample_size(20);

    let Ok(note) = PureTone::new(SAMPLE_RATE).generate(220.0, 0.8, 0.5) else {
        return;
    };

    for &name in EFFECT_NAMES {
        let Some(effect) = effect_by_name(name, SAMPLE_RATE) else {
            continue;
        };
        group.bench_with_input(BenchmarkId::new(name, note.len()), &name, |b, _| {
            b.iter(|| effect.process(black_box(&note)))
        });
    }

    group.finish();
}
