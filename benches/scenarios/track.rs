//! A whole channel through the scheduler: queue, worker, overlap-add.

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion};
use saavy_render::{
    engine::TrackScheduler,
    instruments::{Instrument, KarplusStrong, PureTone},
    sequencing::{ChannelTrack, Note},
    RenderConfig,
};

use crate::SAMPLE_RATE;

fn arpeggio(notes: usize) -> ChannelTrack {
    let pitches = [57u8, 60, 64, 69];
    let notes = (0..notes)
        .filter_map(|i| {
            let on = i as f64 * 0.125;
            Note::new(pitches[i % pitches.len()], 100, on, on + 0.25)
        })
        .collect();
    ChannelTrack::new(0, "Arpeggio", notes)
}

pub fn bench_track(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/track");
    group.sample_size(10);

    let config = RenderConfig::new().with_sample_rate(SAMPLE_RATE);
    let instruments: [(&str, Arc<dyn Instrument>); 2] = [
        ("pure_tone", Arc::new(PureTone::new(SAMPLE_RATE))),
        ("karplus", Arc::new(KarplusStrong::new(SAMPLE_RATE).with_seed(1))),
    ];

    for &notes in &[16usize, 64] {
        let track = arpeggio(notes);
        for (label, instrument) in &instruments {
            let mut scheduler = TrackScheduler::new(config.clone());
            group.bench_with_input(BenchmarkId::new(*label, notes), &notes, |b, _| {
                b.iter(|| scheduler.render(&track, Arc::clone(instrument), 0.8, None))
            });
        }
    }

    group.finish();
}
