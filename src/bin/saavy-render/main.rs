//! saavy-render - render a short demo phrase to a WAV file
//!
//! Run with: cargo run --bin saavy-render -- out.wav [instrument] [effect]
//!
//! Set RUST_LOG=saavy_render=debug for scheduler and reconstruction logs.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use color_eyre::eyre::{bail, eyre, Result as EyreResult, WrapErr};
use saavy_render::{
    effects::{effect_by_name, EFFECT_NAMES},
    engine::{RenderEvent, TrackScheduler},
    instruments::{instrument_by_name, INSTRUMENT_NAMES},
    io::{
        midi::{ticks_to_seconds, MidiEvent},
        AudioSink, EventList, TrackMessage, TrackMetadata, WavFileSink,
    },
    sequencing::{parse_pitch, MidiSong},
    RenderConfig,
};

const TICKS_PER_BEAT: u16 = 480;
// 100 bpm
const TEMPO_US: u32 = 600_000;

/// (pitch name, length in beats); `None` pitch is a rest.
const PHRASE: &[(Option<&str>, f64)] = &[
    (Some("E4"), 1.0),
    (Some("G4"), 0.5),
    (Some("A4"), 0.5),
    (Some("B4"), 1.0),
    (None, 0.5),
    (Some("A4"), 0.5),
    (Some("G4"), 1.0),
    (Some("E4"), 0.5),
    (Some("D4"), 0.5),
    (Some("E4"), 2.0),
];

fn demo_phrase() -> EyreResult<EventList> {
    let mut deltas = Vec::new();
    let mut track = vec![(0, TrackMessage::TrackName("Demo Melody".to_string()))];
    let mut pending_rest = 0.0;
    let mut rest_ticks = 0;
    for &(name, beats) in PHRASE {
        let ticks = (beats * TICKS_PER_BEAT as f64).round() as u32;
        let seconds = ticks_to_seconds(ticks, TICKS_PER_BEAT, TEMPO_US);
        let Some(name) = name else {
            pending_rest += seconds;
            rest_ticks += ticks;
            continue;
        };
        let key = parse_pitch(name).ok_or_else(|| eyre!("bad pitch name `{name}`"))?;
        let on = MidiEvent::from_bytes(&[0x90, key, 96])
            .ok_or_else(|| eyre!("could not build note-on for {name}"))?;
        let off = MidiEvent::from_bytes(&[0x80, key, 0])
            .ok_or_else(|| eyre!("could not build note-off for {name}"))?;
        deltas.push((pending_rest, on));
        deltas.push((seconds, off));
        track.push((rest_ticks, TrackMessage::Channel(on)));
        track.push((ticks, TrackMessage::Channel(off)));
        pending_rest = 0.0;
        rest_ticks = 0;
    }

    let mut events = EventList::from_deltas(deltas);
    events.add_metadata(TrackMetadata::from_messages(track));
    Ok(events)
}

fn main() -> EyreResult<()> {
    color_eyre::install()?;
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let Some(out_path) = args.next() else {
        bail!(
            "usage: saavy-render <out.wav> [instrument] [effect]\n  instruments: {}\n  effects: {}",
            INSTRUMENT_NAMES.join(", "),
            EFFECT_NAMES.join(", ")
        );
    };
    let instrument_name = args.next().unwrap_or_else(|| "fm-clarinet".to_string());
    let effect_name = args.next().unwrap_or_else(|| "none".to_string());

    let config = RenderConfig::default();
    let instrument = instrument_by_name(&instrument_name, config.sample_rate)
        .ok_or_else(|| eyre!("unknown instrument `{instrument_name}`"))?;
    let effect = effect_by_name(&effect_name, config.sample_rate)
        .ok_or_else(|| eyre!("unknown effect `{effect_name}`"))?;

    let song = MidiSong::new(demo_phrase()?);
    for warning in &song.reconstruction().warnings {
        eprintln!("warning: {warning}");
    }
    let track = song
        .tracks()
        .first()
        .ok_or_else(|| eyre!("demo phrase produced no notes"))?;

    println!("=== saavy-render ===");
    println!("Track: {} ({} notes, {:.2}s)", track.title, track.len(), track.total_duration);
    println!("Instrument: {}", instrument.name());
    println!("Effect: {}", effect.name());
    println!("Sample rate: {} Hz", config.sample_rate);
    println!();

    let mut scheduler = TrackScheduler::new(config);
    scheduler
        .synthesize_track(track, Arc::from(instrument), 0.8, Some(Arc::from(effect)))
        .wrap_err("failed to queue notes")?;
    scheduler.start().wrap_err("failed to start render worker")?;

    let rendered = loop {
        let mut finished = None;
        for event in scheduler.poll_events() {
            match event {
                RenderEvent::Progress(p) => println!("  {p:>3}%"),
                RenderEvent::JobFailed { index, message } => {
                    eprintln!("  note {index} failed: {message}")
                }
                RenderEvent::Completed(track) => finished = Some(track),
                RenderEvent::NoteRendered { .. } => {}
            }
        }
        if let Some(track) = finished {
            break track;
        }
        if !scheduler.is_busy() {
            let rest = scheduler.wait()?;
            break rest
                .into_iter()
                .find_map(RenderEvent::into_track)
                .ok_or_else(|| eyre!("render finished without a track"))?;
        }
        thread::sleep(Duration::from_millis(20));
    };

    let mut sink = WavFileSink::new(&out_path);
    sink.consume(&rendered.samples, rendered.framerate, rendered.channels)
        .wrap_err_with(|| format!("failed to write {out_path}"))?;

    println!();
    println!(
        "Wrote {:.2}s of `{}` to {}",
        rendered.duration_seconds(),
        rendered.title,
        out_path
    );
    Ok(())
}
