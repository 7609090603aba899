use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use saavy_render::{
    engine::{RenderEvent, SchedulerState, TrackScheduler},
    instruments::Instrument,
    params::{ParamValue, ParameterSet, Parameterized},
    sequencing::{ChannelTrack, Note},
    RenderConfig, Result, SynthError,
};

/// Renders short clicks; the call numbered `gate_at` parks on two barriers
/// so the test can cancel while it is in flight.
struct GatedClick {
    calls: AtomicUsize,
    gate_at: usize,
    reached: Barrier,
    release: Barrier,
}

impl GatedClick {
    fn new(gate_at: usize) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            gate_at,
            reached: Barrier::new(2),
            release: Barrier::new(2),
        }
    }
}

impl Parameterized for GatedClick {
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
    }

    fn apply_parameter(&mut self, key: &str, _value: &ParamValue) -> Result<()> {
        Err(SynthError::UnknownParameter(key.to_string()))
    }
}

impl Instrument for GatedClick {
    fn name(&self) -> &str {
        "Gated Click"
    }

    fn sample_rate(&self) -> u32 {
        1_000
    }

    fn release_time(&self) -> f64 {
        0.0
    }

    fn generate(&self, _frequency_hz: f64, amplitude: f32, _duration: f64) -> Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == self.gate_at {
            self.reached.wait();
            self.release.wait();
        }
        Ok(vec![amplitude; 4])
    }
}

/// Panics on every note above middle C.
struct BrittleTone;

impl Parameterized for BrittleTone {
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
    }

    fn apply_parameter(&mut self, key: &str, _value: &ParamValue) -> Result<()> {
        Err(SynthError::UnknownParameter(key.to_string()))
    }
}

impl Instrument for BrittleTone {
    fn name(&self) -> &str {
        "Brittle Tone"
    }

    fn sample_rate(&self) -> u32 {
        1_000
    }

    fn release_time(&self) -> f64 {
        0.0
    }

    fn generate(&self, frequency_hz: f64, amplitude: f32, _duration: f64) -> Result<Vec<f32>> {
        if frequency_hz > 262.0 {
            panic!("no samples above C4");
        }
        Ok(vec![amplitude; 4])
    }
}

fn hundred_notes() -> ChannelTrack {
    let notes = (0..100)
        .filter_map(|i| Note::new(60, 100, i as f64 * 0.01, i as f64 * 0.01 + 0.004))
        .collect();
    ChannelTrack::new(0, "Clicks", notes)
}

#[test]
fn cancel_after_forty_jobs_freezes_progress() {
    let instrument = Arc::new(GatedClick::new(40));
    let mut scheduler = TrackScheduler::new(RenderConfig::new().with_sample_rate(1_000));
    let queued = scheduler
        .synthesize_track(&hundred_notes(), instrument.clone(), 1.0, None)
        .unwrap();
    assert_eq!(queued, 100);
    scheduler.start().unwrap();

    // the 41st job is now in flight, 40 are done
    instrument.reached.wait();
    assert_eq!(scheduler.progress(), 40);

    let dropped = scheduler.cancel();
    assert_eq!(dropped, 59);
    assert_eq!(scheduler.state(), SchedulerState::Cancelled);
    let before_release = scheduler.poll_events();

    instrument.release.wait();
    let after_cancel = scheduler.wait().unwrap();
    assert!(
        after_cancel.is_empty(),
        "events after cancel: {after_cancel:?}"
    );

    let rendered = before_release
        .iter()
        .filter(|e| matches!(e, RenderEvent::NoteRendered { .. }))
        .count();
    assert_eq!(rendered, 40);
    let last_progress = before_release
        .iter()
        .rev()
        .find_map(|e| match e {
            RenderEvent::Progress(p) => Some(*p),
            _ => None,
        })
        .unwrap_or(0);
    assert!(last_progress <= 40);
    assert!(!before_release
        .iter()
        .any(|e| matches!(e, RenderEvent::Completed(_))));

    assert!(scheduler.progress() <= 40);
    assert_eq!(scheduler.state(), SchedulerState::Cancelled);
    assert_eq!(instrument.calls.load(Ordering::SeqCst), 41);
}

#[test]
fn panicking_instrument_fails_only_its_notes() {
    let notes = [60u8, 72, 55, 48]
        .into_iter()
        .enumerate()
        .filter_map(|(i, pitch)| Note::new(pitch, 100, i as f64 * 0.01, i as f64 * 0.01 + 0.004))
        .collect();
    let track = ChannelTrack::new(0, "Brittle", notes);
    let mut scheduler = TrackScheduler::new(RenderConfig::new().with_sample_rate(1_000));
    scheduler
        .synthesize_track(&track, Arc::new(BrittleTone), 1.0, None)
        .unwrap();
    scheduler.start().unwrap();
    let events = scheduler.wait().unwrap();

    let failed: Vec<_> = events
        .iter()
        .filter_map(|e| match e {
            RenderEvent::JobFailed { index, message } => Some((*index, message.clone())),
            _ => None,
        })
        .collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].0, 1);
    assert!(failed[0].1.contains("no samples above C4"));

    let rendered = events
        .into_iter()
        .find_map(RenderEvent::into_track)
        .expect("session completes despite the panic");
    assert_eq!(rendered.failed_jobs, 1);
    assert_eq!(scheduler.state(), SchedulerState::Completed);

    // the scheduler takes the next session straight away
    let again = scheduler
        .render(&hundred_notes(), Arc::new(BrittleTone), 1.0, None)
        .unwrap()
        .expect("second session completes");
    assert_eq!(again.failed_jobs, 0);
}

#[test]
fn scheduler_is_reusable_after_cancel() {
    let instrument = Arc::new(GatedClick::new(usize::MAX));
    let mut scheduler = TrackScheduler::new(RenderConfig::new().with_sample_rate(1_000));
    scheduler
        .synthesize_track(&hundred_notes(), instrument.clone(), 1.0, None)
        .unwrap();
    scheduler.cancel();
    assert!(matches!(scheduler.start(), Err(SynthError::EmptyInput(_))));

    let rendered = scheduler
        .render(&hundred_notes(), instrument, 0.5, None)
        .unwrap()
        .expect("second session completes");
    assert_eq!(rendered.failed_jobs, 0);
    assert!(rendered.samples.iter().any(|&s| s > 0.0));
    assert_eq!(scheduler.state(), SchedulerState::Completed);
}
