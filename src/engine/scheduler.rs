use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use log::{debug, info, warn};
use rtrb::{Consumer, Producer, RingBuffer};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::job::{JobQueue, SynthJob};
use super::mix::{spread_channels, MixBuffer};
use crate::config::RenderConfig;
use crate::effects::Effect;
use crate::error::{Result, SynthError};
use crate::instruments::Instrument;
use crate::io::converter::{velocity_to_amplitude, PitchTable};
use crate::sequencing::ChannelTrack;

/*
Track Scheduler
===============

Renders one channel's notes into one buffer on a background thread.

    synthesize_track()          start()                 worker
    ──────────────────          ───────                 ──────
    note → SynthJob ──push──▶  [ JobQueue ] ──pop──▶  generate → effect
                                                             │
                                    poll_events() ◀── rtrb ──┤
                                                             ▼
                                                    MixBuffer.add_at(offset)

Each job carries the note's absolute sample offset, the running sum of the
gaps between note starts. Pitches are mapped to Hertz through a PitchTable
while queueing, so instruments only ever see frequencies.

Notes are mixed in mono. When the config asks for more channels, the
finished mix is duplicated into every channel and interleaved before the
Completed event, so `samples.len() == frames * channels`.

A panic inside an instrument or effect is caught per job and reported as
JobFailed like any other error.

Locks
-----

Two mutexes, never held at the same time by the worker:

  JobQueue      pending jobs, popped FIFO
  SessionState  mix buffer, progress counters and lifecycle state

Events are pushed while SessionState is held. cancel() takes the same lock
to raise the cancel flag, so once it returns the worker cannot push again.
A job that was mid-render during cancel() finishes, sees the flag and its
result is dropped.

Lifecycle
---------

    Idle ──start──▶ Running ──queue empty──▶ Completed
                       │
                       └──cancel──▶ Cancelled

One session at a time: synthesize_track/start while Running is
SchedulerBusy.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    Running,
    Completed,
    Cancelled,
}

/// A finished channel render, ready for an audio sink or the mixer.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTrack {
    pub title: String,
    /// Interleaved when `channels > 1`.
    pub samples: Vec<f32>,
    pub framerate: u32,
    pub channels: u16,
    pub instrument_name: String,
    /// "None" when rendered dry.
    pub effect_name: String,
    /// Jobs whose instrument or effect returned an error.
    pub failed_jobs: usize,
}

impl RenderedTrack {
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    pub fn duration_seconds(&self) -> f64 {
        self.frames() as f64 / self.framerate.max(1) as f64
    }
}

/// Worker → caller notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderEvent {
    /// Percentage of jobs done, never decreasing within a session.
    Progress(u8),
    NoteRendered {
        index: usize,
        sample_offset: usize,
        len: usize,
    },
    /// The job's error, rendered as text. The session carries on.
    JobFailed { index: usize, message: String },
    /// Emitted once, after the last job.
    Completed(RenderedTrack),
}

impl RenderEvent {
    pub fn into_track(self) -> Option<RenderedTrack> {
        match self {
            RenderEvent::Completed(track) => Some(track),
            _ => None,
        }
    }
}

struct SessionState {
    state: SchedulerState,
    buffer: MixBuffer,
    completed: usize,
    total: usize,
    failed: usize,
    last_progress: u8,
}

impl SessionState {
    fn progress(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        (self.completed * 100 / self.total).min(100) as u8
    }
}

struct Shared {
    queue: JobQueue,
    session: Mutex<SessionState>,
    cancelled: AtomicBool,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Debug, Clone)]
struct TrackInfo {
    title: String,
    instrument_name: String,
    effect_name: String,
}

pub struct TrackScheduler {
    config: RenderConfig,
    pitch_table: PitchTable,
    shared: Arc<Shared>,
    info: Option<TrackInfo>,
    events: Option<Consumer<RenderEvent>>,
    worker: Option<JoinHandle<()>>,
}

impl TrackScheduler {
    pub fn new(config: RenderConfig) -> Self {
        let framerate = config.sample_rate;
        Self {
            config,
            pitch_table: PitchTable::new(),
            shared: Arc::new(Shared {
                queue: JobQueue::new(),
                session: Mutex::new(SessionState {
                    state: SchedulerState::Idle,
                    buffer: MixBuffer::new(framerate),
                    completed: 0,
                    total: 0,
                    failed: 0,
                    last_progress: 0,
                }),
                cancelled: AtomicBool::new(false),
            }),
            info: None,
            events: None,
            worker: None,
        }
    }

    pub fn with_pitch_table(mut self, table: PitchTable) -> Self {
        self.pitch_table = table;
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.shared.lock().state
    }

    pub fn is_busy(&self) -> bool {
        self.state() == SchedulerState::Running
    }

    /// Jobs done as a percentage of jobs queued.
    pub fn progress(&self) -> u8 {
        self.shared.lock().progress()
    }

    pub fn pending_jobs(&self) -> usize {
        self.shared.queue.len()
    }

    /// Queue one job per note of `track`. Returns the number of jobs queued.
    ///
    /// `volume` scales `velocity / 127`. Notes are queued in order; if the
    /// config has a time limit, queueing stops at the first note ending past
    /// it.
    pub fn synthesize_track(
        &mut self,
        track: &ChannelTrack,
        instrument: Arc<dyn Instrument>,
        volume: f32,
        effect: Option<Arc<dyn Effect>>,
    ) -> Result<usize> {
        if self.is_busy() {
            return Err(SynthError::SchedulerBusy);
        }
        self.join_worker()?;

        if instrument.sample_rate() != self.config.sample_rate {
            warn!(
                "instrument `{}` runs at {} Hz, session at {} Hz",
                instrument.name(),
                instrument.sample_rate(),
                self.config.sample_rate
            );
        }

        let mut jobs = Vec::with_capacity(track.notes.len());
        let mut start_time = 0.0;
        let mut previous_on = 0.0;
        for (index, note) in track.notes.iter().enumerate() {
            if let Some(limit) = self.config.time_limit {
                if note.time_off > limit {
                    info!(
                        "time limit {limit:.2}s reached, {} of {} notes queued",
                        index,
                        track.notes.len()
                    );
                    break;
                }
            }
            start_time += note.time_on - previous_on;
            previous_on = note.time_on;

            jobs.push(SynthJob {
                index,
                sample_offset: self.config.samples_for(start_time),
                note: *note,
                frequency_hz: self.pitch_table.frequency(note.pitch),
                amplitude: velocity_to_amplitude(note.velocity, volume),
                instrument: Arc::clone(&instrument),
                effect: effect.clone(),
            });
        }

        let initial_len = jobs
            .last()
            .map(|job| {
                self.config
                    .samples_for(start_time + job.note.duration + self.config.guard_seconds)
            })
            .unwrap_or(0);

        let queued = jobs.len();
        self.shared.queue.clear();
        self.shared.queue.extend(jobs);
        self.shared.cancelled.store(false, Ordering::Release);
        {
            let mut session = self.shared.lock();
            session.state = SchedulerState::Idle;
            session.buffer = MixBuffer::with_len(initial_len, self.config.sample_rate);
            session.completed = 0;
            session.total = queued;
            session.failed = 0;
            session.last_progress = 0;
        }
        self.events = None;
        self.info = Some(TrackInfo {
            title: track.title.clone(),
            instrument_name: instrument.name().to_string(),
            effect_name: effect
                .as_ref()
                .map(|e| e.name().to_string())
                .unwrap_or_else(|| "None".to_string()),
        });

        debug!(
            "queued {queued} notes for `{}`, mix buffer {initial_len} samples",
            track.title
        );
        Ok(queued)
    }

    /// Spawn the worker for the queued session.
    pub fn start(&mut self) -> Result<()> {
        if self.is_busy() {
            return Err(SynthError::SchedulerBusy);
        }
        let Some(info) = self.info.take() else {
            return Err(SynthError::EmptyInput("no track queued"));
        };

        let total = {
            let mut session = self.shared.lock();
            session.state = SchedulerState::Running;
            session.total
        };
        // every job pushes at most two events, plus the final one
        let (producer, consumer) = RingBuffer::new(2 * total + 2);
        self.events = Some(consumer);

        let shared = Arc::clone(&self.shared);
        let channels = self.config.channels;
        let spawned = thread::Builder::new()
            .name("saavy-render-worker".into())
            .spawn(move || run_worker(shared, producer, info, channels));
        match spawned {
            Ok(handle) => {
                self.worker = Some(handle);
                Ok(())
            }
            Err(err) => {
                self.shared.lock().state = SchedulerState::Idle;
                Err(SynthError::Io(err))
            }
        }
    }

    /// Drain the events the worker has pushed so far.
    pub fn poll_events(&mut self) -> Vec<RenderEvent> {
        let mut out = Vec::new();
        if let Some(events) = self.events.as_mut() {
            while let Ok(event) = events.pop() {
                out.push(event);
            }
        }
        out
    }

    /// Block until the worker exits, then drain the remaining events.
    pub fn wait(&mut self) -> Result<Vec<RenderEvent>> {
        self.join_worker()?;
        Ok(self.poll_events())
    }

    /// Stop the session: drop the pending jobs and reset the progress
    /// counters. Returns the number of jobs dropped.
    ///
    /// Does not wait for an in-flight job; its result is discarded and no
    /// event is pushed after this returns.
    pub fn cancel(&mut self) -> usize {
        let dropped = {
            let mut session = self.shared.lock();
            self.shared.cancelled.store(true, Ordering::Release);
            let dropped = self.shared.queue.clear();
            if matches!(session.state, SchedulerState::Running | SchedulerState::Idle) {
                session.state = SchedulerState::Cancelled;
            }
            session.completed = 0;
            session.total = 0;
            session.last_progress = 0;
            dropped
        };
        self.info = None;
        if dropped > 0 {
            info!("render cancelled, {dropped} jobs dropped");
        }
        dropped
    }

    /// Queue, start and wait in one go. `None` if the session was cancelled.
    pub fn render(
        &mut self,
        track: &ChannelTrack,
        instrument: Arc<dyn Instrument>,
        volume: f32,
        effect: Option<Arc<dyn Effect>>,
    ) -> Result<Option<RenderedTrack>> {
        self.synthesize_track(track, instrument, volume, effect)?;
        self.start()?;
        let events = self.wait()?;
        Ok(events.into_iter().find_map(RenderEvent::into_track))
    }

    fn join_worker(&mut self) -> Result<()> {
        let Some(handle) = self.worker.take() else {
            return Ok(());
        };
        if handle.join().is_ok() {
            return Ok(());
        }
        // the session died with the worker; free the scheduler for the next one
        warn!("render worker panicked, session abandoned");
        self.shared.queue.clear();
        let mut session = self.shared.lock();
        if session.state == SchedulerState::Running {
            session.state = SchedulerState::Idle;
        }
        Err(SynthError::WorkerPanicked)
    }
}

impl Drop for TrackScheduler {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.cancel();
            let _ = self.join_worker();
        }
    }
}

impl std::fmt::Debug for TrackScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackScheduler")
            .field("config", &self.config)
            .field("state", &self.state())
            .field("pending_jobs", &self.pending_jobs())
            .finish()
    }
}

fn push_event(events: &mut Producer<RenderEvent>, event: RenderEvent) {
    if events.push(event).is_err() {
        warn!("render event channel full, event dropped");
    }
}

fn run_worker(
    shared: Arc<Shared>,
    mut events: Producer<RenderEvent>,
    info: TrackInfo,
    channels: u16,
) {
    loop {
        if shared.cancelled.load(Ordering::Acquire) {
            return;
        }
        let Some(job) = shared.queue.pop() else {
            break;
        };
        let result = job.run();

        let mut session = shared.lock();
        if shared.cancelled.load(Ordering::Acquire) {
            debug!("discarding note {} rendered after cancel", job.index);
            return;
        }
        match result {
            Ok(wave) => {
                session.buffer.add_at(job.sample_offset, &wave);
                push_event(
                    &mut events,
                    RenderEvent::NoteRendered {
                        index: job.index,
                        sample_offset: job.sample_offset,
                        len: wave.len(),
                    },
                );
            }
            Err(err) => {
                warn!("note {} failed: {err}", job.index);
                session.failed += 1;
                push_event(
                    &mut events,
                    RenderEvent::JobFailed {
                        index: job.index,
                        message: err.to_string(),
                    },
                );
            }
        }
        session.completed += 1;
        let progress = session.progress();
        if progress > session.last_progress {
            session.last_progress = progress;
            push_event(&mut events, RenderEvent::Progress(progress));
        }
    }

    let mut session = shared.lock();
    if shared.cancelled.load(Ordering::Acquire) {
        return;
    }
    session.state = SchedulerState::Completed;
    let framerate = session.buffer.framerate();
    let mono = std::mem::replace(&mut session.buffer, MixBuffer::new(framerate)).into_samples();
    info!(
        "rendered `{}`: {} notes, {} failed, {:.2}s",
        info.title,
        session.completed,
        session.failed,
        mono.len() as f64 / framerate.max(1) as f64
    );
    let channels = channels.max(1);
    let samples = if channels > 1 {
        spread_channels(&mono, 1, channels)
    } else {
        mono
    };
    push_event(
        &mut events,
        RenderEvent::Completed(RenderedTrack {
            title: info.title,
            samples,
            framerate,
            channels,
            instrument_name: info.instrument_name,
            effect_name: info.effect_name,
            failed_jobs: session.failed,
        }),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruments::PureTone;
    use crate::sequencing::Note;

    fn track(notes: &[(u8, f64, f64)]) -> ChannelTrack {
        let notes = notes
            .iter()
            .filter_map(|&(pitch, on, off)| Note::new(pitch, 127, on, off))
            .collect();
        ChannelTrack::new(0, "Lead", notes)
    }

    fn scheduler() -> TrackScheduler {
        TrackScheduler::new(RenderConfig::new().with_sample_rate(8_000))
    }

    #[test]
    fn offsets_follow_note_starts() {
        let mut sched = scheduler();
        let queued = sched
            .synthesize_track(
                &track(&[(60, 0.0, 0.2), (64, 0.5, 0.7), (67, 1.25, 1.5)]),
                Arc::new(PureTone::new(8_000)),
                1.0,
                None,
            )
            .unwrap();
        assert_eq!(queued, 3);
        let offsets: Vec<_> = std::iter::from_fn(|| sched.shared.queue.pop())
            .map(|job| job.sample_offset)
            .collect();
        assert_eq!(offsets, vec![0, 4_000, 10_000]);
    }

    #[test]
    fn render_reports_metadata_and_progress() {
        let mut sched = scheduler();
        let lead = track(&[(69, 0.0, 0.25), (72, 0.1, 0.3)]);
        sched
            .synthesize_track(&lead, Arc::new(PureTone::new(8_000)), 0.8, None)
            .unwrap();
        sched.start().unwrap();
        let events = sched.wait().unwrap();

        let progress: Vec<u8> = events
            .iter()
            .filter_map(|e| match e {
                RenderEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert_eq!(progress, vec![50, 100]);

        let rendered = events
            .into_iter()
            .find_map(RenderEvent::into_track)
            .expect("completed event");
        assert_eq!(rendered.title, "Lead");
        assert_eq!(rendered.effect_name, "None");
        assert_eq!(rendered.instrument_name, PureTone::new(8_000).name());
        assert_eq!(rendered.framerate, 8_000);
        assert_eq!(sched.state(), SchedulerState::Completed);
    }

    #[test]
    fn time_limit_stops_queueing() {
        let mut sched = TrackScheduler::new(
            RenderConfig::new()
                .with_sample_rate(8_000)
                .with_time_limit(1.0),
        );
        let queued = sched
            .synthesize_track(
                &track(&[(60, 0.0, 0.5), (62, 0.6, 0.9), (64, 0.95, 1.2), (65, 1.3, 1.4)]),
                Arc::new(PureTone::new(8_000)),
                1.0,
                None,
            )
            .unwrap();
        assert_eq!(queued, 2);
    }

    #[test]
    fn start_without_a_track_is_an_error() {
        let mut sched = scheduler();
        assert!(matches!(sched.start(), Err(SynthError::EmptyInput(_))));
    }

    #[test]
    fn multichannel_render_interleaves_the_mono_mix() {
        let lead = track(&[(69, 0.0, 0.5)]);
        let mono = scheduler()
            .render(&lead, Arc::new(PureTone::new(8_000)), 1.0, None)
            .unwrap()
            .expect("completed");
        let stereo = TrackScheduler::new(
            RenderConfig::new().with_sample_rate(8_000).with_channels(2),
        )
        .render(&lead, Arc::new(PureTone::new(8_000)), 1.0, None)
            .unwrap()
            .expect("completed");

        assert_eq!(stereo.channels, 2);
        assert_eq!(stereo.samples.len(), 2 * mono.samples.len());
        assert_eq!(stereo.frames(), mono.frames());
        assert!((stereo.duration_seconds() - mono.duration_seconds()).abs() < 1e-12);
        for (frame, &s) in stereo.samples.chunks_exact(2).zip(&mono.samples) {
            assert_eq!(frame, [s, s]);
        }
    }

    #[test]
    fn empty_track_completes_with_silence() {
        let mut sched = scheduler();
        let rendered = sched
            .render(&track(&[]), Arc::new(PureTone::new(8_000)), 1.0, None)
            .unwrap()
            .expect("completed");
        assert!(rendered.samples.is_empty());
    }
}
