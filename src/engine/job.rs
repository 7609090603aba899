use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::effects::Effect;
use crate::error::{Result, SynthError};
use crate::instruments::Instrument;
use crate::sequencing::Note;

/// One note waiting to be rendered.
#[derive(Debug, Clone)]
pub struct SynthJob {
    /// Position in the session, from 0.
    pub index: usize,
    /// Where the rendered note lands in the mix buffer.
    pub sample_offset: usize,
    pub note: Note,
    /// Resolved from `note.pitch` when the job was queued.
    pub frequency_hz: f64,
    pub amplitude: f32,
    pub instrument: Arc<dyn Instrument>,
    pub effect: Option<Arc<dyn Effect>>,
}

impl SynthJob {
    /// Generate the note and run it through the effect, if any.
    ///
    /// A panic inside the instrument or effect is caught and returned as
    /// [`SynthError::JobPanicked`], so one bad note cannot take down the
    /// worker.
    pub fn run(&self) -> Result<Vec<f32>> {
        panic::catch_unwind(AssertUnwindSafe(|| self.render()))
            .unwrap_or_else(|payload| Err(SynthError::JobPanicked(panic_message(&*payload))))
    }

    fn render(&self) -> Result<Vec<f32>> {
        let wave = self
            .instrument
            .generate(self.frequency_hz, self.amplitude, self.note.duration)?;
        match &self.effect {
            Some(effect) => effect.process(&wave),
            None => Ok(wave),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Mutex-guarded FIFO of pending jobs.
#[derive(Debug, Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<SynthJob>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<SynthJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn push(&self, job: SynthJob) {
        self.lock().push_back(job);
    }

    pub fn extend(&self, jobs: impl IntoIterator<Item = SynthJob>) {
        self.lock().extend(jobs);
    }

    pub fn pop(&self) -> Option<SynthJob> {
        self.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drop every pending job. Returns how many were dropped.
    pub fn clear(&self) -> usize {
        let mut jobs = self.lock();
        let dropped = jobs.len();
        jobs.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::Echo;
    use crate::instruments::PureTone;

    fn job(index: usize, effect: Option<Arc<dyn Effect>>) -> SynthJob {
        SynthJob {
            index,
            sample_offset: index * 100,
            note: Note::new(69, 127, 0.0, 0.1).unwrap(),
            frequency_hz: 440.0,
            amplitude: 0.5,
            instrument: Arc::new(PureTone::new(8_000)),
            effect,
        }
    }

    #[test]
    fn queue_is_fifo() {
        let queue = JobQueue::new();
        queue.extend((0..3).map(|i| job(i, None)));
        assert_eq!(queue.len(), 3);
        assert_eq!(queue.pop().map(|j| j.index), Some(0));
        assert_eq!(queue.pop().map(|j| j.index), Some(1));
        assert_eq!(queue.clear(), 1);
        assert!(queue.pop().is_none());
    }

    #[test]
    fn effect_is_applied_after_generate() {
        let dry = job(0, None).run().unwrap();
        let echo: Arc<dyn Effect> = Arc::new(Echo::new(8_000));
        let wet = job(0, Some(echo.clone())).run().unwrap();
        assert_eq!(wet, echo.process(&dry).unwrap());
        assert!(wet.len() > dry.len());
    }
}
