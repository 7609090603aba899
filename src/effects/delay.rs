#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{seconds_to_samples, Effect};
use crate::dsp::delay::DelayLine;
use crate::error::{Result, SynthError};
use crate::params::{ParamValue, ParameterSet, Parameterized};

/*
Feedback Delay
==============

    y[n] = x[n] + feedback · y[n − D]        D = round(delay · sr)

Each pass through the loop is scaled by `feedback`, so an impulse comes back
as a train spaced D samples apart, shrinking geometrically:

    1 ─┐
       │        0.5 ─┐
       │             │       0.25 ─┐
    ───┴─────────────┴─────────────┴──── ...
       0             D             2D

The input is extended with silence long enough for the train to die away:

    tail = ceil(5 · delay · sr / (1 − 0.99 · feedback))

Higher feedback → longer tail. Feedback must stay below 1 or the loop never
decays.
*/

const TAIL_REPEATS: f64 = 5.0;
const MAX_FEEDBACK: f64 = 0.99;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FeedbackDelay {
    sample_rate: u32,
    /// Seconds between repeats.
    pub delay: f64,
    pub feedback: f64,
}

impl FeedbackDelay {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            delay: 0.18,
            feedback: 0.7,
        }
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay = seconds;
        self
    }

    pub fn with_feedback(mut self, feedback: f64) -> Self {
        self.feedback = feedback;
        self
    }

    pub fn tail_len(&self) -> usize {
        let samples = TAIL_REPEATS * self.delay.max(0.0) * self.sample_rate as f64
            / (1.0 - MAX_FEEDBACK * self.feedback);
        samples.ceil() as usize
    }

    fn validate(&self) -> Result<()> {
        if !self.delay.is_finite() || self.delay < 0.0 {
            return Err(SynthError::invalid("delay", format!("{} s", self.delay)));
        }
        if !(0.0..=MAX_FEEDBACK).contains(&self.feedback) {
            return Err(SynthError::invalid(
                "feedback",
                format!("{} outside [0, {MAX_FEEDBACK}]", self.feedback),
            ));
        }
        Ok(())
    }
}

impl Parameterized for FeedbackDelay {
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .number("delay", self.delay, 0.0, 1.0)
            .number("feedback", self.feedback, 0.0, MAX_FEEDBACK)
    }

    fn apply_parameter(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "delay" => self.delay = value.number(key)?,
            "feedback" => self.feedback = value.number(key)?,
            other => return Err(SynthError::UnknownParameter(other.to_string())),
        }
        Ok(())
    }
}

impl Effect for FeedbackDelay {
    fn name(&self) -> &str {
        "Delay Effect"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn process(&self, input: &[f32]) -> Result<Vec<f32>> {
        self.validate()?;
        let delay = seconds_to_samples(self.delay, self.sample_rate);
        if delay == 0 {
            return Ok(input.to_vec());
        }

        let len = input.len() + self.tail_len();
        let feedback = self.feedback as f32;
        let mut line = DelayLine::new(delay);
        let mut out = Vec::with_capacity(len);
        for n in 0..len {
            let x = input.get(n).copied().unwrap_or(0.0);
            let y = x + feedback * line.read(delay);
            line.write(y);
            out.push(y);
        }
        Ok(out)
    }
}
