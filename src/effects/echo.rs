#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{seconds_to_samples, Effect};
use crate::error::{Result, SynthError};
use crate::params::{ParamValue, ParameterSet, Parameterized};

/// A fixed number of attenuated repeats.
///
/// Unlike [`FeedbackDelay`](super::FeedbackDelay) the tail is exactly
/// `repetitions · delay` long: repeat `k` is the input scaled by
/// `attenuation^k`, shifted by `k · delay`. `pre_delay` pads the front.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Echo {
    sample_rate: u32,
    pub delay: f64,
    pub attenuation: f64,
    pub repetitions: u32,
    pub pre_delay: f64,
}

impl Echo {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            delay: 0.25,
            attenuation: 0.5,
            repetitions: 4,
            pre_delay: 0.0,
        }
    }

    pub fn with_delay(mut self, seconds: f64) -> Self {
        self.delay = seconds;
        self
    }

    pub fn with_attenuation(mut self, attenuation: f64) -> Self {
        self.attenuation = attenuation;
        self
    }

    pub fn with_repetitions(mut self, repetitions: u32) -> Self {
        self.repetitions = repetitions;
        self
    }

    pub fn with_pre_delay(mut self, seconds: f64) -> Self {
        self.pre_delay = seconds;
        self
    }
}

impl Parameterized for Echo {
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .number("delay", self.delay, 0.0, 2.0)
            .number("attenuation", self.attenuation, 0.0, 1.0)
            .number("repetitions", self.repetitions as f64, 0.0, 32.0)
            .number("pre_delay", self.pre_delay, 0.0, 2.0)
    }

    fn apply_parameter(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "delay" => self.delay = value.number(key)?,
            "attenuation" => self.attenuation = value.number(key)?,
            "repetitions" => self.repetitions = value.number(key)?.round() as u32,
            "pre_delay" => self.pre_delay = value.number(key)?,
            other => return Err(SynthError::UnknownParameter(other.to_string())),
        }
        Ok(())
    }
}

impl Effect for Echo {
    fn name(&self) -> &str {
        "Echo"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn process(&self, input: &[f32]) -> Result<Vec<f32>> {
        if !(0.0..=1.0).contains(&self.attenuation) {
            return Err(SynthError::invalid(
                "attenuation",
                format!("{} outside [0, 1]", self.attenuation),
            ));
        }
        let front = seconds_to_samples(self.pre_delay, self.sample_rate);
        let spacing = seconds_to_samples(self.delay, self.sample_rate);
        let repeats = self.repetitions as usize;

        let mut out = vec![0.0f32; front + input.len() + repeats * spacing];
        let mut gain = 1.0f32;
        for k in 0..=repeats {
            let start = front + k * spacing;
            for (slot, &x) in out[start..start + input.len()].iter_mut().zip(input) {
                *slot += gain * x;
            }
            gain *= self.attenuation as f32;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeats_stop_after_the_configured_count() {
        let echo = Echo::new(100)
            .with_delay(0.1)
            .with_attenuation(0.5)
            .with_repetitions(3);
        let out = echo.process(&[1.0]).unwrap();
        assert_eq!(out.len(), 1 + 30);
        assert_eq!(out[0], 1.0);
        assert_eq!(out[10], 0.5);
        assert_eq!(out[20], 0.25);
        assert_eq!(out[30], 0.125);
        assert_eq!(out.iter().filter(|&&s| s != 0.0).count(), 4);
    }

    #[test]
    fn pre_delay_pads_the_front() {
        let echo = Echo::new(100).with_pre_delay(0.05).with_repetitions(0);
        let out = echo.process(&[0.7, 0.3]).unwrap();
        assert_eq!(out, vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.7, 0.3]);
    }

    #[test]
    fn overlapping_repeats_add() {
        let echo = Echo::new(10)
            .with_delay(0.1)
            .with_attenuation(1.0)
            .with_repetitions(1);
        let out = echo.process(&[1.0, 1.0]).unwrap();
        assert_eq!(out, vec![1.0, 2.0, 1.0]);
    }
}
