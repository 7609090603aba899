#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{Effect, LFO_SHAPES};
use crate::dsp::delay::DelayLine;
use crate::dsp::lfo::Lfo;
use crate::dsp::oscillator::Waveform;
use crate::error::{Result, SynthError};
use crate::params::{ParamValue, ParameterSet, Parameterized};

/*
Flanger
=======

Mixes the signal with a copy of itself read back through a very short delay
(about 1-10 ms) that an LFO keeps sweeping. The comb-filter notches this
creates slide up and down the spectrum, the classic "jet" sound.

    delay[n] = base + depth · unipolar(lfo(n / sr))      (seconds)
    out[n]   = (1 − mix) · x[n] + mix · x[n − delay[n]]

The read offset is fractional, so the delayed copy is linearly
interpolated. Offsets are clamped to the delay line's length; reads from
before the first sample are silent.

Parameters
----------

Rate (0.05 - 5 Hz):
  Sweep speed. 0.1-0.5 Hz for slow jets.

Base delay (0 - 20 ms):
  Shortest delay in the sweep.

Depth (0 - 20 ms):
  Sweep width above the base.

Shape:
  sawtooth (one-way sweep), triangle (there and back) or sine.

The output is longer than the input by the deepest delay, so the wet copy
of the last input sample is not cut off.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Flanger {
    sample_rate: u32,
    pub rate_hz: f64,
    pub base_delay: f64,
    pub depth: f64,
    pub mix: f64,
    pub shape: Waveform,
}

impl Flanger {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            rate_hz: 0.25,
            base_delay: 0.001,
            depth: 0.004,
            mix: 0.5,
            shape: Waveform::Sawtooth,
        }
    }

    pub fn with_rate(mut self, rate_hz: f64) -> Self {
        self.rate_hz = rate_hz;
        self
    }

    pub fn with_base_delay(mut self, seconds: f64) -> Self {
        self.base_delay = seconds;
        self
    }

    pub fn with_depth(mut self, seconds: f64) -> Self {
        self.depth = seconds;
        self
    }

    pub fn with_mix(mut self, mix: f64) -> Self {
        self.mix = mix.clamp(0.0, 1.0);
        self
    }

    pub fn with_shape(mut self, shape: Waveform) -> Self {
        self.shape = shape;
        self
    }

    fn max_delay_samples(&self) -> usize {
        ((self.base_delay + self.depth).max(0.0) * self.sample_rate as f64).ceil() as usize
    }
}

impl Parameterized for Flanger {
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .number("rate", self.rate_hz, 0.05, 5.0)
            .number("base_delay", self.base_delay, 0.0, 0.02)
            .number("depth", self.depth, 0.0, 0.02)
            .number("mix", self.mix, 0.0, 1.0)
            .choice("shape", self.shape.name(), LFO_SHAPES)
    }

    fn apply_parameter(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "rate" => self.rate_hz = value.number(key)?,
            "base_delay" => self.base_delay = value.number(key)?,
            "depth" => self.depth = value.number(key)?,
            "mix" => self.mix = value.number(key)?,
            "shape" => self.shape = value.text(key)?.parse()?,
            other => return Err(SynthError::UnknownParameter(other.to_string())),
        }
        Ok(())
    }
}

impl Effect for Flanger {
    fn name(&self) -> &str {
        "Flanger"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn process(&self, input: &[f32]) -> Result<Vec<f32>> {
        if self.base_delay < 0.0 || self.depth < 0.0 {
            return Err(SynthError::invalid(
                "depth",
                "delays must not be negative".to_string(),
            ));
        }
        let sr = self.sample_rate as f64;
        let max_delay = self.max_delay_samples();
        let lfo = Lfo::new(self.shape, self.rate_hz);
        let mix = self.mix.clamp(0.0, 1.0) as f32;

        let len = input.len() + max_delay;
        let mut line = DelayLine::new(max_delay + 1);
        let mut out = Vec::with_capacity(len);
        for n in 0..len {
            let dry = input.get(n).copied().unwrap_or(0.0);
            line.write(dry);

            let t = n as f64 / sr;
            let delay =
                (lfo.delay_at(t, self.base_delay, self.depth) * sr).clamp(0.0, max_delay as f64);
            // read(1) is the sample just written
            let wet = line.read_interpolated(delay as f32 + 1.0);
            out.push(dry * (1.0 - mix) + wet * mix);
        }
        Ok(out)
    }
}
