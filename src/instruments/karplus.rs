use rand::Rng;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{check_note, Instrument};
use crate::dsp::envelope::{sample_count, Adsr, Envelope};
use crate::dsp::noise::{rng_from_seed, NoiseKind};
use crate::error::{Result, SynthError};
use crate::params::{ParamValue, ParameterSet, Parameterized};

/*
Karplus-Strong Plucked String
=============================

A burst of noise circulates through a short wavetable whose length sets the
pitch. Each pass nudges cells toward their neighbour, a crude low-pass
filter, so high harmonics die first and the burst settles into a decaying,
pitched tone.

    wavetable length  L = round(sr / f − 1 / (2·S))
    per output step:
        with probability 1 − 1/S:   table[i] = (table[i] + prev) / 2
        out = table[i];  prev = out;  i = (i + 1) mod L

S is the stretch factor. The initial table is noise (Gaussian, uniform or
two-level) with its mean removed so the string doesn't ring around a DC
offset. A short release-only envelope fades the tail after note-off.

Given a seed, output is reproducible bit for bit.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct KarplusStrong {
    sample_rate: u32,
    pub stretch: f64,
    pub noise: NoiseKind,
    pub release: f64,
    pub seed: Option<u64>,
}

impl KarplusStrong {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            stretch: 2.1,
            noise: NoiseKind::Normal,
            release: 0.05,
            seed: None,
        }
    }

    pub fn with_stretch(mut self, stretch: f64) -> Self {
        self.stretch = stretch;
        self
    }

    pub fn with_noise(mut self, noise: NoiseKind) -> Self {
        self.noise = noise;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn wavetable_len(&self, frequency_hz: f64) -> usize {
        let len = self.sample_rate as f64 / frequency_hz - 1.0 / (2.0 * self.stretch);
        (len.round() as usize).max(2)
    }

    fn pluck<R: Rng>(&self, rng: &mut R, amplitude: f64, size: usize) -> Vec<f64> {
        let mut table = vec![0.0; size];
        self.noise.fill(rng, amplitude, &mut table);
        let mean = table.iter().sum::<f64>() / size as f64;
        for cell in table.iter_mut() {
            *cell -= mean;
        }
        table
    }
}

impl Parameterized for KarplusStrong {
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .number("stretch", self.stretch, 1.0, 3000.0)
            .choice("noise", self.noise.name(), NoiseKind::NAMES)
            .number("release", self.release, 0.0, 2.0)
    }

    fn apply_parameter(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "stretch" => self.stretch = value.number(key)?,
            "noise" => {
                let name = value.text(key)?;
                self.noise = NoiseKind::from_name(name)
                    .ok_or_else(|| SynthError::invalid(key, format!("unknown noise `{name}`")))?;
            }
            "release" => self.release = value.number(key)?,
            other => return Err(SynthError::UnknownParameter(other.to_string())),
        }
        Ok(())
    }
}

impl Instrument for KarplusStrong {
    fn name(&self) -> &str {
        "Karplus-Strong Guitar"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn release_time(&self) -> f64 {
        self.release
    }

    fn generate(&self, frequency_hz: f64, amplitude: f32, duration: f64) -> Result<Vec<f32>> {
        check_note(frequency_hz, duration)?;
        if !self.stretch.is_finite() || self.stretch < 1.0 {
            return Err(SynthError::invalid(
                "stretch",
                format!("{} must be at least 1", self.stretch),
            ));
        }

        let mut rng = rng_from_seed(self.seed);
        let size = self.wavetable_len(frequency_hz);
        let mut table = self.pluck(&mut rng, amplitude as f64, size);

        let envelope = Adsr::release_only(self.release);
        let len = sample_count(duration + self.release, self.sample_rate);
        let average_probability = 1.0 - 1.0 / self.stretch;
        let step = 1.0 / self.sample_rate as f64;

        let mut out = Vec::with_capacity(len);
        let mut prev = 0.0;
        let mut cursor = 0;
        for i in 0..len {
            if rng.gen_bool(average_probability) {
                table[cursor] = 0.5 * (table[cursor] + prev);
            }
            prev = table[cursor];
            let gain = envelope.gain_at(i as f64 * step, duration);
            out.push((prev * gain) as f32);
            cursor = (cursor + 1) % size;
        }
        Ok(out)
    }
}
