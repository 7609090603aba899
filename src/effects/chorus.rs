#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{Effect, LFO_SHAPES};
use crate::dsp::delay::DelayLine;
use crate::dsp::lfo::Lfo;
use crate::dsp::oscillator::Waveform;
use crate::error::{Result, SynthError};
use crate::params::{ParamValue, ParameterSet, Parameterized};

/*
Chorus Effect
=============

Chorus thickens a sound by mixing the dry signal with several slightly
delayed, pitch-modulated copies. Each copy drifts on its own LFO, so the
result sounds like a few players doubling the same part.

    wet[n] = Σ_v gain_v · x[n − (base + depth_v · unipolar(lfo_v(n / sr)))]
    out[n] = (1 − mix) · x[n] + mix · wet[n]

Voices start a fraction of a cycle apart so they never sweep in lockstep.
All voices share one LFO shape, a rising sawtooth unless changed.

Parameters
----------

Base delay (~20ms):
  Centre of every voice's sweep. Too short: comb filtering. Too long:
  slapback echo.

Per voice:
  rate   LFO speed in Hz. Classic chorus: 0.5-1.5 Hz
  depth  sweep width in seconds above the base. Subtle: 1-2 ms
  gain   weight of this copy in the wet sum

Mix (0.0 - 1.0):
  Dry/wet blend. 0.3-0.5 is typical.

Shape:
  sawtooth, triangle or sine.
*/

pub const MAX_VOICES: usize = 4;

const VOICE_KEYS: [[&str; 3]; MAX_VOICES] = [
    ["v1_rate", "v1_depth", "v1_gain"],
    ["v2_rate", "v2_depth", "v2_gain"],
    ["v3_rate", "v3_depth", "v3_gain"],
    ["v4_rate", "v4_depth", "v4_gain"],
];

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChorusVoice {
    pub rate_hz: f64,
    /// Seconds.
    pub depth: f64,
    pub gain: f64,
}

impl ChorusVoice {
    pub const fn new(rate_hz: f64, depth: f64, gain: f64) -> Self {
        Self {
            rate_hz,
            depth,
            gain,
        }
    }
}

const DEFAULT_VOICES: [ChorusVoice; 3] = [
    ChorusVoice::new(0.8, 0.002, 0.5),
    ChorusVoice::new(1.1, 0.0025, 0.35),
    ChorusVoice::new(1.7, 0.003, 0.25),
];

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Chorus {
    sample_rate: u32,
    voices: Vec<ChorusVoice>,
    pub base_delay: f64,
    pub mix: f64,
    pub shape: Waveform,
}

impl Chorus {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            voices: DEFAULT_VOICES.to_vec(),
            base_delay: 0.02,
            mix: 0.4,
            shape: Waveform::Sawtooth,
        }
    }

    /// Replace the voice list. Only the first [`MAX_VOICES`] are kept.
    pub fn with_voices(mut self, voices: impl IntoIterator<Item = ChorusVoice>) -> Self {
        self.voices = voices.into_iter().take(MAX_VOICES).collect();
        self
    }

    pub fn with_base_delay(mut self, seconds: f64) -> Self {
        self.base_delay = seconds.clamp(0.005, 0.05);
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

    pub fn voices(&self) -> &[ChorusVoice] {
        &self.voices
    }

    fn max_delay_samples(&self) -> usize {
        let depth = self.voices.iter().map(|v| v.depth).fold(0.0, f64::max);
        ((self.base_delay + depth).max(0.0) * self.sample_rate as f64).ceil() as usize
    }
}

impl Parameterized for Chorus {
    fn parameters(&self) -> ParameterSet {
        let mut set = ParameterSet::new()
            .number("base_delay", self.base_delay, 0.005, 0.05)
            .number("mix", self.mix, 0.0, 1.0)
            .choice("shape", self.shape.name(), LFO_SHAPES);
        for (voice, [rate, depth, gain]) in self.voices.iter().zip(VOICE_KEYS) {
            set = set
                .number(rate, voice.rate_hz, 0.05, 10.0)
                .number(depth, voice.depth, 0.0, 0.01)
                .number(gain, voice.gain, 0.0, 1.0);
        }
        set
    }

    fn apply_parameter(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "base_delay" => self.base_delay = value.number(key)?,
            "mix" => self.mix = value.number(key)?,
            "shape" => self.shape = value.text(key)?.parse()?,
            _ => {
                let slot = self
                    .voices
                    .iter_mut()
                    .zip(VOICE_KEYS)
                    .find_map(|(voice, keys)| {
                        keys.iter().position(|k| *k == key).map(|field| (voice, field))
                    });
                let Some((voice, field)) = slot else {
                    return Err(SynthError::UnknownParameter(key.to_string()));
                };
                let v = value.number(key)?;
                match field {
                    0 => voice.rate_hz = v,
                    1 => voice.depth = v,
                    _ => voice.gain = v,
                }
            }
        }
        Ok(())
    }
}

impl Effect for Chorus {
    fn name(&self) -> &str {
        "Chorus"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn process(&self, input: &[f32]) -> Result<Vec<f32>> {
        if self.voices.is_empty() {
            return Ok(input.to_vec());
        }
        let sr = self.sample_rate as f64;
        let max_delay = self.max_delay_samples();
        let count = self.voices.len() as f64;
        let lfos: Vec<(Lfo, &ChorusVoice)> = self
            .voices
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let lfo = Lfo::new(self.shape, v.rate_hz).with_phase(i as f64 / count);
                (lfo, v)
            })
            .collect();
        let mix = self.mix.clamp(0.0, 1.0) as f32;

        let len = input.len() + max_delay;
        let mut line = DelayLine::new(max_delay + 1);
        let mut out = Vec::with_capacity(len);
        for n in 0..len {
            let dry = input.get(n).copied().unwrap_or(0.0);
            line.write(dry);

            let t = n as f64 / sr;
            let mut wet = 0.0f32;
            for (lfo, voice) in &lfos {
                let delay =
                    (lfo.delay_at(t, self.base_delay, voice.depth) * sr).clamp(0.0, max_delay as f64);
                wet += voice.gain as f32 * line.read_interpolated(delay as f32 + 1.0);
            }
            out.push(dry * (1.0 - mix) + wet * mix);
        }
        Ok(out)
    }
}
