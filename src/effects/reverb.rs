use std::path::Path;

use log::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{seconds_to_samples, Effect};
use crate::dsp::convolve::{convolve, ConvolutionMethod, ConvolutionMode};
use crate::dsp::noise::{rng_from_seed, NoiseKind};
use crate::dsp::psola::resample_linear;
use crate::error::{Result, SynthError};
use crate::io::wav::read_wav;
use crate::params::{ParamValue, ParameterSet, Parameterized};

/*
Convolution Reverb
==================

A room's impulse response (IR) is what a microphone records after a single
click. Convolving dry audio with it places the room around the sound.

    wet = gain · convolve(dry, ir[t0 .. t1])

The IR can be cropped to a window [t0, t1] in seconds, e.g. to skip a
pre-delay or cut a long tail. The window must keep at least
MIN_IMPULSE_SAMPLES samples.

Without a recorded IR a synthetic one is used: a unit click followed by
Gaussian noise under an exponential decay that falls 60 dB over `decay`
seconds, scaled to unit energy.

    |
    |▌
    |▌▖▖
    |▌▌▌▖▖▖
    |▌▌▌▌▌▌▌▖▖▖▖▖▖▖▖▖▖__________
    └──────────────────────────── t
     0                    decay
*/

pub const MIN_IMPULSE_SAMPLES: usize = 32;

/// 60 dB expressed as a natural-log amplitude ratio.
const LN_1000: f64 = 6.907_755_278_982_137;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ConvolutionReverb {
    sample_rate: u32,
    impulse: Option<Vec<f32>>,
    pub gain: f64,
    pub crop_start: f64,
    /// End of the crop window in seconds. `None` keeps the whole tail.
    pub crop_end: Option<f64>,
    pub mode: ConvolutionMode,
    pub method: ConvolutionMethod,
    /// Synthetic IR: seconds to fall 60 dB.
    pub decay: f64,
    /// Synthetic IR: total length in seconds.
    pub length: f64,
    pub seed: u64,
}

impl ConvolutionReverb {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            impulse: None,
            gain: 0.5,
            crop_start: 0.0,
            crop_end: None,
            mode: ConvolutionMode::Full,
            method: ConvolutionMethod::Auto,
            decay: 1.2,
            length: 1.5,
            seed: 0x5eed,
        }
    }

    pub fn with_impulse_response(mut self, impulse: Vec<f32>) -> Self {
        self.impulse = Some(impulse);
        self
    }

    /// Load a recorded IR, downmixed and resampled to this reverb's rate.
    pub fn with_impulse_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let wav = read_wav(path.as_ref())?;
        let impulse = resample_linear(&wav.mono(), wav.sample_rate, self.sample_rate);
        if impulse.is_empty() {
            return Err(SynthError::EmptyInput("impulse response file"));
        }
        debug!(
            "loaded {} sample impulse response from {}",
            impulse.len(),
            path.as_ref().display()
        );
        Ok(self.with_impulse_response(impulse))
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_crop(mut self, start: f64, end: Option<f64>) -> Self {
        self.crop_start = start;
        self.crop_end = end;
        self
    }

    pub fn with_mode(mut self, mode: ConvolutionMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_method(mut self, method: ConvolutionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn with_decay(mut self, decay: f64) -> Self {
        self.decay = decay;
        self
    }

    /// The IR after cropping.
    pub fn impulse_response(&self) -> Result<Vec<f32>> {
        let full = match &self.impulse {
            Some(ir) => ir.clone(),
            None => self.synthetic_impulse(),
        };

        let start = seconds_to_samples(self.crop_start, self.sample_rate).min(full.len());
        let end = self
            .crop_end
            .map(|t| seconds_to_samples(t, self.sample_rate))
            .unwrap_or(full.len())
            .min(full.len());
        let remaining = end.saturating_sub(start);
        if remaining < MIN_IMPULSE_SAMPLES {
            return Err(SynthError::ImpulseResponseTooShort {
                remaining,
                minimum: MIN_IMPULSE_SAMPLES,
            });
        }
        Ok(full[start..end].to_vec())
    }

    fn synthetic_impulse(&self) -> Vec<f32> {
        let len = seconds_to_samples(self.length, self.sample_rate).max(1);
        let mut tail = vec![0.0f64; len];
        NoiseKind::Normal.fill(&mut rng_from_seed(Some(self.seed)), 1.0, &mut tail);
        tail[0] = 1.0;

        let rate = LN_1000 / self.decay.max(1e-3);
        let step = 1.0 / self.sample_rate as f64;
        for (i, s) in tail.iter_mut().enumerate() {
            *s *= (-rate * i as f64 * step).exp();
        }

        let energy = tail.iter().map(|s| s * s).sum::<f64>().sqrt();
        let scale = if energy > 0.0 { 1.0 / energy } else { 0.0 };
        tail.into_iter().map(|s| (s * scale) as f32).collect()
    }
}

impl Parameterized for ConvolutionReverb {
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .number("gain", self.gain, 0.0, 4.0)
            .number("crop_start", self.crop_start, 0.0, 30.0)
            .number("crop_end", self.crop_end.unwrap_or(0.0), 0.0, 30.0)
            .choice("mode", self.mode.name(), ConvolutionMode::NAMES)
            .choice("method", self.method.name(), ConvolutionMethod::NAMES)
            .number("decay", self.decay, 0.01, 20.0)
            .number("length", self.length, 0.01, 20.0)
    }

    fn apply_parameter(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "gain" => self.gain = value.number(key)?,
            "crop_start" => self.crop_start = value.number(key)?,
            // 0 keeps the whole tail
            "crop_end" => {
                let end = value.number(key)?;
                self.crop_end = (end > 0.0).then_some(end);
            }
            "mode" => {
                let name = value.text(key)?;
                self.mode = ConvolutionMode::from_name(name)
                    .ok_or_else(|| SynthError::invalid(key, format!("unknown mode `{name}`")))?;
            }
            "method" => {
                let name = value.text(key)?;
                self.method = ConvolutionMethod::from_name(name)
                    .ok_or_else(|| SynthError::invalid(key, format!("unknown method `{name}`")))?;
            }
            "decay" => self.decay = value.number(key)?,
            "length" => self.length = value.number(key)?,
            other => return Err(SynthError::UnknownParameter(other.to_string())),
        }
        Ok(())
    }
}

impl Effect for ConvolutionReverb {
    fn name(&self) -> &str {
        "Convolution Reverb"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn process(&self, input: &[f32]) -> Result<Vec<f32>> {
        let impulse = self.impulse_response()?;
        let mut out = convolve(input, &impulse, self.mode, self.method);
        let gain = self.gain as f32;
        for s in out.iter_mut() {
            *s *= gain;
        }
        // `same`/`valid` can come back shorter than the dry signal
        if out.len() < input.len() {
            out.resize(input.len(), 0.0);
        }
        Ok(out)
    }
}
