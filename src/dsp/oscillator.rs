use std::f64::consts::TAU;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::SynthError;

/*
Waveforms
=========

All waveforms are evaluated from a phase measured in CYCLES (1.0 = one full
period) rather than radians, so the non-sine shapes reduce to simple
fractional-part arithmetic. Every shape is aligned with sine: it starts at 0,
peaks at a quarter cycle and bottoms out at three quarters.

  Sine       sin(2π p)                         fundamental only
  Square     +1 for the first half, -1 after   odd harmonics, 1/n
  Sawtooth   2·frac(p + 0.5) - 1               all harmonics, 1/n
  Triangle   4·|frac(p + 0.75) - 0.5| - 1      odd harmonics, 1/n²

Rendering is sample-accurate and stateless: sample i sits at t = i / sr and
phase = f·t. Offline rendering doesn't need a running phase accumulator, and
computing from t avoids drift on long notes.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Waveform {
    #[default]
    Sine,
    Square,
    Sawtooth,
    Triangle,
}

impl Waveform {
    pub const NAMES: &'static [&'static str] = &["sine", "square", "sawtooth", "triangle"];

    pub fn name(&self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Square => "square",
            Waveform::Sawtooth => "sawtooth",
            Waveform::Triangle => "triangle",
        }
    }

    /// Value at `phase` cycles, in [-1, 1].
    #[inline]
    pub fn at_phase(&self, phase: f64) -> f64 {
        let frac = phase - phase.floor();
        match self {
            Waveform::Sine => (TAU * phase).sin(),
            Waveform::Square => {
                if frac < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => {
                let shifted = frac + 0.5;
                2.0 * (shifted - shifted.floor()) - 1.0
            }
            Waveform::Triangle => {
                let shifted = frac + 0.75;
                4.0 * ((shifted - shifted.floor()) - 0.5).abs() - 1.0
            }
        }
    }

    /// Render `len` samples at `frequency_hz`.
    pub fn render(&self, frequency_hz: f64, len: usize, sample_rate: u32) -> Vec<f32> {
        let step = frequency_hz / sample_rate as f64;
        (0..len)
            .map(|i| self.at_phase(i as f64 * step) as f32)
            .collect()
    }
}

impl FromStr for Waveform {
    type Err = SynthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "sine" | "sin" => Ok(Waveform::Sine),
            "square" => Ok(Waveform::Square),
            "sawtooth" | "saw" => Ok(Waveform::Sawtooth),
            "triangle" | "tri" => Ok(Waveform::Triangle),
            other => Err(SynthError::invalid(
                "waveform",
                format!("unknown waveform `{other}`"),
            )),
        }
    }
}

/// `sin(2π f t + offset)` for a single instant.
#[inline]
pub fn sine_at(frequency_hz: f64, t: f64, offset: f64) -> f64 {
    (TAU * frequency_hz * t + offset).sin()
}
