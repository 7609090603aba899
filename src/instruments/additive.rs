use std::f64::consts::TAU;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{check_note, render_shaped, Instrument};
use crate::dsp::envelope::{Adsr, Envelope};
use crate::dsp::oscillator::Waveform;
use crate::error::{Result, SynthError};
use crate::params::{ParamValue, ParameterSet, Parameterized};

/*
Pure Tone and Additive Synthesis
================================

The pure tone is one waveform times an ADSR:

    out(t) = amplitude · wave(f·t) · env(t)

The additive variant replaces the single waveform with a fixed table of
partials measured from a plucked guitar string at C3 (130.66 Hz). The table
is transposed to the requested note by scaling every partial by
f / 130.66, so the timbre is kept while the pitch follows the note:

    out(t) = amplitude · env(t) · Σ a_i · sin(2π · p_i · (f / f_ref) · t)

Partial amplitudes are kept as measured (they sum to ~0.51); the ADSR peak
`k` gives the pluck its initial overshoot.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct PureTone {
    sample_rate: u32,
    pub waveform: Waveform,
    pub envelope: Adsr,
}

impl PureTone {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            waveform: Waveform::Sine,
            envelope: Adsr::new(2.0, 0.03, 0.1, 0.6),
        }
    }

    pub fn with_waveform(mut self, waveform: Waveform) -> Self {
        self.waveform = waveform;
        self
    }

    pub fn with_envelope(mut self, envelope: Adsr) -> Self {
        self.envelope = envelope;
        self
    }
}

impl Parameterized for PureTone {
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .choice("waveform", self.waveform.name(), Waveform::NAMES)
            .number("peak", self.envelope.peak, 1.0, 10.0)
            .number("attack", self.envelope.attack, 0.0, 0.5)
            .number("decay", self.envelope.decay, 0.0, 0.5)
            .number("release", self.envelope.release, 0.0, 5.0)
    }

    fn apply_parameter(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "waveform" => self.waveform = value.text(key)?.parse()?,
            "peak" => self.envelope.peak = value.number(key)?,
            "attack" => self.envelope.attack = value.number(key)?,
            "decay" => self.envelope.decay = value.number(key)?,
            "release" => self.envelope.release = value.number(key)?,
            other => return Err(SynthError::UnknownParameter(other.to_string())),
        }
        Ok(())
    }
}

impl Instrument for PureTone {
    fn name(&self) -> &str {
        "Pure Tone"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn release_time(&self) -> f64 {
        self.envelope.release_time()
    }

    fn generate(&self, frequency_hz: f64, amplitude: f32, duration: f64) -> Result<Vec<f32>> {
        check_note(frequency_hz, duration)?;
        self.envelope.validate()?;
        let waveform = self.waveform;
        Ok(render_shaped(
            &self.envelope,
            duration,
            self.sample_rate,
            amplitude,
            |t| waveform.at_phase(frequency_hz * t),
        ))
    }
}

/// Measured guitar partials as (frequency Hz, amplitude), reference C3.
pub const GUITAR_PARTIALS: [(f64, f64); 7] = [
    (130.66, 0.1811),
    (261.09, 0.1278),
    (783.73, 0.0695),
    (391.75, 0.0648),
    (914.39, 0.0272),
    (1045.27, 0.0211),
    (522.41, 0.0180),
];

pub const GUITAR_REFERENCE_HZ: f64 = 130.66;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct AdditiveGuitar {
    sample_rate: u32,
    pub partials: Vec<(f64, f64)>,
    pub reference_hz: f64,
    pub envelope: Adsr,
}

impl AdditiveGuitar {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            partials: GUITAR_PARTIALS.to_vec(),
            reference_hz: GUITAR_REFERENCE_HZ,
            envelope: Adsr::new(2.0, 0.01, 0.05, 2.0),
        }
    }

    /// Replace the partial table. Frequencies are relative to `reference_hz`.
    pub fn with_partials(mut self, partials: Vec<(f64, f64)>, reference_hz: f64) -> Self {
        self.partials = partials;
        self.reference_hz = reference_hz;
        self
    }
}

impl Parameterized for AdditiveGuitar {
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .number("peak", self.envelope.peak, 1.0, 10.0)
            .number("release", self.envelope.release, 0.0, 5.0)
    }

    fn apply_parameter(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "peak" => self.envelope.peak = value.number(key)?,
            "release" => self.envelope.release = value.number(key)?,
            other => return Err(SynthError::UnknownParameter(other.to_string())),
        }
        Ok(())
    }
}

impl Instrument for AdditiveGuitar {
    fn name(&self) -> &str {
        "Additive Guitar"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn release_time(&self) -> f64 {
        self.envelope.release_time()
    }

    fn generate(&self, frequency_hz: f64, amplitude: f32, duration: f64) -> Result<Vec<f32>> {
        check_note(frequency_hz, duration)?;
        self.envelope.validate()?;
        if self.reference_hz <= 0.0 {
            return Err(SynthError::invalid("reference_hz", "must be positive"));
        }
        let scale = frequency_hz / self.reference_hz;
        let omegas: Vec<(f64, f64)> = self
            .partials
            .iter()
            .map(|&(f, a)| (TAU * f * scale, a))
            .collect();

        Ok(render_shaped(
            &self.envelope,
            duration,
            self.sample_rate,
            amplitude,
            |t| omegas.iter().map(|&(w, a)| a * (w * t).sin()).sum(),
        ))
    }
}
