//! Instruments turn one note (frequency, amplitude, duration) into one
//! waveform.
//!
//! Every variant shares the same fixed signature. MIDI pitches are mapped to
//! frequencies before they reach an instrument (see
//! [`crate::io::converter::PitchTable`]), so implementations only ever see
//! Hertz.

use crate::dsp::envelope::{sample_count, Envelope};
use crate::error::{Result, SynthError};
use crate::params::Parameterized;

pub mod additive;
pub mod fm;
pub mod karplus;
pub mod sample;

pub use additive::{AdditiveGuitar, PureTone};
pub use fm::{DfmSynth, DfmVoice, FmSynth};
pub use karplus::KarplusStrong;
pub use sample::SampleSynth;

/// A note renderer.
///
/// `generate` must return exactly
/// `round((clamped_duration + release_time) * sample_rate)` samples, where
/// `clamped_duration` is `duration` raised to the envelope's attack + decay
/// when shorter. Implementations are immutable during rendering; anything
/// cached across calls sits behind a lock so one instance can be shared by
/// several workers.
pub trait Instrument: Parameterized + Send + Sync {
    fn name(&self) -> &str;

    fn sample_rate(&self) -> u32;

    /// Seconds of tail rendered after note-off.
    fn release_time(&self) -> f64;

    /// Render one note. `amplitude` is expected in [0, 1].
    fn generate(&self, frequency_hz: f64, amplitude: f32, duration: f64) -> Result<Vec<f32>>;
}

impl std::fmt::Debug for dyn Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrument")
            .field("name", &self.name())
            .field("sample_rate", &self.sample_rate())
            .finish()
    }
}

pub const INSTRUMENT_NAMES: &[&str] = &[
    "pure-tone",
    "additive-guitar",
    "fm-clarinet",
    "dfm-sax",
    "karplus-strong",
];

/// Build a default-configured instrument from its short name.
pub fn instrument_by_name(name: &str, sample_rate: u32) -> Option<Box<dyn Instrument>> {
    let instrument: Box<dyn Instrument> = match name {
        "pure-tone" => Box::new(PureTone::new(sample_rate)),
        "additive-guitar" => Box::new(AdditiveGuitar::new(sample_rate)),
        "fm-clarinet" => Box::new(FmSynth::new(sample_rate)),
        "dfm-sax" => Box::new(DfmSynth::new(sample_rate)),
        "karplus-strong" => Box::new(KarplusStrong::new(sample_rate)),
        _ => return None,
    };
    Some(instrument)
}

pub(crate) fn check_note(frequency_hz: f64, duration: f64) -> Result<()> {
    if !frequency_hz.is_finite() || frequency_hz <= 0.0 {
        return Err(SynthError::invalid(
            "frequency",
            format!("{frequency_hz} Hz is not a positive frequency"),
        ));
    }
    if !duration.is_finite() || duration < 0.0 {
        return Err(SynthError::invalid(
            "duration",
            format!("{duration} s is not a valid note length"),
        ));
    }
    Ok(())
}

/// Evaluate `voice(t)` across the envelope's full lifetime and shape it.
pub(crate) fn render_shaped<E, F>(
    envelope: &E,
    duration: f64,
    sample_rate: u32,
    amplitude: f32,
    mut voice: F,
) -> Vec<f32>
where
    E: Envelope + ?Sized,
    F: FnMut(f64) -> f64,
{
    let duration = envelope.effective_duration(duration);
    let len = sample_count(duration + envelope.release_time(), sample_rate);
    let step = 1.0 / sample_rate as f64;
    let amplitude = amplitude as f64;
    (0..len)
        .map(|i| {
            let t = i as f64 * step;
            (amplitude * voice(t) * envelope.gain_at(t, duration)) as f32
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_named_instrument_builds() {
        for name in INSTRUMENT_NAMES {
            let inst = instrument_by_name(name, 8_000).expect(name);
            assert_eq!(inst.sample_rate(), 8_000);
            assert!(!inst.parameters().is_empty(), "{name} exposes no parameters");
        }
        assert!(instrument_by_name("theremin", 8_000).is_none());
    }

    #[test]
    fn output_length_matches_contract() {
        let sr = 8_000;
        for name in INSTRUMENT_NAMES {
            let inst = instrument_by_name(name, sr).expect(name);
            let duration = 0.5;
            let out = inst.generate(220.0, 0.5, duration).unwrap();
            let expected = sample_count(duration + inst.release_time(), sr);
            assert_eq!(out.len(), expected, "{name}");
        }
    }

    #[test]
    fn bad_notes_are_rejected() {
        let inst = PureTone::new(8_000);
        assert!(inst.generate(0.0, 0.5, 1.0).is_err());
        assert!(inst.generate(440.0, 0.5, f64::NAN).is_err());
        assert!(inst.generate(440.0, 0.5, -1.0).is_err());
    }
}
