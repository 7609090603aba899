//! Effects transform a finished note (or any buffer) into a new buffer.
//!
//! `process` never mutates its input and never returns fewer samples than it
//! was given; most effects append a tail so echoes and reverb can ring out.

use crate::error::Result;
use crate::params::Parameterized;

pub mod chorus;
pub mod delay;
pub mod echo;
pub mod flanger;
pub mod passthrough;
pub mod reverb;

pub use chorus::{Chorus, ChorusVoice};
pub use delay::FeedbackDelay;
pub use echo::Echo;
pub use flanger::Flanger;
pub use passthrough::Passthrough;
pub use reverb::ConvolutionReverb;

pub trait Effect: Parameterized + Send + Sync {
    fn name(&self) -> &str;

    fn sample_rate(&self) -> u32;

    /// Output length is always `>= input.len()`.
    fn process(&self, input: &[f32]) -> Result<Vec<f32>>;
}

impl std::fmt::Debug for dyn Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("name", &self.name())
            .field("sample_rate", &self.sample_rate())
            .finish()
    }
}

pub const EFFECT_NAMES: &[&str] = &["none", "delay", "echo", "reverb", "flanger", "chorus"];

/// Build a default-configured effect from its short name.
pub fn effect_by_name(name: &str, sample_rate: u32) -> Option<Box<dyn Effect>> {
    let effect: Box<dyn Effect> = match name {
        "none" => Box::new(Passthrough::new(sample_rate)),
        "delay" => Box::new(FeedbackDelay::new(sample_rate)),
        "echo" => Box::new(Echo::new(sample_rate)),
        "reverb" => Box::new(ConvolutionReverb::new(sample_rate)),
        "flanger" => Box::new(Flanger::new(sample_rate)),
        "chorus" => Box::new(Chorus::new(sample_rate)),
        _ => return None,
    };
    Some(effect)
}

/// Waveforms accepted for the flanger and chorus sweep.
pub(crate) const LFO_SHAPES: &[&str] = &["sawtooth", "triangle", "sine"];

pub(crate) fn seconds_to_samples(seconds: f64, sample_rate: u32) -> usize {
    (seconds.max(0.0) * sample_rate as f64).round() as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_are_rejected() {
        assert!(effect_by_name("wah", 44_100).is_none());
    }

    #[test]
    fn no_effect_shrinks_its_input() {
        let sr = 8_000;
        for name in EFFECT_NAMES {
            let effect = effect_by_name(name, sr).expect(name);
            for len in [0usize, 1, 37, 4_000] {
                let input: Vec<f32> = (0..len).map(|i| ((i % 17) as f32 - 8.0) / 10.0).collect();
                let out = effect.process(&input).unwrap();
                assert!(out.len() >= len, "{name} shrank {len} to {}", out.len());
                assert!(out.iter().all(|s| s.is_finite()), "{name} produced NaN");
            }
        }
    }
}
