use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use log::debug;

use super::{check_note, Instrument};
use crate::dsp::envelope::{sample_count, Adsr, Envelope};
use crate::dsp::psola::{resample_linear, shift_pitch};
use crate::error::{Result, SynthError};
use crate::io::wav::read_wav;
use crate::params::{ParamValue, ParameterSet, Parameterized};

/// Pitch-shifted playback of one recorded note.
///
/// Each requested frequency is produced by PSOLA-shifting the recording from
/// its root pitch. Shifted variants are cached per frequency behind a mutex,
/// so one instance can serve several render sessions at once. Notes longer
/// than the (shifted) recording loop its middle half with short crossfades.
pub struct SampleSynth {
    name: String,
    sample_rate: u32,
    source: Arc<Vec<f32>>,
    root_hz: f64,
    release: f64,
    output_gain: f32,
    cache: Mutex<HashMap<u64, Arc<Vec<f32>>>>,
}

const DEFAULT_OUTPUT_GAIN: f32 = 0.1;
const MAX_CROSSFADE: usize = 256;

impl SampleSynth {
    /// Wrap mono `samples` recorded at `source_rate`, resampling to
    /// `sample_rate` when they differ.
    pub fn from_samples(
        name: impl Into<String>,
        samples: Vec<f32>,
        source_rate: u32,
        root_hz: f64,
        sample_rate: u32,
    ) -> Result<Self> {
        if samples.is_empty() {
            return Err(SynthError::EmptyInput("sample recording"));
        }
        if !root_hz.is_finite() || root_hz <= 0.0 {
            return Err(SynthError::invalid("root_hz", "must be a positive frequency"));
        }
        let source = resample_linear(&samples, source_rate, sample_rate);
        Ok(Self {
            name: name.into(),
            sample_rate,
            source: Arc::new(source),
            root_hz,
            release: 0.05,
            output_gain: DEFAULT_OUTPUT_GAIN,
            cache: Mutex::new(HashMap::new()),
        })
    }

    /// Load a WAV recording (downmixed to mono) whose pitch is `root_hz`.
    pub fn from_wav(path: impl AsRef<Path>, root_hz: f64, sample_rate: u32) -> Result<Self> {
        let path = path.as_ref();
        let wav = read_wav(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "Sample".to_string());
        Self::from_samples(name, wav.mono(), wav.sample_rate, root_hz, sample_rate)
    }

    pub fn with_release(mut self, release: f64) -> Self {
        self.release = release.max(0.0);
        self
    }

    pub fn with_output_gain(mut self, gain: f32) -> Self {
        self.output_gain = gain;
        self
    }

    pub fn root_hz(&self) -> f64 {
        self.root_hz
    }

    /// Number of pitch-shifted variants currently cached.
    pub fn cached_variants(&self) -> usize {
        self.lock_cache().len()
    }

    pub fn clear_cache(&self) {
        self.lock_cache().clear();
    }

    fn lock_cache(&self) -> MutexGuard<'_, HashMap<u64, Arc<Vec<f32>>>> {
        // Entries are inserted whole, so a poisoned map is still usable.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn shifted(&self, frequency_hz: f64) -> Arc<Vec<f32>> {
        let key = frequency_hz.to_bits();
        if let Some(hit) = self.lock_cache().get(&key) {
            return Arc::clone(hit);
        }

        let ratio = frequency_hz / self.root_hz;
        debug!("{}: pitch-shifting by {ratio:.4}", self.name);
        let shifted = Arc::new(shift_pitch(&self.source, self.sample_rate, ratio));

        let mut cache = self.lock_cache();
        Arc::clone(cache.entry(key).or_insert(shifted))
    }
}

/// Fit `source` to exactly `len` samples, looping its middle half when it is
/// too short.
fn extend_looped(source: &[f32], len: usize) -> Vec<f32> {
    let mut out: Vec<f32> = source.iter().take(len).copied().collect();
    if out.len() >= len || source.len() < 8 {
        out.resize(len, 0.0);
        return out;
    }

    let segment = &source[source.len() / 4..source.len() * 3 / 4];
    let fade = (segment.len() / 8).clamp(1, MAX_CROSSFADE);
    while out.len() < len {
        let n = out.len();
        let fade = fade.min(n);
        for k in 0..fade {
            let w = (k + 1) as f32 / (fade + 1) as f32;
            let slot = &mut out[n - fade + k];
            *slot = *slot * (1.0 - w) + segment[k] * w;
        }
        out.extend_from_slice(&segment[fade..]);
    }
    out.truncate(len);
    out
}

impl Parameterized for SampleSynth {
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .number("release", self.release, 0.0, 5.0)
            .number("output_gain", self.output_gain as f64, 0.0, 1.0)
    }

    fn apply_parameter(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        match key {
            "release" => self.release = value.number(key)?,
            "output_gain" => self.output_gain = value.number(key)? as f32,
            other => return Err(SynthError::UnknownParameter(other.to_string())),
        }
        Ok(())
    }
}

impl Instrument for SampleSynth {
    fn name(&self) -> &str {
        &self.name
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn release_time(&self) -> f64 {
        self.release
    }

    fn generate(&self, frequency_hz: f64, amplitude: f32, duration: f64) -> Result<Vec<f32>> {
        check_note(frequency_hz, duration)?;
        let shifted = self.shifted(frequency_hz);
        let len = sample_count(duration + self.release, self.sample_rate);
        let mut out = extend_looped(&shifted, len);

        let envelope = Adsr::release_only(self.release);
        let step = 1.0 / self.sample_rate as f64;
        let scale = amplitude * self.output_gain;
        for (i, s) in out.iter_mut().enumerate() {
            *s *= scale * envelope.gain_at(i as f64 * step, duration) as f32;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::TAU;

    const SR: u32 = 8_000;

    fn recording() -> Vec<f32> {
        (0..4_000)
            .map(|i| (TAU * 200.0 * i as f32 / SR as f32).sin())
            .collect()
    }

    #[test]
    fn empty_recordings_are_rejected() {
        assert!(SampleSynth::from_samples("x", Vec::new(), SR, 200.0, SR).is_err());
    }

    #[test]
    fn variants_are_cached_per_frequency() {
        let synth = SampleSynth::from_samples("tone", recording(), SR, 200.0, SR).unwrap();
        let a = synth.generate(300.0, 1.0, 0.2).unwrap();
        let b = synth.generate(300.0, 1.0, 0.2).unwrap();
        synth.generate(250.0, 1.0, 0.2).unwrap();
        assert_eq!(a, b);
        assert_eq!(synth.cached_variants(), 2);
        synth.clear_cache();
        assert_eq!(synth.cached_variants(), 0);
    }

    #[test]
    fn long_notes_loop_the_recording() {
        let synth = SampleSynth::from_samples("tone", recording(), SR, 200.0, SR).unwrap();
        let out = synth.generate(200.0, 1.0, 2.0).unwrap();
        assert_eq!(out.len(), sample_count(2.05, SR));
        let tail = &out[12_000..14_000];
        assert!(tail.iter().any(|s| s.abs() > 0.01));
    }

    #[test]
    fn output_gain_is_applied() {
        let synth = SampleSynth::from_samples("tone", recording(), SR, 200.0, SR)
            .unwrap()
            .with_output_gain(0.5);
        let out = synth.generate(200.0, 1.0, 0.3).unwrap();
        assert!(out.iter().all(|s| s.abs() <= 0.5 + 1e-3));
    }

    #[test]
    fn extend_pads_tiny_sources_with_silence() {
        let out = extend_looped(&[1.0, 1.0], 5);
        assert_eq!(out, vec![1.0, 1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn shared_between_threads() {
        let synth =
            Arc::new(SampleSynth::from_samples("tone", recording(), SR, 200.0, SR).unwrap());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let synth = Arc::clone(&synth);
                std::thread::spawn(move || synth.generate(200.0 + 10.0 * i as f64, 1.0, 0.1))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap().is_ok());
        }
        assert_eq!(synth.cached_variants(), 4);
    }
}
