use std::f64::consts::{FRAC_PI_2, TAU};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::{check_note, render_shaped, Instrument};
use crate::dsp::envelope::{Envelope, WoodwindEnvelope};
use crate::error::{Result, SynthError};
use crate::params::{ParamValue, ParameterSet, Parameterized};

/*
Frequency Modulation
====================

Single FM (clarinet-style)
--------------------------

    fc   = N1 · f0                 carrier
    fm   = N2 · f0 + offset        modulator (offset detunes in Hz)

    out(t) = A(t) · sin(2π fc t − π/2 + I(t) · sin(2π fm t − π/2))

The −π/2 phase offsets start both sines at their trough, giving a
cosine-like onset. The modulation index I(t) follows its own woodwind
envelope scaled to span the gap between I1 and I2:

    span   = |I1 − I2| · k1
    env(t) = span · woodwind(peak = 1/k1, two-segment attack k2d, sustain → s1)
    I(t)   = I1 − env(t)   if I1 > I2
             I1 + env(t)   otherwise

At the top of the attack env = |I1 − I2|, so I(t) touches I2 exactly; during
the sustain it settles at k1 of the way there. A(t) is a woodwind amplitude
envelope with peak 1/k2 and a quadratic attack.


Double FM (sax-style)
---------------------

Each voice has two modulators folded into one sine:

    voice_i(t) = sin(I_i1 · sin(2π N_i1 f0 t) + I_i2 · sin(2π N_i2 f0 t))

Two or three voices are mixed with weights normalized by the Euclidean norm
of the weight vector, so the mix energy stays comparable as weights change:

    dfm(t) = Σ (w_i / ‖w‖) · voice_i(t)

An optional pure-FM voice can be blended in with `blend` ∈ [0, 1]:

    out(t) = A(t) · ((1 − blend) · dfm(t) + blend · fm(t))

`blend` = 0 disables the FM voice entirely.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct FmSynth {
    sample_rate: u32,
    /// Modulation index at rest.
    pub index_start: f64,
    /// Modulation index reached at the top of the index attack.
    pub index_peak: f64,
    pub carrier_ratio: f64,
    pub modulator_ratio: f64,
    pub modulator_offset_hz: f64,

    pub index_attack: f64,
    pub index_decay: f64,
    pub index_release: f64,
    pub index_sustain: f64,
    pub index_sustain_final: f64,
    pub index_linear_fraction: f64,

    pub amp_attack: f64,
    pub amp_decay: f64,
    pub amp_release: f64,
    pub amp_sustain: f64,
    pub amp_sustain_final: f64,
}

impl FmSynth {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            index_start: 4.0,
            index_peak: 2.0,
            carrier_ratio: 1.365,
            modulator_ratio: 0.91,
            modulator_offset_hz: 0.16,

            index_attack: 0.1,
            index_decay: 0.1,
            index_release: 0.05,
            index_sustain: 0.95,
            index_sustain_final: 0.99,
            index_linear_fraction: 0.4,

            amp_attack: 0.1,
            amp_decay: 0.1,
            amp_release: 0.05,
            amp_sustain: 0.95,
            amp_sustain_final: 1.0,
        }
    }

    pub fn with_indices(mut self, start: f64, peak: f64) -> Self {
        self.index_start = start;
        self.index_peak = peak;
        self
    }

    pub fn with_ratios(mut self, carrier: f64, modulator: f64, offset_hz: f64) -> Self {
        self.carrier_ratio = carrier;
        self.modulator_ratio = modulator;
        self.modulator_offset_hz = offset_hz;
        self
    }

    pub fn amplitude_envelope(&self) -> WoodwindEnvelope {
        WoodwindEnvelope::new(
            1.0 / self.amp_sustain,
            self.amp_attack,
            self.amp_decay,
            self.amp_release,
        )
        .with_sustain_final(self.amp_sustain_final)
    }

    fn index_envelope(&self) -> WoodwindEnvelope {
        WoodwindEnvelope::new(
            1.0 / self.index_sustain,
            self.index_attack,
            self.index_decay,
            self.index_release,
        )
        .with_linear_fraction(self.index_linear_fraction)
        .with_sustain_final(self.index_sustain_final)
    }

    fn validate(&self) -> Result<()> {
        if self.amp_sustain <= 0.0 {
            return Err(SynthError::invalid("amp_sustain", "must be positive"));
        }
        if self.index_sustain <= 0.0 {
            return Err(SynthError::invalid("index_sustain", "must be positive"));
        }
        Ok(())
    }

    /// Modulation index curve, sampled against the clamped note duration.
    fn index_at(&self, envelope: &WoodwindEnvelope, t: f64, duration: f64) -> f64 {
        let span = (self.index_start - self.index_peak).abs() * self.index_sustain;
        let swing = span * envelope.gain_at(t, duration);
        if self.index_start > self.index_peak {
            self.index_start - swing
        } else {
            self.index_start + swing
        }
    }
}

impl Parameterized for FmSynth {
    fn parameters(&self) -> ParameterSet {
        ParameterSet::new()
            .number("index_start", self.index_start, 0.0, 10.0)
            .number("index_peak", self.index_peak, 0.0, 10.0)
            .number("carrier_ratio", self.carrier_ratio, 0.0, 10.0)
            .number("modulator_ratio", self.modulator_ratio, 0.0, 10.0)
            .number("modulator_offset_hz", self.modulator_offset_hz, -10.0, 10.0)
            .number("index_attack", self.index_attack, 0.0, 1.0)
            .number("index_decay", self.index_decay, 0.0, 1.0)
            .number("index_release", self.index_release, 0.0, 1.0)
            .number("index_sustain", self.index_sustain, 0.01, 1.0)
            .number("index_sustain_final", self.index_sustain_final, 0.0, 1.0)
            .number("index_linear_fraction", self.index_linear_fraction, 0.01, 1.0)
            .number("amp_attack", self.amp_attack, 0.0, 1.0)
            .number("amp_decay", self.amp_decay, 0.0, 1.0)
            .number("amp_release", self.amp_release, 0.0, 1.0)
            .number("amp_sustain", self.amp_sustain, 0.01, 1.0)
            .number("amp_sustain_final", self.amp_sustain_final, 0.0, 10.0)
    }

    fn apply_parameter(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        let v = value.number(key)?;
        let slot = match key {
            "index_start" => &mut self.index_start,
            "index_peak" => &mut self.index_peak,
            "carrier_ratio" => &mut self.carrier_ratio,
            "modulator_ratio" => &mut self.modulator_ratio,
            "modulator_offset_hz" => &mut self.modulator_offset_hz,
            "index_attack" => &mut self.index_attack,
            "index_decay" => &mut self.index_decay,
            "index_release" => &mut self.index_release,
            "index_sustain" => &mut self.index_sustain,
            "index_sustain_final" => &mut self.index_sustain_final,
            "index_linear_fraction" => &mut self.index_linear_fraction,
            "amp_attack" => &mut self.amp_attack,
            "amp_decay" => &mut self.amp_decay,
            "amp_release" => &mut self.amp_release,
            "amp_sustain" => &mut self.amp_sustain,
            "amp_sustain_final" => &mut self.amp_sustain_final,
            other => return Err(SynthError::UnknownParameter(other.to_string())),
        };
        *slot = v;
        Ok(())
    }
}

impl Instrument for FmSynth {
    fn name(&self) -> &str {
        "FM Clarinet"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn release_time(&self) -> f64 {
        self.amp_release
    }

    fn generate(&self, frequency_hz: f64, amplitude: f32, duration: f64) -> Result<Vec<f32>> {
        check_note(frequency_hz, duration)?;
        self.validate()?;

        let amp_env = self.amplitude_envelope();
        let index_env = self.index_envelope();
        let duration = amp_env
            .effective_duration(duration)
            .max(index_env.effective_duration(duration));

        let fc = self.carrier_ratio * frequency_hz;
        let fm = self.modulator_ratio * frequency_hz + self.modulator_offset_hz;

        Ok(render_shaped(
            &amp_env,
            duration,
            self.sample_rate,
            amplitude,
            |t| {
                let index = self.index_at(&index_env, t, duration);
                (TAU * fc * t - FRAC_PI_2 + index * (TAU * fm * t - FRAC_PI_2).sin()).sin()
            },
        ))
    }
}

/// One double-modulator voice of the DFM instrument.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DfmVoice {
    pub index1: f64,
    pub ratio1: f64,
    pub index2: f64,
    pub ratio2: f64,
    pub weight: f64,
}

impl DfmVoice {
    pub const fn new(index1: f64, ratio1: f64, index2: f64, ratio2: f64, weight: f64) -> Self {
        Self {
            index1,
            ratio1,
            index2,
            ratio2,
            weight,
        }
    }

    #[inline]
    fn value(&self, f0: f64, t: f64) -> f64 {
        (self.index1 * (TAU * self.ratio1 * f0 * t).sin()
            + self.index2 * (TAU * self.ratio2 * f0 * t).sin())
        .sin()
    }
}

/// Sax-like voices fitted from a recorded alto.
pub const SAX_VOICES: [DfmVoice; 3] = [
    DfmVoice::new(1.47038, 1.0, 0.032411, 0.5, 2.2044),
    DfmVoice::new(0.49422, 1.0, 3.222, 0.5, 1.80192),
    DfmVoice::new(2.7882, 1.5, 4.895, 1.0, -0.23908),
];

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct DfmSynth {
    sample_rate: u32,
    pub voices: Vec<DfmVoice>,
    /// Weight of the pure-FM voice; 0 disables it.
    pub blend: f64,
    pub fm_carrier_ratio: f64,
    pub fm_modulator_ratio: f64,
    pub fm_index: f64,

    pub amp_attack: f64,
    pub amp_decay: f64,
    pub amp_release: f64,
    pub amp_sustain: f64,
    pub amp_sustain_final: f64,
}

impl DfmSynth {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            voices: SAX_VOICES.to_vec(),
            blend: 0.0,
            fm_carrier_ratio: 1.0,
            fm_modulator_ratio: 1.0,
            fm_index: 2.0,
            amp_attack: 0.1,
            amp_decay: 0.1,
            amp_release: 0.05,
            amp_sustain: 0.95,
            amp_sustain_final: 1.0,
        }
    }

    pub fn with_voices(mut self, voices: Vec<DfmVoice>) -> Self {
        self.voices = voices;
        self
    }

    pub fn with_blend(mut self, blend: f64) -> Self {
        self.blend = blend.clamp(0.0, 1.0);
        self
    }

    fn amplitude_envelope(&self) -> WoodwindEnvelope {
        WoodwindEnvelope::new(
            1.0 / self.amp_sustain,
            self.amp_attack,
            self.amp_decay,
            self.amp_release,
        )
        .with_sustain_final(self.amp_sustain_final)
    }

    fn weight_norm(&self) -> Result<f64> {
        if !(2..=3).contains(&self.voices.len()) {
            return Err(SynthError::invalid(
                "voices",
                format!("expected 2 or 3 voices, got {}", self.voices.len()),
            ));
        }
        let norm = self.voices.iter().map(|v| v.weight * v.weight).sum::<f64>().sqrt();
        if norm == 0.0 {
            return Err(SynthError::invalid("voices", "all voice weights are zero"));
        }
        Ok(norm)
    }
}

const VOICE_KEYS: [[&str; 5]; 3] = [
    ["v1_index1", "v1_ratio1", "v1_index2", "v1_ratio2", "v1_weight"],
    ["v2_index1", "v2_ratio1", "v2_index2", "v2_ratio2", "v2_weight"],
    ["v3_index1", "v3_ratio1", "v3_index2", "v3_ratio2", "v3_weight"],
];

impl Parameterized for DfmSynth {
    fn parameters(&self) -> ParameterSet {
        let mut set = ParameterSet::new();
        for (voice, keys) in self.voices.iter().zip(VOICE_KEYS.iter()) {
            set = set
                .number(keys[0], voice.index1, 0.0, 10.0)
                .number(keys[1], voice.ratio1, 0.0, 10.0)
                .number(keys[2], voice.index2, 0.0, 10.0)
                .number(keys[3], voice.ratio2, 0.0, 10.0)
                .number(keys[4], voice.weight, -1.0, 10.0);
        }
        set.number("blend", self.blend, 0.0, 1.0)
            .number("fm_carrier_ratio", self.fm_carrier_ratio, 0.0, 10.0)
            .number("fm_modulator_ratio", self.fm_modulator_ratio, 0.0, 10.0)
            .number("fm_index", self.fm_index, 0.0, 10.0)
            .number("amp_attack", self.amp_attack, 0.0, 1.0)
            .number("amp_decay", self.amp_decay, 0.0, 1.0)
            .number("amp_release", self.amp_release, 0.0, 1.0)
            .number("amp_sustain", self.amp_sustain, 0.01, 1.0)
            .number("amp_sustain_final", self.amp_sustain_final, 0.0, 10.0)
    }

    fn apply_parameter(&mut self, key: &str, value: &ParamValue) -> Result<()> {
        let v = value.number(key)?;
        for (i, keys) in VOICE_KEYS.iter().enumerate() {
            if let Some(field) = keys.iter().position(|k| *k == key) {
                let voice = self
                    .voices
                    .get_mut(i)
                    .ok_or_else(|| SynthError::UnknownParameter(key.to_string()))?;
                match field {
                    0 => voice.index1 = v,
                    1 => voice.ratio1 = v,
                    2 => voice.index2 = v,
                    3 => voice.ratio2 = v,
                    _ => voice.weight = v,
                }
                return Ok(());
            }
        }
        let slot = match key {
            "blend" => &mut self.blend,
            "fm_carrier_ratio" => &mut self.fm_carrier_ratio,
            "fm_modulator_ratio" => &mut self.fm_modulator_ratio,
            "fm_index" => &mut self.fm_index,
            "amp_attack" => &mut self.amp_attack,
            "amp_decay" => &mut self.amp_decay,
            "amp_release" => &mut self.amp_release,
            "amp_sustain" => &mut self.amp_sustain,
            "amp_sustain_final" => &mut self.amp_sustain_final,
            other => return Err(SynthError::UnknownParameter(other.to_string())),
        };
        *slot = v;
        Ok(())
    }
}

impl Instrument for DfmSynth {
    fn name(&self) -> &str {
        "DFM Sax"
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn release_time(&self) -> f64 {
        self.amp_release
    }

    fn generate(&self, frequency_hz: f64, amplitude: f32, duration: f64) -> Result<Vec<f32>> {
        check_note(frequency_hz, duration)?;
        if self.amp_sustain <= 0.0 {
            return Err(SynthError::invalid("amp_sustain", "must be positive"));
        }
        let norm = self.weight_norm()?;
        let blend = self.blend.clamp(0.0, 1.0);
        let fc = self.fm_carrier_ratio * frequency_hz;
        let fm = self.fm_modulator_ratio * frequency_hz;

        Ok(render_shaped(
            &self.amplitude_envelope(),
            duration,
            self.sample_rate,
            amplitude,
            |t| {
                let dfm: f64 = self
                    .voices
                    .iter()
                    .map(|v| v.weight / norm * v.value(frequency_hz, t))
                    .sum();
                if blend > 0.0 {
                    let pure = (TAU * fc * t - FRAC_PI_2
                        + self.fm_index * (TAU * fm * t - FRAC_PI_2).sin())
                    .sin();
                    (1.0 - blend) * dfm + blend * pure
                } else {
                    dfm
                }
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 16_000;

    #[test]
    fn fm_index_touches_peak_at_end_of_attack() {
        let synth = FmSynth::new(SR);
        let env = synth.index_envelope();
        let at_top = synth.index_at(&env, synth.index_attack, 1.0);
        assert!((at_top - synth.index_peak).abs() < 1e-9, "index {at_top}");
        assert!((synth.index_at(&env, 0.0, 1.0) - synth.index_start).abs() < 1e-9);
    }

    #[test]
    fn fm_index_rises_when_start_below_peak() {
        let synth = FmSynth::new(SR).with_indices(1.0, 3.0);
        let env = synth.index_envelope();
        assert!((synth.index_at(&env, synth.index_attack, 1.0) - 3.0).abs() < 1e-9);
    }

    #[test]
    fn fm_output_is_bounded_by_envelope_peak() {
        let synth = FmSynth::new(SR);
        let out = synth.generate(440.0, 0.5, 0.6).unwrap();
        let limit = 0.5 / synth.amp_sustain as f32 + 1e-5;
        assert!(out.iter().all(|s| s.abs() <= limit));
        assert!(out.iter().any(|s| s.abs() > 0.3));
    }

    #[test]
    fn fm_short_notes_are_clamped() {
        let synth = FmSynth::new(SR);
        let out = synth.generate(440.0, 0.5, 0.01).unwrap();
        let expected = ((0.2 + synth.amp_release) * SR as f64).round() as usize;
        assert_eq!(out.len(), expected);
    }

    #[test]
    fn dfm_normalizes_by_weight_norm() {
        // Two identical voices at weights 3 and 4 mix to 7/5 of one voice
        let voice = DfmVoice::new(1.0, 1.0, 0.5, 2.0, 3.0);
        let single = DfmSynth::new(SR).with_voices(vec![
            DfmVoice { weight: 1.0, ..voice },
            DfmVoice { weight: 0.0, ..voice },
        ]);
        let pair = DfmSynth::new(SR).with_voices(vec![voice, DfmVoice { weight: 4.0, ..voice }]);
        let a = single.generate(220.0, 1.0, 0.5).unwrap();
        let b = pair.generate(220.0, 1.0, 0.5).unwrap();
        for (x, y) in a.iter().zip(&b) {
            assert!((x * 1.4 - y).abs() < 1e-4);
        }
    }

    #[test]
    fn dfm_rejects_bad_voice_counts() {
        let synth = DfmSynth::new(SR).with_voices(vec![SAX_VOICES[0]]);
        assert!(synth.generate(220.0, 1.0, 0.5).is_err());
    }

    #[test]
    fn dfm_blend_one_is_pure_fm() {
        let synth = DfmSynth::new(SR).with_blend(1.0);
        let mut other = synth.clone();
        other.voices[0].index1 = 9.0;
        let a = synth.generate(330.0, 1.0, 0.4).unwrap();
        let b = other.generate(330.0, 1.0, 0.4).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn dfm_parameters_follow_voice_count() {
        let two = DfmSynth::new(SR).with_voices(SAX_VOICES[..2].to_vec());
        assert!(two.parameters().get("v3_weight").is_none());
        assert!(DfmSynth::new(SR).parameters().get("v3_weight").is_some());
    }
}
