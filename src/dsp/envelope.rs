#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Result, SynthError};

/*
Offline Envelope Generators
===========================

An envelope maps time to gain. Unlike a realtime gate-driven envelope, every
note here is rendered in one shot, so the whole curve is known up front: we
are told the note's nominal duration (note-on to note-off) and evaluate the
gain at any time `t` directly.

Vocabulary
----------

  peak (k)    Gain reached at the end of the attack. Values above 1.0 give
              the percussive overshoot that decays back to the sustain level.

  sustain     Level held between the end of the decay and note-off. For the
              plain ADSR this is 1.0 unless configured otherwise.

  duration    Nominal note length. Clamped up to A + D so the phases never
              overlap; the release is appended AFTER this time.

  curve       Shaping function applied to the normalized progress `x` of a
              phase, then mapped onto the phase's [start, end] gain values.


The Shape
---------

  Gain
    k   ┐  ╱╲
        │ ╱  ╲
    1.0 │╱    ╲___________
        │                 ╲
    end └──────────────────╲──→ Time
        | A | D |   S      | R |
                           ^ duration

Phases (all times in seconds):

  Attack   0       → A          : 0 → k
  Decay    A       → A + D      : k → sustain
  Sustain  A + D   → duration   : sustain
  Release  duration → duration+R : sustain → end


Curve Families
--------------

Every curve satisfies f(0) = 0 and f(1) = 1, which is what keeps the envelope
continuous at phase boundaries no matter which family each phase uses.

  linear          x
  poly(n)         x^n
  flat-top(n)     1 - (1 - x)^n       (fast start, soft landing)
  exp(n)          (e^(n x) - 1) / (e^n - 1)
  log(n)          ln(n x + 1) / ln(n + 1)
  sin(n)          sin(x π/2)^n
  cos(n)          1 - cos(x π/2)^n

The exponent `n` must sit in [0.1, 20]; outside that the shapes degenerate
numerically (exp overflows, log flattens to a step).


Woodwind Envelope
-----------------

Breath-driven instruments don't start with a clean ramp. The woodwind envelope
uses a two-segment attack:

    0 .. k2d·A   linear rise at slope k/A
    k2d·A .. A   exponential continuation B·e^(C t), with B and C solved so
                 the curve is continuous at k2d·A and lands on k at t = A

and a sustain that drifts linearly from 1.0 toward `sustain_final` by
note-off. Without `k2d` the attack is quadratic, k·(t/A)².
*/

/// Shaping function family applied to a phase's normalized progress.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Curve {
    Linear,
    Poly(f64),
    PolyFlatTop(f64),
    Exp(f64),
    Log(f64),
    Sin(f64),
    Cos(f64),
}

pub const CURVE_EXPONENT_RANGE: (f64, f64) = (0.1, 20.0);

impl Default for Curve {
    fn default() -> Self {
        Curve::PolyFlatTop(3.0)
    }
}

impl Curve {
    pub fn exponent(&self) -> Option<f64> {
        match *self {
            Curve::Linear => None,
            Curve::Poly(n)
            | Curve::PolyFlatTop(n)
            | Curve::Exp(n)
            | Curve::Log(n)
            | Curve::Sin(n)
            | Curve::Cos(n) => Some(n),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (lo, hi) = CURVE_EXPONENT_RANGE;
        match self.exponent() {
            Some(n) if !(lo..=hi).contains(&n) => Err(SynthError::invalid(
                "curve",
                format!("exponent {n} outside [{lo}, {hi}]"),
            )),
            _ => Ok(()),
        }
    }

    /// Evaluate the curve at normalized progress `x`, clamped to [0, 1].
    #[inline]
    pub fn shape(&self, x: f64) -> f64 {
        use std::f64::consts::FRAC_PI_2;

        let x = x.clamp(0.0, 1.0);
        match *self {
            Curve::Linear => x,
            Curve::Poly(n) => x.powf(n),
            Curve::PolyFlatTop(n) => 1.0 - (1.0 - x).powf(n),
            Curve::Exp(n) => ((n * x).exp() - 1.0) / (n.exp() - 1.0),
            Curve::Log(n) => (n * x + 1.0).ln() / (n + 1.0).ln(),
            Curve::Sin(n) => (x * FRAC_PI_2).sin().powf(n),
            Curve::Cos(n) => 1.0 - (x * FRAC_PI_2).cos().powf(n),
        }
    }

    /// Map `x` in [x0, x1] onto [y0, y1] through the curve.
    #[inline]
    pub fn map(&self, x: f64, x0: f64, x1: f64, y0: f64, y1: f64) -> f64 {
        let span = x1 - x0;
        if span <= 0.0 {
            return y1;
        }
        y0 + (y1 - y0) * self.shape((x - x0) / span)
    }
}

/// Number of samples covering `seconds` at `sample_rate`.
#[inline]
pub fn sample_count(seconds: f64, sample_rate: u32) -> usize {
    (seconds.max(0.0) * sample_rate as f64).round() as usize
}

/// Time axis `0, 1/sr, 2/sr, ...` covering `seconds` (end exclusive).
pub fn time_axis(seconds: f64, sample_rate: u32) -> impl Iterator<Item = f64> {
    let step = 1.0 / sample_rate.max(1) as f64;
    (0..sample_count(seconds, sample_rate)).map(move |i| i as f64 * step)
}

/// A gain curve over a note's lifetime.
pub trait Envelope: Send + Sync {
    /// Gain at time `t` for a note whose (already clamped) nominal duration
    /// is `duration`.
    fn gain_at(&self, t: f64, duration: f64) -> f64;

    /// Seconds appended after note-off.
    fn release_time(&self) -> f64;

    /// Duration after clamping so the phases never overlap.
    fn effective_duration(&self, duration: f64) -> f64 {
        duration.max(0.0)
    }

    /// Total rendered length in seconds.
    fn total_time(&self, duration: f64) -> f64 {
        self.effective_duration(duration) + self.release_time()
    }

    /// Evaluate the envelope on an arbitrary, monotonically increasing time
    /// array.
    fn render_times(&self, times: &[f64], duration: f64) -> Vec<f32> {
        let duration = self.effective_duration(duration);
        times
            .iter()
            .map(|&t| self.gain_at(t, duration) as f32)
            .collect()
    }

    /// Render the full curve sampled at `sample_rate`.
    fn render(&self, duration: f64, sample_rate: u32) -> Vec<f32> {
        let duration = self.effective_duration(duration);
        time_axis(duration + self.release_time(), sample_rate)
            .map(|t| self.gain_at(t, duration) as f32)
            .collect()
    }
}

/// Four-phase envelope with pluggable curves per phase.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Adsr {
    pub peak: f64,
    pub attack: f64,
    pub decay: f64,
    pub sustain: f64,
    pub release: f64,
    pub release_end: f64,
    pub attack_curve: Curve,
    pub decay_curve: Curve,
    pub release_curve: Curve,
}

impl Adsr {
    /// Peak `k`, attack/decay/release in seconds, flat-top cubic curves and a
    /// sustain level of 1.0.
    pub fn new(peak: f64, attack: f64, decay: f64, release: f64) -> Self {
        Self {
            peak,
            attack: attack.max(0.0),
            decay: decay.max(0.0),
            sustain: 1.0,
            release: release.max(0.0),
            release_end: 0.0,
            attack_curve: Curve::default(),
            decay_curve: Curve::default(),
            release_curve: Curve::default(),
        }
    }

    /// Unity gain until note-off, then a linear fade over `release` seconds.
    pub fn release_only(release: f64) -> Self {
        Self::new(1.0, 0.0, 0.0, release).with_curve(Curve::Linear)
    }

    pub fn with_curve(mut self, curve: Curve) -> Self {
        self.attack_curve = curve;
        self.decay_curve = curve;
        self.release_curve = curve;
        self
    }

    pub fn with_attack_curve(mut self, curve: Curve) -> Self {
        self.attack_curve = curve;
        self
    }

    pub fn with_sustain(mut self, sustain: f64) -> Self {
        self.sustain = sustain;
        self
    }

    pub fn with_release_end(mut self, end: f64) -> Self {
        self.release_end = end;
        self
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("attack", self.attack),
            ("decay", self.decay),
            ("release", self.release),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(SynthError::invalid(name, "must be a finite, non-negative time"));
            }
        }
        self.attack_curve.validate()?;
        self.decay_curve.validate()?;
        self.release_curve.validate()
    }
}

impl Envelope for Adsr {
    fn gain_at(&self, t: f64, duration: f64) -> f64 {
        let a = self.attack;
        let ad = a + self.decay;
        let end = duration + self.release;

        if t < 0.0 {
            0.0
        } else if t < a {
            self.attack_curve.map(t, 0.0, a, 0.0, self.peak)
        } else if t < ad {
            self.decay_curve.map(t, a, ad, self.peak, self.sustain)
        } else if t < duration {
            self.sustain
        } else if t < end {
            self.release_curve
                .map(t, duration, end, self.sustain, self.release_end)
        } else {
            self.release_end
        }
    }

    fn release_time(&self) -> f64 {
        self.release
    }

    fn effective_duration(&self, duration: f64) -> f64 {
        duration.max(self.attack + self.decay)
    }
}

/// Breath-style envelope: shaped attack, linear decay, drifting sustain,
/// linear release.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct WoodwindEnvelope {
    pub peak: f64,
    pub attack: f64,
    pub decay: f64,
    pub release: f64,
    /// Fraction of the attack spent in the linear segment. `None` selects the
    /// quadratic attack.
    pub linear_fraction: Option<f64>,
    /// Sustain level reached at note-off, as a fraction of 1.0.
    pub sustain_final: f64,
}

impl WoodwindEnvelope {
    pub fn new(peak: f64, attack: f64, decay: f64, release: f64) -> Self {
        Self {
            peak,
            attack: attack.max(0.0),
            decay: decay.max(0.0),
            release: release.max(0.0),
            linear_fraction: None,
            sustain_final: 1.0,
        }
    }

    pub fn with_linear_fraction(mut self, k2d: f64) -> Self {
        self.linear_fraction = Some(k2d.clamp(0.01, 1.0));
        self
    }

    pub fn with_sustain_final(mut self, fraction: f64) -> Self {
        self.sustain_final = fraction;
        self
    }

    fn attack_gain(&self, t: f64) -> f64 {
        let a = self.attack;
        let k = self.peak;
        match self.linear_fraction {
            None => k * (t / a).powi(2),
            Some(k2d) if k2d >= 1.0 => k * t / a,
            Some(k2d) => {
                let knee = a * k2d;
                if t < knee {
                    k * t / a
                } else {
                    // Continuous at the knee, reaches k at t = a.
                    let c = (1.0 / k2d).ln() / (a * (1.0 - k2d));
                    let b = k * k2d * (-c * knee).exp();
                    b * (c * t).exp()
                }
            }
        }
    }
}

impl Envelope for WoodwindEnvelope {
    fn gain_at(&self, t: f64, duration: f64) -> f64 {
        let a = self.attack;
        let ad = a + self.decay;
        let sustain_len = duration - ad;

        if t < 0.0 {
            0.0
        } else if t < a {
            self.attack_gain(t)
        } else if t < ad {
            self.peak - (self.peak - 1.0) * (t - a) / self.decay
        } else if t < duration {
            1.0 + (self.sustain_final - 1.0) * (t - ad) / sustain_len
        } else if t < duration + self.release {
            self.sustain_final * (1.0 - (t - duration) / self.release)
        } else {
            0.0
        }
    }

    fn release_time(&self) -> f64 {
        self.release
    }

    fn effective_duration(&self, duration: f64) -> f64 {
        duration.max(self.attack + self.decay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 1_000;
    const EPS: f64 = 1e-6;

    const ALL_CURVES: [Curve; 7] = [
        Curve::Linear,
        Curve::Poly(2.0),
        Curve::PolyFlatTop(3.0),
        Curve::Exp(4.0),
        Curve::Log(4.0),
        Curve::Sin(1.5),
        Curve::Cos(2.0),
    ];

    #[test]
    fn every_curve_hits_its_endpoints() {
        for curve in ALL_CURVES {
            assert!(curve.shape(0.0).abs() < EPS, "{curve:?} at 0");
            assert!((curve.shape(1.0) - 1.0).abs() < EPS, "{curve:?} at 1");
        }
    }

    #[test]
    fn curve_exponent_is_range_checked() {
        assert!(Curve::Exp(25.0).validate().is_err());
        assert!(Curve::Poly(0.05).validate().is_err());
        assert!(Curve::Log(20.0).validate().is_ok());
        assert!(Curve::Linear.validate().is_ok());
    }

    #[test]
    fn adsr_is_continuous_at_phase_boundaries() {
        for curve in ALL_CURVES {
            let env = Adsr::new(2.0, 0.05, 0.1, 0.2).with_curve(curve);
            let duration = 0.5;
            for boundary in [0.05, 0.15, 0.5, 0.7] {
                let before = env.gain_at(boundary - 1e-9, duration);
                let after = env.gain_at(boundary + 1e-9, duration);
                assert!(
                    (before - after).abs() < 1e-4,
                    "{curve:?} jumps at {boundary}: {before} vs {after}"
                );
            }
        }
    }

    #[test]
    fn adsr_reaches_sustain_at_end_of_decay() {
        let env = Adsr::new(3.0, 0.02, 0.08, 0.1).with_sustain(0.8);
        assert!((env.gain_at(0.1, 1.0) - 0.8).abs() < EPS);
        assert!((env.gain_at(0.02, 1.0) - 3.0).abs() < EPS);
    }

    #[test]
    fn render_length_includes_release() {
        let env = Adsr::new(1.0, 0.01, 0.01, 0.25);
        let curve = env.render(0.5, SAMPLE_RATE);
        assert_eq!(curve.len(), 750);
        assert!(curve.last().copied().unwrap_or(1.0) < 0.01);
    }

    #[test]
    fn short_notes_are_clamped_to_attack_plus_decay() {
        let env = Adsr::new(1.5, 0.1, 0.2, 0.1);
        assert!((env.effective_duration(0.05) - 0.3).abs() < EPS);
        assert_eq!(env.render(0.05, SAMPLE_RATE).len(), 400);
    }

    #[test]
    fn release_only_holds_unity_then_fades() {
        let env = Adsr::release_only(0.1);
        assert!((env.gain_at(0.0, 0.3) - 1.0).abs() < EPS);
        assert!((env.gain_at(0.35, 0.3) - 0.5).abs() < EPS);
        assert!(env.gain_at(0.41, 0.3).abs() < EPS);
    }

    #[test]
    fn render_times_matches_gain_at() {
        let env = Adsr::new(2.0, 0.1, 0.1, 0.1);
        let times = [0.0, 0.05, 0.1, 0.15, 0.4];
        let rendered = env.render_times(&times, 0.3);
        for (t, g) in times.iter().zip(rendered) {
            assert!((env.gain_at(*t, 0.3) as f32 - g).abs() < 1e-6);
        }
    }

    #[test]
    fn woodwind_two_segment_attack_is_continuous_and_lands_on_peak() {
        let env = WoodwindEnvelope::new(1.25, 0.1, 0.1, 0.05).with_linear_fraction(0.4);
        let knee = 0.04;
        let before = env.gain_at(knee - 1e-9, 1.0);
        let after = env.gain_at(knee + 1e-9, 1.0);
        assert!((before - after).abs() < 1e-4);
        assert!((env.gain_at(0.1 - 1e-9, 1.0) - 1.25).abs() < 1e-4);
        assert!((env.gain_at(0.1, 1.0) - 1.25).abs() < 1e-9);
    }

    #[test]
    fn woodwind_sustain_drifts_toward_final_fraction() {
        let env = WoodwindEnvelope::new(1.2, 0.1, 0.1, 0.1).with_sustain_final(0.5);
        let duration = 1.2;
        assert!((env.gain_at(0.2, duration) - 1.0).abs() < EPS);
        assert!((env.gain_at(0.7, duration) - 0.75).abs() < EPS);
        let at_note_off = env.gain_at(duration, duration);
        assert!((at_note_off - 0.5).abs() < EPS);
        assert!(env.gain_at(duration + 0.1, duration).abs() < EPS);
    }

    #[test]
    fn woodwind_default_attack_is_quadratic() {
        let env = WoodwindEnvelope::new(2.0, 0.2, 0.1, 0.1);
        assert!((env.gain_at(0.1, 1.0) - 0.5).abs() < EPS);
    }
}
