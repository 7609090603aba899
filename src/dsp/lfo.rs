//! Low Frequency Oscillator (LFO) used to sweep delay-line read offsets.

/*
Low Frequency Oscillators
=========================

An LFO is an oscillator running below hearing (~0.01 to ~20 Hz). Here it
never makes sound directly: flanger and chorus use it to move the read
position of a delay line, which bends pitch slightly up and down.

Vocabulary
----------

  bipolar     Output swings -1.0 to +1.0. Natural for symmetric wobble.

  unipolar    Output in 0.0 to 1.0. Natural for "how far into the sweep":
                  unipolar = (bipolar + 1.0) * 0.5

  period      Time for one cycle. At 0.25 Hz: 4 seconds.


Sweep Shapes
------------

Flangers traditionally sweep with a TRIANGLE (constant rate of change, so the
comb-filter notches glide evenly) or a rising SAWTOOTH (one-way jet sweep
that snaps back). SINE gives the smoothest shimmer on chorus voices.

  Triangle:  ╱╲╱╲╱╲
  Sawtooth:  ╱│╱│╱│
  Sine:      ∿∿∿∿∿


Delay Sweep
-----------

The modulated delay at sample n, in samples, is

    delay[n] = base + depth · unipolar(lfo(n / sr))

so the delay moves between `base` and `base + depth`, never below the base.
*/

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::dsp::oscillator::Waveform;

/// Convert bipolar signal (-1.0 to +1.0) to unipolar (0.0 to 1.0).
#[inline]
pub fn bipolar_to_unipolar(bipolar: f64) -> f64 {
    (bipolar + 1.0) * 0.5
}

/// Sub-audio oscillator with a starting phase, sampled by absolute time.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lfo {
    pub waveform: Waveform,
    pub rate_hz: f64,
    /// Starting phase in cycles.
    pub phase: f64,
}

impl Lfo {
    pub fn new(waveform: Waveform, rate_hz: f64) -> Self {
        Self {
            waveform,
            rate_hz: rate_hz.max(0.0),
            phase: 0.0,
        }
    }

    pub fn with_phase(mut self, phase: f64) -> Self {
        self.phase = phase;
        self
    }

    #[inline]
    pub fn bipolar_at(&self, t: f64) -> f64 {
        self.waveform.at_phase(self.phase + self.rate_hz * t)
    }

    #[inline]
    pub fn unipolar_at(&self, t: f64) -> f64 {
        bipolar_to_unipolar(self.bipolar_at(t))
    }

    /// Delay in samples at time `t`, sweeping `base..=base + depth`.
    #[inline]
    pub fn delay_at(&self, t: f64, base: f64, depth: f64) -> f64 {
        base + depth * self.unipolar_at(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bipolar_to_unipolar() {
        assert!((bipolar_to_unipolar(-1.0) - 0.0).abs() < 1e-9);
        assert!((bipolar_to_unipolar(0.0) - 0.5).abs() < 1e-9);
        assert!((bipolar_to_unipolar(1.0) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn delay_sweep_stays_within_base_and_depth() {
        let lfo = Lfo::new(Waveform::Triangle, 0.5);
        for i in 0..4000 {
            let d = lfo.delay_at(i as f64 / 1000.0, 10.0, 40.0);
            assert!(
                (10.0..=50.0).contains(&d),
                "delay {} escaped sweep at step {}",
                d,
                i
            );
        }
    }

    #[test]
    fn phase_offset_shifts_sweep() {
        let a = Lfo::new(Waveform::Sine, 1.0);
        let b = Lfo::new(Waveform::Sine, 1.0).with_phase(0.25);
        assert!((a.bipolar_at(0.25) - b.bipolar_at(0.0)).abs() < 1e-9);
    }
}
