//! Low-level DSP primitives used by the instruments and effects.
//!
//! Everything here works on whole buffers or on absolute time, since notes
//! and effects are rendered offline in one pass. The modules stay focused on
//! the signal-processing math so instruments and effects can layer on
//! parameters and orchestration.

/// Linear-interpolating circular delay line.
pub mod delay;
/// Direct and FFT convolution, plus autocorrelation.
pub mod convolve;
/// ADSR and woodwind envelopes with shaped curves.
pub mod envelope;
/// Gain, normalization and segment compression.
pub mod gain;
pub mod lfo;
/// Seeded excitation noise.
pub mod noise;
/// Periodic waveforms evaluated by phase.
pub mod oscillator;
/// Pitch shifting by overlap-add.
pub mod psola;

pub use envelope::{Adsr, Curve, Envelope, WoodwindEnvelope};
pub use oscillator::Waveform;
