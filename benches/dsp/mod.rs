//! Benchmarks for low-level DSP primitives.

mod convolve;
mod delay;
mod envelope;
mod psola;

pub use convolve::bench_convolve;
pub use delay::bench_delay;
pub use envelope::bench_envelope;
pub use psola::bench_psola;
