//! Offline render scenario benchmarks.
//!
//! Whole notes through every instrument and effect, and a full track through
//! the scheduler.

mod effects;
mod instruments;
mod track;

pub use effects::bench_effects;
pub use instruments::bench_instruments;
pub use track::bench_track;
