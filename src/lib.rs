pub mod config;
pub mod dsp;
pub mod effects; // Buffer-to-buffer signal processing
pub mod engine; // Job queue, mix buffer and track scheduling
pub mod error;
pub mod instruments; // One note in, one waveform out
pub mod io;
pub mod params;
pub mod sequencing; // MIDI events to notes

pub use config::RenderConfig;
pub use error::{Result, SynthError};

pub const DEFAULT_SAMPLE_RATE: u32 = 44_100;
