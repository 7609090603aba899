// Purpose - external interfaces, format conversions

pub mod converter;
pub mod midi;
pub mod sink;
pub mod wav;

pub use converter::PitchTable;
pub use midi::{EventList, MidiSource, RawMidiEvent, TrackMessage, TrackMetadata};
pub use sink::{AudioSink, MemorySink, WavFileSink};
