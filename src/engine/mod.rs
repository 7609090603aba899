// Purpose - turning note lists into finished track buffers

pub mod job;
pub mod mix;
pub mod mixer;
pub mod scheduler;

pub use job::{JobQueue, SynthJob};
pub use mix::MixBuffer;
pub use mixer::{MixerStrip, TrackMixer};
pub use scheduler::{RenderEvent, RenderedTrack, SchedulerState, TrackScheduler};
