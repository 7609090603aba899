// Purpose - turning note events into timed notes per channel

pub mod note;
pub mod reconstruct;

pub use note::{parse_pitch, pitch_name, ChannelTrack, Note};
pub use reconstruct::{
    MidiSong, NoteReconstructor, OverlapPolicy, Reconstruction, ReconstructionWarning,
};
