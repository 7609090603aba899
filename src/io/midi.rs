//! MIDI event types consumed by the note reconstructor.
//!
//! Container parsing (SMF chunks, running status across a file) happens
//! outside this crate; a [`MidiSource`] hands over a flat, time-ordered
//! event list plus per-track metadata.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Channel voice message, decoded from its status and data bytes.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, key: u8, velocity: u8 },
    NoteOff { channel: u8, key: u8, velocity: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    PitchBend { channel: u8, value: i16 },
    ProgramChange { channel: u8, program: u8 },
}

impl MidiEvent {
    /// Decode one channel voice message. Returns `None` for system messages
    /// and truncated input.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let status = *bytes.first()?;
        let channel = status & 0x0F;
        let data = |i: usize| bytes.get(i).map(|b| b & 0x7F);
        match status & 0xF0 {
            0x80 => Some(MidiEvent::NoteOff {
                channel,
                key: data(1)?,
                velocity: data(2)?,
            }),
            0x90 => Some(MidiEvent::NoteOn {
                channel,
                key: data(1)?,
                velocity: data(2)?,
            }),
            0xB0 => Some(MidiEvent::ControlChange {
                channel,
                controller: data(1)?,
                value: data(2)?,
            }),
            0xC0 => Some(MidiEvent::ProgramChange {
                channel,
                program: data(1)?,
            }),
            0xE0 => {
                let raw = (data(2)? as i16) << 7 | data(1)? as i16;
                Some(MidiEvent::PitchBend {
                    channel,
                    value: raw - 8192,
                })
            }
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::PitchBend { channel, .. }
            | MidiEvent::ProgramChange { channel, .. } => channel,
        }
    }
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    NoteOn,
    NoteOff,
    Other,
}

/// A timed event in the flat stream fed to the reconstructor.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawMidiEvent {
    /// Seconds since the start of the song.
    pub absolute_time: f64,
    pub channel: u8,
    pub kind: EventKind,
    pub pitch: u8,
    pub velocity: u8,
}

impl RawMidiEvent {
    pub fn note_on(absolute_time: f64, channel: u8, pitch: u8, velocity: u8) -> Self {
        Self {
            absolute_time,
            channel,
            kind: EventKind::NoteOn,
            pitch: pitch.min(127),
            velocity: velocity.min(127),
        }
    }

    pub fn note_off(absolute_time: f64, channel: u8, pitch: u8) -> Self {
        Self {
            absolute_time,
            channel,
            kind: EventKind::NoteOff,
            pitch: pitch.min(127),
            velocity: 0,
        }
    }

    pub fn from_event(absolute_time: f64, event: MidiEvent) -> Self {
        match event {
            MidiEvent::NoteOn {
                channel,
                key,
                velocity,
            } => Self::note_on(absolute_time, channel, key, velocity),
            MidiEvent::NoteOff {
                channel,
                key,
                velocity,
            } => Self {
                velocity: velocity.min(127),
                ..Self::note_off(absolute_time, channel, key)
            },
            other => Self {
                absolute_time,
                channel: other.channel(),
                kind: EventKind::Other,
                pitch: 0,
                velocity: 0,
            },
        }
    }

    /// Note-on with positive velocity.
    pub fn starts_note(&self) -> bool {
        self.kind == EventKind::NoteOn && self.velocity > 0
    }

    /// Note-off, or note-on with velocity 0.
    pub fn ends_note(&self) -> bool {
        match self.kind {
            EventKind::NoteOff => true,
            EventKind::NoteOn => self.velocity == 0,
            EventKind::Other => false,
        }
    }
}

/// One message from a track chunk, as far as metadata is concerned.
#[derive(Debug, Clone, PartialEq)]
pub enum TrackMessage {
    TrackName(String),
    MidiPort(u8),
    ChannelPrefix(u8),
    Channel(MidiEvent),
    /// Any other meta or sysex message; only its delta time counts.
    Other,
}

/// Per-track metadata that came with the file.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadata {
    pub name: Option<String>,
    pub port: Option<u8>,
    pub channel_prefix: Option<u8>,
    pub ticks: u32,
    /// Channels this track's note events were seen on.
    pub ref_channels: Vec<u8>,
}

impl TrackMetadata {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Walk a track's `(delta_ticks, message)` stream. Ticks add up across
    /// every message; later name, port and prefix events win.
    pub fn from_messages(messages: impl IntoIterator<Item = (u32, TrackMessage)>) -> Self {
        let mut meta = Self::default();
        for (delta, message) in messages {
            meta.ticks = meta.ticks.saturating_add(delta);
            match message {
                TrackMessage::TrackName(name) => meta.name = Some(name),
                TrackMessage::MidiPort(port) => meta.port = Some(port),
                TrackMessage::ChannelPrefix(channel) => meta.channel_prefix = Some(channel),
                TrackMessage::Channel(event) => {
                    let channel = event.channel();
                    if !meta.ref_channels.contains(&channel) {
                        meta.ref_channels.push(channel);
                    }
                }
                TrackMessage::Other => {}
            }
        }
        meta
    }

    pub fn with_channels(mut self, channels: impl IntoIterator<Item = u8>) -> Self {
        self.ref_channels = channels.into_iter().collect();
        self
    }

    pub fn with_channel_prefix(mut self, channel: u8) -> Self {
        self.channel_prefix = Some(channel);
        self
    }

    pub fn references(&self, channel: u8) -> bool {
        self.channel_prefix == Some(channel) || self.ref_channels.contains(&channel)
    }
}

/// Anything that can hand over a time-ordered event stream.
pub trait MidiSource {
    fn events(&self) -> &[RawMidiEvent];

    fn metadata(&self) -> &[TrackMetadata] {
        &[]
    }
}

/// In-memory [`MidiSource`], also used for manually entered notes.
#[derive(Debug, Clone, Default)]
pub struct EventList {
    events: Vec<RawMidiEvent>,
    metadata: Vec<TrackMetadata>,
}

impl EventList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(delta_seconds, event)` pairs, summing deltas into
    /// absolute times.
    pub fn from_deltas(deltas: impl IntoIterator<Item = (f64, MidiEvent)>) -> Self {
        Self {
            events: accumulate_deltas(deltas).collect(),
            metadata: Vec::new(),
        }
    }

    pub fn push(&mut self, event: RawMidiEvent) {
        self.events.push(event);
    }

    pub fn add_metadata(&mut self, metadata: TrackMetadata) {
        self.metadata.push(metadata);
    }

    /// Stable sort by absolute time; events at the same instant keep their
    /// insertion order.
    pub fn sort(&mut self) {
        self.events
            .sort_by(|a, b| a.absolute_time.total_cmp(&b.absolute_time));
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl MidiSource for EventList {
    fn events(&self) -> &[RawMidiEvent] {
        &self.events
    }

    fn metadata(&self) -> &[TrackMetadata] {
        &self.metadata
    }
}

impl FromIterator<RawMidiEvent> for EventList {
    fn from_iter<I: IntoIterator<Item = RawMidiEvent>>(iter: I) -> Self {
        Self {
            events: iter.into_iter().collect(),
            metadata: Vec::new(),
        }
    }
}

/// Running sum of per-event delta times.
pub fn accumulate_deltas(
    deltas: impl IntoIterator<Item = (f64, MidiEvent)>,
) -> impl Iterator<Item = RawMidiEvent> {
    let mut clock = 0.0;
    deltas.into_iter().map(move |(delta, event)| {
        clock += delta.max(0.0);
        RawMidiEvent::from_event(clock, event)
    })
}

/// Convert a tick count to seconds at `tempo_us` microseconds per beat.
pub fn ticks_to_seconds(ticks: u32, ticks_per_beat: u16, tempo_us: u32) -> f64 {
    if ticks_per_beat == 0 {
        return 0.0;
    }
    ticks as f64 * tempo_us as f64 / (ticks_per_beat as f64 * 1_000_000.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_channel_voice_messages() {
        assert_eq!(
            MidiEvent::from_bytes(&[0x93, 60, 100]),
            Some(MidiEvent::NoteOn {
                channel: 3,
                key: 60,
                velocity: 100
            })
        );
        assert_eq!(
            MidiEvent::from_bytes(&[0xE0, 0x00, 0x40]),
            Some(MidiEvent::PitchBend {
                channel: 0,
                value: 0
            })
        );
        assert_eq!(MidiEvent::from_bytes(&[0x90, 60]), None);
        assert_eq!(MidiEvent::from_bytes(&[0xF8]), None);
    }

    #[test]
    fn zero_velocity_note_on_ends_a_note() {
        let ev = RawMidiEvent::note_on(0.0, 0, 60, 0);
        assert!(ev.ends_note());
        assert!(!ev.starts_note());
    }

    #[test]
    fn deltas_accumulate_into_absolute_time() {
        let list = EventList::from_deltas(vec![
            (0.5, MidiEvent::NoteOn { channel: 0, key: 60, velocity: 90 }),
            (0.25, MidiEvent::NoteOff { channel: 0, key: 60, velocity: 0 }),
            (1.0, MidiEvent::ProgramChange { channel: 0, program: 4 }),
        ]);
        let times: Vec<f64> = list.events().iter().map(|e| e.absolute_time).collect();
        assert_eq!(times, vec![0.5, 0.75, 1.75]);
        assert_eq!(list.events()[2].kind, EventKind::Other);
    }

    #[test]
    fn ticks_convert_at_tempo() {
        // 480 ticks per beat at 120 bpm (500_000 us per beat)
        assert!((ticks_to_seconds(960, 480, 500_000) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn metadata_accumulates_from_track_messages() {
        let on = |channel| TrackMessage::Channel(MidiEvent::NoteOn { channel, key: 64, velocity: 80 });
        let meta = TrackMetadata::from_messages(vec![
            (0, TrackMessage::TrackName("Strings".into())),
            (0, TrackMessage::MidiPort(1)),
            (96, on(5)),
            (48, on(2)),
            (48, on(5)),
            (240, TrackMessage::Other),
        ]);
        assert_eq!(meta.name.as_deref(), Some("Strings"));
        assert_eq!(meta.port, Some(1));
        assert_eq!(meta.channel_prefix, None);
        assert_eq!(meta.ticks, 432);
        assert_eq!(meta.ref_channels, vec![5, 2]);
        assert!(meta.references(2));

        let prefixed = TrackMetadata::from_messages([(0, TrackMessage::ChannelPrefix(9))]);
        assert!(prefixed.references(9));
        assert!(prefixed.ref_channels.is_empty());
    }

    #[test]
    fn metadata_matches_prefix_or_channels() {
        let meta = TrackMetadata::named("Bass").with_channels([2, 3]);
        assert!(meta.references(3));
        assert!(!meta.references(4));
        assert!(TrackMetadata::named("Lead").with_channel_prefix(4).references(4));
    }
}
