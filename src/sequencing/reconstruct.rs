use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

use log::warn;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::note::{pitch_name, ChannelTrack, Note};
use crate::io::midi::{MidiSource, RawMidiEvent, TrackMetadata};

/*
Note Reconstruction
===================

A MIDI stream only says "key down" and "key up". To render, we need each
pairing as one Note with a start and a length.

Per channel and per pitch we keep a queue of note-ons still waiting for
their note-off:

    on(60)@0.0  → pending[60] = [0.0]
    on(64)@0.1  → pending[64] = [0.1]
    off(60)@0.5 → pop 0.0 → Note(60, 0.0..0.5)
    off(64)@0.8 → pop 0.1 → Note(64, 0.1..0.8)

A note-on with velocity 0 counts as a note-off (running-status files use it
everywhere).

Overlapping Same-Pitch Notes
----------------------------

When a second note-on arrives for a pitch that is still sounding, the
policy decides:

  Fifo     queue it too; note-offs close the OLDEST pending note-on first
  Ignore   drop the second note-on; the next spare note-off for that pitch
           is swallowed silently so it doesn't show up as an orphan

Nothing here is fatal. Unmatched note-offs, note-ons still open at the end
of the stream and zero-length pairs are dropped and reported as warnings,
both through `log` and in the returned list.


Titles
------

A channel's title comes from track-name metadata entries that reference the
channel (by channel prefix or because the track carried events on it). The
first candidate wins; more than one distinct candidate is reported. Without
a candidate the title is "Channel N" with N counted from 1.
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    Ignore,
    #[default]
    Fifo,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub enum ReconstructionWarning {
    OrphanNoteOff { channel: u8, pitch: u8, time: f64 },
    UnclosedNoteOn { channel: u8, pitch: u8, time_on: f64 },
    ZeroDuration { channel: u8, pitch: u8, time_on: f64 },
    IgnoredNoteOn { channel: u8, pitch: u8, time: f64 },
    DuplicateTitle { channel: u8, kept: String, candidates: Vec<String> },
}

impl fmt::Display for ReconstructionWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconstructionWarning::OrphanNoteOff { channel, pitch, time } => write!(
                f,
                "channel {channel}: note-off for {} at {time:.3}s has no matching note-on",
                pitch_name(*pitch)
            ),
            ReconstructionWarning::UnclosedNoteOn { channel, pitch, time_on } => write!(
                f,
                "channel {channel}: note-on for {} at {time_on:.3}s is never closed",
                pitch_name(*pitch)
            ),
            ReconstructionWarning::ZeroDuration { channel, pitch, time_on } => write!(
                f,
                "channel {channel}: {} at {time_on:.3}s has no duration",
                pitch_name(*pitch)
            ),
            ReconstructionWarning::IgnoredNoteOn { channel, pitch, time } => write!(
                f,
                "channel {channel}: overlapping note-on for {} at {time:.3}s ignored",
                pitch_name(*pitch)
            ),
            ReconstructionWarning::DuplicateTitle {
                channel,
                kept,
                candidates,
            } => write!(
                f,
                "channel {channel}: several track names {candidates:?}, keeping `{kept}`"
            ),
        }
    }
}

/// Output of one reconstruction pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconstruction {
    /// One entry per channel that played at least one note, by channel id.
    pub tracks: Vec<ChannelTrack>,
    pub warnings: Vec<ReconstructionWarning>,
}

impl Reconstruction {
    pub fn channel(&self, channel_id: u8) -> Option<&ChannelTrack> {
        self.tracks.iter().find(|t| t.channel_id == channel_id)
    }

    pub fn note_count(&self) -> usize {
        self.tracks.iter().map(ChannelTrack::len).sum()
    }
}

#[derive(Default)]
struct ChannelState {
    pending: HashMap<u8, VecDeque<(f64, u8)>>,
    /// Spare note-offs owed by ignored note-ons, per pitch. Cleared when a
    /// new note opens on a drained pitch.
    swallow: HashMap<u8, usize>,
    notes: Vec<Note>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoteReconstructor {
    policy: OverlapPolicy,
}

impl NoteReconstructor {
    pub fn new(policy: OverlapPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> OverlapPolicy {
        self.policy
    }

    /// Pair the note events of a time-ordered stream into per-channel notes.
    pub fn reconstruct(
        &self,
        events: &[RawMidiEvent],
        metadata: &[TrackMetadata],
    ) -> Reconstruction {
        let mut channels: BTreeMap<u8, ChannelState> = BTreeMap::new();
        let mut warnings = Vec::new();
        let mut report = |warning: ReconstructionWarning| {
            warn!("{warning}");
            warnings.push(warning);
        };

        for event in events {
            let state = channels.entry(event.channel).or_default();
            if event.starts_note() {
                self.note_on(state, event, &mut report);
            } else if event.ends_note() {
                note_off(state, event, &mut report);
            }
        }

        let mut tracks = Vec::new();
        for (channel, state) in channels {
            let mut unclosed: Vec<_> = state
                .pending
                .iter()
                .flat_map(|(&pitch, queue)| queue.iter().map(move |&(t, _)| (t, pitch)))
                .collect();
            unclosed.sort_by(|a, b| a.0.total_cmp(&b.0));
            for (time_on, pitch) in unclosed {
                report(ReconstructionWarning::UnclosedNoteOn {
                    channel,
                    pitch,
                    time_on,
                });
            }

            if state.notes.is_empty() {
                continue;
            }
            let title = channel_title(channel, metadata, &mut report);
            tracks.push(ChannelTrack::new(channel, title, state.notes));
        }

        Reconstruction { tracks, warnings }
    }

    fn note_on(
        &self,
        state: &mut ChannelState,
        event: &RawMidiEvent,
        report: &mut impl FnMut(ReconstructionWarning),
    ) {
        let queue = state.pending.entry(event.pitch).or_default();
        if self.policy == OverlapPolicy::Ignore && !queue.is_empty() {
            *state.swallow.entry(event.pitch).or_default() += 1;
            report(ReconstructionWarning::IgnoredNoteOn {
                channel: event.channel,
                pitch: event.pitch,
                time: event.absolute_time,
            });
            return;
        }
        if queue.is_empty() {
            state.swallow.remove(&event.pitch);
        }
        queue.push_back((event.absolute_time, event.velocity));
    }
}

fn note_off(
    state: &mut ChannelState,
    event: &RawMidiEvent,
    report: &mut impl FnMut(ReconstructionWarning),
) {
    let opened = state
        .pending
        .get_mut(&event.pitch)
        .and_then(VecDeque::pop_front);

    let Some((time_on, velocity)) = opened else {
        match state.swallow.get_mut(&event.pitch) {
            Some(spare) if *spare > 0 => *spare -= 1,
            _ => report(ReconstructionWarning::OrphanNoteOff {
                channel: event.channel,
                pitch: event.pitch,
                time: event.absolute_time,
            }),
        }
        return;
    };

    match Note::new(event.pitch, velocity, time_on, event.absolute_time) {
        Some(note) => state.notes.push(note),
        None => report(ReconstructionWarning::ZeroDuration {
            channel: event.channel,
            pitch: event.pitch,
            time_on,
        }),
    }
}

fn channel_title(
    channel: u8,
    metadata: &[TrackMetadata],
    report: &mut impl FnMut(ReconstructionWarning),
) -> String {
    let mut candidates: Vec<String> = Vec::new();
    for meta in metadata.iter().filter(|m| m.references(channel)) {
        if let Some(name) = meta.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            if !candidates.iter().any(|c| c == name) {
                candidates.push(name.to_string());
            }
        }
    }

    match candidates.first() {
        None => format!("Channel {}", channel as u16 + 1),
        Some(first) => {
            let kept = first.clone();
            if candidates.len() > 1 {
                report(ReconstructionWarning::DuplicateTitle {
                    channel,
                    kept: kept.clone(),
                    candidates,
                });
            }
            kept
        }
    }
}

/// A MIDI source with its reconstruction cached until cleared.
pub struct MidiSong<S: MidiSource> {
    source: S,
    reconstructor: NoteReconstructor,
    cache: OnceCell<Reconstruction>,
}

impl<S: MidiSource> MidiSong<S> {
    pub fn new(source: S) -> Self {
        Self::with_policy(source, OverlapPolicy::default())
    }

    pub fn with_policy(source: S, policy: OverlapPolicy) -> Self {
        Self {
            source,
            reconstructor: NoteReconstructor::new(policy),
            cache: OnceCell::new(),
        }
    }

    /// Reconstructed tracks, built on first request.
    pub fn reconstruction(&self) -> &Reconstruction {
        self.cache.get_or_init(|| {
            self.reconstructor
                .reconstruct(self.source.events(), self.source.metadata())
        })
    }

    pub fn tracks(&self) -> &[ChannelTrack] {
        &self.reconstruction().tracks
    }

    pub fn is_cached(&self) -> bool {
        self.cache.get().is_some()
    }

    pub fn set_policy(&mut self, policy: OverlapPolicy) {
        if policy != self.reconstructor.policy() {
            self.reconstructor = NoteReconstructor::new(policy);
            self.clear();
        }
    }

    /// Drop the cached reconstruction.
    pub fn clear(&mut self) {
        self.cache = OnceCell::new();
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Mutable access to the source. Invalidates the cache.
    pub fn source_mut(&mut self) -> &mut S {
        self.clear();
        &mut self.source
    }
}
