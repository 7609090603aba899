#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Notes and Pitch Names
=====================

A Note is one matched note-on/note-off pair:

    time_on ──────────────── time_off
            <── duration ──>

duration is always time_off − time_on and strictly positive; zero-length
pairs never become Notes.

Pitch names follow the MIDI convention where middle C (C4) is note 60:

    note_number = 12 · (octave + 1) + semitone
    semitone: C=0 C#=1 D=2 D#=3 E=4 F=5 F#=6 G=7 G#=8 A=9 A#=10 B=11

so A4 = 69 and C-1 = 0. Flats are accepted when parsing ("Eb4" = "D#4").
*/

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
    pub time_on: f64,
    pub time_off: f64,
    pub duration: f64,
}

impl Note {
    /// Pair an on and an off time. Returns `None` unless `time_off > time_on`.
    pub fn new(pitch: u8, velocity: u8, time_on: f64, time_off: f64) -> Option<Self> {
        let duration = time_off - time_on;
        if !(duration > 0.0) {
            return None;
        }
        Some(Self {
            pitch: pitch.min(127),
            velocity: velocity.min(127),
            time_on,
            time_off,
            duration,
        })
    }
}

/// All notes played on one MIDI channel, ordered by `time_on`.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelTrack {
    pub channel_id: u8,
    pub title: String,
    pub notes: Vec<Note>,
    /// Latest `time_off` of any note.
    pub total_duration: f64,
}

impl ChannelTrack {
    pub fn new(channel_id: u8, title: impl Into<String>, mut notes: Vec<Note>) -> Self {
        notes.sort_by(|a, b| a.time_on.total_cmp(&b.time_on));
        let total_duration = notes.iter().map(|n| n.time_off).fold(0.0, f64::max);
        Self {
            channel_id,
            title: title.into(),
            notes,
            total_duration,
        }
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Name of a MIDI note, e.g. 60 → "C4", 61 → "C#4".
pub fn pitch_name(pitch: u8) -> String {
    let octave = pitch as i32 / 12 - 1;
    format!("{}{}", SHARP_NAMES[pitch as usize % 12], octave)
}

/// Parse names like "C4", "F#3", "Bb2" or "C-1" into a MIDI note number.
pub fn parse_pitch(name: &str) -> Option<u8> {
    let mut chars = name.trim().chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let mut semitone: i32 = match letter {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };

    let rest = chars.as_str();
    let rest = if let Some(r) = rest.strip_prefix('#') {
        semitone += 1;
        r
    } else if let Some(r) = rest.strip_prefix('b') {
        semitone -= 1;
        r
    } else {
        rest
    };

    let octave: i32 = rest.parse().ok()?;
    let note = 12 * (octave + 1) + semitone;
    u8::try_from(note).ok().filter(|n| *n <= 127)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_and_negative_lengths_are_rejected() {
        assert!(Note::new(60, 100, 1.0, 1.0).is_none());
        assert!(Note::new(60, 100, 1.0, 0.5).is_none());
        let note = Note::new(60, 100, 0.25, 1.0).unwrap();
        assert!((note.duration - 0.75).abs() < 1e-12);
    }

    #[test]
    fn channel_track_sorts_and_measures() {
        let notes = vec![
            Note::new(64, 90, 1.0, 1.5).unwrap(),
            Note::new(60, 90, 0.0, 2.0).unwrap(),
        ];
        let track = ChannelTrack::new(0, "Piano", notes);
        assert_eq!(track.notes[0].pitch, 60);
        assert!((track.total_duration - 2.0).abs() < 1e-12);
    }

    #[test]
    fn names_use_sharps_and_midi_octaves() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(61), "C#4");
        assert_eq!(pitch_name(0), "C-1");
        assert_eq!(parse_pitch(&pitch_name(70)), Some(70));
    }

    #[test]
    fn parses_flats_and_rejects_garbage() {
        assert_eq!(parse_pitch("A4"), Some(69));
        assert_eq!(parse_pitch("Eb4"), Some(63));
        assert_eq!(parse_pitch("c-1"), Some(0));
        assert_eq!(parse_pitch("H2"), None);
        assert_eq!(parse_pitch("G9"), Some(127));
        assert_eq!(parse_pitch("G#9"), None);
    }
}
