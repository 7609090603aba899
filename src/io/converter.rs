/// Equal-tempered frequency of a MIDI note, with note 69 (A4) at `a4_hz`.
#[inline]
pub fn midi_note_to_freq(note: u8, a4_hz: f64) -> f64 {
    a4_hz * 2.0_f64.powf((note as f64 - 69.0) / 12.0)
}

/// Per-note amplitude: velocity scaled to [0, 1], times the track volume.
#[inline]
pub fn velocity_to_amplitude(velocity: u8, volume: f32) -> f32 {
    velocity.min(127) as f32 / 127.0 * volume
}

/// Equal-tempered frequencies for all 128 MIDI notes, computed once.
#[derive(Debug, Clone)]
pub struct PitchTable {
    frequencies: [f64; 128],
}

impl PitchTable {
    pub fn new() -> Self {
        Self::with_reference(440.0)
    }

    /// Table tuned so note 69 sounds at `a4_hz`.
    pub fn with_reference(a4_hz: f64) -> Self {
        let mut frequencies = [0.0; 128];
        for (note, slot) in frequencies.iter_mut().enumerate() {
            *slot = midi_note_to_freq(note as u8, a4_hz);
        }
        Self { frequencies }
    }

    #[inline]
    pub fn frequency(&self, note: u8) -> f64 {
        self.frequencies[note.min(127) as usize]
    }
}

impl Default for PitchTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a4_is_440() {
        assert!((midi_note_to_freq(69, 440.0) - 440.0).abs() < 1e-9);
        assert!((midi_note_to_freq(81, 440.0) - 880.0).abs() < 1e-9);
    }

    #[test]
    fn table_matches_formula() {
        let table = PitchTable::new();
        for note in [0u8, 21, 60, 69, 127] {
            assert!((table.frequency(note) - midi_note_to_freq(note, 440.0)).abs() < 1e-9);
        }
        assert_eq!(table.frequency(200), table.frequency(127));
    }

    #[test]
    fn retuned_table() {
        let table = PitchTable::with_reference(432.0);
        assert!((table.frequency(69) - 432.0).abs() < 1e-9);
    }

    #[test]
    fn velocity_scales_volume() {
        assert!((velocity_to_amplitude(127, 0.5) - 0.5).abs() < 1e-6);
        assert_eq!(velocity_to_amplitude(0, 1.0), 0.0);
    }
}
