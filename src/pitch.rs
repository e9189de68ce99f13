// src/pitch.rs
//
// Pitch and duration helpers shared by the synth, the cue tables and the
// lead instrument.

/// Frequency in Hz of a MIDI note number (A4 = 69 = 440 Hz).
#[inline]
pub fn midi_to_freq(note: u8) -> f32 {
    440.0 * 2.0_f32.powf((note as f32 - 69.0) / 12.0)
}

/// Parse a scientific pitch name ("C6", "F#2", "Bb3") into a MIDI note number.
///
/// Octave numbering puts middle C at C4 = 60.
pub fn note_from_name(name: &str) -> Option<u8> {
    let mut chars = name.chars();
    let letter = chars.next()?.to_ascii_uppercase();
    let base: i32 = match letter {
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
    let (accidental, octave) = match rest.chars().next() {
        Some('#') => (1, &rest[1..]),
        Some('b') => (-1, &rest[1..]),
        _ => (0, rest),
    };

    let octave: i32 = octave.parse().ok()?;
    let note = (octave + 1) * 12 + base + accidental;
    u8::try_from(note).ok().filter(|n| *n <= 127)
}

/// Musical note values, resolved to seconds at a given tempo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteValue {
    Quarter,
    Eighth,
    Sixteenth,
    ThirtySecond,
}

impl NoteValue {
    pub fn seconds(self, bpm: f64) -> f64 {
        let quarter = 60.0 / bpm;
        match self {
            NoteValue::Quarter => quarter,
            NoteValue::Eighth => quarter / 2.0,
            NoteValue::Sixteenth => quarter / 4.0,
            NoteValue::ThirtySecond => quarter / 8.0,
        }
    }
}
