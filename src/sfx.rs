// src/sfx.rs
//
// One-shot interface cues and lead-instrument notes.
//
// These fire immediately on their voice; they never go through the
// transport.

use std::fmt;
use std::str::FromStr;

use log::{debug, warn};

use crate::device::OutputDevice;
use crate::lifecycle::AudioContextManager;
use crate::pitch::{NoteValue, note_from_name};
use crate::synth::VoiceKind;

/// MIDI notes of the open strings, indexed by string number (1 = high E).
const OPEN_STRINGS: [u8; 7] = [0, 64, 59, 55, 50, 45, 40];

/// Cue velocity; the SFX preset gain sets the actual loudness.
const CUE_VELOCITY: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SfxKind {
    Decision,
    Cancel,
    Coin,
    Damage,
    Clear,
}

impl SfxKind {
    pub const ALL: [SfxKind; 5] = [
        SfxKind::Decision,
        SfxKind::Cancel,
        SfxKind::Coin,
        SfxKind::Damage,
        SfxKind::Clear,
    ];

    /// Pitches and length of the cue.
    pub fn cue(self) -> (&'static [&'static str], NoteValue) {
        match self {
            SfxKind::Decision => (&["C6"], NoteValue::ThirtySecond),
            SfxKind::Cancel => (&["G4"], NoteValue::ThirtySecond),
            SfxKind::Coin => (&["B5", "E6"], NoteValue::Sixteenth),
            SfxKind::Damage => (&["C2", "F#2"], NoteValue::Eighth),
            SfxKind::Clear => (&["C5", "E5", "G5", "C6"], NoteValue::Eighth),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            SfxKind::Decision => "decision",
            SfxKind::Cancel => "cancel",
            SfxKind::Coin => "coin",
            SfxKind::Damage => "damage",
            SfxKind::Clear => "clear",
        }
    }
}

impl fmt::Display for SfxKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SfxKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SfxKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown sound effect '{}'", s))
    }
}

/// Fires cues against the synth bank.
#[derive(Debug, Clone, Copy)]
pub struct SfxDispatcher {
    bpm: f64,
}

impl SfxDispatcher {
    pub fn new(bpm: f64) -> Self {
        Self { bpm }
    }

    /// Play a cue now. Returns whether anything sounded.
    pub fn trigger<D: OutputDevice>(
        &self,
        kind: SfxKind,
        manager: &mut AudioContextManager<D>,
    ) -> bool {
        if !manager.can_play() {
            return false;
        }

        let (names, value) = kind.cue();
        let mut notes = Vec::with_capacity(names.len());
        for name in names {
            match note_from_name(name) {
                Some(note) => notes.push(note),
                None => warn!("[Fretgate] SFX {} has bad pitch {}", kind, name),
            }
        }

        match manager.bank_mut() {
            Some(bank) => {
                bank.voice_mut(VoiceKind::Sfx).trigger_attack_release(
                    &notes,
                    value.seconds(self.bpm),
                    CUE_VELOCITY,
                );
                !notes.is_empty()
            }
            None => false,
        }
    }

    /// Play a fretted note on the lead voice. Strings are numbered 1..=6.
    pub fn play_lead_note<D: OutputDevice>(
        &self,
        string: usize,
        fret: u8,
        manager: &mut AudioContextManager<D>,
    ) -> bool {
        if !manager.can_play() {
            return false;
        }

        let Some(note) = lead_pitch(string, fret) else {
            debug!("[Fretgate] No lead note for string {} fret {}", string, fret);
            return false;
        };

        match manager.bank_mut() {
            Some(bank) => {
                bank.voice_mut(VoiceKind::Lead).trigger_attack_release(
                    &[note],
                    NoteValue::Eighth.seconds(self.bpm),
                    CUE_VELOCITY,
                );
                true
            }
            None => false,
        }
    }
}

/// MIDI note of a fretted string, if it exists.
pub fn lead_pitch(string: usize, fret: u8) -> Option<u8> {
    if !(1..OPEN_STRINGS.len()).contains(&string) {
        return None;
    }
    OPEN_STRINGS[string].checked_add(fret).filter(|n| *n <= 127)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::OfflineDevice;

    fn ready_manager() -> AudioContextManager<OfflineDevice> {
        let mut manager = AudioContextManager::new(OfflineDevice::new(48_000.0), 8, 1);
        manager.initialize();
        manager
    }

    fn sfx_notes(manager: &AudioContextManager<OfflineDevice>) -> Vec<u8> {
        let mut notes = manager
            .bank()
            .map(|b| b.voice(VoiceKind::Sfx).held_notes())
            .unwrap_or_default();
        notes.sort();
        notes
    }

    #[test]
    fn test_cue_table() {
        let dispatcher = SfxDispatcher::new(120.0);
        let expected: [(SfxKind, Vec<u8>); 5] = [
            (SfxKind::Decision, vec![84]),
            (SfxKind::Cancel, vec![67]),
            (SfxKind::Coin, vec![83, 88]),
            (SfxKind::Damage, vec![36, 42]),
            (SfxKind::Clear, vec![72, 76, 79, 84]),
        ];
        for (kind, notes) in expected {
            let mut manager = ready_manager();
            assert!(dispatcher.trigger(kind, &mut manager));
            assert_eq!(sfx_notes(&manager), notes, "{}", kind);
        }
    }

    #[test]
    fn test_not_ready_is_noop() {
        let dispatcher = SfxDispatcher::new(120.0);
        let mut manager = AudioContextManager::new(OfflineDevice::new(48_000.0), 8, 1);
        assert!(!dispatcher.trigger(SfxKind::Coin, &mut manager));
        assert!(!manager.is_ready());
    }

    #[test]
    fn test_muted_is_noop() {
        let dispatcher = SfxDispatcher::new(120.0);
        let mut manager = ready_manager();
        manager.set_muted(true);
        assert!(!dispatcher.trigger(SfxKind::Clear, &mut manager));
        assert!(!dispatcher.play_lead_note(1, 0, &mut manager));
        assert_eq!(manager.bank().map(|b| b.active_notes()), Some(0));
    }

    #[test]
    fn test_lead_notes() {
        assert_eq!(lead_pitch(1, 0), Some(64));
        assert_eq!(lead_pitch(6, 3), Some(43));
        assert_eq!(lead_pitch(0, 0), None);
        assert_eq!(lead_pitch(7, 0), None);

        let dispatcher = SfxDispatcher::new(120.0);
        let mut manager = ready_manager();
        assert!(dispatcher.play_lead_note(2, 1, &mut manager));
        assert_eq!(
            manager.bank().map(|b| b.voice(VoiceKind::Lead).held_notes()),
            Some(vec![60])
        );
    }

    #[test]
    fn test_parse_kind() {
        assert_eq!("coin".parse::<SfxKind>(), Ok(SfxKind::Coin));
        assert!("explosion".parse::<SfxKind>().is_err());
        assert_eq!(SfxKind::Damage.to_string(), "damage");
    }
}
