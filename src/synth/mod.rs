// src/synth/mod.rs
//
// The synth bank: three fixed-preset polyphonic voices, one per sound
// category. Voices are rebuilt from scratch on every initialization attempt
// and never reconfigured in place.

mod envelope;
mod oscillator;
mod voice_allocator;

pub use envelope::EnvelopeShape;
pub use oscillator::Waveform;

use serde::{Deserialize, Serialize};

use crate::error::{AudioError, AudioResult};
use voice_allocator::VoiceAllocator;

/// Sound category a voice is dedicated to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceKind {
    Bgm,
    Sfx,
    Lead,
}

/// Timbre descriptor of a voice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynthPreset {
    pub waveform: Waveform,
    pub envelope: EnvelopeShape,
    /// Output gain in decibels.
    pub gain_db: f32,
}

impl SynthPreset {
    /// Soft triangle pad for background music.
    pub const BGM: SynthPreset = SynthPreset {
        waveform: Waveform::Triangle,
        envelope: EnvelopeShape::new(0.02, 0.1, 0.3, 1.0),
        gain_db: -12.0,
    };

    /// Chiptune square for interface cues.
    pub const SFX: SynthPreset = SynthPreset {
        waveform: Waveform::Square,
        envelope: EnvelopeShape::new(0.01, 0.1, 0.1, 1.0),
        gain_db: -8.0,
    };

    /// Plucked triangle for the lead instrument.
    pub const LEAD: SynthPreset = SynthPreset {
        waveform: Waveform::Triangle,
        envelope: EnvelopeShape::new(0.005, 0.3, 0.0, 1.2),
        gain_db: -5.0,
    };

    pub fn for_kind(kind: VoiceKind) -> Self {
        match kind {
            VoiceKind::Bgm => Self::BGM,
            VoiceKind::Sfx => Self::SFX,
            VoiceKind::Lead => Self::LEAD,
        }
    }

    #[inline]
    pub fn linear_gain(&self) -> f32 {
        10.0_f32.powf(self.gain_db / 20.0)
    }
}

/// A configured synthesizer instance dedicated to one sound category.
pub struct SynthVoice {
    kind: VoiceKind,
    preset: SynthPreset,
    gain: f32,
    voices: VoiceAllocator,
}

impl SynthVoice {
    pub fn new(
        kind: VoiceKind,
        preset: SynthPreset,
        sample_rate: f64,
        max_voices: usize,
    ) -> AudioResult<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(AudioError::PlatformUnavailable(format!(
                "cannot build {:?} voice at sample rate {}",
                kind, sample_rate
            )));
        }
        if !preset.envelope.is_valid() || !preset.gain_db.is_finite() {
            return Err(AudioError::PlatformUnavailable(format!(
                "invalid {:?} preset: {:?}",
                kind, preset
            )));
        }

        Ok(Self {
            kind,
            preset,
            gain: preset.linear_gain(),
            voices: VoiceAllocator::new(&preset, sample_rate as f32, max_voices),
        })
    }

    pub fn kind(&self) -> VoiceKind {
        self.kind
    }

    pub fn preset(&self) -> &SynthPreset {
        &self.preset
    }

    /// Start `notes` together and release them after `duration` seconds.
    pub fn trigger_attack_release(&mut self, notes: &[u8], duration: f64, velocity: f32) {
        for &note in notes {
            self.voices.note_on(note, velocity, duration);
        }
    }

    pub fn release_all(&mut self) {
        self.voices.release_all();
    }

    pub fn active_notes(&self) -> usize {
        self.voices.active_count()
    }

    pub fn held_notes(&self) -> Vec<u8> {
        self.voices.held_notes()
    }

    /// Mix this voice into `out`.
    pub fn render_add(&mut self, out: &mut [f32]) {
        self.voices.render_add(out, self.gain);
    }
}

/// Owns the three voices.
pub struct SynthBank {
    bgm: SynthVoice,
    sfx: SynthVoice,
    lead: SynthVoice,
}

impl SynthBank {
    /// Build all three voices with their fixed presets.
    pub fn new(sample_rate: f64, max_voices: usize) -> AudioResult<Self> {
        Ok(Self {
            bgm: SynthVoice::new(VoiceKind::Bgm, SynthPreset::BGM, sample_rate, max_voices)?,
            sfx: SynthVoice::new(VoiceKind::Sfx, SynthPreset::SFX, sample_rate, max_voices)?,
            lead: SynthVoice::new(VoiceKind::Lead, SynthPreset::LEAD, sample_rate, max_voices)?,
        })
    }

    pub fn voice(&self, kind: VoiceKind) -> &SynthVoice {
        match kind {
            VoiceKind::Bgm => &self.bgm,
            VoiceKind::Sfx => &self.sfx,
            VoiceKind::Lead => &self.lead,
        }
    }

    pub fn voice_mut(&mut self, kind: VoiceKind) -> &mut SynthVoice {
        match kind {
            VoiceKind::Bgm => &mut self.bgm,
            VoiceKind::Sfx => &mut self.sfx,
            VoiceKind::Lead => &mut self.lead,
        }
    }

    /// Mix every voice into `out`.
    pub fn render_add(&mut self, out: &mut [f32]) {
        self.bgm.render_add(out);
        self.sfx.render_add(out);
        self.lead.render_add(out);
    }

    pub fn active_notes(&self) -> usize {
        self.bgm.active_notes() + self.sfx.active_notes() + self.lead.active_notes()
    }
}
