// src/synth/voice_allocator.rs

use crate::pitch::midi_to_freq;

use super::SynthPreset;
use super::envelope::AdsrEnvelope;
use super::oscillator::Oscillator;

type SlotId = usize;

/// One sounding note: oscillator, envelope, and the remaining gate time.
#[derive(Debug, Clone)]
struct VoiceSlot {
    note: u8,
    velocity: f32,
    osc: Oscillator,
    env: AdsrEnvelope,
    /// Samples left before the gate closes on its own, if timed.
    gate_remaining: Option<u64>,
    /// Allocation stamp used to pick the oldest slot when stealing.
    started: u64,
}

impl VoiceSlot {
    fn new(preset: &SynthPreset, sample_rate: f32) -> Self {
        Self {
            note: 0,
            velocity: 0.0,
            osc: Oscillator::new(preset.waveform),
            env: AdsrEnvelope::new(preset.envelope, sample_rate),
            gate_remaining: None,
            started: 0,
        }
    }

    #[inline]
    fn is_active(&self) -> bool {
        !self.env.is_idle()
    }

    #[inline]
    fn gated(&self) -> bool {
        self.gate_remaining.is_some()
    }
}

/// Allocates and manages polyphonic note slots for one synth voice.
///
/// Responsibilities:
/// - map notes to slots
/// - close timed gates (attack-release triggers)
/// - steal the oldest slot when polyphony runs out
pub struct VoiceAllocator {
    slots: Vec<VoiceSlot>,
    sample_rate: f32,
    clock: u64,
}

impl VoiceAllocator {
    pub fn new(preset: &SynthPreset, sample_rate: f32, max_voices: usize) -> Self {
        let slots = (0..max_voices.max(1))
            .map(|_| VoiceSlot::new(preset, sample_rate))
            .collect();
        Self {
            slots,
            sample_rate,
            clock: 0,
        }
    }

    /// Start a note that releases itself after `hold_seconds`.
    pub fn note_on(&mut self, note: u8, velocity: f32, hold_seconds: f64) {
        let id = self.pick_slot();
        self.clock += 1;

        let hold = (hold_seconds.max(0.0) * self.sample_rate as f64).round() as u64;
        let slot = &mut self.slots[id];
        slot.note = note;
        slot.velocity = velocity.clamp(0.0, 1.0);
        slot.osc.start(midi_to_freq(note), self.sample_rate);
        slot.env.reset();
        slot.env.gate_on();
        slot.gate_remaining = Some(hold.max(1));
        slot.started = self.clock;
    }

    fn pick_slot(&self) -> SlotId {
        if let Some(idle) = self.slots.iter().position(|s| !s.is_active()) {
            return idle;
        }
        self.slots
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.started)
            .map(|(id, _)| id)
            .unwrap_or(0)
    }

    /// Move every sounding slot into its release stage.
    pub fn release_all(&mut self) {
        for slot in &mut self.slots {
            slot.gate_remaining = None;
            slot.env.gate_off();
        }
    }

    /// Add this allocator's output into `out`, scaled by `gain`.
    pub fn render_add(&mut self, out: &mut [f32], gain: f32) {
        for slot in self.slots.iter_mut().filter(|s| s.is_active()) {
            for sample in out.iter_mut() {
                if slot.gate_remaining == Some(0) {
                    slot.gate_remaining = None;
                    slot.env.gate_off();
                } else if let Some(remaining) = slot.gate_remaining.as_mut() {
                    *remaining -= 1;
                }

                let level = slot.env.next_level();
                *sample += slot.osc.next_sample() * level * slot.velocity * gain;

                if slot.env.is_idle() {
                    slot.gate_remaining = None;
                    break;
                }
            }
        }
    }

    /// Number of slots still producing sound.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_active()).count()
    }

    /// Notes of the slots whose gate is still open.
    pub fn held_notes(&self) -> Vec<u8> {
        self.slots
            .iter()
            .filter(|s| s.is_active() && s.gated())
            .map(|s| s.note)
            .collect()
    }
}
