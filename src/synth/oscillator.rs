// Basic naive oscillators.

use std::f32::consts::TAU;

use serde::{Deserialize, Serialize};

const PHASE_START: f32 = 0.0;

/// Oscillator shape of a synth voice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Waveform {
    Sine,
    Triangle,
    Square,
    Sawtooth,
}

/// Phase-accumulating oscillator (naive, non-bandlimited).
#[derive(Debug, Clone)]
pub struct Oscillator {
    waveform: Waveform,
    phase: f32,
    inc: f32,
}

impl Oscillator {
    pub fn new(waveform: Waveform) -> Self {
        Self {
            waveform,
            phase: PHASE_START,
            inc: 0.0,
        }
    }

    /// Retune and restart the cycle.
    #[inline]
    pub fn start(&mut self, freq: f32, sample_rate: f32) {
        self.phase = PHASE_START;
        self.inc = freq / sample_rate;
    }

    #[inline]
    pub fn next_sample(&mut self) -> f32 {
        let p = self.phase;
        let sample = match self.waveform {
            Waveform::Sine => (p * TAU).sin(),
            Waveform::Triangle => {
                if p < 0.5 {
                    4.0 * p - 1.0
                } else {
                    3.0 - 4.0 * p
                }
            }
            Waveform::Square => {
                if p < 0.5 {
                    1.0
                } else {
                    -1.0
                }
            }
            Waveform::Sawtooth => 2.0 * p - 1.0,
        };
        self.phase = (self.phase + self.inc).fract();
        sample
    }
}
