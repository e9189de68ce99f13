// ADSR envelope generator.

use serde::{Deserialize, Serialize};

/// Envelope times in seconds, sustain as a 0-1 level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeShape {
    pub attack: f32,
    pub decay: f32,
    pub sustain: f32,
    pub release: f32,
}

impl EnvelopeShape {
    pub const fn new(attack: f32, decay: f32, sustain: f32, release: f32) -> Self {
        Self {
            attack,
            decay,
            sustain,
            release,
        }
    }

    pub fn is_valid(&self) -> bool {
        let times = [self.attack, self.decay, self.release];
        times.iter().all(|t| t.is_finite() && *t >= 0.0) && (0.0..=1.0).contains(&self.sustain)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EnvelopeStage {
    Idle,
    Attack,
    Decay,
    Sustain,
    Release,
}

#[derive(Debug, Clone)]
pub struct AdsrEnvelope {
    stage: EnvelopeStage,
    level: f32,
    shape: EnvelopeShape,
    sample_rate: f32,
    release_level: f32,
}

impl AdsrEnvelope {
    pub fn new(shape: EnvelopeShape, sample_rate: f32) -> Self {
        Self {
            stage: EnvelopeStage::Idle,
            level: 0.0,
            shape,
            sample_rate,
            release_level: 0.0,
        }
    }

    /// Start the attack stage. Retriggering keeps the current level.
    pub fn gate_on(&mut self) {
        if self.stage == EnvelopeStage::Idle {
            self.level = 0.0;
        }
        self.stage = EnvelopeStage::Attack;
    }

    /// Enter the release stage from wherever the envelope is.
    pub fn gate_off(&mut self) {
        if self.stage != EnvelopeStage::Idle && self.stage != EnvelopeStage::Release {
            self.release_level = self.level;
            self.stage = EnvelopeStage::Release;
        }
    }

    #[inline]
    pub fn is_idle(&self) -> bool {
        self.stage == EnvelopeStage::Idle
    }

    #[inline]
    pub fn next_level(&mut self) -> f32 {
        match self.stage {
            EnvelopeStage::Idle => 0.0,

            EnvelopeStage::Attack => {
                let rate = 1.0 / (self.shape.attack * self.sample_rate).max(1.0);
                self.level += rate;
                if self.level >= 1.0 {
                    self.level = 1.0;
                    self.stage = EnvelopeStage::Decay;
                }
                self.level
            }

            EnvelopeStage::Decay => {
                let sustain = self.shape.sustain;
                let rate = (1.0 - sustain) / (self.shape.decay * self.sample_rate).max(1.0);
                self.level -= rate;
                if self.level <= sustain {
                    self.level = sustain;
                    self.stage = EnvelopeStage::Sustain;
                }
                self.level
            }

            EnvelopeStage::Sustain => {
                // A zero sustain is a plucked sound: done once decay ends
                if self.shape.sustain <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
                self.level
            }

            EnvelopeStage::Release => {
                let rate = self.release_level / (self.shape.release * self.sample_rate).max(1.0);
                self.level -= rate;
                if self.level <= 0.0 {
                    self.level = 0.0;
                    self.stage = EnvelopeStage::Idle;
                }
                self.level
            }
        }
    }

    pub fn reset(&mut self) {
        self.stage = EnvelopeStage::Idle;
        self.level = 0.0;
        self.release_level = 0.0;
    }
}
