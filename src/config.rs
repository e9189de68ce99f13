// src/config.rs
//
// Engine and game-loop configuration.
//
// Both structs carry the game's tuning constants as defaults and can be
// overridden from JSON by the host. Missing fields fall back to defaults.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

// Default audio configuration
const DEFAULT_MAX_BLOCK: usize = 512;
const DEFAULT_MAX_VOICES: usize = 16;
const DEFAULT_BPM: f64 = 120.0;
const DEFAULT_PRIMER_FRAMES: usize = 1;

// Default torch tuning
const DEFAULT_DECAY_RATE: f64 = 0.05;
const DEFAULT_REFERENCE_FRAME_MS: f64 = 16.0;
const DEFAULT_REWARD_TORCH: f64 = 15.0;
const DEFAULT_PENALTY_TORCH: f64 = 20.0;
const DEFAULT_REWARD_CURRENCY: i64 = 10;

/// Configuration for the audio engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Maximum number of frames rendered per internal block.
    pub max_block_size: usize,

    /// Polyphony of each synth voice.
    pub max_voices: usize,

    /// Tempo used to resolve note values ("8n", "16n", ...) for cues.
    pub cue_bpm: f64,

    /// Length of the near-silent buffer used to force the device awake.
    pub primer_frames: usize,

    /// Track key -> resource locator.
    pub tracks: BTreeMap<String, String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let mut tracks = BTreeMap::new();
        tracks.insert("opening".to_string(), "/theme.mid".to_string());

        Self {
            max_block_size: DEFAULT_MAX_BLOCK,
            max_voices: DEFAULT_MAX_VOICES,
            cue_bpm: DEFAULT_BPM,
            primer_frames: DEFAULT_PRIMER_FRAMES,
            tracks,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration from JSON, filling gaps with defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_block_size == 0 {
            return Err(ConfigError::Invalid("max_block_size must be > 0".into()));
        }
        if self.max_voices == 0 {
            return Err(ConfigError::Invalid("max_voices must be > 0".into()));
        }
        if !(self.cue_bpm.is_finite() && self.cue_bpm > 0.0) {
            return Err(ConfigError::Invalid(format!("cue_bpm {}", self.cue_bpm)));
        }
        Ok(())
    }

    /// Resolve a track key to its resource locator.
    pub fn locator(&self, key: &str) -> Option<&str> {
        self.tracks.get(key).map(String::as_str)
    }
}

/// Configuration for the survival timer.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimerConfig {
    /// Torch lost per reference frame.
    pub decay_rate: f64,

    /// Frame interval the decay rate is expressed against (ms).
    pub reference_frame_ms: f64,

    /// Torch restored on a correct answer.
    pub reward_torch: f64,

    /// Torch lost on a wrong answer.
    pub penalty_torch: f64,

    /// Currency credited on a correct answer.
    pub reward_currency: i64,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            decay_rate: DEFAULT_DECAY_RATE,
            reference_frame_ms: DEFAULT_REFERENCE_FRAME_MS,
            reward_torch: DEFAULT_REWARD_TORCH,
            penalty_torch: DEFAULT_PENALTY_TORCH,
            reward_currency: DEFAULT_REWARD_CURRENCY,
        }
    }
}

impl TimerConfig {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        if !(config.reference_frame_ms.is_finite() && config.reference_frame_ms > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "reference_frame_ms {}",
                config.reference_frame_ms
            )));
        }
        Ok(config)
    }

    /// Torch lost over `elapsed_ms` of wall time.
    #[inline]
    pub fn decay_for(&self, elapsed_ms: f64) -> f64 {
        self.decay_rate * (elapsed_ms / self.reference_frame_ms)
    }
}
