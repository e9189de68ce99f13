// src/lib.rs
//
// Library entry point: audio engine and survival loop for the game host.

pub mod bgm;
pub mod config;
pub mod device;
pub mod economy;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod pitch;
pub mod sfx;
pub mod source;
pub mod survival;
pub mod synth;
pub mod track;
pub mod transport;

#[cfg(feature = "web")]
mod wasm;

#[cfg(test)]
mod test;

// Re-export key types for Rust consumers
pub use bgm::{BgmRequest, BgmStep, PlayOutcome};
pub use config::{EngineConfig, TimerConfig};
pub use device::{DeviceState, OfflineDevice, OutputDevice};
pub use economy::{Difficulty, EconomyState, ItemUse, PlayerLedger, SaveData};
pub use engine::AudioEngine;
pub use error::{AudioError, AudioResult, ConfigError, TrackError};
pub use lifecycle::AudioReadiness;
pub use sfx::SfxKind;
pub use source::{MemoryTrackSource, TrackSource};
pub use survival::{SurvivalTimer, TickOutcome, TimerState};
pub use track::Track;

#[cfg(feature = "http")]
pub use source::HttpTrackSource;
