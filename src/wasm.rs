//! WebAssembly bindings via wasm-bindgen for browser integration.
//!
//! This module is only compiled when the `web` feature is enabled.
//!
//! # Usage
//!
//! Build with wasm-pack:
//! ```bash
//! wasm-pack build --target web --features web
//! ```
//!
//! # JavaScript Example
//!
//! ```javascript
//! import init, { fretgate_init, FretgateAudio, FretgateTimer } from './fretgate.js';
//!
//! await init();
//! fretgate_init();
//!
//! const ctx = new AudioContext();
//! const device = {
//!   state: () => ctx.state,
//!   resume: () => { ctx.resume(); },
//!   playBuffer: (samples) => { /* copy into an AudioBuffer and start it */ },
//!   sampleRate: () => ctx.sampleRate,
//! };
//! const audio = new FretgateAudio(device);
//!
//! button.onclick = () => audio.initialize();      // inside the gesture
//!
//! const ticket = audio.request_bgm("opening");
//! if (ticket) {
//!   const res = await fetch(ticket.locator);
//!   res.ok ? audio.deliver_bgm(ticket, new Uint8Array(await res.arrayBuffer()))
//!          : audio.fail_bgm(ticket, `${res.status}`);
//! }
//!
//! // Frame loop
//! const timer = new FretgateTimer(localStorage.getItem("fretgate_save_v3"));
//! timer.start(performance.now());
//! const frame = (now) => { if (timer.tick(now)) requestAnimationFrame(frame); };
//! requestAnimationFrame(frame);
//! ```

use std::cell::Cell;
use std::rc::Rc;

use wasm_bindgen::prelude::*;

use crate::bgm::{BgmRequest, BgmStep};
use crate::config::{EngineConfig, TimerConfig};
use crate::device::{DeviceState, OutputDevice};
use crate::economy::{EconomyState, ItemUse, PlayerLedger};
use crate::engine::AudioEngine;
use crate::error::{AudioError, AudioResult};
use crate::sfx::SfxKind;
use crate::survival::{SurvivalTimer, TickOutcome, TimerState};

// ═══════════════════════════════════════════════════════════════════════════
// Initialization
// ═══════════════════════════════════════════════════════════════════════════

/// Initialize the wasm module. Call this once before using any other functions.
/// Sets up panic hooks and console logging.
#[wasm_bindgen]
pub fn fretgate_init() {
    console_error_panic_hook::set_once();
    console_log::init_with_level(log::Level::Debug).ok();
}

// ═══════════════════════════════════════════════════════════════════════════
// Host device
// ═══════════════════════════════════════════════════════════════════════════

#[wasm_bindgen]
extern "C" {
    /// Output device object supplied by the page, usually a thin wrapper
    /// around an `AudioContext`.
    pub type HostDevice;

    #[wasm_bindgen(method)]
    fn state(this: &HostDevice) -> String;

    #[wasm_bindgen(method, catch)]
    fn resume(this: &HostDevice) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = playBuffer)]
    fn play_buffer(this: &HostDevice, samples: &[f32]) -> Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = sampleRate)]
    fn sample_rate(this: &HostDevice) -> f64;
}

struct JsDevice(HostDevice);

fn platform_error(e: JsValue) -> AudioError {
    AudioError::PlatformUnavailable(e.as_string().unwrap_or_else(|| format!("{:?}", e)))
}

impl OutputDevice for JsDevice {
    fn state(&self) -> DeviceState {
        DeviceState::from_name(&self.0.state())
    }

    fn sample_rate(&self) -> f64 {
        self.0.sample_rate()
    }

    fn resume(&mut self) -> AudioResult<()> {
        self.0.resume().map_err(platform_error)
    }

    fn play_buffer(&mut self, samples: &[f32]) -> AudioResult<()> {
        self.0.play_buffer(samples).map_err(platform_error)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Audio
// ═══════════════════════════════════════════════════════════════════════════

/// A BGM play request waiting for the page to fetch its payload.
#[wasm_bindgen]
pub struct BgmTicket {
    inner: BgmRequest,
}

#[wasm_bindgen]
impl BgmTicket {
    #[wasm_bindgen(getter)]
    pub fn key(&self) -> String {
        self.inner.key().to_string()
    }

    #[wasm_bindgen(getter)]
    pub fn locator(&self) -> String {
        self.inner.locator().to_string()
    }
}

/// The audio engine, driven by the page's device object.
#[wasm_bindgen]
pub struct FretgateAudio {
    inner: AudioEngine<JsDevice>,
}

#[wasm_bindgen]
impl FretgateAudio {
    /// Create the engine. `config_json` overrides [`EngineConfig`] fields.
    #[wasm_bindgen(constructor)]
    pub fn new(device: HostDevice, config_json: Option<String>) -> Result<FretgateAudio, JsValue> {
        let config = match config_json {
            Some(json) => EngineConfig::from_json_str(&json)
                .map_err(|e| JsValue::from_str(&e.to_string()))?,
            None => EngineConfig::default(),
        };
        Ok(Self {
            inner: AudioEngine::new(config, JsDevice(device)),
        })
    }

    /// Call from a user-gesture handler.
    pub fn unlock(&mut self) {
        self.inner.unlock();
    }

    /// Call from a user-gesture handler. Returns true once ready.
    pub fn initialize(&mut self) -> bool {
        self.inner.initialize();
        self.inner.is_ready()
    }

    pub fn is_ready(&self) -> bool {
        self.inner.is_ready()
    }

    pub fn is_muted(&self) -> bool {
        self.inner.is_muted()
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.inner.set_muted(muted);
    }

    /// Play a named cue ("decision", "cancel", "coin", "damage", "clear").
    pub fn play_se(&mut self, name: &str) -> bool {
        match name.parse::<SfxKind>() {
            Ok(kind) => self.inner.play_se(kind),
            Err(e) => {
                log::warn!("[Fretgate] {}", e);
                false
            }
        }
    }

    pub fn play_lead_note(&mut self, string: u32, fret: u8) -> bool {
        self.inner.play_lead_note(string as usize, fret)
    }

    /// Start a BGM play. Returns a ticket when the page must fetch the
    /// track, or nothing when the request already resolved.
    pub fn request_bgm(&mut self, key: &str) -> Option<BgmTicket> {
        match self.inner.request_bgm(key) {
            BgmStep::Fetch(inner) => Some(BgmTicket { inner }),
            BgmStep::Done(outcome) => {
                log::debug!("[Fretgate] BGM '{}': {:?}", key, outcome);
                None
            }
        }
    }

    /// Hand over a fetched track. Returns true if it started playing.
    pub fn deliver_bgm(&mut self, ticket: BgmTicket, bytes: &[u8]) -> bool {
        self.inner
            .deliver_bgm(ticket.inner, Ok(bytes.to_vec()))
            .is_started()
    }

    /// Report a failed fetch.
    pub fn fail_bgm(&mut self, ticket: BgmTicket, reason: &str) {
        self.inner.deliver_bgm(
            ticket.inner,
            Err(AudioError::ResourceUnavailable(reason.to_string())),
        );
    }

    pub fn stop_bgm(&mut self) {
        self.inner.stop_bgm();
    }

    pub fn active_track(&self) -> Option<String> {
        self.inner.active_track().map(str::to_string)
    }

    /// Render audio frames to the provided output buffer (interleaved stereo).
    /// Output format: [L0, R0, L1, R1, L2, R2, ...]
    ///
    /// The output slice must have length >= frames * 2.
    pub fn render(&mut self, frames: u32, output: &mut [f32]) {
        self.inner.render(frames as usize, output);
    }

    pub fn shutdown(&mut self) {
        self.inner.shutdown();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// Survival timer
// ═══════════════════════════════════════════════════════════════════════════

/// Torch timer over the player's saved record.
#[wasm_bindgen]
pub struct FretgateTimer {
    timer: SurvivalTimer,
    ledger: PlayerLedger,
    burned_out: Rc<Cell<bool>>,
}

#[wasm_bindgen]
impl FretgateTimer {
    /// `save_json` is the stored [`crate::economy::SaveData`], if any.
    #[wasm_bindgen(constructor)]
    pub fn new(save_json: Option<String>, config_json: Option<String>) -> Result<FretgateTimer, JsValue> {
        let to_js = |e: crate::error::ConfigError| JsValue::from_str(&e.to_string());

        let ledger = match save_json {
            Some(json) => PlayerLedger::from_json(&json).map_err(to_js)?,
            None => PlayerLedger::default(),
        };
        let config = match config_json {
            Some(json) => TimerConfig::from_json_str(&json).map_err(to_js)?,
            None => TimerConfig::default(),
        };

        let burned_out = Rc::new(Cell::new(false));
        let flag = burned_out.clone();
        Ok(Self {
            timer: SurvivalTimer::new(config, move || flag.set(true)),
            ledger,
            burned_out,
        })
    }

    pub fn start(&mut self, now_ms: f64) {
        self.burned_out.set(false);
        self.timer.start(now_ms, &mut self.ledger);
    }

    /// Returns true while the page should keep requesting frames.
    pub fn tick(&mut self, now_ms: f64) -> bool {
        self.timer.tick(now_ms, &mut self.ledger) == TickOutcome::Continue
    }

    /// Whether the last session ended by burning out.
    pub fn burned_out(&self) -> bool {
        self.burned_out.get()
    }

    pub fn reward(&mut self) {
        let amount = self.timer.reward_amount();
        self.timer.reward(amount, &mut self.ledger);
    }

    pub fn penalty(&mut self) {
        let amount = self.timer.penalty_amount();
        self.timer.penalty(amount, &mut self.ledger);
    }

    /// Use an inventory item. Returns "healed", "not_owned", "not_needed"
    /// or "unusable".
    pub fn use_item(&mut self, item_id: u32) -> String {
        // Healing only applies to a running session
        let torch_full = self.timer.state() != TimerState::Running || self.timer.is_full();
        match self.ledger.consume_item(item_id, torch_full) {
            ItemUse::Healed { amount } => {
                self.timer.restore(amount, &mut self.ledger);
                "healed"
            }
            ItemUse::NotOwned => "not_owned",
            ItemUse::NotNeeded => "not_needed",
            ItemUse::Unusable => "unusable",
        }
        .to_string()
    }

    /// Leave the session without ending it.
    pub fn stop(&mut self) {
        self.timer.stop();
    }

    /// Record a death: half the coins are lost.
    pub fn die(&mut self) {
        self.ledger.die();
    }

    pub fn torch(&self) -> f64 {
        self.timer.torch()
    }

    pub fn max_torch(&self) -> f64 {
        self.ledger.max_torch()
    }

    pub fn coins(&self) -> f64 {
        self.ledger.coins() as f64
    }

    pub fn save_json(&self) -> Result<String, JsValue> {
        self.ledger
            .to_json()
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }
}
