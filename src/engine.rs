// src/engine.rs

use log::{debug, warn};

use crate::bgm::{BgmRequest, BgmScheduler, BgmStep, PlayOutcome};
use crate::config::EngineConfig;
use crate::device::{DeviceState, OutputDevice};
use crate::error::AudioResult;
use crate::lifecycle::{AudioContextManager, AudioReadiness};
use crate::sfx::{SfxDispatcher, SfxKind};
use crate::source::TrackSource;
use crate::transport::DueTrigger;

/// Game-facing audio engine.
///
/// Owns the output device, the synth voices, the BGM transport and the
/// cue dispatcher. All playback calls are fire-and-forget: failures are
/// logged and reported through return values, never raised.
///
/// The host drives time by calling [`AudioEngine::render`] from its audio
/// callback. Scheduled BGM notes fire only from inside `render`.
pub struct AudioEngine<D: OutputDevice> {
    config: EngineConfig,
    manager: AudioContextManager<D>,
    bgm: BgmScheduler,
    sfx: SfxDispatcher,

    /// Notes that came due in the current chunk
    due: Vec<DueTrigger>,

    /// Mono mix scratch, one chunk long
    mix: Vec<f32>,
}

impl<D: OutputDevice> AudioEngine<D> {
    pub fn new(config: EngineConfig, device: D) -> Self {
        let sample_rate = device.sample_rate();
        let block = config.max_block_size.max(1);
        Self {
            manager: AudioContextManager::new(device, config.max_voices, config.primer_frames),
            bgm: BgmScheduler::new(sample_rate),
            sfx: SfxDispatcher::new(config.cue_bpm),
            due: Vec::with_capacity(64),
            mix: vec![0.0; block],
            config,
        }
    }

    // Lifecycle

    /// Call from a user-gesture handler.
    pub fn unlock(&mut self) {
        self.manager.unlock();
    }

    pub fn initialize(&mut self) -> AudioReadiness {
        self.manager.initialize()
    }

    pub fn ensure_ready(&mut self) -> AudioReadiness {
        self.manager.ensure_ready()
    }

    pub fn is_ready(&self) -> bool {
        self.manager.is_ready()
    }

    pub fn readiness(&self) -> AudioReadiness {
        self.manager.readiness()
    }

    pub fn is_muted(&self) -> bool {
        self.manager.is_muted()
    }

    /// Mute gates new sounds and silences output. Nothing is torn down.
    pub fn set_muted(&mut self, muted: bool) {
        self.manager.set_muted(muted);
        debug!("[Fretgate] Muted: {}", muted);
    }

    /// Stop the music and drop the voices.
    pub fn shutdown(&mut self) {
        self.bgm.stop(&mut self.manager);
        self.manager.shutdown();
    }

    // One-shots

    pub fn play_se(&mut self, kind: SfxKind) -> bool {
        self.sfx.trigger(kind, &mut self.manager)
    }

    pub fn play_lead_note(&mut self, string: usize, fret: u8) -> bool {
        self.sfx.play_lead_note(string, fret, &mut self.manager)
    }

    // Background music

    /// First half of a BGM play. See [`BgmScheduler::request`].
    pub fn request_bgm(&mut self, key: &str) -> BgmStep {
        self.bgm.request(key, &mut self.manager, &self.config)
    }

    /// Second half of a BGM play. See [`BgmScheduler::deliver`].
    pub fn deliver_bgm(
        &mut self,
        request: BgmRequest,
        payload: AudioResult<Vec<u8>>,
    ) -> PlayOutcome {
        self.bgm.deliver(request, payload, &mut self.manager)
    }

    /// Fetch and play the track behind `key`, looping until stopped.
    ///
    /// Holding `&mut self` across the fetch rules out an overlapping play
    /// on the same engine. Hosts that cannot hold the borrow use
    /// [`request_bgm`](Self::request_bgm) and [`deliver_bgm`](Self::deliver_bgm).
    pub async fn play_bgm<S: TrackSource>(&mut self, key: &str, source: &S) -> PlayOutcome {
        match self.request_bgm(key) {
            BgmStep::Done(outcome) => outcome,
            BgmStep::Fetch(request) => {
                let payload = source.fetch(request.locator()).await;
                self.deliver_bgm(request, payload)
            }
        }
    }

    pub fn stop_bgm(&mut self) {
        self.bgm.stop(&mut self.manager);
    }

    pub fn active_track(&self) -> Option<&str> {
        self.bgm.active_key()
    }

    pub fn scheduled_count(&self) -> usize {
        self.bgm.transport().scheduled_count()
    }

    // Render path

    /// Render `frames` of interleaved stereo into `out`.
    ///
    /// Writes silence and leaves the transport where it is when the engine
    /// is not ready or the device is not running.
    pub fn render(&mut self, frames: usize, out: &mut [f32]) {
        let needed = frames * 2;
        if out.len() < needed {
            warn!(
                "[Fretgate] Output buffer too small ({} < {})",
                out.len(),
                needed
            );
            out.fill(0.0);
            return;
        }
        let out = &mut out[..needed];

        if !self.manager.is_ready() || self.manager.device().state() != DeviceState::Running {
            out.fill(0.0);
            return;
        }

        let block = self.mix.len();
        let mut done = 0;
        while done < frames {
            let chunk = (frames - done).min(block);
            self.render_chunk(chunk);

            let muted = self.manager.is_muted();
            let dst = &mut out[done * 2..(done + chunk) * 2];
            for (frame, sample) in dst.chunks_exact_mut(2).zip(&self.mix[..chunk]) {
                let s = if muted { 0.0 } else { sample.clamp(-1.0, 1.0) };
                frame[0] = s;
                frame[1] = s;
            }
            done += chunk;
        }
    }

    /// Mono mix of one chunk, split at every due note.
    fn render_chunk(&mut self, frames: usize) {
        let mix = &mut self.mix[..frames];
        mix.fill(0.0);

        self.due.clear();
        self.bgm.transport_mut().advance(frames, &mut self.due);

        let mut cursor = 0;
        for due in &self.due {
            let offset = due.offset.min(frames);
            if offset > cursor {
                if let Some(bank) = self.manager.bank_mut() {
                    bank.render_add(&mut mix[cursor..offset]);
                }
                cursor = offset;
            }
            BgmScheduler::fire(&due.trigger, &mut self.manager);
        }

        if cursor < frames {
            if let Some(bank) = self.manager.bank_mut() {
                bank.render_add(&mut mix[cursor..]);
            }
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn device(&self) -> &D {
        self.manager.device()
    }

    pub fn device_mut(&mut self) -> &mut D {
        self.manager.device_mut()
    }

    pub fn bgm(&self) -> &BgmScheduler {
        &self.bgm
    }

    pub fn manager(&self) -> &AudioContextManager<D> {
        &self.manager
    }
}
