// src/bgm.rs
//
// Background-music scheduling.
//
// A play request runs in two halves around the fetch:
//
//   request(key)  -> gates, stop, ensure ready, resolve locator
//   deliver(data) -> parse, schedule every note, loop, start
//
// The generation number of the pending request acts as the mutex between
// overlapping requests: only the most recent one may schedule anything, and
// `stop()` revokes it.

use log::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::device::OutputDevice;
use crate::error::{AudioError, AudioResult};
use crate::lifecycle::AudioContextManager;
use crate::synth::VoiceKind;
use crate::track::Track;
use crate::transport::{NoteTrigger, ScheduleHandle, Transport};

/// How a play request ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayOutcome {
    /// The track is scheduled and the transport is running.
    Started { notes: usize },
    Muted,
    /// The key is already playing or being fetched.
    AlreadyActive,
    /// No locator for the key.
    Unavailable,
    /// Voices were not available when scheduling.
    NotReady,
    FetchFailed,
    ParseFailed,
    /// Superseded by a newer request or a stop while the fetch was in flight.
    Stale,
}

impl PlayOutcome {
    pub fn is_started(&self) -> bool {
        matches!(self, PlayOutcome::Started { .. })
    }
}

/// A play request waiting for its payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BgmRequest {
    key: String,
    locator: String,
    generation: u64,
}

impl BgmRequest {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

/// First half of a play request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BgmStep {
    /// Fetch `locator` and hand the result to `deliver`.
    Fetch(BgmRequest),
    /// Nothing to fetch; the request is already resolved.
    Done(PlayOutcome),
}

/// The currently scheduled track.
#[derive(Debug, Default)]
pub struct PlaybackSession {
    pub active_key: Option<String>,
    pub scheduled_handles: Vec<ScheduleHandle>,
    pub looping: bool,
}

pub struct BgmScheduler {
    session: PlaybackSession,
    /// Key and generation of the request whose fetch is in flight
    pending: Option<(String, u64)>,
    generation: u64,
    transport: Transport,
}

impl BgmScheduler {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            session: PlaybackSession::default(),
            pending: None,
            generation: 0,
            transport: Transport::new(sample_rate),
        }
    }

    /// Gate, stop, ready and resolve a play request.
    pub fn request<D: OutputDevice>(
        &mut self,
        key: &str,
        manager: &mut AudioContextManager<D>,
        config: &EngineConfig,
    ) -> BgmStep {
        if manager.is_muted() {
            return BgmStep::Done(PlayOutcome::Muted);
        }
        if self.session.active_key.as_deref() == Some(key)
            || self.pending.as_ref().is_some_and(|(k, _)| k == key)
        {
            return BgmStep::Done(PlayOutcome::AlreadyActive);
        }

        // The old timeline must be gone before anything new is scheduled
        self.stop(manager);
        manager.ensure_ready();

        let Some(locator) = config.locator(key) else {
            debug!("[Fretgate] No track for key '{}'", key);
            return BgmStep::Done(PlayOutcome::Unavailable);
        };

        self.generation += 1;
        self.pending = Some((key.to_string(), self.generation));
        BgmStep::Fetch(BgmRequest {
            key: key.to_string(),
            locator: locator.to_string(),
            generation: self.generation,
        })
    }

    /// Finish a play request with its fetched payload.
    pub fn deliver<D: OutputDevice>(
        &mut self,
        request: BgmRequest,
        payload: AudioResult<Vec<u8>>,
        manager: &mut AudioContextManager<D>,
    ) -> PlayOutcome {
        if self.pending.as_ref().map(|(_, g)| *g) != Some(request.generation) {
            debug!("[Fretgate] Dropping stale payload for '{}'", request.key);
            return PlayOutcome::Stale;
        }
        self.pending = None;

        if manager.is_muted() {
            return PlayOutcome::Muted;
        }

        let bytes = match payload {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("[Fretgate] BGM '{}' not loaded: {}", request.key, e);
                return PlayOutcome::FetchFailed;
            }
        };

        match Track::parse(request.key.as_str(), &bytes) {
            Ok(track) => self.schedule_track(track, manager),
            Err(e) => {
                error!("[Fretgate] BGM play error: {}", AudioError::from(e));
                PlayOutcome::ParseFailed
            }
        }
    }

    /// Register every note of `track` on the transport and start looping.
    pub fn schedule_track<D: OutputDevice>(
        &mut self,
        track: Track,
        manager: &mut AudioContextManager<D>,
    ) -> PlayOutcome {
        if manager.bank().is_none() {
            warn!("[Fretgate] BGM voice unavailable, '{}' not scheduled", track.key);
            return PlayOutcome::NotReady;
        }

        self.transport.stop();
        self.transport.cancel_all();
        self.session.scheduled_handles.clear();

        for (part, note) in track.notes() {
            let handle = self.transport.schedule(
                note.start,
                NoteTrigger {
                    part,
                    pitch: note.pitch,
                    duration: note.duration,
                    velocity: note.velocity,
                },
            );
            self.session.scheduled_handles.push(handle);
        }

        self.transport.set_loop(track.duration);
        self.session.looping = true;
        self.transport.start();

        let notes = self.session.scheduled_handles.len();
        info!(
            "[Fretgate] BGM '{}' started ({} notes, {:.2}s loop)",
            track.key, notes, track.duration
        );
        self.session.active_key = Some(track.key);
        PlayOutcome::Started { notes }
    }

    /// Halt playback and revoke everything scheduled or pending.
    pub fn stop<D: OutputDevice>(&mut self, manager: &mut AudioContextManager<D>) {
        self.transport.stop();
        self.transport.cancel_all();
        self.session.scheduled_handles.clear();
        self.transport.clear_loop();

        if let Some(bank) = manager.bank_mut() {
            bank.voice_mut(VoiceKind::Bgm).release_all();
        }

        self.pending = None;
        self.session.looping = false;
        if let Some(key) = self.session.active_key.take() {
            debug!("[Fretgate] BGM '{}' stopped", key);
        }
    }

    /// Play one due note on the BGM voice, if it is still alive.
    pub fn fire<D: OutputDevice>(trigger: &NoteTrigger, manager: &mut AudioContextManager<D>) {
        if !manager.can_play() {
            return;
        }
        if let Some(bank) = manager.bank_mut() {
            bank.voice_mut(VoiceKind::Bgm).trigger_attack_release(
                &[trigger.pitch],
                trigger.duration,
                trigger.velocity,
            );
        }
    }

    pub fn active_key(&self) -> Option<&str> {
        self.session.active_key.as_deref()
    }

    pub fn pending_key(&self) -> Option<&str> {
        self.pending.as_ref().map(|(k, _)| k.as_str())
    }

    pub fn session(&self) -> &PlaybackSession {
        &self.session
    }

    pub fn transport(&self) -> &Transport {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut Transport {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::OfflineDevice;
    use crate::track::fixtures::theme;

    fn setup() -> (BgmScheduler, AudioContextManager<OfflineDevice>, EngineConfig) {
        let manager = AudioContextManager::new(OfflineDevice::new(48_000.0), 8, 1);
        (BgmScheduler::new(48_000.0), manager, EngineConfig::default())
    }

    fn fetch(step: BgmStep) -> BgmRequest {
        match step {
            BgmStep::Fetch(request) => request,
            BgmStep::Done(outcome) => panic!("expected fetch, got {:?}", outcome),
        }
    }

    #[test]
    fn test_request_then_deliver_starts_track() {
        let (mut bgm, mut manager, config) = setup();
        let request = fetch(bgm.request("opening", &mut manager, &config));
        assert_eq!(request.locator(), "/theme.mid");
        assert_eq!(bgm.pending_key(), Some("opening"));
        assert!(manager.is_ready());

        let outcome = bgm.deliver(request, Ok(theme()), &mut manager);
        assert_eq!(outcome, PlayOutcome::Started { notes: 4 });
        assert_eq!(bgm.active_key(), Some("opening"));
        assert_eq!(bgm.transport().scheduled_count(), 4);
        assert!(bgm.transport().is_playing());
        assert_eq!(bgm.transport().loop_end_seconds(), Some(2.0));
        assert!(bgm.session().looping);
    }

    #[test]
    fn test_same_key_while_pending_is_noop() {
        let (mut bgm, mut manager, config) = setup();
        let _first = fetch(bgm.request("opening", &mut manager, &config));
        assert_eq!(
            bgm.request("opening", &mut manager, &config),
            BgmStep::Done(PlayOutcome::AlreadyActive)
        );
    }

    #[test]
    fn test_superseded_delivery_is_stale() {
        let (mut bgm, mut manager, mut config) = setup();
        config.tracks.insert("battle".into(), "/battle.mid".into());

        let first = fetch(bgm.request("opening", &mut manager, &config));
        let second = fetch(bgm.request("battle", &mut manager, &config));

        assert_eq!(bgm.deliver(first, Ok(theme()), &mut manager), PlayOutcome::Stale);
        assert_eq!(bgm.transport().scheduled_count(), 0);
        assert!(bgm.deliver(second, Ok(theme()), &mut manager).is_started());
        assert_eq!(bgm.active_key(), Some("battle"));
    }

    #[test]
    fn test_stop_revokes_pending_request() {
        let (mut bgm, mut manager, config) = setup();
        let request = fetch(bgm.request("opening", &mut manager, &config));
        bgm.stop(&mut manager);
        assert_eq!(bgm.deliver(request, Ok(theme()), &mut manager), PlayOutcome::Stale);
        assert_eq!(bgm.active_key(), None);
    }

    #[test]
    fn test_fetch_and_parse_failures_leave_no_session() {
        let (mut bgm, mut manager, config) = setup();
        let request = fetch(bgm.request("opening", &mut manager, &config));
        let outcome = bgm.deliver(
            request,
            Err(AudioError::ResourceUnavailable("404".into())),
            &mut manager,
        );
        assert_eq!(outcome, PlayOutcome::FetchFailed);
        assert_eq!(bgm.active_key(), None);

        let request = fetch(bgm.request("opening", &mut manager, &config));
        let outcome = bgm.deliver(request, Ok(b"garbage".to_vec()), &mut manager);
        assert_eq!(outcome, PlayOutcome::ParseFailed);
        assert_eq!(bgm.active_key(), None);
        assert_eq!(bgm.transport().scheduled_count(), 0);
    }

    #[test]
    fn test_not_ready_when_voices_missing() {
        let (mut bgm, mut manager, config) = setup();
        let request = fetch(bgm.request("opening", &mut manager, &config));
        manager.shutdown();
        assert_eq!(bgm.deliver(request, Ok(theme()), &mut manager), PlayOutcome::NotReady);
        assert_eq!(bgm.transport().scheduled_count(), 0);
    }

    #[test]
    fn test_muted_request_does_nothing() {
        let (mut bgm, mut manager, config) = setup();
        manager.set_muted(true);
        assert_eq!(
            bgm.request("opening", &mut manager, &config),
            BgmStep::Done(PlayOutcome::Muted)
        );
        assert!(!manager.is_ready());
        assert_eq!(bgm.pending_key(), None);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut bgm, mut manager, _) = setup();
        bgm.stop(&mut manager);
        bgm.stop(&mut manager);
        assert_eq!(bgm.active_key(), None);
        assert!(!bgm.transport().is_playing());
    }

    #[test]
    fn test_stop_clears_playing_track() {
        let (mut bgm, mut manager, config) = setup();
        let request = fetch(bgm.request("opening", &mut manager, &config));
        bgm.deliver(request, Ok(theme()), &mut manager);
        let handles = bgm.session().scheduled_handles.clone();
        assert_eq!(handles.len(), 4);

        bgm.stop(&mut manager);
        assert!(bgm.session().scheduled_handles.is_empty());
        assert_eq!(bgm.transport().scheduled_count(), 0);
        assert!(handles.iter().all(|h| !bgm.transport().is_scheduled(*h)));
        assert_eq!(bgm.transport().loop_end_seconds(), None);
        assert!(!bgm.session().looping);
    }

    #[test]
    fn test_fire_skips_dead_voice() {
        let (_, mut manager, _) = setup();
        let trigger = NoteTrigger {
            part: 0,
            pitch: 60,
            duration: 0.5,
            velocity: 0.8,
        };
        // Not initialized: nothing to play on
        BgmScheduler::fire(&trigger, &mut manager);
        assert!(manager.bank().is_none());

        manager.initialize();
        BgmScheduler::fire(&trigger, &mut manager);
        assert_eq!(manager.bank().map(|b| b.voice(VoiceKind::Bgm).active_notes()), Some(1));
    }
}
