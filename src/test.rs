// src/test.rs
//
// End-to-end scenarios across the engine, the timer and the ledger.

use crate::bgm::{BgmStep, PlayOutcome};
use crate::config::{EngineConfig, TimerConfig};
use crate::device::{DeviceState, OfflineDevice, OutputDevice};
use crate::economy::{EconomyState, ItemUse, PlayerLedger};
use crate::engine::AudioEngine;
use crate::lifecycle::AudioReadiness;
use crate::sfx::SfxKind;
use crate::source::MemoryTrackSource;
use crate::survival::{SurvivalTimer, TickOutcome, TimerState};
use crate::track::fixtures::{midi_bytes, theme};

use std::cell::Cell;
use std::rc::Rc;

const SAMPLE_RATE: f64 = 48_000.0;

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.tracks.insert("battle".into(), "/battle.mid".into());
    config
}

fn battle() -> Vec<u8> {
    midi_bytes(&[&[(0, 240, 45, 110), (240, 240, 52, 110)]])
}

fn source() -> MemoryTrackSource {
    MemoryTrackSource::new()
        .with("/theme.mid", theme())
        .with("/battle.mid", battle())
}

fn render(engine: &mut AudioEngine<OfflineDevice>, frames: usize) -> Vec<f32> {
    let mut out = vec![0.0; frames * 2];
    engine.render(frames, &mut out);
    out
}

fn peak(buf: &[f32]) -> f32 {
    buf.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

#[tokio::test]
async fn same_key_twice_schedules_once() {
    let mut engine = AudioEngine::new(config(), OfflineDevice::new(SAMPLE_RATE));
    let source = source();

    assert_eq!(
        engine.play_bgm("opening", &source).await,
        PlayOutcome::Started { notes: 4 }
    );
    let position = {
        render(&mut engine, 4800);
        engine.bgm().transport().sample_position()
    };

    assert_eq!(
        engine.play_bgm("opening", &source).await,
        PlayOutcome::AlreadyActive
    );
    assert_eq!(source.fetch_count(), 1);
    assert_eq!(engine.scheduled_count(), 4);
    // No restart
    assert_eq!(engine.bgm().transport().sample_position(), position);
}

#[tokio::test]
async fn switching_tracks_leaves_nothing_from_the_old_one() {
    let mut engine = AudioEngine::new(config(), OfflineDevice::new(SAMPLE_RATE));
    let source = source();

    assert!(engine.play_bgm("opening", &source).await.is_started());
    let old: Vec<_> = engine.bgm().session().scheduled_handles.clone();
    render(&mut engine, 2400);

    assert_eq!(
        engine.play_bgm("battle", &source).await,
        PlayOutcome::Started { notes: 2 }
    );
    assert_eq!(engine.active_track(), Some("battle"));
    assert_eq!(engine.scheduled_count(), 2);
    for handle in old {
        assert!(!engine.bgm().transport().is_scheduled(handle));
    }
    // Fresh timeline from the top
    assert_eq!(engine.bgm().transport().sample_position(), 0);
}

#[tokio::test]
async fn muted_engine_schedules_and_triggers_nothing() {
    let mut engine = AudioEngine::new(config(), OfflineDevice::new(SAMPLE_RATE));
    let source = source();
    engine.initialize();
    engine.set_muted(true);

    assert_eq!(engine.play_bgm("opening", &source).await, PlayOutcome::Muted);
    assert!(!engine.play_se(SfxKind::Decision));
    assert!(!engine.play_lead_note(3, 2));

    assert_eq!(source.fetch_count(), 0);
    assert_eq!(engine.scheduled_count(), 0);
    assert_eq!(engine.manager().bank().map(|b| b.active_notes()), Some(0));
    assert_eq!(peak(&render(&mut engine, 1024)), 0.0);
}

#[tokio::test]
async fn missing_key_is_quiet() {
    let mut engine = AudioEngine::new(config(), OfflineDevice::new(SAMPLE_RATE));
    let source = source();
    engine.initialize();

    assert_eq!(
        engine.play_bgm("missing-key", &source).await,
        PlayOutcome::Unavailable
    );
    assert!(engine.is_ready());
    assert_eq!(engine.active_track(), None);
    assert_eq!(source.fetch_count(), 0);
}

#[tokio::test]
async fn failed_play_retries_from_scratch() {
    let mut engine = AudioEngine::new(config(), OfflineDevice::new(SAMPLE_RATE));
    let mut source = MemoryTrackSource::new();

    assert_eq!(
        engine.play_bgm("opening", &source).await,
        PlayOutcome::FetchFailed
    );
    assert_eq!(engine.active_track(), None);

    source.insert("/theme.mid", theme());
    assert!(engine.play_bgm("opening", &source).await.is_started());
    assert_eq!(source.fetch_count(), 2);
}

#[test]
fn stop_is_idempotent_and_silences_the_timeline() {
    let mut engine = AudioEngine::new(config(), OfflineDevice::new(SAMPLE_RATE));
    engine.stop_bgm();

    let BgmStep::Fetch(request) = engine.request_bgm("opening") else {
        panic!("expected fetch");
    };
    assert!(engine.deliver_bgm(request, Ok(theme())).is_started());
    render(&mut engine, 4800);

    engine.stop_bgm();
    engine.stop_bgm();
    assert_eq!(engine.scheduled_count(), 0);
    assert_eq!(engine.active_track(), None);

    // Let the release tails die away, then nothing else sounds
    render(&mut engine, 96_000);
    assert_eq!(peak(&render(&mut engine, 4800)), 0.0);
}

#[test]
fn looping_track_keeps_playing_past_its_end() {
    let mut engine = AudioEngine::new(config(), OfflineDevice::new(SAMPLE_RATE));
    let BgmStep::Fetch(request) = engine.request_bgm("opening") else {
        panic!("expected fetch");
    };
    engine.deliver_bgm(request, Ok(theme()));

    // Two seconds per lap; render past the first lap
    render(&mut engine, 96_000);
    let second_lap = render(&mut engine, 4800);
    assert!(peak(&second_lap) > 0.0);
    assert_eq!(engine.bgm().transport().sample_position(), 4800);
}

#[test]
fn ignored_resume_still_reaches_ready_through_primer() {
    let device = OfflineDevice::new(SAMPLE_RATE).ignoring_resume();
    let mut engine = AudioEngine::new(config(), device);

    assert_eq!(engine.initialize(), AudioReadiness::Ready);
    assert_eq!(engine.device().state(), DeviceState::Running);
    assert_eq!(engine.device().buffers_played(), 1);
    assert!(engine.play_se(SfxKind::Clear));
}

#[test]
fn session_with_answers_and_items() {
    let fired = Rc::new(Cell::new(0));
    let counter = fired.clone();
    let mut timer = SurvivalTimer::new(TimerConfig::default(), move || {
        counter.set(counter.get() + 1)
    });
    let mut ledger = PlayerLedger::default();
    let mut engine = AudioEngine::new(config(), OfflineDevice::new(SAMPLE_RATE));
    engine.initialize();

    // --------------------------------
    // Start a run
    // --------------------------------
    timer.start(0.0, &mut ledger);
    assert_eq!(timer.state(), TimerState::Running);

    // --------------------------------
    // Wrong answer, then an item
    // --------------------------------
    timer.penalty(timer.penalty_amount(), &mut ledger);
    assert!(engine.play_se(SfxKind::Damage));
    assert_eq!(ledger.current_torch(), 80.0);

    ledger.obtain(1);
    match ledger.consume_item(1, timer.is_full()) {
        ItemUse::Healed { amount } => timer.restore(amount, &mut ledger),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(timer.torch(), 100.0);

    // --------------------------------
    // Right answer
    // --------------------------------
    timer.reward(timer.reward_amount(), &mut ledger);
    assert!(engine.play_se(SfxKind::Coin));
    assert_eq!(ledger.coins(), 1010);

    // --------------------------------
    // Burn out
    // --------------------------------
    let mut now = 0.0;
    while timer.tick(now, &mut ledger) == TickOutcome::Continue {
        now += 16.0;
        assert!((0.0..=100.0).contains(&timer.torch()));
    }
    assert_eq!(timer.state(), TimerState::Ended);
    assert_eq!(fired.get(), 1);
    assert_eq!(ledger.current_torch(), 0.0);

    ledger.die();
    assert_eq!(ledger.coins(), 505);
}
