// src/track.rs
//
// Background-music timelines parsed from Standard MIDI Files.

use std::collections::HashMap;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};

use crate::error::TrackError;

/// Tempo assumed until the file sets one (120 BPM).
const DEFAULT_USEC_PER_BEAT: u32 = 500_000;

/// One note of a track, in seconds from the track start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteEvent {
    pub pitch: u8,
    pub start: f64,
    pub duration: f64,
    /// Loudness, 0-1.
    pub velocity: f32,
}

impl NoteEvent {
    #[inline]
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }
}

/// Notes of one sub-voice (one MIDI track), ordered by start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Part {
    pub name: Option<String>,
    pub notes: Vec<NoteEvent>,
}

/// A parsed note timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub key: String,
    pub parts: Vec<Part>,
    /// End of the last note, in seconds.
    pub duration: f64,
}

impl Track {
    /// Parse a Standard MIDI File payload.
    pub fn parse(key: impl Into<String>, bytes: &[u8]) -> Result<Self, TrackError> {
        let smf = Smf::parse(bytes)?;
        Self::from_smf(key, &smf)
    }

    pub fn from_smf(key: impl Into<String>, smf: &Smf) -> Result<Self, TrackError> {
        let clock = TickClock::new(smf);

        let mut parts = Vec::new();
        for events in &smf.tracks {
            let part = collect_part(events, &clock);
            if !part.notes.is_empty() {
                parts.push(part);
            }
        }

        let duration = parts
            .iter()
            .flat_map(|p| p.notes.iter())
            .map(NoteEvent::end)
            .fold(0.0_f64, f64::max);

        if parts.is_empty() || duration <= 0.0 {
            return Err(TrackError::Empty);
        }

        Ok(Self {
            key: key.into(),
            parts,
            duration,
        })
    }

    pub fn note_count(&self) -> usize {
        self.parts.iter().map(|p| p.notes.len()).sum()
    }

    /// Iterate (part index, note) pairs.
    pub fn notes(&self) -> impl Iterator<Item = (usize, &NoteEvent)> + '_ {
        self.parts
            .iter()
            .enumerate()
            .flat_map(|(i, p)| p.notes.iter().map(move |n| (i, n)))
    }
}

fn collect_part(events: &[midly::TrackEvent], clock: &TickClock) -> Part {
    let mut name = None;
    let mut notes = Vec::new();
    // (channel, key) -> queue of (start tick, velocity)
    let mut open: HashMap<(u8, u8), Vec<(u64, u8)>> = HashMap::new();
    let mut tick: u64 = 0;

    let close = |notes: &mut Vec<NoteEvent>, pitch: u8, start: u64, end: u64, vel: u8| {
        let start_s = clock.seconds(start);
        notes.push(NoteEvent {
            pitch,
            start: start_s,
            duration: (clock.seconds(end) - start_s).max(0.0),
            velocity: vel as f32 / 127.0,
        });
    };

    for event in events {
        tick += event.delta.as_int() as u64;
        match event.kind {
            TrackEventKind::Midi { channel, message } => {
                let channel = channel.as_int();
                match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        open.entry((channel, key.as_int()))
                            .or_default()
                            .push((tick, vel.as_int()));
                    }
                    // NoteOn with zero velocity is a note off
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        if let Some(queue) = open.get_mut(&(channel, key.as_int())) {
                            if !queue.is_empty() {
                                let (start, vel) = queue.remove(0);
                                close(&mut notes, key.as_int(), start, tick, vel);
                            }
                        }
                    }
                    _ => {}
                }
            }
            TrackEventKind::Meta(MetaMessage::TrackName(raw)) => {
                name = Some(String::from_utf8_lossy(raw).into_owned());
            }
            _ => {}
        }
    }

    // Notes still held at the end of the track end there
    for ((_, pitch), queue) in open {
        for (start, vel) in queue {
            close(&mut notes, pitch, start, tick, vel);
        }
    }

    notes.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.pitch.cmp(&b.pitch)));
    Part { name, notes }
}

/// Converts absolute ticks to seconds using the file's tempo map.
struct TickClock {
    timing: ClockTiming,
    /// (absolute tick, seconds at that tick, microseconds per beat from there)
    segments: Vec<(u64, f64, u32)>,
}

enum ClockTiming {
    Metrical { ticks_per_beat: f64 },
    Timecode { ticks_per_second: f64 },
}

impl TickClock {
    fn new(smf: &Smf) -> Self {
        let timing = match smf.header.timing {
            Timing::Metrical(tpb) => ClockTiming::Metrical {
                ticks_per_beat: tpb.as_int().max(1) as f64,
            },
            Timing::Timecode(fps, subframe) => ClockTiming::Timecode {
                ticks_per_second: (fps.as_f32() as f64 * subframe as f64).max(1.0),
            },
        };

        // Tempo changes may live in any track (usually the first)
        let mut changes: Vec<(u64, u32)> = Vec::new();
        for events in &smf.tracks {
            let mut tick = 0u64;
            for event in events {
                tick += event.delta.as_int() as u64;
                if let TrackEventKind::Meta(MetaMessage::Tempo(t)) = event.kind {
                    changes.push((tick, t.as_int().max(1)));
                }
            }
        }
        changes.sort_by_key(|(tick, _)| *tick);

        let mut segments = vec![(0u64, 0.0f64, DEFAULT_USEC_PER_BEAT)];
        if let ClockTiming::Metrical { ticks_per_beat } = timing {
            for (tick, usec) in changes {
                let (last_tick, last_secs, last_usec) = segments[segments.len() - 1];
                let secs = last_secs
                    + (tick - last_tick) as f64 / ticks_per_beat * last_usec as f64 / 1e6;
                if tick == last_tick {
                    segments.pop();
                }
                segments.push((tick, secs, usec));
            }
        }

        Self { timing, segments }
    }

    fn seconds(&self, tick: u64) -> f64 {
        match self.timing {
            ClockTiming::Timecode { ticks_per_second } => tick as f64 / ticks_per_second,
            ClockTiming::Metrical { ticks_per_beat } => {
                let idx = self.segments.partition_point(|(t, _, _)| *t <= tick);
                let (seg_tick, seg_secs, usec) = self.segments[idx.saturating_sub(1)];
                seg_secs + (tick - seg_tick) as f64 / ticks_per_beat * usec as f64 / 1e6
            }
        }
    }
}
