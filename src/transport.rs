// src/transport.rs
//
// The shared scheduling clock for background music.
//
// The transport runs in the sample domain and is advanced only by the
// render path, i.e. by the audio device's clock. It never looks at the
// frame clock that drives the game loop.

/// Identifies one scheduled callback so it can be revoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScheduleHandle(u64);

/// What a scheduled callback does when it fires: play one note on the
/// BGM voice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteTrigger {
    pub part: usize,
    pub pitch: u8,
    pub duration: f64,
    pub velocity: f32,
}

#[derive(Debug, Clone)]
struct Scheduled {
    handle: ScheduleHandle,
    at_sample: u64,
    trigger: NoteTrigger,
}

/// A callback that came due during [`Transport::advance`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DueTrigger {
    /// Frame offset inside the advanced block.
    pub offset: usize,
    pub handle: ScheduleHandle,
    pub trigger: NoteTrigger,
}

/// Sample-domain transport with cancellable callbacks and looping.
#[derive(Debug)]
pub struct Transport {
    sample_rate: f64,

    /// Position in samples from the timeline start
    position: u64,

    playing: bool,

    /// Loop length in samples; the timeline restarts from zero there
    loop_end: Option<u64>,

    /// Pending callbacks, ordered by position (stable for equal positions)
    schedule: Vec<Scheduled>,

    next_handle: u64,
}

impl Transport {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            position: 0,
            playing: false,
            loop_end: None,
            schedule: Vec::with_capacity(256),
            next_handle: 0,
        }
    }

    #[inline]
    fn to_samples(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.sample_rate).round() as u64
    }

    /// Register a callback at `at_seconds` on the timeline.
    pub fn schedule(&mut self, at_seconds: f64, trigger: NoteTrigger) -> ScheduleHandle {
        let handle = ScheduleHandle(self.next_handle);
        self.next_handle += 1;

        let at_sample = self.to_samples(at_seconds);
        let idx = self.schedule.partition_point(|s| s.at_sample <= at_sample);
        self.schedule.insert(
            idx,
            Scheduled {
                handle,
                at_sample,
                trigger,
            },
        );
        handle
    }

    /// Revoke one callback. Returns false if it was not scheduled.
    pub fn cancel(&mut self, handle: ScheduleHandle) -> bool {
        match self.schedule.iter().position(|s| s.handle == handle) {
            Some(idx) => {
                self.schedule.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Revoke every pending callback.
    pub fn cancel_all(&mut self) {
        self.schedule.clear();
    }

    pub fn start(&mut self) {
        self.playing = true;
    }

    /// Halt and rewind to the timeline start.
    pub fn stop(&mut self) {
        self.playing = false;
        self.position = 0;
    }

    /// Loop the timeline every `end_seconds`. Zero or negative disables looping.
    pub fn set_loop(&mut self, end_seconds: f64) {
        let end = self.to_samples(end_seconds);
        self.loop_end = (end > 0).then_some(end);
    }

    pub fn clear_loop(&mut self) {
        self.loop_end = None;
    }

    /// Advance by `frames`, appending every callback that falls inside the
    /// block to `due` with its frame offset. Does nothing while stopped.
    pub fn advance(&mut self, frames: usize, due: &mut Vec<DueTrigger>) {
        if !self.playing {
            return;
        }

        let mut remaining = frames as u64;
        let mut base = 0u64;

        while remaining > 0 {
            if let Some(end) = self.loop_end {
                if self.position >= end {
                    self.position = 0;
                }
            }

            let lap_end = self.loop_end.unwrap_or(u64::MAX);
            let window_end = self.position.saturating_add(remaining).min(lap_end);

            let lo = self.schedule.partition_point(|s| s.at_sample < self.position);
            let hi = self.schedule.partition_point(|s| s.at_sample < window_end);
            for s in &self.schedule[lo..hi] {
                due.push(DueTrigger {
                    offset: (base + (s.at_sample - self.position)) as usize,
                    handle: s.handle,
                    trigger: s.trigger,
                });
            }

            let consumed = window_end - self.position;
            base += consumed;
            remaining -= consumed;
            self.position = window_end;
        }
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn scheduled_count(&self) -> usize {
        self.schedule.len()
    }

    pub fn is_scheduled(&self, handle: ScheduleHandle) -> bool {
        self.schedule.iter().any(|s| s.handle == handle)
    }

    #[inline]
    pub fn sample_position(&self) -> u64 {
        self.position
    }

    #[inline]
    pub fn seconds(&self) -> f64 {
        self.position as f64 / self.sample_rate
    }

    pub fn loop_end_seconds(&self) -> Option<f64> {
        self.loop_end.map(|end| end as f64 / self.sample_rate)
    }

    #[inline]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trigger(pitch: u8) -> NoteTrigger {
        NoteTrigger {
            part: 0,
            pitch,
            duration: 0.1,
            velocity: 1.0,
        }
    }

    #[test]
    fn test_callbacks_fire_at_their_offsets() {
        let mut transport = Transport::new(1000.0);
        transport.schedule(0.0, trigger(60));
        transport.schedule(0.25, trigger(62));
        transport.schedule(0.75, trigger(64));
        transport.start();

        let mut due = Vec::new();
        transport.advance(500, &mut due);
        let fired: Vec<(usize, u8)> = due.iter().map(|d| (d.offset, d.trigger.pitch)).collect();
        assert_eq!(fired, vec![(0, 60), (250, 62)]);

        due.clear();
        transport.advance(500, &mut due);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].offset, 250);
    }

    #[test]
    fn test_nothing_fires_while_stopped() {
        let mut transport = Transport::new(1000.0);
        transport.schedule(0.0, trigger(60));

        let mut due = Vec::new();
        transport.advance(100, &mut due);
        assert!(due.is_empty());
        assert_eq!(transport.sample_position(), 0);
    }

    #[test]
    fn test_loop_refires_timeline() {
        let mut transport = Transport::new(1000.0);
        transport.schedule(0.0, trigger(60));
        transport.schedule(0.5, trigger(67));
        transport.set_loop(1.0);
        transport.start();

        let mut due = Vec::new();
        // Crosses the loop point once inside the block
        transport.advance(1600, &mut due);
        let fired: Vec<(usize, u8)> = due.iter().map(|d| (d.offset, d.trigger.pitch)).collect();
        assert_eq!(fired, vec![(0, 60), (500, 67), (1000, 60), (1500, 67)]);
        assert_eq!(transport.sample_position(), 600);
    }

    #[test]
    fn test_cancelled_callbacks_never_fire() {
        let mut transport = Transport::new(1000.0);
        let keep = transport.schedule(0.1, trigger(60));
        let drop = transport.schedule(0.2, trigger(62));
        assert!(transport.cancel(drop));
        assert!(!transport.cancel(drop));
        assert!(transport.is_scheduled(keep));
        transport.start();

        let mut due = Vec::new();
        transport.advance(1000, &mut due);
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].handle, keep);

        transport.cancel_all();
        assert_eq!(transport.scheduled_count(), 0);
    }

    #[test]
    fn test_stop_rewinds() {
        let mut transport = Transport::new(1000.0);
        transport.start();
        transport.advance(300, &mut Vec::new());
        assert!((transport.seconds() - 0.3).abs() < 1e-9);
        transport.stop();
        assert!(!transport.is_playing());
        assert_eq!(transport.sample_position(), 0);
    }

    #[test]
    fn test_zero_loop_disables_looping() {
        let mut transport = Transport::new(1000.0);
        transport.set_loop(0.0);
        assert_eq!(transport.loop_end_seconds(), None);
        transport.set_loop(2.0);
        assert_eq!(transport.loop_end_seconds(), Some(2.0));
    }
}
