// src/survival.rs
//
// Frame-driven torch decay.
//
// The host calls `tick()` once per display refresh with a millisecond
// timestamp and keeps scheduling frames while it returns `Continue`.
// Decay is scaled by elapsed wall time, so the burn speed does not depend
// on the refresh rate.

use log::{debug, info, warn};

use crate::config::TimerConfig;
use crate::economy::EconomyState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Idle,
    Running,
    Ended,
}

/// What the host should do after a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Schedule the next frame.
    Continue,
    /// The torch burned out on this tick.
    Ended,
    /// The timer is not running.
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorchResource {
    /// May dip below zero after a penalty until the next tick
    current: f64,
    pub max: f64,
}

impl TorchResource {
    pub fn new(max: f64) -> Self {
        Self { current: max, max }
    }

    /// Current value, always within `[0, max]`.
    #[inline]
    pub fn current(&self) -> f64 {
        self.current.max(0.0).min(self.max)
    }

    /// NaN counts as spent.
    #[inline]
    fn is_spent(&self) -> bool {
        !(self.current > 0.0)
    }
}

pub struct SurvivalTimer {
    config: TimerConfig,
    state: TimerState,
    torch: TorchResource,
    last_tick_ms: f64,
    on_depleted: Box<dyn FnMut()>,
}

impl SurvivalTimer {
    /// `on_depleted` runs once each time a started session burns out.
    pub fn new(config: TimerConfig, on_depleted: impl FnMut() + 'static) -> Self {
        Self {
            config,
            state: TimerState::Idle,
            torch: TorchResource::new(0.0),
            last_tick_ms: 0.0,
            on_depleted: Box::new(on_depleted),
        }
    }

    /// Refill the torch and start burning.
    pub fn start(&mut self, now_ms: f64, economy: &mut impl EconomyState) {
        let max = economy.max_torch();
        let max = if max.is_finite() && max > 0.0 {
            max
        } else {
            warn!("[Fretgate] Unusable max torch {}, session starts empty", max);
            0.0
        };
        self.torch = TorchResource::new(max);
        self.last_tick_ms = now_ms;
        self.state = TimerState::Running;
        self.mirror(economy);
        info!("[Fretgate] Survival timer started ({})", self.torch.max);
    }

    pub fn tick(&mut self, now_ms: f64, economy: &mut impl EconomyState) -> TickOutcome {
        if self.state != TimerState::Running {
            return TickOutcome::Stopped;
        }

        let elapsed = (now_ms - self.last_tick_ms).max(0.0);
        self.last_tick_ms = now_ms;
        self.torch.current -= self.config.decay_for(elapsed);

        if self.torch.is_spent() {
            self.torch.current = 0.0;
            self.state = TimerState::Ended;
            self.mirror(economy);
            info!("[Fretgate] Torch burned out");
            (self.on_depleted)();
            return TickOutcome::Ended;
        }

        self.mirror(economy);
        TickOutcome::Continue
    }

    /// Correct answer: refill by `amount` and pay the reward.
    ///
    /// Adjustments only apply to a running session; the economy's torch is
    /// left alone otherwise.
    pub fn reward(&mut self, amount: f64, economy: &mut impl EconomyState) {
        if self.state != TimerState::Running {
            return;
        }
        self.refill(amount);
        economy.credit_currency(self.config.reward_currency);
        self.mirror(economy);
    }

    /// Wrong answer. The next tick ends the session if this empties the torch.
    pub fn penalty(&mut self, amount: f64, economy: &mut impl EconomyState) {
        if self.state != TimerState::Running {
            return;
        }
        self.torch.current -= amount;
        self.mirror(economy);
    }

    /// Item use: refill without a reward.
    pub fn restore(&mut self, amount: f64, economy: &mut impl EconomyState) {
        if self.state != TimerState::Running {
            return;
        }
        self.refill(amount);
        self.mirror(economy);
    }

    /// Leave the session without firing the callback.
    pub fn stop(&mut self) {
        if self.state == TimerState::Running {
            debug!("[Fretgate] Survival timer stopped");
            self.state = TimerState::Idle;
        }
    }

    pub fn reward_amount(&self) -> f64 {
        self.config.reward_torch
    }

    pub fn penalty_amount(&self) -> f64 {
        self.config.penalty_torch
    }

    pub fn torch(&self) -> f64 {
        self.torch.current()
    }

    pub fn max_torch(&self) -> f64 {
        self.torch.max
    }

    pub fn state(&self) -> TimerState {
        self.state
    }

    pub fn is_full(&self) -> bool {
        self.torch.current >= self.torch.max
    }

    fn refill(&mut self, amount: f64) {
        self.torch.current = (self.torch.current + amount).min(self.torch.max);
    }

    fn mirror(&self, economy: &mut impl EconomyState) {
        economy.set_current_torch(self.torch.current());
    }
}
