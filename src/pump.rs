//! # Frame Pump
//!
//! Fixed-step accumulator that decouples wall-clock pacing from simulation
//! advancement. Each displayed frame calls [`FramePump::tick`], which samples
//! the clock, clamps the frame delta, drains whole steps from the
//! accumulator and reports how many generations the frame should advance.
//!
//! Time comes from an explicitly owned [`Clock`], so tests drive the pump
//! with a [`ManualClock`].

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Monotonic time source, measured from an arbitrary origin
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock backed by [`Instant`]
#[derive(Debug, Clone)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now(&self) -> Duration {
        (**self).now()
    }
}

/// How consumed steps translate into generations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AdvancePolicy {
    /// One generation per displayed frame; the accumulator only paces
    #[default]
    PerFrame,
    /// One generation per consumed step, at most `max_steps_per_frame`
    FixedStep { max_steps_per_frame: u32 },
}

/// Outcome of one displayed frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTick {
    /// Clamped time since the previous frame
    pub elapsed: Duration,
    /// Whole steps drained from the accumulator
    pub steps_consumed: u32,
    /// Generations to advance before presenting
    pub generations: u32,
}

#[derive(Debug)]
pub struct FramePump<C> {
    clock: C,
    step: Duration,
    max_frame_delta: Duration,
    policy: AdvancePolicy,
    accumulator: Duration,
    previous: Duration,
}

impl<C: Clock> FramePump<C> {
    pub fn new(clock: C, step: Duration, max_frame_delta: Duration, policy: AdvancePolicy) -> Self {
        let previous = clock.now();
        Self {
            clock,
            step,
            max_frame_delta,
            policy,
            accumulator: Duration::ZERO,
            previous,
        }
    }

    /// Unconsumed time carried into the next frame
    pub fn accumulator(&self) -> Duration {
        self.accumulator
    }

    pub fn policy(&self) -> AdvancePolicy {
        self.policy
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn tick(&mut self) -> FrameTick {
        let now = self.clock.now();
        let elapsed = now.saturating_sub(self.previous).min(self.max_frame_delta);
        self.previous = now;
        self.accumulator += elapsed;

        let mut steps_consumed = 0u32;
        if !self.step.is_zero() {
            while self.accumulator >= self.step {
                self.accumulator -= self.step;
                steps_consumed += 1;
            }
        }

        let generations = match self.policy {
            AdvancePolicy::PerFrame => 1,
            AdvancePolicy::FixedStep {
                max_steps_per_frame,
            } => steps_consumed.min(max_steps_per_frame),
        };

        FrameTick {
            elapsed,
            steps_consumed,
            generations,
        }
    }
}
