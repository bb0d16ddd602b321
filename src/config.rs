//! Run configuration
//!
//! Defaults reproduce the classic setup: a 1000x1000 grid driven by 2000
//! workers, a 0.5 ms simulation step and a 20 ms clamp on frame deltas.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::{LifeError, Result};
use crate::grid::GridDims;
use crate::kernel::WORKGROUP_SIZE;
use crate::pump::AdvancePolicy;

/// Largest number of workgroups a single 1-D dispatch may launch
const MAX_WORKGROUPS: u32 = 65_535;

#[derive(Debug, Clone)]
pub struct LifeConfig {
    pub width: u32,
    pub height: u32,
    /// Parallel workers per dispatch; each covers a strided share of the grid
    pub worker_count: u32,
    pub seed: u64,
    pub alive_probability: f64,
    pub step_size: Duration,
    pub max_frame_delta: Duration,
    pub advance: AdvancePolicy,
    /// How often frame statistics are logged
    pub stats_interval: Duration,
    /// Log the live-cell count every this many generations (0 disables)
    pub population_log_interval: u64,
}

impl Default for LifeConfig {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 1000,
            worker_count: 2000,
            seed: default_seed(),
            alive_probability: 0.2,
            step_size: Duration::from_micros(500),
            max_frame_delta: Duration::from_millis(20),
            advance: AdvancePolicy::PerFrame,
            stats_interval: Duration::from_secs(5),
            population_log_interval: 500,
        }
    }
}

impl LifeConfig {
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_workers(mut self, worker_count: u32) -> Self {
        self.worker_count = worker_count;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn with_alive_probability(mut self, probability: f64) -> Self {
        self.alive_probability = probability;
        self
    }

    pub fn with_advance(mut self, advance: AdvancePolicy) -> Self {
        self.advance = advance;
        self
    }

    pub fn dims(&self) -> Result<GridDims> {
        GridDims::new(self.width, self.height)
    }

    /// Rejects settings the pipeline cannot honour
    pub fn validate(&self) -> Result<()> {
        self.dims()?;

        if self.worker_count == 0 {
            return Err(LifeError::InvalidConfig(
                "worker count must be at least 1".to_string(),
            ));
        }
        if self.worker_count.div_ceil(WORKGROUP_SIZE) > MAX_WORKGROUPS {
            return Err(LifeError::InvalidConfig(format!(
                "worker count {} exceeds the dispatch limit of {}",
                self.worker_count,
                MAX_WORKGROUPS * WORKGROUP_SIZE
            )));
        }
        if !(0.0..=1.0).contains(&self.alive_probability) {
            return Err(LifeError::InvalidConfig(format!(
                "alive probability {} outside [0, 1]",
                self.alive_probability
            )));
        }
        if self.step_size.is_zero() {
            return Err(LifeError::InvalidConfig(
                "step size must be non-zero".to_string(),
            ));
        }
        if let AdvancePolicy::FixedStep {
            max_steps_per_frame: 0,
        } = self.advance
        {
            return Err(LifeError::InvalidConfig(
                "fixed-step advance needs at least one step per frame".to_string(),
            ));
        }
        Ok(())
    }
}

/// Seed derived from the wall clock, used when none is given
pub fn default_seed() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
