//! Windowless runs
//!
//! Steps the pipeline a fixed number of generations with no frame pump or
//! surface involved, then reports the final population.

use std::time::{Duration, Instant};

use crate::backend::ComputeBackend;
use crate::error::Result;
use crate::lifecycle::LifePipeline;

/// Outcome of a headless run
#[derive(Debug, Clone, PartialEq)]
pub struct HeadlessReport {
    pub generations: u64,
    pub initial_live: usize,
    pub final_live: usize,
    pub elapsed: Duration,
}

impl HeadlessReport {
    pub fn generations_per_second(&self) -> f64 {
        let secs = self.elapsed.as_secs_f64();
        if secs > 0.0 {
            self.generations as f64 / secs
        } else {
            0.0
        }
    }
}

/// Advances `pipeline` by `generations`, logging the population every
/// `log_interval` generations (0 disables)
pub fn run_headless<B: ComputeBackend>(
    pipeline: &mut LifePipeline<B>,
    generations: u64,
    log_interval: u64,
) -> Result<HeadlessReport> {
    let initial_live = pipeline.current_cells()?.live_count();
    let start = Instant::now();

    for _ in 0..generations {
        pipeline.step()?;
        let generation = pipeline.generation();
        if log_interval > 0 && generation % log_interval == 0 {
            let live = pipeline.current_cells()?.live_count();
            log::info!("Generation {}: {} live cells", generation, live);
        }
    }

    let elapsed = start.elapsed();
    let final_live = pipeline.current_cells()?.live_count();
    Ok(HeadlessReport {
        generations,
        initial_live,
        final_live,
        elapsed,
    })
}
