//! # Gridlife Prelude
//!
//! Commonly used types in one import.
//!
//! ```no_run
//! use gridlife::prelude::*;
//!
//! fn main() -> gridlife::Result<()> {
//!     let config = LifeConfig::default().with_size(64, 64).with_workers(16);
//!     let mut pipeline = LifePipeline::new(HostBackend::new(), &config)?;
//!     let report = run_headless(&mut pipeline, 100, 0)?;
//!     println!("{} live cells", report.final_live);
//!     Ok(())
//! }
//! ```

// Application and pipeline
pub use crate::app::LifeApp;
pub use crate::config::LifeConfig;
pub use crate::error::{LifeError, Result};
pub use crate::headless::{run_headless, HeadlessReport};
pub use crate::lifecycle::LifePipeline;

// Device layer
pub use crate::backend::{ComputeBackend, GpuBackend, HostBackend};

// Grid data
pub use crate::grid::{CellGrid, GridDims, PixelBuffer};

// Pacing and scheduling
pub use crate::dispatch::Role;
pub use crate::pump::{AdvancePolicy, Clock, FramePump, FrameTick, ManualClock, MonotonicClock};

// Frame statistics
pub use crate::performance::{FrameMetrics, FrameStats};
