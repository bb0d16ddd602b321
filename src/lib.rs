// src/lib.rs
//! Gridlife
//!
//! Conway's Game of Life on a toroidal grid, advanced one generation per
//! dispatch by a data-parallel compute kernel and shown in a winit window.
//!
//! The core is a double-buffered pipeline: two cell grids with fixed roles per
//! kernel invocation, a scheduler that alternates the invocations, and a frame
//! pump that paces generations against the wall clock.

pub mod app;
pub mod backend;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod grid;
pub mod headless;
pub mod kernel;
pub mod lifecycle;
pub mod performance;
pub mod prelude;
pub mod pump;
pub mod render;
pub mod scheduler;
pub mod store;

// Re-export main types for convenience
pub use app::LifeApp;
pub use config::LifeConfig;
pub use error::{LifeError, Result};
pub use lifecycle::LifePipeline;
