//! Error taxonomy for the simulation pipeline
//!
//! Every device-layer failure is fatal: a generation that failed half-way
//! leaves the cell buffers undefined, so nothing here is retried.

use thiserror::Error;

/// Errors raised while setting up, running or presenting the automaton
#[derive(Debug, Error)]
pub enum LifeError {
    /// No adapter or device able to run compute kernels
    #[error("no compute platform available: {0}")]
    PlatformUnavailable(String),

    /// A host or device buffer could not be reserved
    #[error("failed to allocate {label} ({size} bytes): {reason}")]
    Allocation {
        label: String,
        size: u64,
        reason: String,
    },

    /// The transition kernel failed to build; `log` carries the build log
    #[error("kernel build failed:\n{log}")]
    Compile { log: String },

    /// A launch or read-back failed
    #[error("dispatch failed: {0}")]
    Dispatch(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// An operation was issued out of order (e.g. dispatch before upload)
    #[error("invalid pipeline state: {0}")]
    InvalidState(&'static str),

    #[error("surface error: {0}")]
    Surface(String),

    #[error("window error: {0}")]
    Window(String),
}

impl LifeError {
    pub(crate) fn allocation(label: &str, size: u64, reason: impl ToString) -> Self {
        LifeError::Allocation {
            label: label.to_string(),
            size,
            reason: reason.to_string(),
        }
    }

    /// Build log attached to a compile failure, if any
    pub fn build_log(&self) -> Option<&str> {
        match self {
            LifeError::Compile { log } => Some(log),
            _ => None,
        }
    }
}

pub type Result<T, E = LifeError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compile_error_surfaces_build_log() {
        let err = LifeError::Compile {
            log: "1:4: error: unknown identifier `neighbours`".to_string(),
        };
        assert_eq!(
            err.build_log(),
            Some("1:4: error: unknown identifier `neighbours`")
        );
        assert!(err.to_string().contains("unknown identifier"));
    }

    #[test]
    fn test_allocation_error_message() {
        let err = LifeError::allocation("cells A", 1024, "out of memory");
        assert_eq!(
            err.to_string(),
            "failed to allocate cells A (1024 bytes): out of memory"
        );
        assert!(err.build_log().is_none());
    }
}
