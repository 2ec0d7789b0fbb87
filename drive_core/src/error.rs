//! Failures that can leave the core.
//!
//! Nothing that happens during a race is an error: missing hands, truncated
//! skeletons, full pools and fatal crashes are all ordinary states.  Only
//! resource acquisition before a race and bad tuning are reported here.

use thiserror::Error;

/// Broad class of a startup failure, used to pick the user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Permission,
    Model,
    Device,
    Network,
}

/// A landmark source, audio device or asset could not be acquired.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("camera or sensor access denied: {0}")]
    PermissionDenied(String),
    #[error("hand detector failed to load: {0}")]
    DetectorLoad(String),
    #[error("input device unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("failed to fetch asset {asset}: {reason}")]
    AssetLoad { asset: String, reason: String },
}

impl StartupError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            StartupError::PermissionDenied(_)  => ErrorCategory::Permission,
            StartupError::DetectorLoad(_)      => ErrorCategory::Model,
            StartupError::DeviceUnavailable(_) => ErrorCategory::Device,
            StartupError::AssetLoad { .. }     => ErrorCategory::Network,
        }
    }

    /// Short message suitable for a start screen.
    pub fn user_message(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Permission =>
                "Hand tracking needs sensor access. Allow it and restart.",
            ErrorCategory::Model =>
                "The hand tracker could not be started.",
            ErrorCategory::Device =>
                "No hand-tracking device was found. Plug one in or use the keyboard rig.",
            ErrorCategory::Network =>
                "Game assets could not be downloaded. Check your connection.",
        }
    }
}

/// Tuning values that cannot produce a working simulation.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("{name}: closed threshold {closed} must be below open threshold {open}")]
    InvertedThresholds { name: &'static str, closed: f32, open: f32 },
    #[error("{0} must be greater than zero")]
    NotPositive(&'static str),
    #[error("{0} must be within [0, 1]")]
    OutOfUnitRange(&'static str),
    #[error("world needs at least one lane")]
    NoLanes,
}
