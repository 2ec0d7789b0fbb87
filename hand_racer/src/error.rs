//! Front-end failures: everything that can stop the game from launching.

use std::path::PathBuf;

use thiserror::Error;

use drive_core::{ConfigError, StartupError};
use race_store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("window: {0}")]
    Window(String),
    #[error(transparent)]
    Startup(#[from] StartupError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("config {path}: {reason}")]
    Config { path: PathBuf, reason: String },
    #[error("tuning: {0}")]
    Tuning(#[from] ConfigError),
}
