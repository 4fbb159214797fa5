//! Error types for the visual regression harness

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SnapError {
    #[error("application failed to start: {0}")]
    Startup(String),

    #[error("application not ready after {0} health probes")]
    StartupTimeout(usize),

    #[error("navigation to '{view}' failed: {reason}")]
    Navigation { view: String, reason: String },

    #[error("capture failed: {0}")]
    Capture(String),

    #[error("comparison failed: {0}")]
    Compare(String),

    #[error("'{name}' differs from baseline by {ratio:.4} (tolerance {tolerance:.4})")]
    Regression {
        name: String,
        ratio: f64,
        tolerance: f64,
        diff_image: Option<PathBuf>,
    },

    #[error("scenario spec error: {0}")]
    Spec(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type SnapResult<T> = Result<T, SnapError>;
