use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid zone `{name}`: [{lo}, {hi}) must satisfy 0 <= lo <= hi <= 1")]
    InvalidZone { name: &'static str, lo: f32, hi: f32 },

    #[error("Invalid option `{name}`: {reason}")]
    InvalidOption { name: &'static str, reason: String },

    #[error("Invalid image dimensions: {width}x{height}")]
    InvalidImageDimensions { width: u32, height: u32 },

    #[error("Text recognition failed: {0}")]
    Recognition(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
}
