use std::path::PathBuf;

use thiserror::Error;

use crate::canvas::Backend;

/// Errors raised by the GeoJSON and CSV parsers.
///
/// Problems with individual features or rows are logged and skipped; only failures that leave
/// nothing usable end up here.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid CSV file {path}: no header contains both '{longitude}' and '{latitude}'")]
    InvalidCsv {
        path: PathBuf,
        longitude: String,
        latitude: String,
    },
}

/// Errors raised by [`crate::canvas::Canvas`]. Each one fails the current call only.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{0} generation is disabled")]
    BackendDisabled(Backend),

    #[error("unsupported output format '{0}'")]
    UnsupportedFormat(String),

    #[error("output destination is empty")]
    InvalidDestination,

    #[error("invalid canvas size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write output: {0}")]
    Write(#[from] std::io::Error),

    #[error("failed to encode {format} image: {message}")]
    Encode {
        format: &'static str,
        message: String,
    },
}
