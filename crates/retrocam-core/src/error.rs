use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced by the filter, framing and transcoding stages.
#[derive(Debug, Error)]
pub enum FilterError {
    /// A colour transform could not be built from the configuration.
    /// Callers fall back to the unfiltered frame.
    #[error("color transform could not be constructed")]
    ColorTransformUnavailable,

    #[error("input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("input contains no video track")]
    NoVideoTrack,

    #[error("video processing failed: {0}")]
    VideoProcessingFailed(String),

    #[error("invalid filter configuration: {0}")]
    InvalidConfig(String),

    #[error("image has zero width or height")]
    EmptyImage,

    #[error("expected {expected} samples for {width}x{height}, got {actual}")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },

    #[error("crop rectangle has zero width or height")]
    EmptyCrop,

    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),
}

pub type Result<T, E = FilterError> = std::result::Result<T, E>;
