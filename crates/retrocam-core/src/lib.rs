pub mod camera_model;
pub mod color;
pub mod config;
pub mod editor;
pub mod error;
pub mod geometry;
pub mod image_buf;
pub mod io;
pub mod orientation;
pub mod pipeline;
pub mod shake;

pub use camera_model::CameraModel;
pub use config::{AspectRatio, ClosedRange, CompositionOrder, FilterConfig};
pub use error::{FilterError, Result};
pub use image_buf::ImageBuf;
pub use orientation::{Orientation, normalize_orientation};
pub use pipeline::{
    Pipeline, apply_color, apply_color_or_passthrough, apply_crop, apply_downscale, apply_filters,
};
pub use shake::{MotionSample, ShakeEffect, apply_shake};
