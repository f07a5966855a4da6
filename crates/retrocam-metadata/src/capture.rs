use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use exif::{In, Tag};
use retrocam_core::{ImageBuf, Orientation, normalize_orientation};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Capture facts read from a still's EXIF block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub camera_make: Option<String>,
    pub camera_model: Option<String>,
    pub focal_length: Option<f64>,
    pub date_taken: Option<String>,
    pub orientation: Orientation,
}

impl CaptureMetadata {
    pub fn from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
        let mut reader = BufReader::new(file);
        let exif = exif::Reader::new()
            .read_from_container(&mut reader)
            .with_context(|| format!("read EXIF from {}", path.display()))?;

        Ok(Self {
            width: get_u32(&exif, Tag::PixelXDimension)
                .or_else(|| get_u32(&exif, Tag::ImageWidth)),
            height: get_u32(&exif, Tag::PixelYDimension)
                .or_else(|| get_u32(&exif, Tag::ImageLength)),
            camera_make: get_string(&exif, Tag::Make),
            camera_model: get_string(&exif, Tag::Model),
            focal_length: get_rational_f64(&exif, Tag::FocalLength),
            date_taken: get_string(&exif, Tag::DateTimeOriginal),
            orientation: get_u32(&exif, Tag::Orientation)
                .map(Orientation::from_exif)
                .unwrap_or_default(),
        })
    }

    /// Label/value pairs for printing.
    pub fn summary_lines(&self) -> Vec<(String, String)> {
        let mut lines = Vec::new();
        if let Some(make) = &self.camera_make {
            let model = self.camera_model.as_deref().unwrap_or("");
            lines.push(("Camera".into(), format!("{make} {model}").trim().to_string()));
        }
        if let Some(fl) = self.focal_length {
            lines.push(("Focal Length".into(), format!("{fl:.0}mm")));
        }
        if let (Some(w), Some(h)) = (self.width, self.height) {
            lines.push(("Resolution".into(), format!("{w} x {h}")));
        }
        if let Some(date) = &self.date_taken {
            lines.push(("Date".into(), date.clone()));
        }
        if self.orientation != Orientation::Normal {
            lines.push(("Orientation".into(), format!("{:?}", self.orientation)));
        }
        lines
    }
}

/// Orientation tag of `path`; files without EXIF read as upright.
pub fn read_orientation(path: &Path) -> Orientation {
    match CaptureMetadata::from_file(path) {
        Ok(meta) => meta.orientation,
        Err(e) => {
            debug!(?path, error = %e, "no usable EXIF, assuming upright");
            Orientation::Normal
        }
    }
}

/// Decode a still and bake its EXIF orientation into the pixels.
pub fn load_oriented(path: &Path) -> Result<ImageBuf> {
    let orientation = read_orientation(path);
    let image = retrocam_core::io::load_any(path)?;
    if orientation != Orientation::Normal {
        info!(?path, ?orientation, "normalizing orientation");
    }
    Ok(normalize_orientation(image, orientation))
}

fn get_string(exif: &exif::Exif, tag: Tag) -> Option<String> {
    exif.get_field(tag, In::PRIMARY)
        .map(|f| f.display_value().to_string().trim().trim_matches('"').to_string())
        .filter(|s| !s.is_empty())
}

fn get_u32(exif: &exif::Exif, tag: Tag) -> Option<u32> {
    exif.get_field(tag, In::PRIMARY).and_then(|f| match f.value {
        exif::Value::Short(ref v) => v.first().map(|&x| x as u32),
        exif::Value::Long(ref v) => v.first().copied(),
        _ => f.display_value().to_string().trim().parse().ok(),
    })
}

fn get_rational_f64(exif: &exif::Exif, tag: Tag) -> Option<f64> {
    exif.get_field(tag, In::PRIMARY).and_then(|f| match f.value {
        exif::Value::Rational(ref v) => v
            .first()
            .filter(|r| r.denom != 0)
            .map(|r| r.num as f64 / r.denom as f64),
        _ => f.display_value().to_string().trim().parse().ok(),
    })
}
