//! Post-capture editing: brightness/contrast/saturation sliders and a
//! user-drawn crop.

mod crop;

pub use crop::{aspect_crop_rect, crop_image, crop_to_aspect};

use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::color::{linear_to_srgb, luma, srgb_to_linear};
use crate::error::Result;
use crate::geometry::{
    CropCoordinateTransformer, CropCorner, CropMode, Rect, Size, Vector, move_rect,
    resize_from_corner,
};
use crate::image_buf::ImageBuf;

pub const BRIGHTNESS_RANGE: RangeInclusive<f32> = -0.5..=0.5;
pub const CONTRAST_RANGE: RangeInclusive<f32> = 0.5..=2.0;
pub const SATURATION_RANGE: RangeInclusive<f32> = 0.0..=2.0;

/// Slider values. Always held clamped to their ranges.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EditAdjustments {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
}

impl Default for EditAdjustments {
    fn default() -> Self {
        Self {
            brightness: 0.0,
            contrast: 1.0,
            saturation: 1.0,
        }
    }
}

impl EditAdjustments {
    pub fn new(brightness: f32, contrast: f32, saturation: f32) -> Self {
        Self {
            brightness,
            contrast,
            saturation,
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            brightness: clamp(self.brightness, &BRIGHTNESS_RANGE, 0.0),
            contrast: clamp(self.contrast, &CONTRAST_RANGE, 1.0),
            saturation: clamp(self.saturation, &SATURATION_RANGE, 1.0),
        }
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

fn clamp(v: f32, range: &RangeInclusive<f32>, fallback: f32) -> f32 {
    if v.is_nan() {
        return fallback;
    }
    v.clamp(*range.start(), *range.end())
}

/// Colour-controls style adjustment on display-encoded values:
/// `(c - 0.5) * contrast + 0.5 + brightness`, then saturation around luma.
pub fn apply_adjustments(image: &ImageBuf, adjustments: &EditAdjustments) -> ImageBuf {
    let adj = adjustments.clamped();
    if adj.is_default() {
        return image.clone();
    }

    let mut out = image.clone();
    for px in out.data.chunks_exact_mut(3) {
        let mut c = [0.0_f32; 3];
        for (dst, &src) in c.iter_mut().zip(px.iter()) {
            *dst = (linear_to_srgb(src.clamp(0.0, 1.0)) - 0.5) * adj.contrast + 0.5 + adj.brightness;
        }
        let y = luma(c[0], c[1], c[2]);
        for (dst, &v) in px.iter_mut().zip(c.iter()) {
            let s = y + adj.saturation * (v - y);
            *dst = srgb_to_linear(s.clamp(0.0, 1.0));
        }
    }
    out
}

/// One editing session over a source image.
///
/// The crop rectangle lives in view space (origin top-left) and is only
/// meaningful together with `display_bounds`, the part of the view the
/// picture occupies.
#[derive(Clone, Debug)]
pub struct EditSession {
    source: ImageBuf,
    pub adjustments: EditAdjustments,
    pub crop_rect: Option<Rect>,
    pub crop_mode: CropMode,
    pub display_bounds: Option<Rect>,
}

impl EditSession {
    pub fn new(source: ImageBuf) -> Self {
        Self {
            source,
            adjustments: EditAdjustments::default(),
            crop_rect: None,
            crop_mode: CropMode::Free,
            display_bounds: None,
        }
    }

    pub fn source(&self) -> &ImageBuf {
        &self.source
    }

    pub fn set_adjustments(&mut self, adjustments: EditAdjustments) {
        self.adjustments = adjustments.clamped();
    }

    pub fn reset_adjustments(&mut self) {
        self.adjustments = EditAdjustments::default();
    }

    pub fn set_display_bounds(&mut self, bounds: Rect) {
        self.display_bounds = Some(bounds);
    }

    /// Switch the crop mode; a fixed ratio snaps the current rectangle.
    pub fn set_crop_mode(&mut self, mode: CropMode) {
        self.crop_mode = mode;
        if let (CropMode::Fixed(ar), Some(bounds)) = (mode, self.display_bounds) {
            self.crop_rect = Some(aspect_crop_rect(bounds, ar));
        }
    }

    /// Start cropping with the rectangle covering the whole picture.
    pub fn begin_crop(&mut self) {
        self.crop_rect = self.display_bounds;
        if let CropMode::Fixed(ar) = self.crop_mode {
            self.set_crop_mode(CropMode::Fixed(ar));
        }
    }

    pub fn clear_crop(&mut self) {
        self.crop_rect = None;
    }

    pub fn drag_corner(&mut self, corner: CropCorner, delta: Vector) {
        if let (Some(rect), Some(bounds)) = (self.crop_rect, self.display_bounds) {
            self.crop_rect = Some(resize_from_corner(rect, corner, delta, self.crop_mode, bounds));
        }
    }

    pub fn drag_crop(&mut self, delta: Vector) {
        if let (Some(rect), Some(bounds)) = (self.crop_rect, self.display_bounds) {
            self.crop_rect = Some(move_rect(rect, delta, bounds));
        }
    }

    /// Crop rectangle converted to image space, if one is set.
    pub fn image_crop_rect(&self) -> Option<Rect> {
        let view = self.crop_rect?;
        let bounds = self.display_bounds?;
        let transformer = CropCoordinateTransformer::new(
            Size::new(self.source.width as f64, self.source.height as f64),
            bounds.size(),
        );
        Some(transformer.to_image_rect(view.offset(-bounds.x, -bounds.y)))
    }

    /// Adjusted and cropped output. A crop that cannot be applied leaves
    /// the adjusted frame uncropped.
    pub fn render(&self) -> Result<ImageBuf> {
        let adjusted = apply_adjustments(&self.source, &self.adjustments);
        let Some(rect) = self.image_crop_rect() else {
            return Ok(adjusted);
        };
        match crop_image(&adjusted, rect) {
            Ok(cropped) => {
                debug!(?rect, width = cropped.width, height = cropped.height, "crop applied");
                Ok(cropped)
            }
            Err(e) => {
                warn!(error = %e, ?rect, "crop skipped");
                Ok(adjusted)
            }
        }
    }
}
