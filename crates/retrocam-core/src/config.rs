use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{FilterError, Result};

/// Output framing ratio, independent of the sensor's native ratio.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectRatio {
    /// 1:1
    Square,
    /// 4:3, the default for the emulated devices.
    #[default]
    Standard,
    /// 16:9
    Wide,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 3] = [AspectRatio::Square, AspectRatio::Standard, AspectRatio::Wide];

    pub fn width_ratio(self) -> f64 {
        match self {
            AspectRatio::Square => 1.0,
            AspectRatio::Standard => 4.0,
            AspectRatio::Wide => 16.0,
        }
    }

    pub fn height_ratio(self) -> f64 {
        match self {
            AspectRatio::Square => 1.0,
            AspectRatio::Standard => 3.0,
            AspectRatio::Wide => 9.0,
        }
    }

    /// Width over height in landscape orientation.
    pub fn ratio(self) -> f64 {
        self.width_ratio() / self.height_ratio()
    }

    /// Width over height when the device is held upright.
    pub fn portrait_ratio(self) -> f64 {
        self.height_ratio() / self.width_ratio()
    }

    pub fn label(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Standard => "4:3",
            AspectRatio::Wide => "16:9",
        }
    }

    /// Cycle Standard -> Square -> Wide -> Standard.
    pub fn next(self) -> AspectRatio {
        match self {
            AspectRatio::Standard => AspectRatio::Square,
            AspectRatio::Square => AspectRatio::Wide,
            AspectRatio::Wide => AspectRatio::Standard,
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AspectRatio {
    type Err = FilterError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1:1" | "square" => Ok(AspectRatio::Square),
            "4:3" | "standard" => Ok(AspectRatio::Standard),
            "16:9" | "wide" => Ok(AspectRatio::Wide),
            other => Err(FilterError::InvalidConfig(format!(
                "unknown aspect ratio '{other}'"
            ))),
        }
    }
}

/// Closed interval `[lower, upper]`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ClosedRange {
    pub lower: f64,
    pub upper: f64,
}

impl ClosedRange {
    pub const fn new(lower: f64, upper: f64) -> Self {
        Self { lower, upper }
    }

    pub fn contains(&self, v: f64) -> bool {
        v >= self.lower && v <= self.upper
    }

    pub fn is_valid(&self) -> bool {
        self.lower.is_finite() && self.upper.is_finite() && self.lower <= self.upper
    }
}

/// Order in which the still-photo path runs colour and framing.
///
/// Revisions of the capture path have shipped more than one ordering, so
/// the choice is carried per configuration instead of being hard-coded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompositionOrder {
    /// Colour, then downscale. The centred crop is not applied.
    #[default]
    ColorThenDownscale,
    /// Crop, then colour, then downscale.
    CropThenColor,
    /// Colour, then crop, then downscale.
    ColorCropDownscale,
}

/// Immutable per-device filter parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// White-balance shift; positive is warmer.
    pub warmth: f64,
    /// Green-magenta shift; positive is magenta.
    pub tint: f64,
    /// 1.0 is neutral.
    pub saturation: f64,
    /// Warm boost on the red and green channels.
    pub highlight_tint_intensity: f64,
    /// Fraction of the frame kept by the centred crop, in (0, 1].
    pub crop_ratio: f64,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    /// Landscape reference output width.
    pub base_width: u32,
    /// Landscape reference output height.
    pub base_height: u32,
    /// Shift in pixels, drawn independently for x and y.
    pub shake_shift_range: ClosedRange,
    /// Rotation in degrees.
    pub shake_rotation_range: ClosedRange,
    pub motion_blur_radius_range: ClosedRange,
    #[serde(default)]
    pub composition: CompositionOrder,
}

impl FilterConfig {
    pub fn builder() -> FilterConfigBuilder {
        FilterConfigBuilder::default()
    }

    /// iPhone 4: 5MP sensor, 32mm-equivalent field of view.
    pub fn iphone4() -> Self {
        Self {
            warmth: 1000.0,
            tint: 10.0,
            saturation: 0.9,
            highlight_tint_intensity: 0.1,
            crop_ratio: 0.81,
            aspect_ratio: AspectRatio::Standard,
            base_width: 2592,
            base_height: 1936,
            shake_shift_range: ClosedRange::new(1.0, 5.0),
            shake_rotation_range: ClosedRange::new(-0.5, 0.5),
            motion_blur_radius_range: ClosedRange::new(1.0, 3.0),
            composition: CompositionOrder::default(),
        }
    }

    /// iPhone 6: 8MP sensor, 29mm-equivalent field of view.
    pub fn iphone6() -> Self {
        Self {
            warmth: 500.0,
            tint: 5.0,
            saturation: 0.95,
            highlight_tint_intensity: 0.05,
            crop_ratio: 0.87,
            aspect_ratio: AspectRatio::Standard,
            base_width: 3264,
            base_height: 2448,
            shake_shift_range: ClosedRange::new(0.5, 2.5),
            shake_rotation_range: ClosedRange::new(-0.25, 0.25),
            motion_blur_radius_range: ClosedRange::new(0.5, 1.5),
            composition: CompositionOrder::default(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("warmth", self.warmth),
            ("tint", self.tint),
            ("saturation", self.saturation),
            ("highlight_tint_intensity", self.highlight_tint_intensity),
            ("crop_ratio", self.crop_ratio),
        ];
        for (name, v) in finite {
            if !v.is_finite() {
                return Err(FilterError::InvalidConfig(format!("{name} must be finite")));
            }
        }
        if !(self.crop_ratio > 0.0 && self.crop_ratio <= 1.0) {
            return Err(FilterError::InvalidConfig(format!(
                "crop_ratio must be in (0, 1], got {}",
                self.crop_ratio
            )));
        }
        if self.saturation < 0.0 {
            return Err(FilterError::InvalidConfig(format!(
                "saturation must be >= 0, got {}",
                self.saturation
            )));
        }
        if self.base_width == 0 || self.base_height == 0 {
            return Err(FilterError::InvalidConfig(
                "base resolution must be non-zero".into(),
            ));
        }
        let ranges = [
            ("shake_shift_range", self.shake_shift_range),
            ("shake_rotation_range", self.shake_rotation_range),
            ("motion_blur_radius_range", self.motion_blur_radius_range),
        ];
        for (name, r) in ranges {
            if !r.is_valid() {
                return Err(FilterError::InvalidConfig(format!(
                    "{name} must have lower <= upper, got {}..={}",
                    r.lower, r.upper
                )));
            }
        }
        if self.motion_blur_radius_range.lower < 0.0 {
            return Err(FilterError::InvalidConfig(
                "motion_blur_radius_range must be non-negative".into(),
            ));
        }
        Ok(())
    }

    /// Clone with a different aspect ratio; everything else is kept.
    pub fn with_aspect_ratio(&self, aspect_ratio: AspectRatio) -> Self {
        Self {
            aspect_ratio,
            ..self.clone()
        }
    }

    pub fn with_composition(&self, composition: CompositionOrder) -> Self {
        Self {
            composition,
            ..self.clone()
        }
    }

    pub fn output_width(&self) -> u32 {
        match self.aspect_ratio {
            AspectRatio::Square => self.base_width.min(self.base_height),
            AspectRatio::Standard | AspectRatio::Wide => self.base_width,
        }
    }

    pub fn output_height(&self) -> u32 {
        match self.aspect_ratio {
            AspectRatio::Square => self.base_width.min(self.base_height),
            AspectRatio::Standard => self.base_height,
            AspectRatio::Wide => self.base_width * 9 / 16,
        }
    }

    /// Landscape output size `(width, height)`.
    pub fn output_size(&self) -> (u32, u32) {
        (self.output_width(), self.output_height())
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self::iphone4()
    }
}

/// Builder starting from the iPhone 4 preset; `build` validates.
#[derive(Clone, Debug, Default)]
pub struct FilterConfigBuilder {
    config: FilterConfig,
}

impl FilterConfigBuilder {
    pub fn warmth(mut self, v: f64) -> Self {
        self.config.warmth = v;
        self
    }

    pub fn tint(mut self, v: f64) -> Self {
        self.config.tint = v;
        self
    }

    pub fn saturation(mut self, v: f64) -> Self {
        self.config.saturation = v;
        self
    }

    pub fn highlight_tint_intensity(mut self, v: f64) -> Self {
        self.config.highlight_tint_intensity = v;
        self
    }

    pub fn crop_ratio(mut self, v: f64) -> Self {
        self.config.crop_ratio = v;
        self
    }

    pub fn aspect_ratio(mut self, v: AspectRatio) -> Self {
        self.config.aspect_ratio = v;
        self
    }

    pub fn base_size(mut self, width: u32, height: u32) -> Self {
        self.config.base_width = width;
        self.config.base_height = height;
        self
    }

    pub fn shake_shift_range(mut self, lower: f64, upper: f64) -> Self {
        self.config.shake_shift_range = ClosedRange::new(lower, upper);
        self
    }

    pub fn shake_rotation_range(mut self, lower: f64, upper: f64) -> Self {
        self.config.shake_rotation_range = ClosedRange::new(lower, upper);
        self
    }

    pub fn motion_blur_radius_range(mut self, lower: f64, upper: f64) -> Self {
        self.config.motion_blur_radius_range = ClosedRange::new(lower, upper);
        self
    }

    pub fn composition(mut self, v: CompositionOrder) -> Self {
        self.config.composition = v;
        self
    }

    pub fn build(self) -> Result<FilterConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
