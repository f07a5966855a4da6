pub mod module;
pub mod modules;

use std::time::Instant;

use tracing::{debug, warn};

use crate::config::{CompositionOrder, FilterConfig};
use crate::error::{FilterError, Result};
use crate::image_buf::ImageBuf;
use module::ProcessingModule;

/// Chain of processing modules run in order.
///
/// ```text
/// colour:   White Balance -> Saturation -> Highlight Tint
/// framing:  Crop -> Downscale
/// ```
///
/// Every module takes and returns a linear f32 `ImageBuf`. The colour chain
/// keeps dimensions; the framing modules only change geometry.
///
/// The colour chain runs as one stage: if any of its modules cannot build a
/// transform, the stage hands back the pixels it was given. Framing errors
/// propagate.
pub struct Pipeline {
    stages: Vec<Stage>,
}

enum Stage {
    Color(Vec<Box<dyn ProcessingModule>>),
    Framing(Box<dyn ProcessingModule>),
}

impl Pipeline {
    /// Colour-only chain, used for video frames.
    pub fn color() -> Self {
        Self {
            stages: vec![Stage::Color(color_modules())],
        }
    }

    /// Full still-photo chain for a composition order.
    pub fn for_composition(order: CompositionOrder) -> Self {
        let color = || Stage::Color(color_modules());
        let crop = || Stage::Framing(Box::new(modules::Crop));
        let mut stages = match order {
            CompositionOrder::ColorThenDownscale => vec![color()],
            CompositionOrder::CropThenColor => vec![crop(), color()],
            CompositionOrder::ColorCropDownscale => vec![color(), crop()],
        };
        stages.push(Stage::Framing(Box::new(modules::Downscale)));
        Self { stages }
    }

    pub fn module_names(&self) -> Vec<&str> {
        self.stages
            .iter()
            .flat_map(|stage| match stage {
                Stage::Color(chain) => chain.iter().map(|m| m.name()).collect(),
                Stage::Framing(m) => vec![m.name()],
            })
            .collect()
    }

    pub fn process(&self, input: ImageBuf, config: &FilterConfig) -> Result<ImageBuf> {
        if input.is_empty() {
            return Err(FilterError::EmptyImage);
        }
        let mut current = input;
        for stage in &self.stages {
            current = match stage {
                Stage::Color(chain) => color_or_passthrough(chain, current, config)?,
                Stage::Framing(module) => {
                    debug!(module = module.name(), "processing");
                    module.process(current, config)?
                }
            };
        }
        Ok(current)
    }
}

fn color_modules() -> Vec<Box<dyn ProcessingModule>> {
    vec![
        Box::new(modules::WhiteBalance),
        Box::new(modules::Saturation),
        Box::new(modules::HighlightTint),
    ]
}

fn run_chain(
    chain: &[Box<dyn ProcessingModule>],
    input: ImageBuf,
    config: &FilterConfig,
) -> Result<ImageBuf> {
    let mut current = input;
    for module in chain {
        debug!(module = module.name(), "processing");
        current = module.process(current, config)?;
    }
    Ok(current)
}

/// Only [`FilterError::ColorTransformUnavailable`] is absorbed.
fn color_or_passthrough(
    chain: &[Box<dyn ProcessingModule>],
    input: ImageBuf,
    config: &FilterConfig,
) -> Result<ImageBuf> {
    match run_chain(chain, input.clone(), config) {
        Err(FilterError::ColorTransformUnavailable) => {
            warn!("color filter unavailable, passing frame through");
            Ok(input)
        }
        other => other,
    }
}

/// White balance, saturation and highlight tint. Dimensions are unchanged.
///
/// Unlike [`Pipeline::process`], a missing colour transform is an error here.
pub fn apply_color(image: &ImageBuf, config: &FilterConfig) -> Result<ImageBuf> {
    if image.is_empty() {
        return Err(FilterError::EmptyImage);
    }
    run_chain(&color_modules(), image.clone(), config)
}

/// [`apply_color`], handing back the unfiltered frame when no colour
/// transform can be built.
pub fn apply_color_or_passthrough(image: &ImageBuf, config: &FilterConfig) -> ImageBuf {
    match color_or_passthrough(&color_modules(), image.clone(), config) {
        Ok(out) => out,
        Err(e) => {
            warn!(error = %e, "color filter failed, passing frame through");
            image.clone()
        }
    }
}

/// Centred field-of-view crop.
pub fn apply_crop(image: &ImageBuf, config: &FilterConfig) -> Result<ImageBuf> {
    if image.is_empty() {
        return Err(FilterError::EmptyImage);
    }
    modules::Crop.process(image.clone(), config)
}

/// Reduce to the configured output resolution.
pub fn apply_downscale(image: &ImageBuf, config: &FilterConfig) -> Result<ImageBuf> {
    modules::Downscale.process(image.clone(), config)
}

/// Still-photo path in the order named by `config.composition`.
///
/// A colour failure falls back to the unfiltered pixels so a capture is
/// never lost; framing errors propagate.
pub fn apply_filters(image: &ImageBuf, config: &FilterConfig) -> Result<ImageBuf> {
    if image.is_empty() {
        return Err(FilterError::EmptyImage);
    }
    let start = Instant::now();

    let out = match config.composition {
        CompositionOrder::ColorThenDownscale => {
            let colored = apply_color_or_passthrough(image, config);
            apply_downscale(&colored, config)?
        }
        CompositionOrder::CropThenColor => {
            let cropped = apply_crop(image, config)?;
            let colored = apply_color_or_passthrough(&cropped, config);
            apply_downscale(&colored, config)?
        }
        CompositionOrder::ColorCropDownscale => {
            let colored = apply_color_or_passthrough(image, config);
            let cropped = apply_crop(&colored, config)?;
            apply_downscale(&cropped, config)?
        }
    };

    debug!(
        composition = ?config.composition,
        width = out.width,
        height = out.height,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "filters applied"
    );
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn neutral() -> FilterConfig {
        FilterConfig::builder()
            .warmth(0.0)
            .tint(0.0)
            .saturation(1.0)
            .highlight_tint_intensity(0.0)
            .build()
            .unwrap()
    }

    #[test]
    fn neutral_color_is_identity() {
        let input = ImageBuf::from_data(2, 2, vec![0.2, 0.4, 0.6].repeat(4)).unwrap();
        let out = apply_color(&input, &neutral()).unwrap();
        for (got, want) in out.data.iter().zip(&input.data) {
            assert!((got - want).abs() < 1e-4, "{got} vs {want}");
        }
    }

    #[test]
    fn color_preserves_dimensions() {
        let input = ImageBuf::filled(37, 11, [0.3, 0.3, 0.3]);
        let out = apply_color(&input, &FilterConfig::iphone4()).unwrap();
        assert_eq!((out.width, out.height), (37, 11));
    }

    #[test]
    fn color_does_not_mutate_input() {
        let input = ImageBuf::filled(3, 3, [0.4, 0.4, 0.4]);
        let before = input.clone();
        let _ = apply_color(&input, &FilterConfig::iphone4()).unwrap();
        assert_eq!(input, before);
    }

    #[test]
    fn iphone4_warms_grey() {
        let input = ImageBuf::filled(1, 1, [0.5, 0.5, 0.5]);
        let out = apply_color(&input, &FilterConfig::iphone4()).unwrap();
        assert!(out.data[0] > out.data[2], "{:?}", out.data);
    }

    #[test]
    fn passthrough_on_unavailable_transform() {
        let input = ImageBuf::filled(2, 2, [0.1, 0.2, 0.3]);
        let config = FilterConfig {
            warmth: f64::NAN,
            ..FilterConfig::iphone4()
        };
        assert!(matches!(
            apply_color(&input, &config),
            Err(FilterError::ColorTransformUnavailable)
        ));
        assert_eq!(apply_color_or_passthrough(&input, &config), input);
    }

    #[test]
    fn crop_scenario_2592x1936() {
        let input = ImageBuf::new(2592, 1936);
        let out = apply_crop(&input, &FilterConfig::iphone4()).unwrap();
        assert_eq!((out.width, out.height), (2099, 1568));
    }

    #[test]
    fn empty_image_rejected() {
        let empty = ImageBuf::new(0, 0);
        let config = FilterConfig::iphone4();
        assert!(matches!(
            apply_color(&empty, &config),
            Err(FilterError::EmptyImage)
        ));
        assert!(matches!(
            apply_filters(&empty, &config),
            Err(FilterError::EmptyImage)
        ));
    }

    #[test]
    fn color_module_ordering() {
        assert_eq!(
            Pipeline::color().module_names(),
            vec!["white_balance", "saturation", "highlight_tint"]
        );
    }

    #[test]
    fn composition_orderings() {
        assert_eq!(
            Pipeline::for_composition(CompositionOrder::ColorThenDownscale).module_names(),
            vec!["white_balance", "saturation", "highlight_tint", "downscale"]
        );
        assert_eq!(
            Pipeline::for_composition(CompositionOrder::CropThenColor).module_names(),
            vec![
                "crop",
                "white_balance",
                "saturation",
                "highlight_tint",
                "downscale"
            ]
        );
        assert_eq!(
            Pipeline::for_composition(CompositionOrder::ColorCropDownscale).module_names(),
            vec![
                "white_balance",
                "saturation",
                "highlight_tint",
                "crop",
                "downscale"
            ]
        );
    }

    #[test]
    fn default_composition_skips_crop() {
        let config = FilterConfig::builder().base_size(64, 48).build().unwrap();
        let input = ImageBuf::filled(40, 30, [0.5, 0.5, 0.5]);
        let out = apply_filters(&input, &config).unwrap();
        assert_eq!((out.width, out.height), (40, 30));
    }

    #[test]
    fn crop_compositions_crop() {
        let base = FilterConfig::builder().base_size(64, 48).build().unwrap();
        let input = ImageBuf::filled(100, 100, [0.5, 0.5, 0.5]);
        for order in [
            CompositionOrder::CropThenColor,
            CompositionOrder::ColorCropDownscale,
        ] {
            let out = apply_filters(&input, &base.with_composition(order)).unwrap();
            // 81x81 after crop, then fitted into 64x48
            assert_eq!((out.width, out.height), (48, 48), "{order:?}");
        }
    }

    #[test]
    fn pipeline_process_matches_apply_filters() {
        let config = FilterConfig::builder()
            .base_size(16, 12)
            .composition(CompositionOrder::CropThenColor)
            .build()
            .unwrap();
        let data: Vec<f32> = (0..40 * 30 * 3).map(|i| (i % 97) as f32 / 97.0).collect();
        let input = ImageBuf::from_data(40, 30, data).unwrap();
        let a = apply_filters(&input, &config).unwrap();
        let b = Pipeline::for_composition(config.composition)
            .process(input, &config)
            .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn pipeline_process_passes_through_like_apply_filters() {
        let config = FilterConfig {
            warmth: f64::NAN,
            ..FilterConfig::builder()
                .base_size(16, 12)
                .composition(CompositionOrder::CropThenColor)
                .build()
                .unwrap()
        };
        let data: Vec<f32> = (0..40 * 30 * 3).map(|i| (i % 89) as f32 / 89.0).collect();
        let input = ImageBuf::from_data(40, 30, data).unwrap();
        let a = apply_filters(&input, &config).unwrap();
        let b = Pipeline::for_composition(config.composition)
            .process(input.clone(), &config)
            .unwrap();
        assert_eq!(a, b);

        // colour was skipped, so this is just crop plus downscale
        let framed = apply_downscale(&apply_crop(&input, &config).unwrap(), &config).unwrap();
        assert_eq!(b, framed);
    }

    #[test]
    fn color_pipeline_hands_back_its_input() {
        let input = ImageBuf::filled(2, 2, [0.1, 0.2, 0.3]);
        let config = FilterConfig {
            saturation: f64::NAN,
            ..FilterConfig::iphone4()
        };
        assert_eq!(Pipeline::color().process(input.clone(), &config).unwrap(), input);
        assert!(matches!(
            apply_color(&input, &config),
            Err(FilterError::ColorTransformUnavailable)
        ));
    }
}
