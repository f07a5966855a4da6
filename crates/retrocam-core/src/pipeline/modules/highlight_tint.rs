use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::image_buf::ImageBuf;
use crate::pipeline::module::ProcessingModule;

/// Warm cast on the red and green channels. Green gets half the red boost;
/// blue passes through.
pub struct HighlightTint;

impl ProcessingModule for HighlightTint {
    fn name(&self) -> &str {
        "highlight_tint"
    }

    fn process(&self, mut input: ImageBuf, config: &FilterConfig) -> Result<ImageBuf> {
        let intensity = config.highlight_tint_intensity;
        if !intensity.is_finite() {
            return Err(FilterError::ColorTransformUnavailable);
        }
        if intensity == 0.0 {
            return Ok(input);
        }

        let red = (1.0 + intensity) as f32;
        let green = (1.0 + intensity * 0.5) as f32;
        for px in input.data.chunks_exact_mut(3) {
            px[0] = (px[0] * red).max(0.0);
            px[1] = (px[1] * green).max(0.0);
        }
        Ok(input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_intensity(i: f64) -> FilterConfig {
        FilterConfig {
            highlight_tint_intensity: i,
            ..FilterConfig::iphone4()
        }
    }

    #[test]
    fn scales_red_and_half_green() {
        let buf = ImageBuf::from_data(1, 1, vec![0.5, 0.5, 0.5]).unwrap();
        let result = HighlightTint.process(buf, &with_intensity(0.1)).unwrap();
        assert!((result.data[0] - 0.55).abs() < 1e-6, "{:?}", result.data);
        assert!((result.data[1] - 0.525).abs() < 1e-6, "{:?}", result.data);
        assert_eq!(result.data[2], 0.5);
    }

    #[test]
    fn zero_intensity_is_noop() {
        let buf = ImageBuf::from_data(1, 1, vec![0.2, 0.4, 0.6]).unwrap();
        let expected = buf.data.clone();
        let result = HighlightTint.process(buf, &with_intensity(0.0)).unwrap();
        assert_eq!(result.data, expected);
    }

    #[test]
    fn nan_intensity_is_unavailable() {
        let buf = ImageBuf::new(1, 1);
        let err = HighlightTint.process(buf, &with_intensity(f64::NAN));
        assert!(matches!(err, Err(FilterError::ColorTransformUnavailable)));
    }
}
