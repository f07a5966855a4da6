use crate::color::luma;
use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::image_buf::ImageBuf;
use crate::pipeline::module::ProcessingModule;

/// Scale chroma around Rec.709 luma by `config.saturation` (1.0 is neutral).
pub struct Saturation;

impl ProcessingModule for Saturation {
    fn name(&self) -> &str {
        "saturation"
    }

    fn process(&self, mut input: ImageBuf, config: &FilterConfig) -> Result<ImageBuf> {
        if !config.saturation.is_finite() {
            return Err(FilterError::ColorTransformUnavailable);
        }
        if config.saturation == 1.0 {
            return Ok(input);
        }

        let s = config.saturation.max(0.0) as f32;
        for px in input.data.chunks_exact_mut(3) {
            let y = luma(px[0], px[1], px[2]);
            px[0] = (y + s * (px[0] - y)).max(0.0);
            px[1] = (y + s * (px[1] - y)).max(0.0);
            px[2] = (y + s * (px[2] - y)).max(0.0);
        }
        Ok(input)
    }
}
