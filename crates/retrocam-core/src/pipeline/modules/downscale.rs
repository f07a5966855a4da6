use tracing::debug;

use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::image_buf::ImageBuf;
use crate::pipeline::module::ProcessingModule;

/// Reduce to the device's output resolution. Never upscales.
pub struct Downscale;

impl ProcessingModule for Downscale {
    fn name(&self) -> &str {
        "downscale"
    }

    fn process(&self, input: ImageBuf, config: &FilterConfig) -> Result<ImageBuf> {
        let (w, h) = downscale_size(input.width, input.height, config.output_size())?;
        if (w, h) == (input.width, input.height) {
            return Ok(input);
        }
        debug!(from_w = input.width, from_h = input.height, w, h, "downscaling");
        Ok(input.resize_box(w, h))
    }
}

/// Output dimensions for an input of `width` x `height` against a landscape
/// `target`. Portrait inputs swap the target so long edge maps to long edge.
pub fn downscale_size(width: u32, height: u32, target: (u32, u32)) -> Result<(u32, u32)> {
    if width == 0 || height == 0 {
        return Err(FilterError::EmptyImage);
    }
    let (mut tw, mut th) = target;
    if tw == 0 || th == 0 {
        return Err(FilterError::InvalidConfig(
            "output resolution must be non-zero".into(),
        ));
    }
    if height > width {
        std::mem::swap(&mut tw, &mut th);
    }
    if width <= tw && height <= th {
        return Ok((width, height));
    }

    let scale = (tw as f64 / width as f64).min(th as f64 / height as f64);
    let w = ((width as f64 * scale).round() as u32).clamp(1, tw);
    let h = ((height as f64 * scale).round() as u32).clamp(1, th);
    Ok((w, h))
}
