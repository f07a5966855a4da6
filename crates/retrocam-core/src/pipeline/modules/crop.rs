use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::image_buf::ImageBuf;
use crate::pipeline::module::ProcessingModule;

/// Centred crop keeping `crop_ratio` of each dimension, narrowing the
/// field of view to the emulated lens.
pub struct Crop;

impl ProcessingModule for Crop {
    fn name(&self) -> &str {
        "crop"
    }

    fn process(&self, input: ImageBuf, config: &FilterConfig) -> Result<ImageBuf> {
        if config.crop_ratio == 1.0 {
            return Ok(input);
        }
        let (x, y, w, h) = centered_crop_rect(input.width, input.height, config.crop_ratio)?;
        Ok(input.crop(x, y, w, h))
    }
}

/// `(x, y, width, height)` of the centred crop. Sizes are floored and
/// never below one pixel.
pub fn centered_crop_rect(width: u32, height: u32, ratio: f64) -> Result<(u32, u32, u32, u32)> {
    if !(ratio > 0.0 && ratio <= 1.0) {
        return Err(FilterError::InvalidConfig(format!(
            "crop_ratio must be in (0, 1], got {ratio}"
        )));
    }
    if width == 0 || height == 0 {
        return Err(FilterError::EmptyImage);
    }
    let cw = ((width as f64 * ratio).floor() as u32).clamp(1, width);
    let ch = ((height as f64 * ratio).floor() as u32).clamp(1, height);
    Ok(((width - cw) / 2, (height - ch) / 2, cw, ch))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_ratio(r: f64) -> FilterConfig {
        FilterConfig {
            crop_ratio: r,
            ..FilterConfig::iphone4()
        }
    }

    #[test]
    fn full_ratio_is_identity() {
        let buf = ImageBuf::from_data(4, 4, vec![0.5; 48]).unwrap();
        let result = Crop.process(buf.clone(), &with_ratio(1.0)).unwrap();
        assert_eq!(result, buf);
    }

    #[test]
    fn iphone4_sensor_crop() {
        assert_eq!(
            centered_crop_rect(2592, 1936, 0.81).unwrap(),
            (246, 184, 2099, 1568)
        );
    }

    #[test]
    fn crop_takes_the_centre() {
        // 4x4 ramp, values are the pixel index
        let data: Vec<f32> = (0..16).flat_map(|i| [i as f32; 3]).collect();
        let buf = ImageBuf::from_data(4, 4, data).unwrap();
        let result = Crop.process(buf, &with_ratio(0.5)).unwrap();
        assert_eq!((result.width, result.height), (2, 2));
        let firsts: Vec<f32> = result.data.chunks(3).map(|p| p[0]).collect();
        assert_eq!(firsts, vec![5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn tiny_ratio_keeps_one_pixel() {
        let buf = ImageBuf::new(10, 10);
        let result = Crop.process(buf, &with_ratio(0.01)).unwrap();
        assert_eq!((result.width, result.height), (1, 1));
    }

    #[test]
    fn invalid_ratio_rejected() {
        assert!(matches!(
            centered_crop_rect(10, 10, 0.0),
            Err(FilterError::InvalidConfig(_))
        ));
        assert!(matches!(
            centered_crop_rect(0, 10, 0.5),
            Err(FilterError::EmptyImage)
        ));
    }
}
