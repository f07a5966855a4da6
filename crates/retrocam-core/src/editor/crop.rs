use crate::config::AspectRatio;
use crate::error::{FilterError, Result};
use crate::geometry::{MIN_CROP_SIZE, Rect};
use crate::image_buf::ImageBuf;

/// Crop to `rect`, given in image space (origin bottom-left, y up).
///
/// The rectangle is intersected with the frame, raised to the minimum crop
/// size where the frame allows it, and pushed back inside if that made it
/// overflow the right or top edge.
pub fn crop_image(image: &ImageBuf, rect: Rect) -> Result<ImageBuf> {
    if !(rect.width > 0.0 && rect.height > 0.0) {
        return Err(FilterError::EmptyCrop);
    }
    if image.is_empty() {
        return Err(FilterError::EmptyImage);
    }
    let extent = Rect::new(0.0, 0.0, image.width as f64, image.height as f64);
    let mut r = rect.intersection(&extent).ok_or(FilterError::EmptyCrop)?;

    if r.width < MIN_CROP_SIZE {
        r.width = MIN_CROP_SIZE.min(extent.width);
    }
    if r.height < MIN_CROP_SIZE {
        r.height = MIN_CROP_SIZE.min(extent.height);
    }
    if r.max_x() > extent.max_x() {
        r.x = extent.max_x() - r.width;
    }
    if r.max_y() > extent.max_y() {
        r.y = extent.max_y() - r.height;
    }

    Ok(crop_pixels(image, r))
}

/// Largest rectangle of `aspect` centred in `bounds`.
pub fn aspect_crop_rect(bounds: Rect, aspect: AspectRatio) -> Rect {
    let target = aspect.ratio();
    let current = bounds.width / bounds.height;
    if current > target {
        let width = bounds.height * target;
        Rect::new(
            bounds.x + (bounds.width - width) / 2.0,
            bounds.y,
            width,
            bounds.height,
        )
    } else {
        let height = bounds.width / target;
        Rect::new(
            bounds.x,
            bounds.y + (bounds.height - height) / 2.0,
            bounds.width,
            height,
        )
    }
}

/// Centre crop to `aspect`.
pub fn crop_to_aspect(image: &ImageBuf, aspect: AspectRatio) -> Result<ImageBuf> {
    if image.is_empty() {
        return Err(FilterError::EmptyImage);
    }
    let extent = Rect::new(0.0, 0.0, image.width as f64, image.height as f64);
    Ok(crop_pixels(image, aspect_crop_rect(extent, aspect)))
}

/// Snap an in-bounds y-up rectangle to whole pixels and copy it out.
fn crop_pixels(image: &ImageBuf, r: Rect) -> ImageBuf {
    let x = r.x.round().max(0.0) as u32;
    let w = (r.width.round() as u32).max(1);
    let h = (r.height.round() as u32).max(1);
    let top = (image.height as f64 - r.max_y()).round().max(0.0) as u32;
    image.crop(x, top, w, h)
}
