use serde::{Deserialize, Serialize};

use super::{Rect, Size};

/// Maps rectangles between a display view (origin top-left, y down) and
/// the image (origin bottom-left, y up).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CropCoordinateTransformer {
    pub image_size: Size,
    pub view_size: Size,
}

impl CropCoordinateTransformer {
    pub fn new(image_size: Size, view_size: Size) -> Self {
        Self {
            image_size,
            view_size,
        }
    }

    fn scale_x(&self) -> f64 {
        if self.view_size.width > 0.0 {
            self.image_size.width / self.view_size.width
        } else {
            1.0
        }
    }

    fn scale_y(&self) -> f64 {
        if self.view_size.height > 0.0 {
            self.image_size.height / self.view_size.height
        } else {
            1.0
        }
    }

    pub fn to_image_rect(&self, view: Rect) -> Rect {
        let (sx, sy) = (self.scale_x(), self.scale_y());
        Rect::new(
            view.x * sx,
            (self.view_size.height - view.y - view.height) * sy,
            view.width * sx,
            view.height * sy,
        )
    }

    pub fn to_view_rect(&self, image: Rect) -> Rect {
        let (sx, sy) = (self.scale_x(), self.scale_y());
        let height = image.height / sy;
        Rect::new(
            image.x / sx,
            self.view_size.height - image.y / sy - height,
            image.width / sx,
            height,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transformer() -> CropCoordinateTransformer {
        CropCoordinateTransformer::new(Size::new(4000.0, 3000.0), Size::new(400.0, 300.0))
    }

    #[test]
    fn flips_y_and_scales() {
        let r = transformer().to_image_rect(Rect::new(10.0, 20.0, 100.0, 50.0));
        assert_eq!(r, Rect::new(100.0, 2300.0, 1000.0, 500.0));
    }

    #[test]
    fn top_strip_maps_to_image_top() {
        let t = transformer();
        let r = t.to_image_rect(Rect::new(0.0, 0.0, 400.0, 30.0));
        assert_eq!(r.max_y(), 3000.0);
    }

    #[test]
    fn roundtrip_within_one_pixel() {
        let t = CropCoordinateTransformer::new(Size::new(3264.0, 2448.0), Size::new(393.0, 294.75));
        for view in [
            Rect::new(0.0, 0.0, 393.0, 294.75),
            Rect::new(17.3, 41.9, 120.5, 88.1),
            Rect::new(200.0, 10.0, 150.0, 200.0),
        ] {
            let back = t.to_view_rect(t.to_image_rect(view));
            for (a, b) in [
                (back.x, view.x),
                (back.y, view.y),
                (back.width, view.width),
                (back.height, view.height),
            ] {
                assert!((a - b).abs() < 1.0, "{view:?} -> {back:?}");
            }
        }
    }

    #[test]
    fn zero_view_uses_unit_scale() {
        let t = CropCoordinateTransformer::new(Size::new(4000.0, 3000.0), Size::new(0.0, 0.0));
        let r = t.to_image_rect(Rect::new(10.0, 0.0, 20.0, 30.0));
        assert_eq!(r, Rect::new(10.0, -30.0, 20.0, 30.0));
    }
}
