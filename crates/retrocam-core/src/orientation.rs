use serde::{Deserialize, Serialize};

use crate::image_buf::ImageBuf;

/// EXIF orientation tag (values 1..=8). Rotations are clockwise and
/// describe what must be done to the stored pixels to display them upright.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Normal,
    MirrorHorizontal,
    Rotate180,
    MirrorVertical,
    /// Mirror horizontally, then rotate 270.
    Transpose,
    Rotate90,
    /// Mirror horizontally, then rotate 90.
    Transverse,
    Rotate270,
}

impl Orientation {
    /// Unknown or out-of-range values read as `Normal`.
    pub fn from_exif(value: u32) -> Self {
        match value {
            2 => Orientation::MirrorHorizontal,
            3 => Orientation::Rotate180,
            4 => Orientation::MirrorVertical,
            5 => Orientation::Transpose,
            6 => Orientation::Rotate90,
            7 => Orientation::Transverse,
            8 => Orientation::Rotate270,
            _ => Orientation::Normal,
        }
    }

    pub fn exif_value(self) -> u32 {
        match self {
            Orientation::Normal => 1,
            Orientation::MirrorHorizontal => 2,
            Orientation::Rotate180 => 3,
            Orientation::MirrorVertical => 4,
            Orientation::Transpose => 5,
            Orientation::Rotate90 => 6,
            Orientation::Transverse => 7,
            Orientation::Rotate270 => 8,
        }
    }

    /// Whether upright display swaps width and height.
    pub fn swaps_dimensions(self) -> bool {
        matches!(
            self,
            Orientation::Transpose
                | Orientation::Rotate90
                | Orientation::Transverse
                | Orientation::Rotate270
        )
    }
}

/// Bake `orientation` into pixel order so the result displays upright with
/// no tag. Geometry steps must run on the normalized buffer.
pub fn normalize_orientation(image: ImageBuf, orientation: Orientation) -> ImageBuf {
    if orientation == Orientation::Normal || image.is_empty() {
        return image;
    }

    let (w, h) = (image.width, image.height);
    let (out_w, out_h) = if orientation.swaps_dimensions() {
        (h, w)
    } else {
        (w, h)
    };

    let mut data = Vec::with_capacity(image.data.len());
    for y in 0..out_h {
        for x in 0..out_w {
            let (sx, sy) = match orientation {
                Orientation::Normal => (x, y),
                Orientation::MirrorHorizontal => (w - 1 - x, y),
                Orientation::Rotate180 => (w - 1 - x, h - 1 - y),
                Orientation::MirrorVertical => (x, h - 1 - y),
                Orientation::Transpose => (y, x),
                Orientation::Rotate90 => (y, h - 1 - x),
                Orientation::Transverse => (w - 1 - y, h - 1 - x),
                Orientation::Rotate270 => (w - 1 - y, x),
            };
            data.extend_from_slice(&image.pixel(sx, sy));
        }
    }

    ImageBuf {
        width: out_w,
        height: out_h,
        data,
    }
}
