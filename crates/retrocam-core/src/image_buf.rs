use crate::color::{linear_to_srgb_u8, srgb_u8_to_linear};
use crate::error::{FilterError, Result};

/// Linear f32 RGB image buffer.
///
/// All pixel data is stored as interleaved RGBRGBRGB... in linear light,
/// rows top to bottom. Frames handed to the pipeline are opaque; alpha is
/// dropped on the way in and written back as 255.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageBuf {
    pub width: u32,
    pub height: u32,
    /// Flat pixel data: [R, G, B, R, G, B, ...] in linear f32.
    pub data: Vec<f32>,
}

impl ImageBuf {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; (width as usize) * (height as usize) * 3],
        }
    }

    /// Buffer filled with a single linear RGB colour.
    pub fn filled(width: u32, height: u32, rgb: [f32; 3]) -> Self {
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 3);
        for _ in 0..(width as usize) * (height as usize) {
            data.extend_from_slice(&rgb);
        }
        Self {
            width,
            height,
            data,
        }
    }

    pub fn from_data(width: u32, height: u32, data: Vec<f32>) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * 3;
        if data.len() != expected {
            return Err(FilterError::BufferSize {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Decode tightly packed sRGB RGBA8 into linear RGB.
    pub fn from_rgba8_srgb(width: u32, height: u32, rgba: &[u8]) -> Result<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if rgba.len() != expected {
            return Err(FilterError::BufferSize {
                width,
                height,
                expected,
                actual: rgba.len(),
            });
        }
        let mut data = Vec::with_capacity((width as usize) * (height as usize) * 3);
        for px in rgba.chunks_exact(4) {
            data.push(srgb_u8_to_linear(px[0]));
            data.push(srgb_u8_to_linear(px[1]));
            data.push(srgb_u8_to_linear(px[2]));
        }
        Ok(Self {
            width,
            height,
            data,
        })
    }

    /// Convert to RGBA u8 with sRGB gamma for display/encoding.
    pub fn to_rgba_u8_srgb(&self) -> Vec<u8> {
        let mut out = vec![0u8; self.pixel_count() * 4];
        self.write_rgba8_srgb(&mut out);
        out
    }

    /// Encode into an existing RGBA8 buffer of exactly `width * height * 4` bytes.
    ///
    /// Extra trailing bytes in `out` are left untouched.
    pub fn write_rgba8_srgb(&self, out: &mut [u8]) {
        for (dst, src) in out.chunks_exact_mut(4).zip(self.data.chunks_exact(3)) {
            dst[0] = linear_to_srgb_u8(src[0]);
            dst[1] = linear_to_srgb_u8(src[1]);
            dst[2] = linear_to_srgb_u8(src[2]);
            dst[3] = 255;
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    pub fn pixel(&self, x: u32, y: u32) -> [f32; 3] {
        let idx = ((y as usize) * (self.width as usize) + x as usize) * 3;
        [self.data[idx], self.data[idx + 1], self.data[idx + 2]]
    }

    /// Pixel lookup with coordinates clamped to the buffer edges, so the
    /// border extends infinitely in every direction.
    pub fn pixel_clamped(&self, x: i64, y: i64) -> [f32; 3] {
        let x = x.clamp(0, self.width as i64 - 1) as u32;
        let y = y.clamp(0, self.height as i64 - 1) as u32;
        self.pixel(x, y)
    }

    /// Bilinear sample at a continuous position (pixel centres at `i + 0.5`),
    /// clamping to the edges.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> [f32; 3] {
        let fx = x - 0.5;
        let fy = y - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let p00 = self.pixel_clamped(x0, y0);
        let p10 = self.pixel_clamped(x0 + 1, y0);
        let p01 = self.pixel_clamped(x0, y0 + 1);
        let p11 = self.pixel_clamped(x0 + 1, y0 + 1);

        let mut out = [0.0_f32; 3];
        for c in 0..3 {
            let top = p00[c] + (p10[c] - p00[c]) * tx;
            let bottom = p01[c] + (p11[c] - p01[c]) * tx;
            out[c] = top + (bottom - top) * ty;
        }
        out
    }

    /// Copy out the `width` x `height` region starting at (`x`, `y`).
    /// The region is clipped to the buffer and never smaller than 1x1.
    pub fn crop(&self, x: u32, y: u32, width: u32, height: u32) -> Self {
        let src_x = x.min(self.width.saturating_sub(1));
        let src_y = y.min(self.height.saturating_sub(1));
        let dst_w = width.min(self.width - src_x).max(1);
        let dst_h = height.min(self.height - src_y).max(1);

        let mut data = Vec::with_capacity((dst_w as usize) * (dst_h as usize) * 3);
        for row in src_y..(src_y + dst_h) {
            let row_start = ((row as usize) * (self.width as usize) + src_x as usize) * 3;
            let row_end = row_start + (dst_w as usize) * 3;
            data.extend_from_slice(&self.data[row_start..row_end]);
        }

        Self {
            width: dst_w,
            height: dst_h,
            data,
        }
    }

    /// Resample to exactly `new_w` x `new_h` using box averaging.
    /// Intended for reductions; each destination pixel averages the source
    /// pixels it covers (at least one).
    pub fn resize_box(&self, new_w: u32, new_h: u32) -> Self {
        if new_w == self.width && new_h == self.height {
            return self.clone();
        }
        let new_w = new_w.max(1);
        let new_h = new_h.max(1);
        let scale_x = new_w as f32 / self.width as f32;
        let scale_y = new_h as f32 / self.height as f32;

        let mut data = Vec::with_capacity((new_w as usize) * (new_h as usize) * 3);

        for dst_y in 0..new_h {
            let src_y0 = ((dst_y as f32 / scale_y) as u32).min(self.height - 1);
            let src_y1 = (((dst_y + 1) as f32 / scale_y).ceil() as u32)
                .min(self.height)
                .max(src_y0 + 1);
            for dst_x in 0..new_w {
                let src_x0 = ((dst_x as f32 / scale_x) as u32).min(self.width - 1);
                let src_x1 = (((dst_x + 1) as f32 / scale_x).ceil() as u32)
                    .min(self.width)
                    .max(src_x0 + 1);

                let mut r = 0.0_f32;
                let mut g = 0.0_f32;
                let mut b = 0.0_f32;
                let mut count = 0u32;

                for sy in src_y0..src_y1 {
                    for sx in src_x0..src_x1 {
                        let idx = ((sy as usize) * (self.width as usize) + sx as usize) * 3;
                        r += self.data[idx];
                        g += self.data[idx + 1];
                        b += self.data[idx + 2];
                        count += 1;
                    }
                }

                let inv = 1.0 / count as f32;
                data.push(r * inv);
                data.push(g * inv);
                data.push(b * inv);
            }
        }

        Self {
            width: new_w,
            height: new_h,
            data,
        }
    }
}
