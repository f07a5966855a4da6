use std::time::Instant;

use tracing::debug;

use super::ShakeEffect;
use crate::error::{FilterError, Result};
use crate::image_buf::ImageBuf;

/// Apply `effect` to `image`. The output has exactly the input's extent.
///
/// The frame's border is extended infinitely before transforming, so shifted
/// or rotated content never exposes empty corners. Translation and rotation
/// (about the centre) are one affine warp; the blur runs on the warped frame.
pub fn apply_shake(image: &ImageBuf, effect: &ShakeEffect) -> Result<ImageBuf> {
    if image.is_empty() {
        return Err(FilterError::EmptyImage);
    }
    let start = Instant::now();

    let warped = warp(image, effect);
    let out = directional_blur(&warped, effect.motion_blur_radius, effect.motion_blur_angle);

    debug!(
        width = out.width,
        height = out.height,
        elapsed_ms = start.elapsed().as_millis() as u64,
        "shake applied"
    );
    Ok(out)
}

/// Inverse-map every output pixel through shift + rotation and sample
/// bilinearly. Angles and `shift_y` are in a Y-up frame; rows are stored
/// top to bottom, hence the sign flips on y.
fn warp(image: &ImageBuf, effect: &ShakeEffect) -> ImageBuf {
    if effect.shift_x == 0.0 && effect.shift_y == 0.0 && effect.rotation == 0.0 {
        return image.clone();
    }

    let (w, h) = (image.width, image.height);
    let cx = w as f64 / 2.0;
    let cy = h as f64 / 2.0;
    let (sin, cos) = effect.rotation.to_radians().sin_cos();

    let mut data = Vec::with_capacity(image.data.len());
    for y in 0..h {
        let dy_up = -((y as f64 + 0.5) - cy);
        for x in 0..w {
            let dx = (x as f64 + 0.5) - cx;
            let ix = cos * dx + sin * dy_up;
            let iy_up = -sin * dx + cos * dy_up;
            let sx = cx + ix - effect.shift_x;
            let sy = cy - iy_up + effect.shift_y;
            data.extend_from_slice(&image.sample_bilinear(sx as f32, sy as f32));
        }
    }

    ImageBuf {
        width: w,
        height: h,
        data,
    }
}

/// Average `2 * ceil(radius) + 1` samples spread evenly over
/// `[-radius, radius]` along `angle_deg`.
fn directional_blur(image: &ImageBuf, radius: f64, angle_deg: f64) -> ImageBuf {
    if !(radius > 0.0) || !radius.is_finite() {
        return image.clone();
    }

    let taps = 2 * radius.ceil() as usize + 1;
    let (sin, cos) = angle_deg.to_radians().sin_cos();
    let (dx, dy) = (cos, -sin);
    let offsets: Vec<(f32, f32)> = (0..taps)
        .map(|k| {
            let t = -radius + 2.0 * radius * k as f64 / (taps - 1) as f64;
            ((t * dx) as f32, (t * dy) as f32)
        })
        .collect();
    let inv = 1.0 / taps as f32;

    let mut data = Vec::with_capacity(image.data.len());
    for y in 0..image.height {
        let py = y as f32 + 0.5;
        for x in 0..image.width {
            let px = x as f32 + 0.5;
            let mut acc = [0.0_f32; 3];
            for &(ox, oy) in &offsets {
                let s = image.sample_bilinear(px + ox, py + oy);
                acc[0] += s[0];
                acc[1] += s[1];
                acc[2] += s[2];
            }
            data.extend(acc.iter().map(|v| v * inv));
        }
    }

    ImageBuf {
        width: image.width,
        height: image.height,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp(w: u32, h: u32) -> ImageBuf {
        let data = (0..w * h)
            .flat_map(|i| {
                let v = (i % w) as f32 / w as f32;
                [v, 0.5, 1.0 - v]
            })
            .collect();
        ImageBuf::from_data(w, h, data).unwrap()
    }

    #[test]
    fn identity_effect_is_noop() {
        let img = ramp(8, 6);
        let out = apply_shake(&img, &ShakeEffect::default()).unwrap();
        assert_eq!(out, img);
    }

    #[test]
    fn extent_is_preserved() {
        let img = ramp(33, 17);
        let effect = ShakeEffect {
            shift_x: 4.2,
            shift_y: -3.1,
            rotation: 0.5,
            motion_blur_radius: 2.7,
            motion_blur_angle: 123.0,
        };
        let out = apply_shake(&img, &effect).unwrap();
        assert_eq!((out.width, out.height), (33, 17));
        assert!(out.data.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn positive_shift_x_moves_content_right() {
        let mut img = ImageBuf::new(5, 1);
        img.data[2 * 3] = 1.0; // bright pixel at x = 2
        let effect = ShakeEffect {
            shift_x: 1.0,
            ..Default::default()
        };
        let out = apply_shake(&img, &effect).unwrap();
        assert_eq!(out.pixel(3, 0)[0], 1.0);
        assert_eq!(out.pixel(2, 0)[0], 0.0);
    }

    #[test]
    fn positive_shift_y_moves_content_up() {
        let mut img = ImageBuf::new(1, 5);
        img.data[2 * 3] = 1.0; // bright pixel at row 2
        let effect = ShakeEffect {
            shift_y: 1.0,
            ..Default::default()
        };
        let out = apply_shake(&img, &effect).unwrap();
        assert_eq!(out.pixel(0, 1)[0], 1.0);
        assert_eq!(out.pixel(0, 2)[0], 0.0);
    }

    #[test]
    fn edges_extend_instead_of_going_black() {
        let img = ImageBuf::filled(10, 10, [0.6, 0.6, 0.6]);
        let effect = ShakeEffect {
            shift_x: 5.0,
            shift_y: 5.0,
            rotation: 0.5,
            motion_blur_radius: 3.0,
            motion_blur_angle: 30.0,
        };
        let out = apply_shake(&img, &effect).unwrap();
        for &v in &out.data {
            assert!((v - 0.6).abs() < 1e-5, "{v}");
        }
    }

    #[test]
    fn rotation_is_counter_clockwise() {
        // Bright pixel right of centre on a 9x9 frame ends up above centre
        // after a 90 degree turn.
        let mut img = ImageBuf::new(9, 9);
        let idx = (4 * 9 + 8) * 3;
        img.data[idx] = 1.0;
        let effect = ShakeEffect {
            rotation: 90.0,
            ..Default::default()
        };
        let out = apply_shake(&img, &effect).unwrap();
        assert!(out.pixel(4, 0)[0] > 0.99, "{:?}", out.pixel(4, 0));
        assert!(out.pixel(8, 4)[0] < 0.01);
    }

    #[test]
    fn horizontal_blur_spreads_along_x_only() {
        let mut img = ImageBuf::new(9, 3);
        img.data[(9 + 4) * 3] = 1.0; // centre pixel
        let out = directional_blur(&img, 1.0, 0.0);
        // three taps at -1, 0, +1
        assert!((out.pixel(3, 1)[0] - 1.0 / 3.0).abs() < 1e-6);
        assert!((out.pixel(4, 1)[0] - 1.0 / 3.0).abs() < 1e-6);
        assert!((out.pixel(5, 1)[0] - 1.0 / 3.0).abs() < 1e-6);
        assert!(out.pixel(4, 0)[0].abs() < 1e-6);
        assert!(out.pixel(4, 2)[0].abs() < 1e-6);
    }

    #[test]
    fn empty_image_rejected() {
        let err = apply_shake(&ImageBuf::new(0, 3), &ShakeEffect::default());
        assert!(matches!(err, Err(FilterError::EmptyImage)));
    }
}
