use std::sync::LazyLock;

/// Rec.709 / sRGB luma weights for linear RGB.
pub const LUMA_R: f32 = 0.2126;
pub const LUMA_G: f32 = 0.7152;
pub const LUMA_B: f32 = 0.0722;

pub fn luma(r: f32, g: f32, b: f32) -> f32 {
    LUMA_R * r + LUMA_G * g + LUMA_B * b
}

/// Inverse sRGB EOTF (IEC 61966-2-1): linear light [0,1] -> perceptual sRGB [0,1].
pub fn linear_to_srgb(x: f32) -> f32 {
    if x <= 0.0031308 {
        12.92 * x
    } else {
        1.055 * x.powf(1.0 / 2.4) - 0.055
    }
}

/// sRGB EOTF (IEC 61966-2-1): perceptual sRGB [0,1] -> linear light [0,1].
pub fn srgb_to_linear(x: f32) -> f32 {
    if x <= 0.04045 {
        x / 12.92
    } else {
        ((x + 0.055) / 1.055).powf(2.4)
    }
}

/// Perfect 256-entry LUT for u8 sRGB -> linear f32.
static SRGB_U8_TO_LINEAR: LazyLock<[f32; 256]> = LazyLock::new(|| {
    let mut lut = [0.0f32; 256];
    for (i, entry) in lut.iter_mut().enumerate() {
        *entry = srgb_to_linear(i as f32 / 255.0);
    }
    lut
});

const SRGB_LUT_SIZE: usize = 4096;

static LINEAR_TO_SRGB_U8: LazyLock<[u8; SRGB_LUT_SIZE]> = LazyLock::new(|| {
    let mut lut = [0u8; SRGB_LUT_SIZE];
    for (i, entry) in lut.iter_mut().enumerate() {
        let v = i as f32 / (SRGB_LUT_SIZE - 1) as f32;
        *entry = (linear_to_srgb(v) * 255.0 + 0.5) as u8;
    }
    lut
});

pub fn srgb_u8_to_linear(v: u8) -> f32 {
    SRGB_U8_TO_LINEAR[v as usize]
}

pub fn linear_to_srgb_u8(v: f32) -> u8 {
    let v = v.clamp(0.0, 1.0);
    let idx = (v * (SRGB_LUT_SIZE - 1) as f32) as usize;
    LINEAR_TO_SRGB_U8[idx]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn srgb_roundtrip() {
        for i in 0..=100 {
            let x = i as f32 / 100.0;
            let rt = srgb_to_linear(linear_to_srgb(x));
            assert!((rt - x).abs() < 1e-5, "roundtrip failed at {x}: got {rt}");
        }
    }

    #[test]
    fn srgb_endpoints() {
        assert!((linear_to_srgb(0.0)).abs() < 1e-7);
        assert!((linear_to_srgb(1.0) - 1.0).abs() < 1e-7);
        assert!((srgb_to_linear(0.0)).abs() < 1e-7);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-7);
    }

    #[test]
    fn srgb_monotonic() {
        let mut prev = 0.0_f32;
        for i in 1..=1000 {
            let x = i as f32 / 1000.0;
            let y = linear_to_srgb(x);
            assert!(y > prev, "not monotonic at {x}: {y} <= {prev}");
            prev = y;
        }
    }

    #[test]
    fn u8_lut_matches_exact() {
        assert_eq!(srgb_u8_to_linear(0), 0.0);
        assert!((srgb_u8_to_linear(255) - 1.0).abs() < 0.001);
        assert!((srgb_u8_to_linear(128) - srgb_to_linear(128.0 / 255.0)).abs() < 1e-6);
    }

    #[test]
    fn u8_roundtrip_is_lossless() {
        for v in 0..=255u8 {
            let back = linear_to_srgb_u8(srgb_u8_to_linear(v));
            assert!(
                (back as i32 - v as i32).abs() <= 1,
                "u8 {v} came back as {back}"
            );
        }
    }

    #[test]
    fn linear_to_u8_clamps() {
        assert_eq!(linear_to_srgb_u8(-0.5), 0);
        assert_eq!(linear_to_srgb_u8(2.0), 255);
    }

    #[test]
    fn luma_of_white_is_one() {
        assert!((luma(1.0, 1.0, 1.0) - 1.0).abs() < 1e-6);
    }
}
