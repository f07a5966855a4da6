use tracing::warn;

use crate::config::FilterConfig;
use crate::error::{FilterError, Result};
use crate::image_buf::ImageBuf;
use crate::pipeline::module::ProcessingModule;

/// Neutral point shift driven by `warmth` and `tint`.
///
/// The scene is treated as lit by a Planckian illuminant at
/// `REFERENCE_TEMP + warmth` (offset off the locus by `tint`) and adapted
/// back to `REFERENCE_TEMP`. A bluer assumed illuminant pulls blue out of the
/// frame, so positive warmth reads as warmer.
pub struct WhiteBalance;

impl ProcessingModule for WhiteBalance {
    fn name(&self) -> &str {
        "white_balance"
    }

    fn process(&self, mut input: ImageBuf, config: &FilterConfig) -> Result<ImageBuf> {
        if !config.warmth.is_finite() || !config.tint.is_finite() {
            warn!(
                warmth = config.warmth,
                tint = config.tint,
                "non-finite white balance parameters"
            );
            return Err(FilterError::ColorTransformUnavailable);
        }

        let matrix = wb_matrix(REFERENCE_TEMP + config.warmth, config.tint);
        if matrix.iter().any(|v| !v.is_finite()) {
            return Err(FilterError::ColorTransformUnavailable);
        }
        if is_identity(&matrix) {
            return Ok(input);
        }

        for px in input.data.chunks_exact_mut(3) {
            let (r, g, b) = (px[0], px[1], px[2]);
            px[0] = (matrix[0] * r + matrix[1] * g + matrix[2] * b).max(0.0);
            px[1] = (matrix[3] * r + matrix[4] * g + matrix[5] * b).max(0.0);
            px[2] = (matrix[6] * r + matrix[7] * g + matrix[8] * b).max(0.0);
        }
        Ok(input)
    }
}

fn is_identity(m: &[f32; 9]) -> bool {
    m.iter().enumerate().all(|(i, &v)| {
        let want = if i % 4 == 0 { 1.0 } else { 0.0 };
        (v - want).abs() < 1e-6
    })
}

// sRGB <-> XYZ (IEC 61966-2-1, D65) and the Bradford cone response matrix.
//
//   linear sRGB -> XYZ -> Bradford LMS -> scale -> LMS^-1 -> XYZ -> linear sRGB
//
// The chain collapses to a single 3x3 evaluated once per frame.

const SRGB_TO_XYZ: [f64; 9] = [
    0.4123907993,
    0.3575843394,
    0.1804807884,
    0.2126390059,
    0.7151686788,
    0.0721923154,
    0.0193308187,
    0.1191947798,
    0.9505321522,
];

const XYZ_TO_SRGB: [f64; 9] = [
    3.2409699419,
    -1.5373831776,
    -0.4986107603,
    -0.9692436363,
    1.8759675015,
    0.0415550574,
    0.0556300797,
    -0.2039769589,
    1.0569715142,
];

const BRADFORD: [f64; 9] = [
    0.8951000, 0.2664000, -0.1614000, -0.7502000, 1.7135000, 0.0367000, 0.0389000, -0.0685000,
    1.0296000,
];

const BRADFORD_INV: [f64; 9] = [
    0.9869929, -0.1470543, 0.1599627, 0.4323053, 0.5183603, 0.0492912, -0.0085287, 0.0400428,
    0.9684867,
];

/// Colour temperature (K) that maps to "no shift".
pub const REFERENCE_TEMP: f64 = 6500.0;

const MIN_TEMP: f64 = 1667.0;
const MAX_TEMP: f64 = 25000.0;

/// Linear sRGB matrix adapting an illuminant at `temp` K (plus `tint`) to
/// the reference white.
pub fn wb_matrix(temp: f64, tint: f64) -> [f32; 9] {
    let temp = temp.clamp(MIN_TEMP, MAX_TEMP);

    let (sx, sy) = planckian_with_tint(temp, tint);
    let (dx, dy) = planckian_xy(REFERENCE_TEMP);
    let adapt = bradford_cat(&xy_to_xyz(sx, sy), &xy_to_xyz(dx, dy));

    let combined = mat3_mul(&XYZ_TO_SRGB, &mat3_mul(&adapt, &SRGB_TO_XYZ));
    combined.map(|v| v as f32)
}

/// CIE xy of a blackbody at `t` K, cubic fit by Kang et al. (2002).
fn planckian_xy(t: f64) -> (f64, f64) {
    let t2 = t * t;
    let t3 = t2 * t;

    let x = if t <= 4000.0 {
        -0.2661239e9 / t3 - 0.2343589e6 / t2 + 0.8776956e3 / t + 0.179910
    } else {
        -3.0258469e9 / t3 + 2.1070379e6 / t2 + 0.2226347e3 / t + 0.240390
    };

    let x2 = x * x;
    let x3 = x2 * x;

    let y = if t <= 2222.0 {
        -1.1063814 * x3 - 1.34811020 * x2 + 2.18555832 * x - 0.20219683
    } else if t <= 4000.0 {
        -0.9549476 * x3 - 1.37418593 * x2 + 2.09137015 * x - 0.16748867
    } else {
        3.0817580 * x3 - 5.87338670 * x2 + 3.75112997 * x - 0.37001483
    };

    (x, y)
}

/// Step off the locus along its normal in CIE 1960 UCS.
/// Positive tint lands below the locus (magenta), negative above (green).
/// One tint unit is 1/3000 Duv.
fn planckian_with_tint(temp: f64, tint: f64) -> (f64, f64) {
    let (x0, y0) = planckian_xy(temp);
    if tint.abs() < 1e-6 {
        return (x0, y0);
    }

    let (u0, v0) = xy_to_uv60(x0, y0);

    let dt = 50.0;
    let (xl, yl) = planckian_xy((temp - dt).max(MIN_TEMP));
    let (xh, yh) = planckian_xy((temp + dt).min(MAX_TEMP));
    let (ul, vl) = xy_to_uv60(xl, yl);
    let (uh, vh) = xy_to_uv60(xh, yh);

    let du = uh - ul;
    let dv = vh - vl;
    let len = (du * du + dv * dv).sqrt();
    let (nu, nv) = (dv / len, -du / len);

    let duv = tint / 3000.0;
    uv60_to_xy(u0 + nu * duv, v0 + nv * duv)
}

fn xy_to_uv60(x: f64, y: f64) -> (f64, f64) {
    let d = -2.0 * x + 12.0 * y + 3.0;
    (4.0 * x / d, 6.0 * y / d)
}

fn uv60_to_xy(u: f64, v: f64) -> (f64, f64) {
    let d = 2.0 * u - 8.0 * v + 4.0;
    (3.0 * u / d, 2.0 * v / d)
}

fn xy_to_xyz(x: f64, y: f64) -> [f64; 3] {
    if y.abs() < 1e-10 {
        return [0.0, 1.0, 0.0];
    }
    [x / y, 1.0, (1.0 - x - y) / y]
}

/// `M_A^-1 * diag(dst_lms / src_lms) * M_A`
fn bradford_cat(src_xyz: &[f64; 3], dst_xyz: &[f64; 3]) -> [f64; 9] {
    let src = mat3_vec(&BRADFORD, src_xyz);
    let dst = mat3_vec(&BRADFORD, dst_xyz);

    let scale = [
        dst[0] / src[0],
        0.0,
        0.0,
        0.0,
        dst[1] / src[1],
        0.0,
        0.0,
        0.0,
        dst[2] / src[2],
    ];

    mat3_mul(&BRADFORD_INV, &mat3_mul(&scale, &BRADFORD))
}

fn mat3_mul(a: &[f64; 9], b: &[f64; 9]) -> [f64; 9] {
    let mut out = [0.0_f64; 9];
    for row in 0..3 {
        for col in 0..3 {
            out[row * 3 + col] =
                a[row * 3] * b[col] + a[row * 3 + 1] * b[3 + col] + a[row * 3 + 2] * b[6 + col];
        }
    }
    out
}

fn mat3_vec(m: &[f64; 9], v: &[f64; 3]) -> [f64; 3] {
    [
        m[0] * v[0] + m[1] * v[1] + m[2] * v[2],
        m[3] * v[0] + m[4] * v[1] + m[5] * v[2],
        m[6] * v[0] + m[7] * v[1] + m[8] * v[2],
    ]
}
