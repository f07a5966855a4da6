//! Hand-shake simulation: a small random translation and rotation followed
//! by a directional motion blur, drawn once per captured still.

mod random;
mod render;

pub use random::{RandomSource, SeededRandom, ThreadRandom};
pub use render::apply_shake;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::FilterConfig;

/// Rotation rate around each device axis, rad/s.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// One capture's worth of simulated shake.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ShakeEffect {
    /// Pixels, positive moves content right.
    pub shift_x: f64,
    /// Pixels, positive moves content up.
    pub shift_y: f64,
    /// Degrees, counter-clockwise.
    pub rotation: f64,
    pub motion_blur_radius: f64,
    /// Degrees, counter-clockwise from +x.
    pub motion_blur_angle: f64,
}

impl ShakeEffect {
    /// Draw a fresh effect from the ranges in `config`.
    ///
    /// With a motion sample the blur follows the sensed rotation
    /// (`atan2(y, x)` in degrees); otherwise the angle is uniform in [0, 360).
    pub fn generate(
        motion: Option<MotionSample>,
        config: &FilterConfig,
        rng: &mut impl RandomSource,
    ) -> Self {
        let shift = config.shake_shift_range;
        let rotation = config.shake_rotation_range;
        let blur = config.motion_blur_radius_range;

        let shift_x = rng.uniform(shift.lower, shift.upper);
        let shift_y = rng.uniform(shift.lower, shift.upper);
        let rotation = rng.uniform(rotation.lower, rotation.upper);
        let motion_blur_radius = rng.uniform(blur.lower, blur.upper);
        let motion_blur_angle = match motion {
            Some(m) => m.y.atan2(m.x).to_degrees(),
            None => rng.uniform(0.0, 360.0) % 360.0,
        };

        let effect = Self {
            shift_x,
            shift_y,
            rotation,
            motion_blur_radius,
            motion_blur_angle,
        };
        debug!(?effect, sensed = motion.is_some(), "shake generated");
        effect
    }

    pub fn is_identity(&self) -> bool {
        self.shift_x == 0.0
            && self.shift_y == 0.0
            && self.rotation == 0.0
            && self.motion_blur_radius <= 0.0
    }
}
