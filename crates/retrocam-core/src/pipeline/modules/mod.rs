mod crop;
mod downscale;
mod highlight_tint;
mod saturation;
mod white_balance;

pub use crop::{Crop, centered_crop_rect};
pub use downscale::{Downscale, downscale_size};
pub use highlight_tint::HighlightTint;
pub use saturation::Saturation;
pub use white_balance::{REFERENCE_TEMP, WhiteBalance, wb_matrix};
