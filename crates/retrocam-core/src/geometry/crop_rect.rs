use super::{CropCorner, CropMode, Rect, Vector};

/// Smallest edge a user crop may shrink to, in the rectangle's own units.
pub const MIN_CROP_SIZE: f64 = 100.0;

/// Resize `current` by dragging `corner` by `delta`; the opposite corner
/// stays put. Fixed modes derive the height from the new width. The result
/// is clamped to `bounds` and then raised to [`MIN_CROP_SIZE`].
///
/// In fixed modes the ratio always survives: when clamping cut one side,
/// the other side shrinks to match, and the size floor scales both sides.
/// The rectangle stays anchored on the corner opposite the drag.
pub fn resize_from_corner(
    current: Rect,
    corner: CropCorner,
    delta: Vector,
    mode: CropMode,
    bounds: Rect,
) -> Rect {
    let mut rect = drag_corner(current, corner, delta);
    if let CropMode::Fixed(ar) = mode {
        rect = lock_aspect(rect, ar.ratio(), corner, current);
    }
    let rect = enforce_minimum(clamp_to_bounds(rect, bounds));
    match mode {
        CropMode::Fixed(ar) => refit_aspect(rect, ar.ratio(), corner, current, bounds),
        _ => rect,
    }
}

/// Translate `current` by `delta` without resizing, keeping it inside `bounds`.
pub fn move_rect(current: Rect, delta: Vector, bounds: Rect) -> Rect {
    let x = (current.x + delta.dx)
        .min(bounds.max_x() - current.width)
        .max(bounds.min_x());
    let y = (current.y + delta.dy)
        .min(bounds.max_y() - current.height)
        .max(bounds.min_y());
    Rect::new(x, y, current.width, current.height)
}

fn drag_corner(r: Rect, corner: CropCorner, d: Vector) -> Rect {
    match corner {
        CropCorner::BottomRight => Rect::new(r.x, r.y, r.width + d.dx, r.height + d.dy),
        CropCorner::BottomLeft => Rect::new(r.x + d.dx, r.y, r.width - d.dx, r.height + d.dy),
        CropCorner::TopRight => Rect::new(r.x, r.y + d.dy, r.width + d.dx, r.height - d.dy),
        CropCorner::TopLeft => Rect::new(r.x + d.dx, r.y + d.dy, r.width - d.dx, r.height - d.dy),
    }
}

/// Top-corner drags keep the previous bottom edge where it was.
fn lock_aspect(r: Rect, ratio: f64, corner: CropCorner, anchor: Rect) -> Rect {
    let height = r.width / ratio;
    match corner {
        CropCorner::BottomLeft | CropCorner::BottomRight => Rect::new(r.x, r.y, r.width, height),
        CropCorner::TopLeft | CropCorner::TopRight => {
            Rect::new(r.x, anchor.max_y() - height, r.width, height)
        }
    }
}

/// Intersect with `bounds`, so an edge pushed past the image is cut rather
/// than the whole rectangle shifted.
fn clamp_to_bounds(r: Rect, bounds: Rect) -> Rect {
    let x = r.x.max(bounds.min_x());
    let y = r.y.max(bounds.min_y());
    let width = (r.max_x().min(bounds.max_x()) - x).max(0.0);
    let height = (r.max_y().min(bounds.max_y()) - y).max(0.0);
    Rect::new(x, y, width, height)
}

/// Largest `ratio` rectangle inside `r` (or the smallest at the size floor),
/// pinned to the corner of `anchor` opposite `corner` and pushed back inside
/// `bounds`.
fn refit_aspect(r: Rect, ratio: f64, corner: CropCorner, anchor: Rect, bounds: Rect) -> Rect {
    let mut width = r.width.min(r.height * ratio);
    let mut height = width / ratio;
    let grow = (MIN_CROP_SIZE / width).max(MIN_CROP_SIZE / height);
    if grow > 1.0 {
        width *= grow;
        height *= grow;
    }

    let (pin_right, pin_bottom) = match corner {
        CropCorner::BottomRight => (false, false),
        CropCorner::BottomLeft => (true, false),
        CropCorner::TopRight => (false, true),
        CropCorner::TopLeft => (true, true),
    };
    let x = if pin_right { anchor.max_x() - width } else { anchor.x };
    let y = if pin_bottom { anchor.max_y() - height } else { anchor.y };
    let x = x.min(bounds.max_x() - width).max(bounds.min_x());
    let y = y.min(bounds.max_y() - height).max(bounds.min_y());
    Rect::new(x, y, width, height)
}

fn enforce_minimum(r: Rect) -> Rect {
    Rect::new(
        r.x,
        r.y,
        r.width.max(MIN_CROP_SIZE),
        r.height.max(MIN_CROP_SIZE),
    )
}
