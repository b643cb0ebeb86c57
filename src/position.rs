use crate::config::PlacementConfig;
use crate::geometry::{Orientation, ScreenGeometry};

/// Where to place the overlay, or a decision not to show it at all.
///
/// `Disabled` is produced when the aspect filter rejects the current screen,
/// when no display is available, and when the anchor would push any part of
/// the image off the top or left edge — a partially off-screen overlay is
/// suppressed, not cropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    At { left: i32, top: i32 },
    Disabled,
}

/// Compute the overlay's top-left pixel position.
///
/// Pure and deterministic: identical inputs always yield the same output.
/// The bitmap size is the already-scaled size in pixels.
///
/// With `rotate_lock` set the fractional anchor is remapped so the image
/// stays at the same *physical* spot on the device when the OS rotates the
/// logical screen; `geometry.width`/`height` are always the current
/// (post-rotation) bounds.
pub fn compute(
    geometry: ScreenGeometry,
    config: &PlacementConfig,
    bitmap_width: u32,
    bitmap_height: u32,
) -> Position {
    if geometry.is_empty() {
        return Position::Disabled;
    }

    if config.aspect_filter > 0.0 {
        let (long, short) = if geometry.width >= geometry.height {
            (geometry.width as f64, geometry.height as f64)
        } else {
            (geometry.height as f64, geometry.width as f64)
        };
        // Compare at two decimal places so 1920/1080 matches a configured 1.78.
        if (100.0 * config.aspect_filter).round() != (100.0 * long / short).round() {
            return Position::Disabled;
        }
    }

    let w = geometry.width as f64;
    let h = geometry.height as f64;
    // Integer halving, matching how the reference behavior centres the image.
    let half_w = (bitmap_width / 2) as f64;
    let half_h = (bitmap_height / 2) as f64;
    let x = config.x_frac;
    let y = config.y_frac;

    let (left, top) = if config.rotate_lock {
        match geometry.orientation {
            Orientation::Deg90 => ((1.0 - y) * w - half_w, x * h - half_h),
            Orientation::Deg180 => ((1.0 - x) * w - half_w, (1.0 - y) * h - half_h),
            Orientation::Deg270 => (y * w - half_w, (1.0 - x) * h - half_h),
            Orientation::Deg0 => (x * w - half_w, y * h - half_h),
        }
    } else {
        (x * w - half_w, y * h - half_h)
    };

    // Round half away from zero.
    let left = left.round() as i32;
    let top = top.round() as i32;

    if left < 0 || top < 0 {
        Position::Disabled
    } else {
        Position::At { left, top }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn geom(width: i32, height: i32, orientation: Orientation) -> ScreenGeometry {
        ScreenGeometry {
            width,
            height,
            orientation,
        }
    }

    fn cfg(x_frac: f64, y_frac: f64) -> PlacementConfig {
        PlacementConfig {
            x_frac,
            y_frac,
            scale: 2.0,
            opacity: 0.4,
            aspect_filter: 0.0,
            rotate_lock: false,
            ..Default::default()
        }
    }

    #[test]
    fn centred_on_landscape_screen() {
        let position = compute(geom(1920, 1080, Orientation::Deg0), &cfg(0.5, 0.5), 200, 200);
        assert_eq!(position, Position::At { left: 860, top: 440 });
    }

    #[test]
    fn rotate_lock_remaps_quarter_turn() {
        // Physical 1920x1080 panel rotated 90°: logical bounds become 1080x1920.
        let mut config = cfg(0.5, 0.5);
        config.rotate_lock = true;
        let position = compute(geom(1080, 1920, Orientation::Deg90), &config, 200, 200);
        assert_eq!(position, Position::At { left: 440, top: 860 });
    }

    #[test]
    fn rotate_lock_remaps_half_turn() {
        let mut config = cfg(0.25, 0.75);
        config.rotate_lock = true;
        let position = compute(geom(1920, 1080, Orientation::Deg180), &config, 100, 100);
        // left = (1-0.25)*1920 - 50, top = (1-0.75)*1080 - 50
        assert_eq!(
            position,
            Position::At {
                left: 1390,
                top: 220
            }
        );
    }

    #[test]
    fn rotate_lock_remaps_three_quarter_turn() {
        let mut config = cfg(0.25, 0.75);
        config.rotate_lock = true;
        let position = compute(geom(1080, 1920, Orientation::Deg270), &config, 100, 100);
        // left = 0.75*1080 - 50, top = (1-0.25)*1920 - 50
        assert_eq!(
            position,
            Position::At {
                left: 760,
                top: 1390
            }
        );
    }

    #[test]
    fn without_rotate_lock_position_is_orientation_invariant() {
        let config = cfg(0.3, 0.6);
        let expected = compute(geom(1600, 900, Orientation::Deg0), &config, 64, 64);
        for orientation in [Orientation::Deg90, Orientation::Deg180, Orientation::Deg270] {
            assert_eq!(compute(geom(1600, 900, orientation), &config, 64, 64), expected);
        }
    }

    #[test]
    fn aspect_filter_accepts_matching_ratio() {
        let mut config = cfg(0.5, 0.5);
        config.aspect_filter = 1.78;
        // 1920/1080 = 1.777... rounds to 1.78 at two decimals.
        let position = compute(geom(1920, 1080, Orientation::Deg0), &config, 200, 200);
        assert_eq!(position, Position::At { left: 860, top: 440 });
        // Orientation does not matter: the ratio uses long/short.
        let rotated = compute(geom(1080, 1920, Orientation::Deg90), &config, 200, 200);
        assert_ne!(rotated, Position::Disabled);
    }

    #[test]
    fn aspect_filter_rejects_other_ratios() {
        let mut config = cfg(0.5, 0.5);
        config.aspect_filter = 1.78;
        assert_eq!(
            compute(geom(1080, 1080, Orientation::Deg0), &config, 200, 200),
            Position::Disabled
        );
        assert_eq!(
            compute(geom(1920, 1200, Orientation::Deg0), &config, 200, 200),
            Position::Disabled
        );
    }

    #[test]
    fn negative_coordinates_disable_instead_of_clamping() {
        // Anchor at the very left edge: left = 0*W - 100 = -100.
        let position = compute(geom(1920, 1080, Orientation::Deg0), &cfg(0.0, 0.5), 200, 200);
        assert_eq!(position, Position::Disabled);
        // Same for the top edge.
        let position = compute(geom(1920, 1080, Orientation::Deg0), &cfg(0.5, 0.0), 200, 200);
        assert_eq!(position, Position::Disabled);
    }

    #[test]
    fn zero_size_geometry_disables() {
        assert_eq!(
            compute(geom(0, 0, Orientation::Deg0), &cfg(0.5, 0.5), 10, 10),
            Position::Disabled
        );
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        // 0.5 * 201 = 100.5 → 101, not banker's 100.
        let position = compute(geom(201, 100, Orientation::Deg0), &cfg(0.5, 0.0), 1, 1);
        assert_eq!(position, Position::At { left: 101, top: 0 });
    }

    #[test]
    fn odd_bitmap_sizes_use_integer_halving() {
        // half extent of a 101-wide bitmap is 50, not 50.5
        let position = compute(geom(1000, 1000, Orientation::Deg0), &cfg(0.5, 0.5), 101, 101);
        assert_eq!(position, Position::At { left: 450, top: 450 });
    }

    #[test]
    fn compute_is_idempotent() {
        let config = cfg(0.37, 0.81);
        let geometry = geom(2560, 1440, Orientation::Deg0);
        assert_eq!(
            compute(geometry, &config, 333, 124),
            compute(geometry, &config, 333, 124)
        );
    }
}
