use super::Vec2;

/// Vertical lift applied to anything standing on a raised cell.
pub const ELEVATION_STEP_PX: f32 = 24.0;

const DEPTH_PER_GRID_SUM: i64 = 100;
const DEPTH_PER_ELEVATION: i64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn in_square(self, size: u32) -> bool {
        let size = size as i64;
        (0..size).contains(&(self.x as i64)) && (0..size).contains(&(self.y as i64))
    }

    pub fn clamped_to_square(self, size: u32) -> Self {
        let max = size.saturating_sub(1).min(i32::MAX as u32) as i32;
        Self {
            x: self.x.clamp(0, max),
            y: self.y.clamp(0, max),
        }
    }

    /// Chebyshev distance; adjacent diagonals count as one step.
    pub fn chebyshev_distance(self, other: GridPos) -> u32 {
        let dx = (self.x as i64 - other.x as i64).unsigned_abs();
        let dy = (self.y as i64 - other.y as i64).unsigned_abs();
        dx.max(dy).min(u32::MAX as u64) as u32
    }
}

/// Grid cell (possibly fractional) to isometric pixel space.
///
/// `tile_size` is the half-width of a tile diamond; the half-height is
/// `tile_size / 2`.
pub fn grid_to_iso(x: f32, y: f32, tile_size: f32) -> Vec2 {
    Vec2 {
        x: (x - y) * tile_size,
        y: (x + y) * tile_size * 0.5,
    }
}

/// Inverse of [`grid_to_iso`], rounded to the nearest cell.
///
/// Halves round up (`floor(v + 0.5)`), so a point exactly on a tile seam
/// always resolves to the cell with the larger index.
pub fn iso_to_grid(iso: Vec2, tile_size: f32) -> GridPos {
    if !(tile_size.is_finite() && tile_size > 0.0) {
        return GridPos::default();
    }
    let a = iso.x as f64 / tile_size as f64;
    let b = iso.y as f64 / (tile_size as f64 * 0.5);
    GridPos {
        x: round_half_up((a + b) * 0.5),
        y: round_half_up((b - a) * 0.5),
    }
}

/// Painter's-order key: larger grid sums draw later, elevation breaks ties.
///
/// Monotone in `x + y` as long as elevations on compared cells differ by
/// fewer than ten levels.
pub fn depth_key(x: i32, y: i32, z: i32) -> i64 {
    (x as i64 + y as i64) * DEPTH_PER_GRID_SUM + z as i64 * DEPTH_PER_ELEVATION
}

fn round_half_up(value: f64) -> i32 {
    if !value.is_finite() {
        return 0;
    }
    (value + 0.5).floor().clamp(i32::MIN as f64, i32::MAX as f64) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE: f32 = 64.0;

    #[test]
    fn integer_cells_round_trip_exactly() {
        for y in -8..44 {
            for x in -8..44 {
                let iso = grid_to_iso(x as f32, y as f32, TILE);
                assert_eq!(iso_to_grid(iso, TILE), GridPos::new(x, y), "cell=({x},{y})");
            }
        }
    }

    #[test]
    fn grid_to_iso_matches_diamond_layout() {
        let iso = grid_to_iso(3.0, 1.0, TILE);
        assert_eq!(iso, Vec2 { x: 128.0, y: 128.0 });
        let plaza = grid_to_iso(17.5, 17.5, TILE);
        assert_eq!(plaza, Vec2 { x: 0.0, y: 1120.0 });
    }

    #[test]
    fn continuous_points_resolve_to_nearest_cell() {
        let near = Vec2 {
            x: 63.0,
            y: 640.0,
        };
        assert_eq!(iso_to_grid(near, TILE), GridPos::new(10, 10));
        let across_seam = Vec2 {
            x: 66.0,
            y: 640.0,
        };
        assert_eq!(iso_to_grid(across_seam, TILE), GridPos::new(11, 9));
    }

    #[test]
    fn seam_points_round_half_up() {
        // a = 0.5, b = 0.5 -> (0.5, 0.0): x rounds up, y stays.
        let seam = Vec2 { x: 32.0, y: 16.0 };
        assert_eq!(iso_to_grid(seam, TILE), GridPos::new(1, 0));
    }

    #[test]
    fn degenerate_tile_size_maps_to_origin() {
        assert_eq!(iso_to_grid(Vec2 { x: 5.0, y: 5.0 }, 0.0), GridPos::default());
    }

    #[test]
    fn depth_is_monotone_in_grid_sum_under_small_elevation_gaps() {
        for sum in 0..70 {
            for z_front in 0..10 {
                let back = depth_key(sum, 0, 9);
                let front = depth_key(0, sum + 1, z_front);
                assert!(back < front, "sum={sum} z_front={z_front}");
            }
        }
    }

    #[test]
    fn elevation_breaks_ties_on_same_cell() {
        assert!(depth_key(4, 4, 0) < depth_key(4, 4, 1));
        assert_eq!(depth_key(2, 3, 0), depth_key(3, 2, 0));
    }

    #[test]
    fn clamp_and_bounds_helpers_agree() {
        assert!(GridPos::new(35, 0).in_square(36));
        assert!(!GridPos::new(36, 0).in_square(36));
        assert!(!GridPos::new(0, -1).in_square(36));
        assert_eq!(GridPos::new(-3, 40).clamped_to_square(36), GridPos::new(0, 35));
        assert_eq!(GridPos::new(2, 2).chebyshev_distance(GridPos::new(3, 4)), 2);
    }
}
