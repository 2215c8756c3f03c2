//! Sinusoidal grid addressing.
//!
//! The surface is stored in a rectangular `width x height` buffer, but under
//! the equal-area projection only a centred span of columns exists at each
//! row. That span narrows toward the poles with the cosine of latitude, and
//! east-west movement wraps inside the span rather than across the buffer.

use serde::{Deserialize, Serialize};

use crate::error::{invalid, Result};

/// How the rows of a grid relate to the sphere.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProjectionKind {
    /// Pole-narrowed rows (globe layout).
    Sinusoidal,
    /// Every row spans the full width.
    Cylindrical,
}

impl std::fmt::Display for ProjectionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectionKind::Sinusoidal => write!(f, "sinusoidal"),
            ProjectionKind::Cylindrical => write!(f, "cylindrical"),
        }
    }
}

/// Per-row valid column spans for a grid.
#[derive(Clone, Debug, PartialEq)]
pub struct GridProjection {
    width: usize,
    height: usize,
    kind: ProjectionKind,
    spans: Vec<(usize, usize)>,
}

impl GridProjection {
    /// Build the pole-narrowed layout. Width must be even so spans can sit
    /// symmetrically around `width / 2`.
    pub fn sinusoidal(width: usize, height: usize) -> Result<Self> {
        check_dimensions(width, height)?;
        if width % 2 != 0 {
            return Err(invalid(format!("sinusoidal width must be even, got {}", width)));
        }

        let half = width / 2;
        let mid = height as f64 / 2.0;
        let spans = (0..height)
            .map(|y| {
                // Row centre keeps the polar rows from collapsing to nothing.
                let lat = 90.0 * ((y as f64 + 0.5) - mid).abs() / mid;
                let mut span = (half as f64 * lat.to_radians().cos()).ceil() as usize;
                span = span.clamp(1, half);
                if (half - span) % 2 == 1 && span < half {
                    span += 1;
                }
                (half - span, half + span)
            })
            .collect();

        Ok(Self {
            width,
            height,
            kind: ProjectionKind::Sinusoidal,
            spans,
        })
    }

    /// Every row spans `[0, width)`.
    pub fn rectangular(width: usize, height: usize) -> Result<Self> {
        check_dimensions(width, height)?;
        Ok(Self {
            width,
            height,
            kind: ProjectionKind::Cylindrical,
            spans: vec![(0, width); height],
        })
    }

    /// Same layout for a buffer `factor` times larger on each axis. Child rows
    /// inherit their parent row's span so parent and child validity agree.
    pub fn scaled(&self, factor: usize) -> Result<Self> {
        if factor == 0 {
            return Err(invalid("scale factor must be positive"));
        }
        let spans = self
            .spans
            .iter()
            .flat_map(|&(west, east)| std::iter::repeat((west * factor, east * factor)).take(factor))
            .collect();
        Ok(Self {
            width: self.width * factor,
            height: self.height * factor,
            kind: self.kind,
            spans,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn kind(&self) -> ProjectionKind {
        self.kind
    }

    pub fn west_bound(&self, y: usize) -> usize {
        self.spans[y.min(self.height - 1)].0
    }

    pub fn east_bound(&self, y: usize) -> usize {
        self.spans[y.min(self.height - 1)].1
    }

    pub fn span(&self, y: usize) -> (usize, usize) {
        self.spans[y.min(self.height - 1)]
    }

    pub fn width_at_row(&self, y: usize) -> usize {
        let (west, east) = self.span(y);
        east - west
    }

    /// Latitude in whole degrees of the row centre, stretched so the top and
    /// bottom rows both read 90. Rows `y` and `height - 1 - y` always agree.
    pub fn latitude(&self, y: usize) -> u32 {
        if self.height <= 1 {
            return 0;
        }
        let mid = self.height as f64 / 2.0;
        let lat = 90.0 * ((y as f64 + 0.5) - mid).abs() / (mid - 0.5);
        (lat as u32).min(90)
    }

    /// Wrap a column into the valid span of row `y`.
    pub fn wrap(&self, x: i64, y: usize) -> usize {
        let (west, east) = self.span(y);
        let span = (east - west) as i64;
        west + (x - west as i64).rem_euclid(span) as usize
    }

    /// Clamp a row index into the buffer.
    pub fn clamp_row(&self, y: i64) -> usize {
        y.clamp(0, self.height as i64 - 1) as usize
    }

    /// Internal lookup rule: clamp the row, then wrap the column.
    pub fn resolve(&self, x: i64, y: i64) -> (usize, usize) {
        let y = self.clamp_row(y);
        (self.wrap(x, y), y)
    }

    pub fn contains(&self, x: i64, y: i64) -> bool {
        if y < 0 || y >= self.height as i64 {
            return false;
        }
        let (west, east) = self.spans[y as usize];
        x >= west as i64 && x < east as i64
    }

    /// The cell directly above (`dy = -1`) or below (`dy = 1`), if it is real surface.
    pub fn vertical_neighbor(&self, x: usize, y: usize, dy: i64) -> Option<(usize, usize)> {
        let ny = y as i64 + dy;
        if self.contains(x as i64, ny) {
            Some((x, ny as usize))
        } else {
            None
        }
    }

    /// 4-connected surface neighbours: wrapped west/east plus valid north/south.
    pub fn neighbors(&self, x: usize, y: usize) -> Vec<(usize, usize)> {
        let mut result = Vec::with_capacity(4);
        for candidate in [
            (self.wrap(x as i64 - 1, y), y),
            (self.wrap(x as i64 + 1, y), y),
        ] {
            if candidate.0 != x && !result.contains(&candidate) {
                result.push(candidate);
            }
        }
        result.extend(self.vertical_neighbor(x, y, -1));
        result.extend(self.vertical_neighbor(x, y, 1));
        result
    }

    /// Total number of real surface cells.
    pub fn valid_cells(&self) -> usize {
        self.spans.iter().map(|(west, east)| east - west).sum()
    }

    /// All valid `(x, y)` cells, row by row.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.spans
            .iter()
            .enumerate()
            .flat_map(|(y, &(west, east))| (west..east).map(move |x| (x, y)))
    }
}

fn check_dimensions(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(invalid(format!("grid dimensions must be positive, got {}x{}", width, height)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_ordered_and_symmetric() {
        for (w, h) in [(256, 128), (64, 32), (20, 10), (6, 5)] {
            let grid = GridProjection::sinusoidal(w, h).unwrap();
            for y in 0..h {
                let (west, east) = grid.span(y);
                assert!(west <= east, "row {} of {}x{}", y, w, h);
                assert!(west < east, "row {} must not be empty", y);
                assert_eq!(west + east, w, "row {} not centred", y);
                assert_eq!(west % 2, 0, "row {} not even aligned", y);
            }
        }
    }

    #[test]
    fn test_rows_narrow_toward_poles() {
        let grid = GridProjection::sinusoidal(256, 128).unwrap();
        assert_eq!(grid.width_at_row(64), 256);
        assert!(grid.width_at_row(0) < grid.width_at_row(32));
        assert!(grid.width_at_row(32) < grid.width_at_row(63));
        assert_eq!(grid.width_at_row(10), grid.width_at_row(117));
    }

    #[test]
    fn test_latitude_range() {
        let grid = GridProjection::sinusoidal(64, 32).unwrap();
        assert_eq!(grid.latitude(0), 90);
        assert_eq!(grid.latitude(31), 90);
        assert!(grid.latitude(16) < 5);
        assert!(grid.latitude(8) > 40 && grid.latitude(8) < 50);
    }

    #[test]
    fn test_latitude_is_symmetric() {
        for height in [2, 8, 31, 64, 128] {
            let grid = GridProjection::rectangular(16, height).unwrap();
            for y in 0..height {
                assert_eq!(grid.latitude(y), grid.latitude(height - 1 - y), "height {} row {}", height, y);
            }
            assert_eq!(grid.latitude(height - 1), 90);
        }
    }

    #[test]
    fn test_wrap_stays_in_span() {
        let grid = GridProjection::sinusoidal(64, 32).unwrap();
        for y in 0..32 {
            let (west, east) = grid.span(y);
            assert_eq!(grid.wrap(west as i64 - 1, y), east - 1);
            assert_eq!(grid.wrap(east as i64, y), west);
            for x in -70i64..140 {
                let wrapped = grid.wrap(x, y);
                assert!(wrapped >= west && wrapped < east);
            }
        }
    }

    #[test]
    fn test_resolve_never_leaves_grid() {
        let grid = GridProjection::sinusoidal(64, 32).unwrap();
        let (x, y) = grid.resolve(-1, 0);
        assert!(grid.contains(x as i64, y as i64));
        let (x, y) = grid.resolve(64, 0);
        assert!(grid.contains(x as i64, y as i64));
        assert_eq!(grid.resolve(5, -3).1, 0);
    }

    #[test]
    fn test_rectangular_degenerate_case() {
        let grid = GridProjection::rectangular(10, 4).unwrap();
        assert_eq!(grid.kind(), ProjectionKind::Cylindrical);
        assert_eq!(grid.valid_cells(), 40);
        assert_eq!(grid.wrap(-1, 0), 9);
        assert_eq!(grid.span(3), (0, 10));
    }

    #[test]
    fn test_scaled_inherits_parent_spans() {
        let grid = GridProjection::sinusoidal(32, 16).unwrap();
        let big = grid.scaled(2).unwrap();
        assert_eq!(big.width(), 64);
        assert_eq!(big.height(), 32);
        for y in 0..16 {
            let (west, east) = grid.span(y);
            assert_eq!(big.span(2 * y), (west * 2, east * 2));
            assert_eq!(big.span(2 * y + 1), (west * 2, east * 2));
        }
        assert_eq!(big.valid_cells(), grid.valid_cells() * 4);
    }

    #[test]
    fn test_invalid_dimensions() {
        assert!(GridProjection::sinusoidal(0, 10).is_err());
        assert!(GridProjection::sinusoidal(7, 10).is_err());
        assert!(GridProjection::rectangular(10, 0).is_err());
    }

    #[test]
    fn test_neighbors_are_valid_cells() {
        let grid = GridProjection::sinusoidal(32, 16).unwrap();
        for (x, y) in grid.cells() {
            for (nx, ny) in grid.neighbors(x, y) {
                assert!(grid.contains(nx as i64, ny as i64));
            }
        }
    }
}
