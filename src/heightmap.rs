//! Diamond-square height field.
//!
//! Elevations are integers in `0..=99`. The fractal runs on a power-of-two
//! buffer whose first and last columns are the same meridian, then that
//! buffer is sampled down to the requested size so the output seam matches.

use rand::Rng;
use tracing::debug;

use crate::dice::{d20, jitter};
use crate::error::{invalid, Result};
use crate::projection::GridProjection;
use crate::seeds::stage_rng;
use crate::tilemap::Tilemap;

/// Highest legal elevation.
pub const MAX_ELEVATION: u8 = 99;

/// Jitter die for every square and diamond step.
const JITTER_SIDES: u32 = 10;

const UNSET: i16 = -1;

/// Elevation grid with clamped accessors.
#[derive(Clone, Debug, PartialEq)]
pub struct HeightField {
    cells: Tilemap<u8>,
}

impl HeightField {
    pub fn flat(width: usize, height: usize, value: u8) -> Self {
        Self {
            cells: Tilemap::new_with(width, height, value.min(MAX_ELEVATION)),
        }
    }

    pub fn from_tilemap(mut cells: Tilemap<u8>) -> Self {
        for (_, _, v) in cells.iter_mut() {
            *v = (*v).min(MAX_ELEVATION);
        }
        Self { cells }
    }

    /// Deterministic fractal field for `(width, height, seed)`.
    pub fn generate(width: usize, height: usize, seed: u64) -> Result<Self> {
        let mut rng = stage_rng(seed);
        Self::generate_with(width, height, &mut rng)
    }

    pub fn generate_with<R: Rng + ?Sized>(width: usize, height: usize, rng: &mut R) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(invalid(format!("height field must be at least 1x1, got {}x{}", width, height)));
        }

        let side = (width.saturating_sub(1))
            .next_power_of_two()
            .max((2 * height.saturating_sub(1)).next_power_of_two())
            .max(2);
        let mut buffer = DiamondSquare::new(side);
        buffer.run(rng);
        debug!(width, height, side, "diamond-square buffer filled");

        let rows = side / 2;
        let mut cells = Tilemap::new_with(width, height, 0u8);
        for y in 0..height {
            let by = sample_index(y, height, rows);
            for x in 0..width {
                let bx = sample_index(x, width, side);
                cells.set(x, y, buffer.value(bx, by));
            }
        }
        Ok(Self { cells })
    }

    pub fn width(&self) -> usize {
        self.cells.width
    }

    pub fn height(&self) -> usize {
        self.cells.height
    }

    pub fn as_tilemap(&self) -> &Tilemap<u8> {
        &self.cells
    }

    /// Columns wrap, rows clamp.
    pub fn get(&self, x: usize, y: usize) -> u8 {
        *self.cells.get(x, y.min(self.height() - 1))
    }

    /// Store `value` clamped to `0..=99`. Returns true when the value had to
    /// be clamped.
    pub fn set(&mut self, x: usize, y: usize, value: i32) -> bool {
        let y = y.min(self.height() - 1);
        let clamped = value.clamp(0, MAX_ELEVATION as i32);
        if clamped != value {
            debug!(x, y, value, clamped, "elevation clamped");
        }
        self.cells.set(x, y, clamped as u8);
        clamped != value
    }

    pub fn add(&mut self, x: usize, y: usize, delta: i32) {
        let current = self.get(x, y) as i32;
        self.set(x, y, current + delta);
    }

    /// Multiply, truncating toward zero.
    pub fn scale(&mut self, x: usize, y: usize, factor: f64) {
        let scaled = (self.get(x, y) as f64 * factor) as i32;
        self.set(x, y, scaled);
    }

    /// Count of valid cells at each elevation.
    pub fn histogram(&self, projection: &GridProjection) -> [usize; 100] {
        let mut buckets = [0usize; 100];
        for (x, y) in projection.cells() {
            buckets[self.get(x, y) as usize] += 1;
        }
        buckets
    }

    /// Lowest elevation at or below which `percent` of the valid surface lies.
    pub fn level_for_fraction(&self, projection: &GridProjection, percent: u8) -> u8 {
        let buckets = self.histogram(projection);
        let wanted = projection.valid_cells() * percent.min(100) as usize / 100;
        let mut seen = 0;
        for (level, count) in buckets.iter().enumerate() {
            seen += count;
            if seen >= wanted {
                return level as u8;
            }
        }
        MAX_ELEVATION
    }

    /// Stretch the valid surface so it spans the full `0..=99` range.
    pub fn normalise(&mut self, projection: &GridProjection) {
        let (mut lo, mut hi) = (MAX_ELEVATION, 0u8);
        for (x, y) in projection.cells() {
            let h = self.get(x, y);
            lo = lo.min(h);
            hi = hi.max(h);
        }
        if hi <= lo {
            return;
        }
        let range = (hi - lo) as i32;
        for (x, y) in projection.cells() {
            let h = self.get(x, y) as i32;
            self.set(x, y, (h - lo as i32) * MAX_ELEVATION as i32 / range);
        }
    }
}

/// Map an output index onto the buffer so both ends land on the buffer ends.
fn sample_index(i: usize, len: usize, buffer_max: usize) -> usize {
    if len <= 1 {
        return 0;
    }
    ((i * buffer_max) as f64 / (len - 1) as f64).round() as usize
}

// =============================================================================
// DIAMOND-SQUARE
// =============================================================================

/// `(side + 1) x (side / 2 + 1)` working buffer; column 0 and column `side`
/// are the same meridian and always hold the same value.
struct DiamondSquare {
    side: usize,
    rows: usize,
    h: Vec<i16>,
}

impl DiamondSquare {
    fn new(side: usize) -> Self {
        let rows = side / 2;
        Self {
            side,
            rows,
            h: vec![UNSET; (side + 1) * (rows + 1)],
        }
    }

    fn at(&self, x: usize, y: usize) -> i32 {
        self.h[y * (self.side + 1) + x] as i32
    }

    fn value(&self, x: usize, y: usize) -> u8 {
        // Every cell is written by the time run() returns.
        self.at(x, y).clamp(0, MAX_ELEVATION as i32) as u8
    }

    /// Write once; edge columns are mirrored onto each other.
    fn put(&mut self, x: usize, y: usize, value: i32) {
        if self.at(x, y) != UNSET as i32 {
            return;
        }
        let v = value.clamp(0, MAX_ELEVATION as i32) as i16;
        let stride = self.side + 1;
        self.h[y * stride + x] = v;
        if x == 0 {
            self.h[y * stride + self.side] = v;
        } else if x == self.side {
            self.h[y * stride] = v;
        }
    }

    fn run<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let (side, rows) = (self.side, self.rows);
        let north = d20(rng) as i32 + d20(rng) as i32 + 30;
        let south = d20(rng) as i32 + d20(rng) as i32 + 30;
        self.put(0, 0, north);
        self.put(0, rows, south);

        let mut step = side;
        while step > 1 {
            let ystep = step / 2;
            for x in (0..side).step_by(step) {
                for y in (0..rows).step_by(ystep) {
                    let px = x + step / 2;
                    let py = y + step / 4;
                    let (nw, ne) = (self.at(x, y), self.at(x + step, y));
                    let (sw, se) = (self.at(x, y + ystep), self.at(x + step, y + ystep));

                    let centre = (nw + ne + sw + se) / 4 + jitter(rng, JITTER_SIDES, 1);
                    self.put(px, py, centre);
                    let centre = self.at(px, py);

                    let top = (centre + nw + ne) / 3 + jitter(rng, JITTER_SIDES, 1);
                    self.put(px, y, top);
                    let left = (nw + centre + sw) / 3 + jitter(rng, JITTER_SIDES, 1);
                    self.put(x, py, left);
                    let right = (ne + centre + se) / 3 + jitter(rng, JITTER_SIDES, 1);
                    self.put(x + step, py, right);
                    let bottom = (sw + centre + se) / 3 + jitter(rng, JITTER_SIDES, 1);
                    self.put(px, y + ystep, bottom);
                }
            }
            step /= 2;
        }
    }
}
