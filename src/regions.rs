//! Coarse regional overlay.
//!
//! One region tile covers `tile_size x tile_size` surface cells. Continents,
//! dark patches and mountain ranges are decided here first, then pushed down
//! onto the full-resolution height field and terrain.

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::dice::{d10, d2, d3, d4, d6, dice, die, roll_zero};
use crate::error::{invalid, Result, Warning};
use crate::heightmap::HeightField;
use crate::projection::{GridProjection, ProjectionKind};
use crate::terrain::TerrainId;
use crate::tilemap::Tilemap;
use crate::world::SurfaceMap;

/// Passes without any growth before continent growth gives up.
const STUCK_PASSES: usize = 10;

/// Hard cap on continent growth passes.
const MAX_GROWTH_PASSES: usize = 1000;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RegionType {
    #[default]
    Water,
    Land,
    Dark,
    Mountains,
    Seabed,
}

/// Switches for [`RegionMap::add_mountain_ranges`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RangeProfile {
    /// A continuous ridge along the equator
    pub equatorial_ridge: bool,
    /// Ridges circling both poles
    pub polar_ridge: bool,
    /// No collision ranges at all
    pub smooth: bool,
    /// Relief at which colliding plates throw up mountains
    pub collision_relief: i32,
}

impl Default for RangeProfile {
    fn default() -> Self {
        Self {
            equatorial_ridge: false,
            polar_ridge: false,
            smooth: false,
            collision_relief: 25,
        }
    }
}

/// Terrain used for each region type when painting the overlay.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct RegionPalette {
    pub water: Option<TerrainId>,
    pub land: Option<TerrainId>,
    pub dark: Option<TerrainId>,
    pub mountains: Option<TerrainId>,
    pub seabed: Option<TerrainId>,
}

impl RegionPalette {
    fn get(&self, region: RegionType) -> Option<TerrainId> {
        match region {
            RegionType::Water => self.water,
            RegionType::Land => self.land,
            RegionType::Dark => self.dark,
            RegionType::Mountains => self.mountains,
            RegionType::Seabed => self.seabed,
        }
    }
}

/// Result of growing continents.
#[derive(Clone, Debug, PartialEq)]
pub struct ContinentReport {
    pub target: u8,
    pub achieved: f64,
    pub passes: usize,
    pub converged: bool,
}

impl ContinentReport {
    pub fn warning(&self) -> Option<Warning> {
        if self.converged {
            return None;
        }
        Some(Warning::Convergence {
            stage: "continents".into(),
            target: self.target,
            achieved: self.achieved,
            passes: self.passes,
        })
    }
}

// =============================================================================
// REGION MAP
// =============================================================================

/// Low-resolution plan of the surface.
#[derive(Clone, Debug)]
pub struct RegionMap {
    tile_size: usize,
    projection: GridProjection,
    regions: Tilemap<RegionType>,
    /// Continent number per tile, 0 for open water
    plates: Tilemap<u8>,
    /// Coarse relief, raised where plates collide
    relief: Tilemap<i32>,
}

impl RegionMap {
    /// Overlay for a surface laid out by `surface`, all water.
    pub fn new(surface: &GridProjection, tile_size: usize) -> Result<Self> {
        if tile_size == 0 {
            return Err(invalid("region tile size must be positive"));
        }
        let width = surface.width().div_ceil(tile_size).max(1);
        let height = surface.height().div_ceil(tile_size).max(1);
        let projection = match surface.kind() {
            ProjectionKind::Sinusoidal if width % 2 == 0 => GridProjection::sinusoidal(width, height)?,
            _ => GridProjection::rectangular(width, height)?,
        };
        Ok(Self {
            tile_size,
            projection,
            regions: Tilemap::new(width, height),
            plates: Tilemap::new(width, height),
            relief: Tilemap::new(width, height),
        })
    }

    pub fn width(&self) -> usize {
        self.projection.width()
    }

    pub fn height(&self) -> usize {
        self.projection.height()
    }

    pub fn tile_size(&self) -> usize {
        self.tile_size
    }

    pub fn region(&self, tx: usize, ty: usize) -> RegionType {
        *self.regions.get(tx, ty)
    }

    pub fn set_region(&mut self, tx: usize, ty: usize, region: RegionType) {
        if self.projection.contains(tx as i64, ty as i64) {
            self.regions.set(tx, ty, region);
        }
    }

    /// Set every valid tile to `region`.
    pub fn fill(&mut self, region: RegionType) {
        for (x, y) in self.projection.cells() {
            self.regions.set(x, y, region);
        }
    }

    /// Region tile holding surface cell `(x, y)`.
    pub fn region_at_cell(&self, x: usize, y: usize) -> RegionType {
        let tx = (x / self.tile_size).min(self.width() - 1);
        let ty = (y / self.tile_size).min(self.height() - 1);
        self.region(tx, ty)
    }

    /// Percentage of valid tiles of the given type.
    pub fn percentage(&self, region: RegionType) -> f64 {
        let total = self.projection.valid_cells();
        if total == 0 {
            return 0.0;
        }
        let count = self
            .projection
            .cells()
            .filter(|&(x, y)| self.region(x, y) == region)
            .count();
        count as f64 * 100.0 / total as f64
    }

    fn land_percentage(&self) -> f64 {
        let total = self.projection.valid_cells();
        if total == 0 {
            return 0.0;
        }
        let land = self
            .projection
            .cells()
            .filter(|&(x, y)| *self.plates.get(x, y) > 0)
            .count();
        land as f64 * 100.0 / total as f64
    }

    /// Seed patches of `kind` on one tile in `chance`, then let each patch
    /// creep west, east, north or south for `spread_passes` passes.
    /// Water tiles are never covered. Returns the number of tiles of `kind`.
    pub fn scatter_patches<R: Rng + ?Sized>(
        &mut self,
        kind: RegionType,
        chance: u32,
        spread_passes: usize,
        rng: &mut R,
    ) -> usize {
        let cells: Vec<(usize, usize)> = self.projection.cells().collect();
        for &(x, y) in &cells {
            if die(rng, chance) == 1 && self.region(x, y) != RegionType::Water {
                self.regions.set(x, y, kind);
            }
        }

        for _ in 0..spread_passes {
            let mut grown = Vec::new();
            for &(x, y) in &cells {
                if self.region(x, y) != kind {
                    continue;
                }
                let target = match d3(rng) {
                    1 => Some(self.projection.resolve(x as i64 - 1, y as i64)),
                    2 => Some(self.projection.resolve(x as i64 + 1, y as i64)),
                    _ => {
                        let dy = if d2(rng) == 1 { -1 } else { 1 };
                        self.projection.vertical_neighbor(x, y, dy)
                    }
                };
                if let Some((nx, ny)) = target {
                    if self.region(nx, ny) != RegionType::Water {
                        grown.push((nx, ny));
                    }
                }
            }
            for (x, y) in grown {
                self.regions.set(x, y, kind);
            }
        }

        let count = cells.iter().filter(|&&(x, y)| self.region(x, y) == kind).count();
        debug!(?kind, chance, spread_passes, count, "patches scattered");
        count
    }

    /// Grow `plates` continental plates until `land_percent` of the tiles are
    /// land. Growth that makes no progress for more than ten passes, or that
    /// runs past the pass cap, stops with the closest result.
    pub fn grow_continents<R: Rng + ?Sized>(
        &mut self,
        land_percent: u8,
        plates: u8,
        rng: &mut R,
        cancel: &CancelToken,
    ) -> Result<ContinentReport> {
        if land_percent > 100 {
            return Err(invalid(format!("land percentage must be 0-100, got {}", land_percent)));
        }
        if plates == 0 {
            return Err(invalid("at least one continental plate is needed"));
        }

        let cells: Vec<(usize, usize)> = self.projection.cells().collect();
        for &(x, y) in &cells {
            self.plates.set(x, y, 0);
            self.relief.set(x, y, -(d4(rng) as i32));
        }

        if land_percent > 0 {
            let mut remaining = plates.min(cells.len().min(u8::MAX as usize) as u8);
            while remaining > 0 {
                let (x, y) = cells[roll_zero(rng, cells.len() as u32) as usize];
                if *self.plates.get(x, y) == 0 {
                    self.plates.set(x, y, remaining);
                    self.relief.set(x, y, 10 + dice(rng, 6, 2) as i32);
                    remaining -= 1;
                }
            }
        }

        let target = land_percent as f64;
        let mut current = self.land_percentage();
        let mut last = current;
        let mut stuck = 0usize;
        let mut passes = 0usize;
        let mut converged = current >= target;

        while !converged && passes < MAX_GROWTH_PASSES {
            cancel.check()?;
            passes += 1;
            for &(x, y) in &cells {
                let plate = *self.plates.get(x, y);
                if plate == 0 || d10(rng) < 5 {
                    continue;
                }
                let dx = d2(rng) as i64 - d2(rng) as i64;
                let dy = d2(rng) as i64 - d2(rng) as i64;
                let ny = y as i64 + dy;
                if ny < 0 || ny >= self.height() as i64 {
                    continue;
                }
                let nx = self.projection.wrap(x as i64 + dx, ny as usize);
                let ny = ny as usize;
                let other = *self.plates.get(nx, ny);
                if other == 0 {
                    self.plates.set(nx, ny, plate);
                    let r = *self.relief.get(x, y);
                    self.relief.set(nx, ny, r);
                } else if other != plate {
                    *self.relief.get_mut(nx, ny) += dice(rng, 6, 2) as i32;
                    *self.relief.get_mut(x, y) += d4(rng) as i32;
                }
            }

            current = self.land_percentage();
            if current >= target {
                converged = true;
            } else if current == last {
                stuck += 1;
                if stuck > STUCK_PASSES {
                    break;
                }
            } else {
                last = current;
                stuck = 0;
            }
        }

        for &(x, y) in &cells {
            let region = if *self.plates.get(x, y) > 0 {
                RegionType::Land
            } else {
                RegionType::Water
            };
            self.regions.set(x, y, region);
        }

        let report = ContinentReport {
            target: land_percent,
            achieved: current,
            passes,
            converged,
        };
        if converged {
            debug!(target = land_percent, achieved = current, passes, "continents grown");
        } else {
            warn!(target = land_percent, achieved = current, passes, "continent growth got stuck");
        }
        Ok(report)
    }

    /// Turn collision zones and requested ridges into mountain tiles.
    /// Returns the number of tiles that became mountains.
    pub fn add_mountain_ranges<R: Rng + ?Sized>(&mut self, profile: &RangeProfile, rng: &mut R) -> usize {
        let cells: Vec<(usize, usize)> = self.projection.cells().collect();
        // Coarse maps have no row near 0 degrees; the rows beside the equator still count.
        let equator_band = 10.max(self.projection.latitude(self.height() / 2) + 1);
        let mut raised = 0;
        for &(x, y) in &cells {
            let latitude = self.projection.latitude(y);
            let ridge = (profile.equatorial_ridge && latitude < equator_band && d3(rng) != 1)
                || (profile.polar_ridge && (60..75).contains(&latitude) && d2(rng) == 1);
            let collision = !profile.smooth
                && self.region(x, y) == RegionType::Land
                && *self.relief.get(x, y) >= profile.collision_relief;
            if ridge {
                *self.relief.get_mut(x, y) += 10 + d6(rng) as i32;
            }
            if (ridge || collision) && self.region(x, y) != RegionType::Mountains {
                self.regions.set(x, y, RegionType::Mountains);
                raised += 1;
            }
        }
        debug!(raised, ?profile, "mountain ranges added");
        raised
    }

    /// Nudge the height field toward the overlay: water tiles sink by `bias`,
    /// mountains rise by `bias`, land and seabed move by half.
    pub fn apply_to_heights(&self, heights: &mut HeightField, surface: &GridProjection, bias: i32) {
        for (x, y) in surface.cells() {
            let delta = match self.region_at_cell(x, y) {
                RegionType::Water => -bias,
                RegionType::Seabed => -bias / 2,
                RegionType::Land => bias / 2,
                RegionType::Dark => -bias / 4,
                RegionType::Mountains => bias,
            };
            heights.add(x, y, delta);
        }
    }

    /// Commit the overlay to the surface. Mountain tiles only get their
    /// terrain on cells above the tile's mean height; the rest takes the land
    /// terrain. Region types with no palette entry are left alone.
    pub fn paint(&self, map: &mut SurfaceMap, heights: &HeightField, palette: &RegionPalette) -> usize {
        let projection = map.projection().clone();
        let mut means = Tilemap::new_with(self.width(), self.height(), (0i64, 0i64));
        for (x, y) in projection.cells() {
            let (tx, ty) = self.tile_of(x, y);
            let entry = means.get_mut(tx, ty);
            entry.0 += heights.get(x, y) as i64;
            entry.1 += 1;
        }

        let mut painted = 0;
        for (x, y) in projection.cells() {
            let (tx, ty) = self.tile_of(x, y);
            let region = self.region(tx, ty);
            let terrain = if region == RegionType::Mountains {
                let (sum, count) = *means.get(tx, ty);
                let mean = if count > 0 { sum / count } else { 0 };
                if heights.get(x, y) as i64 > mean {
                    palette.mountains
                } else {
                    palette.land
                }
            } else {
                palette.get(region)
            };
            if let Some(terrain) = terrain {
                map.set_terrain(x, y, terrain);
                painted += 1;
            }
        }
        debug!(painted, "overlay painted");
        painted
    }

    fn tile_of(&self, x: usize, y: usize) -> (usize, usize) {
        (
            (x / self.tile_size).min(self.width() - 1),
            (y / self.tile_size).min(self.height() - 1),
        )
    }
}
