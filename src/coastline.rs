//! Coastline clean-up after flooding.
//!
//! Two passes over the water mask: a 3x3 majority vote that sinks specks of
//! land and fills pinholes of water, then a row scan that closes short straits.

use tracing::debug;

use crate::heightmap::HeightField;
use crate::terrain::TerrainId;
use crate::world::SurfaceMap;

// =============================================================================
// PARAMETERS
// =============================================================================

/// Coastline smoothing parameters
#[derive(Clone, Debug)]
pub struct CoastlineParams {
    /// Majority-vote passes
    pub vote_passes: usize,
    /// Water runs up to this long, with land at both ends, become land
    pub max_strait: usize,
}

impl Default for CoastlineParams {
    fn default() -> Self {
        Self {
            vote_passes: 2,
            max_strait: 3,
        }
    }
}

/// What a smoothing run changed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CoastlineReport {
    /// Water cells turned to land by the vote
    pub raised: usize,
    /// Land cells sunk by the vote
    pub sunk: usize,
    /// Strait cells filled
    pub straits: usize,
}

impl CoastlineReport {
    pub fn changed(&self) -> usize {
        self.raised + self.sunk + self.straits
    }
}

// =============================================================================
// SMOOTHING
// =============================================================================

/// Remove isolated islands and narrow straits.
pub fn smooth_coastline(
    map: &mut SurfaceMap,
    heights: &mut HeightField,
    water: TerrainId,
    land: TerrainId,
    params: &CoastlineParams,
) -> CoastlineReport {
    let mut report = CoastlineReport::default();
    for _ in 0..params.vote_passes {
        let (raised, sunk) = majority_vote(map, heights, water, land);
        report.raised += raised;
        report.sunk += sunk;
    }
    report.straits = fill_straits(map, heights, land, params.max_strait);
    debug!(
        raised = report.raised,
        sunk = report.sunk,
        straits = report.straits,
        "coastline smoothed"
    );
    report
}

/// One 3x3 vote. A water cell with more than 4 land cells in its window
/// becomes land at the window's mean land height; a land cell with fewer than
/// 4 becomes water at the window's mean height.
fn majority_vote(
    map: &mut SurfaceMap,
    heights: &mut HeightField,
    water: TerrainId,
    land: TerrainId,
) -> (usize, usize) {
    let projection = map.projection().clone();
    let wet: Vec<(usize, usize, bool)> = projection
        .cells()
        .map(|(x, y)| (x, y, map.is_water(x, y)))
        .collect();
    let width = projection.width();
    let mut mask = vec![false; width * projection.height()];
    for &(x, y, is_water) in &wet {
        mask[y * width + x] = is_water;
    }

    let (mut raised, mut sunk) = (0, 0);
    let mut updates = Vec::new();
    for &(x, y, is_water) in &wet {
        let mut land_count = 0i32;
        let mut land_total = 0i32;
        let mut total = 0i32;
        for dy in -1i64..=1 {
            for dx in -1i64..=1 {
                let (nx, ny) = projection.resolve(x as i64 + dx, y as i64 + dy);
                let h = heights.get(nx, ny) as i32;
                total += h;
                if !mask[ny * width + nx] {
                    land_count += 1;
                    land_total += h;
                }
            }
        }
        if is_water && land_count > 4 {
            updates.push((x, y, land, land_total / land_count));
            raised += 1;
        } else if !is_water && land_count < 4 {
            updates.push((x, y, water, total / 9));
            sunk += 1;
        }
    }

    for (x, y, terrain, h) in updates {
        map.set_terrain(x, y, terrain);
        heights.set(x, y, h);
    }
    (raised, sunk)
}

/// Close horizontal water runs of at most `max_len` cells bounded by land on
/// both sides, then give each filled cell the mean height of its land neighbours.
fn fill_straits(map: &mut SurfaceMap, heights: &mut HeightField, land: TerrainId, max_len: usize) -> usize {
    let projection = map.projection().clone();
    let mut filled = Vec::new();

    for y in 0..projection.height() {
        let (west, east) = projection.span(y);
        let span = east - west;
        let Some(start) = (west..east).find(|&x| !map.is_water(x, y)) else {
            continue;
        };

        // Walk the row once, starting on land so every run is bounded.
        let mut run: Vec<usize> = Vec::new();
        for step in 1..=span {
            let x = west + (start - west + step) % span;
            if map.is_water(x, y) {
                run.push(x);
            } else {
                if !run.is_empty() && run.len() <= max_len {
                    filled.extend(run.iter().map(|&rx| (rx, y)));
                }
                run.clear();
            }
        }
    }

    for &(x, y) in &filled {
        map.set_terrain(x, y, land);
    }
    for &(x, y) in &filled {
        let neighbours: Vec<i32> = projection
            .neighbors(x, y)
            .into_iter()
            .filter(|&(nx, ny)| map.is_land(nx, ny))
            .map(|(nx, ny)| heights.get(nx, ny) as i32)
            .collect();
        if !neighbours.is_empty() {
            let mean = neighbours.iter().sum::<i32>() / neighbours.len() as i32;
            heights.set(x, y, mean);
        }
    }
    filled.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::projection::GridProjection;
    use crate::terrain::{names, TerrainRegistry};

    fn ocean(width: usize, height: usize) -> (SurfaceMap, HeightField, TerrainId, TerrainId) {
        let registry = Arc::new(TerrainRegistry::with_standard_catalogue());
        let land = registry.lookup(names::LAND).unwrap();
        let water = registry.lookup(names::WATER).unwrap();
        let projection = GridProjection::rectangular(width, height).unwrap();
        let map = SurfaceMap::new(projection, registry, water);
        (map, HeightField::flat(width, height, 10), water, land)
    }

    #[test]
    fn test_single_tile_island_sinks() {
        let (mut map, mut heights, water, land) = ocean(16, 8);
        map.set_terrain(5, 4, land);
        heights.set(5, 4, 60);
        let report = smooth_coastline(&mut map, &mut heights, water, land, &CoastlineParams::default());
        assert!(map.is_water(5, 4));
        assert_eq!(report.sunk, 1);
        assert_eq!(map.water_cells(), 16 * 8);
    }

    #[test]
    fn test_pinhole_lake_fills() {
        let (mut map, mut heights, water, land) = ocean(16, 8);
        for y in 0..8 {
            for x in 0..16 {
                map.set_terrain(x, y, land);
                heights.set(x, y, 40);
            }
        }
        map.set_terrain(8, 4, water);
        heights.set(8, 4, 0);
        let report = majority_vote(&mut map, &mut heights, water, land);
        assert_eq!(report, (1, 0));
        assert!(map.is_land(8, 4));
        assert_eq!(heights.get(8, 4), 40);
    }

    #[test]
    fn test_short_strait_closed_long_channel_kept() {
        let (mut map, mut heights, _water, land) = ocean(20, 4);
        for x in 0..20 {
            map.set_terrain(x, 1, land);
            heights.set(x, 1, 30);
        }
        let water = map.terrain_at(0, 0);
        // Three-cell strait and a five-cell channel in row 1.
        for x in 4..7 {
            map.set_terrain(x, 1, water);
        }
        for x in 10..15 {
            map.set_terrain(x, 1, water);
        }
        let filled = fill_straits(&mut map, &mut heights, land, 3);
        assert_eq!(filled, 3);
        for x in 4..7 {
            assert!(map.is_land(x, 1));
            assert_eq!(heights.get(x, 1), 30);
        }
        for x in 10..15 {
            assert!(map.is_water(x, 1));
        }
    }

    #[test]
    fn test_open_ocean_untouched() {
        let (mut map, mut heights, water, land) = ocean(16, 8);
        let report = smooth_coastline(&mut map, &mut heights, water, land, &CoastlineParams::default());
        assert_eq!(report.changed(), 0);
    }
}
