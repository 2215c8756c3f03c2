//! Water coverage control.
//!
//! Water spreads from existing water cells into lower (or slightly higher)
//! neighbours until the target share of the surface is covered, and dries back
//! from the coast when a world needs less. Both loops are capped and report
//! how close they got instead of running forever.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::dice::{d6, dice, die};
use crate::error::{invalid, MapError, Result, Warning};
use crate::heightmap::HeightField;
use crate::terrain::TerrainId;
use crate::world::SurfaceMap;

// =============================================================================
// PARAMETERS AND REPORTS
// =============================================================================

/// Tuning for the grow and shrink loops.
#[derive(Clone, Debug)]
pub struct HydrographyParams {
    /// Hard cap on outer passes
    pub max_passes: usize,
    /// Consecutive passes without any conversion before giving up
    pub stall_passes: usize,
    /// Below this many conversions in a pass, the flood offset rises
    pub min_converted: usize,
    /// How much the flood offset rises after a slow pass
    pub flood_step: i32,
    /// One-in-N chance that a neighbour the water cannot reach is worn down by 1
    pub erosion_chance: u32,
}

impl Default for HydrographyParams {
    fn default() -> Self {
        Self {
            max_passes: 2000,
            stall_passes: 10,
            min_converted: 10,
            flood_step: 5,
            erosion_chance: 20,
        }
    }
}

/// How a grow or shrink loop ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum Convergence {
    /// Within one cell of the target.
    Reached,
    /// Grow was asked for less water than already present (or shrink for more).
    AlreadyPast,
    /// No cell changed for too many passes in a row.
    Stalled,
    /// The pass cap ran out first.
    IterationCap,
}

#[derive(Clone, Debug, PartialEq, serde::Serialize)]
pub struct HydrographyReport {
    pub stage: &'static str,
    pub target: u8,
    /// Final water share of the valid surface, 0-100
    pub achieved: f64,
    pub passes: usize,
    pub outcome: Convergence,
}

impl HydrographyReport {
    pub fn converged(&self) -> bool {
        self.outcome == Convergence::Reached
    }

    /// `Err(ConvergenceFailure)` unless the target was reached.
    pub fn into_result(self) -> Result<Self> {
        if self.converged() {
            Ok(self)
        } else {
            Err(MapError::ConvergenceFailure {
                stage: self.stage,
                target: self.target,
                achieved: self.achieved,
                passes: self.passes,
            })
        }
    }

    pub fn warning(&self) -> Option<Warning> {
        if self.converged() {
            return None;
        }
        Some(Warning::Convergence {
            stage: self.stage.to_string(),
            target: self.target,
            achieved: self.achieved,
            passes: self.passes,
        })
    }
}

fn check_target(target: u8) -> Result<()> {
    if target > 100 {
        return Err(invalid(format!("water target must be 0-100, got {}", target)));
    }
    Ok(())
}

/// Water cell count that sits at or just above `target` percent.
fn cells_for(target: u8, total: usize) -> usize {
    (target as usize * total + 99) / 100
}

/// Water cell count that sits at or just below `target` percent.
fn cells_below(target: u8, total: usize) -> usize {
    target as usize * total / 100
}

fn finish(
    stage: &'static str,
    map: &SurfaceMap,
    target: u8,
    passes: usize,
    outcome: Convergence,
) -> HydrographyReport {
    let report = HydrographyReport {
        stage,
        target,
        achieved: map.water_percentage(),
        passes,
        outcome,
    };
    if !report.converged() {
        warn!(
            stage,
            target,
            achieved = report.achieved,
            passes,
            outcome = ?outcome,
            "water coverage did not converge"
        );
    }
    report
}

// =============================================================================
// BASINS
// =============================================================================

/// Flood the lowest cells so that just under `percent` of the surface is water.
/// Returns the number of cells flooded.
pub fn seed_basins(map: &mut SurfaceMap, heights: &HeightField, water: TerrainId, percent: u8) -> Result<usize> {
    check_target(percent)?;
    if percent == 0 {
        return Ok(0);
    }
    let projection = map.projection().clone();
    let level = heights.level_for_fraction(&projection, percent);

    let mut flooded = 0;
    let mut lowest: Option<(u8, usize, usize)> = None;
    for (x, y) in projection.cells() {
        let h = heights.get(x, y);
        if h < level && !map.is_water(x, y) {
            map.set_terrain(x, y, water);
            flooded += 1;
        }
        if lowest.map_or(true, |(lh, _, _)| h < lh) {
            lowest = Some((h, x, y));
        }
    }
    if flooded == 0 && map.water_cells() == 0 {
        if let Some((_, x, y)) = lowest {
            map.set_terrain(x, y, water);
            flooded = 1;
        }
    }
    debug!(percent, level, flooded, "seeded basins");
    Ok(flooded)
}

// =============================================================================
// GROW
// =============================================================================

/// Spread `water` until at least `target` percent of the surface is covered.
///
/// Candidates from one pass are collected first and converted afterwards in
/// random order, stopping at the first cell that reaches the target.
pub fn grow_to_target<R: Rng + ?Sized>(
    map: &mut SurfaceMap,
    heights: &mut HeightField,
    water: TerrainId,
    target: u8,
    params: &HydrographyParams,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<HydrographyReport> {
    const STAGE: &str = "grow";
    check_target(target)?;
    if !map.is_water_terrain(water) {
        return Err(invalid("grow_to_target needs a water terrain"));
    }

    let projection = map.projection().clone();
    let total = projection.valid_cells();
    let want = cells_for(target, total);
    let mut wet = map.water_cells();

    if wet >= want {
        let outcome = if wet - want <= 1 {
            Convergence::Reached
        } else {
            Convergence::AlreadyPast
        };
        return Ok(finish(STAGE, map, target, 0, outcome));
    }
    if wet == 0 {
        seed_basins(map, heights, water, 1)?;
        wet = map.water_cells();
        if wet >= want {
            return Ok(finish(STAGE, map, target, 0, Convergence::Reached));
        }
    }

    let width = projection.width();
    let mut flagged = vec![false; width * projection.height()];
    let mut offset = 0i32;
    let mut quiet = 0usize;
    let mut passes = 0usize;

    while passes < params.max_passes {
        cancel.check()?;
        passes += 1;

        flagged.iter_mut().for_each(|f| *f = false);
        let mut candidates = Vec::new();
        for (x, y) in projection.cells() {
            if !map.is_water(x, y) {
                continue;
            }
            let source = heights.get(x, y) as i32;
            for (nx, ny) in projection.neighbors(x, y) {
                let idx = ny * width + nx;
                if flagged[idx] || map.is_water(nx, ny) {
                    continue;
                }
                if heights.get(nx, ny) as i32 <= source + offset {
                    flagged[idx] = true;
                    candidates.push((nx, ny));
                } else if die(rng, params.erosion_chance) == 1 {
                    heights.add(nx, ny, -1);
                }
            }
        }

        candidates.shuffle(rng);
        let converted = candidates.len().min(want - wet);
        for &(x, y) in &candidates[..converted] {
            map.set_terrain(x, y, water);
        }
        wet += converted;

        if converted < params.min_converted {
            offset += params.flood_step;
        } else {
            offset /= 2;
        }
        debug!(pass = passes, converted, offset, water = wet, want, "grow pass");

        if wet >= want {
            return Ok(finish(STAGE, map, target, passes, Convergence::Reached));
        }
        if converted == 0 {
            quiet += 1;
            if quiet > params.stall_passes {
                return Ok(finish(STAGE, map, target, passes, Convergence::Stalled));
            }
        } else {
            quiet = 0;
        }
    }

    Ok(finish(STAGE, map, target, passes, Convergence::IterationCap))
}

// =============================================================================
// SHRINK
// =============================================================================

/// Dry water cells into `seabed` until at most `target` percent is water.
///
/// Coastal cells dry with chance `d6 <= coast neighbours`; open water dries
/// only rarely (3d100 <= 5) so a fully flooded world can still start.
pub fn shrink_to_target<R: Rng + ?Sized>(
    map: &mut SurfaceMap,
    seabed: TerrainId,
    target: u8,
    params: &HydrographyParams,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<HydrographyReport> {
    const STAGE: &str = "shrink";
    check_target(target)?;
    if map.is_water_terrain(seabed) {
        return Err(invalid("shrink_to_target needs a dry seabed terrain"));
    }

    let projection = map.projection().clone();
    let total = projection.valid_cells();
    let want = cells_below(target, total);
    let mut wet = map.water_cells();

    if wet <= want {
        let outcome = if want - wet <= 1 {
            Convergence::Reached
        } else {
            Convergence::AlreadyPast
        };
        return Ok(finish(STAGE, map, target, 0, outcome));
    }

    let mut quiet = 0usize;
    let mut passes = 0usize;
    while passes < params.max_passes {
        cancel.check()?;
        passes += 1;

        let mut candidates = Vec::new();
        let mut open_water = Vec::new();
        for (x, y) in projection.cells() {
            if !map.is_water(x, y) {
                continue;
            }
            let coast = map.land_neighbors(x, y) as u32;
            if coast == 0 {
                open_water.push((x, y));
            }
            let dries = if coast > 0 {
                d6(rng) <= coast
            } else {
                dice(rng, 100, 3) <= 5
            };
            if dries {
                candidates.push((x, y));
            }
        }

        if candidates.is_empty() && open_water.len() == wet {
            // No coast anywhere yet: open one up.
            candidates.extend(open_water.choose(rng).copied());
        }
        candidates.shuffle(rng);
        let converted = candidates.len().min(wet - want);
        for &(x, y) in &candidates[..converted] {
            map.set_terrain(x, y, seabed);
        }
        wet -= converted;
        debug!(pass = passes, converted, water = wet, want, "shrink pass");

        if wet <= want {
            return Ok(finish(STAGE, map, target, passes, Convergence::Reached));
        }
        if converted == 0 {
            quiet += 1;
            if quiet > params.stall_passes {
                return Ok(finish(STAGE, map, target, passes, Convergence::Stalled));
            }
        } else {
            quiet = 0;
        }
    }

    Ok(finish(STAGE, map, target, passes, Convergence::IterationCap))
}

/// Grow or shrink, whichever moves the surface toward `target`.
#[allow(clippy::too_many_arguments)]
pub fn rebalance<R: Rng + ?Sized>(
    map: &mut SurfaceMap,
    heights: &mut HeightField,
    water: TerrainId,
    dry: TerrainId,
    target: u8,
    params: &HydrographyParams,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<HydrographyReport> {
    check_target(target)?;
    let total = map.valid_cells();
    let wet = map.water_cells();
    if wet < cells_for(target, total) {
        grow_to_target(map, heights, water, target, params, rng, cancel)
    } else if wet > cells_for(target, total) {
        shrink_to_target(map, dry, target, params, rng, cancel)
    } else {
        Ok(finish("rebalance", map, target, 0, Convergence::Reached))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::projection::GridProjection;
    use crate::seeds::stage_rng;
    use crate::terrain::{names, TerrainRegistry};

    fn setup(seed: u64) -> (SurfaceMap, HeightField, TerrainId, TerrainId) {
        let registry = Arc::new(TerrainRegistry::with_standard_catalogue());
        let land = registry.lookup(names::LAND).unwrap();
        let water = registry.lookup(names::WATER).unwrap();
        let projection = GridProjection::sinusoidal(64, 32).unwrap();
        let map = SurfaceMap::new(projection, registry, land);
        let heights = HeightField::generate(64, 32, seed).unwrap();
        (map, heights, water, land)
    }

    #[test]
    fn test_grow_converges_for_standard_targets() {
        for target in [0u8, 25, 50, 75, 100] {
            let (mut map, mut heights, water, _) = setup(11);
            let mut rng = stage_rng(3);
            let params = HydrographyParams::default();
            let report = grow_to_target(
                &mut map,
                &mut heights,
                water,
                target,
                &params,
                &mut rng,
                &CancelToken::new(),
            )
            .unwrap();
            assert!(report.passes <= params.max_passes);
            if report.converged() {
                let achieved = map.water_percentage();
                assert!(
                    (achieved - target as f64).abs() <= 2.0,
                    "target {} achieved {}",
                    target,
                    achieved
                );
            } else {
                assert!(report.clone().into_result().is_err());
            }
        }
    }

    #[test]
    fn test_grow_lands_within_one_cell() {
        let (mut map, mut heights, water, _) = setup(21);
        seed_basins(&mut map, &heights, water, 10).unwrap();
        let mut rng = stage_rng(8);
        let report = grow_to_target(
            &mut map,
            &mut heights,
            water,
            60,
            &HydrographyParams::default(),
            &mut rng,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.outcome, Convergence::Reached);
        let total = map.valid_cells();
        assert_eq!(map.water_cells(), cells_for(60, total));
        assert!(report.achieved >= 60.0);
        assert!(report.achieved - 60.0 < 100.0 / total as f64);
    }

    #[test]
    fn test_shrink_to_lower_target() {
        let (mut map, mut heights, water, land) = setup(5);
        let mut rng = stage_rng(1);
        let params = HydrographyParams::default();
        let cancel = CancelToken::new();
        grow_to_target(&mut map, &mut heights, water, 80, &params, &mut rng, &cancel).unwrap();
        let report = shrink_to_target(&mut map, land, 40, &params, &mut rng, &cancel).unwrap();
        assert!(report.converged());
        assert_eq!(map.water_cells(), cells_below(40, map.valid_cells()));
    }

    #[test]
    fn test_shrink_from_full_flood() {
        let (mut map, mut heights, water, land) = setup(6);
        let mut rng = stage_rng(2);
        let params = HydrographyParams::default();
        let cancel = CancelToken::new();
        grow_to_target(&mut map, &mut heights, water, 100, &params, &mut rng, &cancel).unwrap();
        assert_eq!(map.water_cells(), map.valid_cells());
        let report = shrink_to_target(&mut map, land, 70, &params, &mut rng, &cancel).unwrap();
        assert!(report.converged());
        assert_eq!(map.water_cells(), cells_below(70, map.valid_cells()));
    }

    #[test]
    fn test_iteration_cap_reports_failure() {
        let (mut map, mut heights, water, _) = setup(9);
        let mut rng = stage_rng(4);
        let params = HydrographyParams {
            max_passes: 2,
            ..Default::default()
        };
        let report = grow_to_target(
            &mut map,
            &mut heights,
            water,
            100,
            &params,
            &mut rng,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(report.outcome, Convergence::IterationCap);
        assert_eq!(report.passes, 2);
        assert!(report.warning().is_some());
        assert!(matches!(
            report.into_result(),
            Err(MapError::ConvergenceFailure { stage: "grow", target: 100, .. })
        ));
    }

    #[test]
    fn test_rejects_bad_parameters() {
        let (mut map, mut heights, water, land) = setup(1);
        let mut rng = stage_rng(1);
        let params = HydrographyParams::default();
        let cancel = CancelToken::new();
        assert!(grow_to_target(&mut map, &mut heights, water, 101, &params, &mut rng, &cancel).is_err());
        assert!(grow_to_target(&mut map, &mut heights, land, 50, &params, &mut rng, &cancel).is_err());
        assert!(shrink_to_target(&mut map, water, 10, &params, &mut rng, &cancel).is_err());
    }

    #[test]
    fn test_cancellation_stops_the_loop() {
        let (mut map, mut heights, water, _) = setup(2);
        let mut rng = stage_rng(1);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = grow_to_target(
            &mut map,
            &mut heights,
            water,
            50,
            &HydrographyParams::default(),
            &mut rng,
            &cancel,
        );
        assert!(matches!(result, Err(MapError::Cancelled)));
    }

    #[test]
    fn test_rebalance_moves_both_ways() {
        let (mut map, mut heights, water, land) = setup(12);
        let mut rng = stage_rng(12);
        let params = HydrographyParams::default();
        let cancel = CancelToken::new();
        rebalance(&mut map, &mut heights, water, land, 55, &params, &mut rng, &cancel).unwrap();
        assert!((map.water_percentage() - 55.0).abs() <= 2.0);
        rebalance(&mut map, &mut heights, water, land, 30, &params, &mut rng, &cancel).unwrap();
        assert!((map.water_percentage() - 30.0).abs() <= 2.0);
    }
}
