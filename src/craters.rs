//! Impact craters and ejecta rays.
//!
//! A crater scales the bowl's elevation by the depth factor, raises a wall at
//! the rim, and on large impacts sprays rays of ejecta outward. Later craters
//! overwrite earlier ones where they overlap.

use std::collections::BTreeMap;
use std::f64::consts::TAU;

use rand::Rng;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::dice::{d2, d3, dice, die, jitter, roll_zero};
use crate::error::{invalid, Result};
use crate::heightmap::{HeightField, MAX_ELEVATION};
use crate::terrain::TerrainId;
use crate::world::SurfaceMap;

/// How a world gets bombarded.
#[derive(Clone, Debug, PartialEq)]
pub struct CraterProfile {
    pub count: usize,
    /// Radius is `(2 x d(avg_radius)) / 2`, so this is roughly the mean
    pub avg_radius: u32,
    /// Bowl elevation multiplier, in `(0, 1]`; smaller is deeper
    pub depth_factor: f64,
    /// Laid over the bowl and wall
    pub rim_terrain: Option<TerrainId>,
    /// Laid on parts of the wall and along rays
    pub ejecta_terrain: Option<TerrainId>,
}

impl Default for CraterProfile {
    fn default() -> Self {
        Self {
            count: 150,
            avg_radius: 25,
            depth_factor: 0.5,
            rim_terrain: None,
            ejecta_terrain: None,
        }
    }
}

/// Cells touched by one crater.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CraterFootprint {
    pub interior: Vec<(usize, usize)>,
    pub rim: Vec<(usize, usize)>,
    pub ray_cells: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CraterReport {
    pub craters: usize,
    pub cells: usize,
    pub ray_cells: usize,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Role {
    Interior,
    Rim,
}

fn check_depth(depth_factor: f64) -> Result<()> {
    if !(depth_factor > 0.0 && depth_factor <= 1.0) {
        return Err(invalid(format!("crater depth factor must be in (0, 1], got {}", depth_factor)));
    }
    Ok(())
}

/// Scatter `profile.count` craters, keeping centres out of the top and bottom 5%.
pub fn scatter_craters<R: Rng + ?Sized>(
    map: &mut SurfaceMap,
    heights: &mut HeightField,
    profile: &CraterProfile,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<CraterReport> {
    check_depth(profile.depth_factor)?;
    if profile.avg_radius == 0 {
        return Err(invalid("crater radius must be positive"));
    }

    let height = map.height();
    let mut report = CraterReport::default();
    for _ in 0..profile.count {
        cancel.check()?;
        let y = (roll_zero(rng, height as u32) as f64 * 0.9 + height as f64 * 0.05) as usize;
        let y = y.min(height - 1);
        let (west, east) = map.projection().span(y);
        let x = west + roll_zero(rng, (east - west) as u32) as usize;
        let radius = (dice(rng, profile.avg_radius, 2) / 2).max(1);

        let footprint = add_crater(
            map,
            heights,
            x as i64,
            y,
            radius,
            profile.depth_factor,
            profile.rim_terrain,
            profile.ejecta_terrain,
            rng,
        )?;
        report.craters += 1;
        report.cells += footprint.interior.len() + footprint.rim.len();
        report.ray_cells += footprint.ray_cells;
    }
    debug!(
        craters = report.craters,
        cells = report.cells,
        ray_cells = report.ray_cells,
        "craters scattered"
    );
    Ok(report)
}

/// Punch one crater centred on `(x, y)`.
///
/// Every interior cell ends at or below its old elevation and every rim cell
/// ends at least as high as the deepest-cut interior cell left standing.
#[allow(clippy::too_many_arguments)]
pub fn add_crater<R: Rng + ?Sized>(
    map: &mut SurfaceMap,
    heights: &mut HeightField,
    x: i64,
    y: usize,
    radius: u32,
    depth_factor: f64,
    rim_terrain: Option<TerrainId>,
    ejecta_terrain: Option<TerrainId>,
    rng: &mut R,
) -> Result<CraterFootprint> {
    check_depth(depth_factor)?;
    if radius == 0 {
        return Err(invalid("crater radius must be positive"));
    }
    if y >= map.height() {
        return Err(invalid(format!("crater row {} outside {} rows", y, map.height())));
    }

    let projection = map.projection().clone();
    let r = radius as i64;
    let cy = y as i64;
    let cx = projection.wrap(x, y) as i64;

    let mut roles: BTreeMap<(usize, usize), Role> = BTreeMap::new();
    for yy in (cy - r)..=(cy + r) {
        if yy < 0 || yy >= projection.height() as i64 {
            continue;
        }
        for xx in (cx - r)..=(cx + r) {
            let (dx, dy) = (xx - cx, yy - cy);
            let d = ((dx * dx + dy * dy) as f64).sqrt() as i64;
            let role = if d == r {
                Role::Rim
            } else if d > r || (d > 0 && dice(rng, d as u32, 2) as i64 > r) {
                continue;
            } else {
                Role::Interior
            };
            let cell = (projection.wrap(xx, yy as usize), yy as usize);
            let entry = roles.entry(cell).or_insert(role);
            if role == Role::Interior {
                *entry = Role::Interior;
            }
        }
    }

    let mut footprint = CraterFootprint::default();
    let mut deepest_left = 0i32;
    for (&(px, py), &role) in &roles {
        if role == Role::Interior {
            heights.scale(px, py, depth_factor);
            deepest_left = deepest_left.max(heights.get(px, py) as i32);
            if let Some(t) = rim_terrain {
                map.set_terrain(px, py, t);
            }
            footprint.interior.push((px, py));
        }
    }
    for (&(px, py), &role) in &roles {
        if role == Role::Rim {
            let raised = (heights.get(px, py) as f64 / depth_factor) as i32;
            heights.set(px, py, raised.max(deepest_left).min(MAX_ELEVATION as i32));
            if let Some(t) = rim_terrain {
                map.set_terrain(px, py, t);
            }
            if let Some(t) = ejecta_terrain {
                if d3(rng) != 1 {
                    map.set_terrain(px, py, t);
                }
            }
            footprint.rim.push((px, py));
        }
    }

    if let Some(ejecta) = ejecta_terrain {
        if die(rng, radius) > 5 && d2(rng) == 1 {
            let rays = (radius as f64).powf(1.2) as usize;
            for _ in 0..rays {
                footprint.ray_cells += lay_ray(map, heights, &roles, cx, cy, r, depth_factor, ejecta, rng);
            }
        }
    }
    Ok(footprint)
}

/// One ray from just outside the rim to a point 2-10 radii away. Cells of
/// the crater itself are never touched.
#[allow(clippy::too_many_arguments)]
fn lay_ray<R: Rng + ?Sized>(
    map: &mut SurfaceMap,
    heights: &mut HeightField,
    crater: &BTreeMap<(usize, usize), Role>,
    cx: i64,
    cy: i64,
    r: i64,
    depth_factor: f64,
    ejecta: TerrainId,
    rng: &mut R,
) -> usize {
    let angle = rng.gen_range(0.0..TAU);
    let length = rng.gen_range((2 * r) as f64..=(10 * r) as f64);
    let mut ex = cx + (angle.cos() * length) as i64;
    let mut ey = cy + (angle.sin() * length) as i64;
    let d = (((ex - cx).pow(2) + (ey - cy).pow(2)) as f64).sqrt() as i64;

    let height = map.height() as i64;
    let mut laid = 0;
    for l in (r + 1)..d {
        let (ox, oy) = ((ex - cx) * l / d, (ey - cy) * l / d);
        let py = cy + oy;
        if py < 0 || py >= height {
            break;
        }
        let px = map.projection().wrap(cx + ox, py as usize);
        let py = py as usize;
        let inside = ((ox * ox + oy * oy) as f64).sqrt() as i64 <= r;
        if !inside && !crater.contains_key(&(px, py)) {
            heights.scale(px, py, depth_factor);
            map.set_terrain(px, py, ejecta);
            laid += 1;
        }
        ex += jitter(rng, 2, 1) as i64;
        ey += jitter(rng, 2, 1) as i64;
    }
    laid
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::projection::GridProjection;
    use crate::seeds::stage_rng;
    use crate::terrain::TerrainRegistry;

    fn barren(width: usize, height: usize) -> (SurfaceMap, HeightField, Arc<TerrainRegistry>) {
        let registry = Arc::new(TerrainRegistry::with_standard_catalogue());
        let surface = registry.lookup("Selenian").unwrap();
        let projection = GridProjection::sinusoidal(width, height).unwrap();
        let map = SurfaceMap::new(projection, registry.clone(), surface);
        let heights = HeightField::generate(width, height, 77).unwrap();
        (map, heights, registry)
    }

    #[test]
    fn test_crater_depresses_interior_and_raises_rim() {
        let (mut map, mut heights, registry) = barren(128, 64);
        let impact = registry.lookup("SelenianImpact").unwrap();
        let before = heights.clone();
        let mut rng = stage_rng(3);
        let footprint =
            add_crater(&mut map, &mut heights, 64, 32, 8, 0.6, Some(impact), None, &mut rng).unwrap();

        assert!(!footprint.interior.is_empty());
        assert!(!footprint.rim.is_empty());
        let deepest = footprint
            .interior
            .iter()
            .map(|&(x, y)| heights.get(x, y))
            .max()
            .unwrap();
        for &(x, y) in &footprint.interior {
            assert!(heights.get(x, y) <= before.get(x, y));
            assert_eq!(map.terrain_at(x, y), impact);
        }
        for &(x, y) in &footprint.rim {
            assert!(heights.get(x, y) >= deepest);
        }
    }

    #[test]
    fn test_ejecta_rays_leave_the_rim_standing() {
        let mut rays_seen = 0;
        for seed in 0..100 {
            let (mut map, mut heights, registry) = barren(256, 128);
            let impact = registry.lookup("SelenianImpact").unwrap();
            let ejecta = registry.lookup("SelenianEjecta").unwrap();
            let mut rng = stage_rng(seed);
            let footprint =
                add_crater(&mut map, &mut heights, 128, 64, 20, 0.5, Some(impact), Some(ejecta), &mut rng)
                    .unwrap();
            if footprint.ray_cells > 0 {
                rays_seen += 1;
            }
            let deepest = footprint.interior.iter().map(|&(x, y)| heights.get(x, y)).max().unwrap();
            let lowest_rim = footprint.rim.iter().map(|&(x, y)| heights.get(x, y)).min().unwrap();
            assert!(lowest_rim >= deepest, "seed {}: rim {} below interior {}", seed, lowest_rim, deepest);
        }
        assert!(rays_seen > 0);
    }

    #[test]
    fn test_crater_wraps_across_the_seam() {
        let (mut map, mut heights, registry) = barren(128, 64);
        let impact = registry.lookup("SelenianImpact").unwrap();
        let (west, east) = map.projection().span(32);
        let mut rng = stage_rng(4);
        let footprint = add_crater(
            &mut map,
            &mut heights,
            west as i64,
            32,
            5,
            0.5,
            Some(impact),
            None,
            &mut rng,
        )
        .unwrap();
        assert!(footprint.interior.iter().any(|&(x, _)| x >= east - 5));
        for &(x, y) in footprint.interior.iter().chain(&footprint.rim) {
            assert!(map.is_valid(x, y));
        }
    }

    #[test]
    fn test_scatter_keeps_off_the_poles() {
        let (mut map, mut heights, registry) = barren(128, 64);
        let impact = registry.lookup("SelenianImpact").unwrap();
        let ejecta = registry.lookup("SelenianEjecta").unwrap();
        let profile = CraterProfile {
            count: 40,
            avg_radius: 6,
            depth_factor: 0.7,
            rim_terrain: Some(impact),
            ejecta_terrain: Some(ejecta),
        };
        let mut rng = stage_rng(5);
        let report = scatter_craters(&mut map, &mut heights, &profile, &mut rng, &CancelToken::new()).unwrap();
        assert_eq!(report.craters, 40);
        assert!(report.cells > 0);
        assert_eq!(map.unset_cells(), 0);
    }

    #[test]
    fn test_invalid_crater_parameters() {
        let (mut map, mut heights, _) = barren(32, 16);
        let mut rng = stage_rng(1);
        assert!(add_crater(&mut map, &mut heights, 10, 8, 0, 0.5, None, None, &mut rng).is_err());
        assert!(add_crater(&mut map, &mut heights, 10, 8, 3, 0.0, None, None, &mut rng).is_err());
        assert!(add_crater(&mut map, &mut heights, 10, 8, 3, 1.5, None, None, &mut rng).is_err());
        assert!(add_crater(&mut map, &mut heights, 10, 16, 3, 0.5, None, None, &mut rng).is_err());
    }

    #[test]
    fn test_later_crater_wins() {
        let (mut map, mut heights, registry) = barren(64, 32);
        let first = registry.lookup("SelenianImpact").unwrap();
        let second = registry.lookup("HadeanImpact").unwrap();
        let mut rng = stage_rng(6);
        add_crater(&mut map, &mut heights, 32, 16, 4, 0.5, Some(first), None, &mut rng).unwrap();
        add_crater(&mut map, &mut heights, 32, 16, 4, 0.5, Some(second), None, &mut rng).unwrap();
        assert_eq!(map.terrain_at(32, 16), second);
    }
}
