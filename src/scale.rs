//! Resolution scaling and cylindrical stretching.
//!
//! Upscaling doubles the grid one step at a time. Each source cell becomes a
//! 2x2 block whose quadrants sometimes borrow the terrain of the neighbour
//! they face, which roughens coastlines instead of leaving square blocks.

use rand::Rng;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::dice::d4;
use crate::error::{invalid, MapError, Result};
use crate::heightmap::HeightField;
use crate::projection::GridProjection;
use crate::terrain::{TerrainId, TileCell};
use crate::tilemap::Tilemap;
use crate::world::SurfaceMap;

/// Scale `map` and `heights` up by `factor`, which must be a power of two.
/// A factor of 1 leaves both untouched.
pub fn upscale<R: Rng + ?Sized>(
    map: &mut SurfaceMap,
    heights: &mut HeightField,
    factor: usize,
    rng: &mut R,
    cancel: &CancelToken,
) -> Result<()> {
    if factor == 0 || !factor.is_power_of_two() {
        return Err(invalid(format!("scale factor must be a positive power of two, got {}", factor)));
    }
    check_shapes(map, heights)?;

    let mut remaining = factor;
    while remaining > 1 {
        cancel.check()?;
        double(map, heights, rng)?;
        remaining /= 2;
        debug!(width = map.width(), height = map.height(), "resolution doubled");
    }
    Ok(())
}

fn check_shapes(map: &SurfaceMap, heights: &HeightField) -> Result<()> {
    if map.width() != heights.width() || map.height() != heights.height() {
        return Err(invalid(format!(
            "terrain grid {}x{} and height field {}x{} differ",
            map.width(),
            map.height(),
            heights.width(),
            heights.height()
        )));
    }
    Ok(())
}

/// One doubling step.
fn double<R: Rng + ?Sized>(map: &mut SurfaceMap, heights: &mut HeightField, rng: &mut R) -> Result<()> {
    let source = map.projection().clone();
    let target = source.scaled(2)?;
    let mut cells = Tilemap::new_with(target.width(), target.height(), TileCell::new(TerrainId::OUT_OF_BOUNDS));
    let mut elevation = Tilemap::new_with(target.width(), target.height(), 0u8);

    for (x, y) in source.cells() {
        let own = map.cell_at(x, y);
        let own_height = heights.get(x, y) as i32;
        for (qx, qy) in [(0usize, 0usize), (1, 0), (0, 1), (1, 1)] {
            let dy = if qy == 0 { -1 } else { 1 };
            let dx = if qx == 0 { -1 } else { 1 };

            let vertical = source.vertical_neighbor(x, y, dy);
            let horizontal = (source.wrap(x as i64 + dx, y), y);

            let cell = match d4(rng) {
                1 => vertical.map_or(own, |(vx, vy)| map.cell_at(vx, vy)),
                2 => map.cell_at(horizontal.0, horizontal.1),
                _ => own,
            };
            let vertical_height = vertical.map_or(own_height, |(vx, vy)| heights.get(vx, vy) as i32);
            let horizontal_height = heights.get(horizontal.0, horizontal.1) as i32;
            let h = (own_height + vertical_height + horizontal_height) / 3;

            let (tx, ty) = (x * 2 + qx, y * 2 + qy);
            cells.set(tx, ty, cell);
            elevation.set(tx, ty, h as u8);
        }
    }

    map.replace(target, cells);
    *heights = HeightField::from_tilemap(elevation);
    Ok(())
}

/// Re-project a sinusoidal surface onto the full rectangle. Each row's valid
/// span is resampled across the whole width; afterwards every row spans
/// `[0, width)`.
pub fn stretch(map: &mut SurfaceMap, heights: &mut HeightField) -> Result<()> {
    check_shapes(map, heights)?;
    let source = map.projection().clone();
    let (width, height) = (source.width(), source.height());
    let target = GridProjection::rectangular(width, height)?;

    let mut cells = Tilemap::new_with(width, height, TileCell::new(TerrainId::UNSET));
    let mut elevation = Tilemap::new_with(width, height, 0u8);
    for y in 0..height {
        let (west, east) = source.span(y);
        let span = east - west;
        if span == 0 {
            return Err(MapError::InvalidParameter(format!("row {} has no valid cells", y)));
        }
        for x in 0..width {
            let sx = west + x * span / width;
            cells.set(x, y, map.cell_at(sx, y));
            elevation.set(x, y, heights.get(sx, y));
        }
    }

    map.replace(target, cells);
    *heights = HeightField::from_tilemap(elevation);
    debug!(width, height, "surface stretched to rectangle");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    use crate::projection::ProjectionKind;
    use crate::seeds::stage_rng;
    use crate::terrain::{names, TerrainRegistry};

    fn striped(width: usize, height: usize) -> (SurfaceMap, HeightField) {
        let registry = Arc::new(TerrainRegistry::with_standard_catalogue());
        let palette: Vec<TerrainId> = [names::WATER, names::LAND, names::GRASS, names::DESERT, names::WOODS]
            .iter()
            .map(|n| registry.lookup(n).unwrap())
            .collect();
        let projection = GridProjection::sinusoidal(width, height).unwrap();
        let mut map = SurfaceMap::new(projection.clone(), registry, palette[0]);
        for (x, y) in projection.cells() {
            map.set_terrain(x, y, palette[(x / 3 + y * 2) % palette.len()]);
        }
        let heights = HeightField::generate(width, height, 21).unwrap();
        (map, heights)
    }

    #[test]
    fn test_size_law() {
        for k in 0..3u32 {
            let (mut map, mut heights) = striped(32, 16);
            let factor = 1usize << k;
            upscale(&mut map, &mut heights, factor, &mut stage_rng(k as u64), &CancelToken::new()).unwrap();
            assert_eq!((map.width(), map.height()), (32 * factor, 16 * factor));
            assert_eq!((heights.width(), heights.height()), (32 * factor, 16 * factor));
            assert_eq!(map.unset_cells(), 0);
        }
    }

    #[test]
    fn test_children_come_from_neighbourhood() {
        let (original, heights) = striped(32, 16);
        let mut map = original.clone();
        let mut scaled_heights = heights.clone();
        upscale(&mut map, &mut scaled_heights, 2, &mut stage_rng(9), &CancelToken::new()).unwrap();

        let source = original.projection();
        for (x, y) in map.projection().clone().cells() {
            let (px, py) = (x / 2, y / 2);
            assert!(source.contains(px as i64, py as i64));
            let mut allowed = HashSet::new();
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let ny = py as i64 + dy;
                    if source.contains(px as i64, ny) || (dy == 0) {
                        let (nx, ny) = source.resolve(px as i64 + dx, ny);
                        allowed.insert(original.terrain_at(nx, ny));
                    }
                }
            }
            assert!(allowed.contains(&map.terrain_at(x, y)), "({}, {})", x, y);
        }
    }

    #[test]
    fn test_children_stay_inside_projection() {
        let (mut map, mut heights) = striped(32, 16);
        upscale(&mut map, &mut heights, 4, &mut stage_rng(3), &CancelToken::new()).unwrap();
        let projection = map.projection().clone();
        for y in 0..projection.height() {
            for x in 0..projection.width() {
                let oob = map.terrain_at(x, y) == TerrainId::OUT_OF_BOUNDS;
                assert_eq!(oob, !projection.contains(x as i64, y as i64));
            }
        }
    }

    #[test]
    fn test_bad_factor() {
        let (mut map, mut heights) = striped(32, 16);
        let cancel = CancelToken::new();
        for factor in [0, 3, 6] {
            let result = upscale(&mut map, &mut heights, factor, &mut stage_rng(1), &cancel);
            assert!(matches!(result, Err(MapError::InvalidParameter(_))));
        }
        let mut small = HeightField::flat(8, 8, 0);
        assert!(upscale(&mut map, &mut small, 2, &mut stage_rng(1), &cancel).is_err());
    }

    #[test]
    fn test_cancelled_upscale() {
        let (mut map, mut heights) = striped(32, 16);
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = upscale(&mut map, &mut heights, 2, &mut stage_rng(1), &cancel);
        assert!(matches!(result, Err(MapError::Cancelled)));
        assert_eq!(map.width(), 32);
    }

    #[test]
    fn test_stretch_fills_rectangle() {
        let (mut map, mut heights) = striped(64, 32);
        let polar = map.terrain_at(map.projection().west_bound(0), 0);
        stretch(&mut map, &mut heights).unwrap();
        assert_eq!(map.projection_kind(), ProjectionKind::Cylindrical);
        assert_eq!(map.valid_cells(), 64 * 32);
        assert_eq!(map.unset_cells(), 0);
        for y in 0..32 {
            assert_eq!(map.projection().span(y), (0, 64));
            for x in 0..64 {
                assert_ne!(map.terrain_at(x, y), TerrainId::OUT_OF_BOUNDS);
            }
        }
        assert_eq!(map.terrain_at(0, 0), polar);
    }
}
