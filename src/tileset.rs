//! Hex tile set for map editing.
//!
//! A validating wrapper around a grid of hex tiles. Unlike the generator's
//! own accessors, which wrap columns and clamp rows, every accessor here
//! rejects coordinates outside `[0, width) x [0, height)` with
//! [`MapError::OutOfBounds`].
//!
//! Hex columns are staggered, so crops always start on an even column.

use std::sync::Arc;

use crate::error::{invalid, MapError, Result};
use crate::heightmap::HeightField;
use crate::terrain::{TerrainId, TerrainRegistry, TileCell};
use crate::tilemap::Tilemap;
use crate::world::SurfaceMap;

/// Largest legal rotation; hexes have six facings.
pub const MAX_ROTATION: u8 = 5;

/// One hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HexTile {
    pub terrain: TileCell,
    /// Overlay such as a settlement or a forest symbol
    pub feature: TileCell,
    pub elevation: i16,
    /// Area tag, 0 for none
    pub area: u16,
    /// Off-map tiles are not writable and ignore edits
    pub writable: bool,
    pub highlighted: bool,
}

impl Default for HexTile {
    fn default() -> Self {
        Self {
            terrain: TileCell::new(TerrainId::UNSET),
            feature: TileCell::new(TerrainId::UNSET),
            elevation: 0,
            area: 0,
            writable: true,
            highlighted: false,
        }
    }
}

/// Packed terrain and feature words for one tile set, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedTiles {
    pub width: usize,
    pub height: usize,
    pub terrain: Vec<u64>,
    pub feature: Vec<u64>,
    pub elevation: Vec<i16>,
}

/// Bounds-checked hex grid.
#[derive(Clone, Debug)]
pub struct TileSet {
    tiles: Tilemap<HexTile>,
    /// Map units per tile
    scale: u32,
    registry: Arc<TerrainRegistry>,
}

impl TileSet {
    pub fn new(width: usize, height: usize, registry: Arc<TerrainRegistry>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(invalid(format!("tile set must be non-empty, got {}x{}", width, height)));
        }
        Ok(Self {
            tiles: Tilemap::new(width, height),
            scale: 1,
            registry,
        })
    }

    /// Wrap a generated surface. Cells outside the projection become
    /// read-only off-map tiles.
    pub fn from_surface(map: &SurfaceMap, heights: &HeightField) -> Result<Self> {
        let mut set = Self::new(map.width(), map.height(), map.registry().clone())?;
        let projection = map.projection();
        for y in 0..map.height() {
            for x in 0..map.width() {
                let on_map = projection.contains(x as i64, y as i64);
                set.tiles.set(
                    x,
                    y,
                    HexTile {
                        terrain: map.cell_at(x, y),
                        elevation: heights.get(x, y) as i16,
                        writable: on_map,
                        ..HexTile::default()
                    },
                );
            }
        }
        Ok(set)
    }

    pub fn width(&self) -> usize {
        self.tiles.width
    }

    pub fn height(&self) -> usize {
        self.tiles.height
    }

    pub fn scale(&self) -> u32 {
        self.scale
    }

    pub fn set_scale(&mut self, scale: u32) -> Result<()> {
        if scale < 1 {
            return Err(invalid("tile set scale must be at least 1"));
        }
        self.scale = scale;
        Ok(())
    }

    pub fn registry(&self) -> &Arc<TerrainRegistry> {
        &self.registry
    }

    fn check(&self, x: i64, y: i64) -> Result<(usize, usize)> {
        if x < 0 || y < 0 || x >= self.width() as i64 || y >= self.height() as i64 {
            return Err(MapError::OutOfBounds {
                x,
                y,
                width: self.width(),
                height: self.height(),
            });
        }
        Ok((x as usize, y as usize))
    }

    fn check_terrain(&self, terrain: TerrainId) -> Result<()> {
        if self.registry.get(terrain).is_none() {
            return Err(MapError::RegistryMiss(format!("terrain #{}", terrain.0)));
        }
        Ok(())
    }

    fn check_rotation(rotation: u8) -> Result<()> {
        if rotation > MAX_ROTATION {
            return Err(invalid(format!("rotation must be 0-{}, got {}", MAX_ROTATION, rotation)));
        }
        Ok(())
    }

    pub fn tile(&self, x: i64, y: i64) -> Result<HexTile> {
        let (x, y) = self.check(x, y)?;
        Ok(*self.tiles.get(x, y))
    }

    /// Apply `edit` to a writable tile. Off-map tiles stay as they are.
    fn edit(&mut self, x: i64, y: i64, edit: impl FnOnce(&mut HexTile)) -> Result<()> {
        let (x, y) = self.check(x, y)?;
        let tile = self.tiles.get_mut(x, y);
        if tile.writable {
            edit(tile);
        }
        Ok(())
    }

    pub fn get_terrain(&self, x: i64, y: i64) -> Result<TerrainId> {
        Ok(self.tile(x, y)?.terrain.terrain)
    }

    pub fn set_terrain(&mut self, x: i64, y: i64, terrain: TerrainId) -> Result<()> {
        self.check_terrain(terrain)?;
        self.edit(x, y, |t| t.terrain.terrain = terrain)
    }

    pub fn get_feature(&self, x: i64, y: i64) -> Result<TerrainId> {
        Ok(self.tile(x, y)?.feature.terrain)
    }

    pub fn set_feature(&mut self, x: i64, y: i64, feature: TerrainId) -> Result<()> {
        self.check_terrain(feature)?;
        self.edit(x, y, |t| t.feature.terrain = feature)
    }

    pub fn get_elevation(&self, x: i64, y: i64) -> Result<i16> {
        Ok(self.tile(x, y)?.elevation)
    }

    pub fn set_elevation(&mut self, x: i64, y: i64, elevation: i16) -> Result<()> {
        self.edit(x, y, |t| t.elevation = elevation)
    }

    pub fn get_area(&self, x: i64, y: i64) -> Result<u16> {
        Ok(self.tile(x, y)?.area)
    }

    pub fn set_area(&mut self, x: i64, y: i64, area: u16) -> Result<()> {
        self.edit(x, y, |t| t.area = area)
    }

    pub fn is_writable(&self, x: i64, y: i64) -> Result<bool> {
        Ok(self.tile(x, y)?.writable)
    }

    pub fn set_writable(&mut self, x: i64, y: i64, writable: bool) -> Result<()> {
        let (x, y) = self.check(x, y)?;
        self.tiles.get_mut(x, y).writable = writable;
        Ok(())
    }

    pub fn is_highlighted(&self, x: i64, y: i64) -> Result<bool> {
        Ok(self.tile(x, y)?.highlighted)
    }

    pub fn set_highlighted(&mut self, x: i64, y: i64, highlighted: bool) -> Result<()> {
        let (x, y) = self.check(x, y)?;
        self.tiles.get_mut(x, y).highlighted = highlighted;
        Ok(())
    }

    pub fn get_terrain_rotation(&self, x: i64, y: i64) -> Result<u8> {
        Ok(self.tile(x, y)?.terrain.rotation)
    }

    pub fn set_terrain_rotation(&mut self, x: i64, y: i64, rotation: u8) -> Result<()> {
        Self::check_rotation(rotation)?;
        self.edit(x, y, |t| t.terrain.rotation = rotation)
    }

    pub fn get_feature_rotation(&self, x: i64, y: i64) -> Result<u8> {
        Ok(self.tile(x, y)?.feature.rotation)
    }

    pub fn set_feature_rotation(&mut self, x: i64, y: i64, rotation: u8) -> Result<()> {
        Self::check_rotation(rotation)?;
        self.edit(x, y, |t| t.feature.rotation = rotation)
    }

    /// Cut the set down to the `w` x `h` block at `(x, y)`. An odd `x` is
    /// moved one column west, and the block widened by one, so hex parity
    /// survives the crop.
    pub fn crop(&mut self, x: i64, y: i64, w: i64, h: i64) -> Result<()> {
        if w < 1 || h < 1 {
            return Err(invalid(format!("crop size must be positive, got {}x{}", w, h)));
        }
        let (x, w) = if x % 2 != 0 { (x - 1, w.saturating_add(1)) } else { (x, w) };
        let (x0, y0) = self.check(x, y)?;
        let far = (x.checked_add(w - 1), y.checked_add(h - 1));
        let (Some(x1), Some(y1)) = far else {
            return Err(MapError::OutOfBounds {
                x: x.saturating_add(w - 1),
                y: y.saturating_add(h - 1),
                width: self.width(),
                height: self.height(),
            });
        };
        self.check(x1, y1)?;

        let (w, h) = (w as usize, h as usize);
        let mut cropped = Tilemap::new(w, h);
        for cy in 0..h {
            for cx in 0..w {
                cropped.set(cx, cy, *self.tiles.get(x0 + cx, y0 + cy));
            }
        }
        self.tiles = cropped;
        Ok(())
    }

    /// Raw per-tile words for a persistence layer.
    pub fn packed(&self) -> PackedTiles {
        let tiles = self.tiles.as_slice();
        PackedTiles {
            width: self.width(),
            height: self.height(),
            terrain: tiles.iter().map(|t| t.terrain.pack()).collect(),
            feature: tiles.iter().map(|t| t.feature.pack()).collect(),
            elevation: tiles.iter().map(|t| t.elevation).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::GridProjection;
    use crate::terrain::{names, ROTATION_BASE};

    fn registry() -> Arc<TerrainRegistry> {
        Arc::new(TerrainRegistry::with_standard_catalogue())
    }

    #[test]
    fn test_out_of_bounds_versus_internal_wrap() {
        let registry = registry();
        let land = registry.lookup(names::LAND).unwrap();
        let projection = GridProjection::rectangular(16, 8).unwrap();
        let mut map = SurfaceMap::new(projection, registry.clone(), land);
        let water = registry.lookup(names::WATER).unwrap();
        map.set_terrain(15, 0, water);
        let heights = HeightField::flat(16, 8, 10);

        let set = TileSet::from_surface(&map, &heights).unwrap();
        assert!(matches!(set.get_terrain(-1, 0), Err(MapError::OutOfBounds { x: -1, y: 0, .. })));
        assert!(matches!(set.get_terrain(16, 0), Err(MapError::OutOfBounds { x: 16, .. })));
        assert!(matches!(set.get_terrain(0, 8), Err(MapError::OutOfBounds { .. })));

        // The generator's own lookup wraps instead.
        assert_eq!(map.terrain_wrapped(-1, 0), water);
        assert_eq!(map.terrain_wrapped(16, 0), land);
        assert_eq!(set.get_terrain(15, 0).unwrap(), water);
    }

    #[test]
    fn test_zero_size_is_rejected() {
        assert!(matches!(TileSet::new(0, 4, registry()), Err(MapError::InvalidParameter(_))));
        assert!(matches!(TileSet::new(4, 0, registry()), Err(MapError::InvalidParameter(_))));
    }

    #[test]
    fn test_setters_and_rotation_limits() {
        let registry = registry();
        let woods = registry.lookup(names::WOODS).unwrap();
        let mut set = TileSet::new(6, 4, registry).unwrap();
        set.set_terrain(2, 1, woods).unwrap();
        set.set_elevation(2, 1, -40).unwrap();
        set.set_area(2, 1, 7).unwrap();
        set.set_highlighted(2, 1, true).unwrap();
        set.set_terrain_rotation(2, 1, 5).unwrap();
        set.set_feature_rotation(2, 1, 3).unwrap();

        let tile = set.tile(2, 1).unwrap();
        assert_eq!(tile.terrain, TileCell::rotated(woods, 5));
        assert_eq!((tile.elevation, tile.area, tile.highlighted), (-40, 7, true));
        assert_eq!(set.get_feature_rotation(2, 1).unwrap(), 3);

        assert!(matches!(set.set_terrain_rotation(2, 1, 6), Err(MapError::InvalidParameter(_))));
        assert!(matches!(set.set_area(6, 1, 1), Err(MapError::OutOfBounds { .. })));
        assert!(matches!(set.set_terrain(0, 0, TerrainId(60_000)), Err(MapError::RegistryMiss(_))));
    }

    #[test]
    fn test_read_only_tiles_ignore_edits() {
        let registry = registry();
        let grass = registry.lookup(names::GRASS).unwrap();
        let mut set = TileSet::new(4, 4, registry).unwrap();
        set.set_writable(1, 1, false).unwrap();
        set.set_terrain(1, 1, grass).unwrap();
        assert_eq!(set.get_terrain(1, 1).unwrap(), TerrainId::UNSET);
        set.set_highlighted(1, 1, true).unwrap();
        assert!(set.is_highlighted(1, 1).unwrap());
    }

    #[test]
    fn test_from_surface_marks_off_map_tiles() {
        let registry = registry();
        let land = registry.lookup(names::LAND).unwrap();
        let projection = GridProjection::sinusoidal(32, 16).unwrap();
        let map = SurfaceMap::new(projection.clone(), registry, land);
        let set = TileSet::from_surface(&map, &HeightField::flat(32, 16, 0)).unwrap();
        assert!(!set.is_writable(0, 0).unwrap());
        assert_eq!(set.get_terrain(0, 0).unwrap(), TerrainId::OUT_OF_BOUNDS);
        let x = projection.west_bound(0) as i64;
        assert!(set.is_writable(x, 0).unwrap());
        assert_eq!(set.get_terrain(x, 0).unwrap(), land);
    }

    #[test]
    fn test_crop_keeps_hex_parity() {
        let registry = registry();
        let grass = registry.lookup(names::GRASS).unwrap();
        let mut set = TileSet::new(10, 10, registry).unwrap();
        set.set_terrain(2, 3, grass).unwrap();
        set.crop(3, 3, 4, 2).unwrap();
        assert_eq!((set.width(), set.height()), (5, 2));
        assert_eq!(set.get_terrain(0, 0).unwrap(), grass);

        assert!(matches!(set.crop(0, 0, 0, 1), Err(MapError::InvalidParameter(_))));
        assert!(matches!(set.crop(0, 0, 6, 1), Err(MapError::OutOfBounds { .. })));
        assert!(matches!(set.crop(2, 0, i64::MAX, 1), Err(MapError::OutOfBounds { .. })));
        assert!(matches!(set.crop(1, 0, i64::MAX, 1), Err(MapError::OutOfBounds { .. })));
        assert!(matches!(set.crop(0, 1, 1, i64::MAX), Err(MapError::OutOfBounds { .. })));
        assert_eq!((set.width(), set.height()), (5, 2));
        assert!(matches!(set.set_scale(0), Err(MapError::InvalidParameter(_))));
        set.set_scale(25).unwrap();
        assert_eq!(set.scale(), 25);
    }

    #[test]
    fn test_packed_words() {
        let registry = registry();
        let jungle = registry.lookup(names::JUNGLE).unwrap();
        let mut set = TileSet::new(3, 2, registry).unwrap();
        set.set_terrain(1, 1, jungle).unwrap();
        set.set_terrain_rotation(1, 1, 4).unwrap();
        let packed = set.packed();
        assert_eq!(packed.terrain.len(), 6);
        assert_eq!(packed.terrain[4], jungle.0 as u64 * ROTATION_BASE + 4);
        assert_eq!(TileCell::unpack(packed.terrain[4]).unwrap(), TileCell::rotated(jungle, 4));
    }
}
