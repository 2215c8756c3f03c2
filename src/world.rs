//! The terrain layer of a generated surface.

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::{MapError, Result};
use crate::projection::{GridProjection, ProjectionKind};
use crate::terrain::{TerrainId, TerrainRegistry, TileCell};
use crate::tilemap::Tilemap;

/// Terrain cells laid out under a [`GridProjection`].
///
/// Cells outside a row's span hold [`TerrainId::OUT_OF_BOUNDS`] and are never
/// written by the generation stages.
#[derive(Clone, Debug)]
pub struct SurfaceMap {
    projection: GridProjection,
    cells: Tilemap<TileCell>,
    registry: Arc<TerrainRegistry>,
    water_flags: Vec<bool>,
}

impl SurfaceMap {
    /// Fill every valid cell with `fill`.
    pub fn new(projection: GridProjection, registry: Arc<TerrainRegistry>, fill: TerrainId) -> Self {
        let mut cells = Tilemap::new_with(
            projection.width(),
            projection.height(),
            TileCell::new(TerrainId::OUT_OF_BOUNDS),
        );
        for (x, y) in projection.cells() {
            cells.set(x, y, TileCell::new(fill));
        }
        let water_flags = registry.water_flags();
        Self {
            projection,
            cells,
            registry,
            water_flags,
        }
    }

    /// Rebuild from raw parts. The cell buffer must match the projection.
    pub fn from_parts(
        projection: GridProjection,
        cells: Tilemap<TileCell>,
        registry: Arc<TerrainRegistry>,
    ) -> Result<Self> {
        if cells.width != projection.width() || cells.height != projection.height() {
            return Err(MapError::InvalidParameter(format!(
                "cell buffer {}x{} does not match projection {}x{}",
                cells.width,
                cells.height,
                projection.width(),
                projection.height()
            )));
        }
        let water_flags = registry.water_flags();
        Ok(Self {
            projection,
            cells,
            registry,
            water_flags,
        })
    }

    pub fn projection(&self) -> &GridProjection {
        &self.projection
    }

    pub fn projection_kind(&self) -> ProjectionKind {
        self.projection.kind()
    }

    pub fn registry(&self) -> &Arc<TerrainRegistry> {
        &self.registry
    }

    pub fn cells(&self) -> &Tilemap<TileCell> {
        &self.cells
    }

    pub fn width(&self) -> usize {
        self.projection.width()
    }

    pub fn height(&self) -> usize {
        self.projection.height()
    }

    /// Pick up terrains registered after this map was created.
    pub fn refresh_terrain_flags(&mut self) {
        self.water_flags = self.registry.water_flags();
    }

    pub fn is_valid(&self, x: usize, y: usize) -> bool {
        self.projection.contains(x as i64, y as i64)
    }

    pub fn cell_at(&self, x: usize, y: usize) -> TileCell {
        *self.cells.get(x, y)
    }

    pub fn terrain_at(&self, x: usize, y: usize) -> TerrainId {
        self.cells.get(x, y).terrain
    }

    /// Generation-side lookup: rows clamp, columns wrap inside the row span.
    pub fn terrain_wrapped(&self, x: i64, y: i64) -> TerrainId {
        let (x, y) = self.projection.resolve(x, y);
        self.terrain_at(x, y)
    }

    /// Write a terrain, keeping the rotation. Out-of-bounds cells are left alone.
    pub fn set_terrain(&mut self, x: usize, y: usize, terrain: TerrainId) {
        if self.is_valid(x, y) {
            self.cells.get_mut(x, y).terrain = terrain;
        }
    }

    pub fn set_cell(&mut self, x: usize, y: usize, cell: TileCell) {
        if self.is_valid(x, y) {
            self.cells.set(x, y, cell);
        }
    }

    pub fn is_water_terrain(&self, terrain: TerrainId) -> bool {
        match self.water_flags.get(terrain.index()) {
            Some(&flag) => flag,
            None => self.registry.is_water(terrain),
        }
    }

    pub fn is_water(&self, x: usize, y: usize) -> bool {
        self.is_valid(x, y) && self.is_water_terrain(self.terrain_at(x, y))
    }

    /// Valid land cells (not water, not out of bounds).
    pub fn is_land(&self, x: usize, y: usize) -> bool {
        self.is_valid(x, y) && !self.is_water_terrain(self.terrain_at(x, y))
    }

    pub fn valid_cells(&self) -> usize {
        self.projection.valid_cells()
    }

    pub fn water_cells(&self) -> usize {
        self.projection
            .cells()
            .filter(|&(x, y)| self.is_water_terrain(self.terrain_at(x, y)))
            .count()
    }

    /// Share of valid cells that are water, 0-100.
    pub fn water_percentage(&self) -> f64 {
        let total = self.valid_cells();
        if total == 0 {
            return 0.0;
        }
        self.water_cells() as f64 * 100.0 / total as f64
    }

    /// Valid cells still holding the unset marker.
    pub fn unset_cells(&self) -> usize {
        self.projection
            .cells()
            .filter(|&(x, y)| self.terrain_at(x, y) == TerrainId::UNSET)
            .count()
    }

    /// Cell counts per terrain over the valid surface.
    pub fn terrain_counts(&self) -> BTreeMap<TerrainId, usize> {
        let mut counts = BTreeMap::new();
        for (x, y) in self.projection.cells() {
            *counts.entry(self.terrain_at(x, y)).or_insert(0) += 1;
        }
        counts
    }

    /// Number of 4-neighbours that are not water.
    pub fn land_neighbors(&self, x: usize, y: usize) -> usize {
        self.projection
            .neighbors(x, y)
            .into_iter()
            .filter(|&(nx, ny)| !self.is_water(nx, ny))
            .count()
    }

    /// Replace the layout and cells together (used when the resolution changes).
    pub(crate) fn replace(&mut self, projection: GridProjection, cells: Tilemap<TileCell>) {
        self.projection = projection;
        self.cells = cells;
    }
}
