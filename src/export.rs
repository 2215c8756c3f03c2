//! Output: PNG rendering, raw persistence arrays and a JSON summary.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::Local;
use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};
use serde::Serialize;
use tracing::info;

use crate::builder::GeneratedWorld;
use crate::error::Result;
use crate::heightmap::{HeightField, MAX_ELEVATION};
use crate::hydrography::HydrographyReport;
use crate::projection::ProjectionKind;
use crate::resources::ResourceDeposit;
use crate::terrain::TerrainId;
use crate::world::SurfaceMap;

/// Off-map cells render black.
const BACKGROUND: [u8; 3] = [0, 0, 0];

/// Colour every cell with its terrain tinted by elevation.
pub fn render(map: &SurfaceMap, heights: &HeightField) -> RgbImage {
    let registry = map.registry();
    let mut img: RgbImage = ImageBuffer::new(map.width() as u32, map.height() as u32);
    for y in 0..map.height() {
        for x in 0..map.width() {
            let terrain = map.terrain_at(x, y);
            let color = if terrain == TerrainId::OUT_OF_BOUNDS {
                BACKGROUND
            } else {
                registry.color_for(terrain, heights.get(x, y))
            };
            img.put_pixel(x as u32, y as u32, Rgb(color));
        }
    }
    img
}

pub fn save_png(map: &SurfaceMap, heights: &HeightField, path: &Path) -> Result<()> {
    render(map, heights).save(path)?;
    info!(path = %path.display(), "map image written");
    Ok(())
}

/// Grayscale elevation, 0 black and 99 white.
pub fn save_elevation_png(heights: &HeightField, path: &Path) -> Result<()> {
    let mut img: GrayImage = ImageBuffer::new(heights.width() as u32, heights.height() as u32);
    for y in 0..heights.height() {
        for x in 0..heights.width() {
            let value = heights.get(x, y) as u32 * 255 / MAX_ELEVATION as u32;
            img.put_pixel(x as u32, y as u32, Luma([value as u8]));
        }
    }
    img.save(path)?;
    Ok(())
}

/// Row-major `terrain * ROTATION_BASE + rotation` words.
pub fn packed_cells(map: &SurfaceMap) -> Vec<u64> {
    map.cells().as_slice().iter().map(|cell| cell.pack()).collect()
}

/// Row-major elevations, parallel to [`packed_cells`].
pub fn elevation_bytes(heights: &HeightField) -> Vec<u8> {
    heights.as_tilemap().as_slice().to_vec()
}

// =============================================================================
// SUMMARY
// =============================================================================

/// Human-readable digest of one generated world.
#[derive(Clone, Debug, Serialize)]
pub struct WorldSummary {
    pub generated_at: String,
    pub kind: String,
    pub description: String,
    pub seed: u64,
    pub width: usize,
    pub height: usize,
    pub projection: ProjectionKind,
    pub hydrographics: u8,
    pub axial_tilt: u32,
    pub temperature: String,
    pub life: String,
    pub water_percent: f64,
    /// Cell count per terrain name
    pub terrain: BTreeMap<String, usize>,
    pub resources: Vec<ResourceDeposit>,
    pub hydrography: Vec<HydrographyReport>,
    pub craters: usize,
    pub warnings: Vec<String>,
}

impl WorldSummary {
    pub fn from_world(world: &GeneratedWorld) -> Self {
        let registry = world.map.registry();
        let terrain = world
            .map
            .terrain_counts()
            .into_iter()
            .filter(|(id, _)| *id != TerrainId::OUT_OF_BOUNDS)
            .map(|(id, count)| (registry.name(id), count))
            .collect();
        Self {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            kind: world.params.kind.to_string(),
            description: world.params.kind.description().to_string(),
            seed: world.report.seed,
            width: world.map.width(),
            height: world.map.height(),
            projection: world.map.projection_kind(),
            hydrographics: world.params.hydrographics,
            axial_tilt: world.params.axial_tilt,
            temperature: world.params.temperature.to_string(),
            life: world.params.life.to_string(),
            water_percent: world.map.water_percentage(),
            terrain,
            resources: world.report.resources.clone(),
            hydrography: world.report.hydrography.clone(),
            craters: world.report.craters,
            warnings: world.report.warnings.iter().map(ToString::to_string).collect(),
        }
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let file = File::create(path)?;
        let writer = BufWriter::new(file);
        serde_json::to_writer_pretty(writer, self)?;
        info!(path = %path.display(), "summary written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::builder::{generate_world, GenerationOptions};
    use crate::cancel::CancelToken;
    use crate::planet::WorldParams;
    use crate::projection::GridProjection;
    use crate::terrain::{names, TerrainRegistry, TileCell};

    #[test]
    fn test_render_blacks_out_off_map_cells() {
        let registry = Arc::new(TerrainRegistry::with_standard_catalogue());
        let land = registry.lookup(names::LAND).unwrap();
        let map = SurfaceMap::new(GridProjection::sinusoidal(32, 16).unwrap(), registry.clone(), land);
        let heights = HeightField::flat(32, 16, 40);
        let img = render(&map, &heights);
        assert_eq!(img.dimensions(), (32, 16));
        assert_eq!(img.get_pixel(0, 0).0, BACKGROUND);
        let x = map.projection().west_bound(8) as u32;
        assert_eq!(img.get_pixel(x, 8).0, registry.color_for(land, 40));
    }

    #[test]
    fn test_packed_arrays_line_up() {
        let registry = Arc::new(TerrainRegistry::with_standard_catalogue());
        let water = registry.lookup(names::WATER).unwrap();
        let mut map = SurfaceMap::new(GridProjection::rectangular(4, 2).unwrap(), registry, water);
        map.set_cell(1, 1, TileCell::rotated(water, 2));
        let packed = packed_cells(&map);
        assert_eq!(packed.len(), 8);
        assert_eq!(TileCell::unpack(packed[5]).unwrap(), TileCell::rotated(water, 2));
        assert_eq!(elevation_bytes(&HeightField::flat(4, 2, 7)), vec![7; 8]);
    }

    #[test]
    fn test_summary_counts_terrain_by_name() {
        let params = WorldParams {
            seed: Some(12),
            ..WorldParams::default()
        };
        let options = GenerationOptions {
            width: 64,
            height: 32,
            ..GenerationOptions::default()
        };
        let registry = Arc::new(TerrainRegistry::with_standard_catalogue());
        let world = generate_world(&params, &options, registry, &CancelToken::new()).unwrap();
        let summary = WorldSummary::from_world(&world);
        assert_eq!(summary.seed, 12);
        assert_eq!(summary.terrain.values().sum::<usize>(), world.map.valid_cells());
        assert!(!summary.terrain.contains_key("OutOfBounds"));
        let json = serde_json::to_string(&summary).unwrap();
        assert!(json.contains("\"kind\":\"Gaian\""));
        assert_eq!(json.matches("\"resources\"").count(), 1);
        assert_eq!(json.matches("\"warnings\"").count(), 1);
        assert_eq!(summary.hydrography.len(), world.report.hydrography.len());
    }
}
