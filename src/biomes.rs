//! Biome classification and the polar ice pass.
//!
//! Land cells are labelled from a fertility score built out of latitude,
//! elevation, temperature and local wetness. Randomness comes from a Perlin
//! field and from one generator per row, so classifying the same grid twice
//! gives the same answer.

use noise::{NoiseFn, Perlin, Seedable};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::climate::{column_land_percent, wetness, IceLines, IceOverride, LifeLevel, Temperature};
use crate::dice::{d3, d6};
use crate::error::{invalid, Result, Warning};
use crate::heightmap::HeightField;
use crate::seeds::{derive_indexed, derive_seed, stage_rng};
use crate::terrain::{names, TerrainId, TerrainRegistry};
use crate::world::SurfaceMap;

/// Fertility thresholds: below the first is desert, then scrub, grass, woods.
const FERTILITY_BANDS: [i32; 4] = [20, 35, 50, 65];

/// Horizontal frequency of the fertility jitter field.
const JITTER_SCALE: f64 = 0.15;

// =============================================================================
// PALETTE
// =============================================================================

/// A land biome the classifier can assign.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Biome {
    Desert,
    Scrub,
    Grass,
    Woods,
    Jungle,
    Mountain,
}

impl Biome {
    /// Band lookup for an open-world fertility score.
    pub fn from_fertility(fertility: i32) -> Self {
        if fertility < FERTILITY_BANDS[0] {
            Biome::Desert
        } else if fertility < FERTILITY_BANDS[1] {
            Biome::Scrub
        } else if fertility < FERTILITY_BANDS[2] {
            Biome::Grass
        } else if fertility < FERTILITY_BANDS[3] {
            Biome::Woods
        } else {
            Biome::Jungle
        }
    }
}

/// Terrain names for each biome slot. Loaded from config, so plain strings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PaletteNames {
    pub desert: String,
    pub scrub: String,
    pub grass: String,
    pub woods: String,
    pub jungle: String,
    pub mountain: String,
    pub ice: String,
    pub snow: String,
    pub seabed: String,
}

impl Default for PaletteNames {
    fn default() -> Self {
        Self {
            desert: names::DESERT.into(),
            scrub: names::SCRUB.into(),
            grass: names::GRASS.into(),
            woods: names::WOODS.into(),
            jungle: names::JUNGLE.into(),
            mountain: names::MOUNTAIN.into(),
            ice: names::ICE.into(),
            snow: names::SNOW.into(),
            seabed: names::SEABED.into(),
        }
    }
}

impl PaletteNames {
    /// Desert world whose life hangs on in dried-up sea beds.
    pub fn arean() -> Self {
        Self {
            desert: "AreanDesert".into(),
            seabed: "AreanSeabed".into(),
            ..Self::default()
        }
    }

    /// Look every name up. Unknown names leave their slot empty and come back
    /// as warnings; the classifier skips empty slots.
    pub fn resolve(&self, registry: &TerrainRegistry) -> (BiomePalette, Vec<Warning>) {
        let mut warnings = Vec::new();
        let mut find = |name: &str| match registry.lookup(name) {
            Ok(id) => Some(id),
            Err(e) => {
                warn!(name, "biome palette refers to an unknown terrain");
                warnings.extend(Warning::from_error(&e));
                None
            }
        };
        let palette = BiomePalette {
            desert: find(&self.desert),
            scrub: find(&self.scrub),
            grass: find(&self.grass),
            woods: find(&self.woods),
            jungle: find(&self.jungle),
            mountain: find(&self.mountain),
            ice: find(&self.ice),
            snow: find(&self.snow),
            seabed: find(&self.seabed),
        };
        (palette, warnings)
    }
}

/// Resolved palette. `None` marks a name the registry did not know.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BiomePalette {
    pub desert: Option<TerrainId>,
    pub scrub: Option<TerrainId>,
    pub grass: Option<TerrainId>,
    pub woods: Option<TerrainId>,
    pub jungle: Option<TerrainId>,
    pub mountain: Option<TerrainId>,
    pub ice: Option<TerrainId>,
    pub snow: Option<TerrainId>,
    pub seabed: Option<TerrainId>,
}

impl BiomePalette {
    pub fn get(&self, biome: Biome) -> Option<TerrainId> {
        match biome {
            Biome::Desert => self.desert,
            Biome::Scrub => self.scrub,
            Biome::Grass => self.grass,
            Biome::Woods => self.woods,
            Biome::Jungle => self.jungle,
            Biome::Mountain => self.mountain,
        }
    }

    /// Terrains that count as "former sea bed" for seabed ecology.
    fn is_seabed_family(&self, terrain: TerrainId) -> bool {
        [self.seabed, self.scrub, self.grass, self.woods].contains(&Some(terrain))
    }
}

// =============================================================================
// PARAMETERS
// =============================================================================

/// Shape of the fertility formula for one kind of world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FertilityCurve {
    /// Flat bonus or penalty on every cell
    pub bias: i32,
    /// Latitude is divided by this before being subtracted
    pub latitude_divisor: i32,
    /// Dry belt around 25 degrees
    pub tropical_deserts: bool,
    /// Extra penalty poleward of 70 degrees
    pub polar_penalty: bool,
    /// Land above this elevation (plus twice the temperature bucket) is mountain
    pub mountain_line: i32,
    /// Amplitude of the Perlin jitter added to each cell's score
    pub jitter: f64,
}

impl Default for FertilityCurve {
    fn default() -> Self {
        Self {
            bias: 0,
            latitude_divisor: 5,
            tropical_deserts: true,
            polar_penalty: true,
            mountain_line: 75,
            jitter: 6.0,
        }
    }
}

impl FertilityCurve {
    pub fn arean() -> Self {
        Self {
            latitude_divisor: 15,
            tropical_deserts: false,
            polar_penalty: false,
            jitter: 0.0,
            ..Self::default()
        }
    }
}

/// Where land life is allowed to grow.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EcologyMode {
    /// Every land cell is classified.
    #[default]
    Open,
    /// Only dried sea bed is classified; other land keeps its terrain.
    FormerSeabed,
}

/// Inputs to the classifier.
#[derive(Clone, Debug)]
pub struct BiomeParams {
    pub temperature: Temperature,
    pub life: LifeLevel,
    /// Target water percentage of the world
    pub hydrographics: u8,
    pub curve: FertilityCurve,
    pub mode: EcologyMode,
    pub ice_override: IceOverride,
    pub seed: u64,
}

impl Default for BiomeParams {
    fn default() -> Self {
        Self {
            temperature: Temperature::Standard,
            life: LifeLevel::Extensive,
            hydrographics: 60,
            curve: FertilityCurve::default(),
            mode: EcologyMode::Open,
            ice_override: IceOverride::None,
            seed: 0,
        }
    }
}

/// Cell counts from one classification run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BiomeReport {
    /// Land cells given a biome
    pub assigned: usize,
    /// Land cells left alone because their palette slot was empty
    pub skipped: usize,
    pub ice: usize,
    pub snow: usize,
}

// =============================================================================
// FERTILITY
// =============================================================================

/// What the fertility formula needs to know about one cell.
#[derive(Clone, Copy, Debug)]
pub struct CellClimate {
    pub latitude: u32,
    pub elevation: u8,
    pub wetness: u32,
    /// Percentage of the cell's column that is land
    pub column_land: u32,
}

/// Open-world fertility, life cap applied.
pub fn fertility(
    curve: &FertilityCurve,
    temperature: Temperature,
    life: LifeLevel,
    hydrographics: u8,
    cell: CellClimate,
) -> i32 {
    let temp = temperature.bucket();
    let lat = cell.latitude as i32;
    let mut score = curve.bias + hydrographics as i32 + cell.wetness as i32 / 2 - cell.elevation as i32 / 5
        + cell.column_land as i32 / 5
        - lat / curve.latitude_divisor.max(1)
        + temp * 5;

    if curve.tropical_deserts {
        let tropical = 20 - (lat - 25).abs() - temp * 5;
        if tropical > 0 {
            score -= tropical * 3;
        }
    }
    if curve.polar_penalty && lat > 70 {
        score -= lat - 70;
    }
    life.cap_fertility(score)
}

/// Fertility of a dried sea bed cell, before the d6 roll.
pub fn seabed_fertility(
    curve: &FertilityCurve,
    temperature: Temperature,
    life: LifeLevel,
    adjacent_water: usize,
    latitude: u32,
) -> i32 {
    life.seabed_base() + curve.bias + temperature.bucket() * 2 + adjacent_water as i32
        - latitude as i32 / curve.latitude_divisor.max(1)
}

fn seabed_biome(roll: i32) -> Option<Biome> {
    match roll {
        1..=3 => Some(Biome::Scrub),
        4..=6 => Some(Biome::Grass),
        7..=12 => Some(Biome::Woods),
        _ => None,
    }
}

// =============================================================================
// CLASSIFICATION
// =============================================================================

/// Assign a biome to every land cell. Water is left untouched.
pub fn classify(
    map: &mut SurfaceMap,
    heights: &HeightField,
    params: &BiomeParams,
    palette: &BiomePalette,
) -> Result<BiomeReport> {
    if params.curve.latitude_divisor <= 0 {
        return Err(invalid(format!(
            "latitude divisor must be positive, got {}",
            params.curve.latitude_divisor
        )));
    }
    if params.hydrographics > 100 {
        return Err(invalid(format!("hydrographics must be 0-100, got {}", params.hydrographics)));
    }

    let projection = map.projection().clone();
    let noise = Perlin::new(1).set_seed(params.seed as u32);
    let column_land: Vec<u32> = (0..projection.width()).map(|x| column_land_percent(map, x)).collect();
    let temp = params.temperature.bucket();

    let mut report = BiomeReport::default();
    let mut updates = Vec::new();
    for y in 0..projection.height() {
        let mut rng = stage_rng(derive_indexed(params.seed, y as u64));
        let latitude = projection.latitude(y);
        let (west, east) = projection.span(y);
        for x in west..east {
            // One draw per valid cell whether or not it is used.
            let roll = d6(&mut rng) as i32;
            if !map.is_land(x, y) {
                continue;
            }

            let choice = match params.mode {
                EcologyMode::Open => {
                    let elevation = heights.get(x, y);
                    if elevation as i32 > params.curve.mountain_line + temp * 2 {
                        Some(Biome::Mountain)
                    } else {
                        let cell = CellClimate {
                            latitude,
                            elevation,
                            wetness: wetness(map, x, y),
                            column_land: column_land[x],
                        };
                        let base = fertility(&params.curve, params.temperature, params.life, params.hydrographics, cell);
                        let wobble = noise.get([x as f64 * JITTER_SCALE, y as f64 * JITTER_SCALE]) * params.curve.jitter;
                        Some(Biome::from_fertility(base + wobble.round() as i32))
                    }
                }
                EcologyMode::FormerSeabed => {
                    if !palette.is_seabed_family(map.terrain_at(x, y)) {
                        continue;
                    }
                    let wet = projection
                        .neighbors(x, y)
                        .into_iter()
                        .filter(|&(nx, ny)| map.is_water(nx, ny))
                        .count();
                    let score = seabed_fertility(&params.curve, params.temperature, params.life, wet, latitude);
                    match seabed_biome(roll + score) {
                        Some(biome) => Some(biome),
                        None => {
                            // Too harsh: stays bare sea bed.
                            match palette.seabed {
                                Some(seabed) => updates.push((x, y, seabed)),
                                None => report.skipped += 1,
                            }
                            continue;
                        }
                    }
                }
            };

            match choice.and_then(|biome| palette.get(biome)) {
                Some(terrain) => {
                    updates.push((x, y, terrain));
                    report.assigned += 1;
                }
                None => report.skipped += 1,
            }
        }
    }

    for (x, y, terrain) in updates {
        map.set_terrain(x, y, terrain);
    }
    debug!(
        assigned = report.assigned,
        skipped = report.skipped,
        mode = ?params.mode,
        "biomes classified"
    );
    Ok(report)
}

/// Freeze high-latitude water and scatter snow over high-latitude land.
///
/// Caps reach further over continents: every column adds the square root of
/// its land percentage. Water turns to ice when `latitude + d6 + column`
/// passes the ice line. Land turns to snow when the same sum plus the square
/// root of its elevation passes the snow line and a d3 comes up 1.
pub fn apply_ice(
    map: &mut SurfaceMap,
    heights: &HeightField,
    params: &BiomeParams,
    palette: &BiomePalette,
) -> BiomeReport {
    let lines = IceLines::for_temperature(params.temperature).with_override(params.ice_override);
    let projection = map.projection().clone();
    let ice_seed = derive_seed(params.seed, "ice");
    let columns: Vec<f64> = (0..projection.width())
        .map(|x| (column_land_percent(map, x) as f64).sqrt())
        .collect();

    let mut report = BiomeReport::default();
    for y in 0..projection.height() {
        let mut rng = stage_rng(derive_indexed(ice_seed, y as u64));
        let latitude = projection.latitude(y);
        let (west, east) = projection.span(y);
        for x in west..east {
            let (ice_roll, snow_roll, snow_chance) = draw_ice(&mut rng);
            if map.is_water(x, y) {
                if (latitude + ice_roll) as f64 + columns[x] > lines.ice as f64 {
                    if let Some(ice) = palette.ice {
                        map.set_terrain(x, y, ice);
                        report.ice += 1;
                    }
                }
            } else if (latitude + snow_roll) as f64 + columns[x] + (heights.get(x, y) as f64).sqrt()
                > lines.snow as f64
                && snow_chance == 1
            {
                if let Some(snow) = palette.snow {
                    map.set_terrain(x, y, snow);
                    report.snow += 1;
                }
            }
        }
    }
    debug!(ice = report.ice, snow = report.snow, ice_line = lines.ice, snow_line = lines.snow, "ice pass");
    report
}

fn draw_ice<R: Rng + ?Sized>(rng: &mut R) -> (u32, u32, u32) {
    (d6(rng), d6(rng), d3(rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::projection::GridProjection;

    fn world(seed: u64) -> (SurfaceMap, HeightField, BiomePalette) {
        let registry = Arc::new(TerrainRegistry::with_standard_catalogue());
        let land = registry.lookup(names::LAND).unwrap();
        let water = registry.lookup(names::WATER).unwrap();
        let projection = GridProjection::sinusoidal(64, 32).unwrap();
        let heights = HeightField::generate(64, 32, seed).unwrap();
        let mut map = SurfaceMap::new(projection.clone(), registry.clone(), land);
        let level = heights.level_for_fraction(&projection, 50);
        for (x, y) in projection.cells() {
            if heights.get(x, y) < level {
                map.set_terrain(x, y, water);
            }
        }
        let (palette, warnings) = PaletteNames::default().resolve(&registry);
        assert!(warnings.is_empty());
        (map, heights, palette)
    }

    #[test]
    fn test_fertility_bands() {
        assert_eq!(Biome::from_fertility(-40), Biome::Desert);
        assert_eq!(Biome::from_fertility(20), Biome::Scrub);
        assert_eq!(Biome::from_fertility(49), Biome::Grass);
        assert_eq!(Biome::from_fertility(50), Biome::Woods);
        assert_eq!(Biome::from_fertility(90), Biome::Jungle);
    }

    #[test]
    fn test_fertility_formula() {
        let curve = FertilityCurve::default();
        let cell = CellClimate {
            latitude: 50,
            elevation: 40,
            wetness: 20,
            column_land: 50,
        };
        // 60 + 10 - 8 + 10 - 10 + 0, tropical term is 20 - 25 < 0.
        assert_eq!(fertility(&curve, Temperature::Standard, LifeLevel::Extensive, 60, cell), 62);
        assert_eq!(fertility(&curve, Temperature::Standard, LifeLevel::SimpleLand, 60, cell), 31);
        assert_eq!(fertility(&curve, Temperature::Standard, LifeLevel::Organic, 60, cell), 0);

        // In the dry belt: tropical = 20 - 0 = 20, minus 60.
        let tropics = CellClimate { latitude: 25, ..cell };
        assert_eq!(fertility(&curve, Temperature::Standard, LifeLevel::Extensive, 60, tropics), 67 - 60);

        let polar = CellClimate { latitude: 80, ..cell };
        assert_eq!(fertility(&curve, Temperature::Standard, LifeLevel::Extensive, 60, polar), 56 - 10);
    }

    #[test]
    fn test_classify_is_idempotent() {
        let (mut a, heights, palette) = world(17);
        let mut b = a.clone();
        let params = BiomeParams {
            seed: 99,
            ..BiomeParams::default()
        };
        classify(&mut a, &heights, &params, &palette).unwrap();
        apply_ice(&mut a, &heights, &params, &palette);
        classify(&mut b, &heights, &params, &palette).unwrap();
        apply_ice(&mut b, &heights, &params, &palette);
        assert_eq!(a.cells(), b.cells());

        // Running again over the finished grid changes nothing.
        let before = a.cells().clone();
        classify(&mut a, &heights, &params, &palette).unwrap();
        apply_ice(&mut a, &heights, &params, &palette);
        assert_eq!(a.cells(), &before);
    }

    #[test]
    fn test_classify_leaves_water_alone() {
        let (mut map, heights, palette) = world(3);
        let water_before = map.water_cells();
        let report = classify(&mut map, &heights, &BiomeParams::default(), &palette).unwrap();
        assert_eq!(map.water_cells(), water_before);
        assert_eq!(report.assigned + report.skipped, map.valid_cells() - water_before);
    }

    #[test]
    fn test_lifeless_world_is_desert_or_mountain() {
        let (mut map, heights, palette) = world(5);
        let params = BiomeParams {
            life: LifeLevel::None,
            ..BiomeParams::default()
        };
        classify(&mut map, &heights, &params, &palette).unwrap();
        let allowed = [palette.desert, palette.mountain];
        for (x, y) in map.projection().clone().cells() {
            if map.is_land(x, y) {
                assert!(allowed.contains(&Some(map.terrain_at(x, y))));
            }
        }
    }

    #[test]
    fn test_frozen_override_ices_every_sea() {
        let (mut map, heights, palette) = world(8);
        let water = map.water_cells();
        let params = BiomeParams {
            ice_override: IceOverride::Frozen,
            ..BiomeParams::default()
        };
        let report = apply_ice(&mut map, &heights, &params, &palette);
        assert_eq!(report.ice, water);
        let ice = palette.ice.unwrap();
        assert_eq!(map.terrain_counts().get(&ice).copied(), Some(water));
    }

    fn open_sea() -> (SurfaceMap, BiomePalette) {
        let registry = Arc::new(TerrainRegistry::with_standard_catalogue());
        let water = registry.lookup(names::WATER).unwrap();
        let map = SurfaceMap::new(GridProjection::rectangular(64, 32).unwrap(), registry.clone(), water);
        let (palette, _) = PaletteNames::default().resolve(&registry);
        (map, palette)
    }

    #[test]
    fn test_ice_cap_reaches_further_over_continents() {
        let heights = HeightField::flat(64, 32, 0);
        let (mut sea_total, mut continent_total) = (0, 0);
        for seed in 0..10 {
            let params = BiomeParams {
                seed,
                ..BiomeParams::default()
            };
            let (mut sea, palette) = open_sea();
            let (mut continent, _) = open_sea();
            let land = continent.registry().lookup(names::LAND).unwrap();
            for y in 8..24 {
                continent.set_terrain(10, y, land);
            }
            apply_ice(&mut sea, &heights, &params, &palette);
            apply_ice(&mut continent, &heights, &params, &palette);

            let ice = palette.ice.unwrap();
            for y in 0..32 {
                if sea.terrain_at(10, y) == ice {
                    assert_eq!(continent.terrain_at(10, y), ice);
                }
            }
            sea_total += (0..32).filter(|&y| sea.terrain_at(10, y) == ice).count();
            continent_total += (0..32).filter(|&y| continent.terrain_at(10, y) == ice).count();
        }
        assert!(continent_total > sea_total);
    }

    #[test]
    fn test_snow_follows_elevation() {
        let registry = Arc::new(TerrainRegistry::with_standard_catalogue());
        let land = registry.lookup(names::LAND).unwrap();
        let (palette, _) = PaletteNames::default().resolve(&registry);
        let snow = palette.snow.unwrap();
        let (mut low_total, mut high_total) = (0, 0);
        for seed in 0..10 {
            let params = BiomeParams {
                seed,
                ..BiomeParams::default()
            };
            let projection = GridProjection::rectangular(64, 32).unwrap();
            let mut low = SurfaceMap::new(projection.clone(), registry.clone(), land);
            let mut high = SurfaceMap::new(projection, registry.clone(), land);
            low_total += apply_ice(&mut low, &HeightField::flat(64, 32, 0), &params, &palette).snow;
            high_total += apply_ice(&mut high, &HeightField::flat(64, 32, 81), &params, &palette).snow;
            for (x, y) in low.projection().clone().cells() {
                if low.terrain_at(x, y) == snow {
                    assert_eq!(high.terrain_at(x, y), snow);
                }
            }
        }
        assert!(high_total > low_total);
    }

    #[test]
    fn test_hot_world_has_no_ice() {
        let (mut map, heights, palette) = world(8);
        let params = BiomeParams {
            temperature: Temperature::VeryHot,
            ..BiomeParams::default()
        };
        let report = apply_ice(&mut map, &heights, &params, &palette);
        assert_eq!(report, BiomeReport::default());
    }

    #[test]
    fn test_missing_palette_entry_is_skipped() {
        let (mut map, heights, _) = world(2);
        let names = PaletteNames {
            jungle: "Rainforest".into(),
            ..PaletteNames::default()
        };
        let (palette, warnings) = names.resolve(map.registry());
        assert_eq!(warnings, vec![Warning::RegistryMiss("Rainforest".into())]);
        assert!(palette.jungle.is_none());
        let params = BiomeParams {
            temperature: Temperature::Hot,
            ..BiomeParams::default()
        };
        classify(&mut map, &heights, &params, &palette).unwrap();
        assert_eq!(map.unset_cells(), 0);
    }

    #[test]
    fn test_seabed_ecology_only_touches_seabed() {
        let registry = Arc::new(TerrainRegistry::with_standard_catalogue());
        let desert = registry.lookup("AreanDesert").unwrap();
        let seabed = registry.lookup("AreanSeabed").unwrap();
        let water = registry.lookup("AreanWater").unwrap();
        let projection = GridProjection::rectangular(32, 16).unwrap();
        let mut map = SurfaceMap::new(projection, registry.clone(), desert);
        for y in 6..10 {
            for x in 0..16 {
                map.set_terrain(x, y, seabed);
            }
            map.set_terrain(8, y, water);
        }
        let heights = HeightField::flat(32, 16, 30);
        let (palette, _) = PaletteNames::arean().resolve(&registry);
        let params = BiomeParams {
            life: LifeLevel::Extensive,
            temperature: Temperature::Warm,
            curve: FertilityCurve::arean(),
            mode: EcologyMode::FormerSeabed,
            ..BiomeParams::default()
        };
        let report = classify(&mut map, &heights, &params, &palette).unwrap();
        assert!(report.assigned > 0);
        for y in 0..16 {
            for x in 16..32 {
                assert_eq!(map.terrain_at(x, y), desert);
            }
        }
        assert!(map.is_water(8, 7));
    }

    #[test]
    fn test_rejects_bad_divisor() {
        let (mut map, heights, palette) = world(1);
        let params = BiomeParams {
            curve: FertilityCurve {
                latitude_divisor: 0,
                ..FertilityCurve::default()
            },
            ..BiomeParams::default()
        };
        assert!(classify(&mut map, &heights, &params, &palette).is_err());
    }
}
