//! World generation pipeline.
//!
//! One pipeline serves every kind of world. What differs between kinds is
//! data: [`BuilderConfig::for_world`] turns a [`WorldParams`] into the
//! overlay, crater, band, water and biome plans, and [`generate_world`] runs
//! the stages in order:
//!
//! validate -> heights -> overlay -> bands -> craters -> hydrography ->
//! upscale -> biomes and ice -> stretch -> resources
//!
//! Each stage draws from its own seed so runs are reproducible.

use std::sync::Arc;

use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::bands::{paint_bands, BandProfile};
use crate::biomes::{apply_ice, classify, BiomeParams, EcologyMode, FertilityCurve, PaletteNames};
use crate::cancel::CancelToken;
use crate::climate::IceOverride;
use crate::coastline::{smooth_coastline, CoastlineParams};
use crate::craters::{add_crater, scatter_craters, CraterProfile};
use crate::dice::roll_zero;
use crate::error::{invalid, Result, Warning};
use crate::heightmap::HeightField;
use crate::hydrography::{grow_to_target, rebalance, seed_basins, shrink_to_target, HydrographyParams, HydrographyReport};
use crate::planet::{AreanKind, AsteroidKind, BarrenKind, IceKind, PlanetFeature, WorldKind, WorldParams};
use crate::projection::GridProjection;
use crate::regions::{RangeProfile, RegionMap, RegionPalette, RegionType};
use crate::resources::{assign_resources, CommodityCatalogue, ResourceDeposit};
use crate::scale::{stretch, upscale};
use crate::seeds::{stage_rng, WorldSeeds};
use crate::terrain::{names, Terrain, TerrainId, TerrainRegistry};
use crate::world::SurfaceMap;

// =============================================================================
// OPTIONS
// =============================================================================

/// Grid shape and post-processing switches.
#[derive(Clone, Debug, PartialEq, Serialize, serde::Deserialize)]
#[serde(default)]
pub struct GenerationOptions {
    /// Grid width before upscaling; must be even
    pub width: usize,
    pub height: usize,
    /// Surface cells per side of one overlay tile
    pub tile_size: usize,
    /// Upscale factor, a power of two
    pub detail: usize,
    /// Re-project onto the full rectangle at the end
    pub stretch: bool,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            width: 256,
            height: 128,
            tile_size: 16,
            detail: 1,
            stretch: false,
        }
    }
}

impl GenerationOptions {
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(invalid(format!("grid must be non-empty, got {}x{}", self.width, self.height)));
        }
        if self.width % 2 != 0 {
            return Err(invalid(format!("grid width must be even, got {}", self.width)));
        }
        if self.tile_size == 0 {
            return Err(invalid("overlay tile size must be positive"));
        }
        if self.detail == 0 || !self.detail.is_power_of_two() {
            return Err(invalid(format!("detail must be a power of two, got {}", self.detail)));
        }
        Ok(())
    }
}

// =============================================================================
// PER-KIND CONFIGURATION
// =============================================================================

/// A crater profile with terrain names still unresolved.
#[derive(Clone, Debug, PartialEq)]
pub struct CraterSpec {
    pub count: usize,
    pub avg_radius: u32,
    pub depth_factor: f64,
    pub rim: Option<String>,
    pub ejecta: Option<String>,
}

impl CraterSpec {
    fn new(count: usize, avg_radius: u32, depth_factor: f64, rim: Option<&str>, ejecta: Option<&str>) -> Self {
        Self {
            count,
            avg_radius,
            depth_factor,
            rim: rim.map(Into::into),
            ejecta: ejecta.map(Into::into),
        }
    }
}

/// What the coarse overlay does.
#[derive(Clone, Debug, PartialEq)]
pub enum OverlayPlan {
    None,
    /// Grow continental plates, raise mountain ranges and bias the heights.
    Continents {
        plates: u8,
        bias: i32,
        ranges: RangeProfile,
    },
    /// Scatter dark patches over an otherwise uniform surface.
    Patches {
        terrain: String,
        chance: u32,
        spread_passes: usize,
        bias: i32,
    },
}

/// Paint the lowest `percent` of the surface with `terrain`.
#[derive(Clone, Debug, PartialEq)]
pub struct LowlandFill {
    pub terrain: String,
    pub percent: u8,
}

/// Seas and how they are shaped.
#[derive(Clone, Debug)]
pub struct WaterPlan {
    pub water: String,
    /// Terrain water turns into when the coast is smoothed or rebalanced
    pub land: String,
    /// Final water coverage, percent
    pub target: u8,
    /// Flood this far first, then dry back to `target` leaving `seabed`
    pub overflood: Option<u8>,
    pub seabed: Option<String>,
    pub smooth: bool,
    pub params: HydrographyParams,
    pub coastline: CoastlineParams,
}

/// Biome classification settings.
#[derive(Clone, Debug)]
pub struct BiomePlan {
    pub curve: FertilityCurve,
    pub mode: EcologyMode,
    pub ice_override: IceOverride,
    pub palette: PaletteNames,
}

/// Everything that makes one kind of world differ from another.
#[derive(Clone, Debug)]
pub struct BuilderConfig {
    /// Initial fill; `None` leaves cells unset for a later stage to cover
    pub base_terrain: Option<String>,
    pub overlay: OverlayPlan,
    pub lowland: Option<LowlandFill>,
    pub bands: Option<BandProfile>,
    pub craters: Vec<CraterSpec>,
    /// One extra crater a quarter of the map high
    pub giant_crater: bool,
    pub water: Option<WaterPlan>,
    pub biomes: Option<BiomePlan>,
}

impl BuilderConfig {
    fn barren(base: &str) -> Self {
        Self {
            base_terrain: Some(base.into()),
            overlay: OverlayPlan::None,
            lowland: None,
            bands: None,
            craters: Vec::new(),
            giant_crater: false,
            water: None,
            biomes: None,
        }
    }

    fn patches(mut self, terrain: &str, chance: u32, spread_passes: usize) -> Self {
        self.overlay = OverlayPlan::Patches {
            terrain: terrain.into(),
            chance,
            spread_passes,
            bias: 6,
        };
        self
    }

    fn crater(mut self, spec: CraterSpec) -> Self {
        self.craters.push(spec);
        self
    }

    fn lowland(mut self, terrain: &str, percent: u8) -> Self {
        self.lowland = Some(LowlandFill {
            terrain: terrain.into(),
            percent,
        });
        self
    }

    pub fn for_world(params: &WorldParams) -> Self {
        let mut config = match params.kind {
            WorldKind::Gaian => Self {
                overlay: OverlayPlan::Continents {
                    plates: 9,
                    bias: 15,
                    ranges: RangeProfile {
                        equatorial_ridge: params.has_feature(PlanetFeature::EquatorialRidge),
                        polar_ridge: params.has_feature(PlanetFeature::PolarRidge),
                        smooth: params.has_feature(PlanetFeature::Smooth),
                        ..RangeProfile::default()
                    },
                },
                water: Some(WaterPlan {
                    water: names::WATER.into(),
                    land: names::LAND.into(),
                    target: params.hydrographics,
                    overflood: None,
                    seabed: None,
                    smooth: true,
                    params: HydrographyParams::default(),
                    coastline: CoastlineParams::default(),
                }),
                biomes: Some(BiomePlan {
                    curve: FertilityCurve::default(),
                    mode: EcologyMode::Open,
                    ice_override: IceOverride::None,
                    palette: PaletteNames::default(),
                }),
                ..Self::barren(names::LAND)
            },
            WorldKind::Barren(BarrenKind::Selenian) => Self::barren("Selenian")
                .patches("SelenianFlats", 12, 2)
                .crater(CraterSpec::new(150, 25, 0.5, Some("SelenianImpact"), Some("SelenianEjecta"))),
            WorldKind::Barren(BarrenKind::Hermian) => Self::barren("Hermian")
                .patches("HermianLava", 15, 2)
                .crater(CraterSpec::new(150, 25, 0.5, Some("HermianImpact"), Some("HermianEjecta"))),
            WorldKind::Barren(BarrenKind::Hadean) => Self::barren("Hadean")
                .patches("HadeanHighlands", 10, 3)
                .crater(CraterSpec::new(200, 20, 0.6, Some("HadeanImpact"), Some("HadeanEjecta"))),
            WorldKind::Barren(BarrenKind::Ferrinian) => Self::barren("Ferrinian")
                .patches("FerrinianFlats", 12, 2)
                .crater(CraterSpec::new(120, 20, 0.6, Some("FerrinianImpact"), Some("FerrinianEjecta"))),
            WorldKind::Ice(IceKind::Europan) => Self::barren("CleanIce")
                .lowland("DirtyIce", 50)
                .crater(CraterSpec::new(7, 10, 0.8, None, Some("IceEjecta"))),
            WorldKind::Ice(IceKind::LithicGelidian) => Self::barren("LithicGelidian").crater(CraterSpec::new(
                100,
                10,
                0.8,
                Some("LithicGelidianImpact"),
                Some("IceEjecta"),
            )),
            WorldKind::Ice(IceKind::Iapetean) => Self::barren("FlatIce")
                .patches("DarkIce", 20, 3)
                .crater(CraterSpec::new(40, 15, 0.7, None, Some("IceEjecta"))),
            WorldKind::Ice(IceKind::Tritonic) => Self::barren("TritonicIce")
                .patches("DarkIce", 30, 1)
                .lowland("FlatIce", 30)
                .crater(CraterSpec::new(10, 8, 0.8, None, Some("IceEjecta"))),
            WorldKind::Jovian(kind) => Self {
                base_terrain: None,
                bands: Some(BandProfile::for_kind(kind)),
                ..Self::barren(names::LAND)
            },
            WorldKind::Belt(AsteroidKind::Cerean) => Self::barren("Cerean")
                .crater(CraterSpec::new(120, 15, 0.6, Some("CereanImpact"), Some("CereanEjecta"))),
            WorldKind::Belt(AsteroidKind::Vestian) => Self::barren("Vestian")
                .patches("VestianFlats", 10, 2)
                .crater(CraterSpec::new(100, 20, 0.5, Some("VestianImpact"), None)),
            WorldKind::Belt(AsteroidKind::Kuiperian) => {
                Self::barren("KuiperianIces").crater(CraterSpec::new(80, 12, 0.7, None, Some("KuiperianEjecta")))
            }
            WorldKind::Belt(AsteroidKind::Hephaestian) => {
                Self::barren("Hephaestian").crater(CraterSpec::new(60, 10, 0.6, Some("HephaestianCrater"), None))
            }
            WorldKind::Arean(kind) => {
                let hydro = params.hydrographics;
                let overflood = if hydro >= 100 { 100 } else { ((hydro as u32 * 2 + 100) / 3) as u8 };
                let target = if kind == AreanKind::Arean { hydro / 2 } else { hydro };
                let ice_override = match kind {
                    AreanKind::AreanLacustric => IceOverride::Frozen,
                    AreanKind::Arean => IceOverride::Arid,
                    AreanKind::EoArean => IceOverride::None,
                };
                Self {
                    water: Some(WaterPlan {
                        water: "AreanWater".into(),
                        land: "AreanDesert".into(),
                        target,
                        overflood: Some(overflood),
                        seabed: Some("AreanSeabed".into()),
                        smooth: false,
                        params: HydrographyParams::default(),
                        coastline: CoastlineParams::default(),
                    }),
                    biomes: Some(BiomePlan {
                        curve: FertilityCurve::arean(),
                        mode: EcologyMode::FormerSeabed,
                        ice_override,
                        palette: PaletteNames::arean(),
                    }),
                    ..Self::barren("AreanDesert")
                        .patches("AreanDark", 10, 2)
                        .crater(CraterSpec::new(60, 15, 0.7, Some("AreanImpact"), None))
                }
            }
        };

        if params.has_feature(PlanetFeature::HeavilyCratered) {
            for spec in &mut config.craters {
                spec.count *= 2;
            }
        }
        config.giant_crater = params.has_feature(PlanetFeature::GiantCrater) && config.bands.is_none();
        config
    }
}

// =============================================================================
// OUTPUT
// =============================================================================

/// What happened during a run, beyond the grid itself.
#[derive(Clone, Debug, Default, Serialize)]
pub struct GenerationReport {
    pub seed: u64,
    pub warnings: Vec<Warning>,
    pub hydrography: Vec<HydrographyReport>,
    pub craters: usize,
    pub resources: Vec<ResourceDeposit>,
}

/// A finished world.
#[derive(Clone, Debug)]
pub struct GeneratedWorld {
    pub params: WorldParams,
    pub map: SurfaceMap,
    pub heights: HeightField,
    pub report: GenerationReport,
}

impl GeneratedWorld {
    pub fn terrain_at(&self, x: usize, y: usize) -> TerrainId {
        self.map.terrain_at(x, y)
    }

    pub fn elevation_at(&self, x: usize, y: usize) -> u8 {
        self.heights.get(x, y)
    }

    pub fn is_water(&self, x: usize, y: usize) -> bool {
        self.map.is_water(x, y)
    }

    pub fn width(&self) -> usize {
        self.map.width()
    }

    pub fn height(&self) -> usize {
        self.map.height()
    }
}

// =============================================================================
// PIPELINE
// =============================================================================

/// Build a world with the configuration its kind calls for.
pub fn generate_world(
    params: &WorldParams,
    options: &GenerationOptions,
    registry: Arc<TerrainRegistry>,
    cancel: &CancelToken,
) -> Result<GeneratedWorld> {
    let config = BuilderConfig::for_world(params);
    generate_with_config(params, options, &config, registry, cancel)
}

/// Build a world with an explicit configuration.
pub fn generate_with_config(
    params: &WorldParams,
    options: &GenerationOptions,
    config: &BuilderConfig,
    registry: Arc<TerrainRegistry>,
    cancel: &CancelToken,
) -> Result<GeneratedWorld> {
    params.validate()?;
    options.validate()?;
    let master = params.seed.unwrap_or_else(|| rand::thread_rng().gen());
    let seeds = WorldSeeds::from_master(master);
    info!(kind = %params.kind, seed = master, width = options.width, height = options.height, "generating world");

    let mut report = GenerationReport {
        seed: master,
        ..GenerationReport::default()
    };

    // Heights
    let projection = GridProjection::sinusoidal(options.width, options.height)?;
    let mut heights = HeightField::generate(options.width, options.height, seeds.heightmap)?;
    heights.normalise(&projection);
    info!("height field ready");

    let base = match &config.base_terrain {
        Some(name) => require(&registry, name, false, &mut report.warnings)?,
        None => TerrainId::UNSET,
    };
    let mut map = SurfaceMap::new(projection, registry.clone(), base);

    // Overlay
    cancel.check()?;
    let mut rng = stage_rng(seeds.regions);
    match &config.overlay {
        OverlayPlan::None => {}
        OverlayPlan::Continents { plates, bias, ranges } => {
            let mut overlay = RegionMap::new(map.projection(), options.tile_size)?;
            let land = 100 - params.hydrographics.min(100);
            if land > 0 {
                let continents = overlay.grow_continents(land, *plates, &mut rng, cancel)?;
                report.warnings.extend(continents.warning());
                overlay.add_mountain_ranges(ranges, &mut rng);
            }
            overlay.apply_to_heights(&mut heights, map.projection(), *bias);
            info!(land_percent = overlay.percentage(RegionType::Land), "continents placed");
        }
        OverlayPlan::Patches {
            terrain,
            chance,
            spread_passes,
            bias,
        } => {
            let dark = resolve(&registry, terrain, &mut report.warnings);
            let mut overlay = RegionMap::new(map.projection(), options.tile_size)?;
            overlay.fill(RegionType::Land);
            let patches = overlay.scatter_patches(RegionType::Dark, *chance, *spread_passes, &mut rng);
            overlay.apply_to_heights(&mut heights, map.projection(), *bias);
            let palette = RegionPalette {
                dark,
                ..RegionPalette::default()
            };
            overlay.paint(&mut map, &heights, &palette);
            info!(patches, "surface patches placed");
        }
    }
    if let Some(lowland) = &config.lowland {
        if let Some(terrain) = resolve(&registry, &lowland.terrain, &mut report.warnings) {
            let level = heights.level_for_fraction(map.projection(), lowland.percent);
            let cells: Vec<(usize, usize)> = map.projection().cells().collect();
            for (x, y) in cells {
                if heights.get(x, y) < level {
                    map.set_terrain(x, y, terrain);
                }
            }
        }
    }

    // Bands
    if let Some(profile) = &config.bands {
        let mut rng = stage_rng(seeds.bands);
        let bands = paint_bands(&mut map, profile, &params.kind.to_string(), &mut rng)?;
        info!(bands = bands.len(), "cloud bands painted");
    }

    // Craters
    cancel.check()?;
    let mut rng = stage_rng(seeds.craters);
    for spec in &config.craters {
        let profile = CraterProfile {
            count: spec.count,
            avg_radius: spec.avg_radius,
            depth_factor: spec.depth_factor,
            rim_terrain: spec.rim.as_deref().and_then(|n| resolve(&registry, n, &mut report.warnings)),
            ejecta_terrain: spec.ejecta.as_deref().and_then(|n| resolve(&registry, n, &mut report.warnings)),
        };
        let craters = scatter_craters(&mut map, &mut heights, &profile, &mut rng, cancel)?;
        report.craters += craters.craters;
    }
    if config.giant_crater {
        let spec = config.craters.first();
        let rim = spec
            .and_then(|s| s.rim.as_deref())
            .and_then(|n| resolve(&registry, n, &mut report.warnings));
        let ejecta = spec
            .and_then(|s| s.ejecta.as_deref())
            .and_then(|n| resolve(&registry, n, &mut report.warnings));
        let height = map.height();
        let y = height / 4 + roll_zero(&mut rng, (height / 2).max(1) as u32) as usize;
        let (west, east) = map.projection().span(y);
        let x = west + roll_zero(&mut rng, (east - west).max(1) as u32) as usize;
        let radius = (height / 4).max(1) as u32;
        add_crater(&mut map, &mut heights, x as i64, y, radius, 0.5, rim, ejecta, &mut rng)?;
        report.craters += 1;
    }
    if report.craters > 0 {
        info!(craters = report.craters, "craters placed");
    }

    // Hydrography
    let mut water_ids = None;
    if let Some(plan) = &config.water {
        cancel.check()?;
        let mut rng = stage_rng(seeds.hydrography);
        let water = require(&registry, &plan.water, true, &mut report.warnings)?;
        let land = require(&registry, &plan.land, false, &mut report.warnings)?;
        let seabed = match &plan.seabed {
            Some(name) => Some(require(&registry, name, false, &mut report.warnings)?),
            None => None,
        };
        map.refresh_terrain_flags();

        let first = plan.overflood.unwrap_or(plan.target).max(plan.target);
        seed_basins(&mut map, &heights, water, first)?;
        let grown = grow_to_target(&mut map, &mut heights, water, first, &plan.params, &mut rng, cancel)?;
        record(&mut report, grown);
        if plan.smooth {
            let coast = smooth_coastline(&mut map, &mut heights, water, land, &plan.coastline);
            info!(changed = coast.changed(), "coastline smoothed");
        }

        let dry = seabed.unwrap_or(land);
        if seabed.is_some() && plan.target == 0 {
            let dried = dry_all(&mut map, dry);
            info!(dried, "all seas dried to seabed");
        } else if seabed.is_some() && first > plan.target {
            let shrunk = shrink_to_target(&mut map, dry, plan.target, &plan.params, &mut rng, cancel)?;
            record(&mut report, shrunk);
        } else {
            let balanced = rebalance(&mut map, &mut heights, water, dry, plan.target, &plan.params, &mut rng, cancel)?;
            record(&mut report, balanced);
        }
        info!(water_percent = map.water_percentage(), target = plan.target, "hydrography done");
        water_ids = Some((water, dry, plan));
    }

    // Upscale
    if options.detail > 1 {
        let mut rng = stage_rng(seeds.scaling);
        upscale(&mut map, &mut heights, options.detail, &mut rng, cancel)?;
        if let Some((water, dry, plan)) = water_ids {
            if plan.target > 0 {
                let balanced =
                    rebalance(&mut map, &mut heights, water, dry, plan.target, &plan.params, &mut rng, cancel)?;
                record(&mut report, balanced);
            }
        }
        info!(width = map.width(), height = map.height(), "resolution raised");
    }

    // Biomes
    if let Some(plan) = &config.biomes {
        cancel.check()?;
        let (palette, missing) = plan.palette.resolve(&registry);
        report.warnings.extend(missing);
        let biome_params = BiomeParams {
            temperature: params.temperature,
            life: params.life,
            hydrographics: params.hydrographics,
            curve: plan.curve.clone(),
            mode: plan.mode,
            ice_override: plan.ice_override,
            seed: seeds.biomes,
        };
        let classified = classify(&mut map, &heights, &biome_params, &palette)?;
        let iced = apply_ice(&mut map, &heights, &biome_params, &palette);
        info!(
            assigned = classified.assigned,
            skipped = classified.skipped,
            ice = iced.ice,
            snow = iced.snow,
            "biomes assigned"
        );
    }

    // Anything a stage failed to cover gets the base or land terrain.
    let unset = map.unset_cells();
    if unset > 0 {
        let fill = require(&registry, config.base_terrain.as_deref().unwrap_or(names::LAND), false, &mut report.warnings)?;
        let cells: Vec<(usize, usize)> = map.projection().cells().collect();
        for (x, y) in cells {
            if map.terrain_at(x, y) == TerrainId::UNSET {
                map.set_terrain(x, y, fill);
            }
        }
        warn!(unset, "filled cells left unset by the pipeline");
        report.warnings.push(Warning::Clamped {
            what: "unset cells".into(),
            count: unset,
        });
    }

    if options.stretch {
        stretch(&mut map, &mut heights)?;
        info!("surface stretched");
    }

    let mut rng = stage_rng(seeds.resources);
    let (resources, missing) = assign_resources(params, &CommodityCatalogue::standard(), &mut rng);
    report.warnings.extend(missing);
    report.resources = resources;
    info!(
        deposits = report.resources.len(),
        warnings = report.warnings.len(),
        "world complete"
    );

    Ok(GeneratedWorld {
        params: params.clone(),
        map,
        heights,
        report,
    })
}

fn record(report: &mut GenerationReport, hydro: HydrographyReport) {
    report.warnings.extend(hydro.warning());
    report.hydrography.push(hydro);
}

/// Look up an optional terrain; a miss becomes a warning.
fn resolve(registry: &TerrainRegistry, name: &str, warnings: &mut Vec<Warning>) -> Option<TerrainId> {
    match registry.lookup(name) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!(name, "skipping unknown terrain");
            warnings.extend(Warning::from_error(&e));
            None
        }
    }
}

/// Look up a terrain the pipeline cannot do without. A miss registers a
/// plain grey stand-in under the same name and records a warning.
fn require(registry: &TerrainRegistry, name: &str, is_water: bool, warnings: &mut Vec<Warning>) -> Result<TerrainId> {
    match registry.lookup(name) {
        Ok(id) => Ok(id),
        Err(e) => {
            warn!(name, "registering stand-in for unknown terrain");
            warnings.extend(Warning::from_error(&e));
            let color = if is_water { [40, 60, 160] } else { [128, 128, 128] };
            registry.register(Terrain::flat(name, color, is_water))
        }
    }
}

fn dry_all(map: &mut SurfaceMap, seabed: TerrainId) -> usize {
    let cells: Vec<(usize, usize)> = map.projection().cells().filter(|&(x, y)| map.is_water(x, y)).collect();
    for &(x, y) in &cells {
        map.set_terrain(x, y, seabed);
    }
    cells.len()
}
