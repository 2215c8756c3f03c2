//! Terrain descriptors, the shared registry, and per-cell terrain handles.
//!
//! Descriptors are append-only: once registered, an index always names the
//! same terrain, which keeps packed cell words stable for persistence.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::{invalid, MapError, Result};

/// Multiplier separating terrain index from rotation in a packed cell word.
pub const ROTATION_BASE: u64 = 100_000;

// =============================================================================
// TERRAIN HANDLES
// =============================================================================

/// Stable index of a registered terrain.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TerrainId(pub u16);

impl TerrainId {
    /// Reserved: nothing assigned yet.
    pub const UNSET: TerrainId = TerrainId(0);
    /// Reserved: buffer cell outside the projected surface.
    pub const OUT_OF_BOUNDS: TerrainId = TerrainId(1);

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_reserved(self) -> bool {
        self == Self::UNSET || self == Self::OUT_OF_BOUNDS
    }
}

/// What one grid cell holds besides its elevation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCell {
    pub terrain: TerrainId,
    /// Hex orientation, 0-5 for editor tiles.
    pub rotation: u8,
}

impl TileCell {
    pub fn new(terrain: TerrainId) -> Self {
        Self { terrain, rotation: 0 }
    }

    pub fn rotated(terrain: TerrainId, rotation: u8) -> Self {
        Self { terrain, rotation }
    }

    /// `terrain * ROTATION_BASE + rotation`.
    pub fn pack(self) -> u64 {
        self.terrain.0 as u64 * ROTATION_BASE + self.rotation as u64
    }

    pub fn unpack(word: u64) -> Result<Self> {
        let index = word / ROTATION_BASE;
        let rotation = word % ROTATION_BASE;
        if index > u16::MAX as u64 || rotation > u8::MAX as u64 {
            return Err(invalid(format!("packed cell {} out of range", word)));
        }
        Ok(Self {
            terrain: TerrainId(index as u16),
            rotation: rotation as u8,
        })
    }
}

// =============================================================================
// TERRAIN DESCRIPTORS
// =============================================================================

/// A named surface type with its display colour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Terrain {
    pub name: String,
    /// Colour at elevation 0
    pub color: [u8; 3],
    /// Per-channel colour change per unit of elevation
    pub variance: [f32; 3],
    pub is_water: bool,
}

impl Terrain {
    pub fn new(name: impl Into<String>, color: [u8; 3], variance: [f32; 3], is_water: bool) -> Self {
        Self {
            name: name.into(),
            color,
            variance,
            is_water,
        }
    }

    /// Flat colour, no elevation tint.
    pub fn flat(name: impl Into<String>, color: [u8; 3], is_water: bool) -> Self {
        Self::new(name, color, [0.0; 3], is_water)
    }

    /// Elevation-modulated colour.
    pub fn color_for(&self, elevation: u8) -> [u8; 3] {
        let mut rgb = [0u8; 3];
        for channel in 0..3 {
            let value = self.color[channel] as f32 + elevation as f32 * self.variance[channel];
            rgb[channel] = value.clamp(0.0, 255.0) as u8;
        }
        rgb
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

#[derive(Default)]
struct RegistryInner {
    terrains: Vec<Arc<Terrain>>,
    by_name: HashMap<String, TerrainId>,
}

/// Append-only catalogue of terrains. Lookups take a read lock, registration
/// a write lock, so generation runs on different threads can share one.
pub struct TerrainRegistry {
    inner: RwLock<RegistryInner>,
}

impl TerrainRegistry {
    /// Empty registry holding only the two reserved entries.
    pub fn new() -> Self {
        let registry = Self {
            inner: RwLock::new(RegistryInner::default()),
        };
        {
            let mut inner = registry.write();
            for reserved in [
                Terrain::flat("Unset", [0, 0, 0], false),
                Terrain::flat("OutOfBounds", [0, 0, 0], false),
            ] {
                let id = TerrainId(inner.terrains.len() as u16);
                inner.by_name.insert(reserved.name.clone(), id);
                inner.terrains.push(Arc::new(reserved));
            }
        }
        registry
    }

    /// Registry pre-loaded with every terrain the world kinds refer to.
    pub fn with_standard_catalogue() -> Self {
        let registry = Self::new();
        for terrain in standard_catalogue() {
            // Names in the catalogue are unique and far below the index limit.
            let _ = registry.register(terrain);
        }
        registry
    }

    /// Process-wide registry, created on first use.
    pub fn global() -> Arc<TerrainRegistry> {
        static GLOBAL: OnceLock<Arc<TerrainRegistry>> = OnceLock::new();
        GLOBAL
            .get_or_init(|| Arc::new(TerrainRegistry::with_standard_catalogue()))
            .clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a terrain, or return the existing index if the name is taken.
    pub fn register(&self, terrain: Terrain) -> Result<TerrainId> {
        let mut inner = self.write();
        if let Some(&id) = inner.by_name.get(&terrain.name) {
            return Ok(id);
        }
        if inner.terrains.len() > u16::MAX as usize {
            return Err(invalid("terrain registry is full"));
        }
        let id = TerrainId(inner.terrains.len() as u16);
        inner.by_name.insert(terrain.name.clone(), id);
        inner.terrains.push(Arc::new(terrain));
        Ok(id)
    }

    pub fn lookup(&self, name: &str) -> Result<TerrainId> {
        self.read()
            .by_name
            .get(name)
            .copied()
            .ok_or_else(|| MapError::RegistryMiss(name.to_string()))
    }

    pub fn get(&self, id: TerrainId) -> Option<Arc<Terrain>> {
        self.read().terrains.get(id.index()).cloned()
    }

    pub fn name(&self, id: TerrainId) -> String {
        self.get(id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| format!("#{}", id.0))
    }

    pub fn is_water(&self, id: TerrainId) -> bool {
        self.read()
            .terrains
            .get(id.index())
            .map(|t| t.is_water)
            .unwrap_or(false)
    }

    /// Water flags for every registered index, for lock-free lookups in hot loops.
    pub fn water_flags(&self) -> Vec<bool> {
        self.read().terrains.iter().map(|t| t.is_water).collect()
    }

    pub fn color_for(&self, id: TerrainId, elevation: u8) -> [u8; 3] {
        self.get(id).map(|t| t.color_for(elevation)).unwrap_or([0, 0, 0])
    }

    pub fn len(&self) -> usize {
        self.read().terrains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TerrainRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TerrainRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerrainRegistry").field("terrains", &self.len()).finish()
    }
}

/// Names of the standard catalogue entries used directly by the pipeline.
pub mod names {
    pub const WATER: &str = "Water";
    pub const ICE: &str = "Ice";
    pub const SNOW: &str = "Snow";
    pub const LAND: &str = "Land";
    pub const MOUNTAIN: &str = "Mountain";
    pub const DESERT: &str = "Desert";
    pub const SCRUB: &str = "Scrub";
    pub const GRASS: &str = "Grass";
    pub const WOODS: &str = "Woods";
    pub const JUNGLE: &str = "Jungle";
    pub const SEABED: &str = "Seabed";
}

fn standard_catalogue() -> Vec<Terrain> {
    vec![
        // Open worlds
        Terrain::new("Water", [50, 50, 150], [0.0, 0.0, 1.0], true),
        Terrain::flat("Ice", [255, 255, 255], true),
        Terrain::new("Snow", [200, 200, 200], [0.5, 0.5, 0.5], false),
        Terrain::new("Land", [110, 100, 60], [1.0, 1.0, 0.5], false),
        Terrain::new("Mountain", [50, 50, 50], [0.5, 0.5, 0.5], false),
        Terrain::new("Desert", [100, 100, 0], [0.5, 0.5, 0.1], false),
        Terrain::new("Scrub", [100, 100, 0], [0.5, 1.0, 0.1], false),
        Terrain::new("Grass", [50, 100, 0], [1.0, 1.0, 0.1], false),
        Terrain::new("Woods", [50, 100, 0], [0.3, 1.0, 0.1], false),
        Terrain::new("Jungle", [0, 25, 0], [0.1, 0.7, 0.1], false),
        Terrain::new("Seabed", [150, 130, 100], [0.5, 0.5, 0.3], false),
        // Arean
        Terrain::new("AreanDesert", [180, 100, 50], [0.6, 0.4, 0.2], false),
        Terrain::new("AreanDark", [120, 60, 40], [0.5, 0.3, 0.2], false),
        Terrain::new("AreanSeabed", [160, 110, 70], [0.4, 0.3, 0.2], false),
        Terrain::new("AreanWater", [60, 60, 120], [0.0, 0.0, 1.0], true),
        Terrain::new("AreanImpact", [150, 80, 40], [0.5, 0.3, 0.2], false),
        // Barren
        Terrain::new("Selenian", [50, 50, 50], [2.0, 2.0, 2.0], false),
        Terrain::new("SelenianFlats", [140, 140, 140], [-0.25, -0.25, -0.25], false),
        Terrain::new("SelenianEjecta", [130, 130, 130], [2.0, 2.0, 2.0], false),
        Terrain::new("SelenianImpact", [100, 100, 100], [1.0, 1.0, 1.0], false),
        Terrain::new("Hermian", [230, 180, 115], [-1.0, -1.0, -1.0], false),
        Terrain::new("HermianImpact", [230, 180, 115], [-0.75, -1.0, -1.0], false),
        Terrain::new("HermianLava", [210, 190, 135], [-0.7, -1.0, -1.0], false),
        Terrain::new("HermianEjecta", [240, 200, 140], [-0.5, -0.5, -0.5], false),
        Terrain::new("Ferrinian", [120, 120, 50], [3.0, 2.0, 2.0], false),
        Terrain::new("FerrinianImpact", [100, 100, 40], [2.0, 1.5, 1.5], false),
        Terrain::new("FerrinianEjecta", [100, 100, 50], [1.5, 1.0, 0.5], false),
        Terrain::new("FerrinianFlats", [90, 90, 40], [1.0, 1.0, 0.5], false),
        Terrain::new("Hadean", [60, 30, 30], [0.8, 0.4, 0.3], false),
        Terrain::new("HadeanImpact", [40, 20, 20], [0.4, 0.2, 0.1], false),
        Terrain::new("HadeanEjecta", [90, 60, 60], [1.0, 0.8, 0.8], false),
        Terrain::new("HadeanHighlands", [50, 50, 50], [1.5, 1.25, 1.25], false),
        // Belt
        Terrain::new("Cerean", [50, 50, 50], [2.0, 2.0, 1.5], false),
        Terrain::new("CereanImpact", [25, 25, 25], [1.0, 1.0, 0.75], false),
        Terrain::new("CereanEjecta", [150, 150, 150], [2.0, 2.0, 1.5], false),
        Terrain::new("Vestian", [90, 90, 90], [2.0, 2.0, 1.5], false),
        Terrain::new("VestianFlats", [70, 70, 70], [1.5, 1.5, 1.0], false),
        Terrain::new("VestianImpact", [60, 60, 60], [1.5, 1.5, 1.0], false),
        Terrain::new("KuiperianIces", [100, 75, 50], [1.5, 1.5, 1.0], false),
        Terrain::new("KuiperianEjecta", [100, 75, 50], [3.0, 3.0, 2.0], false),
        Terrain::new("Hephaestian", [100, 75, 0], [2.5, 2.5, 2.0], false),
        Terrain::new("HephaestianCrater", [100, 75, 0], [2.5, 2.0, 1.5], false),
        // Ice
        Terrain::new("CleanIce", [140, 140, 150], [1.0, 1.0, 1.0], false),
        Terrain::new("DirtyIce", [120, 60, 40], [1.2, 1.4, 1.6], false),
        Terrain::new("IceEjecta", [150, 150, 160], [2.0, 2.0, 2.0], false),
        Terrain::new("FlatIce", [240, 240, 255], [0.1, 0.1, 0.1], false),
        Terrain::new("LithicGelidian", [0, 0, 0], [3.0, 2.0, 1.5], false),
        Terrain::new("LithicGelidianImpact", [25, 20, 0], [3.0, 2.0, 1.0], false),
        Terrain::new("DarkIce", [50, 50, 50], [1.0, 1.0, 1.0], false),
        Terrain::new("TritonicIce", [150, 150, 150], [1.0, 1.0, 1.2], false),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_indices() {
        let registry = TerrainRegistry::new();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.lookup("Unset").unwrap(), TerrainId::UNSET);
        assert_eq!(registry.lookup("OutOfBounds").unwrap(), TerrainId::OUT_OF_BOUNDS);
        let id = registry.register(Terrain::flat("Basalt", [1, 2, 3], false)).unwrap();
        assert_eq!(id, TerrainId(2));
    }

    #[test]
    fn test_register_dedups_by_name() {
        let registry = TerrainRegistry::new();
        let a = registry.register(Terrain::flat("Lava", [200, 0, 0], false)).unwrap();
        let b = registry.register(Terrain::flat("Lava", [0, 0, 0], true)).unwrap();
        assert_eq!(a, b);
        assert!(!registry.is_water(a));
    }

    #[test]
    fn test_lookup_miss() {
        let registry = TerrainRegistry::with_standard_catalogue();
        assert!(registry.lookup(names::GRASS).is_ok());
        assert!(matches!(registry.lookup("Tundra"), Err(MapError::RegistryMiss(_))));
    }

    #[test]
    fn test_color_for_tints_and_clamps() {
        let terrain = Terrain::new("Test", [100, 250, 10], [1.0, 1.0, -1.0], false);
        assert_eq!(terrain.color_for(0), [100, 250, 10]);
        assert_eq!(terrain.color_for(50), [150, 255, 0]);
    }

    #[test]
    fn test_pack_unpack() {
        let cell = TileCell::rotated(TerrainId(42), 5);
        assert_eq!(cell.pack(), 4_200_005);
        assert_eq!(TileCell::unpack(4_200_005).unwrap(), cell);
        assert_eq!(TileCell::unpack(0).unwrap(), TileCell::default());
        assert!(TileCell::unpack(ROTATION_BASE * 70_000).is_err());
        assert!(TileCell::unpack(300).is_err());
    }

    #[test]
    fn test_catalogue_water_flags() {
        let registry = TerrainRegistry::with_standard_catalogue();
        let flags = registry.water_flags();
        let water = registry.lookup(names::WATER).unwrap();
        let ice = registry.lookup(names::ICE).unwrap();
        let snow = registry.lookup(names::SNOW).unwrap();
        assert!(flags[water.index()]);
        assert!(flags[ice.index()]);
        assert!(!flags[snow.index()]);
        assert!(!flags[TerrainId::OUT_OF_BOUNDS.index()]);
    }

    #[test]
    fn test_global_is_shared() {
        let a = TerrainRegistry::global();
        let b = TerrainRegistry::global();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.lookup(names::WATER).is_ok());
    }
}
