//! World parameters: what kind of world to build and its physical settings.
//!
//! These are read-only inputs. The pipeline never writes back into them.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::climate::{LifeLevel, Temperature};
use crate::error::{invalid, MapError, Result};

// =============================================================================
// WORLD KINDS
// =============================================================================

/// Airless rocky worlds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarrenKind {
    Hermian,
    Selenian,
    Hadean,
    Ferrinian,
}

/// Worlds with an ice crust.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IceKind {
    Europan,
    LithicGelidian,
    Iapetean,
    Tritonic,
}

/// Gas giants.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JovianKind {
    EuJovian,
    SubJovian,
    SuperJovian,
    MacroJovian,
    CryoJovian,
    EpiStellarJovian,
}

/// Large asteroids and belt bodies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AsteroidKind {
    Cerean,
    Vestian,
    Kuiperian,
    Hephaestian,
}

/// Cold desert worlds with thin air.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AreanKind {
    EoArean,
    Arean,
    AreanLacustric,
}

/// Which pipeline configuration a world uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorldKind {
    #[default]
    Gaian,
    Barren(BarrenKind),
    Ice(IceKind),
    Jovian(JovianKind),
    Belt(AsteroidKind),
    Arean(AreanKind),
}

impl WorldKind {
    pub fn all() -> Vec<WorldKind> {
        let mut kinds = vec![WorldKind::Gaian];
        kinds.extend(
            [
                BarrenKind::Hermian,
                BarrenKind::Selenian,
                BarrenKind::Hadean,
                BarrenKind::Ferrinian,
            ]
            .map(WorldKind::Barren),
        );
        kinds.extend(
            [
                IceKind::Europan,
                IceKind::LithicGelidian,
                IceKind::Iapetean,
                IceKind::Tritonic,
            ]
            .map(WorldKind::Ice),
        );
        kinds.extend(
            [
                JovianKind::EuJovian,
                JovianKind::SubJovian,
                JovianKind::SuperJovian,
                JovianKind::MacroJovian,
                JovianKind::CryoJovian,
                JovianKind::EpiStellarJovian,
            ]
            .map(WorldKind::Jovian),
        );
        kinds.extend(
            [
                AsteroidKind::Cerean,
                AsteroidKind::Vestian,
                AsteroidKind::Kuiperian,
                AsteroidKind::Hephaestian,
            ]
            .map(WorldKind::Belt),
        );
        kinds.extend([AreanKind::EoArean, AreanKind::Arean, AreanKind::AreanLacustric].map(WorldKind::Arean));
        kinds
    }

    pub fn name(&self) -> &'static str {
        match self {
            WorldKind::Gaian => "Gaian",
            WorldKind::Barren(kind) => match kind {
                BarrenKind::Hermian => "Hermian",
                BarrenKind::Selenian => "Selenian",
                BarrenKind::Hadean => "Hadean",
                BarrenKind::Ferrinian => "Ferrinian",
            },
            WorldKind::Ice(kind) => match kind {
                IceKind::Europan => "Europan",
                IceKind::LithicGelidian => "LithicGelidian",
                IceKind::Iapetean => "Iapetean",
                IceKind::Tritonic => "Tritonic",
            },
            WorldKind::Jovian(kind) => match kind {
                JovianKind::EuJovian => "EuJovian",
                JovianKind::SubJovian => "SubJovian",
                JovianKind::SuperJovian => "SuperJovian",
                JovianKind::MacroJovian => "MacroJovian",
                JovianKind::CryoJovian => "CryoJovian",
                JovianKind::EpiStellarJovian => "EpiStellarJovian",
            },
            WorldKind::Belt(kind) => match kind {
                AsteroidKind::Cerean => "Cerean",
                AsteroidKind::Vestian => "Vestian",
                AsteroidKind::Kuiperian => "Kuiperian",
                AsteroidKind::Hephaestian => "Hephaestian",
            },
            WorldKind::Arean(kind) => match kind {
                AreanKind::EoArean => "EoArean",
                AreanKind::Arean => "Arean",
                AreanKind::AreanLacustric => "AreanLacustric",
            },
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            WorldKind::Gaian => "Earth-like world with oceans and continents",
            WorldKind::Barren(BarrenKind::Hermian) => "Hot airless rock with lava plains",
            WorldKind::Barren(BarrenKind::Selenian) => "Grey cratered moon with dark maria",
            WorldKind::Barren(BarrenKind::Hadean) => "Young world still scarred by bombardment",
            WorldKind::Barren(BarrenKind::Ferrinian) => "Iron-rich airless world",
            WorldKind::Ice(IceKind::Europan) => "Smooth ice shell over a hidden ocean",
            WorldKind::Ice(IceKind::LithicGelidian) => "Dirty rock and ice, heavily cratered",
            WorldKind::Ice(IceKind::Iapetean) => "Two-toned ice moon with dark streaks",
            WorldKind::Ice(IceKind::Tritonic) => "Nitrogen ice plains with dark plumes",
            WorldKind::Jovian(JovianKind::EuJovian) => "Classic banded gas giant",
            WorldKind::Jovian(JovianKind::SubJovian) => "Small pale gas giant",
            WorldKind::Jovian(JovianKind::SuperJovian) => "Massive gas giant",
            WorldKind::Jovian(JovianKind::MacroJovian) => "Huge, turbulent gas giant",
            WorldKind::Jovian(JovianKind::CryoJovian) => "Cold blue ice giant",
            WorldKind::Jovian(JovianKind::EpiStellarJovian) => "Hot gas giant close to its star",
            WorldKind::Belt(AsteroidKind::Cerean) => "Dark carbonaceous dwarf planet",
            WorldKind::Belt(AsteroidKind::Vestian) => "Bright basaltic asteroid",
            WorldKind::Belt(AsteroidKind::Kuiperian) => "Icy outer-belt body",
            WorldKind::Belt(AsteroidKind::Hephaestian) => "Volcanic asteroid",
            WorldKind::Arean(AreanKind::EoArean) => "Young desert world with shallow seas",
            WorldKind::Arean(AreanKind::Arean) => "Dry red desert with polar caps",
            WorldKind::Arean(AreanKind::AreanLacustric) => "Desert world with frozen lakes",
        }
    }
}

impl fmt::Display for WorldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for WorldKind {
    type Err = MapError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['-', '_', ' '], "");
        WorldKind::all()
            .into_iter()
            .find(|k| k.name().to_lowercase() == wanted)
            .ok_or_else(|| invalid(format!("unknown world kind '{}'", s)))
    }
}

// =============================================================================
// FEATURES
// =============================================================================

/// Optional surface features requested by the world model.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanetFeature {
    /// Mountain ridge along the equator
    EquatorialRidge,
    /// Mountain ridges ringing the poles
    PolarRidge,
    /// No collision mountain ranges
    Smooth,
    /// Twice the usual number of craters
    HeavilyCratered,
    /// One extra crater a quarter of the map tall
    GiantCrater,
}

impl PlanetFeature {
    pub fn all() -> &'static [PlanetFeature] {
        &[
            PlanetFeature::EquatorialRidge,
            PlanetFeature::PolarRidge,
            PlanetFeature::Smooth,
            PlanetFeature::HeavilyCratered,
            PlanetFeature::GiantCrater,
        ]
    }
}

impl FromStr for PlanetFeature {
    type Err = MapError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['-', '_', ' '], "");
        PlanetFeature::all()
            .iter()
            .copied()
            .find(|f| format!("{:?}", f).to_lowercase() == wanted)
            .ok_or_else(|| invalid(format!("unknown planet feature '{}'", s)))
    }
}

// =============================================================================
// PARAMETERS
// =============================================================================

/// Generation inputs for one world.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldParams {
    pub kind: WorldKind,
    /// Target water coverage, percent
    pub hydrographics: u8,
    /// Degrees, 0-180
    pub axial_tilt: u32,
    pub temperature: Temperature,
    pub life: LifeLevel,
    pub features: Vec<PlanetFeature>,
    /// Fixed master seed; a random one is drawn when absent
    pub seed: Option<u64>,
}

impl Default for WorldParams {
    fn default() -> Self {
        Self {
            kind: WorldKind::Gaian,
            hydrographics: 60,
            axial_tilt: 20,
            temperature: Temperature::Standard,
            life: LifeLevel::Extensive,
            features: Vec::new(),
            seed: None,
        }
    }
}

impl WorldParams {
    pub fn has_feature(&self, feature: PlanetFeature) -> bool {
        self.features.contains(&feature)
    }

    /// Reject out-of-range inputs before any work is done.
    pub fn validate(&self) -> Result<()> {
        if self.hydrographics > 100 {
            return Err(invalid(format!("hydrographics must be 0-100, got {}", self.hydrographics)));
        }
        if self.axial_tilt > 180 {
            return Err(invalid(format!("axial tilt must be 0-180 degrees, got {}", self.axial_tilt)));
        }
        Ok(())
    }

    /// Load parameters from a JSON file. Missing fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let params: WorldParams = serde_json::from_str(&text)?;
        params.validate()?;
        Ok(params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_kinds_have_unique_names() {
        let kinds = WorldKind::all();
        assert_eq!(kinds.len(), 22);
        let mut names: Vec<&str> = kinds.iter().map(|k| k.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), kinds.len());
        for kind in &kinds {
            assert!(!kind.description().is_empty());
            assert_eq!(kind.name().parse::<WorldKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_parse_is_forgiving() {
        assert_eq!("gaian".parse::<WorldKind>().unwrap(), WorldKind::Gaian);
        assert_eq!(
            "epi-stellar-jovian".parse::<WorldKind>().unwrap(),
            WorldKind::Jovian(JovianKind::EpiStellarJovian)
        );
        assert!("venusian".parse::<WorldKind>().is_err());
        assert_eq!("heavily_cratered".parse::<PlanetFeature>().unwrap(), PlanetFeature::HeavilyCratered);
    }

    #[test]
    fn test_validate() {
        assert!(WorldParams::default().validate().is_ok());
        let wet = WorldParams {
            hydrographics: 101,
            ..WorldParams::default()
        };
        assert!(matches!(wet.validate(), Err(MapError::InvalidParameter(_))));
        let tilted = WorldParams {
            axial_tilt: 200,
            ..WorldParams::default()
        };
        assert!(tilted.validate().is_err());
    }

    #[test]
    fn test_json_defaults() {
        let params: WorldParams = serde_json::from_str(r#"{ "kind": { "Barren": "Selenian" }, "seed": 7 }"#).unwrap();
        assert_eq!(params.kind, WorldKind::Barren(BarrenKind::Selenian));
        assert_eq!(params.seed, Some(7));
        assert_eq!(params.hydrographics, 60);
        let text = serde_json::to_string(&WorldParams::default()).unwrap();
        let back: WorldParams = serde_json::from_str(&text).unwrap();
        assert_eq!(back, WorldParams::default());
    }
}
