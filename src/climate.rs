//! Climate inputs for biome classification.
//!
//! Temperature is a coarse bucket rather than a simulated field, life level
//! caps how fertile land can get, and local wetness is read off the water mask.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{invalid, MapError};
use crate::world::SurfaceMap;

// =============================================================================
// TEMPERATURE
// =============================================================================

/// Mean surface temperature bucket.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Temperature {
    UltraCold,
    ExtremelyCold,
    VeryCold,
    Cold,
    Cool,
    #[default]
    Standard,
    Warm,
    Hot,
    VeryHot,
    ExtremelyHot,
    UltraHot,
}

impl Temperature {
    pub fn all() -> &'static [Temperature] {
        &[
            Temperature::UltraCold,
            Temperature::ExtremelyCold,
            Temperature::VeryCold,
            Temperature::Cold,
            Temperature::Cool,
            Temperature::Standard,
            Temperature::Warm,
            Temperature::Hot,
            Temperature::VeryHot,
            Temperature::ExtremelyHot,
            Temperature::UltraHot,
        ]
    }

    /// Signed modifier used by the fertility formula, -15 to +15.
    pub fn bucket(&self) -> i32 {
        match self {
            Temperature::UltraCold => -15,
            Temperature::ExtremelyCold => -10,
            Temperature::VeryCold => -6,
            Temperature::Cold => -3,
            Temperature::Cool => -1,
            Temperature::Standard => 0,
            Temperature::Warm => 1,
            Temperature::Hot => 3,
            Temperature::VeryHot => 6,
            Temperature::ExtremelyHot => 10,
            Temperature::UltraHot => 15,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Temperature::UltraCold => "Ultra cold",
            Temperature::ExtremelyCold => "Extremely cold",
            Temperature::VeryCold => "Very cold",
            Temperature::Cold => "Cold",
            Temperature::Cool => "Cool",
            Temperature::Standard => "Standard",
            Temperature::Warm => "Warm",
            Temperature::Hot => "Hot",
            Temperature::VeryHot => "Very hot",
            Temperature::ExtremelyHot => "Extremely hot",
            Temperature::UltraHot => "Ultra hot",
        }
    }

    fn key(&self) -> String {
        self.description().to_lowercase().replace(' ', "-")
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl FromStr for Temperature {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace([' ', '_'], "-");
        Temperature::all()
            .iter()
            .copied()
            .find(|t| t.key() == wanted)
            .ok_or_else(|| invalid(format!("unknown temperature '{}'", s)))
    }
}

// =============================================================================
// LIFE
// =============================================================================

/// How far life has spread on the world.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LifeLevel {
    #[default]
    None,
    Organic,
    Archaean,
    Aerobic,
    ComplexOcean,
    SimpleLand,
    ComplexLand,
    Extensive,
}

impl LifeLevel {
    pub fn all() -> &'static [LifeLevel] {
        &[
            LifeLevel::None,
            LifeLevel::Organic,
            LifeLevel::Archaean,
            LifeLevel::Aerobic,
            LifeLevel::ComplexOcean,
            LifeLevel::SimpleLand,
            LifeLevel::ComplexLand,
            LifeLevel::Extensive,
        ]
    }

    pub fn description(&self) -> &'static str {
        match self {
            LifeLevel::None => "No life",
            LifeLevel::Organic => "Organic chemistry",
            LifeLevel::Archaean => "Single-celled life",
            LifeLevel::Aerobic => "Oxygen-producing microbes",
            LifeLevel::ComplexOcean => "Complex marine life",
            LifeLevel::SimpleLand => "Simple land plants",
            LifeLevel::ComplexLand => "Complex land ecology",
            LifeLevel::Extensive => "Extensive ecology",
        }
    }

    /// Apply the life ceiling to a raw fertility score.
    pub fn cap_fertility(&self, fertility: i32) -> i32 {
        match self {
            LifeLevel::None | LifeLevel::Organic | LifeLevel::Archaean | LifeLevel::Aerobic => 0,
            LifeLevel::ComplexOcean => (fertility / 5).min(30),
            LifeLevel::SimpleLand => fertility / 2,
            LifeLevel::ComplexLand | LifeLevel::Extensive => fertility,
        }
    }

    /// Starting score for life confined to dried sea beds.
    pub fn seabed_base(&self) -> i32 {
        match self {
            LifeLevel::None | LifeLevel::Organic | LifeLevel::Archaean | LifeLevel::Aerobic => -10,
            LifeLevel::ComplexOcean => -9,
            LifeLevel::SimpleLand => -5,
            LifeLevel::ComplexLand | LifeLevel::Extensive => 0,
        }
    }

    fn key(&self) -> String {
        format!("{:?}", self).to_lowercase()
    }
}

impl fmt::Display for LifeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl FromStr for LifeLevel {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase().replace(['-', '_', ' '], "");
        LifeLevel::all()
            .iter()
            .copied()
            .find(|l| l.key() == wanted)
            .ok_or_else(|| invalid(format!("unknown life level '{}'", s)))
    }
}

// =============================================================================
// ICE LINES
// =============================================================================

/// World-specific adjustment to the ice and snow latitudes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum IceOverride {
    #[default]
    None,
    /// Every sea is frozen over.
    Frozen,
    /// Dry air: snow only creeps in near the poles.
    Arid,
}

/// Latitudes (degrees) beyond which water freezes and land takes snow.
/// Values above 90 mean "never".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct IceLines {
    pub ice: u32,
    pub snow: u32,
}

impl IceLines {
    pub fn for_temperature(temperature: Temperature) -> Self {
        let (ice, snow) = match temperature {
            Temperature::UltraHot | Temperature::ExtremelyHot | Temperature::VeryHot | Temperature::Hot => {
                (120, 120)
            }
            Temperature::Warm => (85, 95),
            Temperature::Standard | Temperature::Cool => (60, 90),
            Temperature::Cold => (45, 80),
            Temperature::VeryCold => (30, 75),
            Temperature::ExtremelyCold | Temperature::UltraCold => (0, 70),
        };
        Self { ice, snow }
    }

    pub fn with_override(self, over: IceOverride) -> Self {
        match over {
            IceOverride::None => self,
            IceOverride::Frozen => Self { ice: 0, ..self },
            IceOverride::Arid => Self {
                snow: (self.snow + 90) / 2,
                ..self
            },
        }
    }
}

// =============================================================================
// WETNESS
// =============================================================================

/// 0-100: water cells score 100; land scores 5 per water cell in the inner
/// ring of its 5x5 window and 3 per water cell in the outer ring.
pub fn wetness(map: &SurfaceMap, x: usize, y: usize) -> u32 {
    if map.is_water(x, y) {
        return 100;
    }
    let projection = map.projection();
    let mut score = 0;
    for dy in -2i64..=2 {
        let yy = y as i64 + dy;
        if yy < 0 || yy >= projection.height() as i64 {
            continue;
        }
        for dx in -2i64..=2 {
            if dx == 0 && dy == 0 {
                continue;
            }
            let xx = projection.wrap(x as i64 + dx, yy as usize);
            if map.is_water(xx, yy as usize) {
                score += if dx.abs() == 2 || dy.abs() == 2 { 3 } else { 5 };
            }
        }
    }
    score.min(100)
}

/// Percentage of the valid cells in column `x` that are land.
pub fn column_land_percent(map: &SurfaceMap, x: usize) -> u32 {
    let (mut land, mut total) = (0u32, 0u32);
    for y in 0..map.height() {
        if map.is_valid(x, y) {
            total += 1;
            if map.is_land(x, y) {
                land += 1;
            }
        }
    }
    if total == 0 {
        0
    } else {
        land * 100 / total
    }
}
