//! Resource densities for a finished world.
//!
//! Densities are 0-100 and only read by outside consumers such as a trade
//! model. Names are checked against a commodity catalogue; unknown names are
//! skipped with a warning.

use std::collections::BTreeSet;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::climate::LifeLevel;
use crate::dice::dice;
use crate::error::{MapError, Result, Warning};
use crate::planet::{AreanKind, AsteroidKind, BarrenKind, IceKind, JovianKind, WorldKind, WorldParams};

/// One commodity and how plentiful it is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDeposit {
    pub name: String,
    /// 0-100
    pub density: u8,
}

/// Known commodity names.
#[derive(Clone, Debug, Default)]
pub struct CommodityCatalogue {
    names: BTreeSet<String>,
}

impl CommodityCatalogue {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Every commodity the built-in rules can produce.
    pub fn standard() -> Self {
        Self::new([
            "Silicate Ore",
            "Silicate Crystals",
            "Ferric Ore",
            "Heavy Metals",
            "Radioactives",
            "Carbonic Ore",
            "Water",
            "Hydrogen",
            "Helium 3",
            "Oxygen",
            "Inert Gases",
            "Exotic Gases",
            "Organic Gases",
            "Protobionts",
            "Prokaryotes",
            "Cyanobacteria",
            "Algae",
            "Cnidarians",
            "Echinoderms",
            "Fish",
            "Moss",
            "Ferns",
            "Arthropods",
            "Trees",
            "Grain",
            "Meat",
        ])
    }

    pub fn lookup(&self, name: &str) -> Result<()> {
        if self.names.contains(name) {
            Ok(())
        } else {
            Err(MapError::RegistryMiss(name.to_string()))
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// `base + count d sides`, before the catalogue check.
struct Roll {
    name: &'static str,
    base: u32,
    sides: u32,
    count: u32,
}

const fn roll(name: &'static str, base: u32, sides: u32, count: u32) -> Roll {
    Roll {
        name,
        base,
        sides,
        count,
    }
}

fn mineral_rolls(kind: WorldKind) -> Vec<Roll> {
    match kind {
        WorldKind::Gaian => vec![roll("Silicate Ore", 30, 20, 2), roll("Ferric Ore", 10, 10, 2)],
        WorldKind::Barren(BarrenKind::Ferrinian) => vec![
            roll("Ferric Ore", 50, 20, 2),
            roll("Heavy Metals", 10, 6, 1),
            roll("Silicate Ore", 20, 10, 2),
        ],
        WorldKind::Barren(BarrenKind::Hadean) => vec![
            roll("Silicate Ore", 40, 20, 2),
            roll("Radioactives", 5, 6, 2),
        ],
        WorldKind::Barren(BarrenKind::Hermian) => vec![
            roll("Silicate Ore", 40, 20, 2),
            roll("Heavy Metals", 5, 6, 2),
        ],
        WorldKind::Barren(BarrenKind::Selenian) => vec![
            roll("Silicate Ore", 40, 20, 2),
            roll("Ferric Ore", 10, 10, 2),
        ],
        WorldKind::Ice(IceKind::LithicGelidian) => vec![roll("Water", 40, 20, 2), roll("Silicate Ore", 20, 10, 2)],
        WorldKind::Ice(IceKind::Tritonic) => vec![roll("Water", 50, 20, 2), roll("Organic Gases", 5, 6, 2)],
        WorldKind::Ice(_) => vec![roll("Water", 60, 20, 2)],
        WorldKind::Jovian(JovianKind::SubJovian) => vec![
            roll("Hydrogen", 60, 20, 2),
            roll("Helium 3", 10, 8, 2),
            roll("Oxygen", 0, 4, 2),
            roll("Water", 0, 4, 2),
        ],
        WorldKind::Jovian(JovianKind::CryoJovian) => vec![
            roll("Hydrogen", 40, 20, 2),
            roll("Inert Gases", 30, 20, 2),
            roll("Exotic Gases", 20, 12, 2),
            roll("Water", 0, 10, 3),
        ],
        WorldKind::Jovian(_) => vec![roll("Hydrogen", 60, 20, 2), roll("Helium 3", 5, 8, 2)],
        WorldKind::Belt(AsteroidKind::Kuiperian) => vec![roll("Water", 40, 20, 2), roll("Organic Gases", 5, 6, 2)],
        WorldKind::Belt(AsteroidKind::Hephaestian) => vec![
            roll("Heavy Metals", 20, 10, 2),
            roll("Radioactives", 10, 6, 2),
        ],
        WorldKind::Belt(AsteroidKind::Cerean) => vec![roll("Carbonic Ore", 30, 12, 2), roll("Water", 10, 10, 2)],
        WorldKind::Belt(AsteroidKind::Vestian) => vec![roll("Silicate Ore", 40, 20, 2), roll("Ferric Ore", 20, 10, 2)],
        WorldKind::Arean(kind) => {
            let mut rolls = vec![
                roll("Silicate Ore", 50, 20, 2),
                roll("Ferric Ore", 20, 10, 2),
                roll("Carbonic Ore", 25, 12, 2),
            ];
            if kind == AreanKind::EoArean {
                rolls.push(roll("Silicate Crystals", 5, 6, 2));
            }
            rolls
        }
    }
}

fn life_rolls(life: LifeLevel) -> Vec<Roll> {
    match life {
        LifeLevel::None => vec![],
        LifeLevel::Organic => vec![roll("Protobionts", 0, 10, 1)],
        LifeLevel::Archaean => vec![roll("Protobionts", 0, 20, 4), roll("Prokaryotes", 0, 10, 5)],
        LifeLevel::Aerobic => vec![roll("Cyanobacteria", 20, 20, 3), roll("Algae", 0, 12, 3)],
        LifeLevel::ComplexOcean => vec![
            roll("Algae", 0, 6, 3),
            roll("Cnidarians", 30, 20, 3),
            roll("Echinoderms", 30, 20, 3),
        ],
        LifeLevel::SimpleLand => vec![
            roll("Algae", 0, 6, 3),
            roll("Fish", 20, 20, 3),
            roll("Moss", 10, 10, 3),
            roll("Ferns", 20, 10, 3),
        ],
        LifeLevel::ComplexLand => vec![
            roll("Fish", 20, 20, 3),
            roll("Ferns", 30, 20, 3),
            roll("Trees", 0, 10, 2),
            roll("Arthropods", 0, 12, 2),
        ],
        LifeLevel::Extensive => vec![
            roll("Fish", 40, 20, 3),
            roll("Trees", 30, 20, 3),
            roll("Grain", 35, 20, 3),
            roll("Meat", 10, 12, 2),
        ],
    }
}

/// Roll the deposits for a world. Worlds without surface water get no life
/// deposits; Gaian and Arean worlds also get water equal to their coverage.
pub fn assign_resources<R: Rng + ?Sized>(
    params: &WorldParams,
    catalogue: &CommodityCatalogue,
    rng: &mut R,
) -> (Vec<ResourceDeposit>, Vec<Warning>) {
    let mut rolls = mineral_rolls(params.kind);
    if matches!(params.kind, WorldKind::Gaian | WorldKind::Arean(_)) {
        rolls.extend(life_rolls(params.life));
    }

    let mut deposits = Vec::new();
    let mut warnings = Vec::new();
    let mut add = |name: &str, density: u32, deposits: &mut Vec<ResourceDeposit>| match catalogue.lookup(name) {
        Ok(()) => {
            if density > 0 {
                deposits.push(ResourceDeposit {
                    name: name.to_string(),
                    density: density.min(100) as u8,
                });
            }
        }
        Err(e) => {
            warn!(name, "skipping resource missing from the catalogue");
            warnings.extend(Warning::from_error(&e));
        }
    };

    for r in &rolls {
        let density = r.base + dice(rng, r.sides, r.count);
        add(r.name, density, &mut deposits);
    }
    if matches!(params.kind, WorldKind::Gaian | WorldKind::Arean(_)) {
        add("Water", params.hydrographics as u32, &mut deposits);
    }

    debug!(kind = %params.kind, deposits = deposits.len(), "resources assigned");
    (deposits, warnings)
}
