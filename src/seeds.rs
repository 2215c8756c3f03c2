//! Seed management for surface generation
//!
//! Every pipeline stage draws from its own seed, derived from a master seed,
//! so changing how one stage consumes randomness never reshuffles the others.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Seeds for all generation stages.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorldSeeds {
    /// Master seed (used for display/reference)
    pub master: u64,
    /// Diamond-square height field
    pub heightmap: u64,
    /// Coarse overlay: continents, patches, mountain ranges
    pub regions: u64,
    /// Jovian band layout and colours
    pub bands: u64,
    /// Crater placement, rims and ejecta
    pub craters: u64,
    /// Basin seeding, flooding, drying and coastline smoothing
    pub hydrography: u64,
    /// Resolution doubling
    pub scaling: u64,
    /// Fertility jitter and ice/snow rolls
    pub biomes: u64,
    /// Resource densities
    pub resources: u64,
}

impl WorldSeeds {
    /// Create seeds from a master seed, deriving all sub-seeds deterministically.
    pub fn from_master(master: u64) -> Self {
        Self {
            master,
            heightmap: derive_seed(master, "heightmap"),
            regions: derive_seed(master, "regions"),
            bands: derive_seed(master, "bands"),
            craters: derive_seed(master, "craters"),
            hydrography: derive_seed(master, "hydrography"),
            scaling: derive_seed(master, "scaling"),
            biomes: derive_seed(master, "biomes"),
            resources: derive_seed(master, "resources"),
        }
    }

    /// Create a builder for customizing individual seeds
    pub fn builder(master: u64) -> WorldSeedsBuilder {
        WorldSeedsBuilder::new(master)
    }
}

/// Builder for customizing individual seeds while deriving others from master
pub struct WorldSeedsBuilder {
    seeds: WorldSeeds,
}

impl WorldSeedsBuilder {
    pub fn new(master: u64) -> Self {
        Self {
            seeds: WorldSeeds::from_master(master),
        }
    }

    /// Override the heightmap seed
    pub fn heightmap(mut self, seed: u64) -> Self {
        self.seeds.heightmap = seed;
        self
    }

    /// Override the craters seed
    pub fn craters(mut self, seed: u64) -> Self {
        self.seeds.craters = seed;
        self
    }

    /// Override the hydrography seed
    pub fn hydrography(mut self, seed: u64) -> Self {
        self.seeds.hydrography = seed;
        self
    }

    /// Override the biomes seed
    pub fn biomes(mut self, seed: u64) -> Self {
        self.seeds.biomes = seed;
        self
    }

    pub fn build(self) -> WorldSeeds {
        self.seeds
    }
}

/// Derive a sub-seed from a master seed and a system name.
pub fn derive_seed(master: u64, system: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    master.hash(&mut hasher);
    system.hash(&mut hasher);
    hasher.finish()
}

/// Derive a seed for one row (or any other integer key) of a stage.
pub fn derive_indexed(seed: u64, index: u64) -> u64 {
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);
    index.hash(&mut hasher);
    hasher.finish()
}

/// The generator used by every stage.
pub fn stage_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

impl std::fmt::Display for WorldSeeds {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "WorldSeeds {{ master: {}, heightmap: {}, regions: {}, bands: {}, craters: {}, \
             hydrography: {}, scaling: {}, biomes: {}, resources: {} }}",
            self.master,
            self.heightmap,
            self.regions,
            self.bands,
            self.craters,
            self.hydrography,
            self.scaling,
            self.biomes,
            self.resources,
        )
    }
}
