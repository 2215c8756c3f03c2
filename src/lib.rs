//! Planet surface map generation library
//!
//! Builds terrain and elevation grids for whole worlds: diamond-square
//! heights, oceans grown to a target coverage, craters, cloud bands, biomes
//! and ice caps, on a sinusoidal or cylindrical projection.

pub mod bands;
pub mod biomes;
pub mod builder;
pub mod cancel;
pub mod climate;
pub mod coastline;
pub mod craters;
pub mod dice;
pub mod error;
pub mod export;
pub mod heightmap;
pub mod hydrography;
pub mod planet;
pub mod projection;
pub mod regions;
pub mod resources;
pub mod scale;
pub mod seeds;
pub mod terrain;
pub mod tilemap;
pub mod tileset;
pub mod world;

pub use builder::{generate_world, GeneratedWorld, GenerationOptions};
pub use error::{MapError, Result, Warning};
pub use planet::{WorldKind, WorldParams};
