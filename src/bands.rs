//! Cloud bands for gas giants.
//!
//! Each subtype owns a fixed palette of band terrains, coloured around its
//! base colour and registered once. A world draws its bands from that
//! palette. Band edges wobble by `2d10 - 2d10` rows per cell.

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::dice::dice;
use crate::error::Result;
use crate::planet::JovianKind;
use crate::seeds::{derive_seed, stage_rng};
use crate::terrain::{Terrain, TerrainId};
use crate::world::SurfaceMap;

/// Per-channel elevation tint for band terrains.
const BAND_VARIANCE: [f32; 3] = [0.5, 0.5, 0.5];

/// Band terrains per palette. At least the largest band count any profile rolls.
pub const PALETTE_SIZE: u32 = 24;

/// Colour and band-count rules for one kind of gas giant.
#[derive(Clone, Debug, PartialEq)]
pub struct BandProfile {
    /// Base red, green, blue
    pub base: [u32; 3],
    /// Number of d20 added to each channel per band
    pub variance: [u32; 3],
    /// Fixed part of the band count
    pub min_bands: u32,
    /// Random part of the band count: `count` dice with `sides` faces
    pub band_dice: (u32, u32),
}

impl BandProfile {
    pub fn for_kind(kind: JovianKind) -> Self {
        let standard = Self {
            base: [100, 100, 100],
            variance: [2, 2, 2],
            min_bands: 8,
            band_dice: (4, 1),
        };
        match kind {
            JovianKind::EuJovian => standard,
            JovianKind::SubJovian => Self {
                base: [200, 200, 120],
                variance: [2, 2, 1],
                min_bands: 4,
                ..standard
            },
            JovianKind::SuperJovian => Self {
                variance: [3, 2, 2],
                band_dice: (6, 1),
                ..standard
            },
            JovianKind::MacroJovian => Self {
                variance: [4, 3, 3],
                band_dice: (8, 1),
                ..standard
            },
            JovianKind::CryoJovian => Self {
                base: [100, 120, 120],
                variance: [0, 2, 2],
                min_bands: 3,
                band_dice: (8, 1),
            },
            JovianKind::EpiStellarJovian => Self {
                base: [100, 50, 50],
                variance: [3, 2, 2],
                min_bands: 2,
                band_dice: (8, 2),
            },
        }
    }

    pub fn roll_band_count<R: Rng + ?Sized>(&self, rng: &mut R) -> u32 {
        let (sides, count) = self.band_dice;
        (self.min_bands + dice(rng, sides, count)).max(1)
    }

    fn roll_colour<R: Rng + ?Sized>(&self, rng: &mut R) -> [u8; 3] {
        let mut colour = [0u8; 3];
        for (channel, out) in colour.iter_mut().enumerate() {
            let value = self.base[channel] + dice(rng, 20, self.variance[channel]);
            *out = value.min(255) as u8;
        }
        colour
    }
}

/// The palette terrains named `<prefix> band <n>`, registered on first use.
///
/// Colours come from the prefix alone, so every world sharing a prefix gets
/// the same ids and the registry stays bounded.
pub fn band_palette(map: &SurfaceMap, profile: &BandProfile, prefix: &str) -> Result<Vec<TerrainId>> {
    let registry = map.registry().clone();
    let mut rng = stage_rng(derive_seed(0, prefix));
    (0..PALETTE_SIZE)
        .map(|n| {
            let colour = profile.roll_colour(&mut rng);
            registry.register(Terrain::new(format!("{} band {}", prefix, n), colour, BAND_VARIANCE, false))
        })
        .collect()
}

/// Pick this world's bands from the `prefix` palette and paint them over the
/// whole surface. Returns the band terrains, top to bottom.
pub fn paint_bands<R: Rng + ?Sized>(
    map: &mut SurfaceMap,
    profile: &BandProfile,
    prefix: &str,
    rng: &mut R,
) -> Result<Vec<TerrainId>> {
    let palette = band_palette(map, profile, prefix)?;
    let count = profile.roll_band_count(rng).min(PALETTE_SIZE) as usize;
    let bands: Vec<TerrainId> = palette.choose_multiple(rng, count).copied().collect();
    map.refresh_terrain_flags();

    let projection = map.projection().clone();
    let band_height = (projection.height() / bands.len()).max(1) as i64;
    for (x, y) in projection.cells() {
        let wobble = dice(rng, 10, 2) as i64 - dice(rng, 10, 2) as i64;
        let index = ((y as i64 + wobble) / band_height).clamp(0, bands.len() as i64 - 1);
        map.set_terrain(x, y, bands[index as usize]);
    }
    debug!(bands = bands.len(), band_height, prefix, "cloud bands painted");
    Ok(bands)
}
