//! Tabletop-style dice over an explicit random source.
//!
//! Generation tuning is expressed in dice (`2d10 - 2d10` jitter, `d6 <= coast`
//! and so on), so these helpers keep the rules readable at the call site.

use rand::Rng;

/// Roll one die with `sides` faces (1..=sides). Zero or one sided dice return 1.
pub fn die<R: Rng + ?Sized>(rng: &mut R, sides: u32) -> u32 {
    if sides <= 1 {
        return 1;
    }
    rng.gen_range(1..=sides)
}

/// Roll `count` dice with `sides` faces and sum them.
pub fn dice<R: Rng + ?Sized>(rng: &mut R, sides: u32, count: u32) -> u32 {
    (0..count).map(|_| die(rng, sides)).sum()
}

/// Roll in `0..sides`, for picking an index.
pub fn roll_zero<R: Rng + ?Sized>(rng: &mut R, sides: u32) -> u32 {
    if sides == 0 {
        return 0;
    }
    rng.gen_range(0..sides)
}

pub fn d2<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    die(rng, 2)
}

pub fn d3<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    die(rng, 3)
}

pub fn d4<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    die(rng, 4)
}

pub fn d6<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    die(rng, 6)
}

pub fn d10<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    die(rng, 10)
}

pub fn d20<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    die(rng, 20)
}

pub fn d100<R: Rng + ?Sized>(rng: &mut R) -> u32 {
    die(rng, 100)
}

/// Symmetric jitter: `count`d`sides` minus `count`d`sides`.
pub fn jitter<R: Rng + ?Sized>(rng: &mut R, sides: u32, count: u32) -> i32 {
    dice(rng, sides, count) as i32 - dice(rng, sides, count) as i32
}
