//! Deterministic per-shipment RNG.
//!
//! # Determinism strategy
//!
//! Each shipment gets its own `SmallRng` seeded by:
//!
//!   seed = global_seed XOR (fnv1a(shipment_id) * MIXING_CONSTANT)
//!
//! The mixing constant is the 64-bit fractional part of the golden ratio.
//! FNV-1a is used instead of `DefaultHasher` because its output is stable
//! across Rust releases, so a shipment's synthetic route looks the same after
//! a process restart.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::ShipmentId;

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes
        .iter()
        .fold(FNV_OFFSET, |h, &b| (h ^ b as u64).wrapping_mul(FNV_PRIME))
}

/// RNG used for the cosmetic parts of route synthesis (bulge side and size).
pub struct RouteRng(SmallRng);

impl RouteRng {
    /// Seed deterministically from the configured seed and a shipment id.
    pub fn new(global_seed: u64, shipment: &ShipmentId) -> Self {
        let seed = global_seed ^ fnv1a(shipment.as_str().as_bytes()).wrapping_mul(MIXING_CONSTANT);
        RouteRng(SmallRng::seed_from_u64(seed))
    }

    /// Seed directly, for callers without a shipment id.
    pub fn from_seed(seed: u64) -> Self {
        RouteRng(SmallRng::seed_from_u64(seed))
    }

    /// Generate a value uniformly in `range`.
    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }

    /// `true` with probability `p` (clamped to [0, 1]).
    #[inline]
    pub fn gen_bool(&mut self, p: f64) -> bool {
        self.0.gen_bool(p.clamp(0.0, 1.0))
    }
}
