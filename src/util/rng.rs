// Copyright (c) 2024 Mike Tsao

//! Provides the seedable random-number generator that lanes and the scene
//! walker draw from.

use byteorder::{BigEndian, ByteOrder};
use delegate::delegate;

/// A pseudorandom number generator (PRNG) for applications that don't require
/// cryptographically secure random numbers.
#[derive(Clone, Debug)]
pub struct Rng(oorandom::Rand64);
impl Default for Rng {
    fn default() -> Self {
        // We want to panic if this fails, because it indicates that a core OS
        // facility isn't functioning.
        Self::new_with_seed(Self::generate_seed().unwrap())
    }
}
#[allow(missing_docs)]
impl Rng {
    /// Pass the same number to [Rng::new_with_seed()] to get the same stream
    /// back again. Good for reproducing a performance.
    pub fn new_with_seed(seed: u128) -> Self {
        Self(oorandom::Rand64::new(seed))
    }

    /// Seeded if a seed is given, otherwise from the OS.
    pub fn new_with_optional_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::default, |seed| Self::new_with_seed(seed as u128))
    }

    /// Create a sufficiently high-quality random number that's suitable for
    /// [Rng].
    pub fn generate_seed() -> anyhow::Result<u128> {
        let mut bytes = [0u8; 16];

        getrandom::getrandom(&mut bytes)?;
        Ok(BigEndian::read_u128(&bytes))
    }

    delegate! {
        to self.0 {
            pub fn rand_u64(&mut self) -> u64;
            pub fn rand_float(&mut self) -> f64;
            pub fn rand_range(&mut self, range: core::ops::Range<u64>) -> u64;
        }
    }

    /// A uniformly distributed value in `low..=high`.
    pub fn rand_uniform(&mut self, low: f64, high: f64) -> f64 {
        low + (high - low) * self.rand_float()
    }
}

/// Derives a lane's seed from the global seed and the lane's name.
///
/// This is 64-bit FNV-1a over the global seed's eight little-endian bytes
/// followed by the lane name's UTF-8 bytes. It must never change, because
/// recorded performances are reproduced by reseeding with it.
pub fn derive_lane_seed(lane_name: &str, global_seed: u64) -> u64 {
    const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    global_seed
        .to_le_bytes()
        .iter()
        .chain(lane_name.as_bytes())
        .fold(FNV_OFFSET_BASIS, |hash, byte| {
            (hash ^ *byte as u64).wrapping_mul(FNV_PRIME)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use more_asserts::{assert_ge, assert_lt};

    #[test]
    fn mainline() {
        let mut r = Rng::default();
        assert_ne!(r.rand_u64(), r.rand_u64());
    }

    #[test]
    fn reproducible_stream() {
        let mut r1 = Rng::new_with_seed(1);
        let mut r2 = Rng::new_with_seed(2);
        assert!(
            (0..100).any(|_| r1.rand_u64() != r2.rand_u64()),
            "RNGs with different seeds should produce different streams."
        );

        let mut r1 = Rng::new_with_optional_seed(Some(1));
        let mut r2 = Rng::new_with_seed(1);
        assert!(
            (0..100).all(|_| r1.rand_u64() == r2.rand_u64()),
            "RNGs with same seeds should produce same streams."
        );
    }

    #[test]
    fn uniform_stays_in_range() {
        let mut r = Rng::new_with_seed(7);
        for _ in 0..1000 {
            let v = r.rand_uniform(-0.08, 0.08);
            assert_ge!(v, -0.08);
            assert_lt!(v, 0.08);
        }
    }

    #[test]
    fn lane_seed_is_stable() {
        // Pinned so that a change to the derivation can't slip by unnoticed.
        assert_eq!(derive_lane_seed("", 0), 0xa8c7_f832_281a_39c5);
        assert_eq!(derive_lane_seed("cutoff", 42), derive_lane_seed("cutoff", 42));
        assert_ne!(derive_lane_seed("cutoff", 42), derive_lane_seed("cutoff", 43));
        assert_ne!(derive_lane_seed("cutoff", 42), derive_lane_seed("resonance", 42));
    }
}
