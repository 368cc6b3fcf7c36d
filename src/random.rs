//! Random sources and unbiased sampling.
//!
//! Everything that consumes randomness takes an injected
//! `RngCore + CryptoRng`. Production code uses [`OsRng`]. The deterministic
//! `SeededRandom` replays a fixed ChaCha20 keystream; it is compiled only for
//! this crate's tests or with the `test-util` feature.
#![cfg_attr(not(feature = "test-util"), doc = "")]
#![cfg_attr(not(feature = "test-util"), doc = "```compile_fail")]
#![cfg_attr(
    not(feature = "test-util"),
    doc = "let rng = keysmith::random::SeededRandom::from_label(\"fixed\");"
)]
#![cfg_attr(not(feature = "test-util"), doc = "```")]

use crate::error::{Error, Result};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

pub use rand::rngs::OsRng;

#[cfg(any(test, feature = "test-util"))]
pub use seeded::SeededRandom;

const SAMPLER_BUFFER_LEN: usize = 256;

#[cfg(any(test, feature = "test-util"))]
mod seeded {
    use blake2::{Blake2s256, Digest};
    use chacha20::ChaCha20;
    use chacha20::cipher::{KeyIvInit, StreamCipher};
    use rand::{CryptoRng, RngCore};
    use zeroize::Zeroizing;

    /// Deterministic ChaCha20 keystream. Never use it for real credentials.
    pub struct SeededRandom {
        cipher: ChaCha20,
    }

    impl SeededRandom {
        pub fn from_seed(seed: [u8; 32]) -> Self {
            let key = Zeroizing::new(seed);
            Self {
                cipher: ChaCha20::new((&*key).into(), &[0u8; 12].into()),
            }
        }

        pub fn from_label(label: &str) -> Self {
            let mut hasher = Blake2s256::new();
            hasher.update(label.as_bytes());
            let mut seed = Zeroizing::new([0u8; 32]);
            seed.copy_from_slice(&hasher.finalize());
            Self::from_seed(*seed)
        }
    }

    impl RngCore for SeededRandom {
        fn next_u32(&mut self) -> u32 {
            let mut bytes = [0u8; 4];
            self.fill_bytes(&mut bytes);
            u32::from_le_bytes(bytes)
        }

        fn next_u64(&mut self) -> u64 {
            let mut bytes = [0u8; 8];
            self.fill_bytes(&mut bytes);
            u64::from_le_bytes(bytes)
        }

        fn fill_bytes(&mut self, dest: &mut [u8]) {
            dest.fill(0);
            self.cipher.apply_keystream(dest);
        }

        fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
            self.fill_bytes(dest);
            Ok(())
        }
    }

    impl CryptoRng for SeededRandom {}
}

pub(crate) fn fill<R: RngCore + CryptoRng>(rng: &mut R, dest: &mut [u8]) -> Result<()> {
    rng.try_fill_bytes(dest).map_err(Error::random_source)
}

/// Draws uniform indices from a buffered byte stream with rejection sampling.
pub(crate) struct Sampler<'r, R> {
    rng: &'r mut R,
    buffer: Zeroizing<Vec<u8>>,
    pos: usize,
}

impl<'r, R: RngCore + CryptoRng> Sampler<'r, R> {
    pub(crate) fn new(rng: &'r mut R) -> Self {
        Self {
            rng,
            buffer: Zeroizing::new(vec![0u8; SAMPLER_BUFFER_LEN]),
            pos: SAMPLER_BUFFER_LEN,
        }
    }

    fn next_u32(&mut self) -> Result<u32> {
        if self.pos + 4 > self.buffer.len() {
            fill(&mut *self.rng, &mut self.buffer)?;
            self.pos = 0;
        }

        let bytes = &self.buffer[self.pos..self.pos + 4];
        self.pos += 4;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Uniform integer in `0..bound`. `bound` must be in `1..=u32::MAX`.
    pub(crate) fn index_below(&mut self, bound: usize) -> Result<usize> {
        debug_assert!(bound > 0 && bound as u64 <= u32::MAX as u64);

        let bound = bound as u64;
        let accept_below = (1u64 << 32) / bound * bound;

        loop {
            let value = self.next_u32()? as u64;
            if value < accept_below {
                return Ok((value % bound) as usize);
            }
        }
    }

    pub(crate) fn choose<T: Copy>(&mut self, items: &[T]) -> Result<T> {
        let index = self.index_below(items.len())?;
        Ok(items[index])
    }

    /// Fisher-Yates: every permutation is equally likely.
    pub(crate) fn shuffle<T>(&mut self, items: &mut [T]) -> Result<()> {
        for i in (1..items.len()).rev() {
            let j = self.index_below(i + 1)?;
            items.swap(i, j);
        }
        Ok(())
    }
}
