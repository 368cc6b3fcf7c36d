use crate::error::{Error, Result};
use argon2::{Algorithm, Argon2, Params, Version};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Argon2Config {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Argon2Config {
    pub const INTERACTIVE: Self = Self {
        memory_kib: 19 * 1024,
        iterations: 2,
        parallelism: 1,
    };

    pub const STANDARD: Self = Self {
        memory_kib: 64 * 1024,
        iterations: 3,
        parallelism: 4,
    };

    pub const PARANOID: Self = Self {
        memory_kib: 256 * 1024,
        iterations: 4,
        parallelism: 4,
    };

    pub fn memory_mib(&self) -> u32 {
        self.memory_kib / 1024
    }

    pub(crate) fn params(&self) -> Result<Params> {
        Params::new(
            self.memory_kib,
            self.iterations,
            self.parallelism,
            Some(OUTPUT_LEN),
        )
        .map_err(|e| Error::InvalidParams(e.to_string()))
    }

    pub(crate) fn hasher(&self) -> Result<Argon2<'static>> {
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params()?))
    }
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self::INTERACTIVE
    }
}

const OUTPUT_LEN: usize = 32;
