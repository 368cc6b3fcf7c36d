use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Password length must be at least {min} characters (requested {length})")]
    InvalidLength { length: usize, min: usize },

    #[error("Password length must not exceed {max} characters (requested {length})")]
    LengthTooLarge { length: usize, max: usize },

    #[error("Invalid password policy: {0}")]
    InvalidPolicy(String),

    /// The stored hash does not parse into algorithm, cost, salt and digest.
    #[error("Malformed credential hash: {0}")]
    MalformedHash(String),

    #[error("Cost factor {cost} is outside the supported range {min}..={max}")]
    InvalidCost { cost: u32, min: u32, max: u32 },

    #[error("Invalid Argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("Password is {length} bytes but {scheme} only accepts {max}")]
    PasswordTooLong {
        length: usize,
        max: usize,
        scheme: &'static str,
    },

    /// The secure random source failed. Callers must abort; there is no fallback.
    #[error("Secure random source unavailable: {0}")]
    RandomSource(String),

    #[error("Hashing failed: {0}")]
    Hashing(String),
}

impl Error {
    pub(crate) fn random_source(err: rand::Error) -> Self {
        Self::RandomSource(err.to_string())
    }

    pub fn is_malformed_hash(&self) -> bool {
        matches!(self, Self::MalformedHash(_))
    }
}
