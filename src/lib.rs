pub mod charset;
pub mod error;
pub mod generator;
pub mod hasher;
pub mod kdf;
pub mod random;

pub use charset::CharacterClass;
pub use error::{Error, Result};
pub use generator::{
    generate_password, ClassRequirement, Password, PasswordGenerator, PasswordPolicy,
    DEFAULT_LENGTH, MAX_LENGTH, MIN_LENGTH,
};
pub use hasher::{
    hash_password, verify_password, CredentialHash, CredentialHasher, HashConfig, Scheme,
    DEFAULT_COST,
};
pub use kdf::Argon2Config;
pub use random::OsRng;
#[cfg(feature = "test-util")]
pub use random::SeededRandom;
