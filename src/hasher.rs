//! Salted, adaptive-cost password hashing.
//!
//! Hashes are self-describing strings: bcrypt's modular crypt format
//! (`$2b$12$<salt><digest>`) or an Argon2 PHC string
//! (`$argon2id$v=19$m=..,t=..,p=..$<salt>$<digest>`). Verification reads the
//! scheme, cost and salt back out of the stored string, so hashes made with
//! older settings keep verifying after the defaults change.

use crate::error::{Error, Result};
use crate::kdf::Argon2Config;
use crate::random::{self, OsRng};
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use rand::{CryptoRng, RngCore};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_COST: u32 = bcrypt::DEFAULT_COST;
pub const MIN_COST: u32 = 4;
pub const MAX_COST: u32 = 31;

/// bcrypt ignores everything past this many bytes of input.
pub const BCRYPT_MAX_PASSWORD_BYTES: usize = 72;

const SALT_LEN: usize = 16;
const BCRYPT_SALT_CHARS: usize = 22;
const BCRYPT_DIGEST_CHARS: usize = 31;
const BCRYPT_ALPHABET: &[u8] = b"./ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const BCRYPT_PREFIXES: [&str; 3] = ["2a", "2b", "2y"];
const ARGON2_IDENT: &str = "argon2id";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Bcrypt,
    Argon2id,
}

impl Scheme {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bcrypt => "bcrypt",
            Self::Argon2id => "argon2id",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashConfig {
    pub scheme: Scheme,
    /// bcrypt work factor; each step doubles the time per hash.
    pub cost: u32,
    pub argon2: Argon2Config,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::Bcrypt,
            cost: DEFAULT_COST,
            argon2: Argon2Config::default(),
        }
    }
}

impl HashConfig {
    pub fn bcrypt(cost: u32) -> Self {
        Self {
            cost,
            ..Self::default()
        }
    }

    pub fn argon2id(argon2: Argon2Config) -> Self {
        Self {
            scheme: Scheme::Argon2id,
            argon2,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self.scheme {
            Scheme::Bcrypt if !(MIN_COST..=MAX_COST).contains(&self.cost) => {
                Err(Error::InvalidCost {
                    cost: self.cost,
                    min: MIN_COST,
                    max: MAX_COST,
                })
            }
            Scheme::Bcrypt => Ok(()),
            Scheme::Argon2id => self.argon2.params().map(|_| ()),
        }
    }
}

/// An encoded, salted hash. Only produced by hashing or by a successful parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialHash {
    encoded: String,
    scheme: Scheme,
}

impl CredentialHash {
    pub fn parse(encoded: &str) -> Result<Self> {
        let scheme = if encoded.starts_with("$argon2") {
            parse_argon2(encoded)?;
            Scheme::Argon2id
        } else {
            parse_bcrypt(encoded)?;
            Scheme::Bcrypt
        };

        Ok(Self {
            encoded: encoded.to_string(),
            scheme,
        })
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    pub fn into_string(self) -> String {
        self.encoded
    }

    /// Recomputes the digest with the embedded salt and parameters and
    /// compares in constant time. A wrong password is `Ok(false)`.
    pub fn verify(&self, password: &str) -> Result<bool> {
        match self.scheme {
            // Hashes from truncating implementations still match long inputs.
            Scheme::Bcrypt => bcrypt::verify(password.as_bytes(), &self.encoded)
                .map_err(|e| Error::MalformedHash(e.to_string())),
            Scheme::Argon2id => {
                let parsed = PasswordHash::new(&self.encoded)
                    .map_err(|e| Error::MalformedHash(e.to_string()))?;
                match Argon2::default().verify_password(password.as_bytes(), &parsed) {
                    Ok(()) => Ok(true),
                    Err(password_hash::Error::Password) => Ok(false),
                    Err(e) => Err(Error::MalformedHash(e.to_string())),
                }
            }
        }
    }
}

impl fmt::Display for CredentialHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoded)
    }
}

impl FromStr for CredentialHash {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

fn parse_bcrypt(encoded: &str) -> Result<()> {
    let fields: Vec<&str> = encoded.split('$').collect();
    let [empty, prefix, cost, salt_and_digest] = fields.as_slice() else {
        return Err(Error::MalformedHash(
            "expected $<algorithm>$<cost>$<salt><digest>".into(),
        ));
    };

    if !empty.is_empty() || !BCRYPT_PREFIXES.contains(prefix) {
        return Err(Error::MalformedHash(format!(
            "unrecognised algorithm tag {:?}",
            prefix
        )));
    }

    let cost_valid = cost.len() == 2
        && cost
            .parse::<u32>()
            .is_ok_and(|c| (MIN_COST..=MAX_COST).contains(&c));
    if !cost_valid {
        return Err(Error::MalformedHash(format!("invalid cost field {:?}", cost)));
    }

    if salt_and_digest.len() != BCRYPT_SALT_CHARS + BCRYPT_DIGEST_CHARS {
        return Err(Error::MalformedHash(format!(
            "salt and digest must be {} characters, found {}",
            BCRYPT_SALT_CHARS + BCRYPT_DIGEST_CHARS,
            salt_and_digest.len()
        )));
    }

    if !salt_and_digest.bytes().all(|b| BCRYPT_ALPHABET.contains(&b)) {
        return Err(Error::MalformedHash(
            "salt and digest contain characters outside the bcrypt alphabet".into(),
        ));
    }

    Ok(())
}

fn parse_argon2(encoded: &str) -> Result<()> {
    let parsed = PasswordHash::new(encoded).map_err(|e| Error::MalformedHash(e.to_string()))?;

    if parsed.algorithm.as_str() != ARGON2_IDENT {
        return Err(Error::MalformedHash(format!(
            "unrecognised algorithm tag {:?}",
            parsed.algorithm.as_str()
        )));
    }
    if parsed.salt.is_none() || parsed.hash.is_none() {
        return Err(Error::MalformedHash("missing salt or digest".into()));
    }
    argon2::Params::try_from(&parsed).map_err(|e| Error::MalformedHash(e.to_string()))?;

    Ok(())
}

pub struct CredentialHasher<R = OsRng> {
    config: HashConfig,
    rng: R,
}

impl CredentialHasher<OsRng> {
    pub fn new() -> Self {
        Self {
            config: HashConfig::default(),
            rng: OsRng,
        }
    }

    pub fn with_config(config: HashConfig) -> Result<Self> {
        Self::with_rng(config, OsRng)
    }
}

impl Default for CredentialHasher<OsRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> CredentialHasher<R> {
    pub fn config(&self) -> &HashConfig {
        &self.config
    }

    pub fn verify(&self, password: &str, stored: &CredentialHash) -> Result<bool> {
        stored.verify(password)
    }
}

impl<R: RngCore + CryptoRng> CredentialHasher<R> {
    pub fn with_rng(config: HashConfig, rng: R) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, rng })
    }

    /// Hashes under a fresh random salt; equal inputs give different outputs.
    pub fn hash(&mut self, password: &str) -> Result<CredentialHash> {
        let mut salt = [0u8; SALT_LEN];
        random::fill(&mut self.rng, &mut salt)?;

        let encoded = match self.config.scheme {
            Scheme::Bcrypt => {
                if password.len() > BCRYPT_MAX_PASSWORD_BYTES {
                    return Err(Error::PasswordTooLong {
                        length: password.len(),
                        max: BCRYPT_MAX_PASSWORD_BYTES,
                        scheme: Scheme::Bcrypt.name(),
                    });
                }
                bcrypt::hash_with_salt(password.as_bytes(), self.config.cost, salt)
                    .map_err(|e| Error::Hashing(e.to_string()))?
                    .format_for_version(bcrypt::Version::TwoB)
            }
            Scheme::Argon2id => {
                let salt = SaltString::encode_b64(&salt)
                    .map_err(|e| Error::Hashing(e.to_string()))?;
                self.config
                    .argon2
                    .hasher()?
                    .hash_password(password.as_bytes(), &salt)
                    .map_err(|e| Error::Hashing(e.to_string()))?
                    .to_string()
            }
        };

        Ok(CredentialHash {
            encoded,
            scheme: self.config.scheme,
        })
    }
}

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    let mut hasher = CredentialHasher::with_config(HashConfig::bcrypt(cost))?;
    Ok(hasher.hash(password)?.into_string())
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<bool> {
    CredentialHash::parse(stored_hash)?.verify(password)
}
