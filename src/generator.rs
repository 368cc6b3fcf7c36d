use crate::charset::CharacterClass;
use crate::error::{Error, Result};
use crate::random::{OsRng, Sampler};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

pub const MIN_LENGTH: usize = 8;
pub const DEFAULT_LENGTH: usize = 16;
pub const MAX_LENGTH: usize = 4096;

/// Generated plaintext. The buffer is wiped when dropped.
pub type Password = Zeroizing<String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassRequirement {
    pub class: CharacterClass,
    pub minimum: usize,
}

/// Composition rules for generated passwords.
///
/// Every class listed in `requirements` contributes its alphabet to the
/// filler pool; `minimum` characters of that class are always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordPolicy {
    pub min_length: usize,
    pub requirements: Vec<ClassRequirement>,
    pub exclude_ambiguous: bool,
}

impl Default for PasswordPolicy {
    fn default() -> Self {
        Self {
            min_length: MIN_LENGTH,
            requirements: CharacterClass::ALL
                .into_iter()
                .map(|class| ClassRequirement { class, minimum: 1 })
                .collect(),
            exclude_ambiguous: false,
        }
    }
}

impl PasswordPolicy {
    pub fn empty(min_length: usize) -> Self {
        Self {
            min_length,
            requirements: Vec::new(),
            exclude_ambiguous: false,
        }
    }

    pub fn require(mut self, class: CharacterClass, minimum: usize) -> Self {
        self.requirements.push(ClassRequirement { class, minimum });
        self
    }

    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = min_length;
        self
    }

    pub fn without_ambiguous(mut self) -> Self {
        self.exclude_ambiguous = true;
        self
    }

    pub fn reserved(&self) -> usize {
        self.requirements.iter().map(|r| r.minimum).sum()
    }

    pub fn validate(&self) -> Result<()> {
        if self.requirements.is_empty() {
            return Err(Error::InvalidPolicy(
                "at least one character class is required".into(),
            ));
        }

        for (i, requirement) in self.requirements.iter().enumerate() {
            if self.requirements[..i]
                .iter()
                .any(|r| r.class == requirement.class)
            {
                return Err(Error::InvalidPolicy(format!(
                    "{} class listed more than once",
                    requirement.class
                )));
            }
        }

        if self.min_length == 0 || self.min_length > MAX_LENGTH {
            return Err(Error::InvalidPolicy(format!(
                "minimum length must be between 1 and {}",
                MAX_LENGTH
            )));
        }

        let reserved = self.reserved();
        if reserved > self.min_length {
            return Err(Error::InvalidPolicy(format!(
                "{} reserved characters exceed the minimum length of {}",
                reserved, self.min_length
            )));
        }

        Ok(())
    }
}

struct Pool {
    chars: Vec<u8>,
    minimum: usize,
}

pub struct PasswordGenerator<R = OsRng> {
    rng: R,
    min_length: usize,
    pools: Vec<Pool>,
    alphabet: Vec<u8>,
}

impl PasswordGenerator<OsRng> {
    pub fn new() -> Self {
        Self::build(&PasswordPolicy::default(), OsRng)
    }
}

impl Default for PasswordGenerator<OsRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: RngCore + CryptoRng> PasswordGenerator<R> {
    pub fn with_rng(rng: R) -> Self {
        Self::build(&PasswordPolicy::default(), rng)
    }

    pub fn with_policy(policy: PasswordPolicy, rng: R) -> Result<Self> {
        policy.validate()?;
        Ok(Self::build(&policy, rng))
    }

    fn build(policy: &PasswordPolicy, rng: R) -> Self {
        let pools: Vec<Pool> = policy
            .requirements
            .iter()
            .map(|r| Pool {
                chars: r.class.chars(policy.exclude_ambiguous),
                minimum: r.minimum,
            })
            .collect();
        let alphabet = pools.iter().flat_map(|p| p.chars.iter().copied()).collect();

        Self {
            rng,
            min_length: policy.min_length,
            pools,
            alphabet,
        }
    }

    pub fn min_length(&self) -> usize {
        self.min_length
    }

    /// Union of every class alphabet the generator may draw from.
    pub fn alphabet(&self) -> &[u8] {
        &self.alphabet
    }

    pub fn entropy_bits(&self, length: usize) -> f64 {
        length as f64 * (self.alphabet.len() as f64).log2()
    }

    /// Reserves each class's guaranteed characters, fills the rest from the
    /// full alphabet, then shuffles so no position reveals its class.
    pub fn generate(&mut self, length: usize) -> Result<Password> {
        if length < self.min_length {
            return Err(Error::InvalidLength {
                length,
                min: self.min_length,
            });
        }
        if length > MAX_LENGTH {
            return Err(Error::LengthTooLarge {
                length,
                max: MAX_LENGTH,
            });
        }

        let mut sampler = Sampler::new(&mut self.rng);
        let mut chars = Zeroizing::new(Vec::with_capacity(length));

        for pool in &self.pools {
            for _ in 0..pool.minimum {
                chars.push(sampler.choose(pool.chars.as_slice())?);
            }
        }

        let filler = length.saturating_sub(chars.len());
        for _ in 0..filler {
            chars.push(sampler.choose(self.alphabet.as_slice())?);
        }

        sampler.shuffle(chars.as_mut_slice())?;

        let mut password = Zeroizing::new(String::with_capacity(length));
        password.extend(chars.iter().map(|&b| char::from(b)));

        Ok(password)
    }
}

pub fn generate_password(length: usize) -> Result<Password> {
    PasswordGenerator::new().generate(length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::SeededRandom;
    use std::collections::{HashMap, HashSet};

    fn class_counts(password: &str) -> HashMap<CharacterClass, usize> {
        let mut counts = HashMap::new();
        for c in password.chars() {
            let class = CharacterClass::of(c)
                .unwrap_or_else(|| panic!("Password contains invalid character: {:?}", c));
            *counts.entry(class).or_insert(0) += 1;
        }
        counts
    }

    fn uniform_policy() -> PasswordPolicy {
        CharacterClass::ALL
            .into_iter()
            .fold(PasswordPolicy::empty(1), |policy, class| {
                policy.require(class, 0)
            })
    }

    #[test]
    fn test_alphabet_size() {
        let generator = PasswordGenerator::new();
        let alphabet = generator.alphabet();
        assert_eq!(alphabet.len(), 94, "Alphabet should have 94 characters");

        let unique: HashSet<_> = alphabet.iter().collect();
        assert_eq!(unique.len(), alphabet.len(), "Alphabet contains duplicates");
    }

    #[test]
    fn test_password_length() {
        let mut generator = PasswordGenerator::new();
        for length in (MIN_LENGTH..=64).chain([128, MAX_LENGTH]) {
            let password = generator.generate(length).unwrap();
            assert_eq!(password.len(), length);
            assert_eq!(password.chars().count(), length);
        }
    }

    #[test]
    fn test_default_length_via_free_function() {
        let password = generate_password(DEFAULT_LENGTH).unwrap();
        assert_eq!(password.len(), 16);
    }

    #[test]
    fn test_every_class_present() {
        let mut generator = PasswordGenerator::new();
        for _ in 0..1_000 {
            let password = generator.generate(MIN_LENGTH).unwrap();
            let counts = class_counts(&password);
            for class in CharacterClass::ALL {
                assert!(
                    counts.get(&class).copied().unwrap_or(0) >= 1,
                    "{:?} is missing a {} character",
                    &*password,
                    class
                );
            }
        }
    }

    #[test]
    fn test_too_short_rejected() {
        for length in 0..MIN_LENGTH {
            let err = generate_password(length).unwrap_err();
            assert!(
                matches!(err, Error::InvalidLength { length: l, min: 8 } if l == length),
                "Unexpected error for length {}: {:?}",
                length,
                err
            );
        }
    }

    #[test]
    fn test_too_long_rejected() {
        let err = generate_password(MAX_LENGTH + 1).unwrap_err();
        assert!(matches!(err, Error::LengthTooLarge { max: MAX_LENGTH, .. }));
    }

    #[test]
    fn test_password_deterministic_with_seed() {
        let mut first = PasswordGenerator::with_rng(SeededRandom::from_seed([42u8; 32]));
        let mut second = PasswordGenerator::with_rng(SeededRandom::from_seed([42u8; 32]));

        let password1 = first.generate(20).unwrap();
        let password2 = second.generate(20).unwrap();
        assert_eq!(*password1, *password2);
    }

    #[test]
    fn test_different_seeds_differ() {
        let mut first = PasswordGenerator::with_rng(SeededRandom::from_label("one"));
        let mut second = PasswordGenerator::with_rng(SeededRandom::from_label("two"));

        assert_ne!(*first.generate(20).unwrap(), *second.generate(20).unwrap());
    }

    #[test]
    fn test_no_repeats_in_ten_thousand_samples() {
        let mut generator = PasswordGenerator::new();
        let mut seen = HashSet::with_capacity(10_000);

        for _ in 0..10_000 {
            let password = generator.generate(16).unwrap();
            assert!(seen.insert(password.to_string()), "Duplicate password");
        }
    }

    #[test]
    fn test_character_frequency_chi_square() {
        let mut generator = PasswordGenerator::with_policy(uniform_policy(), OsRng).unwrap();
        let alphabet = generator.alphabet().to_vec();

        let mut counts: HashMap<char, u64> = HashMap::new();
        let mut total = 0u64;
        for _ in 0..1_000 {
            let password = generator.generate(100).unwrap();
            for c in password.chars() {
                *counts.entry(c).or_insert(0) += 1;
                total += 1;
            }
        }
        assert_eq!(total, 100_000);

        let expected = total as f64 / alphabet.len() as f64;
        let chi_square: f64 = alphabet
            .iter()
            .map(|&b| {
                let observed = counts.get(&char::from(b)).copied().unwrap_or(0) as f64;
                (observed - expected).powi(2) / expected
            })
            .sum();

        // 93 degrees of freedom; 170 is far beyond the 0.0001% tail.
        assert!(chi_square < 170.0, "Chi-square too large: {:.1}", chi_square);
    }

    #[test]
    fn test_class_positions_are_shuffled() {
        let mut generator = PasswordGenerator::new();
        let mut first_position = HashSet::new();
        let mut last_position = HashSet::new();

        for _ in 0..2_000 {
            let password = generator.generate(MIN_LENGTH).unwrap();
            let chars: Vec<char> = password.chars().collect();
            first_position.extend(CharacterClass::of(chars[0]));
            last_position.extend(CharacterClass::of(chars[MIN_LENGTH - 1]));
        }

        assert_eq!(first_position.len(), 4);
        assert_eq!(last_position.len(), 4);
    }

    #[test]
    fn test_length_equal_to_reserved() {
        let policy = PasswordPolicy::default().with_min_length(4);
        let mut generator =
            PasswordGenerator::with_policy(policy, SeededRandom::from_label("four")).unwrap();

        let password = generator.generate(4).unwrap();
        assert_eq!(password.len(), 4);

        let counts = class_counts(&password);
        for class in CharacterClass::ALL {
            assert_eq!(counts.get(&class), Some(&1));
        }
    }

    #[test]
    fn test_custom_requirements() {
        let policy = PasswordPolicy::empty(10)
            .require(CharacterClass::Digit, 3)
            .require(CharacterClass::Symbol, 2)
            .require(CharacterClass::Lowercase, 0);
        let mut generator = PasswordGenerator::with_policy(policy, OsRng).unwrap();
        assert_eq!(generator.alphabet().len(), 10 + 32 + 26);

        for _ in 0..200 {
            let password = generator.generate(12).unwrap();
            let counts = class_counts(&password);
            assert!(counts.get(&CharacterClass::Digit).copied().unwrap_or(0) >= 3);
            assert!(counts.get(&CharacterClass::Symbol).copied().unwrap_or(0) >= 2);
            assert!(!counts.contains_key(&CharacterClass::Uppercase));
        }
    }

    #[test]
    fn test_exclude_ambiguous() {
        let policy = PasswordPolicy::default().without_ambiguous();
        let mut generator = PasswordGenerator::with_policy(policy, OsRng).unwrap();

        for _ in 0..200 {
            let password = generator.generate(32).unwrap();
            assert!(
                password
                    .bytes()
                    .all(|b| !crate::charset::AMBIGUOUS.contains(&b)),
                "{:?} contains an ambiguous character",
                &*password
            );
        }
    }

    #[test]
    fn test_raised_minimum_length() {
        let policy = PasswordPolicy::default().with_min_length(12);
        let mut generator = PasswordGenerator::with_policy(policy, OsRng).unwrap();

        assert!(matches!(
            generator.generate(11),
            Err(Error::InvalidLength { length: 11, min: 12 })
        ));
        assert_eq!(generator.generate(12).unwrap().len(), 12);
    }

    #[test]
    fn test_policy_validation() {
        let cases = vec![
            PasswordPolicy::empty(8),
            PasswordPolicy::default().require(CharacterClass::Digit, 1),
            PasswordPolicy::default().with_min_length(3),
            PasswordPolicy::default().with_min_length(0),
            PasswordPolicy::default().with_min_length(MAX_LENGTH + 1),
        ];

        for policy in cases {
            assert!(
                matches!(policy.validate(), Err(Error::InvalidPolicy(_))),
                "Policy should be rejected: {:?}",
                policy
            );
            assert!(PasswordGenerator::with_policy(policy, OsRng).is_err());
        }

        assert!(PasswordPolicy::default().validate().is_ok());
        assert_eq!(PasswordPolicy::default().reserved(), 4);
    }

    #[test]
    fn test_entropy_bits() {
        let generator = PasswordGenerator::new();
        let entropy = generator.entropy_bits(16);
        assert!((entropy - 16.0 * 94f64.log2()).abs() < 1e-9);
        assert!(entropy > 104.0 && entropy < 105.0);
    }

    #[test]
    fn test_concurrent_generation() {
        let passwords: Vec<String> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| {
                    scope.spawn(|| {
                        let mut generator = PasswordGenerator::new();
                        (0..100)
                            .map(|_| generator.generate(16).unwrap().to_string())
                            .collect::<Vec<_>>()
                    })
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|h| h.join().unwrap())
                .collect()
        });

        let unique: HashSet<_> = passwords.iter().collect();
        assert_eq!(unique.len(), 800);
    }
}
