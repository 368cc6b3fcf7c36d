//! Character classes and their fixed alphabets.
//!
//! The four alphabets are disjoint and together cover the 94 printable,
//! non-space ASCII characters.

use std::fmt;

const LOWERCASE: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPERCASE: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";
const SYMBOLS: &[u8] = b"!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~";

/// Characters that are easily confused with one another in common fonts.
pub const AMBIGUOUS: &[u8] = b"Il1O0o|`'\"";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterClass {
    Lowercase,
    Uppercase,
    Digit,
    Symbol,
}

impl CharacterClass {
    pub const ALL: [Self; 4] = [Self::Lowercase, Self::Uppercase, Self::Digit, Self::Symbol];

    pub const fn alphabet(self) -> &'static [u8] {
        match self {
            Self::Lowercase => LOWERCASE,
            Self::Uppercase => UPPERCASE,
            Self::Digit => DIGITS,
            Self::Symbol => SYMBOLS,
        }
    }

    /// The class alphabet, optionally without [`AMBIGUOUS`] characters.
    pub fn chars(self, exclude_ambiguous: bool) -> Vec<u8> {
        self.alphabet()
            .iter()
            .copied()
            .filter(|c| !exclude_ambiguous || !AMBIGUOUS.contains(c))
            .collect()
    }

    pub fn of(c: char) -> Option<Self> {
        if !c.is_ascii() {
            return None;
        }
        let byte = c as u8;
        Self::ALL
            .into_iter()
            .find(|class| class.alphabet().contains(&byte))
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Lowercase => "lowercase",
            Self::Uppercase => "uppercase",
            Self::Digit => "digit",
            Self::Symbol => "symbol",
        }
    }
}

impl fmt::Display for CharacterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
