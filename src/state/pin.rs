//! Human-typeable session PIN codes.
//!
//! A PIN is six characters drawn from an alphabet without the easily confused
//! glyphs (`0`/`O`, `1`/`I`/`L`). Parsing is case-insensitive and ignores
//! surrounding whitespace so players can type whatever the host reads aloud.

use std::{fmt, str::FromStr};

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Number of characters in a PIN.
pub const PIN_LENGTH: usize = 6;
const PIN_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

/// Code used by players to locate a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Pin([u8; PIN_LENGTH]);

/// Reasons a user-supplied PIN can be rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PinParseError {
    /// Input does not have exactly [`PIN_LENGTH`] characters.
    #[error("pin must be {PIN_LENGTH} characters long (got {0})")]
    Length(usize),
    /// Input contains a character outside the PIN alphabet.
    #[error("pin contains invalid character `{0}`")]
    InvalidCharacter(char),
}

impl Pin {
    /// Draw a uniformly random PIN from `rng`.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut code = [0u8; PIN_LENGTH];
        for slot in &mut code {
            *slot = PIN_ALPHABET[rng.random_range(0..PIN_ALPHABET.len())];
        }
        Self(code)
    }

    /// Borrow the canonical (upper-case) representation.
    pub fn as_str(&self) -> &str {
        // Every byte comes from the ASCII alphabet.
        std::str::from_utf8(&self.0).unwrap_or_default()
    }
}

impl FromStr for Pin {
    type Err = PinParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let count = trimmed.chars().count();
        if count != PIN_LENGTH {
            return Err(PinParseError::Length(count));
        }

        let mut code = [0u8; PIN_LENGTH];
        for (slot, c) in code.iter_mut().zip(trimmed.chars()) {
            let upper = c.to_ascii_uppercase();
            if !upper.is_ascii() || !PIN_ALPHABET.contains(&(upper as u8)) {
                return Err(PinParseError::InvalidCharacter(c));
            }
            *slot = upper as u8;
        }

        Ok(Self(code))
    }
}

impl fmt::Display for Pin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Pin {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pin {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Source of candidate PINs for the session registry.
pub trait PinSource: Send + Sync {
    /// Produce the next candidate PIN; collisions are handled by the caller.
    fn next_pin(&self) -> Pin;
}

/// Default PIN source backed by the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomPins;

impl PinSource for RandomPins {
    fn next_pin(&self) -> Pin {
        Pin::random(&mut rand::rng())
    }
}
