//! Byte quantities such as `64MB` or `1GiB`.
//!
//! Units are binary multiples regardless of spelling: `KB`, `KiB` and `K`
//! all mean 1024 bytes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

const KIB: u64 = 1024;
const MIB: u64 = 1024 * KIB;
const GIB: u64 = 1024 * MIB;
const TIB: u64 = 1024 * GIB;

/// A quantity of bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ByteSize(u64);

/// Error returned when a byte quantity cannot be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ByteSizeParseError {
    /// The input was empty.
    #[error("empty byte quantity")]
    Empty,
    /// The numeric part was missing or invalid.
    #[error("invalid number in byte quantity: {0}")]
    InvalidNumber(String),
    /// The unit suffix is not recognised.
    #[error("unknown unit in byte quantity: {0}")]
    UnknownUnit(String),
    /// The quantity does not fit in 64 bits.
    #[error("byte quantity overflows: {0}")]
    Overflow(String),
}

impl ByteSize {
    /// One kibibyte.
    pub const KIB: Self = Self(KIB);
    /// One mebibyte.
    pub const MIB: Self = Self(MIB);
    /// One gibibyte.
    pub const GIB: Self = Self(GIB);

    /// Create a quantity from a raw byte count.
    #[must_use]
    pub const fn bytes(n: u64) -> Self {
        Self(n)
    }

    /// Create a quantity of `n` mebibytes, saturating on overflow.
    #[must_use]
    pub const fn mib(n: u64) -> Self {
        Self(n.saturating_mul(MIB))
    }

    /// Create a quantity of `n` gibibytes, saturating on overflow.
    #[must_use]
    pub const fn gib(n: u64) -> Self {
        Self(n.saturating_mul(GIB))
    }

    /// The raw byte count.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<u64> for ByteSize {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl FromStr for ByteSize {
    type Err = ByteSizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ByteSizeParseError::Empty);
        }

        let split = trimmed
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(trimmed.len());
        let (digits, unit) = trimmed.split_at(split);
        if digits.is_empty() {
            return Err(ByteSizeParseError::InvalidNumber(trimmed.to_owned()));
        }
        let value: u64 = digits
            .parse()
            .map_err(|_| ByteSizeParseError::Overflow(trimmed.to_owned()))?;

        let multiplier = match unit.trim().to_ascii_lowercase().as_str() {
            "" | "b" => 1,
            "k" | "kb" | "kib" => KIB,
            "m" | "mb" | "mib" => MIB,
            "g" | "gb" | "gib" => GIB,
            "t" | "tb" | "tib" => TIB,
            other => return Err(ByteSizeParseError::UnknownUnit(other.to_owned())),
        };

        value
            .checked_mul(multiplier)
            .map(Self)
            .ok_or_else(|| ByteSizeParseError::Overflow(trimmed.to_owned()))
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let n = self.0;
        for (unit, scale) in [("TiB", TIB), ("GiB", GIB), ("MiB", MIB), ("KiB", KIB)] {
            if n != 0 && n % scale == 0 {
                return write!(f, "{}{unit}", n / scale);
            }
        }
        write!(f, "{n}B")
    }
}

impl Serialize for ByteSize {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) => Ok(Self(n)),
            Raw::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}
