use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as Sha2Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

use crate::validation::ValidationError;

/// Sentinel carried by the first entry of a chain in place of a predecessor hash.
pub const GENESIS: &str = "genesis";

/// Number of hex characters shown when a hash is abbreviated for humans.
pub const SHORT_HASH_LEN: usize = 16;

fn hex_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[0-9a-f]{64}$").expect("invalid regex"))
}

/// Hex-encoded SHA-256 digest of an entry's canonical bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryHash(String);

impl EntryHash {
    /// Parses a digest from its 64-character lowercase hex form.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        if !hex_pattern().is_match(&value) {
            return Err(ValidationError::PatternMismatch {
                field: "hash",
                value,
            });
        }
        Ok(Self(value))
    }

    /// Hashes `bytes` with SHA-256.
    pub fn of_bytes(bytes: &[u8]) -> Self {
        let digest = Sha256::digest(bytes);
        Self(hex::encode(digest))
    }

    /// Full hex form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for display.
    pub fn short(&self) -> &str {
        &self.0[..SHORT_HASH_LEN]
    }
}

impl fmt::Display for EntryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for EntryHash {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl AsRef<str> for EntryHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Serialize for EntryHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntryHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(raw).map_err(serde::de::Error::custom)
    }
}

/// Link from an entry to its predecessor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PrevHash {
    /// First entry of the chain.
    Genesis,
    /// Hash of the immediately preceding entry.
    Entry(EntryHash),
}

impl PrevHash {
    /// Parses either the genesis sentinel or a full entry hash.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if value == GENESIS {
            return Ok(PrevHash::Genesis);
        }
        EntryHash::parse(value)
            .map(PrevHash::Entry)
            .map_err(|_| ValidationError::PatternMismatch {
                field: "prev_hash",
                value: value.to_string(),
            })
    }

    /// Wire form: `"genesis"` or the predecessor's hex hash.
    pub fn as_str(&self) -> &str {
        match self {
            PrevHash::Genesis => GENESIS,
            PrevHash::Entry(hash) => hash.as_str(),
        }
    }

    /// Whether this is the genesis sentinel.
    pub fn is_genesis(&self) -> bool {
        matches!(self, PrevHash::Genesis)
    }

    /// Abbreviated form for display (`genesis` or 8 hex characters).
    pub fn short(&self) -> &str {
        match self {
            PrevHash::Genesis => GENESIS,
            PrevHash::Entry(hash) => &hash.as_str()[..8],
        }
    }
}

impl From<EntryHash> for PrevHash {
    fn from(hash: EntryHash) -> Self {
        PrevHash::Entry(hash)
    }
}

impl From<Option<&EntryHash>> for PrevHash {
    fn from(head: Option<&EntryHash>) -> Self {
        match head {
            Some(hash) => PrevHash::Entry(hash.clone()),
            None => PrevHash::Genesis,
        }
    }
}

impl fmt::Display for PrevHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for PrevHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for PrevHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            EntryHash::of_bytes(b"").as_str(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn rejects_uppercase_and_short_hex() {
        assert!(EntryHash::parse("ABCD").is_err());
        assert!(EntryHash::parse("E3B0C44298FC1C149AFBF4C8996FB92427AE41E4649B934CA495991B7852B855").is_err());
    }

    #[test]
    fn prev_hash_round_trips_genesis() {
        let prev = PrevHash::parse("genesis").unwrap();
        assert!(prev.is_genesis());
        assert_eq!(serde_json::to_string(&prev).unwrap(), r#""genesis""#);
    }

    #[test]
    fn prev_hash_rejects_garbage() {
        assert!(PrevHash::parse("not-a-hash").is_err());
        assert!(PrevHash::parse("").is_err());
    }

    #[test]
    fn short_forms() {
        let hash = EntryHash::of_bytes(b"x");
        assert_eq!(hash.short().len(), SHORT_HASH_LEN);
        assert_eq!(PrevHash::from(hash).short().len(), 8);
    }
}
