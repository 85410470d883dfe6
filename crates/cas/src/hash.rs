//! Content hashes: BLAKE3 truncated to 128 bits, as 32 lowercase hex chars.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const HASH_BYTES: usize = 16;
const HASH_CHARS: usize = HASH_BYTES * 2;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentHash(String);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HashError {
    #[error("invalid hash length: expected 32 hex chars, got {0}")]
    InvalidLength(usize),

    #[error("invalid hex character in hash")]
    InvalidHex,
}

impl ContentHash {
    pub fn of(data: &[u8]) -> Self {
        let digest = blake3::hash(data);
        Self(hex::encode(&digest.as_bytes()[..HASH_BYTES]))
    }

    /// First two characters; names the shard directory.
    pub fn prefix(&self) -> &str {
        &self.0[..2]
    }

    /// Everything after the prefix; names the object file.
    pub fn remainder(&self) -> &str {
        &self.0[2..]
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ContentHash {
    type Err = HashError;

    /// Accepts either case; stored lowercase.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.len() != HASH_CHARS {
            return Err(HashError::InvalidLength(s.len()));
        }
        if !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HashError::InvalidHex);
        }
        Ok(Self(s.to_lowercase()))
    }
}

impl TryFrom<String> for ContentHash {
    type Error = HashError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<ContentHash> for String {
    fn from(hash: ContentHash) -> Self {
        hash.0
    }
}

impl AsRef<str> for ContentHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_are_short_hex_and_stable() {
        let hash = ContentHash::of(b"MThd\0\0\0\x06\0\x01\0\x01\x01\xe0");
        assert_eq!(hash.as_str().len(), HASH_CHARS);
        assert!(hash.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, ContentHash::of(b"MThd\0\0\0\x06\0\x01\0\x01\x01\xe0"));
        assert_ne!(hash, ContentHash::of(b"MThd"));
    }

    #[test]
    fn sharding_split() {
        let hash = ContentHash::of(b"score");
        assert_eq!(format!("{}{}", hash.prefix(), hash.remainder()), hash.to_string());
    }

    #[test]
    fn parsing_normalizes_case() {
        let hash: ContentHash = "ABCDEF01234567890123456789ABCDEF".parse().unwrap();
        assert_eq!(hash.as_str(), "abcdef01234567890123456789abcdef");
    }

    #[test]
    fn parsing_rejects_malformed() {
        assert_eq!("abc".parse::<ContentHash>(), Err(HashError::InvalidLength(3)));
        assert_eq!(
            "g".repeat(HASH_CHARS).parse::<ContentHash>(),
            Err(HashError::InvalidHex)
        );
    }

    #[test]
    fn deserialization_validates() {
        let ok: ContentHash =
            serde_json::from_str("\"0123456789abcdef0123456789abcdef\"").unwrap();
        assert_eq!(ok.prefix(), "01");
        assert!(serde_json::from_str::<ContentHash>("\"not-a-hash\"").is_err());
    }
}
