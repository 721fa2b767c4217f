use serde::{Deserialize, Deserializer, Serialize};
use sha2::{Digest, Sha256};

/// Length of a plugin identity in characters.
pub const PLUGIN_ID_LEN: usize = 32;

/// Hex nibble to identity letter. Digits `0`-`9` land on `a`-`j`, hex
/// letters `a`-`f` on `k`-`p`.
const ID_ALPHABET: [u8; 16] = [
    b'a', b'b', b'c', b'd', b'e', b'f', b'g', b'h', b'i', b'j', // 0-9
    b'k', b'l', b'm', b'n', b'o', b'p', // a-f
];

/// Errors produced when validating a [`PluginId`].
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PluginIdError {
    /// The identity is not exactly 32 characters long.
    #[error("Invalid plugin id length: expected {PLUGIN_ID_LEN} chars, got {0}")]
    InvalidLength(usize),

    /// The identity contains a character outside `a`-`p`.
    #[error("Invalid plugin id character: {0:?}")]
    InvalidChar(char),
}

/// Platform identity of a plugin (32 characters from `a`-`p`).
///
/// Derived purely from the signing key's SubjectPublicKeyInfo DER, so the
/// same key always yields the same identity and a package keeps its identity
/// across releases as long as the key file is kept.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PluginId(String);

impl PluginId {
    /// Derive the identity from a DER-encoded X.509 SubjectPublicKeyInfo.
    pub fn from_spki_der(der: &[u8]) -> Self {
        let digest = Sha256::digest(der);
        Self::from_hex_digest(&hex::encode(digest))
    }

    /// Map the first 32 hex characters of a digest through the identity
    /// alphabet.
    ///
    /// Non-hex input is not expected here; any such character is mapped as
    /// if it were `0` so the result always stays inside the alphabet.
    pub fn from_hex_digest(hex_digest: &str) -> Self {
        let id = hex_digest
            .bytes()
            .take(PLUGIN_ID_LEN)
            .map(|c| {
                let nibble = (c as char).to_digit(16).unwrap_or(0) as usize;
                char::from(ID_ALPHABET[nibble])
            })
            .collect();
        Self(id)
    }

    /// Validate an identity read from configuration or a remote response.
    ///
    /// # Errors
    ///
    /// Returns [`PluginIdError`] if `s` is not 32 characters from `a`-`p`.
    pub fn parse(s: &str) -> Result<Self, PluginIdError> {
        if s.len() != PLUGIN_ID_LEN {
            return Err(PluginIdError::InvalidLength(s.chars().count()));
        }
        if let Some(bad) = s.chars().find(|c| !('a'..='p').contains(c)) {
            return Err(PluginIdError::InvalidChar(bad));
        }
        Ok(Self(s.to_string()))
    }

    /// Return the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl<'de> Deserialize<'de> for PluginId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for PluginId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for PluginId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<&str> for PluginId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
