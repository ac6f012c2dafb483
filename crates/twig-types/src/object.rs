use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha1::{Digest, Sha1};

use crate::error::TypeError;

/// Length of an object id in bytes.
pub const OID_LEN: usize = 20;

/// Length of an object id in hex characters.
pub const OID_HEX_LEN: usize = OID_LEN * 2;

/// Content-addressed identifier for a blob, tree, commit or tag.
///
/// An `ObjectId` is the SHA-1 digest of the object's canonical encoding
/// (`"<kind> <len>\0<payload>"`). Identical content always produces the same
/// id, so two tree entries with equal ids are known to hold equal bytes
/// without reading them.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId([u8; OID_LEN]);

impl ObjectId {
    /// Hash an object payload together with its kind header.
    pub fn hash_object(kind: &str, payload: &[u8]) -> Self {
        let mut hasher = Sha1::new();
        hasher.update(kind.as_bytes());
        hasher.update(b" ");
        hasher.update(payload.len().to_string().as_bytes());
        hasher.update([0u8]);
        hasher.update(payload);
        let mut out = [0u8; OID_LEN];
        out.copy_from_slice(&hasher.finalize());
        Self(out)
    }

    /// Create an `ObjectId` from a pre-computed digest.
    pub const fn from_hash(hash: [u8; OID_LEN]) -> Self {
        Self(hash)
    }

    /// Read an id from the first 20 bytes of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, TypeError> {
        let raw: [u8; OID_LEN] = bytes
            .get(..OID_LEN)
            .and_then(|b| b.try_into().ok())
            .ok_or(TypeError::InvalidLength {
                expected: OID_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(raw))
    }

    /// The null object id (all zeros). Represents "no object".
    pub const fn null() -> Self {
        Self([0u8; OID_LEN])
    }

    /// Returns `true` if this is the null object id.
    pub fn is_null(&self) -> bool {
        self.0 == [0u8; OID_LEN]
    }

    /// The raw digest bytes.
    pub fn as_bytes(&self) -> &[u8; OID_LEN] {
        &self.0
    }

    /// Lowercase hex encoding (40 characters).
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short hex representation (first 8 characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a 40-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        let bytes = hex::decode(s).map_err(|e| TypeError::InvalidHex(e.to_string()))?;
        if bytes.len() != OID_LEN {
            return Err(TypeError::InvalidLength {
                expected: OID_LEN,
                actual: bytes.len(),
            });
        }
        Self::from_slice(&bytes)
    }

    /// Returns `true` if `s` looks like a full hex object id.
    pub fn is_hex_id(s: &str) -> bool {
        s.len() == OID_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self.short_hex())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}

impl From<[u8; OID_LEN]> for ObjectId {
    fn from(bytes: [u8; OID_LEN]) -> Self {
        Self(bytes)
    }
}

// Ids travel to the presentation layer as hex strings.
impl Serialize for ObjectId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ObjectId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
