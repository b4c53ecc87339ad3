use bytes::Bytes;
use data_encoding::HEXLOWER;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

#[derive(PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct B3Digest(Bytes);

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid digest length: {0}")]
    InvalidDigestLen(usize),

    #[error("invalid digest encoding: {0}")]
    InvalidEncoding(#[from] data_encoding::DecodeError),
}

pub const B3_LEN: usize = 32;

impl B3Digest {
    /// Hashes the given contents.
    pub fn of(contents: &[u8]) -> Self {
        blake3::hash(contents).into()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0[..]
    }

    /// Lowercase hex rendering, used for on-disk names.
    pub fn to_hex(&self) -> String {
        HEXLOWER.encode(&self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, Error> {
        HEXLOWER.decode(s.as_bytes())?.try_into()
    }
}

impl From<B3Digest> for bytes::Bytes {
    fn from(val: B3Digest) -> Self {
        val.0
    }
}

impl From<blake3::Hash> for B3Digest {
    fn from(value: blake3::Hash) -> Self {
        Self(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl TryFrom<Vec<u8>> for B3Digest {
    type Error = Error;

    // constructs a [B3Digest] from a [Vec<u8>].
    // Returns an error if the digest has the wrong length.
    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        if value.len() != B3_LEN {
            Err(Error::InvalidDigestLen(value.len()))
        } else {
            Ok(Self(value.into()))
        }
    }
}

impl From<&[u8; B3_LEN]> for B3Digest {
    fn from(value: &[u8; B3_LEN]) -> Self {
        Self(value.to_vec().into())
    }
}

impl Clone for B3Digest {
    fn clone(&self) -> Self {
        Self(self.0.to_owned())
    }
}

impl Serialize for B3Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for B3Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        B3Digest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

impl std::fmt::Display for B3Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b3:{}", self.to_hex())
    }
}

impl std::fmt::Debug for B3Digest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "b3:{}", self.to_hex())
    }
}
