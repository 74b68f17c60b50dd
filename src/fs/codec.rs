//! Byte layout shared by on-block records and request frames: fixed-width
//! integers, little endian, and NUL padded name fields.

use std::borrow::Cow;
use std::fmt;

use bincode::Options;
use serde::de::{self, SeqAccess, Visitor};
use serde::ser::SerializeTuple;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::fs::config::MAX_FILE_NAME;

pub fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

/// A NUL padded, fixed-width name field.
#[derive(Clone, PartialEq, Eq)]
pub struct PathName([u8; MAX_FILE_NAME]);

impl PathName {
    /// `None` if `name` does not fit in the field.
    pub fn new(name: &str) -> Option<Self> {
        Self::from_bytes(name.as_bytes())
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_FILE_NAME {
            return None;
        }
        let mut raw = [0u8; MAX_FILE_NAME];
        raw[..bytes.len()].copy_from_slice(bytes);
        Some(Self(raw))
    }

    /// The name up to its first NUL.
    pub fn as_bytes(&self) -> &[u8] {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(MAX_FILE_NAME);
        &self.0[..len]
    }

    pub fn as_str(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(self.as_bytes())
    }
}

impl Default for PathName {
    fn default() -> Self {
        Self([0; MAX_FILE_NAME])
    }
}

impl fmt::Debug for PathName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl Serialize for PathName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(MAX_FILE_NAME)?;
        for byte in &self.0 {
            tuple.serialize_element(byte)?;
        }
        tuple.end()
    }
}

impl<'de> Deserialize<'de> for PathName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PathVisitor;

        impl<'de> Visitor<'de> for PathVisitor {
            type Value = PathName;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{MAX_FILE_NAME} name bytes")
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<PathName, A::Error> {
                let mut raw = [0u8; MAX_FILE_NAME];
                for (i, byte) in raw.iter_mut().enumerate() {
                    *byte = seq
                        .next_element()?
                        .ok_or_else(|| de::Error::invalid_length(i, &self))?;
                }
                Ok(PathName(raw))
            }
        }

        deserializer.deserialize_tuple(MAX_FILE_NAME, PathVisitor)
    }
}
