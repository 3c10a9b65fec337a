use std::fmt;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Named, versioned schema tag supplied by the application.
///
/// The core treats an entry type as opaque: it only routes entries to the
/// validator registered for the type. Written as `name` (version 1) or
/// `name@version`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntryType {
    pub name: String,
    pub version: u16,
}

impl EntryType {
    pub fn new(name: impl Into<String>, version: u16) -> Self {
        Self {
            name: name.into(),
            version,
        }
    }
}

impl fmt::Display for EntryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.version)
    }
}

impl FromStr for EntryType {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (name, version) = match s.split_once('@') {
            Some((name, version)) => {
                let version = version
                    .parse::<u16>()
                    .map_err(|_| TypeError::InvalidEntryType(s.to_string()))?;
                (name, version)
            }
            None => (s, 1),
        };
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(TypeError::InvalidEntryType(s.to_string()));
        }
        Ok(Self::new(name, version))
    }
}

/// Immutable application payload, addressed by its content hash.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry(Vec<u8>);

impl Entry {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    /// Encode a serializable value as a JSON entry.
    pub fn from_json<T: Serialize>(value: &T) -> Result<Self, TypeError> {
        serde_json::to_vec(value)
            .map(Self)
            .map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Decode a JSON entry into a typed value.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, TypeError> {
        serde_json::from_slice(&self.0).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entry({} bytes)", self.0.len())
    }
}

impl From<Vec<u8>> for Entry {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl From<&[u8]> for Entry {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}
