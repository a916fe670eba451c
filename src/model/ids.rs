//! Annotation identifiers.
//!
//! Annotation ids are opaque strings, unique within one store. When a
//! caller does not supply one, a long random hex string is generated so
//! that ids minted on different machines never collide in practice.

use rand::RngExt;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of hex characters in a generated annotation id (160 random bits).
const RANDOM_ID_HEX_CHARS: usize = 40;

/// A unique identifier for an annotation within a store.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub String);

impl AnnotationId {
    /// Creates an id from an existing string.
    #[inline]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh random hex id.
    pub fn random() -> Self {
        let mut rng = rand::rng();
        let mut id = String::with_capacity(RANDOM_ID_HEX_CHARS);
        for _ in 0..RANDOM_ID_HEX_CHARS / 8 {
            let word: u32 = rng.random();
            id.push_str(&format!("{:08x}", word));
        }
        Self(id)
    }

    /// Returns the underlying string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if the id is the empty string.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AnnotationId({})", self.0)
    }
}

impl fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for AnnotationId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for AnnotationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
