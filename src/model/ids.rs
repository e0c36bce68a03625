//! Newtype IDs for type-safe identification of project elements.
//!
//! Using newtypes prevents accidentally mixing up a category ID with a
//! positional index or a tree node handle.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A unique identifier for an object category in the project registry.
///
/// IDs are assigned by [`CategoryRegistry`](super::CategoryRegistry) and are
/// never reused within a session, so a stale ID cannot silently point at a
/// different category.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryId(pub u64);

impl CategoryId {
    /// Creates a new CategoryId.
    #[inline]
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying u64 value.
    #[inline]
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl From<u64> for CategoryId {
    fn from(id: u64) -> Self {
        CategoryId::new(id)
    }
}

impl fmt::Debug for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CategoryId({})", self.0)
    }
}

impl fmt::Display for CategoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
