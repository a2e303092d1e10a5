//! Opaque leaves
//!
//! Values the structural formats cannot express. They travel through the
//! sidecar archive, keyed by their content hash.

use std::fmt;
use std::sync::Arc;

use crate::hash::ContentHash;

/// A typed binary blob with a content-addressed identity
#[derive(Clone)]
pub struct Opaque {
    type_name: String,
    payload: Arc<[u8]>,
    id: ContentHash,
}

impl Opaque {
    /// Wrap a payload; the identity covers both type name and bytes
    #[must_use]
    pub fn new(type_name: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        let type_name = type_name.into();
        let payload: Vec<u8> = payload.into();
        let payload: Arc<[u8]> = payload.into();
        let id = ContentHash::compute_parts(&[type_name.as_bytes(), &payload]);
        Self {
            type_name,
            payload,
            id,
        }
    }

    /// Name of the original type
    #[inline]
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Serialized bytes
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Content identity, shared by equal leaves
    #[inline]
    #[must_use]
    pub const fn id(&self) -> ContentHash {
        self.id
    }
}

impl PartialEq for Opaque {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl fmt::Debug for Opaque {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Opaque")
            .field("type_name", &self.type_name)
            .field("id", &self.id.short())
            .field("len", &self.payload.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_name_is_part_of_identity() {
        let a = Opaque::new("a", vec![1, 2, 3]);
        let b = Opaque::new("b", vec![1, 2, 3]);
        assert_ne!(a, b);
        assert_eq!(a.payload(), &[1, 2, 3]);
    }

    #[test]
    fn debug_is_compact() {
        let opaque = Opaque::new("closure", vec![0u8; 1024]);
        let debug = format!("{opaque:?}");
        assert!(debug.contains("closure"));
        assert!(debug.contains("len: 1024"));
    }
}
