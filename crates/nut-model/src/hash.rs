//! Content hashing for version numbers
//!
//! Provides [`ContentHash`], a 32-byte Blake3 digest. Version numbers are the
//! first 8 bytes of a digest read as a big-endian signed integer.

/// A 32-byte content hash (Blake3)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Create a new hash from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Compute Blake3 hash of arbitrary data
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self::new(*blake3::hash(data).as_bytes())
    }

    /// Hash a sequence of version numbers, each encoded as 8 big-endian bytes
    #[must_use]
    pub fn compute_versions(versions: &[i64]) -> Self {
        let mut hasher = blake3::Hasher::new();
        for version in versions {
            hasher.update(&version.to_be_bytes());
        }
        Self::new(*hasher.finalize().as_bytes())
    }

    /// First 8 bytes read as a big-endian signed integer
    #[inline]
    #[must_use]
    pub fn to_version(&self) -> i64 {
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&self.0[..8]);
        i64::from_be_bytes(prefix)
    }
}
