//! Storage backends read by [`crate::ResourceDao`]

use dashmap::DashMap;
use nut_model::{NutError, NutResult};
use nut_pipe::Input;
use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Raw access to stored resources
///
/// Paths are `/` separated and relative to the backend root.
pub trait DaoBackend: Send + Sync + Debug {
    /// Every stored path
    ///
    /// # Errors
    /// Listing failures.
    fn list(&self) -> NutResult<Vec<String>>;

    /// Whether `path` is stored
    ///
    /// # Errors
    /// Lookup failures.
    fn exists(&self, path: &str) -> NutResult<bool>;

    /// Open the content of `path`
    ///
    /// # Errors
    /// [`NutError::NotFound`] for a missing path.
    fn open(&self, path: &str) -> NutResult<Input>;

    /// Last modification timestamp of `path`
    ///
    /// # Errors
    /// [`NutError::NotFound`] for a missing path.
    fn last_modified(&self, path: &str) -> NutResult<i64>;
}

#[derive(Debug, Clone)]
struct Entry {
    content: Arc<[u8]>,
    modified: i64,
}

/// Concurrent in-memory backend
///
/// Timestamps come from a logical clock incremented on every write, so each
/// `put` is seen as a modification by pollers.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: DashMap<String, Entry>,
    clock: AtomicI64,
}

impl MemoryBackend {
    /// Empty backend
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `content` at `path`, returning its timestamp
    pub fn put(&self, path: impl Into<String>, content: impl AsRef<[u8]>) -> i64 {
        let modified = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let path = path.into();
        debug!(path = %path, modified, "stored resource");
        self.entries.insert(
            path,
            Entry {
                content: Arc::from(content.as_ref()),
                modified,
            },
        );
        modified
    }

    /// Delete `path`, returning whether it existed
    pub fn remove(&self, path: &str) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Number of stored paths
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn entry(&self, path: &str) -> NutResult<Entry> {
        self.entries
            .get(path)
            .map(|e| e.value().clone())
            .ok_or_else(|| NutError::not_found(path))
    }
}

impl DaoBackend for MemoryBackend {
    fn list(&self) -> NutResult<Vec<String>> {
        let mut paths: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        paths.sort();
        Ok(paths)
    }

    fn exists(&self, path: &str) -> NutResult<bool> {
        Ok(self.entries.contains_key(path))
    }

    fn open(&self, path: &str) -> NutResult<Input> {
        Ok(Input::from_bytes(self.entry(path)?.content.to_vec()))
    }

    fn last_modified(&self, path: &str) -> NutResult<i64> {
        Ok(self.entry(path)?.modified)
    }
}
