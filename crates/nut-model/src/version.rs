//! Deferred version numbers
//!
//! A [`VersionNumber`] is a memoized computation: it is evaluated once, either
//! by the first caller of [`VersionNumber::get`] or eagerly on a
//! [`WorkerPool`]. Concurrent callers block until the value is available.

use crate::error::{NutError, NutResult};
use crate::hash::ContentHash;
use crate::pool::WorkerPool;
use once_cell::sync::OnceCell;
use parking_lot::Mutex;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use tracing::warn;

type Thunk = Box<dyn FnOnce() -> NutResult<i64> + Send>;

struct Deferred {
    value: OnceCell<Result<i64, String>>,
    thunk: Mutex<Option<Thunk>>,
}

/// Lazily computed, shareable version number
#[derive(Clone)]
pub struct VersionNumber {
    inner: Arc<Deferred>,
}

impl VersionNumber {
    /// Already known version
    #[must_use]
    pub fn fixed(value: i64) -> Self {
        Self {
            inner: Arc::new(Deferred {
                value: OnceCell::with_value(Ok(value)),
                thunk: Mutex::new(None),
            }),
        }
    }

    /// Version computed on first access
    #[must_use]
    pub fn deferred<F>(compute: F) -> Self
    where
        F: FnOnce() -> NutResult<i64> + Send + 'static,
    {
        Self {
            inner: Arc::new(Deferred {
                value: OnceCell::new(),
                thunk: Mutex::new(Some(Box::new(compute))),
            }),
        }
    }

    /// Version computed right away on `pool`
    #[must_use]
    pub fn spawn<F>(pool: &WorkerPool, compute: F) -> Self
    where
        F: FnOnce() -> NutResult<i64> + Send + 'static,
    {
        let version = Self::deferred(compute);
        let background = version.clone();
        pool.execute_asap(move || {
            background.force();
        });
        version
    }

    fn force(&self) -> &Result<i64, String> {
        self.inner.value.get_or_init(|| {
            let thunk = self.inner.thunk.lock().take();
            match thunk {
                Some(compute) => compute().map_err(|e| e.to_string()),
                None => Err("version computation is not available".to_string()),
            }
        })
    }

    /// Resolve the version, blocking until it is computed
    ///
    /// # Errors
    /// [`NutError::Version`] when the computation failed.
    pub fn try_get(&self) -> NutResult<i64> {
        self.force().clone().map_err(NutError::Version)
    }

    /// Resolve the version, logging failures and falling back to `0`
    #[must_use]
    pub fn get(&self) -> i64 {
        match self.try_get() {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "version number computation failed, using 0");
                0
            }
        }
    }

    /// Whether the value is already computed
    #[inline]
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner.value.get().is_some()
    }
}

impl Default for VersionNumber {
    fn default() -> Self {
        Self::fixed(0)
    }
}

impl Debug for VersionNumber {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.inner.value.get() {
            Some(Ok(value)) => write!(f, "VersionNumber({value})"),
            Some(Err(e)) => write!(f, "VersionNumber(failed: {e})"),
            None => f.write_str("VersionNumber(pending)"),
        }
    }
}

/// Version number derived from content bytes
#[must_use]
pub fn version_of_content(content: &[u8]) -> i64 {
    ContentHash::compute(content).to_version()
}

/// Combine several versions into one
///
/// When every version agrees that value is kept, otherwise the versions are
/// hashed in order.
#[must_use]
pub fn combine_versions(versions: &[i64]) -> i64 {
    match versions.split_first() {
        None => 0,
        Some((first, rest)) if rest.iter().all(|v| v == first) => *first,
        Some(_) => ContentHash::compute_versions(versions).to_version(),
    }
}

/// Force a version to be non-negative
#[inline]
#[must_use]
pub fn positive(value: i64) -> i64 {
    value.checked_abs().unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn fixed_is_ready() {
        let v = VersionNumber::fixed(7);
        assert!(v.is_ready());
        assert_eq!(v.get(), 7);
    }

    #[test]
    fn deferred_runs_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let v = VersionNumber::deferred(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(99)
        });
        assert!(!v.is_ready());
        let clone = v.clone();
        assert_eq!(v.get(), 99);
        assert_eq!(clone.get(), 99);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_computation_defaults_to_zero() {
        let v = VersionNumber::deferred(|| Err(NutError::not_found("gone.js")));
        assert_eq!(v.get(), 0);
        assert!(matches!(v.try_get(), Err(NutError::Version(_))));
    }

    #[test]
    fn spawned_version_resolves() {
        let pool = WorkerPool::new(1).unwrap();
        let v = VersionNumber::spawn(&pool, || {
            std::thread::sleep(Duration::from_millis(5));
            Ok(5)
        });
        assert_eq!(v.get(), 5);
        assert!(v.is_ready());
    }

    #[test]
    fn combine_keeps_shared_version() {
        assert_eq!(combine_versions(&[3, 3, 3]), 3);
        assert_eq!(combine_versions(&[]), 0);
        assert_ne!(combine_versions(&[1, 2]), combine_versions(&[2, 1]));
    }

    #[test]
    fn positive_handles_min() {
        assert_eq!(positive(-5), 5);
        assert_eq!(positive(i64::MIN), i64::MAX);
    }

    proptest! {
        #[test]
        fn content_version_is_deterministic(content in proptest::collection::vec(any::<u8>(), 0..256)) {
            prop_assert_eq!(version_of_content(&content), version_of_content(&content));
        }

        #[test]
        fn positive_is_never_negative(value in any::<i64>()) {
            prop_assert!(positive(value) >= 0);
        }
    }
}
