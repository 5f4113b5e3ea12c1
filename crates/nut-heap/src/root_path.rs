//! DAO decorator resolving paths under a root directory

use crate::dao::{NutDao, NutDaoListener, PathFormat, ProcessContext};
use crate::error::HeapResult;
use nut_model::path::merge_path;
use nut_model::{ConvertibleNut, NutRef};
use nut_pipe::Input;
use std::sync::Arc;

/// Delegates to another DAO with `root` prepended to every path
///
/// Only the local `root` is prepended here: a wrapped [`WithRootPathDao`]
/// prepends its own.
#[derive(Debug)]
pub struct WithRootPathDao {
    inner: Arc<dyn NutDao>,
    root: String,
    full_root: String,
}

impl WithRootPathDao {
    /// Wrap `inner`; [`root_path`](NutDao::root_path) reports `inner`'s root
    /// followed by `root`
    #[must_use]
    pub fn new(inner: Arc<dyn NutDao>, root: &str) -> Self {
        let full_root = match inner.root_path() {
            Some(parent) => merge_path(&[parent, root]),
            None => root.to_string(),
        };
        Self {
            inner,
            root: root.to_string(),
            full_root,
        }
    }

    /// Wrapped DAO
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &Arc<dyn NutDao> {
        &self.inner
    }

    fn rooted(&self, path: &str) -> String {
        merge_path(&[&self.root, path])
    }
}

impl NutDao for WithRootPathDao {
    fn create(
        &self,
        path: &str,
        format: PathFormat,
        context: &ProcessContext,
    ) -> HeapResult<Vec<NutRef>> {
        self.inner.create(&self.rooted(path), format, context)
    }

    fn observe(
        &self,
        pattern: &str,
        format: PathFormat,
        listener: Arc<dyn NutDaoListener>,
    ) -> HeapResult<()> {
        self.inner.observe(&self.rooted(pattern), format, listener)
    }

    fn unobserve(&self, listener: &Arc<dyn NutDaoListener>) {
        self.inner.unobserve(listener);
    }

    fn proxy_uri_for(&self, nut: &dyn ConvertibleNut) -> Option<String> {
        self.inner.proxy_uri_for(nut)
    }

    fn exists(&self, path: &str, context: &ProcessContext) -> HeapResult<bool> {
        self.inner.exists(&self.rooted(path), context)
    }

    fn new_input(&self, path: &str, context: &ProcessContext) -> HeapResult<Input> {
        self.inner.new_input(&self.rooted(path), context)
    }

    fn root_path(&self) -> Option<&str> {
        Some(&self.full_root)
    }
}

/// Wrap `dao` so that paths resolve under `root`
#[must_use]
pub fn with_root_path(dao: Arc<dyn NutDao>, root: &str) -> Arc<dyn NutDao> {
    Arc::new(WithRootPathDao::new(dao, root))
}
