//! DAO contracts
//!
//! A [`NutDao`] turns path patterns into nuts and reports changes to the
//! [`NutDaoListener`]s observing those patterns. The heap never assumes a
//! particular protocol: everything it needs goes through this trait.

use crate::error::{HeapError, HeapResult};
use nut_model::path::is_number;
use nut_model::{ConvertibleNut, NutRef};
use nut_pipe::Input;
use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;

/// How a path passed to [`NutDao::create`] is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PathFormat {
    /// Regular expression matched against every path the DAO can list
    #[default]
    Any,
    /// Exact path of a single file
    RelativeFile,
}

impl PathFormat {
    /// Whether the path is a regular expression
    #[inline]
    #[must_use]
    pub fn can_be_regex(self) -> bool {
        matches!(self, Self::Any)
    }
}

/// Request scoped values available to DAOs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessContext {
    values: BTreeMap<String, String>,
}

impl ProcessContext {
    /// Empty context
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a value
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Look a value up
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

/// How a DAO computes version numbers
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionNumberStrategy {
    content_based: bool,
    asynchronous: bool,
    fixed: Option<i64>,
}

impl VersionNumberStrategy {
    /// Create a strategy
    ///
    /// An empty `fixed` value is ignored.
    ///
    /// # Errors
    /// [`HeapError::BadArgument`] when `fixed` is not a number.
    pub fn new(content_based: bool, asynchronous: bool, fixed: Option<&str>) -> HeapResult<Self> {
        let fixed = match fixed.filter(|f| !f.is_empty()) {
            None => None,
            Some(value) if is_number(value) => Some(value.parse().map_err(|_| {
                HeapError::bad_argument(format!("fixed version number out of range: {value}"))
            })?),
            Some(value) => {
                return Err(HeapError::bad_argument(format!(
                    "fixed version must be a number: {value}"
                )))
            }
        };
        Ok(Self {
            content_based,
            asynchronous,
            fixed,
        })
    }

    /// Hash the content instead of using the last modification timestamp
    #[inline]
    #[must_use]
    pub fn is_content_based(&self) -> bool {
        self.content_based
    }

    /// Compute version numbers on the worker pool
    #[inline]
    #[must_use]
    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    /// Version used for every nut, overriding computation
    #[inline]
    #[must_use]
    pub fn fixed(&self) -> Option<i64> {
        self.fixed
    }
}

/// Receives polling results for the patterns it observes
///
/// Returning `false` from [`polling`](Self::polling) or
/// [`nut_polled`](Self::nut_polled) stops notifications to this listener for
/// the rest of the current polling cycle only.
pub trait NutDaoListener: Send + Sync {
    /// Paths currently matching `pattern`
    fn polling(&self, pattern: &str, paths: &HashSet<String>) -> bool;

    /// Current version of `path`, `None` when it could not be computed
    fn nut_polled(&self, path: &str, timestamp: Option<i64>) -> bool;

    /// Whether the listener may be dropped once it stops listening
    fn is_disposable(&self) -> bool {
        false
    }

    /// Identifier of whatever created the listener
    fn factory(&self) -> Option<&str> {
        None
    }

    /// Whether the listener still has someone to notify
    fn is_alive(&self) -> bool {
        true
    }
}

/// Identity comparison of two listener handles
#[must_use]
pub fn same_listener(a: &Arc<dyn NutDaoListener>, b: &Arc<dyn NutDaoListener>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

/// Creates nuts and watches their paths
pub trait NutDao: Send + Sync + Debug {
    /// Nuts matching `path`; paths with an unknown extension are skipped
    ///
    /// # Errors
    /// Invalid patterns or listing failures.
    fn create(
        &self,
        path: &str,
        format: PathFormat,
        context: &ProcessContext,
    ) -> HeapResult<Vec<NutRef>>;

    /// Notify `listener` of changes to paths matching `pattern`, interpreted
    /// according to `format` as in [`create`](Self::create)
    ///
    /// # Errors
    /// Implementation specific registration failures.
    fn observe(
        &self,
        pattern: &str,
        format: PathFormat,
        listener: Arc<dyn NutDaoListener>,
    ) -> HeapResult<()>;

    /// Stop notifying `listener`
    fn unobserve(&self, listener: &Arc<dyn NutDaoListener>);

    /// Proxy URI serving `nut`, if any
    fn proxy_uri_for(&self, nut: &dyn ConvertibleNut) -> Option<String>;

    /// Whether `path` exists
    ///
    /// # Errors
    /// Backend failures.
    fn exists(&self, path: &str, context: &ProcessContext) -> HeapResult<bool>;

    /// Open the content of `path`
    ///
    /// # Errors
    /// [`nut_model::NutError::NotFound`] for missing paths.
    fn new_input(&self, path: &str, context: &ProcessContext) -> HeapResult<Input>;

    /// Root path prepended to every path, if any
    fn root_path(&self) -> Option<&str> {
        None
    }
}
