//! DAO over a [`DaoBackend`]
//!
//! [`ResourceDao`] resolves path patterns against the backend listing, builds
//! lazily opened [`PipedNut`]s with version numbers computed according to its
//! [`VersionNumberStrategy`], round-robins proxy URIs and polls the patterns
//! observed by heaps.

use crate::backend::DaoBackend;
use crate::dao::{NutDao, NutDaoListener, PathFormat, ProcessContext, VersionNumberStrategy};
use crate::error::{HeapError, HeapResult};
use crate::polling::{PollReport, PollSource, PollingScheduler};
use nut_model::path::{merge_path, simplify_path};
use nut_model::{
    version_of_content, ConvertibleNut, NutRef, NutResult, NutType, PipedNut, VersionNumber, WorkerPool,
};
use nut_pipe::Input;
use parking_lot::Mutex;
use regex::Regex;
use std::fmt::{self, Debug, Formatter};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// DAO reading nuts from a backend
pub struct ResourceDao<B: DaoBackend + 'static> {
    self_ref: Weak<ResourceDao<B>>,
    backend: Arc<B>,
    base_path: String,
    proxy_uris: Vec<String>,
    next_proxy: Mutex<usize>,
    strategy: VersionNumberStrategy,
    scheduler: PollingScheduler,
}

impl<B: DaoBackend + 'static> ResourceDao<B> {
    /// Start building a DAO over `backend`
    #[must_use]
    pub fn builder(backend: Arc<B>) -> ResourceDaoBuilder<B> {
        ResourceDaoBuilder {
            backend,
            base_path: String::new(),
            proxy_uris: Vec::new(),
            polling_interval: 0,
            strategy: VersionNumberStrategy::default(),
        }
    }

    /// Backend read by this DAO
    #[inline]
    #[must_use]
    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    /// Directory prepended to every path
    #[inline]
    #[must_use]
    pub fn base_path(&self) -> &str {
        &self.base_path
    }

    /// Version number strategy
    #[inline]
    #[must_use]
    pub fn version_strategy(&self) -> &VersionNumberStrategy {
        &self.strategy
    }

    /// Observers and polling task
    #[inline]
    #[must_use]
    pub fn scheduler(&self) -> &PollingScheduler {
        &self.scheduler
    }

    /// Poll every `secs` seconds on the shared pool, `0` disables polling
    ///
    /// # Errors
    /// Failure to start the shared pool or the periodic task.
    pub fn set_polling_interval(&self, secs: u64) -> HeapResult<()> {
        let pool = WorkerPool::global()?;
        let dao = self.self_ref.clone();
        self.scheduler.set_polling_interval(secs, pool, move || {
            if let Some(dao) = dao.upgrade() {
                dao.poll_once();
            }
        })
    }

    /// Run one polling cycle now
    pub fn poll_once(&self) -> PollReport {
        self.scheduler.poll_once(self)
    }

    /// Stop polling
    pub fn shutdown(&self) {
        debug!(base_path = %self.base_path, "shutting down DAO");
        self.scheduler.stop();
    }

    fn absolute(&self, path: &str) -> String {
        let merged = if self.base_path.is_empty() {
            path.to_string()
        } else {
            merge_path(&[&self.base_path, path])
        };
        let relative = merged.trim_start_matches('/');
        simplify_path(relative).unwrap_or_else(|| relative.to_string())
    }

    fn relative<'a>(&self, absolute: &'a str) -> Option<&'a str> {
        if self.base_path.is_empty() {
            Some(absolute)
        } else {
            absolute
                .strip_prefix(self.base_path.as_str())
                .and_then(|rest| rest.strip_prefix('/'))
        }
    }

    fn real_paths(&self, path: &str, format: PathFormat) -> HeapResult<Vec<String>> {
        if !format.can_be_regex() {
            return match self.backend.exists(&self.absolute(path)) {
                Ok(true) => Ok(vec![path.to_string()]),
                Ok(false) => Ok(Vec::new()),
                Err(e) => {
                    warn!(path = %path, error = %e, "path cannot be loaded, ignoring it");
                    Ok(Vec::new())
                }
            };
        }

        let regex = Regex::new(&format!("^(?:{path})$")).map_err(|e| HeapError::pattern(path, e))?;
        Ok(self
            .backend
            .list()?
            .iter()
            .filter_map(|absolute| self.relative(absolute))
            .filter(|relative| regex.is_match(relative))
            .map(str::to_string)
            .collect())
    }

    /// Paths matching `path` with an extension that maps to a [`NutType`]
    fn nut_paths(&self, path: &str, format: PathFormat) -> HeapResult<Vec<(String, NutType)>> {
        Ok(self
            .real_paths(path, format)?
            .into_iter()
            .filter_map(|real| match NutType::for_path(&real) {
                Some(nut_type) => Some((real, nut_type)),
                None => {
                    debug!(path = %real, "skipping path with unknown extension");
                    None
                }
            })
            .collect())
    }

    fn version_number(&self, path: &str) -> HeapResult<VersionNumber> {
        if let Some(fixed) = self.strategy.fixed() {
            return Ok(VersionNumber::fixed(fixed));
        }

        let backend = Arc::clone(&self.backend);
        let absolute = self.absolute(path);
        let content_based = self.strategy.is_content_based();
        let compute = move || compute_version(backend.as_ref(), &absolute, content_based);

        if !self.strategy.is_asynchronous() {
            return Ok(VersionNumber::fixed(compute()?));
        }
        match WorkerPool::global() {
            Ok(pool) => Ok(VersionNumber::spawn(pool, compute)),
            Err(e) => {
                warn!(error = %e, "worker pool unavailable, version computed on first access");
                Ok(VersionNumber::deferred(compute))
            }
        }
    }

    fn access_for(&self, path: &str, nut_type: NutType) -> HeapResult<NutRef> {
        let backend = Arc::clone(&self.backend);
        let absolute = self.absolute(path);
        let nut = PipedNut::builder(path, nut_type)
            .version(self.version_number(path)?)
            .build(move || backend.open(&absolute))?;
        nut.set_proxy_uri(self.proxy_uri_for(&nut));
        Ok(Arc::new(nut))
    }
}

fn compute_version<B: DaoBackend + ?Sized>(backend: &B, path: &str, content_based: bool) -> NutResult<i64> {
    if content_based {
        let execution = backend.open(path)?.execution()?;
        Ok(version_of_content(execution.as_bytes()))
    } else {
        backend.last_modified(path)
    }
}

impl<B: DaoBackend + 'static> NutDao for ResourceDao<B> {
    fn create(
        &self,
        path: &str,
        format: PathFormat,
        _context: &ProcessContext,
    ) -> HeapResult<Vec<NutRef>> {
        self.nut_paths(path, format)?
            .into_iter()
            .map(|(real, nut_type)| self.access_for(&real, nut_type))
            .collect()
    }

    fn observe(
        &self,
        pattern: &str,
        format: PathFormat,
        listener: Arc<dyn NutDaoListener>,
    ) -> HeapResult<()> {
        self.scheduler.observe(pattern, format, listener);
        Ok(())
    }

    fn unobserve(&self, listener: &Arc<dyn NutDaoListener>) {
        self.scheduler.unobserve(listener);
    }

    fn proxy_uri_for(&self, nut: &dyn ConvertibleNut) -> Option<String> {
        if self.proxy_uris.is_empty() {
            return None;
        }
        let mut next = self.next_proxy.lock();
        if *next >= self.proxy_uris.len() {
            *next = 0;
        }
        let uri = merge_path(&[&self.proxy_uris[*next], nut.initial_name()]);
        *next += 1;
        Some(uri)
    }

    fn exists(&self, path: &str, _context: &ProcessContext) -> HeapResult<bool> {
        Ok(self.backend.exists(&self.absolute(path))?)
    }

    fn new_input(&self, path: &str, _context: &ProcessContext) -> HeapResult<Input> {
        Ok(self.backend.open(&self.absolute(path))?)
    }
}

impl<B: DaoBackend + 'static> PollSource for ResourceDao<B> {
    fn list_paths(&self, pattern: &str, format: PathFormat) -> HeapResult<Vec<String>> {
        Ok(self
            .nut_paths(pattern, format)?
            .into_iter()
            .map(|(path, _)| path)
            .collect())
    }

    fn timestamp_for(&self, path: &str) -> HeapResult<i64> {
        if let Some(fixed) = self.strategy.fixed() {
            return Ok(fixed);
        }
        Ok(compute_version(
            self.backend.as_ref(),
            &self.absolute(path),
            self.strategy.is_content_based(),
        )?)
    }
}

impl<B: DaoBackend + 'static> Debug for ResourceDao<B> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceDao")
            .field("backend", &self.backend)
            .field("base_path", &self.base_path)
            .field("proxy_uris", &self.proxy_uris)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

/// Builder for [`ResourceDao`]
#[derive(Debug)]
pub struct ResourceDaoBuilder<B: DaoBackend + 'static> {
    backend: Arc<B>,
    base_path: String,
    proxy_uris: Vec<String>,
    polling_interval: u64,
    strategy: VersionNumberStrategy,
}

impl<B: DaoBackend + 'static> ResourceDaoBuilder<B> {
    /// Directory prepended to every path
    #[must_use]
    pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
        self.base_path = base_path.into().trim_matches('/').to_string();
        self
    }

    /// Proxy URIs used in turn for created nuts
    #[must_use]
    pub fn proxy_uris(mut self, uris: Vec<String>) -> Self {
        self.proxy_uris = uris;
        self
    }

    /// Polling interval in seconds, `0` disables polling
    #[must_use]
    pub fn polling_interval(mut self, secs: u64) -> Self {
        self.polling_interval = secs;
        self
    }

    /// Version number strategy
    #[must_use]
    pub fn version_strategy(mut self, strategy: VersionNumberStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Build the DAO and start polling when an interval is set
    ///
    /// # Errors
    /// Failure to start the polling task.
    pub fn build(self) -> HeapResult<Arc<ResourceDao<B>>> {
        let polling_interval = self.polling_interval;
        let dao = Arc::new_cyclic(|self_ref| ResourceDao {
            self_ref: self_ref.clone(),
            backend: self.backend,
            base_path: self.base_path,
            proxy_uris: self.proxy_uris,
            next_proxy: Mutex::new(0),
            strategy: self.strategy,
            scheduler: PollingScheduler::new(),
        });
        if polling_interval > 0 {
            dao.set_polling_interval(polling_interval)?;
        }
        Ok(dao)
    }
}
