//! Pipeline configuration
//!
//! [`PipelineConfig`] gathers the settings of DAOs, caching, CSS inspection,
//! aggregation, compression and static workflows. It loads from TOML or YAML and builds the matching
//! components.

use crate::aggregator::TextAggregatorEngine;
use crate::cache::{parse_size, MemoryCacheEngine, DEFAULT_MAX_CAPACITY};
use crate::engine::{Engine, EngineChain};
use crate::error::{EngineError, EngineResult};
use crate::gzip::GzipEngine;
use crate::inspector::CssInspectorEngine;
use crate::static_workflow::{DirectoryResources, StaticEngine};
use nut_heap::{DaoBackend, ResourceDao, VersionNumberStrategy};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Settings of a pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Seconds between two polling cycles, `0` disables polling
    pub polling_interval_secs: u64,
    /// Hash content instead of using last modification timestamps
    pub content_based_version_number: bool,
    /// Compute version numbers on the worker pool
    pub compute_version_asynchronously: bool,
    /// Numeric version used for every nut
    pub fixed_version_number: Option<String>,
    /// Proxy URIs given in turn to created nuts
    pub proxy_uris: Vec<String>,
    /// Maximum number of cached requests
    pub cache_max_capacity: u64,
    /// Expiration of cached entries, `0` keeps them until invalidated
    pub cache_time_to_live_secs: u64,
    /// Maximum cached content size such as `10MB`, replacing the entry bound
    pub cache_max_size: Option<String>,
    /// Whether caching is enabled
    pub cache_enabled: bool,
    /// Aggregate text nuts into one per type
    pub aggregate: bool,
    /// Resolve and rewrite the files referenced by stylesheets
    pub inspect: bool,
    /// Gzip served content
    pub compress: bool,
    /// Directory holding static workflow files, enables static serving
    pub static_resource_root: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            polling_interval_secs: 0,
            content_based_version_number: true,
            compute_version_asynchronously: false,
            fixed_version_number: None,
            proxy_uris: Vec::new(),
            cache_max_capacity: DEFAULT_MAX_CAPACITY,
            cache_time_to_live_secs: 0,
            cache_max_size: None,
            cache_enabled: true,
            aggregate: true,
            inspect: true,
            compress: false,
            static_resource_root: None,
        }
    }
}

impl PipelineConfig {
    /// Create default configuration
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse and validate TOML
    ///
    /// # Errors
    /// [`EngineError::Config`] for malformed input, or any validation error.
    pub fn from_toml_str(content: &str) -> EngineResult<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate YAML
    ///
    /// # Errors
    /// [`EngineError::Config`] for malformed input, or any validation error.
    pub fn from_yaml_str(content: &str) -> EngineResult<Self> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a `.toml`, `.yaml` or `.yml` file
    ///
    /// # Errors
    /// Read failure, unknown extension or invalid content.
    pub fn load(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading pipeline configuration");
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => Self::from_toml_str(&content),
            Some("yaml" | "yml") => Self::from_yaml_str(&content),
            _ => Err(EngineError::bad_argument(format!(
                "unsupported configuration file: {}",
                path.display()
            ))),
        }
    }

    /// With polling interval
    #[inline]
    #[must_use]
    pub fn with_polling_interval(mut self, secs: u64) -> Self {
        self.polling_interval_secs = secs;
        self
    }

    /// With content based version numbers
    #[inline]
    #[must_use]
    pub fn with_content_based_version_number(mut self, enabled: bool) -> Self {
        self.content_based_version_number = enabled;
        self
    }

    /// With asynchronous version computation
    #[inline]
    #[must_use]
    pub fn with_asynchronous_version(mut self, enabled: bool) -> Self {
        self.compute_version_asynchronously = enabled;
        self
    }

    /// With fixed version number
    #[must_use]
    pub fn with_fixed_version_number(mut self, version: impl Into<String>) -> Self {
        self.fixed_version_number = Some(version.into());
        self
    }

    /// With proxy URIs
    #[must_use]
    pub fn with_proxy_uris(mut self, uris: Vec<String>) -> Self {
        self.proxy_uris = uris;
        self
    }

    /// With cache size bound
    #[must_use]
    pub fn with_cache_max_size(mut self, size: impl Into<String>) -> Self {
        self.cache_max_size = Some(size.into());
        self
    }

    /// With caching enabled or not
    #[inline]
    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    /// With aggregation enabled or not
    #[inline]
    #[must_use]
    pub fn with_aggregate(mut self, aggregate: bool) -> Self {
        self.aggregate = aggregate;
        self
    }

    /// With CSS inspection enabled or not
    #[inline]
    #[must_use]
    pub fn with_inspect(mut self, inspect: bool) -> Self {
        self.inspect = inspect;
        self
    }

    /// With compression enabled or not
    #[inline]
    #[must_use]
    pub fn with_compress(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    /// With static workflow directory
    #[must_use]
    pub fn with_static_resource_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.static_resource_root = Some(root.into());
        self
    }

    /// Check values that serde cannot
    ///
    /// # Errors
    /// [`EngineError::BadArgument`] for a non-numeric fixed version or an
    /// unparsable cache size.
    pub fn validate(&self) -> EngineResult<()> {
        self.version_strategy()?;
        if let Some(size) = &self.cache_max_size {
            parse_size(size)?;
        }
        Ok(())
    }

    /// Version number strategy of DAOs
    ///
    /// # Errors
    /// [`EngineError::Heap`] when the fixed version is not a number.
    pub fn version_strategy(&self) -> EngineResult<VersionNumberStrategy> {
        Ok(VersionNumberStrategy::new(
            self.content_based_version_number,
            self.compute_version_asynchronously,
            self.fixed_version_number.as_deref(),
        )?)
    }

    /// DAO over `backend` below `base_path`, polling when an interval is set
    ///
    /// # Errors
    /// Invalid version strategy or failure to start polling.
    pub fn resource_dao<B: DaoBackend + 'static>(
        &self,
        backend: Arc<B>,
        base_path: &str,
    ) -> EngineResult<Arc<ResourceDao<B>>> {
        Ok(ResourceDao::builder(backend)
            .base_path(base_path)
            .proxy_uris(self.proxy_uris.clone())
            .polling_interval(self.polling_interval_secs)
            .version_strategy(self.version_strategy()?)
            .build()?)
    }

    /// Result cache
    ///
    /// # Errors
    /// Unparsable cache size.
    pub fn cache_engine(&self) -> EngineResult<MemoryCacheEngine> {
        let mut builder = MemoryCacheEngine::builder()
            .enabled(self.cache_enabled)
            .max_capacity(self.cache_max_capacity);
        if let Some(size) = &self.cache_max_size {
            builder = builder.max_size(parse_size(size)?);
        }
        if self.cache_time_to_live_secs > 0 {
            builder = builder.time_to_live(Duration::from_secs(self.cache_time_to_live_secs));
        }
        Ok(builder.build())
    }

    /// Text aggregator
    #[must_use]
    pub fn aggregator(&self) -> TextAggregatorEngine {
        TextAggregatorEngine::new(self.aggregate)
    }

    /// CSS reference inspector
    #[must_use]
    pub fn inspector(&self) -> CssInspectorEngine {
        CssInspectorEngine::new(self.inspect)
    }

    /// Gzip compression
    #[must_use]
    pub fn gzip(&self) -> GzipEngine {
        GzipEngine::new(self.compress)
    }

    /// Static workflow engine, when a resource root is set
    #[must_use]
    pub fn static_engine(&self) -> Option<StaticEngine> {
        self.static_resource_root
            .as_ref()
            .map(|root| StaticEngine::new(Arc::new(DirectoryResources::new(root))))
    }

    /// Chain of configured engines
    ///
    /// A static engine replaces the cache at the head of the chain. Disabled
    /// engines stay in the chain and are skipped.
    ///
    /// # Errors
    /// Unparsable cache size.
    pub fn engine_chain(&self) -> EngineResult<EngineChain> {
        let head: Arc<dyn Engine> = match self.static_engine() {
            Some(engine) => Arc::new(engine),
            None => Arc::new(self.cache_engine()?),
        };
        Ok(EngineChain::new(vec![
            head,
            Arc::new(self.inspector()),
            Arc::new(self.aggregator()),
            Arc::new(self.gzip()),
        ]))
    }
}
