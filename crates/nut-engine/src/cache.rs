//! In-memory result cache
//!
//! [`MemoryCacheEngine`] is the head of a chain: on a miss it runs the rest of
//! the chain, freezes every resulting nut with [`to_byte_array_nut`] and keeps
//! them until the request heap reports a change.

use crate::engine::{Chain, Engine, EngineRequest, EngineType, RequestKey};
use crate::error::{EngineError, EngineResult};
use metrics::{counter, histogram};
use moka::sync::Cache;
use nut_heap::{HeapListener, NutsHeap};
use nut_model::{to_byte_array_nut, Nut, NutRef, NutResult};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Default number of cached requests
pub const DEFAULT_MAX_CAPACITY: u64 = 1_000;

#[derive(Debug)]
struct CachedEntry {
    nuts: Vec<NutRef>,
    weight: u32,
}

type EntryCache = Cache<RequestKey, Arc<CachedEntry>>;

/// Head engine caching frozen results per request
pub struct MemoryCacheEngine {
    enabled: bool,
    cache: EntryCache,
    subscribed: Mutex<HashSet<RequestKey>>,
}

impl MemoryCacheEngine {
    /// Enabled cache with default capacity and no expiration
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Start configuring a cache
    #[must_use]
    pub fn builder() -> MemoryCacheBuilder {
        MemoryCacheBuilder::default()
    }

    /// Whether a cached entry exists for `key`
    #[must_use]
    pub fn contains(&self, key: &RequestKey) -> bool {
        self.cache.contains_key(key)
    }

    /// Drop the entry of `key`
    pub fn invalidate(&self, key: &RequestKey) {
        self.cache.invalidate(key);
    }

    /// Drop every entry
    pub fn invalidate_all(&self) {
        self.cache.invalidate_all();
    }

    /// Number of cached requests, after pending maintenance
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }

    fn subscribe(&self, heap: &NutsHeap, key: &RequestKey) {
        let mut subscribed = self.subscribed.lock();
        if subscribed.insert(key.clone()) {
            heap.add_observer(Arc::new(InvalidateCache {
                key: key.clone(),
                cache: self.cache.clone(),
            }));
        }
    }
}

impl Default for MemoryCacheEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Debug for MemoryCacheEngine {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryCacheEngine")
            .field("enabled", &self.enabled)
            .field("entries", &self.cache.entry_count())
            .finish_non_exhaustive()
    }
}

impl Engine for MemoryCacheEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Cache
    }

    fn works(&self) -> bool {
        self.enabled
    }

    fn parse(&self, request: &EngineRequest, next: Chain<'_>) -> EngineResult<Vec<NutRef>> {
        let key = request.key();
        if let Some(entry) = self.cache.get(&key) {
            counter!("nut_cache_hits_total").increment(1);
            debug!(workflow = %request.workflow_id(), "nuts found in cache");
            return Ok(entry.nuts.clone());
        }
        counter!("nut_cache_misses_total").increment(1);

        self.subscribe(request.heap(), &key);
        let start = Instant::now();
        let nuts = next.run_by_type(request)?;
        let frozen = nuts
            .iter()
            .map(to_byte_array_nut)
            .collect::<NutResult<Vec<_>>>()?;
        let weight = weigh(&frozen)?;

        debug!(workflow = %request.workflow_id(), nuts = frozen.len(), weight, "caching nuts");
        self.cache.insert(
            key,
            Arc::new(CachedEntry {
                nuts: frozen.clone(),
                weight,
            }),
        );
        histogram!("nut_cache_fill_seconds").record(start.elapsed().as_secs_f64());
        Ok(frozen)
    }
}

/// Content size of frozen nuts, saturated to `u32`
fn weigh(nuts: &[NutRef]) -> EngineResult<u32> {
    let mut total = 0_u64;
    for nut in nuts {
        total += nut.open_stream()?.execution()?.as_bytes().len() as u64;
    }
    Ok(u32::try_from(total).unwrap_or(u32::MAX))
}

/// Drops a cached entry when its heap changes
struct InvalidateCache {
    key: RequestKey,
    cache: EntryCache,
}

impl HeapListener for InvalidateCache {
    fn nut_updated(&self, heap: &NutsHeap) {
        info!(heap = %heap.id(), workflow = %self.key.workflow_id(), "invalidating cached nuts");
        counter!("nut_cache_invalidations_total").increment(1);
        self.cache.invalidate(&self.key);
    }
}

/// Builder for [`MemoryCacheEngine`]
#[derive(Debug, Clone)]
pub struct MemoryCacheBuilder {
    enabled: bool,
    max_capacity: u64,
    max_size: Option<u64>,
    time_to_live: Option<Duration>,
}

impl Default for MemoryCacheBuilder {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: DEFAULT_MAX_CAPACITY,
            max_size: None,
            time_to_live: None,
        }
    }
}

impl MemoryCacheBuilder {
    /// Enable or disable caching, a disabled cache is skipped by the chain
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Maximum number of cached requests
    #[must_use]
    pub fn max_capacity(mut self, capacity: u64) -> Self {
        self.max_capacity = capacity;
        self
    }

    /// Maximum total content size in bytes, replacing the entry count bound
    #[must_use]
    pub fn max_size(mut self, bytes: u64) -> Self {
        self.max_size = Some(bytes);
        self
    }

    /// Expire entries after `ttl`
    #[must_use]
    pub fn time_to_live(mut self, ttl: Duration) -> Self {
        self.time_to_live = Some(ttl);
        self
    }

    /// Build the engine
    #[must_use]
    pub fn build(self) -> MemoryCacheEngine {
        let mut builder = Cache::builder();
        builder = match self.max_size {
            Some(bytes) => builder
                .max_capacity(bytes)
                .weigher(|_key: &RequestKey, entry: &Arc<CachedEntry>| entry.weight),
            None => builder.max_capacity(self.max_capacity),
        };
        if let Some(ttl) = self.time_to_live {
            builder = builder.time_to_live(ttl);
        }

        MemoryCacheEngine {
            enabled: self.enabled,
            cache: builder.build(),
            subscribed: Mutex::new(HashSet::new()),
        }
    }
}

/// Parse a size such as `512`, `512KB` or `10MB` into bytes
///
/// # Errors
/// [`EngineError::BadArgument`] for anything else.
pub fn parse_size(value: &str) -> EngineResult<u64> {
    let trimmed = value.trim();
    let upper = trimmed.to_ascii_uppercase();
    let (digits, factor) = if let Some(digits) = upper.strip_suffix("MB") {
        (digits, 1024 * 1024)
    } else if let Some(digits) = upper.strip_suffix("KB") {
        (digits, 1024)
    } else {
        (upper.as_str(), 1)
    };

    digits
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| n.checked_mul(factor))
        .ok_or_else(|| EngineError::bad_argument(format!("invalid size '{trimmed}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::TextAggregatorEngine;
    use crate::engine::EngineChain;
    use nut_model::{same_nut, transform_to_bytes, ConvertibleNut};
    use nut_test_utils::HeapFixture;
    use pretty_assertions::assert_eq;

    fn chain(cache: Arc<MemoryCacheEngine>) -> EngineChain {
        EngineChain::new(vec![Arc::new(TextAggregatorEngine::new(true)), cache])
    }

    #[test]
    fn second_request_is_served_from_cache() {
        let fixture = HeapFixture::new(&[("a.js", "var a;"), ("b.js", "var b;")]);
        let cache = Arc::new(MemoryCacheEngine::new());
        let chain = chain(cache.clone());

        let request = EngineRequest::new("wf", fixture.heap.clone()).unwrap();
        let first = chain.parse(&request).unwrap();
        let second = chain.parse(&request).unwrap();

        assert!(same_nut(&first[0], &second[0]));
        assert!(first[0].is_transformed());
        assert_eq!(transform_to_bytes(second[0].as_ref()).unwrap(), b"var a;\nvar b;\n");
        assert!(cache.contains(&request.key()));
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn heap_change_invalidates_entry() {
        let fixture = HeapFixture::new(&[("a.js", "var a;")]);
        let cache = Arc::new(MemoryCacheEngine::new());
        let chain = chain(cache.clone());

        let request = EngineRequest::new("wf", fixture.heap.clone()).unwrap();
        chain.parse(&request).unwrap();
        assert!(cache.contains(&request.key()));

        fixture.update("a.js", "var a = 2;");
        assert!(!cache.contains(&request.key()));

        let request = EngineRequest::new("wf", fixture.heap.clone()).unwrap();
        let refreshed = chain.parse(&request).unwrap();
        assert_eq!(transform_to_bytes(refreshed[0].as_ref()).unwrap(), b"var a = 2;\n");
    }

    #[test]
    fn disabled_cache_is_skipped() {
        let fixture = HeapFixture::new(&[("a.js", "var a;")]);
        let cache = Arc::new(MemoryCacheEngine::builder().enabled(false).build());
        let chain = chain(cache.clone());

        let request = EngineRequest::new("wf", fixture.heap.clone()).unwrap();
        let first = chain.parse(&request).unwrap();
        let second = chain.parse(&request).unwrap();
        assert!(!same_nut(&first[0], &second[0]));
        assert_eq!(cache.entry_count(), 0);
    }

    #[test]
    fn path_lookup_goes_through_the_cache() {
        let fixture = HeapFixture::new(&[("css/a.css", "a{}")]);
        let cache = Arc::new(MemoryCacheEngine::new());
        let chain = chain(cache);

        let request = EngineRequest::new("wf", fixture.heap.clone()).unwrap();
        let found = chain.parse_path(&request, "./aggregate.css").unwrap().unwrap();
        assert_eq!(found.name(), "aggregate.css");
        assert!(chain.parse_path(&request, "css/a.css").unwrap().is_none());
    }

    #[test]
    fn sizes() {
        assert_eq!(parse_size("512").unwrap(), 512);
        assert_eq!(parse_size("512KB").unwrap(), 512 * 1024);
        assert_eq!(parse_size(" 10mb ").unwrap(), 10 * 1024 * 1024);
        assert!(parse_size("ten").unwrap_err().is_bad_argument());
        assert!(parse_size("KB").is_err());
    }
}
