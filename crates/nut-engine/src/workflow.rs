//! Workflows and URL serving

use crate::engine::{EngineChain, EngineRequest};
use crate::error::{EngineError, EngineResult};
use crate::url::{url_for, UrlMatcher, URL_PATTERN_MESSAGE};
use metrics::counter;
use nut_heap::NutsHeap;
use nut_model::path::is_number;
use nut_model::{transform_to_bytes, ConvertibleNut, Nut, NutRef};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Heap processed by an engine chain under an id
#[derive(Debug, Clone)]
pub struct Workflow {
    id: String,
    heap: Arc<NutsHeap>,
    chain: Arc<EngineChain>,
    prefix_created_nut: String,
}

impl Workflow {
    /// Create a workflow
    ///
    /// # Errors
    /// [`EngineError::BadArgument`] when `id` is empty, numeric or contains
    /// a `/`, since such ids cannot be told apart in served URLs.
    pub fn new(
        id: impl Into<String>,
        heap: Arc<NutsHeap>,
        chain: Arc<EngineChain>,
    ) -> EngineResult<Self> {
        let id = id.into();
        if id.is_empty() || id.contains('/') || is_number(&id) {
            return Err(EngineError::bad_argument(format!(
                "workflow id '{id}' must be non-empty, non-numeric and without '/'"
            )));
        }
        Ok(Self {
            id,
            heap,
            chain,
            prefix_created_nut: String::new(),
        })
    }

    /// Prefix names of nuts created by engines
    #[must_use]
    pub fn prefix_created_nut(mut self, prefix: impl Into<String>) -> Self {
        self.prefix_created_nut = prefix.into();
        self
    }

    /// Workflow id
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Processed heap
    #[inline]
    #[must_use]
    pub fn heap(&self) -> &Arc<NutsHeap> {
        &self.heap
    }

    /// Engines of the workflow
    #[inline]
    #[must_use]
    pub fn chain(&self) -> &Arc<EngineChain> {
        &self.chain
    }

    /// Fresh request over the current heap content
    ///
    /// # Errors
    /// Failure to copy heap nuts.
    pub fn request(&self) -> EngineResult<EngineRequest> {
        Ok(EngineRequest::new(self.id.clone(), Arc::clone(&self.heap))?
            .prefix_created_nut(self.prefix_created_nut.clone()))
    }

    /// Run the chain over the heap
    ///
    /// # Errors
    /// Any engine failure.
    pub fn parse(&self) -> EngineResult<Vec<NutRef>> {
        self.chain.parse(&self.request()?)
    }
}

/// Transformed content of a served nut
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServedNut {
    /// Nut name
    pub name: String,
    /// Content type
    pub mime_type: &'static str,
    /// Version number
    pub version: i64,
    /// Transformed bytes
    pub bytes: Vec<u8>,
    /// Whether `bytes` are gzipped
    pub compressed: bool,
}

/// Workflows served by id
#[derive(Debug, Default)]
pub struct WorkflowRegistry {
    workflows: RwLock<HashMap<String, Arc<Workflow>>>,
}

impl WorkflowRegistry {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `workflow`
    ///
    /// # Errors
    /// [`EngineError::BadArgument`] when the id is already registered.
    pub fn register(&self, workflow: Workflow) -> EngineResult<Arc<Workflow>> {
        let mut workflows = self.workflows.write();
        if workflows.contains_key(workflow.id()) {
            return Err(EngineError::bad_argument(format!(
                "workflow '{}' already registered",
                workflow.id()
            )));
        }
        info!(workflow = %workflow.id(), heap = %workflow.heap().id(), "workflow registered");
        let workflow = Arc::new(workflow);
        workflows.insert(workflow.id().to_string(), Arc::clone(&workflow));
        Ok(workflow)
    }

    /// Workflow registered under `id`
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<Workflow>> {
        self.workflows.read().get(id).cloned()
    }

    /// Registered ids, sorted
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.workflows.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Content served at `url`
    ///
    /// # Errors
    /// [`EngineError::BadArgument`] for a URL outside the scheme,
    /// [`EngineError::NotFound`] for an unknown workflow or nut, or any
    /// processing failure.
    pub fn serve(&self, url: &str) -> EngineResult<ServedNut> {
        let matcher = UrlMatcher::parse(url);
        let (Some(workflow_id), Some(name)) = (matcher.workflow_id(), matcher.nut_name()) else {
            return Err(EngineError::bad_argument(format!("{url}: {URL_PATTERN_MESSAGE}")));
        };
        let workflow = self
            .get(workflow_id)
            .ok_or_else(|| EngineError::not_found("workflow", workflow_id))?;

        let request = workflow.request()?;
        let nut = workflow
            .chain()
            .parse_path(&request, name)?
            .ok_or_else(|| EngineError::not_found("nut", name))?;
        let bytes = transform_to_bytes(nut.as_ref())?;

        counter!("nut_served_total").increment(1);
        debug!(workflow = %workflow_id, nut = %nut.name(), bytes = bytes.len(), "nut served");
        Ok(ServedNut {
            name: nut.name(),
            mime_type: nut.nut_type().mime_type(),
            version: nut.version_number().get(),
            compressed: nut.is_compressed(),
            bytes,
        })
    }

    /// URL serving `nut` in `workflow`
    #[must_use]
    pub fn url_for(workflow: &Workflow, nut: &NutRef) -> String {
        url_for(workflow.id(), nut.version_number().get(), &nut.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::TextAggregatorEngine;
    use crate::cache::MemoryCacheEngine;
    use nut_test_utils::memory_heap;
    use pretty_assertions::assert_eq;

    fn chain() -> Arc<EngineChain> {
        Arc::new(EngineChain::new(vec![
            Arc::new(MemoryCacheEngine::new()),
            Arc::new(TextAggregatorEngine::new(true)),
        ]))
    }

    fn registry() -> WorkflowRegistry {
        let heap = memory_heap(&[("a.js", "var a;"), ("b.js", "var b;"), ("logo.png", "PNG")]);
        let registry = WorkflowRegistry::new();
        registry.register(Workflow::new("app", heap, chain()).unwrap()).unwrap();
        registry
    }

    #[test]
    fn ids_are_validated() {
        let heap = memory_heap(&[("a.js", "")]);
        for id in ["", "123", "a/b"] {
            assert!(Workflow::new(id, heap.clone(), chain()).unwrap_err().is_bad_argument());
        }
        assert!(Workflow::new("app", heap, chain()).is_ok());
    }

    #[test]
    fn duplicate_registration_fails() {
        let registry = registry();
        let heap = memory_heap(&[("c.js", "")]);
        let err = registry.register(Workflow::new("app", heap, chain()).unwrap()).unwrap_err();
        assert!(err.is_bad_argument());
        assert_eq!(registry.ids(), vec!["app".to_string()]);
    }

    #[test]
    fn serves_aggregate_with_and_without_version() {
        let registry = registry();
        let served = registry.serve("/app/aggregate.js").unwrap();
        assert_eq!(served.name, "aggregate.js");
        assert_eq!(served.mime_type, "text/javascript");
        assert_eq!(served.bytes, b"var a;\nvar b;\n");

        let versioned = registry.serve(&format!("/app/{}/aggregate.js", served.version)).unwrap();
        assert_eq!(versioned, served);

        let png = registry.serve("app/logo.png").unwrap();
        assert_eq!(png.bytes, b"PNG");
    }

    #[test]
    fn unknown_targets_are_not_found() {
        let registry = registry();
        assert!(registry.serve("/other/a.js").unwrap_err().is_not_found());
        assert!(registry.serve("/app/missing.js").unwrap_err().is_not_found());
        assert!(registry.serve("/123/a.js").unwrap_err().is_bad_argument());
    }

    #[test]
    fn url_round_trips_through_serve() {
        let registry = registry();
        let workflow = registry.get("app").unwrap();
        let nuts = workflow.parse().unwrap();
        let aggregate = nuts.iter().find(|n| n.name() == "aggregate.js").unwrap();

        let url = WorkflowRegistry::url_for(&workflow, aggregate);
        assert!(url.starts_with("/app/"));
        assert_eq!(registry.serve(&url).unwrap().name, "aggregate.js");
    }
}
