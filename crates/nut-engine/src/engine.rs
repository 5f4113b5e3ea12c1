//! Engine chain
//!
//! Engines are ordered by [`EngineType`] and each receives the remaining
//! [`Chain`] so it can hand its result over. Head engines (caches and static
//! workflows) see the whole request; the other engines run once per nut type.

use crate::error::EngineResult;
use nut_heap::{NutsHeap, ProcessContext};
use nut_model::{find_by_name, ConvertibleNut, Nut, NutRef, NutType, PipedNut};
use std::collections::BTreeSet;
use std::fmt::Debug;
use std::sync::Arc;
use tracing::debug;

/// Position of an engine in a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EngineType {
    /// Result caching, runs first
    Cache,
    /// Reference discovery
    Inspector,
    /// Aggregation of nuts of the same type
    Aggregator,
    /// Format conversion
    Converter,
    /// Minification
    Minification,
    /// Binary compression, runs last
    BinaryCompression,
}

impl EngineType {
    /// Every engine type in chain order
    pub const ALL: [Self; 6] = [
        Self::Cache,
        Self::Inspector,
        Self::Aggregator,
        Self::Converter,
        Self::Minification,
        Self::BinaryCompression,
    ];

    /// Whether engines of this type receive nuts of every type at once
    #[inline]
    #[must_use]
    pub fn is_head(self) -> bool {
        matches!(self, Self::Cache)
    }

    /// Rank in chain order, used as the order of transformers added by engines
    #[inline]
    #[must_use]
    pub fn order(self) -> i32 {
        self as i32
    }

    /// Every engine type except `excluded`
    #[must_use]
    pub fn without(excluded: &[Self]) -> Vec<Self> {
        Self::ALL.into_iter().filter(|t| !excluded.contains(t)).collect()
    }
}

/// Fingerprint of a request, used as cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    workflow_id: String,
    names: BTreeSet<String>,
    skip: Vec<EngineType>,
}

impl RequestKey {
    /// Workflow the request was made for
    #[inline]
    #[must_use]
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Requested nut names
    #[inline]
    #[must_use]
    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }
}

/// Nuts to process for a workflow
#[derive(Debug, Clone)]
pub struct EngineRequest {
    workflow_id: String,
    heap: Arc<NutsHeap>,
    nuts: Vec<NutRef>,
    skip: Vec<EngineType>,
    context: ProcessContext,
    prefix_created_nut: String,
}

impl EngineRequest {
    /// Request over working copies of every nut of `heap`
    ///
    /// # Errors
    /// Failure to copy a nut.
    pub fn new(workflow_id: impl Into<String>, heap: Arc<NutsHeap>) -> EngineResult<Self> {
        let nuts = heap
            .nuts()
            .iter()
            .map(working_copy)
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Self {
            workflow_id: workflow_id.into(),
            context: heap.context().clone(),
            heap,
            nuts,
            skip: Vec::new(),
            prefix_created_nut: String::new(),
        })
    }

    /// Same request over other nuts
    #[must_use]
    pub fn with_nuts(&self, nuts: Vec<NutRef>) -> Self {
        Self {
            nuts,
            ..self.clone()
        }
    }

    /// Skip engines of the given types
    #[must_use]
    pub fn skip(mut self, types: &[EngineType]) -> Self {
        for engine_type in types {
            if !self.skip.contains(engine_type) {
                self.skip.push(*engine_type);
            }
        }
        self.skip.sort();
        self
    }

    /// Context passed to DAOs
    #[must_use]
    pub fn context(mut self, context: ProcessContext) -> Self {
        self.context = context;
        self
    }

    /// Directory prepended to nuts created by engines
    #[must_use]
    pub fn prefix_created_nut(mut self, prefix: impl Into<String>) -> Self {
        self.prefix_created_nut = prefix.into();
        self
    }

    /// Workflow id
    #[inline]
    #[must_use]
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Heap the nuts come from
    #[inline]
    #[must_use]
    pub fn heap(&self) -> &Arc<NutsHeap> {
        &self.heap
    }

    /// Nuts to process
    #[inline]
    #[must_use]
    pub fn nuts(&self) -> &[NutRef] {
        &self.nuts
    }

    /// Distinct types of the nuts, in order of first appearance
    #[must_use]
    pub fn nut_types(&self) -> Vec<NutType> {
        let mut types = Vec::new();
        for nut in &self.nuts {
            let nut_type = nut.nut_type();
            if !types.contains(&nut_type) {
                types.push(nut_type);
            }
        }
        types
    }

    /// Whether engines of `engine_type` are skipped
    #[must_use]
    pub fn skips(&self, engine_type: EngineType) -> bool {
        self.skip.contains(&engine_type)
    }

    /// Process context
    #[inline]
    #[must_use]
    pub fn process_context(&self) -> &ProcessContext {
        &self.context
    }

    /// Prefix of nuts created by engines, empty when unset
    #[inline]
    #[must_use]
    pub fn created_nut_prefix(&self) -> &str {
        &self.prefix_created_nut
    }

    /// Cache key of this request
    #[must_use]
    pub fn key(&self) -> RequestKey {
        RequestKey {
            workflow_id: self.workflow_id.clone(),
            names: self.nuts.iter().map(|n| n.name()).collect(),
            skip: self.skip.clone(),
        }
    }
}

/// Fresh convertible nut reading the content of `nut`, which stays its origin
///
/// Heap nuts are shared by every request; each request transforms its own
/// copies.
fn working_copy(nut: &NutRef) -> EngineResult<NutRef> {
    let origin = Arc::clone(nut);
    let mut builder = PipedNut::builder(nut.name(), nut.nut_type())
        .version(nut.version_number().clone())
        .dynamic(nut.is_dynamic())
        .original(Arc::clone(nut));
    if let Some(uri) = nut.proxy_uri() {
        builder = builder.proxy_uri(uri);
    }
    if let Some(parent) = nut.parent_file() {
        builder = builder.parent_file(parent);
    }
    let copy = builder.build(move || origin.open_stream())?;
    for transformer in nut.transformers() {
        copy.add_transformer(transformer)?;
    }
    Ok(Arc::new(copy))
}

/// Step of a processing chain
pub trait Engine: Send + Sync + Debug {
    /// Position in the chain
    fn engine_type(&self) -> EngineType;

    /// Whether the engine is enabled, disabled engines are skipped
    fn works(&self) -> bool {
        true
    }

    /// Whether the engine processes nuts of `nut_type`
    fn handles(&self, _nut_type: NutType) -> bool {
        true
    }

    /// Process `request`, usually by running `next` over the result
    ///
    /// # Errors
    /// Any failure of this engine or of the rest of the chain.
    fn parse(&self, request: &EngineRequest, next: Chain<'_>) -> EngineResult<Vec<NutRef>>;

    /// Nut named `path` in the result of `request`, including referenced nuts
    ///
    /// # Errors
    /// Any failure while producing the result.
    fn parse_path(
        &self,
        request: &EngineRequest,
        path: &str,
        next: Chain<'_>,
    ) -> EngineResult<Option<NutRef>> {
        let nuts = self.parse(request, next)?;
        Ok(find_by_name(&nuts, path))
    }
}

/// Engines remaining after the current one
#[derive(Debug, Clone, Copy)]
pub struct Chain<'a> {
    engines: &'a [Arc<dyn Engine>],
}

impl<'a> Chain<'a> {
    /// Chain over `engines`, in order
    #[inline]
    #[must_use]
    pub fn new(engines: &'a [Arc<dyn Engine>]) -> Self {
        Self { engines }
    }

    /// Engine that runs next, if any
    #[must_use]
    pub fn next(&self) -> Option<&'a Arc<dyn Engine>> {
        self.engines.first()
    }

    /// Whether no engine remains
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    fn split(&self, request: &EngineRequest) -> Option<(&'a Arc<dyn Engine>, Chain<'a>)> {
        let mut engines = self.engines;
        while let Some((engine, rest)) = engines.split_first() {
            let applies = engine.works()
                && !request.skips(engine.engine_type())
                && request.nuts().first().map_or(true, |n| engine.handles(n.nut_type()));
            if applies {
                return Some((engine, Chain::new(rest)));
            }
            debug!(engine = ?engine.engine_type(), "engine skipped");
            engines = rest;
        }
        None
    }

    /// Run the remaining engines over `request`
    ///
    /// # Errors
    /// Any engine failure.
    pub fn run(&self, request: &EngineRequest) -> EngineResult<Vec<NutRef>> {
        match self.split(request) {
            Some((engine, rest)) => engine.parse(request, rest),
            None => Ok(request.nuts().to_vec()),
        }
    }

    /// Run the remaining engines once per nut type and concatenate the results
    ///
    /// # Errors
    /// Any engine failure.
    pub fn run_by_type(&self, request: &EngineRequest) -> EngineResult<Vec<NutRef>> {
        let mut result = Vec::new();
        for nut_type in request.nut_types() {
            let nuts = request
                .nuts()
                .iter()
                .filter(|n| n.nut_type() == nut_type)
                .cloned()
                .collect();
            result.extend(self.run(&request.with_nuts(nuts))?);
        }
        Ok(result)
    }

    /// Nut named `path` once the remaining engines ran
    ///
    /// # Errors
    /// Any engine failure.
    pub fn run_path(&self, request: &EngineRequest, path: &str) -> EngineResult<Option<NutRef>> {
        match self.split(request) {
            Some((engine, rest)) if engine.engine_type().is_head() => {
                engine.parse_path(request, path, rest)
            }
            _ => Ok(find_by_name(&self.run_by_type(request)?, path)),
        }
    }
}

/// Engines of a workflow, sorted by [`EngineType`]
#[derive(Debug, Clone, Default)]
pub struct EngineChain {
    engines: Vec<Arc<dyn Engine>>,
}

impl EngineChain {
    /// Chain over `engines`, stable-sorted by type
    #[must_use]
    pub fn new(mut engines: Vec<Arc<dyn Engine>>) -> Self {
        engines.sort_by_key(|e| e.engine_type());
        Self { engines }
    }

    /// Engines in execution order
    #[inline]
    #[must_use]
    pub fn engines(&self) -> &[Arc<dyn Engine>] {
        &self.engines
    }

    /// Chain starting at the first engine
    #[inline]
    #[must_use]
    pub fn chain(&self) -> Chain<'_> {
        Chain::new(&self.engines)
    }

    /// Process `request`
    ///
    /// # Errors
    /// Any engine failure.
    pub fn parse(&self, request: &EngineRequest) -> EngineResult<Vec<NutRef>> {
        let chain = self.chain();
        match chain.split(request) {
            Some((engine, _)) if engine.engine_type().is_head() => chain.run(request),
            _ => chain.run_by_type(request),
        }
    }

    /// Nut named `path` in the result of `request`
    ///
    /// # Errors
    /// Any engine failure.
    pub fn parse_path(&self, request: &EngineRequest, path: &str) -> EngineResult<Option<NutRef>> {
        self.chain().run_path(request, path)
    }
}
