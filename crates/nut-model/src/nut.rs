//! Nut and convertible nut contracts
//!
//! A [`Nut`] is the immutable identity of a resource: its initial name and
//! type, its version number and where it comes from. A [`ConvertibleNut`]
//! adds the mutable transformation state kept in [`NutAttributes`]: current
//! name and type, referenced nuts, transformers, ready callbacks, provenance
//! and version callbacks.
//!
//! Decorators implement [`ConvertibleNut`] by holding the wrapped nut and
//! forwarding every method they do not override.

use crate::error::{NutError, NutResult};
use crate::nut_type::NutType;
use crate::version::{positive, VersionNumber};
use nut_pipe::{Input, OnReady, Pipe, SharedTransformer, TransformationStat, TransformerSet};
use parking_lot::RwLock;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Shared handle to a convertible nut
pub type NutRef = Arc<dyn ConvertibleNut>;

/// Transformer operating on convertible nuts
pub type NutTransformer = SharedTransformer<dyn ConvertibleNut>;

/// Pipe whose transformers operate on convertible nuts
pub type NutPipe<'a> = Pipe<'a, dyn ConvertibleNut>;

/// Function adjusting a version number, applied in registration order
pub type VersionCallback = Arc<dyn Fn(&dyn ConvertibleNut, i64) -> i64 + Send + Sync>;

/// Immutable identity of a resource
pub trait Nut: Send + Sync + Debug {
    /// Name given at creation
    fn initial_name(&self) -> &str;

    /// Type given at creation
    fn initial_nut_type(&self) -> NutType;

    /// Raw version number, before callbacks
    fn version_number(&self) -> &VersionNumber;

    /// URI of a proxy serving this nut, if any
    fn proxy_uri(&self) -> Option<String> {
        None
    }

    /// File containing this nut when it was extracted from another file
    fn parent_file(&self) -> Option<String> {
        None
    }

    /// Whether the content changes between reads and must not be cached
    fn is_dynamic(&self) -> bool {
        false
    }

    /// Open the raw content
    ///
    /// # Errors
    /// [`NutError::NotFound`] when the content is unreachable, or any I/O failure.
    fn open_stream(&self) -> NutResult<Input>;
}

/// Nut carrying transformation state
///
/// # Contract
/// `transform` runs at most once per instance: a second call fails with
/// [`NutError::IllegalState`] and `is_transformed` never reverts to `false`.
pub trait ConvertibleNut: Nut {
    /// Mutable transformation state
    fn attributes(&self) -> &NutAttributes;

    /// Transform the content, notifying `on_ready` then the nut's own ready callbacks
    ///
    /// # Errors
    /// [`NutError::IllegalState`] on a second call, or any stream failure.
    fn transform(&self, on_ready: &[OnReady]) -> NutResult<Vec<TransformationStat>>;

    /// Whether `transform` was already called
    fn is_transformed(&self) -> bool;

    /// Current name
    fn name(&self) -> String {
        self.attributes().name()
    }

    /// Rename the nut
    ///
    /// # Errors
    /// Frozen nuts reject renaming with [`NutError::IllegalState`].
    fn set_nut_name(&self, name: &str) -> NutResult<()> {
        self.attributes().set_name(name);
        Ok(())
    }

    /// Current type
    fn nut_type(&self) -> NutType {
        self.attributes().nut_type()
    }

    /// Change the type
    fn set_nut_type(&self, nut_type: NutType) {
        self.attributes().set_nut_type(nut_type);
    }

    /// Whether the content is gzip compressed
    fn is_compressed(&self) -> bool {
        self.attributes().is_compressed()
    }

    /// Flag the content as compressed
    fn set_is_compressed(&self, compressed: bool) {
        self.attributes().set_compressed(compressed);
    }

    /// Whether the nut is only served as part of another one
    fn is_sub_resource(&self) -> bool {
        self.attributes().is_sub_resource()
    }

    /// Flag the nut as a sub resource
    fn set_is_sub_resource(&self, sub_resource: bool) {
        self.attributes().set_sub_resource(sub_resource);
    }

    /// Registered transformers in execution order
    fn transformers(&self) -> Vec<NutTransformer> {
        self.attributes().transformers()
    }

    /// Register a transformer
    ///
    /// # Errors
    /// [`NutError::Pipe`] when an aggregatable transformer would run after one
    /// that is not. Frozen nuts reject new transformers with
    /// [`NutError::IllegalState`].
    fn add_transformer(&self, transformer: NutTransformer) -> NutResult<()> {
        self.attributes().add_transformer(transformer)
    }

    /// Callbacks notified after transformation
    fn ready_callbacks(&self) -> Vec<OnReady> {
        self.attributes().ready_callbacks()
    }

    /// Register a ready callback
    fn add_ready_callback(&self, callback: OnReady) {
        self.attributes().add_ready_callback(callback);
    }

    /// Nuts referenced by the content, unique by name
    fn referenced_nuts(&self) -> Vec<NutRef> {
        self.attributes().referenced_nuts()
    }

    /// Reference another nut, replacing any previous reference with the same initial name
    ///
    /// # Errors
    /// [`NutError::DynamicReference`] when `nut` is dynamic and this nut is not.
    fn add_referenced_nut(&self, nut: NutRef) -> NutResult<()> {
        if nut.is_dynamic() && !self.is_dynamic() {
            return Err(NutError::DynamicReference {
                nut: self.name(),
                referenced: nut.name(),
            });
        }
        self.attributes().add_referenced_nut(nut);
        Ok(())
    }

    /// Provenance of the nut
    fn source(&self) -> Source {
        self.attributes().source()
    }

    /// Record an original nut this one derives from
    fn add_original_nut(&self, nut: NutRef) {
        self.attributes().add_original_nut(nut);
    }

    /// Register a version callback
    fn add_version_number_callback(&self, callback: VersionCallback) {
        self.attributes().add_version_callback(callback);
    }

    /// Constituents when the nut aggregates several nuts
    fn composition(&self) -> Option<Vec<NutRef>> {
        None
    }
}

impl dyn ConvertibleNut {
    /// Version number after every version callback, forced non-negative
    #[must_use]
    pub fn resolved_version_number(&self) -> i64 {
        let callbacks = self.attributes().version_callbacks();
        let raw = self.version_number().get();
        positive(callbacks.iter().fold(raw, |value, callback| callback(self, value)))
    }
}

/// Identity comparison of two nut handles
#[must_use]
pub fn same_nut(a: &NutRef, b: &NutRef) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

/// Walk the first original nut of each provenance down to the nut a DAO created
#[must_use]
pub fn root_of(nut: &NutRef) -> NutRef {
    let mut current = Arc::clone(nut);
    loop {
        let next = current.source().original_nuts().first().cloned();
        match next {
            Some(original) => current = original,
            None => return current,
        }
    }
}

/// Ordered, append-only provenance of a derived nut
#[derive(Clone, Default)]
pub struct Source {
    originals: Vec<NutRef>,
}

impl Source {
    /// Create empty provenance
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Provenance made of the given nuts
    #[must_use]
    pub fn of(originals: Vec<NutRef>) -> Self {
        Self { originals }
    }

    /// Append an original nut
    pub fn add_original_nut(&mut self, nut: NutRef) {
        self.originals.push(nut);
    }

    /// Original nuts in insertion order
    #[inline]
    #[must_use]
    pub fn original_nuts(&self) -> &[NutRef] {
        &self.originals
    }

    /// Whether no original nut is recorded
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }
}

impl Debug for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.originals.iter().map(|n| n.initial_name().to_string()))
            .finish()
    }
}

struct AttributeState {
    name: String,
    nut_type: NutType,
    compressed: bool,
    sub_resource: bool,
    transformers: TransformerSet<dyn ConvertibleNut>,
    ready_callbacks: Vec<OnReady>,
    referenced: Vec<NutRef>,
    source: Source,
    version_callbacks: Vec<VersionCallback>,
}

/// Mutable transformation state shared by convertible nut implementations
pub struct NutAttributes {
    state: RwLock<AttributeState>,
}

impl NutAttributes {
    /// Fresh state for a nut named `name`
    #[must_use]
    pub fn new(name: impl Into<String>, nut_type: NutType) -> Self {
        Self {
            state: RwLock::new(AttributeState {
                name: name.into(),
                nut_type,
                compressed: false,
                sub_resource: false,
                transformers: TransformerSet::new(),
                ready_callbacks: Vec::new(),
                referenced: Vec::new(),
                source: Source::new(),
                version_callbacks: Vec::new(),
            }),
        }
    }

    /// Copy the state of another nut
    #[must_use]
    pub fn copied_from(nut: &dyn ConvertibleNut) -> Self {
        let attributes = Self::new(nut.name(), nut.nut_type());
        {
            let mut state = attributes.state.write();
            state.compressed = nut.is_compressed();
            state.sub_resource = nut.is_sub_resource();
            state.transformers.extend(nut.transformers());
            state.ready_callbacks = nut.ready_callbacks();
            state.referenced = nut.referenced_nuts();
            state.source = nut.source();
            state.version_callbacks = nut.attributes().version_callbacks();
        }
        attributes
    }

    /// Current name
    #[must_use]
    pub fn name(&self) -> String {
        self.state.read().name.clone()
    }

    /// Rename
    pub fn set_name(&self, name: &str) {
        self.state.write().name = name.to_string();
    }

    /// Current type
    #[must_use]
    pub fn nut_type(&self) -> NutType {
        self.state.read().nut_type
    }

    /// Change type
    pub fn set_nut_type(&self, nut_type: NutType) {
        self.state.write().nut_type = nut_type;
    }

    /// Compression flag
    #[must_use]
    pub fn is_compressed(&self) -> bool {
        self.state.read().compressed
    }

    /// Set compression flag
    pub fn set_compressed(&self, compressed: bool) {
        self.state.write().compressed = compressed;
    }

    /// Sub resource flag
    #[must_use]
    pub fn is_sub_resource(&self) -> bool {
        self.state.read().sub_resource
    }

    /// Set sub resource flag
    pub fn set_sub_resource(&self, sub_resource: bool) {
        self.state.write().sub_resource = sub_resource;
    }

    /// Transformers in execution order
    #[must_use]
    pub fn transformers(&self) -> Vec<NutTransformer> {
        self.state.read().transformers.to_vec()
    }

    /// Whether any transformer is registered
    #[must_use]
    pub fn has_transformers(&self) -> bool {
        !self.state.read().transformers.is_empty()
    }

    /// Add transformer, ignoring duplicates
    ///
    /// # Errors
    /// [`NutError::Pipe`] when the transformer breaks aggregation ordering.
    pub fn add_transformer(&self, transformer: NutTransformer) -> NutResult<()> {
        self.state.write().transformers.try_insert(transformer)?;
        Ok(())
    }

    /// Ready callbacks
    #[must_use]
    pub fn ready_callbacks(&self) -> Vec<OnReady> {
        self.state.read().ready_callbacks.clone()
    }

    /// Add ready callback
    pub fn add_ready_callback(&self, callback: OnReady) {
        self.state.write().ready_callbacks.push(callback);
    }

    /// Referenced nuts
    #[must_use]
    pub fn referenced_nuts(&self) -> Vec<NutRef> {
        self.state.read().referenced.clone()
    }

    /// Add referenced nut; an existing entry with the same initial name is
    /// dropped and the new one appended
    pub fn add_referenced_nut(&self, nut: NutRef) {
        let mut state = self.state.write();
        state
            .referenced
            .retain(|existing| existing.initial_name() != nut.initial_name());
        state.referenced.push(nut);
    }

    /// Provenance
    #[must_use]
    pub fn source(&self) -> Source {
        self.state.read().source.clone()
    }

    /// Append original nut
    pub fn add_original_nut(&self, nut: NutRef) {
        self.state.write().source.add_original_nut(nut);
    }

    /// Version callbacks in registration order
    #[must_use]
    pub fn version_callbacks(&self) -> Vec<VersionCallback> {
        self.state.read().version_callbacks.clone()
    }

    /// Add version callback
    pub fn add_version_callback(&self, callback: VersionCallback) {
        self.state.write().version_callbacks.push(callback);
    }
}

impl Debug for NutAttributes {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("NutAttributes")
            .field("name", &state.name)
            .field("nut_type", &state.nut_type)
            .field("compressed", &state.compressed)
            .field("transformers", &state.transformers)
            .field(
                "referenced",
                &state.referenced.iter().map(|n| n.name()).collect::<Vec<_>>(),
            )
            .field("source", &state.source)
            .finish_non_exhaustive()
    }
}
