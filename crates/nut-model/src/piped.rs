//! Base convertible nut
//!
//! [`PipedNut`] opens its content through a [`ContentOpener`] and transforms it
//! with a [`NutPipe`] over its registered transformers. Nuts built from memory
//! ([`PipedNut::from_bytes`]) keep an immutable copy of their bytes.

use crate::error::{NutError, NutResult};
use crate::nut::{ConvertibleNut, Nut, NutAttributes, NutPipe, NutRef};
use crate::nut_type::NutType;
use crate::version::VersionNumber;
use nut_pipe::{Input, OnReady, TransformationStat};
use parking_lot::RwLock;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Provides the raw content of a nut
pub trait ContentOpener: Send + Sync {
    /// Open a fresh stream over the content
    ///
    /// # Errors
    /// [`NutError::NotFound`] when the content disappeared, or any I/O failure.
    fn open(&self) -> NutResult<Input>;
}

impl<F> ContentOpener for F
where
    F: Fn() -> NutResult<Input> + Send + Sync,
{
    fn open(&self) -> NutResult<Input> {
        self()
    }
}

/// Content held in memory
#[derive(Debug, Clone)]
pub struct BytesContent(Arc<[u8]>);

impl BytesContent {
    /// Copy `bytes` into an immutable buffer
    #[must_use]
    pub fn new(bytes: &[u8]) -> Self {
        Self(Arc::from(bytes))
    }

    /// Content length
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the content is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ContentOpener for BytesContent {
    fn open(&self) -> NutResult<Input> {
        Ok(Input::from_bytes(self.0.to_vec()))
    }
}

/// Convertible nut transformed through a pipe
pub struct PipedNut {
    initial_name: String,
    initial_type: NutType,
    version: VersionNumber,
    proxy_uri: RwLock<Option<String>>,
    parent_file: Option<String>,
    dynamic: bool,
    attributes: NutAttributes,
    opener: Arc<dyn ContentOpener>,
    transformed: AtomicBool,
}

impl PipedNut {
    /// Start building a nut
    #[must_use]
    pub fn builder(name: impl Into<String>, nut_type: NutType) -> PipedNutBuilder {
        PipedNutBuilder {
            name: name.into(),
            nut_type,
            version: VersionNumber::default(),
            proxy_uri: None,
            parent_file: None,
            dynamic: false,
            originals: Vec::new(),
        }
    }

    /// In-memory nut over a copy of `bytes`
    ///
    /// # Errors
    /// [`NutError::BadArgument`] for an empty name.
    pub fn from_bytes(
        bytes: &[u8],
        name: impl Into<String>,
        nut_type: NutType,
        version: VersionNumber,
    ) -> NutResult<Self> {
        Self::builder(name, nut_type)
            .version(version)
            .build(BytesContent::new(bytes))
    }

    /// Set the proxy URI resolved by a DAO
    pub fn set_proxy_uri(&self, uri: Option<String>) {
        *self.proxy_uri.write() = uri;
    }
}

impl Nut for PipedNut {
    fn initial_name(&self) -> &str {
        &self.initial_name
    }

    fn initial_nut_type(&self) -> NutType {
        self.initial_type
    }

    fn version_number(&self) -> &VersionNumber {
        &self.version
    }

    fn proxy_uri(&self) -> Option<String> {
        self.proxy_uri.read().clone()
    }

    fn parent_file(&self) -> Option<String> {
        self.parent_file.clone()
    }

    fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    fn open_stream(&self) -> NutResult<Input> {
        self.opener.open()
    }
}

impl ConvertibleNut for PipedNut {
    fn attributes(&self) -> &NutAttributes {
        &self.attributes
    }

    fn transform(&self, on_ready: &[OnReady]) -> NutResult<Vec<TransformationStat>> {
        if self.transformed.swap(true, Ordering::SeqCst) {
            return Err(NutError::illegal_state(format!(
                "nut '{}' cannot be transformed twice",
                self.name()
            )));
        }

        let mut callbacks = on_ready.to_vec();
        callbacks.extend(self.ready_callbacks());

        let mut pipe = NutPipe::new(self, self.open_stream()?);
        pipe.register_all(self.transformers())?;
        let run = pipe.execute(&callbacks)?;

        debug!(
            nut = %self.name(),
            stages = run.stats.len(),
            bytes = run.execution.len(),
            "nut transformed"
        );
        Ok(run.stats)
    }

    fn is_transformed(&self) -> bool {
        self.transformed.load(Ordering::SeqCst)
    }
}

impl Debug for PipedNut {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipedNut")
            .field("initial_name", &self.initial_name)
            .field("initial_type", &self.initial_type)
            .field("version", &self.version)
            .field("dynamic", &self.dynamic)
            .field("attributes", &self.attributes)
            .field("transformed", &self.is_transformed())
            .finish_non_exhaustive()
    }
}

/// Builder for [`PipedNut`]
#[derive(Debug)]
pub struct PipedNutBuilder {
    name: String,
    nut_type: NutType,
    version: VersionNumber,
    proxy_uri: Option<String>,
    parent_file: Option<String>,
    dynamic: bool,
    originals: Vec<NutRef>,
}

impl PipedNutBuilder {
    /// Set version number
    #[inline]
    #[must_use]
    pub fn version(mut self, version: VersionNumber) -> Self {
        self.version = version;
        self
    }

    /// Set proxy URI
    #[inline]
    #[must_use]
    pub fn proxy_uri(mut self, uri: impl Into<String>) -> Self {
        self.proxy_uri = Some(uri.into());
        self
    }

    /// Set parent file
    #[inline]
    #[must_use]
    pub fn parent_file(mut self, file: impl Into<String>) -> Self {
        self.parent_file = Some(file.into());
        self
    }

    /// Mark the nut as dynamic
    #[inline]
    #[must_use]
    pub fn dynamic(mut self, dynamic: bool) -> Self {
        self.dynamic = dynamic;
        self
    }

    /// Record an original nut
    #[inline]
    #[must_use]
    pub fn original(mut self, nut: NutRef) -> Self {
        self.originals.push(nut);
        self
    }

    /// Build the nut over `opener`
    ///
    /// # Errors
    /// [`NutError::BadArgument`] for an empty name.
    pub fn build<O>(self, opener: O) -> NutResult<PipedNut>
    where
        O: ContentOpener + 'static,
    {
        if self.name.is_empty() {
            return Err(NutError::bad_argument("nut name cannot be empty"));
        }

        let attributes = NutAttributes::new(self.name.clone(), self.nut_type);
        for original in self.originals {
            attributes.add_original_nut(original);
        }

        Ok(PipedNut {
            initial_name: self.name,
            initial_type: self.nut_type,
            version: self.version,
            proxy_uri: RwLock::new(self.proxy_uri),
            parent_file: self.parent_file,
            dynamic: self.dynamic,
            attributes,
            opener: Arc::new(opener),
            transformed: AtomicBool::new(false),
        })
    }
}
