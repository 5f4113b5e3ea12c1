//! Nut decorators
//!
//! Each decorator holds the wrapped nut and forwards everything except what
//! it changes: [`PrefixedNut`] changes the name, [`TransformedNut`] freezes an
//! already transformed nut.

use crate::error::{NutError, NutResult};
use crate::nut::{ConvertibleNut, Nut, NutAttributes, NutRef, NutTransformer};
use crate::nut_type::NutType;
use crate::path::merge_path;
use crate::version::VersionNumber;
use nut_pipe::{Input, OnReady, TransformationStat};
use parking_lot::RwLock;
use std::sync::Arc;

/// Nut exposed under another name
#[derive(Debug)]
pub struct PrefixedNut {
    inner: NutRef,
    name: RwLock<String>,
}

impl PrefixedNut {
    /// Prefix the current name of `inner`
    ///
    /// With `as_path` the prefix is joined as a directory, otherwise it is
    /// prepended as is.
    #[must_use]
    pub fn new(inner: NutRef, prefix: &str, as_path: bool) -> Self {
        let current = inner.name();
        let name = if as_path {
            merge_path(&[prefix, &current])
        } else {
            format!("{prefix}{current}")
        };
        Self::renamed(inner, name)
    }

    /// Expose `inner` under `name`
    #[must_use]
    pub fn renamed(inner: NutRef, name: impl Into<String>) -> Self {
        Self {
            inner,
            name: RwLock::new(name.into()),
        }
    }

    /// Wrapped nut
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &NutRef {
        &self.inner
    }
}

impl Nut for PrefixedNut {
    fn initial_name(&self) -> &str {
        self.inner.initial_name()
    }

    fn initial_nut_type(&self) -> NutType {
        self.inner.initial_nut_type()
    }

    fn version_number(&self) -> &VersionNumber {
        self.inner.version_number()
    }

    fn proxy_uri(&self) -> Option<String> {
        self.inner.proxy_uri()
    }

    fn parent_file(&self) -> Option<String> {
        self.inner.parent_file()
    }

    fn is_dynamic(&self) -> bool {
        self.inner.is_dynamic()
    }

    fn open_stream(&self) -> NutResult<Input> {
        self.inner.open_stream()
    }
}

impl ConvertibleNut for PrefixedNut {
    fn attributes(&self) -> &NutAttributes {
        self.inner.attributes()
    }

    fn transform(&self, on_ready: &[OnReady]) -> NutResult<Vec<TransformationStat>> {
        self.inner.transform(on_ready)
    }

    fn is_transformed(&self) -> bool {
        self.inner.is_transformed()
    }

    fn name(&self) -> String {
        self.name.read().clone()
    }

    fn set_nut_name(&self, name: &str) -> NutResult<()> {
        *self.name.write() = name.to_string();
        Ok(())
    }

    fn add_transformer(&self, transformer: NutTransformer) -> NutResult<()> {
        self.inner.add_transformer(transformer)
    }

    fn add_referenced_nut(&self, nut: NutRef) -> NutResult<()> {
        self.inner.add_referenced_nut(nut)
    }

    fn composition(&self) -> Option<Vec<NutRef>> {
        self.inner.composition()
    }
}

/// Frozen view over already transformed content
///
/// The content can be replayed any number of times; renaming and adding
/// transformers or references is rejected.
#[derive(Debug)]
pub struct TransformedNut {
    inner: NutRef,
}

impl TransformedNut {
    /// Freeze `inner`
    #[must_use]
    pub fn new(inner: NutRef) -> Self {
        Self { inner }
    }

    /// Wrapped nut
    #[inline]
    #[must_use]
    pub fn inner(&self) -> &NutRef {
        &self.inner
    }

    fn frozen(&self, operation: &str) -> NutError {
        NutError::illegal_state(format!(
            "cannot {operation} on transformed nut '{}'",
            self.inner.name()
        ))
    }
}

impl Nut for TransformedNut {
    fn initial_name(&self) -> &str {
        self.inner.initial_name()
    }

    fn initial_nut_type(&self) -> NutType {
        self.inner.initial_nut_type()
    }

    fn version_number(&self) -> &VersionNumber {
        self.inner.version_number()
    }

    fn proxy_uri(&self) -> Option<String> {
        self.inner.proxy_uri()
    }

    fn parent_file(&self) -> Option<String> {
        self.inner.parent_file()
    }

    fn is_dynamic(&self) -> bool {
        self.inner.is_dynamic()
    }

    fn open_stream(&self) -> NutResult<Input> {
        self.inner.open_stream()
    }
}

impl ConvertibleNut for TransformedNut {
    fn attributes(&self) -> &NutAttributes {
        self.inner.attributes()
    }

    fn transform(&self, on_ready: &[OnReady]) -> NutResult<Vec<TransformationStat>> {
        let execution = self.inner.open_stream()?.execution()?;
        for callback in on_ready.iter().chain(self.ready_callbacks().iter()) {
            callback(&execution)?;
        }
        Ok(Vec::new())
    }

    fn is_transformed(&self) -> bool {
        true
    }

    fn set_nut_name(&self, _name: &str) -> NutResult<()> {
        Err(self.frozen("rename"))
    }

    fn add_transformer(&self, _transformer: NutTransformer) -> NutResult<()> {
        Err(self.frozen("add a transformer"))
    }

    fn add_referenced_nut(&self, _nut: NutRef) -> NutResult<()> {
        Err(self.frozen("add a referenced nut"))
    }

    fn composition(&self) -> Option<Vec<NutRef>> {
        self.inner.composition()
    }
}

impl From<NutRef> for TransformedNut {
    fn from(inner: NutRef) -> Self {
        Self::new(inner)
    }
}

/// Shorthand to freeze a nut behind a shared handle
#[must_use]
pub fn freeze(nut: NutRef) -> NutRef {
    Arc::new(TransformedNut::new(nut))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piped::PipedNut;
    use nut_pipe::on_ready;
    use parking_lot::Mutex;

    fn css(name: &str, content: &str) -> NutRef {
        Arc::new(
            PipedNut::from_bytes(content.as_bytes(), name, NutType::Css, VersionNumber::fixed(2))
                .unwrap(),
        )
    }

    #[test]
    fn prefixed_nut_joins_as_path() {
        let nut = PrefixedNut::new(css("a.css", ""), "best-effort", true);
        assert_eq!(nut.name(), "best-effort/a.css");
        assert_eq!(nut.initial_name(), "a.css");
        assert_eq!(nut.version_number().get(), 2);
    }

    #[test]
    fn prefixed_nut_prepends_raw_prefix() {
        let nut = PrefixedNut::new(css("a.css", ""), "min-", false);
        assert_eq!(nut.name(), "min-a.css");
        nut.set_nut_name("b.css").unwrap();
        assert_eq!(nut.name(), "b.css");
        assert_eq!(nut.inner().name(), "a.css");
    }

    #[test]
    fn transformed_nut_rejects_mutation() {
        let frozen = TransformedNut::new(css("a.css", "x"));
        assert!(matches!(frozen.set_nut_name("b.css"), Err(NutError::IllegalState(_))));
        assert!(matches!(
            frozen.add_referenced_nut(css("b.css", "")),
            Err(NutError::IllegalState(_))
        ));
        assert!(frozen.is_transformed());
    }

    #[test]
    fn transformed_nut_replays_content() {
        let frozen = freeze(css("a.css", "body{}"));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback = on_ready(move |e| {
            sink.lock().push(e.to_text().into_owned());
            Ok(())
        });
        frozen.transform(&[callback.clone()]).unwrap();
        frozen.transform(&[callback]).unwrap();
        assert_eq!(*seen.lock(), vec!["body{}", "body{}"]);
    }
}
