//! Transformer trait and ordered transformer sets
//!
//! A [`Transformer`] reads an [`Input`] and writes an [`Output`] on behalf of a
//! convertible object. [`TransformerSet`] keeps transformers unique by identity
//! and sorted by [`Transformer::order`].

use crate::error::{PipeError, PipeResult};
use crate::io::{Input, Output};
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;

/// Content transformation stage
///
/// # Contract
/// - Return `true` when the transformer wrote the transformed content to `output`.
/// - Return `false` to leave the content untouched: the pipe forwards whatever
///   part of `input` was not consumed.
/// - `can_aggregate_transformed_stream` is `false` for stages whose output must
///   appear once per aggregated stream (magic bytes, headers). Such stages must
///   be registered after every aggregatable stage.
pub trait Transformer<T: ?Sized>: Send + Sync + Debug {
    /// Transform `input` into `output`
    ///
    /// # Errors
    /// Any I/O failure while streaming, or a transformer-specific failure.
    fn transform(&self, input: &mut Input, output: &mut Output, convertible: &T)
        -> PipeResult<bool>;

    /// Whether the output of this stage can be concatenated with other outputs
    fn can_aggregate_transformed_stream(&self) -> bool {
        true
    }

    /// Sort key inside a [`TransformerSet`], lower runs first
    fn order(&self) -> i32 {
        0
    }

    /// Name used in statistics and diagnostics
    fn name(&self) -> &str;
}

/// Shared handle to a transformer
pub type SharedTransformer<T> = Arc<dyn Transformer<T>>;

/// Identity comparison of two shared transformers
#[inline]
#[must_use]
pub fn same_transformer<T: ?Sized>(a: &SharedTransformer<T>, b: &SharedTransformer<T>) -> bool {
    Arc::as_ptr(a).cast::<()>() == Arc::as_ptr(b).cast::<()>()
}

/// Transformer copying its input unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyTransformer;

impl<T: ?Sized> Transformer<T> for CopyTransformer {
    fn transform(&self, input: &mut Input, output: &mut Output, _convertible: &T) -> PipeResult<bool> {
        input.copy_to(output)?;
        Ok(true)
    }

    fn name(&self) -> &str {
        "copy"
    }
}

/// Ordered set of transformers
///
/// Uniqueness is by identity (the same `Arc`), ordering is by
/// [`Transformer::order`] and then by insertion.
pub struct TransformerSet<T: ?Sized> {
    entries: Vec<SharedTransformer<T>>,
}

impl<T: ?Sized> TransformerSet<T> {
    /// Create empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert a transformer, returning `false` if it was already present
    pub fn insert(&mut self, transformer: SharedTransformer<T>) -> bool {
        if self.contains(&transformer) {
            return false;
        }
        let order = transformer.order();
        let index = self
            .entries
            .iter()
            .position(|t| t.order() > order)
            .unwrap_or(self.entries.len());
        self.entries.insert(index, transformer);
        true
    }

    /// Insert a transformer unless it breaks aggregation ordering
    ///
    /// The check runs against the position `transformer` takes once sorted by
    /// [`Transformer::order`]: no aggregatable stage may follow a stage that
    /// is not aggregatable. The set is left untouched on error.
    ///
    /// # Errors
    /// [`PipeError::IllegalOrder`] naming the offending pair.
    pub fn try_insert(&mut self, transformer: SharedTransformer<T>) -> PipeResult<bool> {
        if self.contains(&transformer) {
            return Ok(false);
        }
        let order = transformer.order();
        let index = self
            .entries
            .iter()
            .position(|t| t.order() > order)
            .unwrap_or(self.entries.len());

        if transformer.can_aggregate_transformed_stream() {
            if let Some(previous) = self.entries[..index]
                .iter()
                .rev()
                .find(|t| !t.can_aggregate_transformed_stream())
            {
                return Err(PipeError::IllegalOrder {
                    previous: previous.name().to_string(),
                    next: transformer.name().to_string(),
                });
            }
        } else if let Some(next) = self.entries[index..]
            .iter()
            .find(|t| t.can_aggregate_transformed_stream())
        {
            return Err(PipeError::IllegalOrder {
                previous: transformer.name().to_string(),
                next: next.name().to_string(),
            });
        }

        self.entries.insert(index, transformer);
        Ok(true)
    }

    /// Insert every transformer of an iterator
    pub fn extend<I>(&mut self, transformers: I)
    where
        I: IntoIterator<Item = SharedTransformer<T>>,
    {
        for transformer in transformers {
            self.insert(transformer);
        }
    }

    /// Check membership by identity
    #[must_use]
    pub fn contains(&self, transformer: &SharedTransformer<T>) -> bool {
        self.entries.iter().any(|t| same_transformer(t, transformer))
    }

    /// Iterate in execution order
    pub fn iter(&self) -> impl Iterator<Item = &SharedTransformer<T>> {
        self.entries.iter()
    }

    /// Number of transformers
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Copy the transformers out in execution order
    #[must_use]
    pub fn to_vec(&self) -> Vec<SharedTransformer<T>> {
        self.entries.clone()
    }

    /// Split into (aggregatable, aggregate-only) transformers, keeping order
    #[must_use]
    pub fn split_by_aggregation(&self) -> (Vec<SharedTransformer<T>>, Vec<SharedTransformer<T>>) {
        self.entries
            .iter()
            .cloned()
            .partition(|t| t.can_aggregate_transformed_stream())
    }
}

impl<T: ?Sized> Default for TransformerSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ?Sized> Clone for TransformerSet<T> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
        }
    }
}

impl<T: ?Sized> Debug for TransformerSet<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|t| t.name()))
            .finish()
    }
}

impl<T: ?Sized> FromIterator<SharedTransformer<T>> for TransformerSet<T> {
    fn from_iter<I: IntoIterator<Item = SharedTransformer<T>>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}
