//! Nut Model
//!
//! Resources ("nuts") flowing through the asset pipeline.
//!
//! # Core Concepts
//!
//! - [`Nut`]: Immutable identity of a resource (initial name, type, version)
//! - [`ConvertibleNut`]: Nut with transformation state, transformed at most once
//! - [`PipedNut`]: Base convertible nut backed by a [`ContentOpener`]
//! - [`PrefixedNut`] / [`TransformedNut`]: Decorators renaming or freezing a nut
//! - [`NotReachableNut`]: Nut known by name only, content access fails
//! - [`CompositeNut`]: Several nuts read as one stream with [`Position`] tracking
//! - [`Combiner`]: Groups consecutive same-named nuts into composites
//! - [`VersionNumber`]: Memoized, possibly asynchronous version computation
//! - [`SourceMap`]: v3 source map of an aggregated nut
//!
//! # Example
//!
//! ```rust,ignore
//! use nut_model::{CompositeNut, NutType, PipedNut, VersionNumber};
//!
//! let a = Arc::new(PipedNut::from_bytes(b"var a;", "a.js", NutType::Javascript, VersionNumber::fixed(1))?);
//! let b = Arc::new(PipedNut::from_bytes(b"var b;", "b.js", NutType::Javascript, VersionNumber::fixed(1))?);
//! let all = CompositeNut::new("all.js", Some(b"\n"), &[a, b])?;
//! let stats = all.transform(&[on_ready(|e| serve(e))])?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod combiner;
mod composite;
mod error;
mod hash;
mod lookup;
mod nut;
mod nut_type;
mod piped;
mod pool;
mod source_map;
mod unreachable;
mod version;
mod wrapper;

/// Path helpers shared by DAOs, heaps and engines
pub mod path;

// Re-exports
pub use combiner::{merge_nuts, Combiner};
pub use composite::{CompositeInput, CompositeNut, Position, Segment};
pub use error::{NutError, NutResult};
pub use hash::ContentHash;
pub use lookup::{find_by_name, to_byte_array_nut, transform_to_bytes};
pub use nut::{
    root_of, same_nut, ConvertibleNut, Nut, NutAttributes, NutPipe, NutRef, NutTransformer,
    Source, VersionCallback,
};
pub use nut_type::{HtmlHint, NutType};
pub use piped::{BytesContent, ContentOpener, PipedNut, PipedNutBuilder};
pub use pool::{ScheduledTask, WorkerPool};
pub use source_map::{decode_vlq, encode_vlq, LineMapping, SourceMap};
pub use unreachable::NotReachableNut;
pub use version::{combine_versions, positive, version_of_content, VersionNumber};
pub use wrapper::{freeze, PrefixedNut, TransformedNut};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
