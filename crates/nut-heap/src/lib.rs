//! Nut Heap
//!
//! Resolution of nut paths through DAOs, polling and change notification.
//!
//! # Core Concepts
//!
//! - [`NutDao`]: Turns path patterns into nuts and reports changes to listeners
//! - [`ResourceDao`]: DAO over a [`DaoBackend`] such as [`MemoryBackend`]
//! - [`WithRootPathDao`]: DAO decorator resolving paths under a root
//! - [`PollingScheduler`]: Periodic polling with a per-cycle exclusion set
//! - [`NutsHeap`]: Named set of nuts, reloaded and re-notified on change
//!
//! # Example
//!
//! ```rust,ignore
//! use nut_heap::{MemoryBackend, NutsHeap, ResourceDao};
//!
//! let backend = Arc::new(MemoryBackend::new());
//! backend.put("js/app.js", "app()");
//! let dao = ResourceDao::builder(backend).polling_interval(5).build()?;
//! let heap = NutsHeap::builder("scripts").path("js/.*").dao(dao).build()?;
//! heap.add_observer(Arc::new(invalidate_cache));
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod backend;
mod dao;
mod error;
mod heap;
mod polling;
mod resource_dao;
mod root_path;

// Re-exports
pub use backend::{DaoBackend, MemoryBackend};
pub use dao::{
    same_listener, NutDao, NutDaoListener, PathFormat, ProcessContext, VersionNumberStrategy,
};
pub use error::{HeapError, HeapResult};
pub use heap::{HeapBuilder, HeapListener, ListenerId, NutsHeap};
pub use polling::{PollReport, PollSource, PollingScheduler};
pub use resource_dao::{ResourceDao, ResourceDaoBuilder};
pub use root_path::{with_root_path, WithRootPathDao};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
