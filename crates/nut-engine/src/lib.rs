//! Nut Engine
//!
//! Processing chains, result caching and URL serving of nut heaps.
//!
//! # Core Concepts
//!
//! - [`Engine`]: Step of a chain ordered by [`EngineType`], handing over to the next [`Chain`]
//! - [`EngineRequest`]: Working copies of a heap's nuts plus skip list and context
//! - [`CssInspectorEngine`]: References and rewrites the files named by stylesheets
//! - [`TextAggregatorEngine`]: Aggregates CSS and JavaScript into one nut per type
//! - [`MemoryCacheEngine`]: Freezes results and drops them when the heap changes
//! - [`GzipEngine`]: Compresses served content last
//! - [`StaticEngine`]: Serves workflows listed ahead of time as unreachable nuts
//! - [`WorkflowRegistry`]: Resolves `{workflowId}/{version}/{name}` URLs to content
//! - [`PipelineConfig`]: TOML or YAML settings building the components above
//!
//! # Example
//!
//! ```rust,ignore
//! use nut_engine::{PipelineConfig, Workflow, WorkflowRegistry};
//!
//! let config = PipelineConfig::load("pipeline.toml")?;
//! let dao = config.resource_dao(backend, "static")?;
//! let heap = NutsHeap::builder("scripts").path("js/.*").dao(dao).build()?;
//! let registry = WorkflowRegistry::new();
//! registry.register(Workflow::new("app", heap, Arc::new(config.engine_chain()?))?)?;
//! let served = registry.serve("/app/aggregate.js")?;
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod aggregator;
mod cache;
mod config;
mod engine;
mod error;
mod gzip;
mod inspector;
mod static_workflow;
mod url;
mod workflow;

/// Tracing subscriber installation
pub mod telemetry;

// Re-exports
pub use aggregator::{TextAggregatorEngine, AGGREGATE_SEPARATOR};
pub use cache::{parse_size, MemoryCacheBuilder, MemoryCacheEngine, DEFAULT_MAX_CAPACITY};
pub use config::PipelineConfig;
pub use engine::{Chain, Engine, EngineChain, EngineRequest, EngineType, RequestKey};
pub use error::{EngineError, EngineResult};
pub use gzip::{GzipEngine, GzipTransformer};
pub use inspector::{reference_path, CssInspectorEngine, CssUrlLineInspector};
pub use static_workflow::{
    parse_static_workflow, static_workflow_resource, DirectoryResources, StaticEngine,
    StaticResources, STATIC_WORKFLOW_FILE,
};
pub use telemetry::init_tracing;
pub use url::{url_for, UrlMatcher, URL_PATTERN_MESSAGE};
pub use workflow::{ServedNut, Workflow, WorkflowRegistry};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use nut_heap::NutsHeap;
    use nut_model::Nut;
    use nut_test_utils::HeapFixture;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[test]
    fn served_content_follows_heap_updates() {
        let fixture = HeapFixture::new(&[("css/a.css", "a{}"), ("css/b.css", "b{}")]);
        let chain = Arc::new(PipelineConfig::new().engine_chain().unwrap());
        let registry = WorkflowRegistry::new();
        registry
            .register(Workflow::new("site", fixture.heap.clone(), chain).unwrap())
            .unwrap();

        let before = registry.serve("/site/aggregate.css").unwrap();
        assert_eq!(before.bytes, b"a{}\nb{}\n");

        fixture.update("css/b.css", "b{color:red}");
        let after = registry.serve("/site/aggregate.css").unwrap();
        assert_eq!(after.bytes, b"a{}\nb{color:red}\n");
        assert_ne!(before.version, after.version);
    }

    #[test]
    fn prefixed_workflow_serves_under_prefix() {
        let fixture = HeapFixture::new(&[("a.js", "var a;")]);
        let chain = Arc::new(EngineChain::new(vec![Arc::new(TextAggregatorEngine::default())]));
        let registry = WorkflowRegistry::new();
        let workflow = Workflow::new("app", fixture.heap.clone(), chain)
            .unwrap()
            .prefix_created_nut("bundle");
        registry.register(workflow).unwrap();

        assert_eq!(registry.serve("/app/bundle/aggregate.js").unwrap().bytes, b"var a;\n");
        assert!(registry.serve("/app/aggregate.js").unwrap_err().is_not_found());
    }

    #[test]
    fn static_workflow_lists_names_without_content() {
        let mut files = HashMap::new();
        files.insert(static_workflow_resource("app"), "7/aggregate.js js\n".to_string());
        let chain = Arc::new(EngineChain::new(vec![
            Arc::new(StaticEngine::new(Arc::new(files))),
            Arc::new(TextAggregatorEngine::default()),
        ]));

        let fixture = HeapFixture::new(&[("a.js", "var a;")]);
        let heap: Arc<NutsHeap> = fixture.heap.clone();
        let workflow = Workflow::new("app", heap, chain).unwrap();
        let nuts = workflow.parse().unwrap();
        assert_eq!(nuts.len(), 1);
        assert_eq!(nuts[0].version_number().get(), 7);
        assert_eq!(WorkflowRegistry::url_for(&workflow, &nuts[0]), "/app/7/aggregate.js");

        let registry = WorkflowRegistry::new();
        registry.register(workflow).unwrap();
        assert!(registry.serve("/app/7/aggregate.js").unwrap_err().is_not_found());
    }
}
