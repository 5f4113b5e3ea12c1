//! Text aggregation

use crate::engine::{Chain, Engine, EngineRequest, EngineType};
use crate::error::EngineResult;
use nut_model::path::merge_path;
use nut_model::{Combiner, CompositeNut, ConvertibleNut, NutRef, NutType};
use tracing::debug;

/// Separator written after each aggregated nut
pub const AGGREGATE_SEPARATOR: &[u8] = b"\n";

/// Aggregates the CSS and JavaScript nuts of a request
///
/// When aggregation is enabled all nuts become one [`CompositeNut`] named
/// `aggregate.<ext>`; otherwise consecutive nuts sharing a name are combined.
#[derive(Debug, Clone, Copy)]
pub struct TextAggregatorEngine {
    aggregate: bool,
}

impl TextAggregatorEngine {
    /// Create the engine
    #[inline]
    #[must_use]
    pub fn new(aggregate: bool) -> Self {
        Self { aggregate }
    }

    /// Whether nuts are aggregated into a single one
    #[inline]
    #[must_use]
    pub fn aggregates(&self) -> bool {
        self.aggregate
    }

    fn aggregation(&self, request: &EngineRequest) -> EngineResult<Vec<NutRef>> {
        let nuts = request.nuts();
        let Some(first) = nuts.first() else {
            return Ok(Vec::new());
        };

        if !self.aggregate {
            return Ok(Combiner::new().merge_nuts(nuts)?);
        }

        let file = format!("aggregate{}", first.nut_type().primary_extension());
        let name = match request.created_nut_prefix() {
            "" => file,
            prefix => merge_path(&[prefix, &file]),
        };
        debug!(name = %name, nuts = nuts.len(), "aggregating nuts");
        let composite: NutRef = CompositeNut::new(name, Some(AGGREGATE_SEPARATOR), nuts)?;
        Ok(vec![composite])
    }
}

impl Default for TextAggregatorEngine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Engine for TextAggregatorEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::Aggregator
    }

    fn handles(&self, nut_type: NutType) -> bool {
        matches!(nut_type, NutType::Css | NutType::Javascript)
    }

    fn parse(&self, request: &EngineRequest, next: Chain<'_>) -> EngineResult<Vec<NutRef>> {
        let nuts = self.aggregation(request)?;
        next.run(&request.with_nuts(nuts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::EngineChain;
    use nut_model::{transform_to_bytes, Nut};
    use nut_test_utils::memory_heap;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn request(files: &[(&str, &str)]) -> EngineRequest {
        EngineRequest::new("wf", memory_heap(files)).unwrap()
    }

    #[test]
    fn aggregates_each_type_separately() {
        let chain = EngineChain::new(vec![Arc::new(TextAggregatorEngine::new(true))]);
        let result = chain
            .parse(&request(&[("a.js", "var a;"), ("b.js", "var b;"), ("c.css", "c{}")]))
            .unwrap();

        let names: Vec<String> = result.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["aggregate.js", "aggregate.css"]);
        assert_eq!(transform_to_bytes(result[0].as_ref()).unwrap(), b"var a;\nvar b;\n");
        assert_eq!(result[0].composition().map(|c| c.len()), Some(2));
    }

    #[test]
    fn prefix_is_applied_to_aggregate_name() {
        let chain = EngineChain::new(vec![Arc::new(TextAggregatorEngine::new(true))]);
        let request = request(&[("a.js", "var a;")]).prefix_created_nut("best");
        let result = chain.parse(&request).unwrap();
        assert_eq!(result[0].name(), "best/aggregate.js");
    }

    #[test]
    fn disabled_aggregation_combines_duplicates() {
        let chain = EngineChain::new(vec![Arc::new(TextAggregatorEngine::new(false))]);
        let result = chain.parse(&request(&[("a.js", "1"), ("b.js", "2")])).unwrap();
        let names: Vec<String> = result.iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["a.js", "b.js"]);
        assert_eq!(result[1].open_stream().unwrap().read_to_string().unwrap(), "2");
    }

    #[test]
    fn binary_nuts_are_not_aggregated() {
        let chain = EngineChain::new(vec![Arc::new(TextAggregatorEngine::default())]);
        let result = chain.parse(&request(&[("a.png", "p1"), ("b.png", "p2")])).unwrap();
        assert_eq!(result.len(), 2);
    }
}
