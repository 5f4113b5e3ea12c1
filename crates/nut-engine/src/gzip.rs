//! Binary compression

use crate::engine::{Chain, Engine, EngineRequest, EngineType};
use crate::error::EngineResult;
use flate2::write::GzEncoder;
use flate2::Compression;
use nut_model::{ConvertibleNut, NutRef, NutTransformer};
use nut_pipe::{Input, Output, PipeResult, Transformer};
use std::sync::Arc;
use tracing::debug;

/// Gzips the whole transformed content, after every other stage
#[derive(Debug, Clone, Copy, Default)]
pub struct GzipTransformer;

impl Transformer<dyn ConvertibleNut> for GzipTransformer {
    fn transform(
        &self,
        input: &mut Input,
        output: &mut Output,
        nut: &dyn ConvertibleNut,
    ) -> PipeResult<bool> {
        let mut encoder = GzEncoder::new(&mut *output, Compression::default());
        input.copy_to(&mut encoder)?;
        encoder.finish()?;
        nut.set_is_compressed(true);
        Ok(true)
    }

    fn can_aggregate_transformed_stream(&self) -> bool {
        false
    }

    fn order(&self) -> i32 {
        EngineType::BinaryCompression.order()
    }

    fn name(&self) -> &str {
        "gzip"
    }
}

/// Compresses every nut of a request and the nuts they reference
#[derive(Debug, Clone)]
pub struct GzipEngine {
    compress: bool,
    transformer: NutTransformer,
}

impl GzipEngine {
    /// Create the engine, inactive when `compress` is false
    #[must_use]
    pub fn new(compress: bool) -> Self {
        Self {
            compress,
            transformer: Arc::new(GzipTransformer),
        }
    }

    /// Whether nuts are compressed
    #[inline]
    #[must_use]
    pub fn compresses(&self) -> bool {
        self.compress
    }

    fn compress(&self, nut: &NutRef) -> EngineResult<()> {
        if nut.is_compressed() {
            return Ok(());
        }
        nut.set_is_compressed(true);
        nut.add_transformer(Arc::clone(&self.transformer))?;
        for referenced in nut.referenced_nuts() {
            self.compress(&referenced)?;
        }
        Ok(())
    }
}

impl Default for GzipEngine {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Engine for GzipEngine {
    fn engine_type(&self) -> EngineType {
        EngineType::BinaryCompression
    }

    fn works(&self) -> bool {
        self.compress
    }

    fn parse(&self, request: &EngineRequest, next: Chain<'_>) -> EngineResult<Vec<NutRef>> {
        for nut in request.nuts() {
            self.compress(nut)?;
        }
        debug!(workflow = %request.workflow_id(), nuts = request.nuts().len(), "nuts compressed");
        next.run(request)
    }
}
