//! Nut Pipe System
//!
//! Streaming transformation stages with per-stage statistics.
//!
//! # Core Concepts
//!
//! - [`Input`]: At-most-once consumable source stream
//! - [`Output`]: In-memory sink written by a stage
//! - [`Execution`]: Materialized result handed to [`OnReady`] callbacks
//! - [`Transformer`]: One transformation stage over a convertible object
//! - [`TransformerSet`]: Identity-unique, order-sorted transformer collection
//! - [`Pipe`]: Ordered chain of transformers
//! - [`TransformationStat`]: Timing and exchange record of one stage
//!
//! # Example
//!
//! ```rust,ignore
//! use nut_pipe::{Input, Pipe};
//!
//! let mut pipe = Pipe::new(&nut, Input::from_text("body { color: red; }"));
//! pipe.register(minifier)?;
//! pipe.register(gzip)?;
//! let run = pipe.execute(&[on_ready(|e| cache(e))])?;
//! println!("{} stages", run.stats.len());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod error;
mod io;
mod pipe;
mod stat;
mod transformer;

// Re-exports
pub use error::{PipeError, PipeResult};
pub use io::{Execution, Input, Output, DEFAULT_CHARSET};
pub use pipe::{on_ready, OnReady, Pipe, PipeRun};
pub use stat::{TransformationStat, NO_TRANSFORMATION};
pub use transformer::{same_transformer, CopyTransformer, SharedTransformer, Transformer, TransformerSet};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod integration_tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    /// Convertible used by the tests: records the names of the stages it saw
    #[derive(Debug, Default)]
    struct Document {
        seen: Mutex<Vec<String>>,
    }

    #[derive(Debug)]
    struct Upper;

    impl Transformer<Document> for Upper {
        fn transform(&self, input: &mut Input, output: &mut Output, doc: &Document) -> PipeResult<bool> {
            doc.seen.lock().unwrap().push("upper".into());
            let text = input.read_to_string()?;
            output.write_all(text.to_uppercase().as_bytes())?;
            Ok(true)
        }

        fn name(&self) -> &str {
            "upper"
        }
    }

    #[derive(Debug)]
    struct Magic;

    impl Transformer<Document> for Magic {
        fn transform(&self, input: &mut Input, output: &mut Output, doc: &Document) -> PipeResult<bool> {
            doc.seen.lock().unwrap().push("magic".into());
            output.write_all(b"MAGIC:")?;
            input.copy_to(output)?;
            Ok(true)
        }

        fn can_aggregate_transformed_stream(&self) -> bool {
            false
        }

        fn order(&self) -> i32 {
            100
        }

        fn name(&self) -> &str {
            "magic"
        }
    }

    #[test]
    fn transformer_set_feeds_pipe_in_legal_order() {
        let doc = Document::default();
        let set: TransformerSet<Document> = vec![
            Arc::new(Magic) as SharedTransformer<Document>,
            Arc::new(Upper) as SharedTransformer<Document>,
        ]
        .into_iter()
        .collect();

        let mut pipe = Pipe::new(&doc, Input::from_text("abc"));
        pipe.register_all(set.to_vec()).unwrap();
        let run = pipe.execute(&[]).unwrap();

        assert_eq!(run.execution.as_bytes(), b"MAGIC:ABC");
        assert_eq!(*doc.seen.lock().unwrap(), vec!["upper", "magic"]);
        assert!(run.stats.iter().all(TransformationStat::written));
    }
}
