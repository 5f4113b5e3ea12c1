//! Transformer chaining
//!
//! A [`Pipe`] runs registered transformers in registration order. Every stage
//! but the last writes to an in-memory buffer which becomes the input of the
//! next stage. The last stage produces the final [`Execution`] which is handed
//! to the ready callbacks.

use crate::error::{PipeError, PipeResult};
use crate::io::{Execution, Input, Output};
use crate::stat::TransformationStat;
use crate::transformer::SharedTransformer;
use std::fmt::{self, Debug, Formatter};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Callback notified with the final content of a pipe
pub type OnReady = Arc<dyn Fn(&Execution) -> PipeResult<()> + Send + Sync>;

/// Wrap a closure into an [`OnReady`] callback
pub fn on_ready<F>(f: F) -> OnReady
where
    F: Fn(&Execution) -> PipeResult<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Outcome of a pipe execution
#[derive(Debug, Clone)]
pub struct PipeRun {
    /// Final content
    pub execution: Execution,
    /// One entry per executed transformer, in execution order
    pub stats: Vec<TransformationStat>,
}

/// Chain of transformers applied to one input
pub struct Pipe<'a, T: ?Sized> {
    convertible: &'a T,
    input: Input,
    transformers: Vec<SharedTransformer<T>>,
}

impl<'a, T: ?Sized> Pipe<'a, T> {
    /// Create pipe for `input` produced by `convertible`
    #[must_use]
    pub fn new(convertible: &'a T, input: Input) -> Self {
        Self {
            convertible,
            input,
            transformers: Vec::new(),
        }
    }

    /// Append a transformer
    ///
    /// # Errors
    /// [`PipeError::IllegalOrder`] when `transformer` produces an aggregatable
    /// stream and the last registered transformer does not.
    pub fn register(&mut self, transformer: SharedTransformer<T>) -> PipeResult<()> {
        if let Some(last) = self.transformers.last() {
            if !last.can_aggregate_transformed_stream()
                && transformer.can_aggregate_transformed_stream()
            {
                return Err(PipeError::IllegalOrder {
                    previous: last.name().to_string(),
                    next: transformer.name().to_string(),
                });
            }
        }
        self.transformers.push(transformer);
        Ok(())
    }

    /// Register several transformers in order
    ///
    /// # Errors
    /// Stops at the first ordering violation.
    pub fn register_all<I>(&mut self, transformers: I) -> PipeResult<()>
    where
        I: IntoIterator<Item = SharedTransformer<T>>,
    {
        for transformer in transformers {
            self.register(transformer)?;
        }
        Ok(())
    }

    /// Registered transformers
    #[inline]
    #[must_use]
    pub fn transformers(&self) -> &[SharedTransformer<T>] {
        &self.transformers
    }

    /// Run every transformer and notify `callbacks` with the final content
    ///
    /// Partial results are not rolled back on failure; the pipe is consumed
    /// either way.
    ///
    /// # Errors
    /// The first transformer, stream or callback failure.
    pub fn execute(self, callbacks: &[OnReady]) -> PipeResult<PipeRun> {
        let Pipe {
            convertible,
            mut input,
            transformers,
        } = self;

        let mut stats = Vec::with_capacity(transformers.len());
        let mut pending = None;

        for (index, transformer) in transformers.iter().enumerate() {
            let mut output = Output::new(input.charset());
            let source_as_bytes = input.is_source_as_bytes();
            let started = Instant::now();

            let written = transformer.transform(&mut input, &mut output, convertible)?;
            if !written && !input.is_consumed() {
                input.copy_to(&mut output)?;
            }
            input.close();

            let stat = TransformationStat::new(
                written,
                source_as_bytes,
                started.elapsed(),
                transformer.name(),
            );
            debug!(
                transformer = transformer.name(),
                written,
                elapsed = ?stat.duration(),
                "transformer executed"
            );
            stats.push(stat);

            if index + 1 == transformers.len() {
                pending = Some(output.into_execution());
                break;
            }
            input = output.into_input();
        }

        let execution = match pending {
            Some(execution) => execution,
            None => input.execution()?,
        };

        for callback in callbacks {
            callback(&execution)?;
        }

        Ok(PipeRun { execution, stats })
    }
}

impl<T: ?Sized> Debug for Pipe<'_, T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipe")
            .field("input", &self.input)
            .field(
                "transformers",
                &self.transformers.iter().map(|t| t.name()).collect::<Vec<_>>(),
            )
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transformer::Transformer;
    use pretty_assertions::assert_eq;
    use std::io::Write;
    use std::sync::Mutex;

    #[derive(Debug)]
    struct Append {
        suffix: &'static str,
        aggregate: bool,
    }

    impl Transformer<str> for Append {
        fn transform(&self, input: &mut Input, output: &mut Output, _c: &str) -> PipeResult<bool> {
            let text = input.read_to_string()?;
            write!(output, "{text}{}", self.suffix)?;
            Ok(true)
        }

        fn can_aggregate_transformed_stream(&self) -> bool {
            self.aggregate
        }

        fn name(&self) -> &str {
            self.suffix
        }
    }

    #[derive(Debug)]
    struct Untouched;

    impl Transformer<str> for Untouched {
        fn transform(&self, _i: &mut Input, _o: &mut Output, _c: &str) -> PipeResult<bool> {
            Ok(false)
        }

        fn name(&self) -> &str {
            "untouched"
        }
    }

    #[derive(Debug)]
    struct Failing;

    impl Transformer<str> for Failing {
        fn transform(&self, _i: &mut Input, _o: &mut Output, _c: &str) -> PipeResult<bool> {
            Err(PipeError::transformer("failing", "boom"))
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn append(suffix: &'static str, aggregate: bool) -> SharedTransformer<str> {
        Arc::new(Append { suffix, aggregate })
    }

    #[test]
    fn empty_pipe_copies_input() {
        let pipe = Pipe::new("nut", Input::from_text("raw"));
        let run = pipe.execute(&[]).unwrap();
        assert_eq!(run.execution.to_text(), "raw");
        assert!(run.stats.is_empty());
    }

    #[test]
    fn transformers_run_in_registration_order() {
        let mut pipe = Pipe::new("nut", Input::from_text("a"));
        pipe.register(append("b", true)).unwrap();
        pipe.register(append("c", true)).unwrap();
        pipe.register(append("d", false)).unwrap();
        let run = pipe.execute(&[]).unwrap();
        assert_eq!(run.execution.to_text(), "abcd");
        assert_eq!(
            run.stats.iter().map(TransformationStat::description).collect::<Vec<_>>(),
            vec!["b", "c", "d"]
        );
    }

    #[test]
    fn aggregatable_after_non_aggregatable_is_rejected() {
        let mut pipe = Pipe::new("nut", Input::from_text(""));
        pipe.register(append("header", false)).unwrap();
        let err = pipe.register(append("minify", true)).unwrap_err();
        assert!(matches!(err, PipeError::IllegalOrder { .. }));
        assert_eq!(pipe.transformers().len(), 1);
    }

    #[test]
    fn non_aggregatable_after_aggregatable_is_accepted() {
        let mut pipe = Pipe::new("nut", Input::from_text(""));
        pipe.register(append("minify", true)).unwrap();
        pipe.register(append("header", false)).unwrap();
        pipe.register(append("gzip", false)).unwrap();
        assert_eq!(pipe.transformers().len(), 3);
    }

    #[test]
    fn untouched_stage_forwards_content() {
        let mut pipe = Pipe::new("nut", Input::from_text("keep"));
        pipe.register(Arc::new(Untouched)).unwrap();
        pipe.register(append("!", true)).unwrap();
        let run = pipe.execute(&[]).unwrap();
        assert_eq!(run.execution.to_text(), "keep!");
        assert!(!run.stats[0].written());
    }

    #[test]
    fn callbacks_receive_final_content() {
        let recorder = Arc::new(Mutex::new(Vec::new()));
        let sink = recorder.clone();
        let callback = on_ready(move |execution: &Execution| {
            sink.lock().unwrap().push(execution.to_text().into_owned());
            Ok(())
        });

        let mut pipe = Pipe::new("nut", Input::from_text("x"));
        pipe.register(append("y", true)).unwrap();
        pipe.execute(&[callback.clone(), callback]).unwrap();

        assert_eq!(*recorder.lock().unwrap(), vec!["xy".to_string(), "xy".to_string()]);
    }

    #[test]
    fn transformer_failure_propagates() {
        let mut pipe = Pipe::new("nut", Input::from_text("x"));
        pipe.register(Arc::new(Failing)).unwrap();
        assert!(matches!(
            pipe.execute(&[]),
            Err(PipeError::Transformer { .. })
        ));
    }
}
