//! Composite nuts
//!
//! A [`CompositeNut`] presents several nuts as one stream. Nested composites
//! are flattened at construction so the composition is always a flat list.
//!
//! Reading goes through a [`CompositeInput`] which counts lines, columns and
//! bytes while streaming and records a [`Position`] at the end of each
//! constituent, separator included. Those positions answer "which nut owns
//! byte N" ([`CompositeInput::nut_at`]) and "where does nut X end"
//! ([`CompositeInput::position`]), which source maps need. Positions belong
//! to one stream: concurrent reads of the same composite do not interfere.
//!
//! # Transformation
//!
//! When a constituent carries its own transformers the composite runs in two
//! phases: every constituent goes through the transformers able to produce
//! aggregatable output, then the results are concatenated again and the
//! aggregate-only transformers run over the whole.

use crate::error::{NutError, NutResult};
use crate::nut::{same_nut, ConvertibleNut, Nut, NutAttributes, NutPipe, NutRef};
use crate::nut_type::NutType;
use crate::version::{combine_versions, VersionNumber};
use crate::wrapper::PrefixedNut;
use nut_pipe::{Input, OnReady, TransformationStat, TransformerSet, DEFAULT_CHARSET};
use std::fmt::{self, Debug, Formatter};
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tracing::debug;

/// Location in an aggregated stream
///
/// Lines and columns start at zero; columns count characters, `index` counts bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Position {
    line: usize,
    column: usize,
    index: u64,
}

impl Position {
    /// Create a position
    #[inline]
    #[must_use]
    pub fn new(line: usize, column: usize, index: u64) -> Self {
        Self {
            line,
            column,
            index,
        }
    }

    /// Line number
    #[inline]
    #[must_use]
    pub fn line(&self) -> usize {
        self.line
    }

    /// Column number
    #[inline]
    #[must_use]
    pub fn column(&self) -> usize {
        self.column
    }

    /// Absolute byte offset
    #[inline]
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    fn advance(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            self.index += 1;
            if byte == b'\n' {
                self.line += 1;
                self.column = 0;
            } else if byte & 0xC0 != 0x80 {
                // UTF-8 continuation bytes belong to the previous character
                self.column += 1;
            }
        }
    }
}

/// One part of a composite stream
#[derive(Debug, Clone)]
pub enum Segment {
    /// Content opened from a nut when reached
    Nut(NutRef),
    /// Content already in memory
    Bytes(Arc<[u8]>),
}

impl Segment {
    /// Nut read by this segment, if any
    #[inline]
    #[must_use]
    pub fn nut(&self) -> Option<&NutRef> {
        match self {
            Self::Nut(nut) => Some(nut),
            Self::Bytes(_) => None,
        }
    }
}

enum State {
    Pending,
    Content(Box<dyn Read + Send>),
    Separator(usize),
}

/// Stream over several segments, recording a [`Position`] after each one
pub struct CompositeInput {
    segments: Vec<Segment>,
    separator: Arc<[u8]>,
    current: usize,
    state: State,
    position: Position,
    positions: Vec<Option<Position>>,
}

impl CompositeInput {
    /// Stream `segments`, writing `separator` after each of them
    #[must_use]
    pub fn new(segments: Vec<Segment>, separator: Option<&[u8]>) -> Self {
        Self::with_separator(segments, Arc::from(separator.unwrap_or_default()))
    }

    fn with_separator(segments: Vec<Segment>, separator: Arc<[u8]>) -> Self {
        let positions = vec![None; segments.len()];
        Self {
            segments,
            separator,
            current: 0,
            state: State::Pending,
            position: Position::default(),
            positions,
        }
    }

    /// Segments in stream order
    #[inline]
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// End positions recorded so far, one slot per segment
    #[inline]
    #[must_use]
    pub fn positions(&self) -> &[Option<Position>] {
        &self.positions
    }

    /// Nut owning the byte at `index`
    ///
    /// Separator bytes belong to the segment they follow. Returns `None` when
    /// the stream was not read that far or the owner is an in-memory segment.
    #[must_use]
    pub fn nut_at(&self, index: u64) -> Option<NutRef> {
        let slot = self
            .positions
            .iter()
            .position(|end| end.is_some_and(|end| index < end.index()))?;
        self.segments[slot].nut().cloned()
    }

    /// End position of `nut`, separator included
    #[must_use]
    pub fn position(&self, nut: &NutRef) -> Option<Position> {
        let slot = self.slot_of(nut)?;
        self.positions[slot]
    }

    /// Position of the first byte of `nut`, known once `nut` was fully read
    #[must_use]
    pub fn start_position(&self, nut: &NutRef) -> Option<Position> {
        let slot = self.slot_of(nut)?;
        self.positions[slot]?;
        match slot {
            0 => Some(Position::default()),
            slot => self.positions[slot - 1],
        }
    }

    fn slot_of(&self, nut: &NutRef) -> Option<usize> {
        self.segments
            .iter()
            .position(|segment| segment.nut().is_some_and(|n| same_nut(n, nut)))
    }

    /// Position of the next byte to be read
    #[inline]
    #[must_use]
    pub fn current_position(&self) -> Position {
        self.position
    }
}

impl Read for CompositeInput {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        loop {
            let Some(segment) = self.segments.get(self.current) else {
                return Ok(0);
            };

            match &mut self.state {
                State::Pending => {
                    let reader: Box<dyn Read + Send> = match segment {
                        Segment::Nut(nut) => Box::new(nut.open_stream().map_err(NutError::into_io)?),
                        Segment::Bytes(bytes) => Box::new(Cursor::new(Arc::clone(bytes))),
                    };
                    self.state = State::Content(reader);
                }
                State::Content(reader) => {
                    let read = reader.read(buf)?;
                    if read > 0 {
                        self.position.advance(&buf[..read]);
                        return Ok(read);
                    }
                    self.state = State::Separator(0);
                }
                State::Separator(offset) => {
                    let remaining = &self.separator[*offset..];
                    if !remaining.is_empty() {
                        let count = remaining.len().min(buf.len());
                        buf[..count].copy_from_slice(&remaining[..count]);
                        *offset += count;
                        self.position.advance(&buf[..count]);
                        return Ok(count);
                    }
                    if let Some(slot) = self.positions.get_mut(self.current) {
                        *slot = Some(self.position);
                    }
                    self.current += 1;
                    self.state = State::Pending;
                }
            }
        }
    }
}

impl Debug for CompositeInput {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeInput")
            .field("segments", &self.segments.len())
            .field("current", &self.current)
            .field("position", &self.position)
            .finish_non_exhaustive()
    }
}

/// Several nuts served as one
pub struct CompositeNut {
    self_ref: Weak<CompositeNut>,
    initial_name: String,
    initial_type: NutType,
    composition: Vec<NutRef>,
    separator: Arc<[u8]>,
    version: VersionNumber,
    attributes: NutAttributes,
    transformed: AtomicBool,
}

impl CompositeNut {
    /// Aggregate `composition` under `name`
    ///
    /// The initial name and type come from the first nut; references of every
    /// nut are merged. `separator` is written after each constituent.
    ///
    /// # Errors
    /// [`NutError::BadArgument`] for an empty composition.
    pub fn new(
        name: impl Into<String>,
        separator: Option<&[u8]>,
        composition: &[NutRef],
    ) -> NutResult<Arc<Self>> {
        let first = composition
            .first()
            .ok_or_else(|| NutError::bad_argument("composition cannot be empty"))?;

        let flattened: Vec<NutRef> = composition
            .iter()
            .flat_map(|nut| nut.composition().unwrap_or_else(|| vec![Arc::clone(nut)]))
            .collect();

        let attributes = NutAttributes::new(name, first.nut_type());
        attributes.set_compressed(first.is_compressed());
        for nut in &flattened {
            for referenced in nut.referenced_nuts() {
                attributes.add_referenced_nut(referenced);
            }
            attributes.add_original_nut(Arc::clone(nut));
        }

        let constituents = flattened.clone();
        let version = VersionNumber::deferred(move || {
            let versions: Vec<i64> = constituents
                .iter()
                .map(|nut| nut.resolved_version_number())
                .collect();
            Ok(combine_versions(&versions))
        });

        let initial_name = first.initial_name().to_string();
        let initial_type = first.initial_nut_type();

        Ok(Arc::new_cyclic(|self_ref| Self {
            self_ref: self_ref.clone(),
            initial_name,
            initial_type,
            composition: flattened,
            separator: Arc::from(separator.unwrap_or_default()),
            version,
            attributes,
            transformed: AtomicBool::new(false),
        }))
    }

    /// Flattened constituents
    #[inline]
    #[must_use]
    pub fn composition_list(&self) -> &[NutRef] {
        &self.composition
    }

    /// Separator written after each constituent, if any
    #[must_use]
    pub fn separator(&self) -> Option<&[u8]> {
        (!self.separator.is_empty()).then_some(&*self.separator)
    }

    /// Fresh stream over the constituents, tracking its own positions
    #[must_use]
    pub fn open_composite(&self) -> CompositeInput {
        let segments = self.composition.iter().cloned().map(Segment::Nut).collect();
        CompositeInput::with_separator(segments, Arc::clone(&self.separator))
    }

    fn input(&self, segments: Vec<Segment>) -> Input {
        let input = CompositeInput::with_separator(segments, Arc::clone(&self.separator));
        Input::new(input, DEFAULT_CHARSET)
    }

    fn transform_separately(
        &self,
        this: &NutRef,
        callbacks: &[OnReady],
    ) -> NutResult<Vec<TransformationStat>> {
        let own = self.transformers();
        let mut aggregate_only: TransformerSet<dyn ConvertibleNut> = own
            .iter()
            .filter(|t| !t.can_aggregate_transformed_stream())
            .cloned()
            .collect();
        let mut stats = Vec::new();
        let mut segments = Vec::with_capacity(self.composition.len());

        for nut in &self.composition {
            let mut chain: TransformerSet<dyn ConvertibleNut> = nut.transformers().into_iter().collect();
            chain.extend(own.iter().cloned());
            let (separate, whole) = chain.split_by_aggregation();
            aggregate_only.extend(whole);

            let view: NutRef = Arc::new(PrefixedNut::renamed(Arc::clone(this), nut.initial_name()));
            let mut pipe = NutPipe::new(view.as_ref(), nut.open_stream()?);
            pipe.register_all(separate)?;
            let run = pipe.execute(&nut.ready_callbacks())?;

            stats.extend(run.stats);
            segments.push(Segment::Bytes(Arc::from(run.execution.into_bytes())));
        }

        let mut pipe = NutPipe::new(self, self.input(segments));
        pipe.register_all(aggregate_only.to_vec())?;
        let run = pipe.execute(callbacks)?;
        stats.extend(run.stats);
        Ok(stats)
    }
}

impl Nut for CompositeNut {
    fn initial_name(&self) -> &str {
        &self.initial_name
    }

    fn initial_nut_type(&self) -> NutType {
        self.initial_type
    }

    fn version_number(&self) -> &VersionNumber {
        &self.version
    }

    fn is_dynamic(&self) -> bool {
        self.composition.iter().any(|nut| nut.is_dynamic())
    }

    fn open_stream(&self) -> NutResult<Input> {
        Ok(Input::new(self.open_composite(), DEFAULT_CHARSET))
    }
}

impl ConvertibleNut for CompositeNut {
    fn attributes(&self) -> &NutAttributes {
        &self.attributes
    }

    fn transform(&self, on_ready: &[OnReady]) -> NutResult<Vec<TransformationStat>> {
        if self.transformed.swap(true, Ordering::SeqCst) {
            return Err(NutError::illegal_state(format!(
                "composite '{}' cannot be transformed twice",
                self.name()
            )));
        }

        let mut callbacks = on_ready.to_vec();
        callbacks.extend(self.ready_callbacks());

        let separately = self.composition.iter().any(|nut| !nut.transformers().is_empty());
        let stats = if separately {
            let this: NutRef = self
                .self_ref
                .upgrade()
                .ok_or_else(|| NutError::illegal_state("composite nut is being dropped"))?;
            self.transform_separately(&this, &callbacks)?
        } else {
            let mut pipe = NutPipe::new(self, self.open_stream()?);
            pipe.register_all(self.transformers())?;
            pipe.execute(&callbacks)?.stats
        };

        debug!(
            nut = %self.name(),
            constituents = self.composition.len(),
            separately,
            "composite transformed"
        );
        Ok(stats)
    }

    fn is_transformed(&self) -> bool {
        self.transformed.load(Ordering::SeqCst)
    }

    fn composition(&self) -> Option<Vec<NutRef>> {
        Some(self.composition.clone())
    }
}

impl Debug for CompositeNut {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeNut")
            .field("name", &self.name())
            .field(
                "composition",
                &self.composition.iter().map(|n| n.name()).collect::<Vec<_>>(),
            )
            .field("separator", &String::from_utf8_lossy(&self.separator))
            .field("transformed", &self.is_transformed())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::piped::PipedNut;
    use nut_pipe::{on_ready, Output, PipeResult, Transformer};
    use parking_lot::Mutex;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn nut(name: &str, content: &str, version: i64) -> NutRef {
        Arc::new(
            PipedNut::from_bytes(content.as_bytes(), name, NutType::Javascript, VersionNumber::fixed(version))
                .unwrap(),
        )
    }

    fn read_all(composite: &CompositeNut) -> String {
        composite.open_stream().unwrap().read_to_string().unwrap()
    }

    fn read_tracked(composite: &CompositeNut) -> (CompositeInput, String) {
        let mut input = composite.open_composite();
        let mut content = String::new();
        input.read_to_string(&mut content).unwrap();
        (input, content)
    }

    #[derive(Debug)]
    struct Wrap {
        label: &'static str,
        aggregatable: bool,
    }

    impl Transformer<dyn ConvertibleNut> for Wrap {
        fn transform(
            &self,
            input: &mut Input,
            output: &mut Output,
            nut: &dyn ConvertibleNut,
        ) -> PipeResult<bool> {
            let text = input.read_to_string()?;
            write!(output, "[{}:{}]{text}", self.label, nut.name())?;
            Ok(true)
        }

        fn can_aggregate_transformed_stream(&self) -> bool {
            self.aggregatable
        }

        fn name(&self) -> &str {
            self.label
        }
    }

    #[test]
    fn empty_composition_is_rejected() {
        assert!(matches!(
            CompositeNut::new("all.js", None, &[]),
            Err(NutError::BadArgument(_))
        ));
    }

    #[test]
    fn positions_map_bytes_to_constituents() {
        let a = nut("a.js", "0123456789", 1);
        let b = nut("b.js", "abcde", 1);
        let composite = CompositeNut::new("ab.js", Some(b"\n"), &[a.clone(), b.clone()]).unwrap();

        assert!(composite.open_composite().nut_at(0).is_none());
        let (input, content) = read_tracked(&composite);
        assert_eq!(content, "0123456789\nabcde\n");

        assert!(same_nut(&input.nut_at(3).unwrap(), &a));
        assert!(same_nut(&input.nut_at(10).unwrap(), &a));
        assert!(same_nut(&input.nut_at(11).unwrap(), &b));
        assert!(same_nut(&input.nut_at(12).unwrap(), &b));
        assert!(input.nut_at(17).is_none());

        assert_eq!(input.position(&a), Some(Position::new(1, 0, 11)));
        assert_eq!(input.position(&b), Some(Position::new(2, 0, 17)));
        assert_eq!(input.start_position(&a), Some(Position::default()));
        assert_eq!(input.start_position(&b), Some(Position::new(1, 0, 11)));
    }

    #[test]
    fn interleaved_streams_keep_their_own_positions() {
        let a = nut("a.js", "aaaa", 1);
        let b = nut("b.js", "bb", 1);
        let composite = CompositeNut::new("ab.js", Some(b";"), &[a.clone(), b.clone()]).unwrap();

        let mut first = composite.open_composite();
        let mut buf = [0_u8; 6];
        first.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"aaaa;b");

        let (second, _) = read_tracked(&composite);
        assert_eq!(second.position(&b), Some(Position::new(0, 8, 8)));

        assert!(same_nut(&first.nut_at(2).unwrap(), &a));
        assert_eq!(first.position(&a), Some(Position::new(0, 5, 5)));
        assert_eq!(first.position(&b), None);
        let mut rest = String::new();
        first.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "b;");
        assert_eq!(first.position(&b), Some(Position::new(0, 8, 8)));
        assert_eq!(second.position(&a), Some(Position::new(0, 5, 5)));
    }

    #[test]
    fn missing_separator_uses_empty_boundary() {
        let a = nut("a.js", "ab", 1);
        let b = nut("b.js", "cd", 1);
        let composite = CompositeNut::new("ab.js", None, &[a, b.clone()]).unwrap();
        let (input, content) = read_tracked(&composite);
        assert_eq!(content, "abcd");
        assert_eq!(composite.separator(), None);
        assert_eq!(input.position(&b), Some(Position::new(0, 4, 4)));
    }

    #[test]
    fn columns_count_characters() {
        let a = nut("a.js", "é\nxyé", 1);
        let composite = CompositeNut::new("a.js", None, &[a.clone()]).unwrap();
        let (input, _) = read_tracked(&composite);
        assert_eq!(input.position(&a), Some(Position::new(1, 3, 7)));
    }

    #[test]
    fn nested_composites_are_flattened() {
        let inner = CompositeNut::new("ab.js", None, &[nut("a.js", "a", 1), nut("b.js", "b", 1)]).unwrap();
        let inner: NutRef = inner;
        let outer = CompositeNut::new("abc.js", Some(b";"), &[inner, nut("c.js", "c", 1)]).unwrap();
        assert_eq!(outer.composition_list().len(), 3);
        assert_eq!(outer.initial_name(), "a.js");
        assert_eq!(outer.name(), "abc.js");
        assert_eq!(read_all(&outer), "a;b;c;");
    }

    #[test]
    fn version_combines_constituents() {
        let shared = CompositeNut::new("x.js", None, &[nut("a.js", "", 4), nut("b.js", "", 4)]).unwrap();
        assert_eq!(shared.version_number().get(), 4);

        let mixed = CompositeNut::new("x.js", None, &[nut("a.js", "", 4), nut("b.js", "", 5)]).unwrap();
        assert_eq!(mixed.version_number().get(), combine_versions(&[4, 5]));
    }

    #[test]
    fn references_are_merged() {
        let a = nut("a.js", "", 1);
        let b = nut("b.js", "", 1);
        a.add_referenced_nut(nut("img/x.png", "", 1)).unwrap();
        b.add_referenced_nut(nut("img/y.png", "", 1)).unwrap();
        let composite = CompositeNut::new("ab.js", None, &[a, b]).unwrap();
        let names: Vec<String> = composite.referenced_nuts().iter().map(|n| n.name()).collect();
        assert_eq!(names, vec!["img/x.png", "img/y.png"]);
        assert_eq!(composite.source().original_nuts().len(), 2);
    }

    #[test]
    fn single_phase_transform_sees_whole_stream() {
        let composite = CompositeNut::new("ab.js", None, &[nut("a.js", "a", 1), nut("b.js", "b", 1)]).unwrap();
        composite
            .add_transformer(Arc::new(Wrap {
                label: "all",
                aggregatable: true,
            }))
            .unwrap();

        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        composite
            .transform(&[on_ready(move |e| {
                sink.lock().push_str(&e.to_text());
                Ok(())
            })])
            .unwrap();
        assert_eq!(*seen.lock(), "[all:ab.js]ab");
        assert!(composite.transform(&[]).is_err());
    }

    #[test]
    fn constituent_transformers_trigger_two_phases() {
        let a = nut("a.js", "a", 1);
        let b = nut("b.js", "b", 1);
        a.add_transformer(Arc::new(Wrap {
            label: "each",
            aggregatable: true,
        }))
        .unwrap();

        let composite = CompositeNut::new("ab.js", None, &[a, b]).unwrap();
        composite
            .add_transformer(Arc::new(Wrap {
                label: "head",
                aggregatable: false,
            }))
            .unwrap();

        let seen = Arc::new(Mutex::new(String::new()));
        let sink = Arc::clone(&seen);
        let stats = composite
            .transform(&[on_ready(move |e| {
                sink.lock().push_str(&e.to_text());
                Ok(())
            })])
            .unwrap();

        assert_eq!(*seen.lock(), "[head:ab.js][each:a.js]ab");
        assert_eq!(stats.len(), 2);
    }
}
