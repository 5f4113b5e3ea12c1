//! Testing utilities for the nut pipeline workspace
//!
//! In-memory nuts, heaps backed by a [`MemoryBackend`] and recording helpers.

#![allow(missing_docs)]

use nut_heap::{HeapListener, MemoryBackend, NutsHeap, PollReport, ResourceDao};
use nut_model::{ConvertibleNut, NutRef, NutType, PipedNut, VersionNumber};
use nut_pipe::{Input, Output, PipeResult, Transformer};
use parking_lot::Mutex;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Nut over `content` typed from the extension of `name`, version `1`
pub fn text_nut(name: &str, content: &str) -> NutRef {
    let nut_type = NutType::for_path(name).unwrap_or(NutType::Javascript);
    Arc::new(PipedNut::from_bytes(content.as_bytes(), name, nut_type, VersionNumber::fixed(1)).unwrap())
}

/// Heap named `heap` over every file of a memory backend
pub fn memory_heap(files: &[(&str, &str)]) -> Arc<NutsHeap> {
    HeapFixture::new(files).heap
}

/// Heap together with the backend and DAO it reads from
#[derive(Debug)]
pub struct HeapFixture {
    pub backend: Arc<MemoryBackend>,
    pub dao: Arc<ResourceDao<MemoryBackend>>,
    pub heap: Arc<NutsHeap>,
}

impl HeapFixture {
    pub fn new(files: &[(&str, &str)]) -> Self {
        let backend = Arc::new(MemoryBackend::new());
        for (path, content) in files {
            backend.put(*path, content);
        }
        let dao = ResourceDao::builder(Arc::clone(&backend)).build().unwrap();
        let heap = NutsHeap::builder("heap")
            .path(".*")
            .dao(dao.clone())
            .build()
            .unwrap();
        Self { backend, dao, heap }
    }

    /// Write `path` then run one polling cycle
    pub fn update(&self, path: &str, content: &str) -> PollReport {
        self.backend.put(path, content);
        self.dao.poll_once()
    }

    /// Delete `path` then run one polling cycle
    pub fn remove(&self, path: &str) -> PollReport {
        self.backend.remove(path);
        self.dao.poll_once()
    }
}

/// Heap listener counting notifications
#[derive(Debug, Default)]
pub struct UpdateCounter(AtomicUsize);

impl UpdateCounter {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl HeapListener for UpdateCounter {
    fn nut_updated(&self, _heap: &NutsHeap) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Appends a suffix and records the name of every transformed nut
#[derive(Debug)]
pub struct SuffixTransformer {
    suffix: &'static str,
    seen: Mutex<Vec<String>>,
}

impl SuffixTransformer {
    pub fn new(suffix: &'static str) -> Arc<Self> {
        Arc::new(Self {
            suffix,
            seen: Mutex::new(Vec::new()),
        })
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().clone()
    }
}

impl Transformer<dyn ConvertibleNut> for SuffixTransformer {
    fn transform(&self, input: &mut Input, output: &mut Output, nut: &dyn ConvertibleNut) -> PipeResult<bool> {
        self.seen.lock().push(nut.name());
        let text = input.read_to_string()?;
        write!(output, "{text}{}", self.suffix)?;
        Ok(true)
    }

    fn name(&self) -> &str {
        self.suffix
    }
}
