//! Heap resolution and polling scenarios
//!
//! Heaps built over a memory backend: path validation, combining duplicate
//! paths and change detection by the periodic polling task.

use nut_heap::{HeapListener, MemoryBackend, NutsHeap, ResourceDao, VersionNumberStrategy};
use nut_model::{merge_nuts, Combiner, ConvertibleNut, Nut, NutType};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

#[derive(Default)]
struct Updates(AtomicUsize);

impl HeapListener for Updates {
    fn nut_updated(&self, _heap: &NutsHeap) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

fn backend() -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());
    backend.put("a.js", "var a;");
    backend.put("b.js", "var b;");
    backend.put("css/foo.js", "foo();");
    backend
}

#[test]
fn first_segment_rules() {
    let dao = ResourceDao::builder(backend()).build().unwrap();

    let err = NutsHeap::builder("numeric")
        .path("4000/foo.js")
        .dao(dao.clone())
        .build()
        .unwrap_err();
    assert!(err.is_bad_argument());

    let heap = NutsHeap::builder("valid").path("css/foo.js").dao(dao).build().unwrap();
    assert_eq!(heap.nuts().len(), 1);
    assert_eq!(heap.nut_types(), vec![NutType::Javascript]);
}

#[test]
fn duplicate_paths_merge_into_two_entries() {
    let dao = ResourceDao::builder(backend()).build().unwrap();
    let heap = NutsHeap::builder("scripts")
        .paths(["a\\.js", "a\\.js", "b\\.js"])
        .dao(dao)
        .build()
        .unwrap();
    assert_eq!(heap.nuts().len(), 3);

    let merged = merge_nuts(&heap.nuts()).unwrap();
    let names: Vec<String> = merged.iter().map(|n| n.name()).collect();
    assert_eq!(names, vec!["a.js", "b.js"]);
    assert_eq!(merged[0].composition().map(|c| c.len()), Some(2));
    assert!(merged[1].composition().is_none());

    let again = Combiner::new().merge_nuts(&merged).unwrap();
    let again: Vec<String> = again.iter().map(|n| n.name()).collect();
    assert_eq!(again, names);
}

#[test]
fn periodic_polling_detects_modifications() {
    let backend = backend();
    let dao = ResourceDao::builder(Arc::clone(&backend))
        .version_strategy(VersionNumberStrategy::new(true, false, None).unwrap())
        .polling_interval(1)
        .build()
        .unwrap();
    let heap = NutsHeap::builder("scripts").path("a\\.js").dao(dao.clone()).build().unwrap();
    let updates = Arc::new(Updates::default());
    heap.add_observer(updates.clone());

    backend.put("a.js", "var a = 1;");

    let deadline = Instant::now() + Duration::from_secs(10);
    while updates.0.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(50));
    }
    dao.shutdown();

    assert!(updates.0.load(Ordering::SeqCst) >= 1);
    let content = heap.nuts()[0].open_stream().unwrap().read_to_string().unwrap();
    assert_eq!(content, "var a = 1;");
}
