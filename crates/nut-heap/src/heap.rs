//! Nuts heaps
//!
//! A [`NutsHeap`] resolves its declared path patterns through a [`NutDao`],
//! optionally groups other heaps, and notifies its [`HeapListener`]s whenever
//! polling detects that the resolved nuts changed.
//!
//! Heaps hold their listeners strongly; a listener stays registered until
//! [`NutsHeap::remove_observer`] is called with the [`ListenerId`] returned at
//! registration.

use crate::dao::{NutDao, NutDaoListener, PathFormat, ProcessContext};
use crate::error::{HeapError, HeapResult};
use crate::root_path::with_root_path;
use nut_model::path::{has_numeric_first_segment, merge_path, simplify_path};
use nut_model::{root_of, same_nut, ConvertibleNut, Nut, NutRef, NutType};
use parking_lot::{Mutex, ReentrantMutex, RwLock};
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Debug, Formatter};
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// Notified when the nuts of a heap change
pub trait HeapListener: Send + Sync {
    /// `heap` was reloaded or one of its nuts changed
    fn nut_updated(&self, heap: &NutsHeap);
}

/// Handle returned by [`NutsHeap::add_observer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

#[derive(Default)]
struct HeapState {
    nuts: Vec<NutRef>,
    created: HashMap<String, HashSet<String>>,
}

/// Named set of nuts resolved by a DAO
pub struct NutsHeap {
    self_ref: Weak<NutsHeap>,
    id: String,
    paths: Vec<String>,
    path_format: PathFormat,
    dao: Option<Arc<dyn NutDao>>,
    composition: Vec<Arc<NutsHeap>>,
    disposable: bool,
    factory: Option<String>,
    context: ProcessContext,
    state: RwLock<HeapState>,
    listeners: Mutex<Vec<(ListenerId, Arc<dyn HeapListener>)>>,
    notify_lock: ReentrantMutex<()>,
    next_listener: AtomicU64,
    dao_listener: Arc<dyn NutDaoListener>,
    subscriptions: Vec<(Arc<NutsHeap>, ListenerId)>,
}

impl NutsHeap {
    /// Start building a heap named `id`
    #[must_use]
    pub fn builder(id: impl Into<String>) -> HeapBuilder {
        HeapBuilder {
            id: id.into(),
            ..HeapBuilder::default()
        }
    }

    /// Heap identifier
    #[inline]
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Declared path patterns
    #[inline]
    #[must_use]
    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// DAO resolving the declared paths
    #[inline]
    #[must_use]
    pub fn dao(&self) -> Option<&Arc<dyn NutDao>> {
        self.dao.as_ref()
    }

    /// Heaps grouped by this one
    #[inline]
    #[must_use]
    pub fn composition(&self) -> &[Arc<NutsHeap>] {
        &self.composition
    }

    /// Whether polling may drop this heap's DAO listener
    #[inline]
    #[must_use]
    pub fn is_disposable(&self) -> bool {
        self.disposable
    }

    /// Identifier of whatever created this heap
    #[inline]
    #[must_use]
    pub fn factory(&self) -> Option<&str> {
        self.factory.as_deref()
    }

    /// Context passed to the DAO
    #[inline]
    #[must_use]
    pub fn context(&self) -> &ProcessContext {
        &self.context
    }

    /// Nuts of this heap followed by the nuts of every composed heap
    #[must_use]
    pub fn nuts(&self) -> Vec<NutRef> {
        let mut nuts = self.state.read().nuts.clone();
        for heap in &self.composition {
            nuts.extend(heap.nuts());
        }
        nuts
    }

    /// Distinct types of [`nuts`](Self::nuts), in order of first appearance
    #[must_use]
    pub fn nut_types(&self) -> Vec<NutType> {
        let mut types = Vec::new();
        for nut in self.nuts() {
            let nut_type = nut.initial_nut_type();
            if !types.contains(&nut_type) {
                types.push(nut_type);
            }
        }
        types
    }

    /// Whether this heap's DAO created `nut`
    #[must_use]
    pub fn has_created(&self, nut: &NutRef) -> bool {
        let root = root_of(nut);
        self.state
            .read()
            .nuts
            .iter()
            .any(|n| same_nut(n, &root) || n.initial_name() == root.initial_name())
    }

    /// Whether `heap` is this heap or one of its compositions, recursively
    #[must_use]
    pub fn contains_heap(&self, heap: &NutsHeap) -> bool {
        self == heap || self.composition.iter().any(|h| h.contains_heap(heap))
    }

    /// Heap whose DAO created `nut`, searching compositions recursively
    #[must_use]
    pub fn find_heap_for(&self, nut: &NutRef) -> Option<Arc<NutsHeap>> {
        let found = self.search_heap_for(nut);
        if found.is_none() {
            warn!(heap = %self.id, nut = %nut.initial_name(), "no heap created this nut");
        }
        found
    }

    fn search_heap_for(&self, nut: &NutRef) -> Option<Arc<NutsHeap>> {
        if self.dao.is_some() && self.has_created(nut) {
            return self.self_ref.upgrade();
        }
        self.composition.iter().find_map(|h| h.search_heap_for(nut))
    }

    /// DAO that created `nut`
    #[must_use]
    pub fn find_dao_for(&self, nut: &NutRef) -> Option<Arc<dyn NutDao>> {
        self.find_heap_for(nut).and_then(|heap| heap.dao.clone())
    }

    /// Proxy URI of `nut`, asked to the DAO that created it
    #[must_use]
    pub fn proxy_uri_for(&self, nut: &NutRef) -> Option<String> {
        self.find_dao_for(nut)?.proxy_uri_for(nut.as_ref())
    }

    /// DAO that created `nut`, resolving paths under `root`
    ///
    /// # Errors
    /// [`HeapError::BadArgument`] when no composed heap created `nut`.
    pub fn with_root_path(&self, root: &str, nut: &NutRef) -> HeapResult<Arc<dyn NutDao>> {
        let dao = self.find_dao_for(nut).ok_or_else(|| {
            HeapError::bad_argument(format!("no DAO created '{}'", nut.initial_name()))
        })?;
        Ok(with_root_path(dao, root))
    }

    /// Create nuts for `path` with the DAO that created `nut`
    ///
    /// A [`PathFormat::RelativeFile`] path is resolved from the directory of
    /// `nut`'s name.
    ///
    /// # Errors
    /// [`HeapError::BadArgument`] when no composed heap created `nut` or the
    /// path climbs above the root; DAO failures.
    pub fn create(&self, nut: &NutRef, path: &str, format: PathFormat) -> HeapResult<Vec<NutRef>> {
        let heap = self.find_heap_for(nut).ok_or_else(|| {
            HeapError::bad_argument(format!("no heap created '{}'", nut.initial_name()))
        })?;
        let Some(dao) = heap.dao.as_ref() else {
            return Ok(Vec::new());
        };

        let resolved = match format {
            PathFormat::Any => path.to_string(),
            PathFormat::RelativeFile => {
                let name = nut.initial_name();
                let parent = name.rfind('/').map_or("", |i| &name[..i]);
                simplify_path(&merge_path(&[parent, path])).ok_or_else(|| {
                    HeapError::bad_argument(format!("'{path}' climbs above the root from '{name}'"))
                })?
            }
        };
        dao.create(&resolved, format, &heap.context)
    }

    /// Register `listener`, notified after every reload
    pub fn add_observer(&self, listener: Arc<dyn HeapListener>) -> ListenerId {
        let id = ListenerId(self.next_listener.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, listener));
        id
    }

    /// Unregister a listener, returning whether it was registered
    pub fn remove_observer(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(registered, _)| *registered != id);
        listeners.len() != before
    }

    /// Number of registered listeners
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.listeners.lock().len()
    }

    /// Notify every listener that the heap changed
    pub fn notify_listeners(&self) {
        let _guard = self.notify_lock.lock();
        let listeners: Vec<Arc<dyn HeapListener>> =
            self.listeners.lock().iter().map(|(_, l)| Arc::clone(l)).collect();
        debug!(heap = %self.id, listeners = listeners.len(), "notifying heap listeners");
        for listener in listeners {
            listener.nut_updated(self);
        }
    }

    fn observed_pattern(&self, path: &str) -> String {
        match self.dao.as_ref().and_then(|dao| dao.root_path()) {
            Some(root) => merge_path(&[root, path]),
            None => path.to_string(),
        }
    }

    /// Resolve every declared path and register them for polling
    fn check_files(&self) -> HeapResult<()> {
        let mut nuts = Vec::new();
        let mut created = HashMap::new();

        if let Some(dao) = &self.dao {
            for path in &self.paths {
                if has_numeric_first_segment(path) {
                    return Err(HeapError::bad_argument(format!(
                        "first segment of '{path}' in heap '{}' cannot be a number",
                        self.id
                    )));
                }

                let mut names = HashSet::new();
                for nut in dao.create(path, self.path_format, &self.context)? {
                    if has_numeric_first_segment(nut.initial_name()) {
                        return Err(HeapError::bad_argument(format!(
                            "first segment of nut '{}' in heap '{}' cannot be a number",
                            nut.initial_name(),
                            self.id
                        )));
                    }
                    names.insert(nut.initial_name().to_string());
                    nuts.push(nut);
                }
                created.insert(self.observed_pattern(path), names);
                dao.observe(path, self.path_format, Arc::clone(&self.dao_listener))?;
            }
        }

        if nuts.is_empty() && self.composition.is_empty() {
            return Err(HeapError::bad_argument(format!(
                "heap '{}' resolves no nut for paths {:?}",
                self.id, self.paths
            )));
        }

        info!(heap = %self.id, nuts = nuts.len(), "heap resolved");
        *self.state.write() = HeapState { nuts, created };
        Ok(())
    }

    fn reload(&self) {
        if let Err(e) = self.check_files() {
            warn!(heap = %self.id, error = %e, "unable to reload heap");
        }
        self.notify_listeners();
    }

    fn on_polling(&self, pattern: &str, paths: &HashSet<String>) -> bool {
        let unchanged = self
            .state
            .read()
            .created
            .get(pattern)
            .map_or(true, |known| known == paths);
        if unchanged {
            return true;
        }
        info!(heap = %self.id, pattern = %pattern, "paths changed, reloading heap");
        self.reload();
        false
    }

    fn on_nut_polled(&self, path: &str, timestamp: Option<i64>) -> bool {
        let Some(timestamp) = timestamp else {
            return true;
        };
        let nut = self
            .state
            .read()
            .nuts
            .iter()
            .find(|n| n.initial_name() == path)
            .cloned();
        let Some(nut) = nut else {
            return true;
        };

        match nut.version_number().try_get() {
            Ok(version) if version == timestamp => true,
            _ => {
                info!(heap = %self.id, nut = %path, "nut changed, reloading heap");
                self.reload();
                false
            }
        }
    }
}

impl PartialEq for NutsHeap {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.paths == other.paths
    }
}

impl Eq for NutsHeap {}

impl Hash for NutsHeap {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl Debug for NutsHeap {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("NutsHeap")
            .field("id", &self.id)
            .field("paths", &self.paths)
            .field("composition", &self.composition.iter().map(|h| h.id()).collect::<Vec<_>>())
            .field("nuts", &self.state.read().nuts.len())
            .finish_non_exhaustive()
    }
}

impl Drop for NutsHeap {
    fn drop(&mut self) {
        if let Some(dao) = &self.dao {
            dao.unobserve(&self.dao_listener);
        }
        for (heap, id) in &self.subscriptions {
            heap.remove_observer(*id);
        }
    }
}

/// Forwards polling results to the owning heap
struct HeapDaoListener {
    heap: Weak<NutsHeap>,
    disposable: bool,
    factory: Option<String>,
}

impl NutDaoListener for HeapDaoListener {
    fn polling(&self, pattern: &str, paths: &HashSet<String>) -> bool {
        self.heap
            .upgrade()
            .is_some_and(|heap| heap.on_polling(pattern, paths))
    }

    fn nut_polled(&self, path: &str, timestamp: Option<i64>) -> bool {
        self.heap
            .upgrade()
            .is_some_and(|heap| heap.on_nut_polled(path, timestamp))
    }

    fn is_disposable(&self) -> bool {
        self.disposable
    }

    fn factory(&self) -> Option<&str> {
        self.factory.as_deref()
    }

    fn is_alive(&self) -> bool {
        self.heap.strong_count() > 0
    }
}

/// Relays updates of a composed heap to the listeners of its parent
struct SubHeapForwarder {
    parent: Weak<NutsHeap>,
}

impl HeapListener for SubHeapForwarder {
    fn nut_updated(&self, _heap: &NutsHeap) {
        if let Some(parent) = self.parent.upgrade() {
            parent.notify_listeners();
        }
    }
}

/// Builder for [`NutsHeap`]
#[derive(Default)]
pub struct HeapBuilder {
    id: String,
    paths: Vec<String>,
    path_format: PathFormat,
    dao: Option<Arc<dyn NutDao>>,
    composition: Vec<Arc<NutsHeap>>,
    disposable: bool,
    factory: Option<String>,
    context: ProcessContext,
}

impl HeapBuilder {
    /// Add a path pattern
    #[must_use]
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Add several path patterns
    #[must_use]
    pub fn paths<I, S>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// How paths are interpreted, regular expressions by default
    #[must_use]
    pub fn path_format(mut self, format: PathFormat) -> Self {
        self.path_format = format;
        self
    }

    /// DAO resolving the paths
    #[must_use]
    pub fn dao(mut self, dao: Arc<dyn NutDao>) -> Self {
        self.dao = Some(dao);
        self
    }

    /// Group another heap
    #[must_use]
    pub fn compose(mut self, heap: Arc<NutsHeap>) -> Self {
        self.composition.push(heap);
        self
    }

    /// Let polling drop this heap's DAO listener
    #[must_use]
    pub fn disposable(mut self, disposable: bool) -> Self {
        self.disposable = disposable;
        self
    }

    /// Identifier of whatever creates the heap
    #[must_use]
    pub fn factory(mut self, factory: impl Into<String>) -> Self {
        self.factory = Some(factory.into());
        self
    }

    /// Context passed to the DAO
    #[must_use]
    pub fn context(mut self, context: ProcessContext) -> Self {
        self.context = context;
        self
    }

    /// Build the heap and resolve its paths
    ///
    /// # Errors
    /// [`HeapError::BadArgument`] for an empty id, paths without a DAO, a
    /// numeric first segment or a heap resolving no nut; DAO failures.
    pub fn build(self) -> HeapResult<Arc<NutsHeap>> {
        if self.id.is_empty() {
            return Err(HeapError::bad_argument("heap id cannot be empty"));
        }
        if self.dao.is_none() && !self.paths.is_empty() {
            return Err(HeapError::bad_argument(format!(
                "heap '{}' declares paths without a DAO",
                self.id
            )));
        }

        let heap = Arc::new_cyclic(|self_ref: &Weak<NutsHeap>| {
            let subscriptions = self
                .composition
                .iter()
                .map(|sub| {
                    let forwarder = Arc::new(SubHeapForwarder {
                        parent: self_ref.clone(),
                    });
                    (Arc::clone(sub), sub.add_observer(forwarder))
                })
                .collect();

            NutsHeap {
                self_ref: self_ref.clone(),
                dao_listener: Arc::new(HeapDaoListener {
                    heap: self_ref.clone(),
                    disposable: self.disposable,
                    factory: self.factory.clone(),
                }),
                id: self.id,
                paths: self.paths,
                path_format: self.path_format,
                dao: self.dao,
                composition: self.composition,
                disposable: self.disposable,
                factory: self.factory,
                context: self.context,
                state: RwLock::new(HeapState::default()),
                listeners: Mutex::new(Vec::new()),
                notify_lock: ReentrantMutex::new(()),
                next_listener: AtomicU64::new(0),
                subscriptions,
            }
        });

        heap.check_files()?;
        debug!(heap = %heap.id, "heap built");
        Ok(heap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::resource_dao::ResourceDao;
    use nut_model::{NutError, PipedNut};
    use nut_pipe::Input;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::AtomicUsize;

    #[derive(Default)]
    struct Counter(AtomicUsize);

    impl Counter {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl HeapListener for Counter {
        fn nut_updated(&self, _heap: &NutsHeap) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn store() -> (Arc<MemoryBackend>, Arc<ResourceDao<MemoryBackend>>) {
        let backend = Arc::new(MemoryBackend::new());
        backend.put("css/foo.js", "foo()");
        backend.put("js/a.js", "a()");
        backend.put("js/b.js", "b()");
        backend.put("4000/foo.js", "numeric()");
        let dao = ResourceDao::builder(Arc::clone(&backend)).build().unwrap();
        (backend, dao)
    }

    fn names(heap: &NutsHeap) -> Vec<String> {
        heap.nuts().iter().map(|n| n.initial_name().to_string()).collect()
    }

    #[test]
    fn numeric_first_segment_is_rejected() {
        let (_, dao) = store();
        let err = NutsHeap::builder("heap").path("4000/foo.js").dao(dao).build().unwrap_err();
        assert!(err.is_bad_argument());
    }

    #[test]
    fn numeric_resolved_name_is_rejected() {
        let (_, dao) = store();
        let err = NutsHeap::builder("heap").path(".*/foo\\.js").dao(dao).build().unwrap_err();
        assert!(err.is_bad_argument());
    }

    #[test]
    fn single_path_resolves_one_nut() {
        let (_, dao) = store();
        let heap = NutsHeap::builder("heap").path("css/foo.js").dao(dao).build().unwrap();
        assert_eq!(names(&heap), vec!["css/foo.js"]);
        assert_eq!(heap.nut_types(), vec![NutType::Javascript]);
    }

    #[test]
    fn empty_resolution_is_rejected() {
        let (_, dao) = store();
        let err = NutsHeap::builder("heap").path("img/.*").dao(dao).build().unwrap_err();
        assert!(err.is_bad_argument());
        assert!(NutsHeap::builder("").build().unwrap_err().is_bad_argument());
    }

    #[test]
    fn modified_nut_notifies_listeners() {
        let (backend, dao) = store();
        let heap = NutsHeap::builder("heap").path("js/.*").dao(dao.clone()).build().unwrap();
        let counter = Arc::new(Counter::default());
        heap.add_observer(counter.clone());

        dao.poll_once();
        assert_eq!(counter.count(), 0);

        backend.put("js/a.js", "a2()");
        dao.poll_once();
        assert_eq!(counter.count(), 1);
        dao.poll_once();
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn files_without_nut_type_do_not_trigger_reloads() {
        let backend = Arc::new(MemoryBackend::new());
        backend.put("a.js", "a()");
        backend.put("README.txt", "read me");
        let dao = ResourceDao::builder(Arc::clone(&backend)).build().unwrap();
        let heap = NutsHeap::builder("heap").path(".*").dao(dao.clone()).build().unwrap();
        let counter = Arc::new(Counter::default());
        heap.add_observer(counter.clone());

        for _ in 0..3 {
            dao.poll_once();
        }
        assert_eq!(counter.count(), 0);
        assert_eq!(names(&heap), vec!["a.js"]);
    }

    #[test]
    fn relative_file_heaps_poll_their_single_file() {
        let (backend, dao) = store();
        let heap = NutsHeap::builder("heap")
            .path("js/a.js")
            .path_format(PathFormat::RelativeFile)
            .dao(dao.clone())
            .build()
            .unwrap();
        let counter = Arc::new(Counter::default());
        heap.add_observer(counter.clone());

        dao.poll_once();
        dao.poll_once();
        assert_eq!(counter.count(), 0);

        backend.put("js/a.js", "a2()");
        dao.poll_once();
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn unknown_polled_pattern_counts_as_unchanged() {
        let (_, dao) = store();
        let heap = NutsHeap::builder("heap").path("js/.*").dao(dao).build().unwrap();
        let counter = Arc::new(Counter::default());
        heap.add_observer(counter.clone());

        let paths: HashSet<String> = ["elsewhere.js".to_string()].into_iter().collect();
        assert!(heap.on_polling("elsewhere/.*", &paths));
        assert_eq!(counter.count(), 0);
    }

    #[test]
    fn added_file_reloads_heap() {
        let (backend, dao) = store();
        let heap = NutsHeap::builder("heap").path("js/.*").dao(dao.clone()).build().unwrap();
        let counter = Arc::new(Counter::default());
        let id = heap.add_observer(counter.clone());

        backend.put("js/c.js", "c()");
        dao.poll_once();
        assert_eq!(counter.count(), 1);
        assert_eq!(names(&heap), vec!["js/a.js", "js/b.js", "js/c.js"]);

        assert!(heap.remove_observer(id));
        backend.remove("js/c.js");
        dao.poll_once();
        assert_eq!(counter.count(), 1);
        assert_eq!(heap.nuts().len(), 2);
    }

    #[test]
    fn composition_is_searched_recursively() {
        let (_, dao) = store();
        let css = NutsHeap::builder("css").path("css/.*").dao(dao.clone()).build().unwrap();
        let js = NutsHeap::builder("js").path("js/.*").dao(dao).build().unwrap();
        let all = NutsHeap::builder("all").compose(css.clone()).compose(js.clone()).build().unwrap();

        assert_eq!(names(&all), vec!["css/foo.js", "js/a.js", "js/b.js"]);
        assert!(all.contains_heap(&js));
        assert!(!js.contains_heap(&all));

        let derived: NutRef = Arc::new(
            PipedNut::builder("js/b.min.js", NutType::Javascript)
                .original(js.nuts()[1].clone())
                .build(|| Ok::<_, NutError>(Input::from_text("b")))
                .unwrap(),
        );
        let found = all.find_heap_for(&derived).unwrap();
        assert_eq!(found.id(), "js");
        assert!(all.find_dao_for(&derived).is_some());
    }

    #[test]
    fn composed_heap_updates_reach_parent_listeners() {
        let (backend, dao) = store();
        let js = NutsHeap::builder("js").path("js/.*").dao(dao.clone()).build().unwrap();
        let all = NutsHeap::builder("all").compose(js.clone()).build().unwrap();
        let counter = Arc::new(Counter::default());
        all.add_observer(counter.clone());

        backend.put("js/b.js", "b2()");
        dao.poll_once();
        assert_eq!(counter.count(), 1);

        drop(all);
        assert_eq!(js.observer_count(), 0);
    }

    #[test]
    fn relative_files_resolve_from_the_nut_directory() {
        let (backend, dao) = store();
        backend.put("css/img/logo.png", [0_u8, 1, 2]);
        let heap = NutsHeap::builder("heap").path("css/foo.js").dao(dao).build().unwrap();
        let nut = heap.nuts()[0].clone();

        let created = heap.create(&nut, "img/logo.png", PathFormat::RelativeFile).unwrap();
        assert_eq!(created[0].initial_name(), "css/img/logo.png");
        assert!(heap.create(&nut, "../../x.png", PathFormat::RelativeFile).unwrap_err().is_bad_argument());
    }

    #[test]
    fn dropping_heap_stops_observation() {
        let (_, dao) = store();
        let heap = NutsHeap::builder("heap").path("js/.*").dao(dao.clone()).build().unwrap();
        assert_eq!(dao.scheduler().observer_count(), 1);
        drop(heap);
        assert_eq!(dao.scheduler().observer_count(), 0);
    }

    #[test]
    fn equality_uses_id_and_paths() {
        let (_, dao) = store();
        let a = NutsHeap::builder("heap").path("js/.*").dao(dao.clone()).build().unwrap();
        let b = NutsHeap::builder("heap").path("js/.*").dao(dao.clone()).build().unwrap();
        let c = NutsHeap::builder("heap").path("css/.*").dao(dao).build().unwrap();
        assert_eq!(*a, *b);
        assert_ne!(*a, *c);
    }
}
