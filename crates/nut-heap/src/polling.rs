//! Periodic polling of observed patterns
//!
//! A [`PollingScheduler`] keeps the listeners registered on a DAO and, on each
//! cycle, lists every observed pattern once, computes each path's timestamp
//! once and hands the results to the listeners.
//!
//! Listeners are held strongly until [`PollingScheduler::unobserve`] is called
//! or they report they are no longer alive.

use crate::dao::{same_listener, NutDaoListener, PathFormat};
use crate::error::HeapResult;
use indexmap::IndexMap;
use nut_model::{ScheduledTask, WorkerPool};
use parking_lot::Mutex;
use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Paths and timestamps seen by a polling cycle
pub trait PollSource: Send + Sync {
    /// Paths matching `pattern` that would become nuts
    ///
    /// # Errors
    /// Invalid pattern or listing failure.
    fn list_paths(&self, pattern: &str, format: PathFormat) -> HeapResult<Vec<String>>;

    /// Current version of `path`
    ///
    /// # Errors
    /// Backend failures while computing the version.
    fn timestamp_for(&self, path: &str) -> HeapResult<i64>;
}

#[derive(Clone)]
struct Observation {
    listener: Arc<dyn NutDaoListener>,
    patterns: IndexMap<String, PathFormat>,
}

/// Summary of one polling cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollReport {
    /// Listeners that asked to stop during the cycle
    pub excluded: usize,
    /// Listeners removed from the scheduler
    pub removed: usize,
    /// Patterns that could not be listed
    pub failed_patterns: usize,
}

/// Observer registry with an optional periodic task
#[derive(Default)]
pub struct PollingScheduler {
    observers: Mutex<Vec<Observation>>,
    task: Mutex<Option<ScheduledTask>>,
    interval_secs: Mutex<u64>,
}

impl PollingScheduler {
    /// Scheduler with no observer and no periodic task
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe `pattern` on behalf of `listener`
    pub fn observe(&self, pattern: &str, format: PathFormat, listener: Arc<dyn NutDaoListener>) {
        let mut observers = self.observers.lock();
        match observers
            .iter_mut()
            .find(|o| same_listener(&o.listener, &listener))
        {
            Some(observation) => {
                observation.patterns.insert(pattern.to_string(), format);
            }
            None => {
                let mut patterns = IndexMap::new();
                patterns.insert(pattern.to_string(), format);
                observers.push(Observation { listener, patterns });
            }
        }
    }

    /// Forget `listener`, returning whether it was registered
    pub fn unobserve(&self, listener: &Arc<dyn NutDaoListener>) -> bool {
        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|o| !same_listener(&o.listener, listener));
        observers.len() != before
    }

    /// Number of registered listeners
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.lock().len()
    }

    /// Patterns observed by `listener`
    #[must_use]
    pub fn patterns_of(&self, listener: &Arc<dyn NutDaoListener>) -> Vec<String> {
        self.observers
            .lock()
            .iter()
            .find(|o| same_listener(&o.listener, listener))
            .map(|o| o.patterns.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Current interval in seconds, `0` when polling is disabled
    #[must_use]
    pub fn polling_interval(&self) -> u64 {
        *self.interval_secs.lock()
    }

    /// Replace the periodic task: cancels the current one and, for a positive
    /// interval, runs `job` every `secs` seconds on `pool`
    ///
    /// # Errors
    /// Failure to schedule the task.
    pub fn set_polling_interval<F>(&self, secs: u64, pool: &WorkerPool, job: F) -> HeapResult<()>
    where
        F: Fn() + Send + Sync + 'static,
    {
        let mut task = self.task.lock();
        if let Some(previous) = task.take() {
            debug!("cancelling polling task");
            previous.cancel();
        }
        *self.interval_secs.lock() = secs;

        if secs > 0 {
            debug!(interval_secs = secs, "starting polling task");
            *task = Some(pool.execute_every(Duration::from_secs(secs), job)?);
        }
        Ok(())
    }

    /// Stop the periodic task
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.cancel();
        }
        *self.interval_secs.lock() = 0;
    }

    /// Run one polling cycle over `source`
    pub fn poll_once(&self, source: &dyn PollSource) -> PollReport {
        let start = Instant::now();
        let observers = self.observers.lock().clone();
        let mut report = PollReport::default();
        let mut cycle = Cycle::default();
        let mut dead = Vec::new();

        for observation in &observers {
            if !observation.listener.is_alive() {
                dead.push(Arc::clone(&observation.listener));
                continue;
            }
            for (pattern, format) in &observation.patterns {
                let paths = match cycle.paths.entry((pattern.clone(), *format)) {
                    Entry::Occupied(entry) => entry.into_mut(),
                    Entry::Vacant(entry) => match source.list_paths(pattern, *format) {
                        Ok(paths) => entry.insert(paths),
                        Err(e) => {
                            warn!(pattern = %pattern, error = %e, "unable to list paths");
                            report.failed_patterns += 1;
                            continue;
                        }
                    },
                };
                let paths = paths.clone();
                cycle.evaluate(source, &observation.listener, pattern, &paths);
            }
        }

        report.excluded = cycle.exclusions.len();
        report.removed = self.dispose(&cycle.exclusions, &dead);
        debug!(
            observers = observers.len(),
            excluded = report.excluded,
            removed = report.removed,
            elapsed = ?start.elapsed(),
            "polling cycle done"
        );
        report
    }

    /// Remove dead listeners, and every disposable listener sharing a factory
    /// with a disposable excluded one
    fn dispose(&self, exclusions: &[Arc<dyn NutDaoListener>], dead: &[Arc<dyn NutDaoListener>]) -> usize {
        let factories: HashSet<String> = exclusions
            .iter()
            .filter(|l| l.is_disposable())
            .filter_map(|l| l.factory().map(str::to_string))
            .collect();

        let mut observers = self.observers.lock();
        let before = observers.len();
        observers.retain(|o| {
            let listener = &o.listener;
            let is_dead = dead.iter().any(|d| same_listener(d, listener));
            let disposed = listener.is_disposable()
                && listener.factory().is_some_and(|f| factories.contains(f));
            !(is_dead || disposed)
        });
        before - observers.len()
    }
}

#[derive(Default)]
struct Cycle {
    paths: HashMap<(String, PathFormat), Vec<String>>,
    timestamps: HashMap<String, Option<i64>>,
    exclusions: Vec<Arc<dyn NutDaoListener>>,
}

impl Cycle {
    fn is_excluded(&self, listener: &Arc<dyn NutDaoListener>) -> bool {
        self.exclusions.iter().any(|l| same_listener(l, listener))
    }

    fn evaluate(
        &mut self,
        source: &dyn PollSource,
        listener: &Arc<dyn NutDaoListener>,
        pattern: &str,
        paths: &[String],
    ) {
        if self.is_excluded(listener) {
            return;
        }

        let set: HashSet<String> = paths.iter().cloned().collect();
        if !listener.polling(pattern, &set) {
            self.exclusions.push(Arc::clone(listener));
            return;
        }

        for path in paths {
            let timestamp = *self.timestamps.entry(path.clone()).or_insert_with(|| {
                source
                    .timestamp_for(path)
                    .map_err(|e| warn!(path = %path, error = %e, "unable to poll nut"))
                    .ok()
            });
            if !listener.nut_polled(path, timestamp) {
                self.exclusions.push(Arc::clone(listener));
                break;
            }
        }
    }
}

impl std::fmt::Debug for PollingScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollingScheduler")
            .field("observers", &self.observer_count())
            .field("interval_secs", &self.polling_interval())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HeapError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Source;

    impl PollSource for Source {
        fn list_paths(&self, pattern: &str, _format: PathFormat) -> HeapResult<Vec<String>> {
            match pattern {
                "broken" => Err(HeapError::bad_argument("unlistable")),
                other => Ok(vec![format!("{other}/a"), format!("{other}/b")]),
            }
        }

        fn timestamp_for(&self, _path: &str) -> HeapResult<i64> {
            Ok(1)
        }
    }

    #[derive(Default)]
    struct Recorder {
        keep_polling: bool,
        keep_nuts: bool,
        disposable: bool,
        factory: Option<&'static str>,
        polls: AtomicUsize,
        nuts: AtomicUsize,
    }

    impl NutDaoListener for Recorder {
        fn polling(&self, _pattern: &str, _paths: &HashSet<String>) -> bool {
            self.polls.fetch_add(1, Ordering::SeqCst);
            self.keep_polling
        }

        fn nut_polled(&self, _path: &str, _timestamp: Option<i64>) -> bool {
            self.nuts.fetch_add(1, Ordering::SeqCst);
            self.keep_nuts
        }

        fn is_disposable(&self) -> bool {
            self.disposable
        }

        fn factory(&self) -> Option<&str> {
            self.factory
        }
    }

    fn recorder(keep_polling: bool, keep_nuts: bool) -> Arc<Recorder> {
        Arc::new(Recorder {
            keep_polling,
            keep_nuts,
            ..Recorder::default()
        })
    }

    #[test]
    fn observe_merges_patterns_per_listener() {
        let scheduler = PollingScheduler::new();
        let listener: Arc<dyn NutDaoListener> = recorder(true, true);
        scheduler.observe("css", PathFormat::Any, Arc::clone(&listener));
        scheduler.observe("js", PathFormat::Any, Arc::clone(&listener));
        scheduler.observe("css", PathFormat::Any, Arc::clone(&listener));
        assert_eq!(scheduler.observer_count(), 1);
        assert_eq!(scheduler.patterns_of(&listener), vec!["css", "js"]);
        assert!(scheduler.unobserve(&listener));
        assert!(!scheduler.unobserve(&listener));
    }

    #[test]
    fn exclusion_lasts_for_one_cycle() {
        let scheduler = PollingScheduler::new();
        let quitter = recorder(false, true);
        scheduler.observe("css", PathFormat::Any, quitter.clone());
        scheduler.observe("js", PathFormat::Any, quitter.clone());

        let report = scheduler.poll_once(&Source);
        assert_eq!(report.excluded, 1);
        assert_eq!(quitter.polls.load(Ordering::SeqCst), 1);

        scheduler.poll_once(&Source);
        assert_eq!(quitter.polls.load(Ordering::SeqCst), 2);
        assert_eq!(scheduler.observer_count(), 1);
    }

    #[test]
    fn nut_polled_false_stops_the_pattern() {
        let scheduler = PollingScheduler::new();
        let listener = recorder(true, false);
        scheduler.observe("css", PathFormat::Any, listener.clone());
        scheduler.poll_once(&Source);
        assert_eq!(listener.nuts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disposable_listeners_of_same_factory_are_removed() {
        let scheduler = PollingScheduler::new();
        let excluded = Arc::new(Recorder {
            disposable: true,
            factory: Some("engine"),
            ..Recorder::default()
        });
        let sibling = Arc::new(Recorder {
            keep_polling: true,
            keep_nuts: true,
            disposable: true,
            factory: Some("engine"),
            ..Recorder::default()
        });
        let other = Arc::new(Recorder {
            keep_polling: true,
            keep_nuts: true,
            disposable: true,
            factory: Some("other"),
            ..Recorder::default()
        });
        scheduler.observe("css", PathFormat::Any, excluded);
        scheduler.observe("css", PathFormat::Any, sibling);
        scheduler.observe("css", PathFormat::Any, other);

        let report = scheduler.poll_once(&Source);
        assert_eq!(report.removed, 2);
        assert_eq!(scheduler.observer_count(), 1);
    }

    #[test]
    fn listing_failures_do_not_stop_the_cycle() {
        let scheduler = PollingScheduler::new();
        let listener = recorder(true, true);
        scheduler.observe("broken", PathFormat::Any, listener.clone());
        scheduler.observe("css", PathFormat::Any, listener.clone());
        let report = scheduler.poll_once(&Source);
        assert_eq!(report.failed_patterns, 1);
        assert_eq!(listener.nuts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn interval_can_be_replaced() {
        let pool = WorkerPool::new(1).unwrap();
        let scheduler = PollingScheduler::new();
        scheduler.set_polling_interval(60, &pool, || {}).unwrap();
        assert_eq!(scheduler.polling_interval(), 60);
        scheduler.set_polling_interval(0, &pool, || {}).unwrap();
        assert_eq!(scheduler.polling_interval(), 0);
        scheduler.stop();
    }
}
