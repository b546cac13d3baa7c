//! Reactive props and job scheduling.
//!
//! `Props` is a shared mapping whose mutations schedule every subscribed
//! `Job` on the store's `Scheduler`. When a job actually runs is decided by the
//! scheduler alone: `BatchScheduler` collapses any number of mutations into a
//! single run per `flush`, `SyncScheduler` runs the job on every mutation.

use serde_json::{Map, Value};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

pub type PropMap = Map<String, Value>;

static JOB_ID_COUNTER: AtomicU64 = AtomicU64::new(0);

// ═══════════════════════════════════════════════════════════════════════════════
// JOBS
// ═══════════════════════════════════════════════════════════════════════════════

struct JobInner {
    id: u64,
    runs: Cell<usize>,
    callback: Box<dyn Fn()>,
}

/// A re-runnable unit of deferred work. Clones share the same job.
#[derive(Clone)]
pub struct Job {
    inner: Rc<JobInner>,
}

impl Job {
    pub fn new(callback: impl Fn() + 'static) -> Self {
        Job {
            inner: Rc::new(JobInner {
                id: JOB_ID_COUNTER.fetch_add(1, Ordering::SeqCst),
                runs: Cell::new(0),
                callback: Box::new(callback),
            }),
        }
    }

    pub fn run(&self) {
        self.inner.runs.set(self.inner.runs.get() + 1);
        (self.inner.callback)();
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// How many times `run` has been called.
    pub fn run_count(&self) -> usize {
        self.inner.runs.get()
    }

    fn downgrade(&self) -> Weak<JobInner> {
        Rc::downgrade(&self.inner)
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.inner.id)
            .field("runs", &self.inner.runs.get())
            .finish()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SCHEDULERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Decides when a scheduled job runs.
pub trait Scheduler {
    fn schedule(&self, job: &Job);

    /// Run whatever is pending. Schedulers that never defer have nothing to do.
    fn flush(&self) {}

    fn pending(&self) -> usize {
        0
    }
}

/// Upper bound on job runs in one flush, so a render that keeps mutating its
/// own props cannot spin forever.
const MAX_FLUSH_RUNS: usize = 10_000;

/// Queues jobs and runs each one once per flush no matter how often it was
/// scheduled in between.
#[derive(Default)]
pub struct BatchScheduler {
    queue: RefCell<VecDeque<Job>>,
}

impl BatchScheduler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Scheduler for BatchScheduler {
    fn schedule(&self, job: &Job) {
        let mut queue = self.queue.borrow_mut();
        if queue.iter().any(|queued| queued.id() == job.id()) {
            tracing::trace!(job = job.id(), "job already queued");
            return;
        }
        tracing::trace!(job = job.id(), "job queued");
        queue.push_back(job.clone());
    }

    fn flush(&self) {
        let mut runs = 0;
        loop {
            let Some(next) = self.queue.borrow_mut().pop_front() else {
                break;
            };
            if runs == MAX_FLUSH_RUNS {
                tracing::warn!(
                    job = next.id(),
                    "flush stopped after {} runs; jobs keep rescheduling themselves",
                    MAX_FLUSH_RUNS
                );
                self.queue.borrow_mut().clear();
                break;
            }
            next.run();
            runs += 1;
        }
    }

    fn pending(&self) -> usize {
        self.queue.borrow().len()
    }
}

/// Runs every job the moment it is scheduled.
#[derive(Default)]
pub struct SyncScheduler;

impl Scheduler for SyncScheduler {
    fn schedule(&self, job: &Job) {
        job.run();
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STORE
// ═══════════════════════════════════════════════════════════════════════════════

/// Creates reactive mappings bound to one scheduler.
#[derive(Clone)]
pub struct Store {
    scheduler: Rc<dyn Scheduler>,
}

impl Store {
    pub fn new(scheduler: impl Scheduler + 'static) -> Self {
        Store {
            scheduler: Rc::new(scheduler),
        }
    }

    pub fn make_reactive(&self, initial: PropMap) -> Props {
        Props {
            inner: Rc::new(PropsInner {
                data: RefCell::new(initial),
                subscribers: RefCell::new(Vec::new()),
                scheduler: self.scheduler.clone(),
            }),
        }
    }

    /// Run every job pending on this store's scheduler.
    pub fn flush(&self) {
        self.scheduler.flush();
    }

    pub fn pending(&self) -> usize {
        self.scheduler.pending()
    }
}

impl Default for Store {
    fn default() -> Self {
        Store::new(BatchScheduler::new())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PROPS
// ═══════════════════════════════════════════════════════════════════════════════

struct PropsInner {
    data: RefCell<PropMap>,
    subscribers: RefCell<Vec<Weak<JobInner>>>,
    scheduler: Rc<dyn Scheduler>,
}

/// Reactive string-keyed mapping. Clones share the same underlying data, and
/// every mutation that changes a value schedules the subscribed jobs.
#[derive(Clone)]
pub struct Props {
    inner: Rc<PropsInner>,
}

impl Props {
    pub fn get(&self, key: &str) -> Option<Value> {
        self.inner.data.borrow().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.data.borrow().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.data.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.data.borrow().is_empty()
    }

    /// Copy of the current contents. Reads through a snapshot are untracked.
    pub fn snapshot(&self) -> PropMap {
        self.inner.data.borrow().clone()
    }

    pub fn set(&self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        let changed = {
            let mut data = self.inner.data.borrow_mut();
            if data.get(&key) == Some(&value) {
                false
            } else {
                data.insert(key, value);
                true
            }
        };
        if changed {
            self.notify();
        }
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        let removed = self.inner.data.borrow_mut().remove(key);
        if removed.is_some() {
            self.notify();
        }
        removed
    }

    /// Copy every entry of `entries` in, scheduling subscribers at most once.
    pub fn merge(&self, entries: PropMap) {
        let mut changed = false;
        {
            let mut data = self.inner.data.borrow_mut();
            for (key, value) in entries {
                if data.get(&key) != Some(&value) {
                    data.insert(key, value);
                    changed = true;
                }
            }
        }
        if changed {
            self.notify();
        }
    }

    /// Re-schedule `job` on every future mutation of this mapping.
    pub fn subscribe(&self, job: &Job) {
        self.inner.subscribers.borrow_mut().push(job.downgrade());
    }

    pub fn ptr_eq(&self, other: &Props) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    fn notify(&self) {
        let jobs: Vec<Job> = {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            subscribers.retain(|weak| weak.strong_count() > 0);
            subscribers
                .iter()
                .filter_map(Weak::upgrade)
                .map(|inner| Job { inner })
                .collect()
        };
        for job in &jobs {
            self.inner.scheduler.schedule(job);
        }
    }
}

impl std::fmt::Debug for Props {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map().entries(self.inner.data.borrow().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn counting_job() -> (Job, Rc<Cell<usize>>) {
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let job = Job::new(move || counter.set(counter.get() + 1));
        (job, hits)
    }

    #[test]
    fn test_batch_scheduler_collapses_mutations() {
        let store = Store::default();
        let props = store.make_reactive(PropMap::new());
        let (job, hits) = counting_job();
        props.subscribe(&job);

        props.set("a", 1);
        props.set("b", 2);
        props.set("a", 3);
        assert_eq!(hits.get(), 0);
        assert_eq!(store.pending(), 1);

        store.flush();
        assert_eq!(hits.get(), 1);
        store.flush();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_batch_scheduler_runs_in_queue_order() {
        let scheduler = BatchScheduler::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        let jobs: Vec<Job> = (0..50)
            .map(|i| {
                let order = order.clone();
                Job::new(move || order.borrow_mut().push(i))
            })
            .collect();
        for job in jobs.iter().rev() {
            scheduler.schedule(job);
        }
        scheduler.schedule(&jobs[0]);
        assert_eq!(scheduler.pending(), 50);
        scheduler.flush();
        assert_eq!(*order.borrow(), (0..50).rev().collect::<Vec<_>>());
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn test_sync_scheduler_runs_per_mutation() {
        let store = Store::new(SyncScheduler);
        let props = store.make_reactive(PropMap::new());
        let (job, hits) = counting_job();
        props.subscribe(&job);

        props.set("a", 1);
        props.set("a", 2);
        assert_eq!(hits.get(), 2);
        assert_eq!(job.run_count(), 2);
    }

    #[test]
    fn test_unchanged_value_does_not_schedule() {
        let store = Store::new(SyncScheduler);
        let props = store.make_reactive(json!({"a": 1}).as_object().cloned().unwrap());
        let (job, hits) = counting_job();
        props.subscribe(&job);

        props.set("a", 1);
        props.merge(json!({"a": 1}).as_object().cloned().unwrap());
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_clones_share_data() {
        let store = Store::default();
        let props = store.make_reactive(PropMap::new());
        let alias = props.clone();
        alias.set("name", "y");
        assert_eq!(props.get("name"), Some(json!("y")));
        assert!(props.ptr_eq(&alias));
    }

    #[test]
    fn test_dropped_jobs_are_forgotten() {
        let store = Store::default();
        let props = store.make_reactive(PropMap::new());
        {
            let (job, _) = counting_job();
            props.subscribe(&job);
        }
        props.set("a", 1);
        assert_eq!(store.pending(), 0);
    }
}
