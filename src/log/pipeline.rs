use std::collections::{BTreeMap, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crate::log::log_level::LogLevel;
use crate::log::log_record::LogRecord;
use crate::log::log_sink::LogSink;
use crate::log::memory_sink::InMemorySink;

pub const DEFAULT_MAX_QUEUE_LEN: usize = 1 << 16;

/// How long the worker sleeps on the condvar before re-checking the stop flag.
const WORKER_WAIT: Duration = Duration::from_millis(200);

/// Callback invoked for every accepted record on the producer's thread.
pub type Subscriber = Arc<dyn Fn(&LogRecord) + Send + Sync>;

/// Handle returned by [`AsyncPipeline::subscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubscriberId(pub u64);

// Each lock guards one container and every critical section is a single
// container operation, so a poisoned lock still holds consistent data.
fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Shared {
    queue: Mutex<VecDeque<LogRecord>>,
    queue_cv: Condvar,
    max_queue_len: usize,
    stop: AtomicBool,
    sinks: Mutex<Vec<Arc<dyn LogSink>>>,
    subscribers: Mutex<BTreeMap<SubscriberId, Subscriber>>,
    next_subscriber: AtomicU64,
    threshold: AtomicU8,
}

impl Shared {
    fn sink_snapshot(&self) -> Vec<Arc<dyn LogSink>> {
        lock(&self.sinks).clone()
    }

    fn flush_sinks(&self) {
        for sink in self.sink_snapshot() {
            match panic::catch_unwind(AssertUnwindSafe(|| sink.flush())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => eprintln!("[AsyncPipeline] sink flush failed: {e}"),
                Err(_) => eprintln!("[AsyncPipeline] sink panicked during flush"),
            }
        }
    }

    /// Blocks until a record is available or stop was requested with an
    /// empty queue; `None` means the worker should exit.
    fn next_record(&self) -> Option<LogRecord> {
        let mut q = lock(&self.queue);
        loop {
            if let Some(rec) = q.pop_front() {
                return Some(rec);
            }
            if self.stop.load(Ordering::Acquire) {
                return None;
            }
            q = self
                .queue_cv
                .wait_timeout(q, WORKER_WAIT)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    fn dispatch(&self, rec: &LogRecord) {
        // Sinks removed after this snapshot still get this record.
        for sink in self.sink_snapshot() {
            match panic::catch_unwind(AssertUnwindSafe(|| sink.consume(rec))) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => eprintln!("[AsyncPipeline] sink failed to consume record: {e}"),
                Err(_) => eprintln!("[AsyncPipeline] sink panicked while consuming record"),
            }
        }
    }

    fn run_worker(&self) {
        while let Some(rec) = self.next_record() {
            self.dispatch(&rec);
        }
        self.flush_sinks();
    }
}

/// Bounded, asynchronous fan-out from many producers to a set of sinks.
///
/// # Architecture
///
/// 1. **Producers** call [`submit`](Self::submit) from any thread. Records
///    below the threshold are discarded on the spot.
/// 2. **Subscribers** ("tail" callbacks) run synchronously on the producer's
///    thread, before the record is queued. A subscriber therefore always sees
///    a record before any sink does, and a slow subscriber stalls its producer.
///    It also holds the record back: nothing reaches the queue until every
///    subscriber has returned.
/// 3. **Queue**: a `VecDeque` bounded by `max_queue_len`. When full, the
///    oldest queued record is evicted; `submit` never blocks on sinks and
///    never reports an error.
/// 4. **Worker**: one dedicated thread pops records in FIFO order and hands
///    each one to every registered sink. A failing or panicking sink is
///    reported on standard error and skipped.
///
/// [`shutdown`](Self::shutdown) drains everything already queued before it
/// returns, so nothing accepted is lost to shutdown itself.
pub struct AsyncPipeline {
    shared: Arc<Shared>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl AsyncPipeline {
    /// Creates a stopped pipeline with the given queue bound (at least 1).
    #[must_use]
    pub fn new(max_queue_len: usize) -> Self {
        Self {
            shared: Arc::new(Shared {
                queue: Mutex::new(VecDeque::new()),
                queue_cv: Condvar::new(),
                max_queue_len: max_queue_len.max(1),
                stop: AtomicBool::new(false),
                sinks: Mutex::new(Vec::new()),
                subscribers: Mutex::new(BTreeMap::new()),
                next_subscriber: AtomicU64::new(1),
                threshold: AtomicU8::new(LogLevel::Info.as_u8()),
            }),
            worker: Mutex::new(None),
        }
    }

    // ---- Lifecycle ---------------------------------------------------------

    /// Spawns the dispatch worker. Does nothing if it is already running.
    pub fn start(&self) {
        let mut worker = lock(&self.worker);
        if worker.is_some() {
            return;
        }
        self.shared.stop.store(false, Ordering::Release);

        let shared = self.shared.clone();
        match thread::Builder::new()
            .name("keyforge-log-worker".into())
            .spawn(move || shared.run_worker())
        {
            Ok(handle) => *worker = Some(handle),
            Err(e) => eprintln!("[AsyncPipeline] cannot spawn worker thread: {e}"),
        }
    }

    /// Stops the worker after it drained the queue, then optionally flushes
    /// every sink. Does nothing if the worker is not running.
    pub fn shutdown(&self, flush: bool) {
        let Some(handle) = lock(&self.worker).take() else {
            return;
        };

        {
            // Set under the queue lock so the worker cannot miss the wakeup
            // between its stop check and its wait.
            let _q = lock(&self.shared.queue);
            self.shared.stop.store(true, Ordering::Release);
        }
        self.shared.queue_cv.notify_all();

        if handle.join().is_err() {
            eprintln!("[AsyncPipeline] worker thread panicked");
        }
        if flush {
            self.shared.flush_sinks();
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        lock(&self.worker).is_some()
    }

    /// Flushes every registered sink on the calling thread.
    pub fn flush(&self) {
        self.shared.flush_sinks();
    }

    // ---- Ingestion ---------------------------------------------------------

    /// Accepts a record for asynchronous delivery.
    ///
    /// Fire-and-forget: below-threshold records are dropped silently, and a
    /// full queue evicts its oldest record to make room.
    pub fn submit(&self, level: LogLevel, session_id: Option<&str>, message: impl Into<String>) {
        if level < self.level() {
            return;
        }
        let rec = LogRecord::capture(level, session_id, message);

        self.notify_subscribers(&rec);

        {
            let mut q = lock(&self.shared.queue);
            while q.len() >= self.shared.max_queue_len {
                q.pop_front();
            }
            q.push_back(rec);
        }
        self.shared.queue_cv.notify_one();
    }

    fn notify_subscribers(&self, rec: &LogRecord) {
        let subs: Vec<Subscriber> = lock(&self.shared.subscribers).values().cloned().collect();
        for sub in subs {
            if panic::catch_unwind(AssertUnwindSafe(|| sub(rec))).is_err() {
                eprintln!("[AsyncPipeline] subscriber panicked; record still delivered");
            }
        }
    }

    /// Number of records waiting for the worker.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.shared.queue).len()
    }

    #[must_use]
    pub fn max_queue_len(&self) -> usize {
        self.shared.max_queue_len
    }

    // ---- Threshold ---------------------------------------------------------

    pub fn set_level(&self, level: LogLevel) {
        self.shared.threshold.store(level.as_u8(), Ordering::Relaxed);
    }

    #[must_use]
    pub fn level(&self) -> LogLevel {
        LogLevel::from_u8(self.shared.threshold.load(Ordering::Relaxed)).unwrap_or(LogLevel::Info)
    }

    // ---- Sinks -------------------------------------------------------------

    pub fn add_sink(&self, sink: Arc<dyn LogSink>) {
        lock(&self.shared.sinks).push(sink);
    }

    /// Removes every registration of this exact sink instance.
    ///
    /// Returns whether anything was removed.
    pub fn remove_sink(&self, sink: &Arc<dyn LogSink>) -> bool {
        let mut sinks = lock(&self.shared.sinks);
        let before = sinks.len();
        sinks.retain(|s| !Arc::ptr_eq(s, sink));
        sinks.len() != before
    }

    #[must_use]
    pub fn sink_count(&self) -> usize {
        lock(&self.shared.sinks).len()
    }

    // ---- Subscribers -------------------------------------------------------

    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.shared.next_subscriber.fetch_add(1, Ordering::Relaxed));
        lock(&self.shared.subscribers).insert(id, Arc::new(callback));
        id
    }

    /// Returns whether the subscriber was registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        lock(&self.shared.subscribers).remove(&id).is_some()
    }

    // ---- Queries (routed to the first in-memory sink) ----------------------

    fn with_memory<R>(&self, default: R, f: impl FnOnce(&InMemorySink) -> R) -> R {
        let sinks = self.shared.sink_snapshot();
        match sinks.iter().find_map(|s| s.as_memory()) {
            Some(mem) => f(mem),
            None => default,
        }
    }

    #[must_use]
    pub fn recent_global(&self, n: usize) -> Vec<LogRecord> {
        self.with_memory(Vec::new(), |m| m.recent_global(n))
    }

    #[must_use]
    pub fn recent_for_session(&self, session_id: &str, n: usize) -> Vec<LogRecord> {
        self.with_memory(Vec::new(), |m| m.recent_for_session(session_id, n))
    }

    #[must_use]
    pub fn export_session(&self, session_id: &str) -> String {
        self.with_memory(String::new(), |m| m.export_session(session_id))
    }

    pub fn clear_session(&self, session_id: &str) -> bool {
        self.with_memory(false, |m| m.clear_session(session_id))
    }

    pub fn clear_all(&self) {
        self.with_memory((), |m| m.clear_all());
    }
}

impl Default for AsyncPipeline {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_QUEUE_LEN)
    }
}

impl Drop for AsyncPipeline {
    fn drop(&mut self) {
        self.shutdown(true);
    }
}
