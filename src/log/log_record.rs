use std::cell::Cell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use crate::log::log_level::LogLevel;

static NEXT_PRODUCER_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static PRODUCER_ID: Cell<u64> = const { Cell::new(0) };
}

/// Small, stable numeric id for the calling thread.
///
/// Assigned lazily on the first call from a thread and kept for the thread's
/// lifetime. Ids are never reused within a process.
#[must_use]
pub fn current_producer_id() -> u64 {
    PRODUCER_ID.with(|id| {
        let v = id.get();
        if v != 0 {
            return v;
        }
        let fresh = NEXT_PRODUCER_ID.fetch_add(1, Ordering::Relaxed);
        id.set(fresh);
        fresh
    })
}

/// A single captured log event.
///
/// Records are immutable once built. Every sink and ring that keeps one keeps
/// its own clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Capture time (taken at submission, not at dispatch).
    pub ts: SystemTime,
    /// Id of the producing thread, see [`current_producer_id`].
    pub producer_id: u64,
    pub level: LogLevel,
    /// Application-defined correlation id, if any.
    pub session_id: Option<String>,
    pub message: String,
}

impl LogRecord {
    /// Captures a record on the current thread, stamped with the current time.
    pub fn capture(level: LogLevel, session_id: Option<&str>, message: impl Into<String>) -> Self {
        Self {
            ts: SystemTime::now(),
            producer_id: current_producer_id(),
            level,
            session_id: session_id.map(str::to_owned),
            message: message.into(),
        }
    }

    /// Builds a record with explicit metadata. Mostly useful for tests and replay.
    pub fn new(
        ts: SystemTime,
        producer_id: u64,
        level: LogLevel,
        session_id: Option<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            ts,
            producer_id,
            level,
            session_id,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn session(&self) -> Option<&str> {
        self.session_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use std::thread;

    #[test]
    fn producer_id_is_stable_per_thread() {
        let a = current_producer_id();
        let b = current_producer_id();
        assert_eq!(a, b);
        assert_ne!(a, 0);
    }

    #[test]
    fn producer_ids_differ_across_threads() {
        let here = current_producer_id();
        let there = thread::spawn(current_producer_id).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn capture_fills_metadata() {
        let rec = LogRecord::capture(LogLevel::Warn, Some("s-1"), "disk almost full");
        assert_eq!(rec.level, LogLevel::Warn);
        assert_eq!(rec.session(), Some("s-1"));
        assert_eq!(rec.message, "disk almost full");
        assert_eq!(rec.producer_id, current_producer_id());
        assert!(rec.ts <= SystemTime::now());
    }
}
