use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::log::format::format_export;
use crate::log::log_record::LogRecord;
use crate::log::log_sink::LogSink;
use crate::log::ring_buffer::RingBuffer;
use crate::log::sink_error::SinkError;

pub const DEFAULT_GLOBAL_CAPACITY: usize = 4096;
pub const DEFAULT_SESSION_CAPACITY: usize = 512;

/// Keeps the most recent records in memory, globally and per session.
///
/// Every record lands in the global ring. Records carrying a session id also
/// land in that session's ring, which is created on first use with the
/// per-session capacity. The session registry is read-mostly: lookups and
/// pushes to an existing ring take the read lock, creation and clearing take
/// the write lock.
#[derive(Debug)]
pub struct InMemorySink {
    global: RingBuffer<LogRecord>,
    session_capacity: usize,
    sessions: RwLock<HashMap<String, RingBuffer<LogRecord>>>,
}

impl InMemorySink {
    #[must_use]
    pub fn new(global_capacity: usize, session_capacity: usize) -> Self {
        Self {
            global: RingBuffer::new(global_capacity),
            session_capacity,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    fn read_sessions(&self) -> RwLockReadGuard<'_, HashMap<String, RingBuffer<LogRecord>>> {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_sessions(&self) -> RwLockWriteGuard<'_, HashMap<String, RingBuffer<LogRecord>>> {
        self.sessions.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// The `n` most recent records overall, oldest first.
    #[must_use]
    pub fn recent_global(&self, n: usize) -> Vec<LogRecord> {
        self.global.last_n(n)
    }

    /// The `n` most recent records of one session, oldest first.
    ///
    /// Unknown sessions yield an empty list.
    #[must_use]
    pub fn recent_for_session(&self, session_id: &str, n: usize) -> Vec<LogRecord> {
        self.read_sessions()
            .get(session_id)
            .map(|ring| ring.last_n(n))
            .unwrap_or_default()
    }

    /// Everything retained for a session, one formatted line per record.
    #[must_use]
    pub fn export_session(&self, session_id: &str) -> String {
        let mut out = String::new();
        for rec in self.recent_for_session(session_id, usize::MAX) {
            out.push_str(&format_export(&rec));
            out.push('\n');
        }
        out
    }

    /// Drops one session's ring. Returns whether it existed.
    pub fn clear_session(&self, session_id: &str) -> bool {
        self.write_sessions().remove(session_id).is_some()
    }

    /// Empties the global ring and forgets every session.
    pub fn clear_all(&self) {
        self.global.clear();
        self.write_sessions().clear();
    }

    /// Ids of the sessions currently retained, sorted.
    #[must_use]
    pub fn session_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.read_sessions().keys().cloned().collect();
        ids.sort();
        ids
    }

    #[must_use]
    pub fn session_capacity(&self) -> usize {
        self.session_capacity
    }

    #[must_use]
    pub fn global_capacity(&self) -> usize {
        self.global.capacity()
    }
}

impl Default for InMemorySink {
    fn default() -> Self {
        Self::new(DEFAULT_GLOBAL_CAPACITY, DEFAULT_SESSION_CAPACITY)
    }
}

impl LogSink for InMemorySink {
    fn consume(&self, rec: &LogRecord) -> Result<(), SinkError> {
        self.global.push(rec.clone());

        let Some(sid) = rec.session() else {
            return Ok(());
        };

        // Fast path: ring already exists, the read lock is enough since the
        // ring locks itself.
        {
            let sessions = self.read_sessions();
            if let Some(ring) = sessions.get(sid) {
                ring.push(rec.clone());
                return Ok(());
            }
        }

        // First touch. Another thread may have created it in between, so
        // go through the entry API.
        let mut sessions = self.write_sessions();
        sessions
            .entry(sid.to_owned())
            .or_insert_with(|| RingBuffer::new(self.session_capacity))
            .push(rec.clone());
        Ok(())
    }

    fn as_memory(&self) -> Option<&InMemorySink> {
        Some(self)
    }
}
