use std::sync::{Arc, OnceLock};

use crate::log::log_level::LogLevel;
use crate::log::log_record::LogRecord;
use crate::log::pipeline::{AsyncPipeline, SubscriberId};

/// Lightweight, cloneable handle to a running pipeline.
///
/// Every call is fire-and-forget: it never blocks on sink I/O and never
/// returns an error. Typical usage is to obtain one from a
/// [`Logger`](crate::log::logger::Logger) and clone it per thread/connection.
///
/// # Examples
/// ```ignore
/// let log = logger.handle();
/// log.info("server started");
/// log.warn_in("conn-7", "client sent an unknown command");
/// ```
#[derive(Clone)]
pub struct LoggerHandle {
    pipeline: Arc<AsyncPipeline>,
}

impl LoggerHandle {
    #[must_use]
    pub fn new(pipeline: Arc<AsyncPipeline>) -> Self {
        Self { pipeline }
    }

    #[must_use]
    pub fn pipeline(&self) -> &Arc<AsyncPipeline> {
        &self.pipeline
    }

    #[inline]
    pub fn log(&self, level: LogLevel, session_id: Option<&str>, msg: impl Into<String>) {
        self.pipeline.submit(level, session_id, msg);
    }

    pub fn trace(&self, msg: impl Into<String>) {
        self.log(LogLevel::Trace, None, msg);
    }
    pub fn debug(&self, msg: impl Into<String>) {
        self.log(LogLevel::Debug, None, msg);
    }
    pub fn info(&self, msg: impl Into<String>) {
        self.log(LogLevel::Info, None, msg);
    }
    pub fn warn(&self, msg: impl Into<String>) {
        self.log(LogLevel::Warn, None, msg);
    }
    pub fn error(&self, msg: impl Into<String>) {
        self.log(LogLevel::Error, None, msg);
    }
    pub fn fatal(&self, msg: impl Into<String>) {
        self.log(LogLevel::Fatal, None, msg);
    }

    pub fn trace_in(&self, session_id: &str, msg: impl Into<String>) {
        self.log(LogLevel::Trace, Some(session_id), msg);
    }
    pub fn debug_in(&self, session_id: &str, msg: impl Into<String>) {
        self.log(LogLevel::Debug, Some(session_id), msg);
    }
    pub fn info_in(&self, session_id: &str, msg: impl Into<String>) {
        self.log(LogLevel::Info, Some(session_id), msg);
    }
    pub fn warn_in(&self, session_id: &str, msg: impl Into<String>) {
        self.log(LogLevel::Warn, Some(session_id), msg);
    }
    pub fn error_in(&self, session_id: &str, msg: impl Into<String>) {
        self.log(LogLevel::Error, Some(session_id), msg);
    }
    pub fn fatal_in(&self, session_id: &str, msg: impl Into<String>) {
        self.log(LogLevel::Fatal, Some(session_id), msg);
    }

    /// A logger bound to one session id.
    #[must_use]
    pub fn session(&self, session_id: impl Into<String>) -> SessionLogger {
        SessionLogger {
            handle: self.clone(),
            session_id: session_id.into(),
        }
    }

    pub fn set_level(&self, level: LogLevel) {
        self.pipeline.set_level(level);
    }

    #[must_use]
    pub fn level(&self) -> LogLevel {
        self.pipeline.level()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriberId
    where
        F: Fn(&LogRecord) + Send + Sync + 'static,
    {
        self.pipeline.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.pipeline.unsubscribe(id)
    }

    #[must_use]
    pub fn recent_global(&self, n: usize) -> Vec<LogRecord> {
        self.pipeline.recent_global(n)
    }

    #[must_use]
    pub fn recent_for_session(&self, session_id: &str, n: usize) -> Vec<LogRecord> {
        self.pipeline.recent_for_session(session_id, n)
    }

    #[must_use]
    pub fn export_session(&self, session_id: &str) -> String {
        self.pipeline.export_session(session_id)
    }

    pub fn clear_session(&self, session_id: &str) -> bool {
        self.pipeline.clear_session(session_id)
    }

    pub fn clear_all(&self) {
        self.pipeline.clear_all();
    }
}

/// Handle that tags every record with a fixed session id.
#[derive(Clone)]
pub struct SessionLogger {
    handle: LoggerHandle,
    session_id: String,
}

impl SessionLogger {
    #[must_use]
    pub fn id(&self) -> &str {
        &self.session_id
    }

    #[must_use]
    pub fn handle(&self) -> &LoggerHandle {
        &self.handle
    }

    pub fn log(&self, level: LogLevel, msg: impl Into<String>) {
        self.handle.log(level, Some(&self.session_id), msg);
    }

    pub fn trace(&self, msg: impl Into<String>) {
        self.log(LogLevel::Trace, msg);
    }
    pub fn debug(&self, msg: impl Into<String>) {
        self.log(LogLevel::Debug, msg);
    }
    pub fn info(&self, msg: impl Into<String>) {
        self.log(LogLevel::Info, msg);
    }
    pub fn warn(&self, msg: impl Into<String>) {
        self.log(LogLevel::Warn, msg);
    }
    pub fn error(&self, msg: impl Into<String>) {
        self.log(LogLevel::Error, msg);
    }
    pub fn fatal(&self, msg: impl Into<String>) {
        self.log(LogLevel::Fatal, msg);
    }
}

static GLOBAL: OnceLock<LoggerHandle> = OnceLock::new();

/// Installs the process-wide default handle. The first install wins.
///
/// Returns `false` if a default was already installed.
pub fn install_global(handle: LoggerHandle) -> bool {
    GLOBAL.set(handle).is_ok()
}

/// The process-wide default handle, if one was installed.
///
/// Meant for call sites that cannot be handed a handle explicitly.
#[must_use]
pub fn global() -> Option<&'static LoggerHandle> {
    GLOBAL.get()
}
