//! Leveled logging macros over a [`LoggerHandle`](crate::log::LoggerHandle).
//!
//! # Feature Flags
//! Specific log levels are controlled by cargo features:
//! `log-trace`, `log-debug`, `log-info`, `log-warn`, `log-error`.
//!
//! If a feature is disabled, the corresponding macros expand to `()`, removing
//! all formatting and allocation overhead at compile time. `Fatal` is never
//! compiled out. The pipeline's runtime threshold still applies on top.

// ============================================================================
// 1. GENERIC MACROS
// ============================================================================

#[macro_export]
macro_rules! handle_log {
    ($log:expr, $lvl:expr, $($arg:tt)*) => {{
        $log.log($lvl, None, format!($($arg)*));
    }};
}

#[macro_export]
macro_rules! handle_session_log {
    ($log:expr, $sid:expr, $lvl:expr, $($arg:tt)*) => {{
        $log.log(
            $lvl,
            Some(::core::convert::AsRef::<str>::as_ref(&$sid)),
            format!($($arg)*),
        );
    }};
}

// ============================================================================
// 2. LEVEL-SPECIFIC MACROS (Feature Gated)
// ============================================================================

// ---------------------- TRACE ----------------------
#[cfg(feature = "log-trace")]
#[macro_export]
macro_rules! log_trace     { ($log:expr, $($arg:tt)*)            => { $crate::handle_log!($log, $crate::log::LogLevel::Trace, $($arg)*) } }
#[cfg(feature = "log-trace")]
#[macro_export]
macro_rules! session_trace { ($log:expr, $sid:expr, $($arg:tt)*) => { $crate::handle_session_log!($log, $sid, $crate::log::LogLevel::Trace, $($arg)*) } }

#[cfg(not(feature = "log-trace"))]
#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => {
        ()
    };
}
#[cfg(not(feature = "log-trace"))]
#[macro_export]
macro_rules! session_trace {
    ($($arg:tt)*) => {
        ()
    };
}

// ---------------------- DEBUG ----------------------
#[cfg(feature = "log-debug")]
#[macro_export]
macro_rules! log_debug     { ($log:expr, $($arg:tt)*)            => { $crate::handle_log!($log, $crate::log::LogLevel::Debug, $($arg)*) } }
#[cfg(feature = "log-debug")]
#[macro_export]
macro_rules! session_debug { ($log:expr, $sid:expr, $($arg:tt)*) => { $crate::handle_session_log!($log, $sid, $crate::log::LogLevel::Debug, $($arg)*) } }

#[cfg(not(feature = "log-debug"))]
#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        ()
    };
}
#[cfg(not(feature = "log-debug"))]
#[macro_export]
macro_rules! session_debug {
    ($($arg:tt)*) => {
        ()
    };
}

// ---------------------- INFO ----------------------
#[cfg(feature = "log-info")]
#[macro_export]
macro_rules! log_info     { ($log:expr, $($arg:tt)*)            => { $crate::handle_log!($log, $crate::log::LogLevel::Info, $($arg)*) } }
#[cfg(feature = "log-info")]
#[macro_export]
macro_rules! session_info { ($log:expr, $sid:expr, $($arg:tt)*) => { $crate::handle_session_log!($log, $sid, $crate::log::LogLevel::Info, $($arg)*) } }

#[cfg(not(feature = "log-info"))]
#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        ()
    };
}
#[cfg(not(feature = "log-info"))]
#[macro_export]
macro_rules! session_info {
    ($($arg:tt)*) => {
        ()
    };
}

// ---------------------- WARN ----------------------
#[cfg(feature = "log-warn")]
#[macro_export]
macro_rules! log_warn     { ($log:expr, $($arg:tt)*)            => { $crate::handle_log!($log, $crate::log::LogLevel::Warn, $($arg)*) } }
#[cfg(feature = "log-warn")]
#[macro_export]
macro_rules! session_warn { ($log:expr, $sid:expr, $($arg:tt)*) => { $crate::handle_session_log!($log, $sid, $crate::log::LogLevel::Warn, $($arg)*) } }

#[cfg(not(feature = "log-warn"))]
#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        ()
    };
}
#[cfg(not(feature = "log-warn"))]
#[macro_export]
macro_rules! session_warn {
    ($($arg:tt)*) => {
        ()
    };
}

// ---------------------- ERROR ----------------------
// Generally always enabled, but consistent structure allows user to disable if really needed.
#[cfg(feature = "log-error")]
#[macro_export]
macro_rules! log_error     { ($log:expr, $($arg:tt)*)            => { $crate::handle_log!($log, $crate::log::LogLevel::Error, $($arg)*) } }
#[cfg(feature = "log-error")]
#[macro_export]
macro_rules! session_error { ($log:expr, $sid:expr, $($arg:tt)*) => { $crate::handle_session_log!($log, $sid, $crate::log::LogLevel::Error, $($arg)*) } }

#[cfg(not(feature = "log-error"))]
#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        ()
    };
}
#[cfg(not(feature = "log-error"))]
#[macro_export]
macro_rules! session_error {
    ($($arg:tt)*) => {
        ()
    };
}

// ---------------------- FATAL ----------------------
#[macro_export]
macro_rules! log_fatal     { ($log:expr, $($arg:tt)*)            => { $crate::handle_log!($log, $crate::log::LogLevel::Fatal, $($arg)*) } }
#[macro_export]
macro_rules! session_fatal { ($log:expr, $sid:expr, $($arg:tt)*) => { $crate::handle_session_log!($log, $sid, $crate::log::LogLevel::Fatal, $($arg)*) } }

#[cfg(test)]
mod tests {
    use crate::log::{AsyncPipeline, InMemorySink, LogLevel, LoggerHandle};
    use std::sync::Arc;

    #[test]
    fn enabled_macros_format_and_tag() {
        let pipeline = Arc::new(AsyncPipeline::new(64));
        let mem = Arc::new(InMemorySink::new(16, 16));
        pipeline.add_sink(mem.clone());
        pipeline.set_level(LogLevel::Trace);
        pipeline.start();
        let log = LoggerHandle::new(pipeline);

        let sid = String::from("conn-3");
        crate::log_error!(log, "failed {} times", 3);
        crate::session_warn!(log, sid, "slow client: {}ms", 250);
        crate::session_fatal!(log, "conn-4", "gone");
        log.pipeline().shutdown(true);

        let recs = mem.recent_global(10);
        assert_eq!(recs.len(), 3);
        assert_eq!(recs[0].message, "failed 3 times");
        assert_eq!(recs[0].session(), None);
        assert_eq!(recs[1].level, LogLevel::Warn);
        assert_eq!(recs[1].session(), Some("conn-3"));
        assert_eq!(recs[1].message, "slow client: 250ms");
        assert_eq!(recs[2].level, LogLevel::Fatal);
        assert_eq!(recs[2].session(), Some("conn-4"));
    }
}
