use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{Config, ConfigError};
use crate::log::console_sink::{ConsoleMode, ConsoleSink};
use crate::log::log_level::LogLevel;
use crate::log::logger_handle::LoggerHandle;
use crate::log::memory_sink::{DEFAULT_GLOBAL_CAPACITY, DEFAULT_SESSION_CAPACITY, InMemorySink};
use crate::log::pipeline::{AsyncPipeline, DEFAULT_MAX_QUEUE_LEN};
use crate::log::rotating_file_sink::{
    DEFAULT_MAX_BYTES, DEFAULT_MAX_FILES, FileFormat, RotatingFileSink,
};

const SECTION: &str = "Logging";

/// Construction parameters for a [`Logger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerConfig {
    pub level: LogLevel,
    pub queue_capacity: usize,
    pub global_capacity: usize,
    pub session_capacity: usize,
    /// `None` disables the console sink.
    pub console: Option<ConsoleMode>,
    /// Base path of the rotating file sink; `None` disables it.
    pub file_path: Option<PathBuf>,
    pub file_max_bytes: u64,
    pub file_max_files: usize,
    pub file_format: FileFormat,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            queue_capacity: DEFAULT_MAX_QUEUE_LEN,
            global_capacity: DEFAULT_GLOBAL_CAPACITY,
            session_capacity: DEFAULT_SESSION_CAPACITY,
            console: Some(ConsoleMode::Colored),
            file_path: None,
            file_max_bytes: DEFAULT_MAX_BYTES,
            file_max_files: DEFAULT_MAX_FILES,
            file_format: FileFormat::Line,
        }
    }
}

impl LoggerConfig {
    /// Reads the `[Logging]` section; absent keys keep their defaults.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let d = Self::default();

        let console = match config.get_non_empty_or_default(SECTION, "console", "colored") {
            off if off.eq_ignore_ascii_case("off") || off.eq_ignore_ascii_case("none") => None,
            _ => Some(config.get_parsed_or(SECTION, "console", ConsoleMode::Colored)?),
        };

        Ok(Self {
            level: config.get_parsed_or(SECTION, "level", d.level)?,
            queue_capacity: config.get_parsed_or(SECTION, "queue_capacity", d.queue_capacity)?,
            global_capacity: config.get_parsed_or(SECTION, "global_capacity", d.global_capacity)?,
            session_capacity: config.get_parsed_or(
                SECTION,
                "session_capacity",
                d.session_capacity,
            )?,
            console,
            file_path: config.get_non_empty(SECTION, "file_path").map(PathBuf::from),
            file_max_bytes: config.get_parsed_or(SECTION, "file_max_bytes", d.file_max_bytes)?,
            file_max_files: config.get_parsed_or(SECTION, "file_max_files", d.file_max_files)?,
            file_format: config.get_parsed_or(SECTION, "file_format", d.file_format)?,
        })
    }
}

/// Owner of a running pipeline with the standard sink set.
///
/// # Architecture
///
/// 1. **Console** sink (optional) for humans watching the process.
/// 2. **In-memory** sink, always present, answering the query API.
/// 3. **Rotating file** sink (optional) for retention across restarts.
///
/// Producers get a [`LoggerHandle`] via [`handle`](Self::handle). Dropping
/// the `Logger` drains and stops the pipeline; handles that outlive it can
/// still submit, but nothing dispatches those records any more.
pub struct Logger {
    handle: LoggerHandle,
    memory: Arc<InMemorySink>,
    console: Option<Arc<ConsoleSink>>,
    file: Option<Arc<RotatingFileSink>>,
}

impl Logger {
    /// Builds the sinks described by `cfg` and starts the worker.
    #[must_use]
    pub fn start(cfg: &LoggerConfig) -> Self {
        let pipeline = Arc::new(AsyncPipeline::new(cfg.queue_capacity));
        pipeline.set_level(cfg.level);

        let console = cfg.console.map(|mode| Arc::new(ConsoleSink::new(mode)));
        if let Some(c) = &console {
            pipeline.add_sink(c.clone());
        }

        let memory = Arc::new(InMemorySink::new(cfg.global_capacity, cfg.session_capacity));
        pipeline.add_sink(memory.clone());

        let file = cfg.file_path.as_ref().map(|base| {
            Arc::new(RotatingFileSink::new(
                base,
                cfg.file_max_bytes,
                cfg.file_max_files,
                cfg.file_format,
            ))
        });
        if let Some(f) = &file {
            pipeline.add_sink(f.clone());
        }

        pipeline.start();

        Self {
            handle: LoggerHandle::new(pipeline),
            memory,
            console,
            file,
        }
    }

    /// Console (colored) + in-memory sinks with default capacities.
    #[must_use]
    pub fn start_default() -> Self {
        Self::start(&LoggerConfig::default())
    }

    /// Returns a cloneable producer handle.
    #[must_use]
    pub fn handle(&self) -> LoggerHandle {
        self.handle.clone()
    }

    #[must_use]
    pub fn memory(&self) -> &Arc<InMemorySink> {
        &self.memory
    }

    #[must_use]
    pub fn console(&self) -> Option<&Arc<ConsoleSink>> {
        self.console.as_ref()
    }

    #[must_use]
    pub fn file(&self) -> Option<&Arc<RotatingFileSink>> {
        self.file.as_ref()
    }

    /// Drains the queue, stops the worker and flushes every sink.
    pub fn shutdown(&self) {
        self.handle.pipeline().shutdown(true);
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.shutdown();
    }
}
