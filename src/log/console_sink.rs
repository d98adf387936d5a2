use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Mutex;

use crate::log::format::{format_colored, format_json, format_plain};
use crate::log::log_record::LogRecord;
use crate::log::log_sink::LogSink;
use crate::log::sink_error::SinkError;

/// Rendering used by [`ConsoleSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum ConsoleMode {
    Plain,
    #[default]
    Colored,
    Json,
}

impl FromStr for ConsoleMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plain" => Ok(Self::Plain),
            "colored" | "color" | "colour" => Ok(Self::Colored),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown console mode: {other:?}")),
        }
    }
}

impl fmt::Display for ConsoleMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Plain => "plain",
            Self::Colored => "colored",
            Self::Json => "json",
        })
    }
}

struct ConsoleState {
    mode: ConsoleMode,
    out: Box<dyn Write + Send>,
}

/// Writes one line per record to standard output.
///
/// Mode and writer live behind one mutex, so a line is rendered and written
/// as a unit and concurrent writers never interleave.
pub struct ConsoleSink {
    state: Mutex<ConsoleState>,
}

impl ConsoleSink {
    #[must_use]
    pub fn new(mode: ConsoleMode) -> Self {
        Self::with_writer(mode, io::stdout())
    }

    /// Console sink over an arbitrary writer (tests, pipes).
    pub fn with_writer<W: Write + Send + 'static>(mode: ConsoleMode, out: W) -> Self {
        Self {
            state: Mutex::new(ConsoleState {
                mode,
                out: Box::new(out),
            }),
        }
    }

    pub fn set_mode(&self, mode: ConsoleMode) -> Result<(), SinkError> {
        self.state.lock()?.mode = mode;
        Ok(())
    }

    pub fn mode(&self) -> Result<ConsoleMode, SinkError> {
        Ok(self.state.lock()?.mode)
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(ConsoleMode::default())
    }
}

impl LogSink for ConsoleSink {
    fn consume(&self, rec: &LogRecord) -> Result<(), SinkError> {
        let mut st = self.state.lock()?;
        let line = match st.mode {
            ConsoleMode::Plain => format_plain(rec),
            ConsoleMode::Colored => format_colored(rec),
            ConsoleMode::Json => format_json(rec),
        };
        writeln!(st.out, "{line}")?;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.state.lock()?.out.flush()?;
        Ok(())
    }
}
