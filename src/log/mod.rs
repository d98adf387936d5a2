pub mod console_sink;
pub mod format;
pub mod log_level;
pub mod log_macros;
pub mod log_record;
pub mod log_sink;
pub mod logger;
pub mod logger_handle;
pub mod memory_sink;
pub mod pipeline;
pub mod ring_buffer;
pub mod rotating_file_sink;
pub mod sink_error;

pub use console_sink::{ConsoleMode, ConsoleSink};
pub use log_level::{LogLevel, ParseLevelError};
pub use log_record::LogRecord;
pub use log_sink::LogSink;
pub use logger::{Logger, LoggerConfig};
pub use logger_handle::{LoggerHandle, SessionLogger, global, install_global};
pub use memory_sink::InMemorySink;
pub use pipeline::{AsyncPipeline, SubscriberId};
pub use ring_buffer::RingBuffer;
pub use rotating_file_sink::{FileFormat, RotatingFileSink};
pub use sink_error::SinkError;
