use crate::log::log_record::LogRecord;
use crate::log::memory_sink::InMemorySink;
use crate::log::sink_error::SinkError;

/// A destination for dispatched records.
///
/// Sinks are called from the single dispatch worker, one record at a time,
/// in queue order. They are shared as `Arc<dyn LogSink>` so a sink removed
/// from the pipeline mid-dispatch stays alive until that dispatch is done.
pub trait LogSink: Send + Sync {
    fn consume(&self, rec: &LogRecord) -> Result<(), SinkError>;

    fn flush(&self) -> Result<(), SinkError> {
        Ok(())
    }

    /// In-memory view used to answer queries, if this sink keeps one.
    fn as_memory(&self) -> Option<&InMemorySink> {
        None
    }
}
