use std::fmt;
use std::io;
use std::sync::PoisonError;

/// Failure while a sink consumes or flushes a record.
///
/// The pipeline never propagates these to producers; it reports them on
/// standard error and moves on to the next sink.
#[derive(Debug)]
pub enum SinkError {
    Io(io::Error),
    Poisoned(&'static str),
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "sink I/O error: {e}"),
            Self::Poisoned(what) => write!(f, "sink lock poisoned: {what}"),
        }
    }
}

impl std::error::Error for SinkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Poisoned(_) => None,
        }
    }
}

impl From<io::Error> for SinkError {
    fn from(e: io::Error) -> Self {
        Self::Io(e)
    }
}

impl<T> From<PoisonError<T>> for SinkError {
    fn from(_: PoisonError<T>) -> Self {
        Self::Poisoned("sink state")
    }
}
