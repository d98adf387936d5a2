use std::ffi::OsString;
use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;

use crate::log::format::{format_json, format_plain};
use crate::log::log_record::LogRecord;
use crate::log::log_sink::LogSink;
use crate::log::sink_error::SinkError;

pub const DEFAULT_MAX_BYTES: u64 = 10 * 1024 * 1024;
pub const DEFAULT_MAX_FILES: usize = 5;

/// On-disk rendering used by [`RotatingFileSink`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum FileFormat {
    #[default]
    Line,
    Json,
}

impl FromStr for FileFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line" | "plain" | "text" => Ok(Self::Line),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown file format: {other:?}")),
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Line => "line",
            Self::Json => "json",
        })
    }
}

enum Output {
    File(BufWriter<File>),
    Stdout(io::Stdout),
}

impl Output {
    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::File(w) => w,
            Self::Stdout(s) => s,
        }
    }
}

struct FileState {
    out: Output,
    /// Bytes written to the current file, tracked here instead of asking the
    /// filesystem on every write.
    current_size: u64,
}

/// Appends records to `{base}.0.log` and rotates by size.
///
/// Before a write that would push the current file past `max_bytes`, the
/// one at index `max_files` is deleted, the rest are shifted up one index
/// (`{base}.i.log` -> `{base}.{i+1}.log`) and a fresh `{base}.0.log` takes
/// the write. Besides the current file, up to `max_files` rotated files are
/// kept (`.1` through `.{max_files}`).
///
/// If the file cannot be opened the sink writes to standard output instead
/// and stops rotating.
pub struct RotatingFileSink {
    base_path: PathBuf,
    max_bytes: u64,
    max_files: usize,
    format: FileFormat,
    state: Mutex<FileState>,
}

impl RotatingFileSink {
    /// Opens (or creates) `{base_path}.0.log` in append mode.
    ///
    /// Never fails: an unopenable path falls back to standard output, which
    /// is reported once on standard error.
    pub fn new<P: AsRef<Path>>(
        base_path: P,
        max_bytes: u64,
        max_files: usize,
        format: FileFormat,
    ) -> Self {
        let base_path = base_path.as_ref().to_path_buf();
        let current = numbered_path(&base_path, 0);

        let (out, current_size) = match open_append(&current) {
            Ok((f, len)) => (Output::File(BufWriter::new(f)), len),
            Err(e) => {
                eprintln!(
                    "[RotatingFileSink] cannot open {}: {e}; falling back to stdout",
                    current.display()
                );
                (Output::Stdout(io::stdout()), 0)
            }
        };

        Self {
            base_path,
            max_bytes,
            max_files: max_files.max(1),
            format,
            state: Mutex::new(FileState { out, current_size }),
        }
    }

    /// Path of file number `index` (0 is the one being written).
    #[must_use]
    pub fn path_for(&self, index: usize) -> PathBuf {
        numbered_path(&self.base_path, index)
    }

    /// Whether writes currently go to standard output instead of a file.
    pub fn is_fallback(&self) -> Result<bool, SinkError> {
        Ok(matches!(self.state.lock()?.out, Output::Stdout(_)))
    }

    /// Size in bytes of the current file as tracked by the sink.
    pub fn current_size(&self) -> Result<u64, SinkError> {
        Ok(self.state.lock()?.current_size)
    }

    fn render(&self, rec: &LogRecord) -> String {
        let mut line = match self.format {
            FileFormat::Line => format_plain(rec),
            FileFormat::Json => format_json(rec),
        };
        line.push('\n');
        line
    }

    fn rotate(&self, st: &mut FileState) {
        if let Output::File(w) = &mut st.out {
            if let Err(e) = w.flush() {
                eprintln!("[RotatingFileSink] flush before rotation failed: {e}");
            }
        }
        // Closes the current file before anything is renamed.
        st.out = Output::Stdout(io::stdout());
        st.current_size = 0;

        let oldest = self.path_for(self.max_files);
        if let Err(e) = fs::remove_file(&oldest) {
            if e.kind() != io::ErrorKind::NotFound {
                eprintln!("[RotatingFileSink] cannot remove {}: {e}", oldest.display());
            }
        }

        for i in (0..self.max_files).rev() {
            let src = self.path_for(i);
            if !src.exists() {
                continue;
            }
            let dst = self.path_for(i + 1);
            if let Err(e) = fs::rename(&src, &dst) {
                eprintln!(
                    "[RotatingFileSink] cannot rename {} -> {}: {e}",
                    src.display(),
                    dst.display()
                );
            }
        }

        let current = self.path_for(0);
        match open_truncate(&current) {
            Ok(f) => st.out = Output::File(BufWriter::new(f)),
            Err(e) => eprintln!(
                "[RotatingFileSink] cannot reopen {}: {e}; falling back to stdout",
                current.display()
            ),
        }
    }
}

impl LogSink for RotatingFileSink {
    fn consume(&self, rec: &LogRecord) -> Result<(), SinkError> {
        let line = self.render(rec);
        let len = line.len() as u64;

        let mut st = self.state.lock()?;
        let is_file = matches!(st.out, Output::File(_));
        // An empty file takes the write even if the record alone is too big.
        if is_file && st.current_size > 0 && st.current_size + len > self.max_bytes {
            self.rotate(&mut st);
        }

        st.out.writer().write_all(line.as_bytes())?;
        st.current_size += len;
        Ok(())
    }

    fn flush(&self) -> Result<(), SinkError> {
        self.state.lock()?.out.writer().flush()?;
        Ok(())
    }
}

fn numbered_path(base: &Path, index: usize) -> PathBuf {
    let mut s: OsString = base.as_os_str().to_owned();
    s.push(format!(".{index}.log"));
    PathBuf::from(s)
}

fn ensure_parent(path: &Path) -> io::Result<()> {
    match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => fs::create_dir_all(dir),
        _ => Ok(()),
    }
}

fn open_append(path: &Path) -> io::Result<(File, u64)> {
    ensure_parent(path)?;
    let f = OpenOptions::new().create(true).append(true).open(path)?;
    let len = f.metadata()?.len();
    Ok((f, len))
}

fn open_truncate(path: &Path) -> io::Result<File> {
    ensure_parent(path)?;
    OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;
    use crate::log::log_level::LogLevel;
    use rand::RngCore;
    use std::time::{Duration, UNIX_EPOCH};

    fn unique_temp_dir() -> PathBuf {
        let mut bytes = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut bytes);
        let suffix = u64::from_le_bytes(bytes);
        std::env::temp_dir().join(format!("rotating_sink_test_{suffix}"))
    }

    /// Fixed-size plain line: 40 bytes of prefix + 9-byte message + newline = 50.
    fn rec(i: usize) -> LogRecord {
        LogRecord::new(
            UNIX_EPOCH + Duration::from_secs(1_709_210_096),
            7,
            LogLevel::Info,
            None,
            format!("message-{}", i % 10),
        )
    }

    fn read(path: &Path) -> String {
        fs::read_to_string(path).unwrap()
    }

    #[test]
    fn rotates_before_the_write_that_would_overflow() {
        let dir = unique_temp_dir();
        let base = dir.join("app");
        let sink = RotatingFileSink::new(&base, 100, 5, FileFormat::Line);

        sink.consume(&rec(1)).unwrap();
        sink.consume(&rec(2)).unwrap();
        assert_eq!(sink.current_size().unwrap(), 100);
        assert!(!sink.path_for(1).exists());

        sink.consume(&rec(3)).unwrap();
        sink.flush().unwrap();

        let old = read(&sink.path_for(1));
        let cur = read(&sink.path_for(0));
        assert_eq!(old.len(), 100);
        assert!(old.contains("message-1") && old.contains("message-2"));
        assert_eq!(cur.lines().count(), 1);
        assert!(cur.contains("message-3"));
        assert_eq!(sink.current_size().unwrap(), 50);

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn keeps_max_files_rotated_files_besides_the_current_one() {
        let dir = unique_temp_dir();
        let base = dir.join("app");
        let sink = RotatingFileSink::new(&base, 100, 3, FileFormat::Line);

        for i in 0..20 {
            sink.consume(&rec(i)).unwrap();
        }
        sink.flush().unwrap();

        for i in 0..=3 {
            let p = sink.path_for(i);
            assert!(p.exists(), "{} should exist", p.display());
            assert!(fs::metadata(&p).unwrap().len() <= 100);
        }
        assert!(!sink.path_for(4).exists());
        // 20 lines, two per file: the newest file holds records 18 and 19.
        let cur = read(&sink.path_for(0));
        assert!(cur.contains("message-8") && cur.contains("message-9"));

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn single_retained_file_keeps_the_previous_current_as_one() {
        let dir = unique_temp_dir();
        let sink = RotatingFileSink::new(dir.join("one"), 100, 1, FileFormat::Line);
        for i in 1..=3 {
            sink.consume(&rec(i)).unwrap();
        }
        sink.flush().unwrap();

        let prior = read(&sink.path_for(1));
        assert_eq!(prior.lines().count(), 2);
        assert!(prior.contains("message-1") && prior.contains("message-2"));
        assert!(read(&sink.path_for(0)).contains("message-3"));
        assert!(!sink.path_for(2).exists());

        // The next rotation drops the old `.1` and moves `.0` into its place.
        sink.consume(&rec(4)).unwrap();
        sink.consume(&rec(5)).unwrap();
        sink.flush().unwrap();
        let prior = read(&sink.path_for(1));
        assert!(prior.contains("message-3") && prior.contains("message-4"));
        assert!(!prior.contains("message-1"));
        assert!(!sink.path_for(2).exists());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn oversized_record_goes_to_an_empty_file() {
        let dir = unique_temp_dir();
        let sink = RotatingFileSink::new(dir.join("big"), 10, 2, FileFormat::Line);
        sink.consume(&rec(1)).unwrap();
        sink.consume(&rec(2)).unwrap();
        sink.flush().unwrap();

        assert_eq!(read(&sink.path_for(0)).lines().count(), 1);
        assert_eq!(read(&sink.path_for(1)).lines().count(), 1);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn reopening_continues_size_tracking() {
        let dir = unique_temp_dir();
        let base = dir.join("app");
        {
            let sink = RotatingFileSink::new(&base, 100, 3, FileFormat::Line);
            sink.consume(&rec(1)).unwrap();
            sink.flush().unwrap();
        }
        let sink = RotatingFileSink::new(&base, 100, 3, FileFormat::Line);
        assert_eq!(sink.current_size().unwrap(), 50);
        sink.consume(&rec(2)).unwrap();
        sink.consume(&rec(3)).unwrap();
        sink.flush().unwrap();
        assert_eq!(read(&sink.path_for(1)).lines().count(), 2);
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn json_format_writes_one_object_per_line() {
        let dir = unique_temp_dir();
        let sink = RotatingFileSink::new(dir.join("json"), 1_000, 2, FileFormat::Json);
        sink.consume(&rec(4)).unwrap();
        sink.flush().unwrap();
        let text = read(&sink.path_for(0));
        assert!(text.starts_with("{\"ts\":"));
        assert!(text.ends_with("\"msg\":\"message-4\"}\n"));
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn unopenable_path_falls_back_to_stdout() {
        let dir = unique_temp_dir();
        fs::create_dir_all(&dir).unwrap();
        // A regular file where a directory is expected.
        let blocker = dir.join("not_a_dir");
        fs::write(&blocker, b"x").unwrap();

        let sink = RotatingFileSink::new(blocker.join("app"), 100, 3, FileFormat::Line);
        assert!(sink.is_fallback().unwrap());
        for i in 0..5 {
            sink.consume(&rec(i)).unwrap();
        }
        sink.flush().unwrap();
        assert!(sink.is_fallback().unwrap());
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn parses_formats() {
        assert_eq!("json".parse::<FileFormat>(), Ok(FileFormat::Json));
        assert_eq!("LINE".parse::<FileFormat>(), Ok(FileFormat::Line));
        assert!("xml".parse::<FileFormat>().is_err());
    }
}
