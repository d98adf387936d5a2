//! Text renderings of a [`LogRecord`] shared by every sink.
//!
//! Timestamps are UTC and computed without a date/time dependency.

use std::fmt::Write as _;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::log::log_level::LogLevel;
use crate::log::log_record::LogRecord;

const ANSI_RESET: &str = "\x1b[0m";

/// Formats `ts` as `YYYY-MM-DD HH:MM:SS.mmm` (UTC).
///
/// Times before the epoch are clamped to the epoch.
#[must_use]
pub fn format_timestamp(ts: SystemTime) -> String {
    let since = ts.duration_since(UNIX_EPOCH).unwrap_or_default();
    let ms = since.subsec_millis();
    let secs = since.as_secs();

    unix_to_utc(secs).map_or_else(
        |_| format!("unix_{secs}.{ms:03}"), // graceful fallback, never panics
        |tm| {
            format!(
                "{:04}-{:02}-{:02} {:02}:{:02}:{:02}.{:03}",
                tm.year, tm.mon, tm.day, tm.hour, tm.min, tm.sec, ms
            )
        },
    )
}

/// `[ts] [LEVEL] (t:id) <session> message`, no trailing newline.
#[must_use]
pub fn format_plain(rec: &LogRecord) -> String {
    let mut out = String::with_capacity(48 + rec.message.len());
    let _ = write!(
        out,
        "[{}] [{}] (t:{}) ",
        format_timestamp(rec.ts),
        rec.level.label(),
        rec.producer_id
    );
    if let Some(sid) = rec.session() {
        let _ = write!(out, "<{sid}> ");
    }
    out.push_str(&rec.message);
    out
}

/// Same as [`format_plain`] with the level tag wrapped in an ANSI color.
#[must_use]
pub fn format_colored(rec: &LogRecord) -> String {
    let mut out = String::with_capacity(64 + rec.message.len());
    let _ = write!(
        out,
        "[{}] [{}{}{}] (t:{}) ",
        format_timestamp(rec.ts),
        level_color(rec.level),
        rec.level.label(),
        ANSI_RESET,
        rec.producer_id
    );
    if let Some(sid) = rec.session() {
        let _ = write!(out, "<{sid}> ");
    }
    out.push_str(&rec.message);
    out
}

/// Single-line JSON object: `ts`, `lvl` (numeric), `tid`, optional `session`, `msg`.
///
/// Only `"` and `\` are escaped; this is not a general JSON string encoder.
#[must_use]
pub fn format_json(rec: &LogRecord) -> String {
    let mut out = String::with_capacity(64 + rec.message.len());
    let _ = write!(
        out,
        "{{\"ts\":\"{}\",\"lvl\":{},\"tid\":\"{}\"",
        format_timestamp(rec.ts),
        rec.level.as_u8(),
        rec.producer_id
    );
    if let Some(sid) = rec.session() {
        out.push_str(",\"session\":\"");
        push_escaped(&mut out, sid);
        out.push('"');
    }
    out.push_str(",\"msg\":\"");
    push_escaped(&mut out, &rec.message);
    out.push_str("\"}");
    out
}

/// Session export line: `[ts] [LEVEL] (t:id) message`.
#[must_use]
pub fn format_export(rec: &LogRecord) -> String {
    format!(
        "[{}] [{}] (t:{}) {}",
        format_timestamp(rec.ts),
        rec.level.label(),
        rec.producer_id,
        rec.message
    )
}

fn push_escaped(out: &mut String, s: &str) {
    for c in s.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
}

const fn level_color(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Trace => "\x1b[2m",
        LogLevel::Debug => "\x1b[36m",
        LogLevel::Info => "\x1b[32m",
        LogLevel::Warn => "\x1b[33m",
        LogLevel::Error => "\x1b[31m",
        LogLevel::Fatal => "\x1b[1;31m",
    }
}

#[derive(Clone, Copy, Debug)]
struct SimpleUtc {
    year: i32,
    mon: u32,
    day: u32,
    hour: u32,
    min: u32,
    sec: u32,
}

#[derive(Debug)]
enum UtcConvError {
    Year,
    Month,
    Day,
}

/// Civil-from-days conversion of a UNIX timestamp (seconds) to a UTC date.
///
/// # Errors
///
/// Returns a [`UtcConvError`] if a component does not fit its integer type.
#[allow(clippy::many_single_char_names)]
fn unix_to_utc(mut s: u64) -> Result<SimpleUtc, UtcConvError> {
    let sec = (s % 60) as u32;
    s /= 60;
    let min = (s % 60) as u32;
    s /= 60;
    let hour = (s % 24) as u32;
    s /= 24;

    // i128 keeps the intermediate math from overflowing.
    let z: i128 = i128::from(s) + 719_468;

    let era = (if z >= 0 { z } else { z - 146_096 }) / 146_097;
    let doe = z - era * 146_097; // [0, 146096]
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let y = yoe + era * 400;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100); // [0, 365]
    let mp = (5 * doy + 2) / 153; // [0, 11]
    let d = doy - (153 * mp + 2) / 5 + 1; // [1, 31]
    let m = mp + if mp < 10 { 3 } else { -9 }; // [1, 12]

    let year_i = y + i128::from(m <= 2);

    let year = i32::try_from(year_i).map_err(|_| UtcConvError::Year)?;
    let mon = u32::try_from(m).map_err(|_| UtcConvError::Month)?;
    let day = u32::try_from(d).map_err(|_| UtcConvError::Day)?;

    Ok(SimpleUtc {
        year,
        mon,
        day,
        hour,
        min,
        sec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn at(secs: u64, ms: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(secs) + Duration::from_millis(ms)
    }

    fn rec(session: Option<&str>, msg: &str) -> LogRecord {
        // 2024-02-29 12:34:56.789 UTC
        LogRecord::new(
            at(1_709_210_096, 789),
            7,
            LogLevel::Info,
            session.map(str::to_owned),
            msg,
        )
    }

    #[test]
    fn timestamp_epoch_and_leap_day() {
        assert_eq!(format_timestamp(UNIX_EPOCH), "1970-01-01 00:00:00.000");
        assert_eq!(format_timestamp(at(1_709_210_096, 789)), "2024-02-29 12:34:56.789");
    }

    #[test]
    fn plain_line_with_and_without_session() {
        assert_eq!(
            format_plain(&rec(Some("conn-1"), "hello")),
            "[2024-02-29 12:34:56.789] [ INFO] (t:7) <conn-1> hello"
        );
        assert_eq!(
            format_plain(&rec(None, "hello")),
            "[2024-02-29 12:34:56.789] [ INFO] (t:7) hello"
        );
    }

    #[test]
    fn colored_line_wraps_level_tag() {
        let line = format_colored(&rec(None, "hi"));
        assert!(line.contains("\x1b[32m INFO\x1b[0m"), "{line:?}");
        assert!(line.ends_with("(t:7) hi"));
    }

    #[test]
    fn json_escapes_quotes_and_backslashes_only() {
        let line = format_json(&rec(Some("s\"1"), "say \"hi\" \\ bye\n"));
        assert_eq!(
            line,
            "{\"ts\":\"2024-02-29 12:34:56.789\",\"lvl\":2,\"tid\":\"7\",\
             \"session\":\"s\\\"1\",\"msg\":\"say \\\"hi\\\" \\\\ bye\n\"}"
        );
    }

    #[test]
    fn json_omits_absent_session() {
        let line = format_json(&rec(None, "x"));
        assert!(!line.contains("session"));
        assert!(line.ends_with(",\"msg\":\"x\"}"));
    }

    #[test]
    fn export_line_has_no_session_tag() {
        assert_eq!(
            format_export(&rec(Some("conn-1"), "hello")),
            "[2024-02-29 12:34:56.789] [ INFO] (t:7) hello"
        );
    }
}
