#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::thread;

use keyforge::log::{
    AsyncPipeline, ConsoleMode, FileFormat, InMemorySink, LogLevel, LogRecord, Logger,
    LoggerConfig, RingBuffer,
};
use rand::RngCore;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let mut bytes = [0u8; 8];
    rand::thread_rng().fill_bytes(&mut bytes);
    let suffix = u64::from_le_bytes(bytes);
    std::env::temp_dir().join(format!("keyforge_{tag}_{suffix}"))
}

fn pipeline_with_memory(queue: usize) -> (Arc<AsyncPipeline>, Arc<InMemorySink>) {
    let pipeline = Arc::new(AsyncPipeline::new(queue));
    let mem = Arc::new(InMemorySink::new(1024, 256));
    pipeline.add_sink(mem.clone());
    (pipeline, mem)
}

fn messages(recs: &[LogRecord]) -> Vec<String> {
    recs.iter().map(|r| r.message.clone()).collect()
}

#[test]
fn sinks_see_submission_order_without_overflow() {
    let (pipeline, mem) = pipeline_with_memory(1024);
    pipeline.start();

    let expected: Vec<String> = (0..500).map(|i| format!("m{i}")).collect();
    for m in &expected {
        pipeline.submit(LogLevel::Info, None, m.clone());
    }
    pipeline.shutdown(true);

    assert_eq!(messages(&mem.recent_global(1000)), expected);
}

#[test]
fn overflow_drops_oldest_first() {
    let (pipeline, mem) = pipeline_with_memory(4);
    // Not started yet: nothing drains, so the fifth submit evicts the first.
    for m in ["a", "b", "c", "d", "e"] {
        pipeline.submit(LogLevel::Warn, None, m);
    }
    assert_eq!(pipeline.pending(), 4);

    pipeline.start();
    pipeline.shutdown(true);
    assert_eq!(messages(&mem.recent_global(10)), ["b", "c", "d", "e"]);
}

#[test]
fn ring_buffer_clamps_last_n() {
    let ring = RingBuffer::new(3);
    for c in ['a', 'b', 'c', 'd'] {
        ring.push(c);
    }
    assert_eq!(ring.last_n(3), vec!['b', 'c', 'd']);
    assert_eq!(ring.last_n(10), vec!['b', 'c', 'd']);
}

#[test]
fn sessions_are_isolated() {
    let (pipeline, mem) = pipeline_with_memory(256);
    pipeline.start();
    pipeline.submit(LogLevel::Info, Some("A"), "a1");
    pipeline.submit(LogLevel::Info, Some("B"), "b1");
    pipeline.submit(LogLevel::Info, None, "global");
    pipeline.submit(LogLevel::Error, Some("A"), "a2");
    pipeline.shutdown(true);

    assert_eq!(messages(&pipeline.recent_for_session("A", 10)), ["a1", "a2"]);
    assert_eq!(messages(&pipeline.recent_for_session("B", 10)), ["b1"]);
    assert!(pipeline.recent_for_session("nobody", 10).is_empty());
    assert_eq!(mem.recent_global(10).len(), 4);
}

#[test]
fn warn_threshold_hides_lower_levels_from_sinks_and_subscribers() {
    let (pipeline, mem) = pipeline_with_memory(256);
    let tailed: Arc<Mutex<Vec<LogLevel>>> = Arc::default();
    let t = tailed.clone();
    pipeline.subscribe(move |r| t.lock().unwrap().push(r.level));

    pipeline.set_level(LogLevel::Warn);
    pipeline.start();
    for lvl in LogLevel::ALL {
        pipeline.submit(lvl, None, lvl.name());
    }
    pipeline.shutdown(true);

    let expected = vec![LogLevel::Warn, LogLevel::Error, LogLevel::Fatal];
    let seen: Vec<LogLevel> = mem.recent_global(10).iter().map(|r| r.level).collect();
    assert_eq!(seen, expected);
    assert_eq!(*tailed.lock().unwrap(), expected);
}

#[test]
fn shutdown_flush_delivers_everything_from_many_producers() {
    let (pipeline, mem) = pipeline_with_memory(1 << 16);
    pipeline.start();

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let pipeline = pipeline.clone();
            thread::spawn(move || {
                let sid = format!("p{p}");
                for i in 0..250 {
                    pipeline.submit(LogLevel::Info, Some(sid.as_str()), format!("{i}"));
                }
            })
        })
        .collect();
    for p in producers {
        p.join().unwrap();
    }
    pipeline.shutdown(true);

    assert_eq!(mem.recent_global(2000).len(), 1000);
    for p in 0..4 {
        let got = messages(&mem.recent_for_session(&format!("p{p}"), 500));
        let want: Vec<String> = (0..250).map(|i| i.to_string()).collect();
        assert_eq!(got, want, "producer {p} order");
    }
}

#[test]
fn logger_rotates_files_and_keeps_the_query_api() {
    let dir = unique_temp_dir("rotate");
    let cfg = LoggerConfig {
        level: LogLevel::Trace,
        console: None,
        file_path: Some(dir.join("kf")),
        file_max_bytes: 200,
        file_max_files: 3,
        file_format: FileFormat::Line,
        ..LoggerConfig::default()
    };

    let logger = Logger::start(&cfg);
    let log = logger.handle();
    for i in 0..40 {
        log.info_in("conn-1", format!("line number {i:03} with some padding"));
    }
    logger.shutdown();

    let file = logger.file().unwrap();
    assert!(file.path_for(0).exists());
    assert!(file.path_for(1).exists());
    assert!(file.path_for(2).exists());
    assert!(file.path_for(3).exists());
    assert!(!file.path_for(4).exists());

    let newest = fs::read_to_string(file.path_for(0)).unwrap();
    assert!(newest.contains("line number 039"));
    assert!(newest.len() <= 200);

    assert_eq!(log.recent_for_session("conn-1", 100).len(), 40);
    let export = log.export_session("conn-1");
    assert_eq!(export.lines().count(), 40);
    assert!(!export.contains("<conn-1>"));

    drop(logger);
    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn console_mode_parses_from_config_names() {
    assert_eq!("json".parse::<ConsoleMode>().unwrap(), ConsoleMode::Json);
    assert_eq!("PLAIN".parse::<ConsoleMode>().unwrap(), ConsoleMode::Plain);
    assert!("rainbow".parse::<ConsoleMode>().is_err());
}
