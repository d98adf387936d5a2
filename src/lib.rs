//! KeyForge: an asynchronous in-process logging pipeline with a small
//! networked key-value store built on top of it.
//!
//! It provides one binary:
//! - `keyforge_server`: a thread-per-connection TCP key-value server whose
//!   connections log through the pipeline and can query it.
//!
//! The logging side is usable on its own: start a [`log::Logger`], hand
//! out [`log::LoggerHandle`]s and query the in-memory rings.

/// INI-style configuration loading.
pub mod config;
/// Asynchronous logging pipeline, sinks and facade.
pub mod log;
/// Text-protocol key-value server.
pub mod server;
/// Mutex-guarded map with flat-file persistence.
pub mod store;
