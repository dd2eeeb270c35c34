//! # Host Bridge Traits
//!
//! Contracts between the native bridge core and the host environment it
//! serves.
//!
//! ## Traits
//!
//! - [`HostDispatcher`](host::HostDispatcher) - Thread-safe hand-off of work
//!   onto the host's single-threaded event loop
//! - [`LoggerSink`](log::LoggerSink) - Forward structured logs to host logging
//!
//! ## Threading
//!
//! Both traits are `Send + Sync`: they are shared by native worker threads.
//! Anything that must stay on the host thread is created *inside* a
//! [`HostJob`](host::HostJob) once it runs there.
//!
//! ## Error Handling
//!
//! Implementations report failures through [`BridgeError`](error::BridgeError).

pub mod error;
pub mod host;
pub mod log;

pub use error::BridgeError;

pub use host::{HostDispatcher, HostJob};
pub use log::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
