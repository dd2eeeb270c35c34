//! # Core Runtime Module
//!
//! Ambient infrastructure shared by the bridge crates:
//! - Logging and tracing setup, with optional mirroring to a host
//!   [`LoggerSink`](bridge_traits::LoggerSink)
//! - Bridge configuration (native worker pool, shared-resource defaults,
//!   event bus sizing)
//!
//! Nothing in here knows about handles or calls; `core-bridge` builds on top
//! of it.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{BridgeConfig, BridgeConfigBuilder, ResourceOptions};
pub use error::{Error, Result};
