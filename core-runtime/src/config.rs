//! # Bridge Configuration
//!
//! The configuration system uses a builder to construct a [`BridgeConfig`]
//! and validates it before anything is started, so a bad worker count or an
//! unusable timeout fails at startup instead of on the first call.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::{BridgeConfig, ResourceOptions};
//!
//! let config = BridgeConfig::builder()
//!     .worker_threads(2)
//!     .thread_name("bridge-worker")
//!     .resource_options(ResourceOptions::new(100, 1_000))
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.worker_threads, 2);
//! ```
//!
//! ## Resource options
//!
//! [`ResourceOptions`] is the one configuration value the host passes per
//! call. It serializes with the host's field names:
//!
//! ```
//! use core_runtime::config::ResourceOptions;
//!
//! let options: ResourceOptions =
//!     serde_json::from_str(r#"{ "releaseAfterMs": 100, "timeoutMs": 1000 }"#).unwrap();
//! assert_eq!(options, ResourceOptions::new(100, 1000));
//! ```

use crate::error::{Error, Result};
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default number of native worker threads.
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// Default name given to native worker threads.
pub const DEFAULT_THREAD_NAME: &str = "bridge-native";

/// Default per-subscriber buffer of the lifecycle event bus.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Upper bound for any hold or wait duration (24 hours).
pub const MAX_DURATION_MS: u64 = 24 * 60 * 60 * 1000;

const MAX_WORKER_THREADS: usize = 512;

/// How a call uses the shared resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOptions {
    /// How long a successful holder retains the resource.
    pub release_after_ms: u64,
    /// How long a waiter tolerates contention before failing.
    pub timeout_ms: u64,
}

impl Default for ResourceOptions {
    fn default() -> Self {
        Self {
            release_after_ms: 0,
            timeout_ms: 1_000,
        }
    }
}

impl ResourceOptions {
    pub fn new(release_after_ms: u64, timeout_ms: u64) -> Self {
        Self {
            release_after_ms,
            timeout_ms,
        }
    }

    pub fn release_after(&self) -> Duration {
        Duration::from_millis(self.release_after_ms)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.release_after_ms > MAX_DURATION_MS {
            return Err(Error::Config(format!(
                "releaseAfterMs {} exceeds maximum of {}ms",
                self.release_after_ms, MAX_DURATION_MS
            )));
        }

        if self.timeout_ms > MAX_DURATION_MS {
            return Err(Error::Config(format!(
                "timeoutMs {} exceeds maximum of {}ms",
                self.timeout_ms, MAX_DURATION_MS
            )));
        }

        Ok(())
    }
}

/// Configuration for a bridge instance.
///
/// Use [`BridgeConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Worker threads of the native runtime.
    pub worker_threads: usize,

    /// Name given to native worker threads.
    pub thread_name: String,

    /// Options used when a call does not supply its own.
    pub resource_options: ResourceOptions,

    /// Buffer size of the lifecycle event bus.
    pub event_capacity: usize,

    /// Logging to install when the bridge starts, if any.
    pub logging: Option<LoggingConfig>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_WORKER_THREADS,
            thread_name: DEFAULT_THREAD_NAME.to_string(),
            resource_options: ResourceOptions::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
            logging: None,
        }
    }
}

impl BridgeConfig {
    pub fn builder() -> BridgeConfigBuilder {
        BridgeConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// This checks:
    /// - Worker thread count is between 1 and 512
    /// - Thread name is not empty
    /// - Default resource options are within bounds
    /// - Event capacity is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(Error::Config(
                "Native runtime needs at least one worker thread".to_string(),
            ));
        }

        if self.worker_threads > MAX_WORKER_THREADS {
            return Err(Error::Config(format!(
                "Worker thread count {} exceeds maximum of {}",
                self.worker_threads, MAX_WORKER_THREADS
            )));
        }

        if self.thread_name.trim().is_empty() {
            return Err(Error::Config("Thread name cannot be empty".to_string()));
        }

        if self.event_capacity == 0 {
            return Err(Error::Config(
                "Event capacity must be greater than 0".to_string(),
            ));
        }

        self.resource_options.validate()
    }
}

/// Builder for [`BridgeConfig`].
#[derive(Debug, Default)]
pub struct BridgeConfigBuilder {
    worker_threads: Option<usize>,
    thread_name: Option<String>,
    resource_options: Option<ResourceOptions>,
    event_capacity: Option<usize>,
    logging: Option<LoggingConfig>,
}

impl BridgeConfigBuilder {
    pub fn worker_threads(mut self, count: usize) -> Self {
        self.worker_threads = Some(count);
        self
    }

    pub fn thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = Some(name.into());
        self
    }

    pub fn resource_options(mut self, options: ResourceOptions) -> Self {
        self.resource_options = Some(options);
        self
    }

    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = Some(capacity);
        self
    }

    pub fn logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Builds and validates the configuration.
    pub fn build(self) -> Result<BridgeConfig> {
        let defaults = BridgeConfig::default();
        let config = BridgeConfig {
            worker_threads: self.worker_threads.unwrap_or(defaults.worker_threads),
            thread_name: self.thread_name.unwrap_or(defaults.thread_name),
            resource_options: self.resource_options.unwrap_or(defaults.resource_options),
            event_capacity: self.event_capacity.unwrap_or(defaults.event_capacity),
            logging: self.logging,
        };

        config.validate()?;
        Ok(config)
    }
}
