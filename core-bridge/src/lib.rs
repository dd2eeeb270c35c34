//! # Core Bridge
//!
//! Concurrency core of the async call bridge between a native multi-threaded
//! runtime and a host's single-threaded event loop.
//!
//! ## Components
//!
//! - [`registry`] - Process-wide handle table and live counters, the leak
//!   detector for every in-flight call
//! - [`bridge`] - Turns native async operations into host-observable
//!   [`Deferred`] values that settle exactly once
//! - [`cancel`] - Abort signals and the relay that drops a native future
//!   when its call is cancelled
//! - [`translator`] - Maps native failures to [`HostError`] with a call trail
//! - [`shared_resource`] - Timed mutex used by contending calls
//! - [`foreign`] - Native code awaiting host-provided async callbacks
//! - [`host`] - A concrete host loop and its thread-safe dispatcher
//! - [`events`] - Lifecycle events for calls and resources
//!
//! ## Quiescence
//!
//! Once every deferred value has settled and been observed,
//! [`rust_future_handle_count`] and [`foreign_future_handle_count`] are both
//! zero. Every scenario test ends by checking that.

pub mod bridge;
pub mod cancel;
pub mod context;
pub mod deferred;
pub mod error;
pub mod events;
pub mod foreign;
pub mod host;
pub mod operation;
pub mod registry;
pub mod shared_resource;
pub mod translator;

pub use bridge::{Bridge, BridgeBuilder, CallOptions};
pub use cancel::{AbortController, AbortSignal, CancellationRelay, RelayState};
pub use context::current_call;
pub use deferred::Deferred;
pub use error::{Error, Result};
pub use events::{BridgeEvent, CallEvent, EventBus, EventStream, ResourceEvent};
pub use foreign::{ForeignCallback, ForeignError};
pub use host::{HostHandle, HostLoop};
pub use operation::{ConstructorEntry, Operation, OperationKind};
pub use registry::{
    foreign_future_handle_count, rust_future_handle_count, Handle, HandleCategory,
    HandleRegistry, HandleState, Outcome,
};
pub use shared_resource::{SharedResource, SharedResourceGuard, TimeoutError};
pub use translator::{
    CallTrail, ErrorKind, HostError, NativeError, StackFrame, RUNTIME_SHUTDOWN,
};

pub use core_runtime::config::{BridgeConfig, ResourceOptions};
