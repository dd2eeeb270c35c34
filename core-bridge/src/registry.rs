//! # Handle Registry
//!
//! Tracks every in-flight bridged call by an opaque [`Handle`]. The registry
//! is the leak detector for the whole bridge: once every deferred value has
//! settled and been observed, [`HandleRegistry::count`] is zero for both
//! categories.
//!
//! ## Lifecycle
//!
//! ```text
//! allocate ──> Pending ──settle──> Completed | Cancelled | Failed ──release──> (gone)
//! ```
//!
//! `settle` is a compare-and-set out of `Pending`: the first caller wins and
//! later callers get `false`. `release` removes a settled handle; releasing
//! the same handle twice is a bookkeeping bug and panics in debug builds
//! (release builds log a warning and leave the counts untouched).
//!
//! The counters are plain atomics, so reading them never blocks the host.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use serde::Serialize;
use tracing::{debug, warn};

use crate::error::{Error, Result};

static GLOBAL: OnceLock<Arc<HandleRegistry>> = OnceLock::new();
static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// Where a call's future lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HandleCategory {
    /// Driven by the native runtime.
    Native,
    /// Awaited by the native runtime on the host's behalf.
    Foreign,
}

impl HandleCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleCategory::Native => "native",
            HandleCategory::Foreign => "foreign",
        }
    }
}

impl fmt::Display for HandleCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identifier of one in-flight call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Handle {
    id: u64,
    category: HandleCategory,
    #[serde(skip)]
    registry: u64,
}

impl Handle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn category(&self) -> HandleCategory {
        self.category
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.category, self.id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Pending,
    Completed,
    Cancelled,
    Failed,
    Released,
}

impl HandleState {
    pub fn is_settled(self) -> bool {
        matches!(
            self,
            HandleState::Completed | HandleState::Cancelled | HandleState::Failed
        )
    }
}

/// How a call settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Completed,
    Cancelled,
    Failed,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Completed => "completed",
            Outcome::Cancelled => "cancelled",
            Outcome::Failed => "failed",
        }
    }
}

impl From<Outcome> for HandleState {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Completed => HandleState::Completed,
            Outcome::Cancelled => HandleState::Cancelled,
            Outcome::Failed => HandleState::Failed,
        }
    }
}

/// Table of live handles plus one live counter per category.
pub struct HandleRegistry {
    id: u64,
    next_id: AtomicU64,
    native_live: AtomicUsize,
    foreign_live: AtomicUsize,
    table: Mutex<HashMap<Handle, HandleState>>,
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleRegistry {
    /// Creates an empty registry.
    ///
    /// Most callers want [`HandleRegistry::global`]; separate registries are
    /// useful to isolate concurrently running test scenarios.
    pub fn new() -> Self {
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            next_id: AtomicU64::new(1),
            native_live: AtomicUsize::new(0),
            foreign_live: AtomicUsize::new(0),
            table: Mutex::new(HashMap::new()),
        }
    }

    /// The process-wide registry, created on first use and never torn down.
    pub fn global() -> Arc<HandleRegistry> {
        GLOBAL.get_or_init(|| Arc::new(HandleRegistry::new())).clone()
    }

    fn table(&self) -> MutexGuard<'_, HashMap<Handle, HandleState>> {
        // The table holds plain data; a panic elsewhere cannot leave it half-updated.
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn live(&self, category: HandleCategory) -> &AtomicUsize {
        match category {
            HandleCategory::Native => &self.native_live,
            HandleCategory::Foreign => &self.foreign_live,
        }
    }

    /// Registers a new pending handle.
    pub fn allocate(&self, category: HandleCategory) -> Handle {
        let handle = Handle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            category,
            registry: self.id,
        };

        let mut table = self.table();
        table.insert(handle, HandleState::Pending);
        self.live(category).fetch_add(1, Ordering::AcqRel);
        drop(table);

        debug!(%handle, "handle allocated");
        handle
    }

    /// Moves a pending handle to its terminal state.
    ///
    /// Returns `Ok(true)` for the first settlement and `Ok(false)` if the
    /// handle had already settled; the recorded outcome never changes.
    pub fn settle(&self, handle: Handle, outcome: Outcome) -> Result<bool> {
        let mut table = self.table();
        match table.get_mut(&handle) {
            Some(state @ HandleState::Pending) => {
                *state = outcome.into();
                drop(table);
                debug!(%handle, outcome = outcome.as_str(), "handle settled");
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Err(self.missing(handle)),
        }
    }

    /// Removes a settled handle.
    ///
    /// # Panics
    ///
    /// In debug builds, panics if `handle` was already released.
    pub fn release(&self, handle: Handle) -> Result<HandleState> {
        let mut table = self.table();
        match table.get(&handle).copied() {
            Some(state) if state.is_settled() => {
                table.remove(&handle);
                self.live(handle.category).fetch_sub(1, Ordering::AcqRel);
                drop(table);
                debug!(%handle, "handle released");
                Ok(state)
            }
            Some(state) => Err(Error::NotSettled { handle, state }),
            None => {
                drop(table);
                let error = self.missing(handle);
                if matches!(error, Error::AlreadyReleased(_)) {
                    if cfg!(debug_assertions) {
                        panic!("handle {handle} released twice");
                    }
                    warn!(%handle, "handle released twice");
                }
                Err(error)
            }
        }
    }

    /// Whether `handle` was allocated here at some point.
    fn issued(&self, handle: Handle) -> bool {
        handle.registry == self.id && handle.id < self.next_id.load(Ordering::Relaxed)
    }

    fn missing(&self, handle: Handle) -> Error {
        if self.issued(handle) {
            Error::AlreadyReleased(handle)
        } else {
            Error::UnknownHandle(handle)
        }
    }

    /// Current state of `handle`; `Released` once it has left the table.
    pub fn state(&self, handle: Handle) -> Option<HandleState> {
        match self.table().get(&handle) {
            Some(state) => Some(*state),
            None if self.issued(handle) => Some(HandleState::Released),
            None => None,
        }
    }

    /// Live (not yet released) handles in `category`.
    pub fn count(&self, category: HandleCategory) -> usize {
        self.live(category).load(Ordering::Acquire)
    }

    /// Snapshot of every live handle, sorted by id. Meant for leak reports.
    pub fn live_handles(&self) -> Vec<(Handle, HandleState)> {
        let mut handles: Vec<_> = self
            .table()
            .iter()
            .map(|(handle, state)| (*handle, *state))
            .collect();
        handles.sort_by_key(|(handle, _)| handle.id);
        handles
    }
}

impl fmt::Debug for HandleRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleRegistry")
            .field("native_live", &self.count(HandleCategory::Native))
            .field("foreign_live", &self.count(HandleCategory::Foreign))
            .finish()
    }
}

/// Live native handles in the process-wide registry.
pub fn rust_future_handle_count() -> usize {
    HandleRegistry::global().count(HandleCategory::Native)
}

/// Live foreign handles in the process-wide registry.
pub fn foreign_future_handle_count() -> usize {
    HandleRegistry::global().count(HandleCategory::Foreign)
}
