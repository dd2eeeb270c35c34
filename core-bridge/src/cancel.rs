//! # Cancellation Relay
//!
//! The host cancels with an [`AbortController`]; calls receive its
//! [`AbortSignal`]. A [`CancellationRelay`] ties one call's native future to
//! that signal.
//!
//! ```text
//! Unarmed ──(signal given)──> Armed ──(abort)──> Fired
//! ```
//!
//! - Fired before the call starts: the operation is never polled.
//! - Fired while in flight: the native future is dropped at its next
//!   suspension point, which runs its destructors (releasing any guard it
//!   holds), and the call settles as cancelled.
//! - Fired after settlement: nothing observes it.
//!
//! Aborting is idempotent.

use std::future::Future;

use core_async::sync::CancellationToken;
use tracing::debug;

/// Host-side handle that requests cancellation.
#[derive(Debug, Clone, Default)]
pub struct AbortController {
    token: CancellationToken,
}

impl AbortController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            token: self.token.clone(),
        }
    }

    pub fn abort(&self) {
        if !self.token.is_cancelled() {
            debug!("abort requested");
        }
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// Read-only view of an [`AbortController`], passed along with a call.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    token: CancellationToken,
}

impl AbortSignal {
    /// A signal that is already aborted.
    pub fn aborted_signal() -> Self {
        let token = CancellationToken::new();
        token.cancel();
        Self { token }
    }

    pub fn aborted(&self) -> bool {
        self.token.is_cancelled()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// No signal was supplied; the call cannot be cancelled.
    Unarmed,
    Armed,
    Fired,
}

/// Connects one call to an optional [`AbortSignal`].
#[derive(Debug, Clone)]
pub struct CancellationRelay {
    token: Option<CancellationToken>,
}

impl CancellationRelay {
    pub fn new(signal: Option<&AbortSignal>) -> Self {
        Self {
            token: signal.map(|signal| signal.token.clone()),
        }
    }

    pub fn unarmed() -> Self {
        Self { token: None }
    }

    pub fn state(&self) -> RelayState {
        match &self.token {
            None => RelayState::Unarmed,
            Some(token) if token.is_cancelled() => RelayState::Fired,
            Some(_) => RelayState::Armed,
        }
    }

    pub fn is_fired(&self) -> bool {
        self.state() == RelayState::Fired
    }

    /// Completes once the relay fires; never completes when unarmed.
    pub async fn fired(&self) {
        match &self.token {
            Some(token) => token.cancelled().await,
            None => futures::future::pending().await,
        }
    }

    /// Drives `future` unless the relay fires first.
    ///
    /// Returns `None` on cancellation, after `future` has been dropped.
    /// Cancellation is checked before each poll of `future`.
    pub async fn run<F>(&self, future: F) -> Option<F::Output>
    where
        F: Future,
    {
        tokio::select! {
            biased;
            _ = self.fired() => None,
            output = future => Some(output),
        }
    }
}
