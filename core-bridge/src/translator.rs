//! # Error Translator
//!
//! Turns native failures into [`HostError`], the single rejection value a
//! host ever observes.
//!
//! Native error types implement [`NativeError`] to give the host a stable
//! type name to discriminate on (`MyError.Foo`) and a [`ErrorKind`] in the
//! bridge's taxonomy. Translation keeps the original error as the cause, so
//! native callers can still downcast it.
//!
//! Every `HostError` carries a [`CallTrail`]: the failing operation's frame
//! followed by the host call site that issued the call, captured with
//! `#[track_caller]` when the call was made.

use std::any::Any;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::operation::Operation;

/// Name of the rejection seen when the native runtime drops a call it never settled.
pub const RUNTIME_SHUTDOWN: &str = "RuntimeShutdown";

/// Failure taxonomy visible to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ErrorKind {
    /// A named domain failure of the operation itself.
    Operation,
    /// A bounded wait expired.
    Timeout,
    /// The call was aborted through its signal.
    Cancellation,
    /// A fallible async constructor failed.
    Construction,
    /// The native operation panicked.
    Panic,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Operation => "OperationError",
            ErrorKind::Timeout => "TimeoutError",
            ErrorKind::Cancellation => "CancellationError",
            ErrorKind::Construction => "ConstructionError",
            ErrorKind::Panic => "PanicError",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A native error that can cross the boundary.
pub trait NativeError: StdError + Send + Sync + 'static {
    /// Name the host discriminates on, e.g. `MyError.Foo`.
    fn type_name(&self) -> &'static str;

    fn kind(&self) -> ErrorKind {
        ErrorKind::Operation
    }
}

impl NativeError for Infallible {
    fn type_name(&self) -> &'static str {
        match *self {}
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackFrame {
    function: String,
    location: Option<&'static Location<'static>>,
}

impl StackFrame {
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn location(&self) -> Option<&'static Location<'static>> {
        self.location
    }
}

impl fmt::Display for StackFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.location {
            Some(location) => write!(
                f,
                "at {} ({}:{}:{})",
                self.function,
                location.file(),
                location.line(),
                location.column()
            ),
            None => write!(f, "at {} (<native>)", self.function),
        }
    }
}

/// Frames from the failing operation outwards to the host call site.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CallTrail {
    frames: Vec<StackFrame>,
}

impl CallTrail {
    pub(crate) fn new(operation: &Operation, call_site: &'static Location<'static>) -> Self {
        Self {
            frames: vec![
                StackFrame {
                    function: operation.qualified_name(),
                    location: None,
                },
                StackFrame {
                    function: "<host>".to_string(),
                    location: Some(call_site),
                },
            ],
        }
    }

    pub fn frames(&self) -> &[StackFrame] {
        &self.frames
    }

    /// Whether any frame mentions `function`.
    pub fn contains(&self, function: &str) -> bool {
        self.frames
            .iter()
            .any(|frame| frame.function.contains(function))
    }
}

impl fmt::Display for CallTrail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, frame) in self.frames.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "    {frame}")?;
        }
        Ok(())
    }
}

/// The rejection value of a bridged call.
#[derive(Debug, Clone, Error)]
#[error("{name}: {message}")]
pub struct HostError {
    kind: ErrorKind,
    name: String,
    message: String,
    operation: String,
    trail: CallTrail,
    #[source]
    cause: Option<Arc<dyn StdError + Send + Sync + 'static>>,
}

impl HostError {
    pub(crate) fn translate<E>(
        error: E,
        operation: &Operation,
        call_site: &'static Location<'static>,
    ) -> Self
    where
        E: NativeError,
    {
        let kind = match error.kind() {
            ErrorKind::Operation if operation.is_constructor() => ErrorKind::Construction,
            kind => kind,
        };

        Self {
            kind,
            name: error.type_name().to_string(),
            message: error.to_string(),
            operation: operation.qualified_name(),
            trail: CallTrail::new(operation, call_site),
            cause: Some(Arc::new(error)),
        }
    }

    pub(crate) fn aborted(operation: &Operation, call_site: &'static Location<'static>) -> Self {
        Self {
            kind: ErrorKind::Cancellation,
            name: "AbortError".to_string(),
            message: "The operation was aborted".to_string(),
            operation: operation.qualified_name(),
            trail: CallTrail::new(operation, call_site),
            cause: None,
        }
    }

    pub(crate) fn panicked(
        operation: &Operation,
        call_site: &'static Location<'static>,
        payload: Box<dyn Any + Send>,
    ) -> Self {
        let message = if let Some(message) = payload.downcast_ref::<&'static str>() {
            (*message).to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            "native operation panicked".to_string()
        };

        Self {
            kind: ErrorKind::Panic,
            name: "PanicError".to_string(),
            message,
            operation: operation.qualified_name(),
            trail: CallTrail::new(operation, call_site),
            cause: None,
        }
    }

    /// The driver went away without settling, e.g. the runtime shut down.
    ///
    /// Named apart from [`HostError::aborted`] so the host can tell a
    /// shutdown from its own abort.
    pub(crate) fn lost(operation: &Operation, call_site: &'static Location<'static>) -> Self {
        Self {
            kind: ErrorKind::Cancellation,
            name: RUNTIME_SHUTDOWN.to_string(),
            message: "The native runtime dropped the operation".to_string(),
            operation: operation.qualified_name(),
            trail: CallTrail::new(operation, call_site),
            cause: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Qualified name of the operation that failed.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    pub fn trail(&self) -> &CallTrail {
        &self.trail
    }

    /// Host-style stack string: the error line followed by the trail.
    pub fn stack(&self) -> String {
        format!("{self}\n{}", self.trail)
    }

    pub fn is_cancellation(&self) -> bool {
        self.kind == ErrorKind::Cancellation
    }

    /// Type check by name: `MyError` matches `MyError` and `MyError.Foo`.
    pub fn instance_of(&self, type_name: &str) -> bool {
        self.name == type_name
            || self
                .name
                .strip_prefix(type_name)
                .is_some_and(|rest| rest.starts_with('.'))
    }

    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: StdError + 'static,
    {
        self.cause.as_deref().and_then(|cause| cause.downcast_ref::<E>())
    }

    pub fn is<E>(&self) -> bool
    where
        E: StdError + 'static,
    {
        self.downcast_ref::<E>().is_some()
    }
}
