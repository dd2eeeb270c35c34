//! Descriptors of bridged operations.
//!
//! A descriptor names what the host called. It has no behavior of its own;
//! the bridge uses it for error trails, log fields and lifecycle events, and
//! to decide whether a failure is a construction failure.

use std::fmt;

/// Which entry point of an async constructor was used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstructorEntry {
    /// The default entry point (`Megaphone.create`).
    Primary,
    /// A named alternative entry point (`Megaphone.secondary`).
    Secondary(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Function,
    Method { receiver: &'static str },
    Constructor {
        receiver: &'static str,
        entry: ConstructorEntry,
    },
}

/// A bridged operation: a name plus how it is reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operation {
    name: &'static str,
    kind: OperationKind,
}

impl Operation {
    pub const fn function(name: &'static str) -> Self {
        Self {
            name,
            kind: OperationKind::Function,
        }
    }

    pub const fn method(receiver: &'static str, name: &'static str) -> Self {
        Self {
            name,
            kind: OperationKind::Method { receiver },
        }
    }

    /// The primary async constructor, exposed as `create`.
    pub const fn primary_constructor(receiver: &'static str) -> Self {
        Self {
            name: "create",
            kind: OperationKind::Constructor {
                receiver,
                entry: ConstructorEntry::Primary,
            },
        }
    }

    pub const fn secondary_constructor(receiver: &'static str, name: &'static str) -> Self {
        Self {
            name,
            kind: OperationKind::Constructor {
                receiver,
                entry: ConstructorEntry::Secondary(name),
            },
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn receiver(&self) -> Option<&'static str> {
        match self.kind {
            OperationKind::Function => None,
            OperationKind::Method { receiver } | OperationKind::Constructor { receiver, .. } => {
                Some(receiver)
            }
        }
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self.kind, OperationKind::Constructor { .. })
    }

    /// `name` for functions, `Receiver.name` otherwise.
    pub fn qualified_name(&self) -> String {
        match self.receiver() {
            Some(receiver) => format!("{receiver}.{}", self.name),
            None => self.name.to_string(),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.receiver() {
            Some(receiver) => write!(f, "{receiver}.{}", self.name),
            None => f.write_str(self.name),
        }
    }
}
