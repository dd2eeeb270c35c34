//! Workspace facade crate.
//!
//! Re-exports the bridge core so hosts can depend on a single crate. The
//! `fixtures` feature additionally exposes the sample operations used by the
//! scenario suite.

pub use core_bridge::*;

#[cfg(feature = "fixtures")]
pub use bridge_fixtures as fixtures;
