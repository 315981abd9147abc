#![forbid(unsafe_code)]
//! bopline: a streaming operator-tree query engine.
//!
//! This facade re-exports the workspace crates so callers need a single
//! dependency, plus the handful of types almost every caller touches.

pub use bopline_access;
pub use bopline_bop;
pub use bopline_core;
pub use bopline_exec;

pub use bopline_core::prelude::*;
pub use bopline_exec::{QueryEngine, QueryResult, Registry};
