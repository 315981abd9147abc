#![forbid(unsafe_code)]
//! bopline-core: leaf types shared by every bopline crate.
//!
//! - Strongly-typed operator/group ids.
//! - The bound `Value` model and interned query variables (`Var`).
//! - `EngineConfig` (serde + env overrides).
//! - Plan fingerprints and query ids for run reports.
//!
//! No async, no IO and no operator logic lives here.

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod id;
pub mod prelude;
pub mod value;
pub mod var;
