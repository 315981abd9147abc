//! Convenient re-exports for downstream crates.

pub use crate::config::EngineConfig;
pub use crate::error::{Error, Result};
pub use crate::fingerprint::{Fingerprint, QueryId};
pub use crate::id::{BopId, GroupId};
pub use crate::value::Value;
pub use crate::var::Var;
