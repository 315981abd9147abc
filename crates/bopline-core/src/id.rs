//! Strongly-typed identifiers used across the engine.
//!
//! Operator ids are plan-scoped integers assigned at plan-compile time. Nothing
//! downstream should pass raw integers around in their place.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! new_id {
    ($name:ident, $repr:ty) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name($repr);

        impl $name {
            pub const fn new(v: $repr) -> Self {
                Self(v)
            }
            pub const fn get(self) -> $repr {
                self.0
            }
        }

        impl From<$repr> for $name {
            fn from(v: $repr) -> Self {
                Self(v)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

// Pipeline operator id; unique within one compiled plan.
new_id!(BopId, u32);
// Conditional binding group id.
new_id!(GroupId, u32);

impl BopId {
    /// Narrow an annotation integer into an id; `None` if it does not fit.
    pub fn from_i64(v: i64) -> Option<Self> {
        u32::try_from(v).ok().map(Self)
    }
}

impl GroupId {
    pub fn from_i64(v: i64) -> Option<Self> {
        u32::try_from(v).ok().map(Self)
    }
}
