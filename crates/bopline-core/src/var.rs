//! Interned query variables.
//!
//! A `Var` is a compact handle into a process-wide registry of variable names.
//! The same name always interns to the same handle, so equality of handles is
//! identity of variables across an entire plan.
//!
//! The registry is grow-only: names are never released, so a process that
//! mints unbounded distinct names (one per query, say) grows it for its whole
//! lifetime. Handles are `u32`; interning fails once that space is used up
//! rather than handing out a handle that aliases another name.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use once_cell::sync::Lazy;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(u32);

#[derive(Default)]
struct VarRegistry {
    name_to_id: HashMap<Arc<str>, u32>,
    id_to_name: Vec<Arc<str>>,
}

static REGISTRY: Lazy<RwLock<VarRegistry>> = Lazy::new(|| RwLock::new(VarRegistry::default()));

fn next_id(interned: usize) -> Result<u32> {
    u32::try_from(interned).map_err(|_| {
        Error::Invariant(format!("variable registry is full ({interned} names interned)"))
    })
}

impl Var {
    /// Intern `name` (without the leading `?`) and return its handle.
    ///
    /// # Panics
    ///
    /// If the registry already holds `u32::MAX + 1` distinct names. Use
    /// [`Var::try_named`] where names come from untrusted input.
    pub fn named(name: &str) -> Var {
        match Var::try_named(name) {
            Ok(v) => v,
            Err(e) => panic!("{e}"),
        }
    }

    /// Like [`Var::named`], but reports a full registry as an error.
    pub fn try_named(name: &str) -> Result<Var> {
        let name = name.strip_prefix('?').unwrap_or(name);
        {
            let reg = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
            if let Some(&id) = reg.name_to_id.get(name) {
                return Ok(Var(id));
            }
        }
        let mut reg = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
        // Another writer may have raced us between the two locks.
        if let Some(&id) = reg.name_to_id.get(name) {
            return Ok(Var(id));
        }
        let id = next_id(reg.id_to_name.len())?;
        let arc_name: Arc<str> = Arc::from(name);
        reg.name_to_id.insert(Arc::clone(&arc_name), id);
        reg.id_to_name.push(arc_name);
        Ok(Var(id))
    }

    pub fn name(&self) -> Arc<str> {
        let reg = REGISTRY.read().unwrap_or_else(PoisonError::into_inner);
        reg.id_to_name
            .get(self.0 as usize)
            .cloned()
            .unwrap_or_else(|| Arc::from("<unknown>"))
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.name())
    }
}

impl fmt::Display for Var {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "?{}", self.name())
    }
}

// Handles are process-local, so they travel by name.
impl Serialize for Var {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.name())
    }
}

impl<'de> Deserialize<'de> for Var {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let name = String::deserialize(deserializer)?;
        Var::try_named(&name).map_err(de::Error::custom)
    }
}
