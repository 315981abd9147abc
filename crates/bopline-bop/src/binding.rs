//! Binding sets: the unit of data flowing through the pipeline.

use std::fmt;

use bopline_core::value::Value;
use bopline_core::var::Var;
use serde::{Deserialize, Serialize};

/// An insertion-ordered mapping from variables to values.
///
/// Solutions usually bind a handful of variables, so a flat vector beats a
/// map on both lookups and clones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BindingSet {
    bindings: Vec<(Var, Value)>,
}

impl BindingSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, var: Var, value: impl Into<Value>) -> Self {
        self.set(var, value.into());
        self
    }

    pub fn get(&self, var: Var) -> Option<&Value> {
        self.bindings
            .iter()
            .find(|(v, _)| *v == var)
            .map(|(_, value)| value)
    }

    pub fn is_bound(&self, var: Var) -> bool {
        self.get(var).is_some()
    }

    /// Bind `var`, replacing any previous value.
    pub fn set(&mut self, var: Var, value: Value) {
        match self.bindings.iter_mut().find(|(v, _)| *v == var) {
            Some(slot) => slot.1 = value,
            None => self.bindings.push((var, value)),
        }
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Var, &Value)> {
        self.bindings.iter().map(|(v, value)| (*v, value))
    }

    /// Projection onto `select`, in `select` order. Unbound variables are
    /// dropped.
    pub fn copy(&self, select: &[Var]) -> BindingSet {
        let bindings = select
            .iter()
            .filter_map(|v| self.get(*v).map(|value| (*v, value.clone())))
            .collect();
        BindingSet { bindings }
    }
}

impl fmt::Display for BindingSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (var, value)) in self.bindings.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{var}={value}")?;
        }
        f.write_str("}")
    }
}
