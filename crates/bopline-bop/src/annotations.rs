//! Named, typed annotations attached to operator nodes.
//!
//! Annotations are the configuration surface of an operator: ids, sink
//! routing, chunk sizes, predicates and constraints. Operator-valued entries
//! (`Op`/`Ops`) are themselves subtrees and are visited by the
//! annotation-aware traversals; every other entry is opaque data.

use std::collections::BTreeMap;

use bopline_core::value::Value;
use bopline_core::var::Var;

use crate::node::BOpRef;

/// Well-known annotation names.
pub mod names {
    pub const BOP_ID: &str = "bopId";
    pub const CONTROLLER: &str = "controller";
    pub const SINK_REF: &str = "sinkRef";
    pub const ALT_SINK_REF: &str = "altSinkRef";
    pub const CONDITIONAL_GROUP: &str = "conditionalGroup";
    pub const CHUNK_CAPACITY: &str = "chunkCapacity";
    pub const PREDICATE: &str = "predicate";
    pub const CONSTRAINTS: &str = "constraints";
    pub const SELECT: &str = "select";
    pub const DISTINCT_VAR: &str = "distinctVar";
    pub const OPTIONAL: &str = "optional";
    pub const RELATION_NAME: &str = "relationName";
    pub const KEY_ORDER: &str = "keyOrder";
    pub const INDEX_LOCAL_FILTER: &str = "indexLocalFilter";
    pub const ACCESS_PATH_FILTER: &str = "accessPathFilter";
    pub const TERM_FILTER: &str = "termFilter";
}

#[derive(Debug, Clone)]
pub enum Annotation {
    Bool(bool),
    Int(i64),
    Str(String),
    Value(Value),
    Vars(Vec<Var>),
    Op(BOpRef),
    Ops(Vec<BOpRef>),
}

impl Annotation {
    pub fn type_name(&self) -> &'static str {
        match self {
            Annotation::Bool(_) => "bool",
            Annotation::Int(_) => "int",
            Annotation::Str(_) => "str",
            Annotation::Value(_) => "value",
            Annotation::Vars(_) => "vars",
            Annotation::Op(_) => "op",
            Annotation::Ops(_) => "ops",
        }
    }

    /// Operator subtrees held by this entry; empty for data-valued entries.
    pub fn ops(&self) -> &[BOpRef] {
        match self {
            Annotation::Op(op) => std::slice::from_ref(op),
            Annotation::Ops(ops) => ops.as_slice(),
            _ => &[],
        }
    }
}

impl From<bool> for Annotation {
    fn from(v: bool) -> Self {
        Annotation::Bool(v)
    }
}

impl From<i64> for Annotation {
    fn from(v: i64) -> Self {
        Annotation::Int(v)
    }
}

impl From<&str> for Annotation {
    fn from(v: &str) -> Self {
        Annotation::Str(v.to_string())
    }
}

impl From<String> for Annotation {
    fn from(v: String) -> Self {
        Annotation::Str(v)
    }
}

impl From<Value> for Annotation {
    fn from(v: Value) -> Self {
        Annotation::Value(v)
    }
}

impl From<Vec<Var>> for Annotation {
    fn from(v: Vec<Var>) -> Self {
        Annotation::Vars(v)
    }
}

impl From<BOpRef> for Annotation {
    fn from(v: BOpRef) -> Self {
        Annotation::Op(v)
    }
}

impl From<Vec<BOpRef>> for Annotation {
    fn from(v: Vec<BOpRef>) -> Self {
        Annotation::Ops(v)
    }
}

/// Annotation bag. Ordered by name so rendering and fingerprints are stable.
#[derive(Debug, Clone, Default)]
pub struct Annotations(BTreeMap<String, Annotation>);

impl Annotations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: &str, value: impl Into<Annotation>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Annotation>) -> Option<Annotation> {
        self.0.insert(name.to_string(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Annotation> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Annotation)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Every operator-valued annotation, in name order.
    pub fn ops(&self) -> impl Iterator<Item = &BOpRef> {
        self.0.values().flat_map(|a| a.ops().iter())
    }

    pub(crate) fn map_ops(&self, f: &impl Fn(&BOpRef) -> BOpRef) -> Annotations {
        let inner = self
            .0
            .iter()
            .map(|(k, v)| {
                let v = match v {
                    Annotation::Op(op) => Annotation::Op(f(op)),
                    Annotation::Ops(ops) => Annotation::Ops(ops.iter().map(f).collect()),
                    other => other.clone(),
                };
                (k.clone(), v)
            })
            .collect();
        Annotations(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BOp;

    #[test]
    fn test_ops_only_yields_operator_entries() {
        let x = BOp::var(Var::named("ann_x"));
        let y = BOp::var(Var::named("ann_y"));
        let anns = Annotations::new()
            .with(names::BOP_ID, 3i64)
            .with(names::PREDICATE, x.clone())
            .with(names::CONSTRAINTS, vec![y.clone()])
            .with(names::SELECT, vec![Var::named("ann_z")]);

        let ops: Vec<_> = anns.ops().collect();
        assert_eq!(ops.len(), 2);
        // name order: constraints < predicate
        assert!(std::sync::Arc::ptr_eq(ops[0], &y));
        assert!(std::sync::Arc::ptr_eq(ops[1], &x));
    }

    #[test]
    fn test_insert_replaces() {
        let mut anns = Annotations::new().with(names::CHUNK_CAPACITY, 10i64);
        let prev = anns.insert(names::CHUNK_CAPACITY, 20i64);
        assert!(matches!(prev, Some(Annotation::Int(10))));
        assert!(matches!(anns.get(names::CHUNK_CAPACITY), Some(Annotation::Int(20))));
        assert_eq!(anns.len(), 1);
    }
}
