//! Access paths, relations and relation resolution.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bopline_bop::Predicate;

use crate::error::{AccessError, Result};
use crate::index::{
    Advancer, MemoryIndex, ScanFlags, Seek, SortedIndex, Tuple, TupleFilter, TupleIter,
};
use crate::key_order::KeyOrder;
use crate::keys::{decode_component, encode_key, successor};

/// An as-bound view over one index: the key order, the `[from_key, to_key)`
/// range covering the bound prefix, and the residual bound positions the
/// range cannot express.
pub struct AccessPath<'r> {
    predicate: Predicate,
    key_order: KeyOrder,
    index: &'r dyn SortedIndex,
    from_key: Option<Vec<u8>>,
    to_key: Option<Vec<u8>>,
    prefix_len: usize,
    residual: Vec<(usize, u64)>,
    index_local_filter: bool,
    access_path_filter: bool,
}

impl<'r> AccessPath<'r> {
    pub fn new(predicate: Predicate, key_order: KeyOrder, index: &'r dyn SortedIndex) -> Result<Self> {
        let components = predicate.key_components();
        if components.len() != key_order.key_arity() {
            return Err(AccessError::Arity {
                relation: predicate.relation_name()?.to_string(),
                expected: key_order.key_arity(),
                found: components.len(),
            });
        }
        let prefix = key_order.bound_prefix(&components);
        let prefix_len = prefix.len();
        let from_key = (!prefix.is_empty()).then(|| encode_key(&prefix));
        let to_key = from_key.as_deref().and_then(successor);
        let residual = key_order
            .positions()
            .iter()
            .enumerate()
            .skip(prefix_len)
            .filter_map(|(k, &p)| components.get(p).copied().flatten().map(|term| (k, term)))
            .collect();
        Ok(Self {
            index_local_filter: predicate.has_index_local_filter(),
            access_path_filter: predicate.has_access_path_filter(),
            predicate,
            key_order,
            index,
            from_key,
            to_key,
            prefix_len,
            residual,
        })
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn key_order(&self) -> &KeyOrder {
        &self.key_order
    }

    pub fn from_key(&self) -> Option<&[u8]> {
        self.from_key.as_deref()
    }

    pub fn to_key(&self) -> Option<&[u8]> {
        self.to_key.as_deref()
    }

    /// Number of leading key components fixed by the predicate.
    pub fn bound_prefix_len(&self) -> usize {
        self.prefix_len
    }

    pub fn has_index_local_filter(&self) -> bool {
        self.index_local_filter
    }

    pub fn has_access_path_filter(&self) -> bool {
        self.access_path_filter
    }

    pub fn index(&self) -> &'r dyn SortedIndex {
        self.index
    }

    /// Scan the path's key range.
    ///
    /// Bound positions outside the key prefix are checked per tuple ahead of
    /// `filter`. The advancer only sees tuples that match them, so a seek past
    /// a prefix happens once a tuple under that prefix has been accepted.
    pub fn range_iter<'a>(
        &'a self,
        capacity: usize,
        flags: ScanFlags,
        advancer: Option<Box<dyn Advancer + 'a>>,
        filter: Option<Arc<dyn TupleFilter + 'a>>,
    ) -> TupleIter<'a> {
        let advancer: Option<Box<dyn Advancer + 'a>> = match advancer {
            Some(inner) if !self.residual.is_empty() => {
                let gate: Box<dyn Advancer + 'a> = Box::new(ResidualGate {
                    residual: &self.residual,
                    inner,
                });
                Some(gate)
            }
            other => other,
        };
        let filter: Option<Arc<dyn TupleFilter + 'a>> = if self.residual.is_empty() {
            filter
        } else {
            Some(Arc::new(ResidualFilter {
                residual: &self.residual,
                inner: filter,
            }))
        };
        self.index.range_iter(
            self.from_key(),
            self.to_key(),
            capacity,
            flags,
            advancer,
            filter,
        )
    }
}

impl fmt::Debug for AccessPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessPath")
            .field("predicate", &self.predicate.bop().label())
            .field("key_order", &self.key_order.name())
            .field("index", &self.index.name())
            .field("from_key", &self.from_key)
            .field("to_key", &self.to_key)
            .finish()
    }
}

fn matches_residual(residual: &[(usize, u64)], tuple: &Tuple) -> bool {
    residual
        .iter()
        .all(|&(k, term)| decode_component(&tuple.key, k).map_or(false, |c| c == term))
}

struct ResidualFilter<'a> {
    residual: &'a [(usize, u64)],
    inner: Option<Arc<dyn TupleFilter + 'a>>,
}

impl TupleFilter for ResidualFilter<'_> {
    fn accept(&self, tuple: &Tuple) -> bool {
        matches_residual(self.residual, tuple) && self.inner.as_ref().map_or(true, |f| f.accept(tuple))
    }
}

/// Holds the cursor in place on tuples the residual rejects.
struct ResidualGate<'a> {
    residual: &'a [(usize, u64)],
    inner: Box<dyn Advancer + 'a>,
}

impl Advancer for ResidualGate<'_> {
    fn advance(&mut self, tuple: &Tuple) -> Seek {
        if matches_residual(self.residual, tuple) {
            self.inner.advance(tuple)
        } else {
            Seek::Continue
        }
    }
}

/// Choose the index for `predicate`: its explicit `keyOrder` annotation if
/// present, otherwise the order with the longest bound key prefix (first
/// declared wins ties).
pub fn select_key_order<'k>(
    relation: &str,
    orders: &'k [KeyOrder],
    predicate: &Predicate,
) -> Result<&'k KeyOrder> {
    if let Some(name) = predicate.key_order()? {
        return orders
            .iter()
            .find(|o| o.name() == name)
            .ok_or_else(|| AccessError::UnknownKeyOrder {
                relation: relation.to_string(),
                key_order: name.to_string(),
            });
    }
    let components = predicate.key_components();
    let mut best: Option<(&KeyOrder, usize)> = None;
    for order in orders {
        let len = order.bound_prefix_len(&components);
        if best.map_or(true, |(_, b)| len > b) {
            best = Some((order, len));
        }
    }
    best.map(|(o, _)| o)
        .ok_or_else(|| AccessError::NoIndex(format!("relation {relation} declares no key orders")))
}

/// Owner of the physical indices of one relation.
pub trait Relation: Send + Sync {
    fn name(&self) -> &str;

    fn arity(&self) -> usize;

    fn key_orders(&self) -> &[KeyOrder];

    fn index(&self, key_order: &KeyOrder) -> Option<&dyn SortedIndex>;

    fn access_path(&self, predicate: &Predicate) -> Result<AccessPath<'_>> {
        let order = select_key_order(self.name(), self.key_orders(), predicate)?;
        let index = self
            .index(order)
            .ok_or_else(|| AccessError::NoIndex(order.name().to_string()))?;
        tracing::trace!(
            relation = self.name(),
            key_order = order.name(),
            "selected access path"
        );
        AccessPath::new(predicate.clone(), order.clone(), index)
    }
}

/// A relation kept entirely in memory, one [`MemoryIndex`] per key order.
#[derive(Debug)]
pub struct MemoryRelation {
    name: String,
    arity: usize,
    key_orders: Vec<KeyOrder>,
    indices: Vec<MemoryIndex>,
}

impl MemoryRelation {
    pub fn new(name: impl Into<String>, key_orders: Vec<KeyOrder>) -> Self {
        let name = name.into();
        let arity = key_orders.first().map_or(0, KeyOrder::key_arity);
        let indices = key_orders
            .iter()
            .map(|o| MemoryIndex::new(format!("{name}.{}", o.name())))
            .collect();
        Self {
            name,
            arity,
            key_orders,
            indices,
        }
    }

    /// A triple relation indexed by SPO, POS and OSP.
    pub fn triples(name: impl Into<String>) -> Self {
        Self::new(name, KeyOrder::triple_orders())
    }

    /// Write `tuple` (in predicate order) to every index.
    pub fn insert(&mut self, tuple: &[u64]) -> Result<()> {
        if tuple.len() != self.arity {
            return Err(AccessError::Arity {
                relation: self.name.clone(),
                expected: self.arity,
                found: tuple.len(),
            });
        }
        for (order, index) in self.key_orders.iter().zip(self.indices.iter_mut()) {
            index.insert(order.encode_tuple(tuple)?, Vec::new());
        }
        Ok(())
    }

    pub fn insert_all<'t>(&mut self, tuples: impl IntoIterator<Item = &'t [u64]>) -> Result<()> {
        for tuple in tuples {
            self.insert(tuple)?;
        }
        Ok(())
    }

    pub fn memory_index(&self, key_order: &str) -> Option<&MemoryIndex> {
        self.key_orders
            .iter()
            .position(|o| o.name() == key_order)
            .and_then(|i| self.indices.get(i))
    }

    pub fn len(&self) -> usize {
        self.indices.first().map_or(0, SortedIndex::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Relation for MemoryRelation {
    fn name(&self) -> &str {
        &self.name
    }

    fn arity(&self) -> usize {
        self.arity
    }

    fn key_orders(&self) -> &[KeyOrder] {
        &self.key_orders
    }

    fn index(&self, key_order: &KeyOrder) -> Option<&dyn SortedIndex> {
        self.memory_index(key_order.name())
            .map(|index| index as &dyn SortedIndex)
    }
}

/// Maps predicates to the relations that own their indices.
pub trait RelationResolver: Send + Sync {
    fn resolve(&self, name: &str) -> Result<Arc<dyn Relation>>;

    fn relation_for(&self, predicate: &Predicate) -> Result<Arc<dyn Relation>> {
        self.resolve(predicate.relation_name()?)
    }
}

/// Relations registered by name.
#[derive(Clone, Default)]
pub struct Catalog {
    relations: HashMap<String, Arc<dyn Relation>>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, relation: Arc<dyn Relation>) -> Option<Arc<dyn Relation>> {
        self.relations.insert(relation.name().to_string(), relation)
    }

    pub fn with_relation(mut self, relation: Arc<dyn Relation>) -> Self {
        self.register(relation);
        self
    }
}

impl RelationResolver for Catalog {
    fn resolve(&self, name: &str) -> Result<Arc<dyn Relation>> {
        self.relations
            .get(name)
            .cloned()
            .ok_or_else(|| AccessError::UnknownRelation(name.to_string()))
    }
}

impl fmt::Debug for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.relations.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Catalog").field("relations", &names).finish()
    }
}
