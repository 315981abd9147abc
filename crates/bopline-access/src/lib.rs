#![forbid(unsafe_code)]
//! bopline-access: the storage side of a scan.
//!
//! An as-bound predicate is turned into an [`AccessPath`]: a key order, a
//! `[from_key, to_key)` range and a cursor over one sorted index. Relations
//! own one index per key order and are found by name through a
//! [`RelationResolver`].

pub mod access_path;
pub mod advancer;
pub mod error;
pub mod index;
pub mod key_order;
pub mod keys;

pub use access_path::{AccessPath, Catalog, MemoryRelation, Relation, RelationResolver};
pub use advancer::{ComponentFilter, DistinctTermAdvancer};
pub use error::{AccessError, Result};
pub use index::{Advancer, MemoryIndex, ScanFlags, Seek, SortedIndex, Tuple, TupleFilter};
pub use key_order::KeyOrder;
