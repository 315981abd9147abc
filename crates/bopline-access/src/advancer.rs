//! Cursor advancers and tuple filters used by scans.

use crate::index::{Advancer, Seek, Tuple, TupleFilter};
use crate::keys::{decode_component, successor, COMPONENT_LEN};

/// Skip-scan over distinct leading key prefixes.
///
/// After each tuple, seeks past every other key sharing its first
/// `prefix_components` components, so a scan costs one read per distinct
/// prefix instead of one per tuple.
#[derive(Debug, Clone)]
pub struct DistinctTermAdvancer {
    prefix_len: usize,
}

impl DistinctTermAdvancer {
    pub fn new(prefix_components: usize) -> Self {
        Self {
            prefix_len: prefix_components * COMPONENT_LEN,
        }
    }
}

impl Advancer for DistinctTermAdvancer {
    fn advance(&mut self, tuple: &Tuple) -> Seek {
        let Some(prefix) = tuple.key.get(..self.prefix_len) else {
            return Seek::Continue;
        };
        match successor(prefix) {
            Some(next) => Seek::To(next),
            None => Seek::End,
        }
    }
}

/// Accepts tuples whose key component at `index` passes `accept`.
pub struct ComponentFilter<F> {
    index: usize,
    accept: F,
}

impl<F> ComponentFilter<F>
where
    F: Fn(u64) -> bool + Send + Sync,
{
    pub fn new(index: usize, accept: F) -> Self {
        Self { index, accept }
    }
}

impl<F> TupleFilter for ComponentFilter<F>
where
    F: Fn(u64) -> bool + Send + Sync,
{
    fn accept(&self, tuple: &Tuple) -> bool {
        decode_component(&tuple.key, self.index).map_or(false, |c| (self.accept)(c))
    }
}
