//! Sorted key/value indices and their range cursors.

use std::collections::{BTreeMap, VecDeque};
use std::ops::{BitOr, Bound};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Which parts of a tuple a range scan materializes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanFlags(u32);

impl ScanFlags {
    pub const KEYS: ScanFlags = ScanFlags(1);
    pub const VALS: ScanFlags = ScanFlags(1 << 1);
    /// Read one tuple at a time so an advancer can reposition the cursor.
    pub const CURSOR: ScanFlags = ScanFlags(1 << 2);

    pub const fn contains(self, other: ScanFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for ScanFlags {
    type Output = ScanFlags;

    fn bitor(self, rhs: ScanFlags) -> ScanFlags {
        ScanFlags(self.0 | rhs.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    pub key: Vec<u8>,
    pub value: Option<Vec<u8>>,
}

/// Where the cursor goes after a tuple has been read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seek {
    Continue,
    /// Resume at the first key `>=` this one. Seeks never move backwards.
    To(Vec<u8>),
    End,
}

/// Repositions a cursor after each tuple it reads.
pub trait Advancer: Send {
    fn advance(&mut self, tuple: &Tuple) -> Seek;
}

/// Drops tuples from a scan. Runs after the advancer.
pub trait TupleFilter: Send + Sync {
    fn accept(&self, tuple: &Tuple) -> bool;
}

pub type TupleIter<'a> = Box<dyn Iterator<Item = Tuple> + Send + 'a>;

pub trait SortedIndex: Send + Sync {
    fn name(&self) -> &str;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scan `[from, to)` in key order. Absent bounds are open.
    ///
    /// `capacity` is a result-size hint (0 lets the index decide).
    fn range_iter<'a>(
        &'a self,
        from: Option<&[u8]>,
        to: Option<&[u8]>,
        capacity: usize,
        flags: ScanFlags,
        advancer: Option<Box<dyn Advancer + 'a>>,
        filter: Option<Arc<dyn TupleFilter + 'a>>,
    ) -> TupleIter<'a>;

    /// Tuples read by cursors so far, including those dropped by filters.
    fn visited(&self) -> u64;
}

const DEFAULT_READ_AHEAD: usize = 64;

/// `BTreeMap`-backed index.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    name: String,
    tuples: BTreeMap<Vec<u8>, Vec<u8>>,
    visited: AtomicU64,
}

impl MemoryIndex {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Returns `false` if the key was already present.
    pub fn insert(&mut self, key: Vec<u8>, value: Vec<u8>) -> bool {
        self.tuples.insert(key, value).is_none()
    }
}

impl SortedIndex for MemoryIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.tuples.len()
    }

    fn range_iter<'a>(
        &'a self,
        from: Option<&[u8]>,
        to: Option<&[u8]>,
        capacity: usize,
        flags: ScanFlags,
        advancer: Option<Box<dyn Advancer + 'a>>,
        filter: Option<Arc<dyn TupleFilter + 'a>>,
    ) -> TupleIter<'a> {
        let read_ahead = if flags.contains(ScanFlags::CURSOR) || advancer.is_some() {
            1
        } else if capacity == 0 {
            DEFAULT_READ_AHEAD
        } else {
            capacity
        };
        Box::new(MemoryCursor {
            index: self,
            lower: from.map_or(Bound::Unbounded, |k| Bound::Included(k.to_vec())),
            upper: to.map(<[u8]>::to_vec),
            read_ahead,
            flags,
            advancer,
            filter,
            buffered: VecDeque::new(),
            exhausted: false,
        })
    }

    fn visited(&self) -> u64 {
        self.visited.load(Ordering::Relaxed)
    }
}

struct MemoryCursor<'a> {
    index: &'a MemoryIndex,
    lower: Bound<Vec<u8>>,
    upper: Option<Vec<u8>>,
    read_ahead: usize,
    flags: ScanFlags,
    advancer: Option<Box<dyn Advancer + 'a>>,
    filter: Option<Arc<dyn TupleFilter + 'a>>,
    buffered: VecDeque<(&'a Vec<u8>, &'a Vec<u8>)>,
    exhausted: bool,
}

impl<'a> MemoryCursor<'a> {
    fn fill(&mut self) {
        if self.exhausted {
            return;
        }
        if let Some(upper) = &self.upper {
            // BTreeMap::range panics on inverted or doubly-excluded bounds
            let empty = match &self.lower {
                Bound::Included(lo) | Bound::Excluded(lo) => lo >= upper,
                Bound::Unbounded => false,
            };
            if empty {
                self.exhausted = true;
                return;
            }
        }
        let lower = match &self.lower {
            Bound::Included(k) => Bound::Included(k.as_slice()),
            Bound::Excluded(k) => Bound::Excluded(k.as_slice()),
            Bound::Unbounded => Bound::Unbounded,
        };
        let upper = match &self.upper {
            Some(k) => Bound::Excluded(k.as_slice()),
            None => Bound::Unbounded,
        };
        self.buffered.extend(
            self.index
                .tuples
                .range::<[u8], _>((lower, upper))
                .take(self.read_ahead),
        );
        if self.buffered.len() < self.read_ahead {
            self.exhausted = true;
        }
    }
}

impl Iterator for MemoryCursor<'_> {
    type Item = Tuple;

    fn next(&mut self) -> Option<Tuple> {
        loop {
            if self.buffered.is_empty() {
                self.fill();
            }
            let (key, value) = self.buffered.pop_front()?;
            self.index.visited.fetch_add(1, Ordering::Relaxed);
            self.lower = Bound::Excluded(key.clone());

            let mut tuple = Tuple {
                key: key.clone(),
                value: Some(value.clone()),
            };
            if let Some(advancer) = self.advancer.as_mut() {
                match advancer.advance(&tuple) {
                    Seek::Continue => {}
                    Seek::To(next) if next > tuple.key => {
                        self.buffered.clear();
                        self.exhausted = false;
                        self.lower = Bound::Included(next);
                    }
                    Seek::To(_) => {}
                    Seek::End => {
                        self.buffered.clear();
                        self.exhausted = true;
                    }
                }
            }
            if let Some(filter) = &self.filter {
                if !filter.accept(&tuple) {
                    continue;
                }
            }
            if !self.flags.contains(ScanFlags::KEYS) {
                tuple.key.clear();
            }
            if !self.flags.contains(ScanFlags::VALS) {
                tuple.value = None;
            }
            return Some(tuple);
        }
    }
}
