//! What an operator sees while it runs.

use std::fmt;
use std::sync::Arc;

use bopline_access::{AccessPath, Relation, RelationResolver};
use bopline_bop::Predicate;
use bopline_core::config::EngineConfig;

use crate::buffer::{AsyncSource, BlockingBuffer};
use crate::error::Result;
use crate::stats::BopStats;

/// Execution context of one operator invocation.
///
/// Fields are public so an operator can split the context and hold its
/// source, sinks and stats independently.
pub struct BopContext {
    pub source: AsyncSource,
    pub sink: BlockingBuffer,
    pub sink2: Option<BlockingBuffer>,
    pub stats: Arc<BopStats>,
    pub resolver: Arc<dyn RelationResolver>,
    pub config: Arc<EngineConfig>,
}

impl BopContext {
    pub fn new(
        source: AsyncSource,
        sink: BlockingBuffer,
        resolver: Arc<dyn RelationResolver>,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            source,
            sink,
            sink2: None,
            stats: Arc::new(BopStats::new()),
            resolver,
            config,
        }
    }

    pub fn with_sink2(mut self, sink2: BlockingBuffer) -> Self {
        self.sink2 = Some(sink2);
        self
    }

    pub fn with_stats(mut self, stats: Arc<BopStats>) -> Self {
        self.stats = stats;
        self
    }

    pub fn relation(&self, predicate: &Predicate) -> Result<Arc<dyn Relation>> {
        Ok(self.resolver.relation_for(predicate)?)
    }

    pub fn access_path<'r>(
        &self,
        relation: &'r dyn Relation,
        predicate: &Predicate,
    ) -> Result<AccessPath<'r>> {
        Ok(relation.access_path(predicate)?)
    }
}

impl fmt::Debug for BopContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BopContext")
            .field("sink", &self.sink.target())
            .field("sink2", &self.sink2.as_ref().map(BlockingBuffer::target))
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

/// Close both sinks and the source. Runs on every exit path of an operator.
pub(crate) fn close_all(source: &mut AsyncSource, sink: &BlockingBuffer, sink2: Option<&BlockingBuffer>) {
    sink.close();
    if let Some(sink2) = sink2 {
        sink2.close();
    }
    source.close();
}
