//! Query engine: compile an operator tree and run it as a pipeline.
//!
//! Compilation indexes the plan by id, computes the left-deep evaluation
//! order and resolves each operator's sinks. Running wires one bounded
//! buffer per operator, spawns every operator as its own task and drains the
//! root's output until every producer has closed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use bopline_access::RelationResolver;
use bopline_bop::analysis::{
    get_effective_default_sink, get_evaluation_order_bounded, get_index, get_parent,
    get_pipeline_start_bounded, plan_to_string, BopIndex,
};
use bopline_bop::chunk::chunk_of;
use bopline_bop::{BOpRef, BindingSet, PlanError};
use bopline_core::config::EngineConfig;
use bopline_core::fingerprint::{Fingerprint, QueryId};
use bopline_core::id::BopId;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::buffer::{AsyncSource, BlockingBuffer};
use crate::context::BopContext;
use crate::error::{ExecError, Result};
use crate::metrics::record_operator_stats;
use crate::registry::Registry;
use crate::stats::{BopStats, StatsSnapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Routing {
    sink: Option<BopId>,
    alt_sink: Option<BopId>,
}

/// A validated plan, ready to run any number of times.
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    root: BOpRef,
    index: BopIndex,
    order: Vec<BopId>,
    start: BopId,
    routing: HashMap<BopId, Routing>,
    fingerprint: Fingerprint,
}

impl CompiledPlan {
    pub fn root(&self) -> &BOpRef {
        &self.root
    }

    pub fn index(&self) -> &BopIndex {
        &self.index
    }

    pub fn evaluation_order(&self) -> &[BopId] {
        &self.order
    }

    pub fn pipeline_start(&self) -> BopId {
        self.start
    }

    /// Default sink of `id`; `None` means the query output.
    pub fn sink_of(&self, id: BopId) -> Option<BopId> {
        self.routing.get(&id).and_then(|r| r.sink)
    }

    pub fn alt_sink_of(&self, id: BopId) -> Option<BopId> {
        self.routing.get(&id).and_then(|r| r.alt_sink)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub query_id: QueryId,
    pub plan_fingerprint: Fingerprint,
    pub solutions: Vec<BindingSet>,
    pub stats: BTreeMap<BopId, StatsSnapshot>,
}

impl QueryResult {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Engine owns the config, the operator registry and relation resolution.
pub struct QueryEngine {
    cfg: Arc<EngineConfig>,
    registry: Registry,
    resolver: Arc<dyn RelationResolver>,
}

impl QueryEngine {
    pub fn new(cfg: EngineConfig, resolver: Arc<dyn RelationResolver>) -> Result<Self> {
        cfg.validate()?;
        Ok(Self {
            cfg: Arc::new(cfg),
            registry: Registry::new(),
            resolver,
        })
    }

    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    pub fn compile(&self, root: BOpRef) -> Result<CompiledPlan> {
        let depth = self.cfg.max_tree_depth;
        let index = get_index(&root)?;
        let order = get_evaluation_order_bounded(&root, depth)?;
        let start = get_pipeline_start_bounded(&root, depth)?.id()?;

        let mut routing = HashMap::new();
        for &id in &order {
            let op = index
                .get(id)
                .ok_or_else(|| ExecError::Invariant(format!("{id} missing from index")))?;
            let parent = get_parent(&root, op);
            let sink = get_effective_default_sink(op, parent.map(|p| p.as_ref()))?;
            let alt_sink = op.alt_sink_ref()?;
            for target in [sink, alt_sink].into_iter().flatten() {
                if !order.contains(&target) {
                    return Err(PlanError::UnknownSink(target).into());
                }
            }
            routing.insert(id, Routing { sink, alt_sink });
        }

        let fingerprint = Fingerprint::of_str(&plan_to_string(&root));
        tracing::debug!(plan = %fingerprint.short(), operators = order.len(), "compiled plan");
        Ok(CompiledPlan {
            root,
            index,
            order,
            start,
            routing,
            fingerprint,
        })
    }

    /// Run `plan`, feeding `initial` to the pipeline start. An empty
    /// `initial` means one empty solution.
    pub async fn run(&self, plan: &CompiledPlan, initial: Vec<BindingSet>) -> Result<QueryResult> {
        let query_id = QueryId::new();
        let span = tracing::info_span!("query", query = %query_id, plan = %plan.fingerprint.short());
        self.run_inner(query_id, plan, initial).instrument(span).await
    }

    /// Compile and run in one go.
    pub async fn execute(&self, root: BOpRef, initial: Vec<BindingSet>) -> Result<QueryResult> {
        let plan = self.compile(root)?;
        self.run(&plan, initial).await
    }

    async fn run_inner(
        &self,
        query_id: QueryId,
        plan: &CompiledPlan,
        initial: Vec<BindingSet>,
    ) -> Result<QueryResult> {
        let mut ops = Vec::with_capacity(plan.order.len());
        for &id in &plan.order {
            let bop = plan
                .index
                .get(id)
                .ok_or_else(|| ExecError::Invariant(format!("{id} missing from index")))?;
            ops.push((id, self.registry.instantiate(bop)?));
        }

        let capacity = self.cfg.sink_capacity;
        let (out_tx, mut out_rx) = mpsc::channel(capacity);
        let mut senders = HashMap::new();
        let mut receivers = HashMap::new();
        for &id in &plan.order {
            let (tx, rx) = mpsc::channel(capacity);
            senders.insert(id, tx);
            receivers.insert(id, rx);
        }
        // every producer gets its own sender; the originals are dropped below
        // so channels close exactly when their producers finish
        let handle_for = |target: Option<BopId>, stats: &Arc<BopStats>| -> Result<BlockingBuffer> {
            let tx = match target {
                None => out_tx.clone(),
                Some(id) => senders
                    .get(&id)
                    .cloned()
                    .ok_or(ExecError::Plan(PlanError::UnknownSink(id)))?,
            };
            Ok(BlockingBuffer::from_sender(target, tx).with_stats(Arc::clone(stats)))
        };

        let initial = if initial.is_empty() {
            vec![BindingSet::new()]
        } else {
            initial
        };
        let mut initial = Some(chunk_of(initial));

        let mut tasks = Vec::with_capacity(ops.len());
        let mut all_stats = Vec::with_capacity(ops.len());
        for (id, op) in ops {
            let stats = Arc::new(BopStats::new());
            let routing = plan.routing.get(&id).copied().unwrap_or(Routing {
                sink: None,
                alt_sink: None,
            });
            let sink = handle_for(routing.sink, &stats)?;
            let sink2 = routing
                .alt_sink
                .map(|alt| handle_for(Some(alt), &stats))
                .transpose()?;

            let mut source = match receivers.remove(&id) {
                Some(rx) => AsyncSource::from_receiver(rx),
                None => AsyncSource::empty(),
            };
            if id == plan.start {
                if let Some(chunk) = initial.take() {
                    source = source.prime(chunk);
                }
            }

            let mut ctx = BopContext::new(source, sink, Arc::clone(&self.resolver), Arc::clone(&self.cfg))
                .with_stats(Arc::clone(&stats));
            ctx.sink2 = sink2;

            all_stats.push((id, op.name(), stats));
            tasks.push((id, tokio::spawn(op.eval(ctx))));
        }
        drop(handle_for);
        drop(senders);
        drop(out_tx);

        let mut solutions = Vec::new();
        while let Some(chunk) = out_rx.recv().await {
            solutions.extend(chunk.iter().cloned());
        }

        let mut first_error: Option<ExecError> = None;
        for (id, task) in tasks {
            let outcome = match task.await {
                Ok(result) => result,
                Err(join) => Err(ExecError::Task(format!("{id}: {join}"))),
            };
            if let Err(e) = outcome {
                tracing::debug!(bop = %id, error = %e, "operator failed");
                // a closed sink is usually fallout from another operator failing
                let replace = match &first_error {
                    None => true,
                    Some(ExecError::SinkClosed) => !matches!(e, ExecError::SinkClosed),
                    Some(_) => false,
                };
                if replace {
                    first_error = Some(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }

        let mut stats = BTreeMap::new();
        for (id, name, s) in all_stats {
            let snap = s.snapshot();
            record_operator_stats(id, name, &snap);
            stats.insert(id, snap);
        }
        tracing::info!(solutions = solutions.len(), "query finished");
        Ok(QueryResult {
            query_id,
            plan_fingerprint: plan.fingerprint,
            solutions,
            stats,
        })
    }
}

impl std::fmt::Debug for QueryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryEngine")
            .field("cfg", &self.cfg)
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
