//! Distinct-term-scan join.
//!
//! For each input solution the operator binds its predicate, skip-scans the
//! matching index range once per distinct value of `distinctVar`, and joins
//! each value back onto the input. Scan cost is one index read per distinct
//! value, however many tuples share it.

use std::sync::Arc;

use bopline_access::keys::decode_value;
use bopline_access::{
    ComponentFilter, DistinctTermAdvancer, KeyOrder, Relation, RelationResolver, ScanFlags,
    TupleFilter,
};
use bopline_bop::annotations::{names, Annotation};
use bopline_bop::chunk::join_solutions;
use bopline_bop::constraint::constraints_of;
use bopline_bop::{BOp, BindingSet, Constraint, PlanError, Predicate};
use bopline_core::config::EngineConfig;
use bopline_core::id::BopId;
use bopline_core::value::Value;
use bopline_core::var::Var;

use crate::buffer::{AsyncSource, UnsyncLocalOutputBuffer};
use crate::chunks::to_array;
use crate::context::{close_all, BopContext};
use crate::error::{ExecError, Result};
use crate::operator::{OpFuture, PipelineOperator};
use crate::stats::BopStats;

#[derive(Debug, Clone)]
pub struct DistinctTermScanOp {
    id: BopId,
    distinct_var: Var,
    predicate: Predicate,
    constraints: Option<Vec<Constraint>>,
    select: Option<Vec<Var>>,
    term_filter: Option<Constraint>,
    chunk_capacity: Option<usize>,
}

impl DistinctTermScanOp {
    pub const NAME: &'static str = "DistinctTermScan";

    /// Validate the annotations of `bop`.
    ///
    /// `distinctVar` and `predicate` are required, and the predicate must
    /// appear in it. Optional predicates are refused: this join has no
    /// outer-join fallback.
    pub fn from_bop(bop: &BOp) -> Result<Self> {
        let id = bop.id()?;
        let distinct_var = match bop.required_property(names::DISTINCT_VAR)? {
            Annotation::Op(op) => op.as_var(),
            Annotation::Vars(vars) if vars.len() == 1 => vars.first().copied(),
            _ => None,
        }
        .ok_or_else(|| PlanError::BadPropertyType {
            name: names::DISTINCT_VAR.to_string(),
            expected: "variable",
            found: "non-variable",
        })?;

        let predicate = match bop.required_property(names::PREDICATE)? {
            Annotation::Op(op) => Predicate::new(Arc::clone(op))?,
            other => {
                return Err(PlanError::BadPropertyType {
                    name: names::PREDICATE.to_string(),
                    expected: "op",
                    found: other.type_name(),
                }
                .into())
            }
        };
        if predicate.is_optional()? {
            return Err(PlanError::Unsupported(format!(
                "{} does not implement optional joins",
                Self::NAME
            ))
            .into());
        }
        if predicate.position_of(distinct_var).is_none() {
            return Err(PlanError::Unsupported(format!(
                "{distinct_var} does not occur in the predicate"
            ))
            .into());
        }

        let term_filter = bop
            .op_property(names::TERM_FILTER)?
            .cloned()
            .map(Constraint::new)
            .transpose()?;
        let chunk_capacity = match bop.property(names::CHUNK_CAPACITY) {
            Some(_) => Some(bop.chunk_capacity(1)?),
            None => None,
        };

        Ok(Self {
            id,
            distinct_var,
            predicate,
            constraints: constraints_of(bop)?,
            select: bop.vars_property(names::SELECT)?.map(<[Var]>::to_vec),
            term_filter,
            chunk_capacity,
        })
    }

    pub fn distinct_var(&self) -> Var {
        self.distinct_var
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Pin `bound` to a key order where the distinct variable sits in or
    /// directly after the bound prefix. Orders covering more of the bound
    /// positions win; the rest are checked per tuple by the access path.
    fn choose_key_order(&self, relation: &dyn Relation, bound: &Predicate) -> Result<(Predicate, usize)> {
        let pred_pos = self
            .predicate
            .position_of(self.distinct_var)
            .ok_or_else(|| ExecError::Invariant(format!("{} left the predicate", self.distinct_var)))?;
        let components = bound.key_components();
        let usable = |order: &KeyOrder| -> Option<(usize, usize)> {
            let prefix = order.bound_prefix_len(&components);
            let key_pos = order.key_position_of(pred_pos)?;
            (key_pos <= prefix).then_some((key_pos, prefix))
        };

        if let Some(name) = bound.key_order()? {
            let order = relation
                .key_orders()
                .iter()
                .find(|o| o.name() == name)
                .ok_or_else(|| bopline_access::AccessError::UnknownKeyOrder {
                    relation: relation.name().to_string(),
                    key_order: name.to_string(),
                })?;
            let (key_pos, _) = usable(order).ok_or_else(|| {
                ExecError::Invariant(format!(
                    "key order {name} cannot skip-scan {} after the bound prefix",
                    self.distinct_var
                ))
            })?;
            return Ok((bound.clone(), key_pos));
        }
        let mut best: Option<(&KeyOrder, usize, usize)> = None;
        for order in relation.key_orders() {
            if let Some((key_pos, prefix)) = usable(order) {
                if best.map_or(true, |(_, _, b)| prefix > b) {
                    best = Some((order, key_pos, prefix));
                }
            }
        }
        best.map(|(order, key_pos, _)| (bound.with_key_order(order.name()), key_pos))
            .ok_or_else(|| {
                ExecError::Invariant(format!(
                    "relation {} has no key order placing {} after the bound prefix",
                    relation.name(),
                    self.distinct_var
                ))
            })
    }

    fn term_filter<'a>(&self, key_pos: usize) -> Option<Arc<dyn TupleFilter + 'a>> {
        let filter = self.term_filter.clone()?;
        let var = self.distinct_var;
        Some(Arc::new(ComponentFilter::new(key_pos, move |term| {
            filter.accept(&BindingSet::new().with(var, Value::Term(term)))
        })))
    }

    async fn join_all(
        &self,
        source: &mut AsyncSource,
        out: &mut UnsyncLocalOutputBuffer<'_>,
        stats: &BopStats,
        resolver: &dyn RelationResolver,
        config: &EngineConfig,
    ) -> Result<()> {
        let inputs = to_array(source, stats).await?;
        let relation = resolver.relation_for(&self.predicate)?;
        for left in inputs.iter() {
            let Some(bound) = self.predicate.as_bound(left) else {
                tracing::debug!(bop = %self.id, input = %left, "predicate does not bind, input skipped");
                continue;
            };
            let (bound, key_pos) = self.choose_key_order(relation.as_ref(), &bound)?;
            let path = relation.access_path(&bound)?;
            if path.has_index_local_filter() || path.has_access_path_filter() {
                return Err(ExecError::Invariant(format!(
                    "{} cannot run over filtered access paths",
                    Self::NAME
                )));
            }

            let tuples = path.range_iter(
                config.scan_capacity_hint,
                ScanFlags::KEYS | ScanFlags::CURSOR,
                Some(Box::new(DistinctTermAdvancer::new(key_pos + 1))),
                self.term_filter(key_pos),
            );
            for tuple in tuples {
                let value = decode_value(&tuple.key, key_pos)?;
                let right = BindingSet::new().with(self.distinct_var, value);
                if let Some(joined) = join_solutions(
                    left,
                    &right,
                    self.constraints.as_deref(),
                    self.select.as_deref(),
                ) {
                    out.add(joined).await?;
                }
            }
        }
        Ok(())
    }
}

impl PipelineOperator for DistinctTermScanOp {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn id(&self) -> BopId {
        self.id
    }

    fn eval(self: Arc<Self>, ctx: BopContext) -> OpFuture {
        Box::pin(async move {
            let BopContext {
                mut source,
                sink,
                sink2,
                stats,
                resolver,
                config,
            } = ctx;
            let capacity = self.chunk_capacity.unwrap_or(config.chunk_capacity);
            let result: Result<()> = async {
                let mut out = UnsyncLocalOutputBuffer::new(capacity, &sink);
                self.join_all(&mut source, &mut out, &stats, resolver.as_ref(), &config)
                    .await?;
                out.flush().await?;
                sink.flush()?;
                Ok(())
            }
            .await;
            if let Err(e) = &result {
                tracing::debug!(bop = %self.id, error = %e, "distinct term scan failed");
            }
            close_all(&mut source, &sink, sink2.as_ref());
            result
        })
    }
}
