//! Whole-tree analysis: variable scope, id indexing, evaluation order and
//! sink resolution.
//!
//! Operator trees are DAGs: variable and constant leaves are shared between
//! parents. Nothing here detects true cycles. Walks along the left spine are
//! bounded by a depth limit instead, and the id index rejects the same id
//! occurring twice, which also catches a pipeline operator reached by two
//! paths.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use bopline_core::id::{BopId, GroupId};
use bopline_core::var::Var;

use crate::error::{PlanError, Result};
use crate::node::{BOp, BOpRef};
use crate::predicate::Predicate;
use crate::traverse::{post_order, pre_order, pre_order_with_annotations};

/// Default bound for spine walks when no engine config is at hand.
pub const DEFAULT_MAX_DEPTH: usize = 4096;

/// Distinct variables spanned by `op`, annotation subtrees included, in
/// first-seen order.
pub fn get_spanned_variables(op: &BOpRef) -> impl Iterator<Item = Var> + '_ {
    let mut seen = HashSet::new();
    pre_order_with_annotations(op)
        .filter_map(|n| n.as_var())
        .filter(move |v| seen.insert(*v))
}

/// Variables appearing directly as arguments of `op`.
pub fn get_argument_variables(op: &BOp) -> impl Iterator<Item = Var> + '_ {
    op.args().iter().filter_map(|a| a.as_var())
}

pub fn get_argument_variable_count(op: &BOp) -> usize {
    get_argument_variables(op).count()
}

/// Variables spanned by both `p` and `c`, in `c`'s order.
pub fn get_shared_vars(p: &BOpRef, c: &BOpRef) -> Vec<Var> {
    let p_vars: HashSet<Var> = get_spanned_variables(p).collect();
    if p_vars.is_empty() {
        return Vec::new();
    }
    get_spanned_variables(c)
        .filter(|v| p_vars.contains(v))
        .collect()
}

/// Every distinct node (by identity) under `root`, annotation subtrees
/// included, that satisfies `filter`.
pub fn visit_all<'a, F>(root: &'a BOpRef, filter: F) -> impl Iterator<Item = &'a BOpRef> + 'a
where
    F: Fn(&BOp) -> bool + 'a,
{
    let mut seen = HashSet::new();
    pre_order_with_annotations(root)
        .filter(move |n| seen.insert(Arc::as_ptr(n)))
        .filter(move |n| filter(n))
}

/// Read-only map from operator id to operator, built once per plan and
/// shared by every running operator task.
#[derive(Debug, Clone, Default)]
pub struct BopIndex {
    by_id: HashMap<BopId, BOpRef>,
    order: Vec<BopId>,
}

impl BopIndex {
    pub fn get(&self, id: BopId) -> Option<&BOpRef> {
        self.by_id.get(&id)
    }

    pub fn contains(&self, id: BopId) -> bool {
        self.by_id.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    /// Ids in pre-order.
    pub fn ids(&self) -> &[BopId] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (BopId, &BOpRef)> {
        self.order
            .iter()
            .filter_map(|id| self.by_id.get(id).map(|op| (*id, op)))
    }
}

/// Index the pipeline operators of `root` by id.
///
/// Every node reached through arguments must be a pipeline operator with a
/// unique integer id.
pub fn get_index(root: &BOpRef) -> Result<BopIndex> {
    let mut index = BopIndex::default();
    for node in pre_order(root) {
        if !node.is_pipeline() {
            return Err(PlanError::NotPipelineOp(node.label()));
        }
        let id = node.id()?;
        if let Some(first) = index.by_id.insert(id, Arc::clone(node)) {
            return Err(PlanError::DuplicateId {
                id,
                first: first.label(),
                second: node.label(),
            });
        }
        index.order.push(id);
    }
    Ok(index)
}

/// The first node (depth-first) having `op` as a direct argument, compared by
/// identity.
pub fn get_parent<'a>(root: &'a BOpRef, op: &BOpRef) -> Option<&'a BOpRef> {
    let mut it = pre_order(root);
    while let Some(node) = it.next() {
        if Arc::ptr_eq(node, op) {
            if let Some(parent) = it.parent() {
                return Some(parent);
            }
        }
    }
    None
}

/// Where streaming starts: follow argument 0 until a controller or a leaf.
pub fn get_pipeline_start(root: &BOpRef) -> Result<&BOpRef> {
    get_pipeline_start_bounded(root, DEFAULT_MAX_DEPTH)
}

pub fn get_pipeline_start_bounded(root: &BOpRef, max_depth: usize) -> Result<&BOpRef> {
    let mut op = root;
    for _ in 0..max_depth {
        if op.is_controller()? {
            return Ok(op);
        }
        match op.arg_at(0) {
            Some(left) => op = left,
            None => return Ok(op),
        }
    }
    Err(PlanError::TooDeep { limit: max_depth })
}

/// The explicit `sinkRef` of `op`, else its parent's id, else none.
pub fn get_effective_default_sink(op: &BOp, parent: Option<&BOp>) -> Result<Option<BopId>> {
    if let Some(sink) = op.sink_ref()? {
        return Ok(Some(sink));
    }
    parent.map(BOp::id).transpose()
}

/// Left-deep evaluation order of the pipeline backbone under `root`.
pub fn get_evaluation_order(root: &BOpRef) -> Result<Vec<BopId>> {
    get_evaluation_order_bounded(root, DEFAULT_MAX_DEPTH)
}

pub fn get_evaluation_order_bounded(root: &BOpRef, max_depth: usize) -> Result<Vec<BopId>> {
    // The recursion only ever descends into argument 0, so walk the spine
    // down and emit ids bottom-up.
    let mut spine: Vec<&BOpRef> = Vec::new();
    let mut op = root;
    loop {
        if !op.is_pipeline() {
            break;
        }
        spine.push(op);
        if spine.len() > max_depth {
            return Err(PlanError::TooDeep { limit: max_depth });
        }
        let depth = spine.len() - 1;
        if depth > 0 && op.is_controller()? {
            break;
        }
        match op.arg_at(0) {
            Some(left) => op = left,
            None => break,
        }
    }
    spine.iter().rev().map(|op| op.id()).collect()
}

/// The first operator in post-order whose conditional group is `group`.
pub fn get_first_bop_id_for_conditional_group(
    root: &BOpRef,
    group: GroupId,
) -> Result<Option<BopId>> {
    for op in post_order(root) {
        if op.conditional_group()? == Some(group) {
            return op.id().map(Some);
        }
    }
    Ok(None)
}

pub fn get_pred_ids(preds: &[Predicate]) -> Result<Vec<BopId>> {
    preds.iter().map(|p| p.bop().id()).collect()
}

/// Indented rendering of the argument tree, one operator per line. Variable
/// and constant leaves are left out.
pub fn plan_to_string(root: &BOpRef) -> String {
    let mut lines = Vec::new();
    let mut it = pre_order(root);
    while let Some(node) = it.next() {
        if node.is_leaf_term() {
            continue;
        }
        lines.push(format!("{}{}", "  ".repeat(it.depth()), node.label()));
    }
    lines.join("\n")
}
