//! Chunk-level filtering, projection and joining of binding sets.

use std::sync::Arc;

use bopline_core::var::Var;

use crate::binding::BindingSet;
use crate::constraint::Constraint;

/// A dense batch of binding sets moved as a unit between pipeline stages.
/// Shared, so handing a chunk downstream never copies its elements.
pub type Chunk = Arc<[BindingSet]>;

pub fn chunk_of(sets: Vec<BindingSet>) -> Chunk {
    Arc::from(sets)
}

pub fn empty_chunk() -> Chunk {
    Arc::from(Vec::new())
}

/// True iff every constraint accepts `bindings`. Stops at the first rejection.
pub fn is_consistent(constraints: &[Constraint], bindings: &BindingSet) -> bool {
    for c in constraints {
        if !c.accept(bindings) {
            tracing::debug!(constraint = %c.bop(), bindings = %bindings, "constraint rejected binding set");
            return false;
        }
    }
    true
}

/// Filter `chunk` by `constraints` and project survivors onto `select`.
///
/// With neither constraints nor a projection the input chunk itself is
/// returned; callers may rely on `Arc::ptr_eq` holding in that case.
pub fn apply_constraints(
    chunk: &Chunk,
    select: Option<&[Var]>,
    constraints: Option<&[Constraint]>,
) -> Chunk {
    let constraints = constraints.filter(|c| !c.is_empty());
    if constraints.is_none() && select.is_none() {
        return Arc::clone(chunk);
    }
    let accepted: Vec<BindingSet> = chunk
        .iter()
        .filter(|bs| constraints.map_or(true, |c| is_consistent(c, bs)))
        .map(|bs| match select {
            Some(vars) => bs.copy(vars),
            None => bs.clone(),
        })
        .collect();
    Arc::from(accepted)
}

/// Join `right` onto `left`.
///
/// Fails (`None`) when a shared variable is bound to different values or when
/// the joined solution violates `constraints`. The result is projected onto
/// `select` when given.
pub fn join_solutions(
    left: &BindingSet,
    right: &BindingSet,
    constraints: Option<&[Constraint]>,
    select: Option<&[Var]>,
) -> Option<BindingSet> {
    let mut out = left.clone();
    for (var, value) in right.iter() {
        match out.get(var) {
            Some(existing) if existing != value => return None,
            Some(_) => {}
            None => out.set(var, value.clone()),
        }
    }
    if let Some(constraints) = constraints {
        if !is_consistent(constraints, &out) {
            return None;
        }
    }
    Some(match select {
        Some(vars) => out.copy(vars),
        None => out,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::BOp;
    use bopline_core::value::Value;

    fn x() -> Var {
        Var::named("chunk_x")
    }

    fn y() -> Var {
        Var::named("chunk_y")
    }

    fn sample() -> Chunk {
        chunk_of((1..=5i64).map(|i| BindingSet::new().with(x(), i).with(y(), i * 10)).collect())
    }

    #[test]
    fn test_fast_path_returns_same_allocation() {
        let chunk = sample();
        assert!(Arc::ptr_eq(&apply_constraints(&chunk, None, None), &chunk));
        assert!(Arc::ptr_eq(&apply_constraints(&chunk, None, Some(&[][..])), &chunk));
    }

    #[test]
    fn test_filter_preserves_order() {
        let chunk = sample();
        let above_two = [Constraint::gt(BOp::var(x()), BOp::constant(2i64))];
        let out = apply_constraints(&chunk, None, Some(&above_two[..]));
        let xs: Vec<_> = out.iter().map(|bs| bs.get(x()).cloned()).collect();
        assert_eq!(
            xs,
            vec![Some(Value::Int(3)), Some(Value::Int(4)), Some(Value::Int(5))]
        );
    }

    #[test]
    fn test_projection_only_copies() {
        let chunk = sample();
        let out = apply_constraints(&chunk, Some(&[y()][..]), None);
        assert!(!Arc::ptr_eq(&out, &chunk));
        assert_eq!(out.len(), 5);
        assert!(out.iter().all(|bs| bs.len() == 1 && !bs.is_bound(x())));
    }

    #[test]
    fn test_join_conflict_and_extension() {
        let left = BindingSet::new().with(x(), Value::Term(1));
        let agree = BindingSet::new().with(x(), Value::Term(1)).with(y(), Value::Term(2));
        let clash = BindingSet::new().with(x(), Value::Term(9));

        let joined = join_solutions(&left, &agree, None, None).unwrap();
        assert_eq!(joined.get(y()), Some(&Value::Term(2)));
        assert!(join_solutions(&left, &clash, None, None).is_none());

        let projected = join_solutions(&left, &agree, None, Some(&[y()][..])).unwrap();
        assert_eq!(projected.len(), 1);
    }

    #[test]
    fn test_join_applies_constraints() {
        let left = BindingSet::new().with(x(), Value::Term(1));
        let right = BindingSet::new().with(y(), Value::Term(2));
        let never = [Constraint::bound(Var::named("chunk_missing"))];
        assert!(join_solutions(&left, &right, Some(&never[..]), None).is_none());
    }
}
