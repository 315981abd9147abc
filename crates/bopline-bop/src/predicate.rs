//! Access-path predicates: a relation name plus one term per key position.

use std::sync::Arc;

use bopline_core::value::Value;
use bopline_core::var::Var;

use crate::annotations::{names, Annotation, Annotations};
use crate::binding::BindingSet;
use crate::error::{PlanError, Result};
use crate::node::{BOp, BOpKind, BOpRef};

/// A `Predicate` node whose arguments are all variables or constants.
#[derive(Debug, Clone)]
pub struct Predicate(BOpRef);

impl Predicate {
    pub fn new(bop: BOpRef) -> Result<Self> {
        if !matches!(bop.kind(), BOpKind::Predicate) || !bop.args().iter().all(|a| a.is_leaf_term())
        {
            return Err(PlanError::NotPredicate(bop.label()));
        }
        Ok(Predicate(bop))
    }

    pub fn builder(relation: &str) -> PredicateBuilder {
        PredicateBuilder {
            terms: Vec::new(),
            annotations: Annotations::new().with(names::RELATION_NAME, relation),
        }
    }

    pub fn bop(&self) -> &BOpRef {
        &self.0
    }

    pub fn arity(&self) -> usize {
        self.0.arity()
    }

    pub fn terms(&self) -> &[BOpRef] {
        self.0.args()
    }

    pub fn relation_name(&self) -> Result<&str> {
        match self.0.required_property(names::RELATION_NAME)? {
            Annotation::Str(s) => Ok(s.as_str()),
            other => Err(PlanError::BadPropertyType {
                name: names::RELATION_NAME.to_string(),
                expected: "str",
                found: other.type_name(),
            }),
        }
    }

    pub fn is_optional(&self) -> Result<bool> {
        self.0.bool_property(names::OPTIONAL, false)
    }

    /// Name of an explicitly requested key order, if any.
    pub fn key_order(&self) -> Result<Option<&str>> {
        self.0.str_property(names::KEY_ORDER)
    }

    pub fn has_index_local_filter(&self) -> bool {
        self.0.annotations().contains(names::INDEX_LOCAL_FILTER)
    }

    pub fn has_access_path_filter(&self) -> bool {
        self.0.annotations().contains(names::ACCESS_PATH_FILTER)
    }

    pub fn position_of(&self, var: Var) -> Option<usize> {
        self.terms().iter().position(|t| t.as_var() == Some(var))
    }

    pub fn with_key_order(&self, name: &str) -> Predicate {
        Predicate(Arc::new(self.0.with_annotation(names::KEY_ORDER, name)))
    }

    /// Substitute every variable bound in `bindings` by a constant.
    ///
    /// Returns `None` when a position would hold a value that cannot be an
    /// index key; no solution of such a predicate can exist in the index.
    pub fn as_bound(&self, bindings: &BindingSet) -> Option<Predicate> {
        let mut terms = Vec::with_capacity(self.arity());
        for term in self.terms() {
            let bound = match term.kind() {
                BOpKind::Var(v) => match bindings.get(*v) {
                    Some(value) if value.is_term() => BOp::constant(value.clone()),
                    Some(_) => return None,
                    None => Arc::clone(term),
                },
                BOpKind::Constant(c) if !c.is_term() => return None,
                _ => Arc::clone(term),
            };
            terms.push(bound);
        }
        Some(Predicate(Arc::new(BOp::new(
            BOpKind::Predicate,
            terms,
            self.0.annotations().clone(),
        ))))
    }

    /// The term id at each position, `None` where still unbound.
    pub fn key_components(&self) -> Vec<Option<u64>> {
        self.terms()
            .iter()
            .map(|t| t.as_constant().and_then(Value::as_term))
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    terms: Vec<BOpRef>,
    annotations: Annotations,
}

impl PredicateBuilder {
    pub fn var(mut self, name: &str) -> Self {
        self.terms.push(BOp::var(Var::named(name)));
        self
    }

    pub fn term(mut self, id: u64) -> Self {
        self.terms.push(BOp::constant(Value::Term(id)));
        self
    }

    pub fn constant(mut self, value: Value) -> Self {
        self.terms.push(BOp::constant(value));
        self
    }

    pub fn optional(self, yes: bool) -> Self {
        self.annotate(names::OPTIONAL, yes)
    }

    pub fn key_order(self, name: &str) -> Self {
        self.annotate(names::KEY_ORDER, name)
    }

    pub fn index_local_filter(self, filter: BOpRef) -> Self {
        self.annotate(names::INDEX_LOCAL_FILTER, filter)
    }

    pub fn access_path_filter(self, filter: BOpRef) -> Self {
        self.annotate(names::ACCESS_PATH_FILTER, filter)
    }

    pub fn annotate(mut self, name: &str, value: impl Into<Annotation>) -> Self {
        self.annotations.insert(name, value);
        self
    }

    pub fn build(self) -> Predicate {
        Predicate(Arc::new(BOp::new(
            BOpKind::Predicate,
            self.terms,
            self.annotations,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_as_bound_substitutes_terms() {
        let s = Var::named("pred_s");
        let pred = Predicate::builder("spo").var("pred_s").term(7).var("pred_o").build();
        let bs = BindingSet::new().with(s, Value::Term(3));

        let bound = pred.as_bound(&bs).unwrap();
        assert_eq!(bound.key_components(), vec![Some(3), Some(7), None]);
        assert_eq!(bound.relation_name().unwrap(), "spo");
        assert_eq!(bound.position_of(Var::named("pred_o")), Some(2));
        // the input predicate is unchanged
        assert_eq!(pred.key_components(), vec![None, Some(7), None]);
    }

    #[test]
    fn test_as_bound_rejects_non_term_values() {
        let pred = Predicate::builder("spo").var("pred_ns").term(7).var("pred_no").build();
        let bs = BindingSet::new().with(Var::named("pred_ns"), Value::Int(3));
        assert!(pred.as_bound(&bs).is_none());
    }

    #[test]
    fn test_new_requires_predicate_node() {
        let not_pred = BOp::var(Var::named("pred_nx"));
        assert!(matches!(Predicate::new(not_pred), Err(PlanError::NotPredicate(_))));
    }

    #[test]
    fn test_filters_and_options() {
        let filter = BOp::constant(true);
        let pred = Predicate::builder("spo")
            .var("pred_f")
            .optional(true)
            .access_path_filter(filter)
            .build();
        assert!(pred.is_optional().unwrap());
        assert!(pred.has_access_path_filter());
        assert!(!pred.has_index_local_filter());
        assert_eq!(pred.key_order().unwrap(), None);
        assert_eq!(pred.with_key_order("POS").key_order().unwrap(), Some("POS"));
    }
}
