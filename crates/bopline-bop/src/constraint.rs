//! Boolean constraints evaluated against binding sets.
//!
//! Comparisons are two-valued: a comparison touching an unbound variable is
//! false, and values of incompatible types are simply unequal.

use std::cmp::Ordering;
use std::sync::Arc;

use bopline_core::value::Value;
use bopline_core::var::Var;

use crate::annotations::{names, Annotations};
use crate::binding::BindingSet;
use crate::error::{PlanError, Result};
use crate::node::{BOp, BOpKind, BOpRef, ExprOp};

#[derive(Debug, Clone)]
pub struct Constraint(BOpRef);

impl Constraint {
    /// Wrap an expression node. Constant booleans are accepted as trivial
    /// constraints.
    pub fn new(bop: BOpRef) -> Result<Self> {
        match bop.kind() {
            BOpKind::Expr(_) | BOpKind::Constant(Value::Bool(_)) => Ok(Constraint(bop)),
            _ => Err(PlanError::NotConstraint(bop.label())),
        }
    }

    fn expr(op: ExprOp, args: Vec<BOpRef>) -> Constraint {
        Constraint(Arc::new(BOp::new(BOpKind::Expr(op), args, Annotations::new())))
    }

    pub fn eq(left: BOpRef, right: BOpRef) -> Constraint {
        Self::expr(ExprOp::Eq, vec![left, right])
    }

    pub fn ne(left: BOpRef, right: BOpRef) -> Constraint {
        Self::expr(ExprOp::Ne, vec![left, right])
    }

    pub fn lt(left: BOpRef, right: BOpRef) -> Constraint {
        Self::expr(ExprOp::Lt, vec![left, right])
    }

    pub fn le(left: BOpRef, right: BOpRef) -> Constraint {
        Self::expr(ExprOp::Le, vec![left, right])
    }

    pub fn gt(left: BOpRef, right: BOpRef) -> Constraint {
        Self::expr(ExprOp::Gt, vec![left, right])
    }

    pub fn ge(left: BOpRef, right: BOpRef) -> Constraint {
        Self::expr(ExprOp::Ge, vec![left, right])
    }

    pub fn bound(var: Var) -> Constraint {
        Self::expr(ExprOp::Bound, vec![BOp::var(var)])
    }

    pub fn not(inner: Constraint) -> Constraint {
        Self::expr(ExprOp::Not, vec![inner.0])
    }

    pub fn and(left: Constraint, right: Constraint) -> Constraint {
        Self::expr(ExprOp::And, vec![left.0, right.0])
    }

    pub fn or(left: Constraint, right: Constraint) -> Constraint {
        Self::expr(ExprOp::Or, vec![left.0, right.0])
    }

    pub fn bop(&self) -> &BOpRef {
        &self.0
    }

    pub fn accept(&self, bindings: &BindingSet) -> bool {
        eval(&self.0, bindings)
    }
}

impl From<Constraint> for BOpRef {
    fn from(c: Constraint) -> Self {
        c.0
    }
}

/// The `constraints` annotation of `op`, if present.
pub fn constraints_of(op: &BOp) -> Result<Option<Vec<Constraint>>> {
    op.ops_property(names::CONSTRAINTS)?
        .map(|ops| ops.iter().cloned().map(Constraint::new).collect::<Result<Vec<_>>>())
        .transpose()
}

fn resolve<'a>(node: &'a BOp, bindings: &'a BindingSet) -> Option<&'a Value> {
    match node.kind() {
        BOpKind::Var(v) => bindings.get(*v),
        BOpKind::Constant(c) => Some(c),
        _ => None,
    }
}

fn eval(node: &BOp, bindings: &BindingSet) -> bool {
    let op = match node.kind() {
        BOpKind::Expr(op) => *op,
        BOpKind::Constant(Value::Bool(b)) => return *b,
        _ => return false,
    };
    let args = node.args();
    let operand = |i: usize| args.get(i).and_then(|a| resolve(a, bindings));
    let ordering = || match (operand(0), operand(1)) {
        (Some(l), Some(r)) => Ok(l.compare(r)),
        _ => Err(()),
    };
    match op {
        ExprOp::Eq => matches!(ordering(), Ok(Some(Ordering::Equal))),
        ExprOp::Ne => matches!(ordering(), Ok(Some(Ordering::Less | Ordering::Greater)) | Ok(None)),
        ExprOp::Lt => matches!(ordering(), Ok(Some(Ordering::Less))),
        ExprOp::Le => matches!(ordering(), Ok(Some(Ordering::Less | Ordering::Equal))),
        ExprOp::Gt => matches!(ordering(), Ok(Some(Ordering::Greater))),
        ExprOp::Ge => matches!(ordering(), Ok(Some(Ordering::Greater | Ordering::Equal))),
        ExprOp::Bound => operand(0).is_some(),
        ExprOp::Not => args.first().map_or(false, |a| !eval(a, bindings)),
        ExprOp::And => args.iter().all(|a| eval(a, bindings)),
        ExprOp::Or => args.iter().any(|a| eval(a, bindings)),
    }
}
