//! Immutable operator nodes.
//!
//! A plan is a tree of `BOpRef`s. Nodes never change after construction;
//! "modifying" a node builds a new one (`with_annotation`, `deep_copy`).
//! Variable nodes are interned, so every occurrence of `?x` in a process is
//! the same allocation and identity comparisons work across subtrees.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use bopline_core::id::BopId;
use bopline_core::value::Value;
use bopline_core::var::Var;
use once_cell::sync::Lazy;

use crate::annotations::{names, Annotation, Annotations};
use crate::error::{PlanError, Result};

pub type BOpRef = Arc<BOp>;

/// Operators usable inside constraint expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExprOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Bound,
    Not,
    And,
    Or,
}

impl ExprOp {
    pub fn name(self) -> &'static str {
        match self {
            ExprOp::Eq => "EQ",
            ExprOp::Ne => "NE",
            ExprOp::Lt => "LT",
            ExprOp::Le => "LE",
            ExprOp::Gt => "GT",
            ExprOp::Ge => "GE",
            ExprOp::Bound => "BOUND",
            ExprOp::Not => "NOT",
            ExprOp::And => "AND",
            ExprOp::Or => "OR",
        }
    }
}

#[derive(Debug, Clone)]
pub enum BOpKind {
    Var(Var),
    Constant(Value),
    /// A pipeline operator, named by the operator type it evaluates as.
    Pipeline(String),
    Predicate,
    Expr(ExprOp),
}

#[derive(Debug, Clone)]
pub struct BOp {
    kind: BOpKind,
    args: Vec<BOpRef>,
    annotations: Annotations,
}

/// One shared node per interned variable. Like the variable registry it only
/// grows, one entry per variable ever turned into a node.
static VAR_NODES: Lazy<Mutex<HashMap<Var, BOpRef>>> = Lazy::new(|| Mutex::new(HashMap::new()));

impl BOp {
    pub fn new(kind: BOpKind, args: Vec<BOpRef>, annotations: Annotations) -> BOp {
        BOp {
            kind,
            args,
            annotations,
        }
    }

    /// The shared node for `v`.
    pub fn var(v: Var) -> BOpRef {
        let mut nodes = VAR_NODES.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(
            nodes
                .entry(v)
                .or_insert_with(|| Arc::new(BOp::new(BOpKind::Var(v), Vec::new(), Annotations::new()))),
        )
    }

    pub fn constant(value: impl Into<Value>) -> BOpRef {
        Arc::new(BOp::new(
            BOpKind::Constant(value.into()),
            Vec::new(),
            Annotations::new(),
        ))
    }

    pub fn kind(&self) -> &BOpKind {
        &self.kind
    }

    pub fn name(&self) -> &str {
        match &self.kind {
            BOpKind::Var(_) => "Var",
            BOpKind::Constant(_) => "Constant",
            BOpKind::Pipeline(name) => name,
            BOpKind::Predicate => "Predicate",
            BOpKind::Expr(op) => op.name(),
        }
    }

    pub fn arity(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &[BOpRef] {
        &self.args
    }

    pub fn arg_at(&self, index: usize) -> Option<&BOpRef> {
        self.args.get(index)
    }

    pub fn annotations(&self) -> &Annotations {
        &self.annotations
    }

    pub fn is_pipeline(&self) -> bool {
        matches!(self.kind, BOpKind::Pipeline(_))
    }

    pub fn as_var(&self) -> Option<Var> {
        match self.kind {
            BOpKind::Var(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_constant(&self) -> Option<&Value> {
        match &self.kind {
            BOpKind::Constant(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_leaf_term(&self) -> bool {
        matches!(self.kind, BOpKind::Var(_) | BOpKind::Constant(_))
    }

    pub fn property(&self, name: &str) -> Option<&Annotation> {
        self.annotations.get(name)
    }

    pub fn required_property(&self, name: &str) -> Result<&Annotation> {
        self.annotations
            .get(name)
            .ok_or_else(|| PlanError::MissingProperty {
                name: name.to_string(),
                op: self.label(),
            })
    }

    pub fn bool_property(&self, name: &str, default: bool) -> Result<bool> {
        match self.property(name) {
            None => Ok(default),
            Some(Annotation::Bool(b)) => Ok(*b),
            Some(other) => Err(bad_type(name, "bool", other)),
        }
    }

    pub fn int_property(&self, name: &str) -> Result<Option<i64>> {
        match self.property(name) {
            None => Ok(None),
            Some(Annotation::Int(i)) => Ok(Some(*i)),
            Some(other) => Err(bad_type(name, "int", other)),
        }
    }

    pub fn str_property(&self, name: &str) -> Result<Option<&str>> {
        match self.property(name) {
            None => Ok(None),
            Some(Annotation::Str(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(bad_type(name, "str", other)),
        }
    }

    pub fn op_property(&self, name: &str) -> Result<Option<&BOpRef>> {
        match self.property(name) {
            None => Ok(None),
            Some(Annotation::Op(op)) => Ok(Some(op)),
            Some(other) => Err(bad_type(name, "op", other)),
        }
    }

    /// A list of operators; a single `Op` entry reads as a list of one.
    pub fn ops_property(&self, name: &str) -> Result<Option<&[BOpRef]>> {
        match self.property(name) {
            None => Ok(None),
            Some(a @ (Annotation::Op(_) | Annotation::Ops(_))) => Ok(Some(a.ops())),
            Some(other) => Err(bad_type(name, "ops", other)),
        }
    }

    pub fn vars_property(&self, name: &str) -> Result<Option<&[Var]>> {
        match self.property(name) {
            None => Ok(None),
            Some(Annotation::Vars(vars)) => Ok(Some(vars.as_slice())),
            Some(other) => Err(bad_type(name, "vars", other)),
        }
    }

    /// The `bopId` annotation.
    pub fn id(&self) -> Result<BopId> {
        match self.property(names::BOP_ID) {
            None => Err(PlanError::MissingId(self.label())),
            Some(Annotation::Int(i)) => BopId::from_i64(*i).ok_or_else(|| PlanError::BadIdType {
                found: format!("int {i}"),
            }),
            Some(other) => Err(PlanError::BadIdType {
                found: other.type_name().to_string(),
            }),
        }
    }

    pub fn is_controller(&self) -> Result<bool> {
        self.bool_property(names::CONTROLLER, false)
    }

    /// A copy of this node with `name` set. Arguments stay shared.
    pub fn with_annotation(&self, name: &str, value: impl Into<Annotation>) -> BOp {
        let mut copy = self.clone();
        copy.annotations.insert(name, value);
        copy
    }

    /// Structural copy of the whole subtree, annotation operators included.
    /// Variable nodes stay interned.
    pub fn deep_copy(&self) -> BOp {
        let copy_child = |child: &BOpRef| match child.kind {
            BOpKind::Var(v) => BOp::var(v),
            _ => Arc::new(child.deep_copy()),
        };
        BOp {
            kind: self.kind.clone(),
            args: self.args.iter().map(&copy_child).collect(),
            annotations: self.annotations.map_ops(&copy_child),
        }
    }

    /// One-line rendering without arguments: `Name[k=v, ...]`.
    pub fn label(&self) -> String {
        match &self.kind {
            BOpKind::Var(v) => v.to_string(),
            BOpKind::Constant(c) => c.to_string(),
            _ if self.annotations.is_empty() => self.name().to_string(),
            _ => {
                let anns: Vec<String> = self
                    .annotations
                    .iter()
                    .map(|(k, v)| format!("{k}={}", render_annotation(v)))
                    .collect();
                format!("{}[{}]", self.name(), anns.join(", "))
            }
        }
    }
}

fn bad_type(name: &str, expected: &'static str, found: &Annotation) -> PlanError {
    PlanError::BadPropertyType {
        name: name.to_string(),
        expected,
        found: found.type_name(),
    }
}

fn render_annotation(a: &Annotation) -> String {
    fn list<T: fmt::Display>(items: &[T]) -> String {
        let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
        format!("[{}]", parts.join(", "))
    }
    match a {
        Annotation::Bool(b) => b.to_string(),
        Annotation::Int(i) => i.to_string(),
        Annotation::Str(s) => s.clone(),
        Annotation::Value(v) => v.to_string(),
        Annotation::Vars(vars) => list(vars),
        Annotation::Op(op) => op.to_string(),
        Annotation::Ops(ops) => list(ops),
    }
}

impl fmt::Display for BOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())?;
        if self.is_leaf_term() || self.args.is_empty() {
            return Ok(());
        }
        f.write_str("(")?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{arg}")?;
        }
        f.write_str(")")
    }
}
