//! Operator registry: maps pipeline operator names to constructors.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bopline_bop::BOp;

use crate::copy_op::CopyOp;
use crate::distinct_scan::DistinctTermScanOp;
use crate::error::{ExecError, Result};
use crate::operator::PipelineOperator;

pub type OperatorFactory = fn(&BOp) -> Result<Arc<dyn PipelineOperator>>;

#[derive(Clone)]
pub struct Registry {
    factories: HashMap<String, OperatorFactory>,
}

impl Registry {
    /// A registry with the built-in operators.
    pub fn new() -> Self {
        let mut reg = Self::empty();
        reg.register(CopyOp::NAME, copy_op);
        reg.register(DistinctTermScanOp::NAME, distinct_term_scan);
        reg
    }

    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: &str, factory: OperatorFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Build the operator for a pipeline node.
    pub fn instantiate(&self, bop: &BOp) -> Result<Arc<dyn PipelineOperator>> {
        let factory = self
            .factories
            .get(bop.name())
            .ok_or_else(|| ExecError::Registry(format!("no operator named {}", bop.name())))?;
        factory(bop)
    }
}

fn copy_op(bop: &BOp) -> Result<Arc<dyn PipelineOperator>> {
    Ok(Arc::new(CopyOp::from_bop(bop)?))
}

fn distinct_term_scan(bop: &BOp) -> Result<Arc<dyn PipelineOperator>> {
    Ok(Arc::new(DistinctTermScanOp::from_bop(bop)?))
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("operators", &names).finish()
    }
}
