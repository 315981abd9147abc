//! The contract every pipeline operator implements.

use std::fmt;
use std::sync::Arc;

use bopline_core::id::BopId;
use futures::future::BoxFuture;

use crate::context::BopContext;
use crate::error::Result;

/// The unit of work returned by [`PipelineOperator::eval`].
pub type OpFuture = BoxFuture<'static, Result<()>>;

/// A pipeline operator instance, built once per compiled plan.
///
/// Invariants:
/// - `eval` consumes its context and must close the source and every sink
///   before the future resolves, whatever the outcome.
/// - Output order follows input order within one invocation.
pub trait PipelineOperator: Send + Sync + fmt::Debug + 'static {
    /// Stable operator name, as used by the registry.
    fn name(&self) -> &'static str;

    fn id(&self) -> BopId;

    fn eval(self: Arc<Self>, ctx: BopContext) -> OpFuture;
}
