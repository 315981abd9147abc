//! The generic streaming operator: filter, project and forward.

use std::sync::Arc;

use bopline_bop::annotations::names;
use bopline_bop::constraint::constraints_of;
use bopline_bop::{BOp, Constraint};
use bopline_core::id::BopId;
use bopline_core::var::Var;

use crate::chunks::copy;
use crate::context::{close_all, BopContext};
use crate::error::Result;
use crate::operator::{OpFuture, PipelineOperator};

/// Copies its source to its sink (and alternate sink), applying the
/// `constraints` and `select` annotations on the way.
#[derive(Debug, Clone)]
pub struct CopyOp {
    id: BopId,
    select: Option<Vec<Var>>,
    constraints: Option<Vec<Constraint>>,
}

impl CopyOp {
    pub const NAME: &'static str = "Copy";

    pub fn from_bop(bop: &BOp) -> Result<Self> {
        Ok(Self {
            id: bop.id()?,
            select: bop.vars_property(names::SELECT)?.map(<[Var]>::to_vec),
            constraints: constraints_of(bop)?,
        })
    }
}

impl PipelineOperator for CopyOp {
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
                ..
            } = ctx;
            let result: Result<()> = async {
                let units = copy(
                    &mut source,
                    &sink,
                    sink2.as_ref(),
                    self.select.as_deref(),
                    self.constraints.as_deref(),
                    &stats,
                )
                .await?;
                sink.flush()?;
                if let Some(sink2) = &sink2 {
                    sink2.flush()?;
                }
                tracing::debug!(bop = %self.id, units, "copy finished");
                Ok(())
            }
            .await;
            close_all(&mut source, &sink, sink2.as_ref());
            result
        })
    }
}
