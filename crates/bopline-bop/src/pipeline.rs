//! Pipeline operators: construction and the routing annotations they carry.

use std::sync::Arc;

use bopline_core::id::{BopId, GroupId};

use crate::annotations::{names, Annotation, Annotations};
use crate::error::{PlanError, Result};
use crate::node::{BOp, BOpKind, BOpRef};

/// Builds a pipeline operator node.
///
/// ```
/// use bopline_bop::PipelineOpBuilder;
/// use bopline_core::id::BopId;
///
/// let start = PipelineOpBuilder::new("Copy", BopId::new(1)).build();
/// let join = PipelineOpBuilder::new("Copy", BopId::new(2)).arg(start).build();
/// assert_eq!(join.arity(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct PipelineOpBuilder {
    name: String,
    args: Vec<BOpRef>,
    annotations: Annotations,
}

impl PipelineOpBuilder {
    pub fn new(name: impl Into<String>, id: BopId) -> Self {
        Self::without_id(name).annotate(names::BOP_ID, i64::from(id.get()))
    }

    /// A builder with no `bopId`. Such nodes are rejected by indexing.
    pub fn without_id(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            annotations: Annotations::new(),
        }
    }

    pub fn arg(mut self, child: BOpRef) -> Self {
        self.args.push(child);
        self
    }

    pub fn controller(self, yes: bool) -> Self {
        self.annotate(names::CONTROLLER, yes)
    }

    pub fn sink_ref(self, id: BopId) -> Self {
        self.annotate(names::SINK_REF, i64::from(id.get()))
    }

    pub fn alt_sink_ref(self, id: BopId) -> Self {
        self.annotate(names::ALT_SINK_REF, i64::from(id.get()))
    }

    pub fn conditional_group(self, group: GroupId) -> Self {
        self.annotate(names::CONDITIONAL_GROUP, i64::from(group.get()))
    }

    pub fn chunk_capacity(self, capacity: usize) -> Self {
        self.annotate(
            names::CHUNK_CAPACITY,
            i64::try_from(capacity).unwrap_or(i64::MAX),
        )
    }

    pub fn annotate(mut self, name: &str, value: impl Into<Annotation>) -> Self {
        self.annotations.insert(name, value);
        self
    }

    pub fn build(self) -> BOpRef {
        Arc::new(BOp::new(
            BOpKind::Pipeline(self.name),
            self.args,
            self.annotations,
        ))
    }
}

impl BOp {
    fn id_property(&self, name: &str) -> Result<Option<BopId>> {
        match self.int_property(name)? {
            None => Ok(None),
            Some(i) => BopId::from_i64(i)
                .map(Some)
                .ok_or_else(|| PlanError::BadIdType {
                    found: format!("{name}={i}"),
                }),
        }
    }

    /// Explicit default-sink override.
    pub fn sink_ref(&self) -> Result<Option<BopId>> {
        self.id_property(names::SINK_REF)
    }

    /// Alternative sink, fed by operators that route a second output stream.
    pub fn alt_sink_ref(&self) -> Result<Option<BopId>> {
        self.id_property(names::ALT_SINK_REF)
    }

    /// Conditional group membership. Must be an integer when present.
    pub fn conditional_group(&self) -> Result<Option<GroupId>> {
        match self.int_property(names::CONDITIONAL_GROUP)? {
            None => Ok(None),
            Some(i) => GroupId::from_i64(i)
                .map(Some)
                .ok_or_else(|| PlanError::BadPropertyType {
                    name: names::CONDITIONAL_GROUP.to_string(),
                    expected: "u32 group id",
                    found: "int",
                }),
        }
    }

    pub fn chunk_capacity(&self, default: usize) -> Result<usize> {
        match self.int_property(names::CHUNK_CAPACITY)? {
            None => Ok(default),
            Some(i) if i > 0 => Ok(usize::try_from(i).unwrap_or(usize::MAX)),
            Some(_) => Err(PlanError::BadPropertyType {
                name: names::CHUNK_CAPACITY.to_string(),
                expected: "positive int",
                found: "int",
            }),
        }
    }
}
