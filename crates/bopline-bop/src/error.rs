use bopline_core::id::BopId;
use thiserror::Error;

/// Result type local to bopline-bop.
pub type Result<T> = std::result::Result<T, PlanError>;

/// Malformed operator trees. These abort plan compilation and are never
/// recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("operator has no bopId: {0}")]
    MissingId(String),

    #[error("duplicate bopId {id} for {first} and {second}")]
    DuplicateId {
        id: BopId,
        first: String,
        second: String,
    },

    #[error("bopId must be an integer in u32 range, not {found}")]
    BadIdType { found: String },

    #[error("not a pipeline operator: {0}")]
    NotPipelineOp(String),

    #[error("required property '{name}' missing on {op}")]
    MissingProperty { name: String, op: String },

    #[error("property '{name}' must be {expected}, not {found}")]
    BadPropertyType {
        name: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("unsupported operator configuration: {0}")]
    Unsupported(String),

    #[error("not a predicate: {0}")]
    NotPredicate(String),

    #[error("not a constraint: {0}")]
    NotConstraint(String),

    #[error("sink {0} is not an operator of this plan")]
    UnknownSink(BopId),

    #[error("operator spine deeper than {limit}")]
    TooDeep { limit: usize },
}
