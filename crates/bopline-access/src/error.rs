use bopline_bop::PlanError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AccessError>;

#[derive(Debug, Error)]
pub enum AccessError {
    #[error("unknown relation: {0}")]
    UnknownRelation(String),

    #[error("relation {relation} has no key order {key_order}")]
    UnknownKeyOrder { relation: String, key_order: String },

    #[error("no index for key order {0}")]
    NoIndex(String),

    #[error("relation {relation} has arity {expected}, got {found}")]
    Arity {
        relation: String,
        expected: usize,
        found: usize,
    },

    #[error("key decode: {0}")]
    KeyDecode(String),

    #[error(transparent)]
    Plan(#[from] PlanError),
}
