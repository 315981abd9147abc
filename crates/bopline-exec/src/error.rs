use bopline_access::AccessError;
use bopline_bop::PlanError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ExecError>;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Core(#[from] bopline_core::error::Error),

    #[error("sink closed")]
    SinkClosed,

    #[error("chunk of {chunk_len} overruns {target_len}-element array at offset {offset}")]
    Bounds {
        chunk_len: usize,
        target_len: usize,
        offset: usize,
    },

    #[error("invariant violated: {0}")]
    Invariant(String),

    #[error("operator registry: {0}")]
    Registry(String),

    #[error("operator task: {0}")]
    Task(String),

    #[error("serialization: {0}")]
    Serde(#[from] serde_json::Error),
}
