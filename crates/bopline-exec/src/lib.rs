#![forbid(unsafe_code)]
//! bopline-exec: the streaming side of the engine.
//!
//! Operators run as independent tokio tasks connected by bounded buffers.
//! Each one drains an [`buffer::AsyncSource`], writes to one or two
//! [`buffer::BlockingBuffer`] sinks and always closes both ends when it
//! stops, on success and on error alike. [`runtime::QueryEngine`] compiles
//! an operator tree into that wiring and collects the root's output.

pub mod buffer;
pub mod chunks;
pub mod context;
pub mod copy_op;
pub mod distinct_scan;
pub mod error;
pub mod metrics;
pub mod operator;
pub mod registry;
pub mod runtime;
pub mod stats;

pub use buffer::{bounded, AsyncSource, BlockingBuffer, UnsyncLocalOutputBuffer};
pub use context::BopContext;
pub use copy_op::CopyOp;
pub use distinct_scan::DistinctTermScanOp;
pub use error::{ExecError, Result};
pub use operator::{OpFuture, PipelineOperator};
pub use registry::Registry;
pub use runtime::{CompiledPlan, QueryEngine, QueryResult};
pub use stats::{BopStats, StatsSnapshot};
