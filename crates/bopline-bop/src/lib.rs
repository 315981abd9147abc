#![forbid(unsafe_code)]
//! bopline-bop: the operator ("BOp") tree and everything that reasons about it.
//!
//! - `node`/`annotations`: immutable operator nodes with a typed annotation bag.
//! - `pipeline`/`predicate`/`constraint`: the node flavours the pipeline uses.
//! - `binding`/`chunk`: per-solution binding sets and chunk-level filtering.
//! - `traverse`/`analysis`: lazy traversals, id indexing, evaluation order,
//!   variable scope and sink resolution.
//!
//! Everything here is synchronous and side-effect free; the exec crate drives it.

pub mod analysis;
pub mod annotations;
pub mod binding;
pub mod chunk;
pub mod constraint;
pub mod error;
pub mod node;
pub mod pipeline;
pub mod predicate;
pub mod traverse;

pub use analysis::BopIndex;
pub use annotations::{names, Annotation, Annotations};
pub use binding::BindingSet;
pub use chunk::Chunk;
pub use constraint::Constraint;
pub use error::{PlanError, Result};
pub use node::{BOp, BOpKind, BOpRef, ExprOp};
pub use pipeline::PipelineOpBuilder;
pub use predicate::{Predicate, PredicateBuilder};
