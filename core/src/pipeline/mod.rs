// orderflow/src/pipeline/mod.rs

//! A small step pipeline used to orchestrate every write path of the order lifecycle.
//!
//! Each workflow (checkout, status transition, reminder sweep) declares an ordered list of
//! named steps over a shared `ContextData<TData>`. Steps marked optional host best-effort
//! side effects: a failing optional step is logged and the pipeline keeps going.

pub mod context_data;
pub mod control;
pub mod definition;
pub mod execution;

pub use context_data::ContextData;
pub use control::{PipelineControl, PipelineResult};
pub use definition::{Handler, Pipeline, SkipCondition, StepDef};
