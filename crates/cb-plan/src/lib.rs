//! Pipeline plans and the executor interface.
//!
//! A plan is an ordered list of tasks whose `deps` reference earlier
//! entries only; pipelines are named bundles that expand to plan templates.
//! Executors are the pluggable analyses: pure, deterministic functions from
//! `(config, files, prior outputs)` to output drafts, registered by task
//! `type`.
//!
//! # Key Types
//!
//! - [`Plan`] / [`TaskSpec`] — The persisted `plan.json` shape
//! - [`Executor`] / [`ExecutorContext`] — The seam external analyses implement
//! - [`ExecutorRegistry`] — Maps task `type` to executor
//! - [`pipeline`] — Built-in pipeline templates

pub mod error;
pub mod executor;
pub mod model;
pub mod pipeline;
pub mod registry;

pub use error::{PlanError, PlanResult};
pub use executor::{Executor, ExecutorContext};
pub use model::{Plan, TaskSpec};
pub use pipeline::PipelineDef;
pub use registry::ExecutorRegistry;
