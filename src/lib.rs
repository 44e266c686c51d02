// src/lib.rs
pub mod config;
pub mod utils;
pub mod workflows;
pub mod pipelines;
pub mod cli;
pub use cli::{Arguments, PipelineKind};
pub use config::defs::{PipelineError, Settings};
pub use pipelines::{Pipeline, PipelinePlan};
