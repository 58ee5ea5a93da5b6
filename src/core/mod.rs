//! Core domain models for the runner
//!
//! This module defines the fundamental data structures that represent
//! pipelines, stages, steps, and the records of a run.

pub mod config;
pub mod context;
pub mod pipeline;
pub mod stage;
pub mod state;
pub mod step;

pub use context::*;
pub use pipeline::*;
pub use stage::*;
pub use state::*;
pub use step::*;
