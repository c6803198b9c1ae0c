//! Workflow assembly and execution.
//!
//! This module provides:
//! - The per-run workflow state
//! - A builder that validates the stage wiring
//! - The sequential, gated controller

mod builder;
mod controller;
mod state;

pub use builder::WorkflowBuilder;
pub use controller::{WorkflowController, WorkflowOutcome, WorkflowReport};
pub use state::WorkflowState;
