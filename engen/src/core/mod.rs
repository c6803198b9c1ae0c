//! Core domain model types for engen.
//!
//! This module contains the fundamental types used throughout the crate:
//! - Stage ordinals and validated scores
//! - Review and run status enums
//! - Workflow events

mod event;
mod score;
mod stage_id;
mod status;

pub use event::WorkflowEvent;
pub use score::Score;
pub use stage_id::StageId;
pub use status::{ReviewStatus, RunStatus};
