//! # EnGen
//!
//! A stage-gated workflow that turns an architecture diagram into
//! documentation, component specifications and deployment artifacts.
//!
//! Five stages run strictly in order:
//!
//! 1. diagram validation
//! 2. document generation
//! 3. component specification
//! 4. artifact generation
//! 5. human verification
//!
//! Every stage output carries a score. The gate auto-approves scores at or
//! above the threshold and escalates the rest to a human reviewer; the next
//! stage only runs once the previous one is approved, and a rejection ends
//! the run.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use engen::prelude::*;
//!
//! let services = Services::in_memory();
//! let workflow = WorkflowBuilder::new()
//!     .processors(standard_processors(&services, Arc::new(PayloadFieldScorer::default())))
//!     .with_policy(GatePolicy::new())
//!     .with_reviewer(Arc::new(ReviewDesk::new()))
//!     .build()?;
//!
//! let report = workflow.run(serde_json::json!({"bucket": "uploads", "name": "shop.png"})).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod core;
pub mod errors;
pub mod events;
pub mod gate;
pub mod review;
pub mod services;
pub mod stages;
pub mod testing;
pub mod utils;
pub mod workflow;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{EngenConfig, GateConfig, ReviewConfig};
    pub use crate::core::{ReviewStatus, RunStatus, Score, StageId, WorkflowEvent};
    pub use crate::errors::{
        ConfigError, EngenError, GateError, ProcessorError, ReviewError, ServiceError,
        WorkflowValidationError,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::gate::{decide, GateDecision, GatePhase, GatePolicy, StageGate};
    pub use crate::review::{
        AutoReviewer, ReviewDecision, ReviewDesk, ReviewLedger, ReviewRequest, Reviewer,
        ScriptedReviewer, Verdict,
    };
    pub use crate::services::Services;
    pub use crate::stages::{
        standard_processors, PayloadFieldScorer, Scorer, StageInput, StageOutput, StageProcessor,
        StageResult,
    };
    pub use crate::workflow::{
        WorkflowBuilder, WorkflowController, WorkflowOutcome, WorkflowReport, WorkflowState,
    };
    pub use std::sync::Arc;
}
