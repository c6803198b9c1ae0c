//! Testing utilities for engen workflows.
//!
//! This module provides:
//! - Mock stage processors
//! - Object stores with simulated outages
//! - Assertions over workflow state

mod assertions;
mod mocks;
mod stores;

pub use assertions::{assert_reachable_stages, assert_stage_status, assert_stages_committed};
pub use mocks::{mock_processors, FailingProcessor, MockProcessor};
pub use stores::OutageObjectStore;
