//! The stage gate.
//!
//! A gate compares a stage's score against a threshold. Passing scores
//! advance the workflow on their own; everything else is escalated to a
//! human reviewer and the stage stays suspended until a verdict arrives.

mod decision;
mod phase;
mod policy;

pub use decision::{decide, decide_raw, GateDecision};
pub use phase::{GatePhase, GateSignal, StageGate};
pub use policy::{GateEvaluation, GatePolicy, DEFAULT_THRESHOLD};
