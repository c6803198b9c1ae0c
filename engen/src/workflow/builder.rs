//! Workflow builder with validation.

use super::WorkflowController;
use crate::core::StageId;
use crate::errors::WorkflowValidationError;
use crate::events::{EventSink, NoOpEventSink};
use crate::gate::GatePolicy;
use crate::review::{ReviewLedger, Reviewer};
use crate::stages::StageProcessor;
use std::sync::Arc;

/// Assembles a [`WorkflowController`] from its collaborators.
///
/// Every stage needs exactly one processor, and a reviewer must be set.
pub struct WorkflowBuilder {
    processors: Vec<Arc<dyn StageProcessor>>,
    policy: GatePolicy,
    reviewer: Option<Arc<dyn Reviewer>>,
    ledger: Arc<ReviewLedger>,
    event_sink: Arc<dyn EventSink>,
}

impl Default for WorkflowBuilder {
    fn default() -> Self {
        Self {
            processors: Vec::new(),
            policy: GatePolicy::default(),
            reviewer: None,
            ledger: Arc::new(ReviewLedger::new()),
            event_sink: Arc::new(NoOpEventSink),
        }
    }
}

impl WorkflowBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a stage processor.
    #[must_use]
    pub fn processor(mut self, processor: Arc<dyn StageProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// Adds several stage processors.
    #[must_use]
    pub fn processors(
        mut self,
        processors: impl IntoIterator<Item = Arc<dyn StageProcessor>>,
    ) -> Self {
        self.processors.extend(processors);
        self
    }

    /// Sets the gate policy.
    #[must_use]
    pub fn with_policy(mut self, policy: GatePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the reviewer escalations are sent to.
    #[must_use]
    pub fn with_reviewer(mut self, reviewer: Arc<dyn Reviewer>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    /// Sets the ledger completed reviews are recorded in.
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<ReviewLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = sink;
        self
    }

    /// Validates the configuration and builds the controller.
    ///
    /// # Errors
    ///
    /// Returns an error if a stage has no processor or more than one, or
    /// if no reviewer was set.
    pub fn build(self) -> Result<WorkflowController, WorkflowValidationError> {
        let mut slots: [Option<Arc<dyn StageProcessor>>; StageId::COUNT] = Default::default();
        let mut duplicates = Vec::new();
        for processor in self.processors {
            let stage = processor.stage_id();
            let slot = &mut slots[stage.index()];
            if slot.is_some() {
                duplicates.push(stage);
            } else {
                *slot = Some(processor);
            }
        }
        if !duplicates.is_empty() {
            let names: Vec<&str> = duplicates.iter().map(|s| s.as_str()).collect();
            return Err(WorkflowValidationError::new(format!(
                "Stages registered more than once: {}",
                names.join(", ")
            ))
            .with_stages(duplicates));
        }

        let missing: Vec<StageId> = StageId::ALL
            .into_iter()
            .filter(|stage| slots[stage.index()].is_none())
            .collect();
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|s| s.as_str()).collect();
            return Err(WorkflowValidationError::new(format!(
                "Stages without a processor: {}",
                names.join(", ")
            ))
            .with_stages(missing));
        }

        let reviewer = self
            .reviewer
            .ok_or_else(|| WorkflowValidationError::new("Workflow has no reviewer"))?;
        let processors = slots.into_iter().flatten().collect();

        Ok(WorkflowController::new(
            processors,
            self.policy,
            reviewer,
            self.ledger,
            self.event_sink,
        ))
    }
}

impl std::fmt::Debug for WorkflowBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowBuilder")
            .field("processors", &self.processors)
            .field("policy", &self.policy)
            .field("has_reviewer", &self.reviewer.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::review::AutoReviewer;
    use crate::testing::MockProcessor;

    fn processor(stage: StageId) -> Arc<dyn StageProcessor> {
        Arc::new(MockProcessor::passing(stage))
    }

    fn all_processors() -> Vec<Arc<dyn StageProcessor>> {
        StageId::ALL.into_iter().map(processor).collect()
    }

    #[test]
    fn test_build_complete_workflow() {
        let controller = WorkflowBuilder::new()
            .processors(all_processors())
            .with_reviewer(Arc::new(AutoReviewer::approving()))
            .build()
            .unwrap();
        assert_eq!(controller.stage_names(), StageId::ALL.map(StageId::as_str).to_vec());
    }

    #[test]
    fn test_order_of_registration_does_not_matter() {
        let mut processors = all_processors();
        processors.reverse();
        let controller = WorkflowBuilder::new()
            .processors(processors)
            .with_reviewer(Arc::new(AutoReviewer::approving()))
            .build()
            .unwrap();
        assert_eq!(controller.stage_names()[0], "diagram_validation");
    }

    #[test]
    fn test_duplicate_stage_rejected() {
        let err = WorkflowBuilder::new()
            .processors(all_processors())
            .processor(processor(StageId::ArtifactGeneration))
            .with_reviewer(Arc::new(AutoReviewer::approving()))
            .build()
            .unwrap_err();
        assert_eq!(err.stages, vec![StageId::ArtifactGeneration]);
        assert!(err.message.contains("artifact_generation"));
    }

    #[test]
    fn test_missing_stage_rejected() {
        let err = WorkflowBuilder::new()
            .processor(processor(StageId::DiagramValidation))
            .processor(processor(StageId::HumanVerification))
            .with_reviewer(Arc::new(AutoReviewer::approving()))
            .build()
            .unwrap_err();
        assert_eq!(
            err.stages,
            vec![
                StageId::DocumentGeneration,
                StageId::ComponentSpecification,
                StageId::ArtifactGeneration
            ]
        );
    }

    #[test]
    fn test_missing_reviewer_rejected() {
        let err = WorkflowBuilder::new()
            .processors(all_processors())
            .build()
            .unwrap_err();
        assert!(err.message.contains("reviewer"));
    }
}
