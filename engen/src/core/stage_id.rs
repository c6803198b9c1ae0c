//! Stage ordinals for the five-step pipeline.

use crate::errors::GateError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the five pipeline stages, ordered 1..=5.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageId {
    /// Validate an uploaded architecture diagram.
    DiagramValidation = 1,
    /// Generate pattern documentation.
    DocumentGeneration = 2,
    /// Extract component specifications.
    ComponentSpecification = 3,
    /// Generate deployment artifacts.
    ArtifactGeneration = 4,
    /// Final human verification and deployment.
    HumanVerification = 5,
}

impl StageId {
    /// All stages in execution order.
    pub const ALL: [Self; 5] = [
        Self::DiagramValidation,
        Self::DocumentGeneration,
        Self::ComponentSpecification,
        Self::ArtifactGeneration,
        Self::HumanVerification,
    ];

    /// Number of stages in the pipeline.
    pub const COUNT: usize = Self::ALL.len();

    /// Creates a stage id from its 1-based ordinal.
    pub fn from_ordinal(ordinal: u8) -> Result<Self, GateError> {
        match ordinal {
            1 => Ok(Self::DiagramValidation),
            2 => Ok(Self::DocumentGeneration),
            3 => Ok(Self::ComponentSpecification),
            4 => Ok(Self::ArtifactGeneration),
            5 => Ok(Self::HumanVerification),
            other => Err(GateError::InvalidStage(other)),
        }
    }

    /// Returns the 1-based ordinal.
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }

    /// Returns the 0-based slot index.
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize - 1
    }

    /// Returns the stage that runs after this one.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        Self::from_ordinal(self.ordinal() + 1).ok()
    }

    /// Returns the stage that runs before this one.
    #[must_use]
    pub fn previous(self) -> Option<Self> {
        self.ordinal()
            .checked_sub(1)
            .and_then(|o| Self::from_ordinal(o).ok())
    }

    /// Returns true for the first stage.
    #[must_use]
    pub const fn is_first(self) -> bool {
        matches!(self, Self::DiagramValidation)
    }

    /// Returns the snake_case stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DiagramValidation => "diagram_validation",
            Self::DocumentGeneration => "document_generation",
            Self::ComponentSpecification => "component_specification",
            Self::ArtifactGeneration => "artifact_generation",
            Self::HumanVerification => "human_verification",
        }
    }
}

impl fmt::Display for StageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StageId {
    type Err = GateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Ok(ordinal) = s.parse::<u8>() {
            return Self::from_ordinal(ordinal);
        }
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| GateError::UnknownStage(s.to_string()))
    }
}

impl TryFrom<u8> for StageId {
    type Error = GateError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::from_ordinal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordinals_round_trip() {
        for (i, stage) in StageId::ALL.iter().enumerate() {
            assert_eq!(stage.index(), i);
            assert_eq!(StageId::from_ordinal(stage.ordinal()).unwrap(), *stage);
        }
    }

    #[test]
    fn test_invalid_ordinals() {
        assert_eq!(StageId::from_ordinal(0), Err(GateError::InvalidStage(0)));
        assert_eq!(StageId::from_ordinal(6), Err(GateError::InvalidStage(6)));
    }

    #[test]
    fn test_next_and_previous() {
        assert_eq!(
            StageId::DiagramValidation.next(),
            Some(StageId::DocumentGeneration)
        );
        assert_eq!(StageId::HumanVerification.next(), None);
        assert_eq!(StageId::DiagramValidation.previous(), None);
        assert_eq!(
            StageId::ArtifactGeneration.previous(),
            Some(StageId::ComponentSpecification)
        );
    }

    #[test]
    fn test_parse_by_name_or_ordinal() {
        assert_eq!(
            "component_specification".parse::<StageId>().unwrap(),
            StageId::ComponentSpecification
        );
        assert_eq!("4".parse::<StageId>().unwrap(), StageId::ArtifactGeneration);
        assert!(matches!(
            "deploy".parse::<StageId>(),
            Err(GateError::UnknownStage(_))
        ));
    }

    #[test]
    fn test_serialize() {
        let json = serde_json::to_string(&StageId::HumanVerification).unwrap();
        assert_eq!(json, r#""human_verification""#);
    }
}
