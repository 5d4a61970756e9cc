//! Code metrics and composite risk scoring.
//!
//! Pure computation: the same inputs always produce the same assessment.
//! Metrics come either from an external analyzer or from the deterministic
//! fallback implemented here.

mod metrics;
mod predictor;

pub use metrics::{
    CodeMetrics, ComplexityMetrics, FileComplexity, FileMetrics, FunctionComplexity,
    HighComplexityFunction, LowMaintainabilityFile, MaintainabilityMetrics, SizeMetrics,
};
pub use predictor::{
    ComponentScores, Recommendation, RiskAssessment, RiskLevel, RiskPredictor, RiskWeights,
};
