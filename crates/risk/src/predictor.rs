//! Composite risk scoring from metrics and findings.

use std::collections::BTreeMap;

use model::Finding;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::metrics::CodeMetrics;

/// Categories that count toward the code-smell score.
const CODE_SMELL_CATEGORIES: &[&str] = &["style", "complexity", "duplication", "maintainability"];

/// Weights applied to the component scores.
///
/// Treated as literal multipliers; they are never renormalized, so custom
/// weights need not sum to 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub complexity: f64,
    pub maintainability: f64,
    pub size: f64,
    pub findings_density: f64,
    pub security: f64,
    pub code_smells: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            complexity: 0.25,
            maintainability: 0.20,
            size: 0.15,
            findings_density: 0.25,
            security: 0.10,
            code_smells: 0.05,
        }
    }
}

/// Overall risk banding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Minimal,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Band an overall score into a risk level.
    #[must_use]
    pub fn from_score(score: f64) -> Self {
        if score >= 80.0 {
            Self::Critical
        } else if score >= 60.0 {
            Self::High
        } else if score >= 40.0 {
            Self::Medium
        } else if score >= 20.0 {
            Self::Low
        } else {
            Self::Minimal
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Minimal => "MINIMAL",
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Per-component risk scores, each in [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentScores {
    pub complexity_score: f64,
    pub maintainability_score: f64,
    pub size_score: f64,
    pub findings_density_score: f64,
    pub security_score: f64,
    pub code_smell_score: f64,
}

impl ComponentScores {
    fn rounded(self) -> Self {
        Self {
            complexity_score: round2(self.complexity_score),
            maintainability_score: round2(self.maintainability_score),
            size_score: round2(self.size_score),
            findings_density_score: round2(self.findings_density_score),
            security_score: round2(self.security_score),
            code_smell_score: round2(self.code_smell_score),
        }
    }
}

/// An actionable recommendation attached to an assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub category: String,
    pub priority: String,
    pub recommendation: String,
    pub action: String,
}

/// Bookkeeping about the inputs of an assessment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CalculationMetadata {
    pub total_files_analyzed: usize,
    pub total_lines_analyzed: usize,
    pub static_findings_count: usize,
}

/// The result of a risk prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub overall_risk_score: f64,
    pub risk_level: RiskLevel,
    pub component_scores: ComponentScores,
    pub risk_factors: Vec<String>,
    pub recommendations: Vec<Recommendation>,
    pub weights_used: RiskWeights,
    pub calculation_metadata: CalculationMetadata,
    /// Architectural analysis text, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub architectural_analysis: Option<String>,
}

/// Predicts project risk from aggregated metrics and static findings.
#[derive(Debug, Clone, Default)]
pub struct RiskPredictor {
    weights: RiskWeights,
}

impl RiskPredictor {
    /// Predictor with the default weights.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Predictor with custom weights.
    #[must_use]
    pub fn with_weights(weights: RiskWeights) -> Self {
        Self { weights }
    }

    /// Produce a bounded risk assessment. Pure and deterministic.
    #[must_use]
    pub fn assess(
        &self,
        code_metrics: &CodeMetrics,
        static_findings: &[Finding],
        architectural_analysis: Option<&str>,
    ) -> RiskAssessment {
        let mut scores = ComponentScores {
            complexity_score: complexity_risk(code_metrics),
            maintainability_score: maintainability_risk(code_metrics),
            size_score: size_risk(code_metrics),
            ..ComponentScores::default()
        };

        if !static_findings.is_empty() {
            let analysis = FindingsAnalysis::of(static_findings, code_metrics.total_lines);
            scores.findings_density_score = analysis.density_score;
            scores.security_score = analysis.security_score;
            scores.code_smell_score = analysis.code_smell_score;
        }

        let overall = self.weights.complexity * scores.complexity_score
            + self.weights.maintainability * scores.maintainability_score
            + self.weights.size * scores.size_score
            + self.weights.findings_density * scores.findings_density_score
            + self.weights.security * scores.security_score
            + self.weights.code_smells * scores.code_smell_score;

        let risk_level = RiskLevel::from_score(overall);
        let risk_factors = identify_risk_factors(code_metrics, static_findings, &scores);
        let recommendations = generate_recommendations(&scores);

        info!(
            risk_level = %risk_level,
            score = round2(overall),
            "risk assessment complete"
        );

        RiskAssessment {
            overall_risk_score: round2(overall),
            risk_level,
            component_scores: scores.rounded(),
            risk_factors,
            recommendations,
            weights_used: self.weights.clone(),
            calculation_metadata: CalculationMetadata {
                total_files_analyzed: code_metrics.total_files,
                total_lines_analyzed: code_metrics.total_lines,
                static_findings_count: static_findings.len(),
            },
            architectural_analysis: architectural_analysis.map(str::to_string),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn complexity_risk(metrics: &CodeMetrics) -> f64 {
    let complexity = &metrics.complexity;
    if complexity.total_cyclomatic_complexity == 0 {
        return 0.0;
    }

    let avg_score = (complexity.average_complexity_per_function / 20.0 * 100.0).min(100.0);
    let max_score = (f64::from(complexity.max_complexity) / 50.0 * 100.0).min(100.0);
    let high_ratio = complexity.high_complexity_functions.len() as f64
        / metrics.total_files.max(1) as f64
        * 100.0;

    (avg_score * 0.4 + max_score * 0.4 + high_ratio * 0.2).min(100.0)
}

fn maintainability_risk(metrics: &CodeMetrics) -> f64 {
    let Some(avg_mi) = metrics.maintainability.average_maintainability_index else {
        return 0.0;
    };

    let avg_risk = (100.0 - avg_mi).max(0.0);
    let low_ratio = metrics.maintainability.low_maintainability_files.len() as f64
        / metrics.total_files.max(1) as f64
        * 100.0;

    (avg_risk * 0.7 + low_ratio * 0.3).min(100.0)
}

fn size_risk(metrics: &CodeMetrics) -> f64 {
    let size = &metrics.size_metrics;

    let total_lines_risk = (metrics.total_lines as f64 / 100_000.0 * 100.0).min(100.0);
    let avg_file_risk = (size.average_file_size / 1000.0 * 100.0).min(100.0);
    let large_ratio =
        size.files_over_threshold as f64 / metrics.total_files.max(1) as f64 * 100.0;

    (total_lines_risk * 0.3 + avg_file_risk * 0.4 + large_ratio * 0.3).min(100.0)
}

struct FindingsAnalysis {
    density_score: f64,
    security_score: f64,
    code_smell_score: f64,
}

impl FindingsAnalysis {
    fn of(findings: &[Finding], total_lines: usize) -> Self {
        let total = findings.len();

        let per_1k_lines = total as f64 / total_lines.max(1) as f64 * 1000.0;
        let density_score = (per_1k_lines * 10.0).min(100.0);

        let security_count = findings.iter().filter(|f| is_security_finding(f)).count();
        let security_score = (security_count as f64 / total.max(1) as f64 * 200.0).min(100.0);

        let smell_count = findings
            .iter()
            .filter(|f| {
                let category = f.category.to_lowercase();
                CODE_SMELL_CATEGORIES.iter().any(|c| category.contains(c))
            })
            .count();
        let code_smell_score = (smell_count as f64 / total.max(1) as f64 * 150.0).min(100.0);

        Self {
            density_score,
            security_score,
            code_smell_score,
        }
    }
}

fn is_security_finding(finding: &Finding) -> bool {
    finding.category.to_lowercase().contains("security")
        || finding.message.to_lowercase().contains("vulnerability")
}

fn identify_risk_factors(
    metrics: &CodeMetrics,
    findings: &[Finding],
    scores: &ComponentScores,
) -> Vec<String> {
    let mut factors = Vec::new();

    if scores.complexity_score > 60.0 {
        let count = metrics.complexity.high_complexity_functions.len();
        if count > 0 {
            factors.push(format!(
                "High cyclomatic complexity: {count} functions with complexity > 10"
            ));
        }
    }

    if scores.maintainability_score > 60.0 {
        let count = metrics.maintainability.low_maintainability_files.len();
        if count > 0 {
            factors.push(format!(
                "Low maintainability: {count} files with maintainability index < 20"
            ));
        }
    }

    if scores.size_score > 60.0 {
        let count = metrics.size_metrics.files_over_threshold;
        if count > 0 {
            factors.push(format!("Large files: {count} files exceed 500 lines"));
        }
    }

    if !findings.is_empty() && scores.findings_density_score > 40.0 {
        factors.push(format!(
            "High issue density: {} static analysis findings detected",
            findings.len()
        ));
    }

    if !findings.is_empty() && scores.security_score > 40.0 {
        let count = findings.iter().filter(|f| is_security_finding(f)).count();
        if count > 0 {
            factors.push(format!(
                "Security concerns: {count} potential security issues found"
            ));
        }
    }

    factors
}

fn tier(score: f64, cutoff: f64, above: &str, below: &str) -> String {
    if score > cutoff {
        above.to_string()
    } else {
        below.to_string()
    }
}

fn generate_recommendations(scores: &ComponentScores) -> Vec<Recommendation> {
    let mut recommendations = Vec::new();

    if scores.complexity_score > 40.0 {
        recommendations.push(Recommendation {
            category: "Complexity".to_string(),
            priority: tier(scores.complexity_score, 60.0, "HIGH", "MEDIUM"),
            recommendation:
                "Refactor high-complexity functions to improve readability and maintainability"
                    .to_string(),
            action: "Break down complex functions into smaller, single-purpose functions"
                .to_string(),
        });
    }

    if scores.maintainability_score > 40.0 {
        recommendations.push(Recommendation {
            category: "Maintainability".to_string(),
            priority: tier(scores.maintainability_score, 60.0, "HIGH", "MEDIUM"),
            recommendation:
                "Improve code maintainability through better documentation and structure"
                    .to_string(),
            action:
                "Add comprehensive docstrings, reduce code duplication, and improve naming conventions"
                    .to_string(),
        });
    }

    if scores.size_score > 40.0 {
        recommendations.push(Recommendation {
            category: "Code Organization".to_string(),
            priority: "MEDIUM".to_string(),
            recommendation: "Split large files and reorganize code structure".to_string(),
            action: "Break large files into smaller modules and extract reusable components"
                .to_string(),
        });
    }

    if scores.security_score > 30.0 {
        recommendations.push(Recommendation {
            category: "Security".to_string(),
            priority: tier(scores.security_score, 60.0, "CRITICAL", "HIGH"),
            recommendation:
                "Address security vulnerabilities and implement security best practices"
                    .to_string(),
            action:
                "Review and fix security issues, add input validation, and follow secure coding guidelines"
                    .to_string(),
        });
    }

    if scores.code_smell_score > 40.0 {
        recommendations.push(Recommendation {
            category: "Code Quality".to_string(),
            priority: "MEDIUM".to_string(),
            recommendation: "Improve overall code quality and consistency".to_string(),
            action:
                "Apply consistent coding standards, remove code duplication, and improve error handling"
                    .to_string(),
        });
    }

    recommendations
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{
        ComplexityMetrics, HighComplexityFunction, LowMaintainabilityFile, MaintainabilityMetrics,
        SizeMetrics,
    };
    use model::Severity;

    fn finding(category: &str, message: &str) -> Finding {
        Finding {
            rule_id: "RULE".to_string(),
            message: message.to_string(),
            file: "f.py".to_string(),
            line: 1,
            column: 1,
            severity: Severity::Warning,
            category: category.to_string(),
            suggestion: None,
        }
    }

    fn healthy_metrics() -> CodeMetrics {
        CodeMetrics {
            total_files: 10,
            total_lines: 1000,
            complexity: ComplexityMetrics {
                total_cyclomatic_complexity: 30,
                average_complexity_per_function: 3.0,
                max_complexity: 8,
                ..ComplexityMetrics::default()
            },
            maintainability: MaintainabilityMetrics {
                average_maintainability_index: Some(80.0),
                ..MaintainabilityMetrics::default()
            },
            size_metrics: SizeMetrics {
                average_file_size: 100.0,
                files_over_threshold: 0,
                ..SizeMetrics::default()
            },
            ..CodeMetrics::default()
        }
    }

    fn risky_metrics() -> CodeMetrics {
        let high_funcs = (0..40)
            .map(|i| HighComplexityFunction {
                file: format!("f{i}.py"),
                function: "estimated".to_string(),
                complexity: 25,
                rank: 'D',
            })
            .collect();
        let low_files = (0..60)
            .map(|i| LowMaintainabilityFile {
                file: format!("f{i}.py"),
                index: 10.0,
                rank: 'E',
            })
            .collect();
        CodeMetrics {
            total_files: 200,
            total_lines: 150_000,
            complexity: ComplexityMetrics {
                total_cyclomatic_complexity: 5000,
                average_complexity_per_function: 25.0,
                max_complexity: 80,
                high_complexity_functions: high_funcs,
                ..ComplexityMetrics::default()
            },
            maintainability: MaintainabilityMetrics {
                average_maintainability_index: Some(15.0),
                low_maintainability_files: low_files,
                ..MaintainabilityMetrics::default()
            },
            size_metrics: SizeMetrics {
                average_file_size: 750.0,
                files_over_threshold: 50,
                ..SizeMetrics::default()
            },
            ..CodeMetrics::default()
        }
    }

    #[test]
    fn test_healthy_project_is_minimal_risk() {
        let assessment = RiskPredictor::new().assess(&healthy_metrics(), &[], None);
        assert!(assessment.overall_risk_score < 20.0);
        assert_eq!(assessment.risk_level, RiskLevel::Minimal);
        assert!(assessment.risk_factors.is_empty());
    }

    #[test]
    fn test_high_risk_project_scores_high() {
        let findings: Vec<Finding> = (0..40)
            .map(|i| {
                if i % 2 == 0 {
                    finding("security", "possible injection")
                } else {
                    finding("style", "long line")
                }
            })
            .collect();

        let assessment = RiskPredictor::new().assess(&risky_metrics(), &findings, None);
        assert!(assessment.overall_risk_score > 50.0);
        assert!(matches!(
            assessment.risk_level,
            RiskLevel::Medium | RiskLevel::High | RiskLevel::Critical
        ));
        let security = assessment
            .recommendations
            .iter()
            .find(|r| r.category == "Security")
            .expect("security recommendation expected");
        assert!(security.priority == "CRITICAL" || security.priority == "HIGH");
    }

    #[test]
    fn test_empty_metrics_yield_minimal() {
        let assessment = RiskPredictor::new().assess(&CodeMetrics::default(), &[], None);
        assert_eq!(assessment.overall_risk_score, 0.0);
        assert_eq!(assessment.risk_level, RiskLevel::Minimal);
        assert_eq!(assessment.component_scores, ComponentScores::default());
        assert!(assessment.recommendations.is_empty());
    }

    #[test]
    fn test_assessment_is_deterministic() {
        let findings = vec![finding("security", "vulnerability found")];
        let metrics = risky_metrics();
        let predictor = RiskPredictor::new();
        let a = serde_json::to_string(&predictor.assess(&metrics, &findings, Some("arch"))).unwrap();
        let b = serde_json::to_string(&predictor.assess(&metrics, &findings, Some("arch"))).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_overall_score_monotone_in_components() {
        // raising a single component (security, via findings) must not lower the score
        let metrics = healthy_metrics();
        let low = RiskPredictor::new().assess(&metrics, &[finding("style", "nit")], None);
        let high = RiskPredictor::new().assess(
            &metrics,
            &[
                finding("security", "vulnerability"),
                finding("security", "vulnerability"),
                finding("style", "nit"),
            ],
            None,
        );
        assert!(
            high.component_scores.security_score >= low.component_scores.security_score
        );
        assert!(high.overall_risk_score >= low.overall_risk_score);
    }

    #[test]
    fn test_custom_weights_are_literal_multipliers() {
        let weights = RiskWeights {
            complexity: 2.0,
            maintainability: 0.0,
            size: 0.0,
            findings_density: 0.0,
            security: 0.0,
            code_smells: 0.0,
        };
        let assessment = RiskPredictor::with_weights(weights).assess(&risky_metrics(), &[], None);
        // complexity component alone, doubled
        assert!(assessment.overall_risk_score > 100.0);
    }

    #[test]
    fn test_architectural_analysis_passthrough() {
        let assessment =
            RiskPredictor::new().assess(&CodeMetrics::default(), &[], Some("layered design"));
        assert_eq!(
            assessment.architectural_analysis.as_deref(),
            Some("layered design")
        );
    }

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(80.0), RiskLevel::Critical);
        assert_eq!(RiskLevel::from_score(79.9), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(60.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(40.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(20.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(19.9), RiskLevel::Minimal);
    }
}
