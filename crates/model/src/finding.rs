//! Static analysis findings.

use serde::{Deserialize, Serialize};

/// Severity of a static finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
    Info,
    Unknown,
}

impl Severity {
    /// Wire string for this severity.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single issue produced by the static analyzer.
///
/// Rule ids are stable strings; severity and category are fixed per rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    /// Stable identifier of the rule that fired
    pub rule_id: String,
    /// Human-readable description of the issue
    pub message: String,
    /// File the finding was raised in
    pub file: String,
    /// 1-based line number
    pub line: u32,
    /// 1-based column number
    pub column: u32,
    /// Severity of the issue
    pub severity: Severity,
    /// Category of the rule (e.g. "debugging", "logging", "complexity")
    pub category: String,
    /// Suggested remediation, when the rule has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Warning).unwrap(),
            "\"warning\""
        );
        assert_eq!(Severity::Unknown.as_str(), "unknown");
    }

    #[test]
    fn test_finding_roundtrip() {
        let finding = Finding {
            rule_id: "PRINT_STATEMENT_FOUND".to_string(),
            message: "print() statement found - use logging instead".to_string(),
            file: "src/m.py".to_string(),
            line: 12,
            column: 5,
            severity: Severity::Info,
            category: "logging".to_string(),
            suggestion: None,
        };
        let json = serde_json::to_string(&finding).unwrap();
        let back: Finding = serde_json::from_str(&json).unwrap();
        assert_eq!(back, finding);
    }
}
