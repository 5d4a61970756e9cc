//! Regex rule engine over parsed entries.

use std::collections::BTreeMap;

use async_trait::async_trait;
use model::{Finding, Severity};
use regex::Regex;
use tracing::debug;

use crate::error::AgentError;
use crate::traits::{ParseKind, ParsedFile, StaticAnalyzer};

/// Files longer than this fire `LARGE_FILE`.
const LARGE_FILE_LINES: usize = 500;

struct Rule {
    id: &'static str,
    pattern: Regex,
    /// Extensions the rule applies to; empty = all parsed files
    extensions: &'static [&'static str],
    severity: Severity,
    category: &'static str,
    message: &'static str,
    suggestion: Option<&'static str>,
}

/// Built-in static analyzer with a fixed, stable rule set.
pub struct RuleBasedAnalyzer {
    rules: Vec<Rule>,
}

impl Default for RuleBasedAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleBasedAnalyzer {
    /// Compile the rule set.
    ///
    /// # Panics
    /// Never panics; the patterns are static and known-valid.
    #[must_use]
    pub fn new() -> Self {
        let rules = vec![
            Rule {
                id: "PDB_TRACE_FOUND",
                pattern: Regex::new(r"\bpdb\.set_trace\s*\(").unwrap(),
                extensions: &["py"],
                severity: Severity::Warning,
                category: "debugging",
                message: "pdb.set_trace() found - remove before production",
                suggestion: Some("Remove pdb.set_trace() before deploying to production"),
            },
            Rule {
                id: "PRINT_STATEMENT_FOUND",
                pattern: Regex::new(r"\bprint\s*\(").unwrap(),
                extensions: &["py"],
                severity: Severity::Info,
                category: "logging",
                message: "print() statement found - use logging instead",
                suggestion: Some("Replace print() with proper logging (logger.info, logger.debug)"),
            },
            Rule {
                id: "CONSOLE_LOG_FOUND",
                pattern: Regex::new(r"\bconsole\.log\s*\(").unwrap(),
                extensions: &["js", "ts"],
                severity: Severity::Info,
                category: "logging",
                message: "console.log() found - use a logger instead",
                suggestion: Some("Replace console.log() with a structured logger"),
            },
            Rule {
                id: "TODO_COMMENT",
                pattern: Regex::new(r"(?i)\b(?:todo|fixme)\b").unwrap(),
                extensions: &[],
                severity: Severity::Info,
                category: "maintainability",
                message: "TODO/FIXME comment found",
                suggestion: None,
            },
        ];
        Self { rules }
    }

    fn rules_for<'a>(&'a self, path: &str) -> impl Iterator<Item = &'a Rule> {
        let extension = path
            .rsplit('.')
            .next()
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        self.rules.iter().filter(move |rule| {
            rule.extensions.is_empty() || rule.extensions.contains(&extension.as_str())
        })
    }

    fn scan_source(&self, path: &str, entry: &ParsedFile, findings: &mut Vec<Finding>) {
        for (index, line) in entry.source.lines().enumerate() {
            for rule in self.rules_for(path) {
                if let Some(found) = rule.pattern.find(line) {
                    findings.push(make_finding(rule, path, index + 1, found.start() + 1));
                }
            }
        }

        let line_count = entry.source.lines().count();
        if line_count > LARGE_FILE_LINES {
            findings.push(Finding {
                rule_id: "LARGE_FILE".to_string(),
                message: format!("File is {line_count} lines long (max {LARGE_FILE_LINES})"),
                file: path.to_string(),
                line: 1,
                column: 1,
                severity: Severity::Warning,
                category: "complexity".to_string(),
                suggestion: Some(
                    "Break large files into smaller modules and extract reusable components"
                        .to_string(),
                ),
            });
        }
    }

    /// Diff entries are scanned on added lines only; line numbers are
    /// diff-relative.
    fn scan_diff(&self, path: &str, entry: &ParsedFile, findings: &mut Vec<Finding>) {
        for (index, line) in entry.source.lines().enumerate() {
            let Some(added) = line.strip_prefix('+') else {
                continue;
            };
            if added.starts_with("++") {
                continue;
            }
            for rule in &self.rules {
                if let Some(found) = rule.pattern.find(added) {
                    findings.push(make_finding(rule, path, index + 1, found.start() + 2));
                }
            }
        }
    }
}

fn make_finding(rule: &Rule, path: &str, line: usize, column: usize) -> Finding {
    Finding {
        rule_id: rule.id.to_string(),
        message: rule.message.to_string(),
        file: path.to_string(),
        line: line as u32,
        column: column as u32,
        severity: rule.severity,
        category: rule.category.to_string(),
        suggestion: rule.suggestion.map(str::to_string),
    }
}

#[async_trait]
impl StaticAnalyzer for RuleBasedAnalyzer {
    async fn analyze(
        &self,
        parsed: &BTreeMap<String, ParsedFile>,
    ) -> Result<Vec<Finding>, AgentError> {
        let mut findings = Vec::new();
        for (path, entry) in parsed {
            match entry.kind {
                ParseKind::Source => self.scan_source(path, entry, &mut findings),
                ParseKind::Diff => self.scan_diff(path, entry, &mut findings),
            }
        }
        debug!(findings = findings.len(), "static analysis complete");
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::StructuralSummary;

    fn source_entry(text: &str) -> ParsedFile {
        ParsedFile {
            kind: ParseKind::Source,
            source: text.to_string(),
            summary: StructuralSummary::default(),
            note: None,
        }
    }

    #[tokio::test]
    async fn test_detects_print_and_pdb() {
        let analyzer = RuleBasedAnalyzer::new();
        let mut parsed = BTreeMap::new();
        parsed.insert(
            "src/m.py".to_string(),
            source_entry("print(\"x\")\npdb.set_trace()\n"),
        );

        let findings = analyzer.analyze(&parsed).await.unwrap();
        let ids: Vec<&str> = findings.iter().map(|f| f.rule_id.as_str()).collect();
        assert!(ids.contains(&"PRINT_STATEMENT_FOUND"));
        assert!(ids.contains(&"PDB_TRACE_FOUND"));
    }

    #[tokio::test]
    async fn test_print_rule_ignores_similar_identifiers() {
        let analyzer = RuleBasedAnalyzer::new();
        let mut parsed = BTreeMap::new();
        parsed.insert("a.py".to_string(), source_entry("sprint(x)\nreprint(y)\n"));

        let findings = analyzer.analyze(&parsed).await.unwrap();
        assert!(findings.is_empty());
    }

    #[tokio::test]
    async fn test_python_rules_do_not_fire_on_rust() {
        let analyzer = RuleBasedAnalyzer::new();
        let mut parsed = BTreeMap::new();
        parsed.insert(
            "main.rs".to_string(),
            source_entry("fn main() { print(1); }\n"),
        );

        let findings = analyzer.analyze(&parsed).await.unwrap();
        assert!(!findings
            .iter()
            .any(|f| f.rule_id == "PRINT_STATEMENT_FOUND"));
    }

    #[tokio::test]
    async fn test_diff_entry_scans_added_lines_only() {
        let analyzer = RuleBasedAnalyzer::new();
        let diff = "--- a/src/m.py\n+++ b/src/m.py\n print(\"context\")\n+print(\"added\")\n+pdb.set_trace()\n-print(\"removed\")\n";
        let mut parsed = BTreeMap::new();
        parsed.insert(
            crate::traits::DIFF_SUMMARY_KEY.to_string(),
            ParsedFile::diff_summary(diff),
        );

        let findings = analyzer.analyze(&parsed).await.unwrap();
        let prints = findings
            .iter()
            .filter(|f| f.rule_id == "PRINT_STATEMENT_FOUND")
            .count();
        assert_eq!(prints, 1);
        assert!(findings.iter().any(|f| f.rule_id == "PDB_TRACE_FOUND"));
    }

    #[tokio::test]
    async fn test_large_file_rule() {
        let analyzer = RuleBasedAnalyzer::new();
        let mut parsed = BTreeMap::new();
        parsed.insert(
            "big.py".to_string(),
            source_entry(&"x = 1\n".repeat(501)),
        );

        let findings = analyzer.analyze(&parsed).await.unwrap();
        assert!(findings.iter().any(|f| f.rule_id == "LARGE_FILE"));
    }

    #[tokio::test]
    async fn test_empty_parse_map_yields_no_findings() {
        let analyzer = RuleBasedAnalyzer::new();
        let findings = analyzer.analyze(&BTreeMap::new()).await.unwrap();
        assert!(findings.is_empty());
    }
}
