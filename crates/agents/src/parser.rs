//! Line-oriented structural summarizer.
//!
//! Stands in for a full AST parser: recognizes class, function and import
//! declarations per language family, enough to build dependency edges and
//! component diagrams. Unsupported and binary files are skipped.

use std::collections::BTreeMap;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::error::AgentError;
use crate::traits::{AstParser, ParseKind, ParsedFile, StructuralSummary};

/// Files larger than this are skipped outright.
const MAX_PARSE_BYTES: usize = 1024 * 1024;

struct LanguageRules {
    extensions: &'static [&'static str],
    classes: Regex,
    functions: Regex,
    imports: Regex,
}

/// Built-in parser producing structural summaries.
pub struct OutlineParser {
    languages: Vec<LanguageRules>,
}

impl Default for OutlineParser {
    fn default() -> Self {
        Self::new()
    }
}

impl OutlineParser {
    /// Compile the per-language recognizers.
    ///
    /// # Panics
    /// Never panics; the patterns are static and known-valid.
    #[must_use]
    pub fn new() -> Self {
        let languages = vec![
            LanguageRules {
                extensions: &["py"],
                classes: Regex::new(r"^\s*class\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
                functions: Regex::new(r"^\s*(?:async\s+)?def\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
                imports: Regex::new(r"^\s*(?:from\s+([A-Za-z0-9_.]+)\s+import|import\s+([A-Za-z0-9_.]+))").unwrap(),
            },
            LanguageRules {
                extensions: &["rs"],
                classes: Regex::new(r"^\s*(?:pub\s+)?(?:struct|enum|trait)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
                functions: Regex::new(r"^\s*(?:pub\s+)?(?:async\s+)?fn\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
                imports: Regex::new(r"^\s*use\s+([A-Za-z0-9_:]+)").unwrap(),
            },
            LanguageRules {
                extensions: &["js", "ts"],
                classes: Regex::new(r"^\s*(?:export\s+)?class\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap(),
                functions: Regex::new(r"^\s*(?:export\s+)?(?:async\s+)?function\s+([A-Za-z_$][A-Za-z0-9_$]*)").unwrap(),
                imports: Regex::new(r#"^\s*import\s+.*?from\s+['"]([^'"]+)['"]"#).unwrap(),
            },
            LanguageRules {
                extensions: &["java", "kt"],
                classes: Regex::new(r"^\s*(?:public\s+|private\s+|internal\s+)?(?:abstract\s+|final\s+|data\s+)?(?:class|interface|object)\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
                functions: Regex::new(r"^\s*(?:public\s+|private\s+|protected\s+)?(?:static\s+)?fun\s+([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
                imports: Regex::new(r"^\s*import\s+([A-Za-z0-9_.]+)").unwrap(),
            },
            LanguageRules {
                extensions: &["go"],
                classes: Regex::new(r"^\s*type\s+([A-Za-z_][A-Za-z0-9_]*)\s+(?:struct|interface)").unwrap(),
                functions: Regex::new(r"^\s*func\s+(?:\([^)]*\)\s*)?([A-Za-z_][A-Za-z0-9_]*)").unwrap(),
                imports: Regex::new(r#"^\s*(?:import\s+)?"([^"]+)""#).unwrap(),
            },
        ];
        Self { languages }
    }

    fn rules_for(&self, path: &str) -> Option<&LanguageRules> {
        let extension = path.rsplit('.').next()?.to_ascii_lowercase();
        self.languages
            .iter()
            .find(|rules| rules.extensions.contains(&extension.as_str()))
    }

    fn summarize(rules: &LanguageRules, content: &str) -> StructuralSummary {
        let mut summary = StructuralSummary::default();
        for line in content.lines() {
            if let Some(captures) = rules.classes.captures(line) {
                if let Some(name) = captures.get(1) {
                    summary.classes.push(name.as_str().to_string());
                }
            }
            if let Some(captures) = rules.functions.captures(line) {
                if let Some(name) = captures.get(1) {
                    summary.functions.push(name.as_str().to_string());
                }
            }
            if let Some(captures) = rules.imports.captures(line) {
                let name = captures.get(1).or_else(|| captures.get(2));
                if let Some(name) = name {
                    summary.imports.push(name.as_str().to_string());
                }
            }
        }
        summary
    }
}

#[async_trait]
impl AstParser for OutlineParser {
    async fn parse(
        &self,
        files: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<String, ParsedFile>, AgentError> {
        let mut parsed = BTreeMap::new();
        for (path, content) in files {
            let Some(rules) = self.rules_for(path) else {
                debug!(file = %path, "skipping unsupported file");
                continue;
            };
            if content.len() > MAX_PARSE_BYTES || content.contains('\0') {
                debug!(file = %path, "skipping binary or oversized file");
                continue;
            }
            parsed.insert(
                path.clone(),
                ParsedFile {
                    kind: ParseKind::Source,
                    source: content.clone(),
                    summary: Self::summarize(rules, content),
                    note: None,
                },
            );
        }
        Ok(parsed)
    }
}
