//! Per-file and aggregated code metrics.
//!
//! The fallback calculations here run when no external metrics collaborator
//! is available: line classification, a token-counted cyclomatic complexity
//! estimate, and a simplified maintainability index.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// File extensions treated as source code for complexity estimation.
const SOURCE_EXTENSIONS: &[&str] = &["py", "rs", "js", "ts", "java", "kt", "go"];

/// Branching keywords counted by the fallback complexity estimate.
const DECISION_KEYWORDS: &[&str] = &["if", "elif", "for", "while", "except", "and", "or"];

/// Files longer than this many lines count as "large".
const LARGE_FILE_THRESHOLD: usize = 500;

/// Functions above this complexity count as high-complexity.
const HIGH_COMPLEXITY_THRESHOLD: u32 = 10;

/// Files below this maintainability index count as low-maintainability.
const LOW_MAINTAINABILITY_THRESHOLD: f64 = 20.0;

/// Complexity of a single function (or of a whole file when estimated).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionComplexity {
    pub name: String,
    pub complexity: u32,
    pub line: u32,
}

/// Cyclomatic complexity data for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileComplexity {
    pub total: u32,
    pub functions: Vec<FunctionComplexity>,
}

/// Metrics for a single file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileMetrics {
    pub lines_of_code: usize,
    pub blank_lines: usize,
    pub comment_lines: usize,
    pub logical_lines: usize,
    pub complexity: Option<FileComplexity>,
    pub maintainability_index: Option<f64>,
}

impl FileMetrics {
    /// Compute fallback metrics for one file.
    #[must_use]
    pub fn compute(path: &str, content: &str) -> Self {
        let mut blank_lines = 0;
        let mut comment_lines = 0;
        let mut logical_lines = 0;
        let mut total_lines = 0;

        for line in content.lines() {
            total_lines += 1;
            let stripped = line.trim();
            if stripped.is_empty() {
                blank_lines += 1;
            } else if stripped.starts_with('#') || stripped.starts_with("//") {
                comment_lines += 1;
            } else {
                logical_lines += 1;
            }
        }

        let complexity = if is_source_file(path) {
            let total = estimate_complexity(content);
            Some(FileComplexity {
                total,
                functions: vec![FunctionComplexity {
                    name: "estimated".to_string(),
                    complexity: total,
                    line: 1,
                }],
            })
        } else {
            None
        };

        let maintainability_index = if logical_lines > 0 {
            let size_penalty = (100.0 - logical_lines as f64 / 10.0).max(0.0);
            let comment_ratio = comment_lines as f64 / logical_lines as f64;
            Some((size_penalty + comment_ratio * 20.0).min(100.0))
        } else {
            None
        };

        Self {
            lines_of_code: total_lines,
            blank_lines,
            comment_lines,
            logical_lines,
            complexity,
            maintainability_index,
        }
    }
}

fn is_source_file(path: &str) -> bool {
    path.rsplit('.')
        .next()
        .map(str::to_ascii_lowercase)
        .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext.as_str()))
}

/// 1 + number of whole-token branching keyword occurrences.
fn estimate_complexity(content: &str) -> u32 {
    let mut count: u32 = 1;
    for token in content.split(|c: char| !c.is_alphanumeric() && c != '_') {
        if DECISION_KEYWORDS.contains(&token) {
            count += 1;
        }
    }
    count
}

/// Letter rank for a cyclomatic complexity value.
#[must_use]
pub fn complexity_rank(complexity: u32) -> char {
    match complexity {
        0..=5 => 'A',
        6..=10 => 'B',
        11..=20 => 'C',
        21..=30 => 'D',
        31..=40 => 'E',
        _ => 'F',
    }
}

/// Letter rank for a maintainability index.
#[must_use]
pub fn maintainability_rank(mi: f64) -> char {
    if mi >= 85.0 {
        'A'
    } else if mi >= 70.0 {
        'B'
    } else if mi >= 50.0 {
        'C'
    } else if mi >= 30.0 {
        'D'
    } else if mi >= 10.0 {
        'E'
    } else {
        'F'
    }
}

/// A function flagged for high cyclomatic complexity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighComplexityFunction {
    pub file: String,
    pub function: String,
    pub complexity: u32,
    pub rank: char,
}

/// A file flagged for low maintainability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LowMaintainabilityFile {
    pub file: String,
    pub index: f64,
    pub rank: char,
}

/// Aggregated complexity metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComplexityMetrics {
    pub total_cyclomatic_complexity: u32,
    pub average_complexity_per_function: f64,
    pub max_complexity: u32,
    pub high_complexity_functions: Vec<HighComplexityFunction>,
    pub complexity_distribution: BTreeMap<char, usize>,
}

/// Aggregated maintainability metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MaintainabilityMetrics {
    pub average_maintainability_index: Option<f64>,
    pub low_maintainability_files: Vec<LowMaintainabilityFile>,
    pub maintainability_distribution: BTreeMap<char, usize>,
}

/// Aggregated size metrics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SizeMetrics {
    /// Top-10 largest files as (path, lines)
    pub largest_files: Vec<(String, usize)>,
    pub average_file_size: f64,
    /// Files over 500 lines
    pub files_over_threshold: usize,
}

/// Aggregated metrics over a set of files.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CodeMetrics {
    pub total_files: usize,
    pub total_lines: usize,
    pub total_blank_lines: usize,
    pub total_comment_lines: usize,
    pub total_logical_lines: usize,
    pub complexity: ComplexityMetrics,
    pub maintainability: MaintainabilityMetrics,
    pub size_metrics: SizeMetrics,
    pub language_distribution: BTreeMap<String, usize>,
    pub file_metrics: BTreeMap<String, FileMetrics>,
}

impl CodeMetrics {
    /// Aggregate fallback metrics over a file map.
    #[must_use]
    pub fn from_files(files: &BTreeMap<String, String>) -> Self {
        debug!(files = files.len(), "calculating code metrics");

        let mut metrics = Self {
            total_files: files.len(),
            ..Self::default()
        };

        let mut function_complexities: Vec<u32> = Vec::new();
        let mut maintainability_indices: Vec<f64> = Vec::new();
        let mut file_sizes: Vec<(String, usize)> = Vec::new();

        for (path, content) in files {
            let file = FileMetrics::compute(path, content);

            metrics.total_lines += file.lines_of_code;
            metrics.total_blank_lines += file.blank_lines;
            metrics.total_comment_lines += file.comment_lines;
            metrics.total_logical_lines += file.logical_lines;

            if let Some(complexity) = &file.complexity {
                metrics.complexity.total_cyclomatic_complexity += complexity.total;
                for function in &complexity.functions {
                    function_complexities.push(function.complexity);
                    let rank = complexity_rank(function.complexity);
                    *metrics
                        .complexity
                        .complexity_distribution
                        .entry(rank)
                        .or_insert(0) += 1;
                    if function.complexity > HIGH_COMPLEXITY_THRESHOLD {
                        metrics
                            .complexity
                            .high_complexity_functions
                            .push(HighComplexityFunction {
                                file: path.clone(),
                                function: function.name.clone(),
                                complexity: function.complexity,
                                rank,
                            });
                    }
                }
            }

            if let Some(mi) = file.maintainability_index {
                maintainability_indices.push(mi);
                let rank = maintainability_rank(mi);
                *metrics
                    .maintainability
                    .maintainability_distribution
                    .entry(rank)
                    .or_insert(0) += 1;
                if mi < LOW_MAINTAINABILITY_THRESHOLD {
                    metrics
                        .maintainability
                        .low_maintainability_files
                        .push(LowMaintainabilityFile {
                            file: path.clone(),
                            index: mi,
                            rank,
                        });
                }
            }

            file_sizes.push((path.clone(), file.lines_of_code));
            if file.lines_of_code > LARGE_FILE_THRESHOLD {
                metrics.size_metrics.files_over_threshold += 1;
            }

            *metrics
                .language_distribution
                .entry(language_of(path).to_string())
                .or_insert(0) += 1;

            metrics.file_metrics.insert(path.clone(), file);
        }

        if !function_complexities.is_empty() {
            let total: u32 = function_complexities.iter().sum();
            metrics.complexity.average_complexity_per_function =
                f64::from(total) / function_complexities.len() as f64;
            metrics.complexity.max_complexity =
                function_complexities.iter().copied().max().unwrap_or(0);
        }

        if !maintainability_indices.is_empty() {
            metrics.maintainability.average_maintainability_index = Some(
                maintainability_indices.iter().sum::<f64>() / maintainability_indices.len() as f64,
            );
        }

        if !file_sizes.is_empty() {
            metrics.size_metrics.average_file_size =
                file_sizes.iter().map(|(_, size)| size).sum::<usize>() as f64
                    / file_sizes.len() as f64;
            file_sizes.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
            file_sizes.truncate(10);
            metrics.size_metrics.largest_files = file_sizes;
        }

        metrics
    }
}

fn language_of(path: &str) -> &'static str {
    match path.rsplit('.').next().map(str::to_ascii_lowercase).as_deref() {
        Some("py") => "python",
        Some("rs") => "rust",
        Some("js") => "javascript",
        Some("ts") => "typescript",
        Some("java") => "java",
        Some("kt" | "kts") => "kotlin",
        Some("go") => "go",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_classification() {
        let content = "# header\n\nx = 1\n// note\n   \ny = 2\n";
        let metrics = FileMetrics::compute("a.py", content);
        assert_eq!(metrics.lines_of_code, 6);
        assert_eq!(metrics.blank_lines, 2);
        assert_eq!(metrics.comment_lines, 2);
        assert_eq!(metrics.logical_lines, 2);
    }

    #[test]
    fn test_complexity_counts_whole_tokens_only() {
        // "iffy", "formal" and "sandor" must not count
        let content = "iffy = formal or sandor\nif x:\n    pass\n";
        let metrics = FileMetrics::compute("a.py", content);
        let complexity = metrics.complexity.unwrap();
        // base 1 + "or" + "if"
        assert_eq!(complexity.total, 3);
    }

    #[test]
    fn test_non_source_file_has_no_complexity() {
        let metrics = FileMetrics::compute("README.md", "if and or while\n");
        assert!(metrics.complexity.is_none());
    }

    #[test]
    fn test_maintainability_undefined_for_comment_only_file() {
        let metrics = FileMetrics::compute("a.py", "# one\n# two\n");
        assert!(metrics.maintainability_index.is_none());
    }

    #[test]
    fn test_maintainability_bounds() {
        let small = FileMetrics::compute("a.py", "x = 1\n");
        let mi = small.maintainability_index.unwrap();
        assert!(mi > 0.0 && mi <= 100.0);

        let big_body = "x = 1\n".repeat(2000);
        let big = FileMetrics::compute("b.py", &big_body);
        assert_eq!(big.maintainability_index.unwrap(), 0.0);
    }

    #[test]
    fn test_rank_boundaries() {
        assert_eq!(complexity_rank(5), 'A');
        assert_eq!(complexity_rank(6), 'B');
        assert_eq!(complexity_rank(21), 'D');
        assert_eq!(complexity_rank(99), 'F');
        assert_eq!(maintainability_rank(85.0), 'A');
        assert_eq!(maintainability_rank(49.9), 'D');
        assert_eq!(maintainability_rank(5.0), 'F');
    }

    #[test]
    fn test_aggregation_over_files() {
        let mut files = BTreeMap::new();
        files.insert("a.py".to_string(), "if x:\n    pass\n".to_string());
        files.insert("big.py".to_string(), "x = 1\n".repeat(600));
        files.insert("notes.txt".to_string(), "plain text\n".to_string());

        let metrics = CodeMetrics::from_files(&files);
        assert_eq!(metrics.total_files, 3);
        assert_eq!(metrics.size_metrics.files_over_threshold, 1);
        assert_eq!(metrics.language_distribution["python"], 2);
        assert_eq!(metrics.language_distribution["other"], 1);
        assert_eq!(metrics.size_metrics.largest_files[0].0, "big.py");
        assert!(metrics.complexity.total_cyclomatic_complexity >= 2);
    }

    #[test]
    fn test_empty_input_yields_zeroes() {
        let metrics = CodeMetrics::from_files(&BTreeMap::new());
        assert_eq!(metrics.total_files, 0);
        assert_eq!(metrics.total_lines, 0);
        assert!(metrics.maintainability.average_maintainability_index.is_none());
        assert!(metrics.size_metrics.largest_files.is_empty());
    }
}
