//! Unified-diff parsing helpers.

use std::collections::BTreeMap;

/// Paths touched by a unified diff, in order of first appearance.
#[must_use]
pub fn changed_files_from_diff(diff: &str) -> Vec<String> {
    let mut files = Vec::new();
    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            // diff --git a/path b/path
            let Some(b_part) = rest.split(' ').nth(1) else {
                continue;
            };
            let path = b_part.strip_prefix("b/").unwrap_or(b_part).to_string();
            if !files.contains(&path) {
                files.push(path);
            }
        }
    }
    files
}

/// Reconstruct per-file text from the added lines of a unified diff.
///
/// Returns an empty map when the diff has no recognizable file sections,
/// in which case the caller falls back to a synthetic diff summary.
#[must_use]
pub fn added_contents_from_diff(diff: &str) -> BTreeMap<String, String> {
    let mut contents: BTreeMap<String, String> = BTreeMap::new();
    let mut current: Option<String> = None;

    for line in diff.lines() {
        if let Some(rest) = line.strip_prefix("diff --git ") {
            current = rest
                .split(' ')
                .nth(1)
                .map(|b| b.strip_prefix("b/").unwrap_or(b).to_string());
            continue;
        }
        // skip diff metadata lines
        if line.starts_with("+++") || line.starts_with("---") || line.starts_with("index ") {
            continue;
        }
        if let Some(added) = line.strip_prefix('+') {
            if let Some(file) = &current {
                let entry = contents.entry(file.clone()).or_default();
                entry.push_str(added);
                entry.push('\n');
            }
        }
    }

    contents.retain(|_, text| !text.trim().is_empty());
    contents
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_DIFF: &str = "\
diff --git a/src/m.py b/src/m.py
index 1111111..2222222 100644
--- a/src/m.py
+++ b/src/m.py
@@ -1,2 +1,4 @@
 import os
+print(\"debugging\")
+pdb.set_trace()
 x = 1
diff --git a/docs/notes.md b/docs/notes.md
--- a/docs/notes.md
+++ b/docs/notes.md
@@ -0,0 +1 @@
+notes
";

    #[test]
    fn test_changed_files_in_order() {
        let files = changed_files_from_diff(SAMPLE_DIFF);
        assert_eq!(files, ["src/m.py", "docs/notes.md"]);
    }

    #[test]
    fn test_added_contents_reconstruction() {
        let contents = added_contents_from_diff(SAMPLE_DIFF);
        let m = &contents["src/m.py"];
        assert!(m.contains("print(\"debugging\")"));
        assert!(m.contains("pdb.set_trace()"));
        // context lines are not added lines
        assert!(!m.contains("x = 1"));
    }

    #[test]
    fn test_empty_diff_yields_no_files() {
        assert!(changed_files_from_diff("not a diff").is_empty());
        assert!(added_contents_from_diff("not a diff").is_empty());
    }
}
