//! Per-file conflict classification.

use std::path::Path;

use crate::parser::extract_conflicts;
use crate::types::{Complexity, ConflictMetadata, ConflictType, SnippetPair};

/// Classify the conflicts in `content`, which was read from `path`.
///
/// Pure function of its inputs: the path only drives the type lookup and is
/// never read from disk.
pub fn analyze_conflict(path: &Path, content: &str) -> ConflictMetadata {
    let conflicts = extract_conflicts(content);
    let snippets = conflicts
        .into_iter()
        .map(|c| SnippetPair {
            current: c.current,
            incoming: c.incoming,
        })
        .collect::<Vec<_>>();

    ConflictMetadata {
        path: path.to_path_buf(),
        conflict_type: classify_type(path),
        complexity: Complexity::from_count(snippets.len()),
        snippets,
    }
}

/// Map a file path to its conflict type by extension.
pub fn classify_type(path: &Path) -> ConflictType {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    match ext.as_str() {
        "js" | "jsx" | "ts" | "tsx" => {
            if path.to_string_lossy().to_lowercase().contains("component") {
                ConflictType::Ui
            } else {
                ConflictType::Code
            }
        }
        "json" | "yml" | "yaml" => ConflictType::Config,
        _ => ConflictType::Code,
    }
}
