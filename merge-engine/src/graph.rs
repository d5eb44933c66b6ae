//! Dependency-graph collaborators for context selection.

use std::path::{Component, Path, PathBuf};

/// Answers "which files does this file directly depend on?".
pub trait DependencyGraph: Send + Sync {
    fn neighbors(&self, path: &Path) -> Vec<PathBuf>;
}

/// A graph with no edges.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDependencies;

impl DependencyGraph for NoDependencies {
    fn neighbors(&self, _path: &Path) -> Vec<PathBuf> {
        Vec::new()
    }
}

const PROBE_SUFFIXES: &[&str] = &[
    "",
    ".ts",
    ".tsx",
    ".js",
    ".jsx",
    ".json",
    "/index.ts",
    "/index.tsx",
    "/index.js",
    "/index.jsx",
];

/// Resolves relative module specifiers (`./x`, `../y`) found in
/// `import ... from`, bare `import`, and `require(...)` statements.
///
/// Package imports are ignored; only files inside the repository matter as
/// context.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImportGraph;

impl DependencyGraph for ImportGraph {
    fn neighbors(&self, path: &Path) -> Vec<PathBuf> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Cannot read file for import scan");
                return Vec::new();
            }
        };
        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut found: Vec<PathBuf> = Vec::new();
        for spec in relative_specifiers(&content) {
            if let Some(resolved) = resolve_specifier(dir, spec) {
                if !found.contains(&resolved) {
                    found.push(resolved);
                }
            }
        }
        found
    }
}

/// Relative specifiers on import-like lines, in order of appearance.
fn relative_specifiers(content: &str) -> Vec<&str> {
    let mut specs = Vec::new();
    for line in content.lines() {
        let trimmed = line.trim_start();
        let is_import = trimmed.starts_with("import ")
            || trimmed.starts_with("export ")
            || trimmed.contains(" from ")
            || trimmed.contains("require(");
        if !is_import {
            continue;
        }
        specs.extend(
            quoted_strings(trimmed)
                .into_iter()
                .filter(|s| s.starts_with("./") || s.starts_with("../")),
        );
    }
    specs
}

fn quoted_strings(line: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut rest = line;
    while let Some(start) = rest.find(['\'', '"']) {
        let quote = rest[start..].chars().next().unwrap_or('"');
        let after = &rest[start + 1..];
        match after.find(quote) {
            Some(end) => {
                out.push(&after[..end]);
                rest = &after[end + 1..];
            }
            None => break,
        }
    }
    out
}

fn resolve_specifier(dir: &Path, spec: &str) -> Option<PathBuf> {
    PROBE_SUFFIXES
        .iter()
        .map(|suffix| normalize_lexically(&dir.join(format!("{}{}", spec, suffix))))
        .find(|candidate| candidate.is_file())
}

/// Drop `.` components and fold `..` into its parent without touching the
/// filesystem.
pub(crate) fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}
