//! Multi-strategy context candidate selection.
//!
//! Each [`SelectionStrategy`] proposes files that may help explain a
//! conflicted file. The selector runs them in fixed priority order and merges
//! their proposals:
//!
//! 1. Direct dependencies from the dependency graph
//! 2. Semantic neighbours from the similarity index
//! 3. Architectural siblings sharing the file's name pattern
//! 4. Recently changed files from version history
//!
//! A path is kept once, tagged with the reason of the first strategy that
//! proposed it. A strategy that fails contributes nothing.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::graph::{normalize_lexically, DependencyGraph};
use crate::index::SimilarityIndex;
use crate::types::{CandidateEntry, CandidateReason};

/// Answers "which files changed recently?".
pub trait VersionHistory: Send + Sync {
    fn recent_files(&self, limit: usize) -> anyhow::Result<Vec<PathBuf>>;
}

/// History source for repositories without version control.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoHistory;

impl VersionHistory for NoHistory {
    fn recent_files(&self, _limit: usize) -> anyhow::Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

/// Everything a strategy may consult.
pub struct SelectionSources<'a> {
    pub repo_root: &'a Path,
    pub index: &'a SimilarityIndex,
    pub graph: &'a dyn DependencyGraph,
    pub history: &'a dyn VersionHistory,
}

/// One way of finding context candidates.
pub trait SelectionStrategy: Send + Sync {
    /// Reason attached to every path this strategy contributes.
    fn reason(&self) -> CandidateReason;

    /// Propose paths related to `path`, best first.
    fn select(&self, path: &Path, sources: &SelectionSources<'_>) -> anyhow::Result<Vec<PathBuf>>;
}

/// Runs the strategies and merges their results.
pub struct ContextSelector {
    strategies: Vec<Box<dyn SelectionStrategy>>,
}

impl ContextSelector {
    /// Selector with the four built-in strategies in priority order.
    pub fn new() -> Self {
        Self {
            strategies: vec![
                Box::new(DirectDependencyStrategy),
                Box::new(SemanticSimilarityStrategy { k: 5 }),
                Box::new(ArchitecturalPatternStrategy { limit: 5 }),
                Box::new(RecentChangesStrategy { limit: 10 }),
            ],
        }
    }

    /// Selector with a custom strategy list, run in the given order.
    pub fn with_strategies(strategies: Vec<Box<dyn SelectionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn select_candidates(
        &self,
        path: &Path,
        sources: &SelectionSources<'_>,
    ) -> Vec<CandidateEntry> {
        // Keyed by canonical path so `a/../b.ts` and `b.ts` count once.
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut candidates = Vec::new();
        // The conflicted file is never proposed as its own context.
        seen.insert(dedup_key(path));

        for strategy in &self.strategies {
            let reason = strategy.reason();
            let proposed = match strategy.select(path, sources) {
                Ok(paths) => paths,
                Err(e) => {
                    tracing::warn!(strategy = %reason, error = %e, "Context strategy failed");
                    continue;
                }
            };

            for candidate in proposed {
                let candidate = normalize_lexically(&candidate);
                if !seen.insert(dedup_key(&candidate)) {
                    continue;
                }
                if !candidate.is_file() {
                    tracing::debug!(path = %candidate.display(), "Skipping missing candidate");
                    continue;
                }
                candidates.push(CandidateEntry {
                    path: candidate,
                    reason,
                });
            }
        }

        tracing::debug!(
            path = %path.display(),
            count = candidates.len(),
            "Selected context candidates"
        );
        candidates
    }
}

impl Default for ContextSelector {
    fn default() -> Self {
        Self::new()
    }
}

// ──────────────────────────────────────────────────────────────
// Strategy 1: Direct dependencies
// ──────────────────────────────────────────────────────────────

struct DirectDependencyStrategy;

impl SelectionStrategy for DirectDependencyStrategy {
    fn reason(&self) -> CandidateReason {
        CandidateReason::DirectDependency
    }

    fn select(&self, path: &Path, sources: &SelectionSources<'_>) -> anyhow::Result<Vec<PathBuf>> {
        Ok(sources.graph.neighbors(path))
    }
}

// ──────────────────────────────────────────────────────────────
// Strategy 2: Semantic similarity
// ──────────────────────────────────────────────────────────────

/// Queries the similarity index with the conflicted file's own content.
struct SemanticSimilarityStrategy {
    k: usize,
}

impl SelectionStrategy for SemanticSimilarityStrategy {
    fn reason(&self) -> CandidateReason {
        CandidateReason::SemanticSimilarity
    }

    fn select(&self, path: &Path, sources: &SelectionSources<'_>) -> anyhow::Result<Vec<PathBuf>> {
        // Fall back to the file name when the content is unavailable.
        let query = std::fs::read_to_string(path).unwrap_or_else(|_| {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        });
        Ok(sources.index.query(&query, self.k))
    }
}

// ──────────────────────────────────────────────────────────────
// Strategy 3: Architectural pattern (name siblings)
// ──────────────────────────────────────────────────────────────

/// Files elsewhere in the repository whose name starts with the conflicted
/// file's stem and shares its extension (`Button.tsx` -> `Button.test.tsx`).
struct ArchitecturalPatternStrategy {
    limit: usize,
}

impl SelectionStrategy for ArchitecturalPatternStrategy {
    fn reason(&self) -> CandidateReason {
        CandidateReason::ArchitecturalPattern
    }

    fn select(&self, path: &Path, sources: &SelectionSources<'_>) -> anyhow::Result<Vec<PathBuf>> {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return Ok(Vec::new());
        };
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        let own = dedup_key(path);

        let mut matches = Vec::new();
        let walker = WalkDir::new(sources.repo_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker.filter_map(Result::ok) {
            if matches.len() >= self.limit {
                break;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let matches_pattern = {
                let name = entry.file_name().to_string_lossy();
                name.starts_with(stem) && name.ends_with(ext.as_str())
            };
            if !matches_pattern {
                continue;
            }
            if entry.path() != path && dedup_key(entry.path()) != own {
                matches.push(entry.into_path());
            }
        }
        Ok(matches)
    }
}

fn dedup_key(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| normalize_lexically(path))
}

pub(crate) fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

// ──────────────────────────────────────────────────────────────
// Strategy 4: Recent changes
// ──────────────────────────────────────────────────────────────

struct RecentChangesStrategy {
    limit: usize,
}

impl SelectionStrategy for RecentChangesStrategy {
    fn reason(&self) -> CandidateReason {
        CandidateReason::RecentChange
    }

    fn select(&self, _path: &Path, sources: &SelectionSources<'_>) -> anyhow::Result<Vec<PathBuf>> {
        let mut files = sources.history.recent_files(self.limit)?;
        files.truncate(self.limit);
        Ok(files)
    }
}
