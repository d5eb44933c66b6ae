//! Repository-level context gathering.
//!
//! [`ContextManager`] ties together the similarity index, the candidate
//! selector and the compressor for one repository.

use std::path::{Path, PathBuf};

use serde::Serialize;
use walkdir::WalkDir;

use crate::compressor::ContextCompressor;
use crate::error::{EngineError, EngineResult};
use crate::graph::DependencyGraph;
use crate::index::SimilarityIndex;
use crate::selector::{is_hidden, ContextSelector, SelectionSources, VersionHistory};
use crate::types::CandidateEntry;

/// Files larger than this are never indexed.
pub const MAX_INDEXED_FILE_BYTES: u64 = 2 * 1024 * 1024;
pub const DEFAULT_INDEX_LIMIT: usize = 5000;

/// Context selected and compressed for one conflicted file.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RelevantContext {
    /// Candidates that were read successfully, in selection order.
    pub files: Vec<PathBuf>,
    pub context: Vec<String>,
}

pub struct ContextManager {
    repo_root: PathBuf,
    index: SimilarityIndex,
    graph: Box<dyn DependencyGraph>,
    history: Box<dyn VersionHistory>,
    selector: ContextSelector,
    compressor: ContextCompressor,
}

impl ContextManager {
    pub fn new(
        repo_root: impl Into<PathBuf>,
        graph: Box<dyn DependencyGraph>,
        history: Box<dyn VersionHistory>,
        compressor: ContextCompressor,
    ) -> Self {
        Self {
            repo_root: repo_root.into(),
            index: SimilarityIndex::new(),
            graph,
            history,
            selector: ContextSelector::new(),
            compressor,
        }
    }

    pub fn with_selector(mut self, selector: ContextSelector) -> Self {
        self.selector = selector;
        self
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    /// Index up to `limit` readable text files under the repository root.
    ///
    /// Hidden directories and files over [`MAX_INDEXED_FILE_BYTES`] are
    /// skipped, as are files that are not valid UTF-8. Returns the number of
    /// documents indexed by this call.
    pub fn index_repository(&mut self, limit: usize) -> EngineResult<usize> {
        if !self.repo_root.is_dir() {
            return Err(EngineError::RepositoryNotFound(self.repo_root.clone()));
        }

        let mut indexed = 0;
        let walker = WalkDir::new(&self.repo_root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker.filter_map(Result::ok) {
            if indexed >= limit {
                break;
            }
            if !entry.file_type().is_file() {
                continue;
            }
            let too_large = entry
                .metadata()
                .map(|m| m.len() > MAX_INDEXED_FILE_BYTES)
                .unwrap_or(true);
            if too_large {
                continue;
            }
            if let Ok(text) = std::fs::read_to_string(entry.path()) {
                self.index.add(entry.path(), &text);
                indexed += 1;
            }
        }

        tracing::info!(root = %self.repo_root.display(), indexed, "Indexed repository");
        Ok(indexed)
    }

    pub fn select_candidates(&self, path: &Path) -> Vec<CandidateEntry> {
        let sources = SelectionSources {
            repo_root: &self.repo_root,
            index: &self.index,
            graph: self.graph.as_ref(),
            history: self.history.as_ref(),
        };
        self.selector.select_candidates(path, &sources)
    }

    /// Select candidates for `path`, read them and fit them into `max_size`
    /// characters. Candidates that cannot be read are skipped; the ones that
    /// can are (re-)indexed so later queries see their current content.
    pub async fn relevant_context(&mut self, path: &Path, max_size: usize) -> RelevantContext {
        let candidates = self.select_candidates(path);

        let mut files = Vec::new();
        let mut snippets = Vec::new();
        for candidate in candidates {
            match std::fs::read_to_string(&candidate.path) {
                Ok(text) => {
                    self.index.add(&candidate.path, &text);
                    files.push(candidate.path);
                    snippets.push(text);
                }
                Err(e) => {
                    tracing::debug!(path = %candidate.path.display(), error = %e, "Skipping unreadable candidate");
                }
            }
        }

        let context = self.compressor.compress(&snippets, max_size).await;
        RelevantContext { files, context }
    }
}
