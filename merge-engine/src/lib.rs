//! # merge-engine
//!
//! Mechanical merge-conflict resolution backed by a confidence-aggregating
//! reasoning chain.
//!
//! ## Approach
//!
//! 1. **Marker parsing**: A single-pass scanner extracts conflict blocks
//!    delimited by the standard `<<<<<<<` / `=======` / `>>>>>>>` markers.
//!    The resolver reuses the same scan to keep one side of every block while
//!    copying all other bytes through untouched.
//!
//! 2. **Context retrieval**: Four strategies (dependency graph, term
//!    similarity, file-name siblings, recent history) propose related files.
//!    Similarity is answered by an in-memory tf-idf index whose document
//!    frequencies stay exact across re-indexing.
//!
//! 3. **Compression**: Retrieved context is fitted into a character budget,
//!    preferring a generated summary and always falling back to truncation.
//!
//! 4. **Reasoning chain**: An ordered list of layers analyses the conflict.
//!    Each layer sees all previous results; the engine averages the reported
//!    confidences and either exits early or synthesizes a final decision.
//!
//! Semantic correctness of the merged code is not assessed; the engine only
//! decides which side to keep and how confident the chain was.
//!
//! ## Example
//!
//! ```rust
//! use merge_engine::{extract_conflicts, resolve, Choice};
//!
//! let text = "start\n<<<<<<< HEAD\nfoo()\n=======\nbar()\n>>>>>>> branch\nend\n";
//!
//! assert_eq!(extract_conflicts(text).len(), 1);
//! assert_eq!(resolve(text, Choice::Current), "start\nfoo()\nend\n");
//! assert_eq!(resolve(text, Choice::Incoming), "start\nbar()\nend\n");
//! ```

pub mod analyzer;
pub mod compressor;
pub mod context;
pub mod error;
pub mod graph;
pub mod index;
pub mod parser;
pub mod reasoning;
pub mod resolver;
pub mod selector;
pub mod types;

// Re-export primary public API
pub use analyzer::analyze_conflict;
pub use compressor::{ContextCompressor, Generator};
pub use context::{ContextManager, RelevantContext};
pub use error::{EngineError, EngineResult};
pub use graph::{DependencyGraph, ImportGraph, NoDependencies};
pub use index::SimilarityIndex;
pub use parser::extract_conflicts;
pub use reasoning::{
    ConflictRef, DecisionEngine, DecisionResult, LayerOutput, LayerRecord, ReasoningContext,
    ReasoningLayer, Threshold,
};
pub use resolver::resolve;
pub use selector::{ContextSelector, NoHistory, SelectionSources, SelectionStrategy, VersionHistory};
pub use types::{
    CandidateEntry, CandidateReason, Choice, Complexity, ConflictMetadata, ConflictType, Decision,
    MergeConflict, SnippetPair,
};
