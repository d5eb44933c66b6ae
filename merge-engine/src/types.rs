//! Core types for the merge engine.
//!
//! A conflicted file is modelled as an ordered list of [`MergeConflict`]
//! records, each holding the verbatim text of the competing sides. Everything
//! downstream (analysis, context retrieval, reasoning) speaks in terms of
//! these records and the small enums below.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// One conflict block extracted from a file.
///
/// Each side holds the exact bytes found between its markers, including line
/// endings, so emitting a side reproduces the original lines verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub current: String,
    pub incoming: String,
    /// Common-ancestor section of a diff3-style block, if present.
    pub base: Option<String>,
    /// Zero-based line index of the `<<<<<<<` marker.
    pub position: usize,
}

impl MergeConflict {
    /// Text of the requested side.
    pub fn side(&self, choice: Choice) -> &str {
        match choice {
            Choice::Current => &self.current,
            Choice::Incoming => &self.incoming,
        }
    }

    /// Render a unified line diff from the current side to the incoming side.
    pub fn unified_diff(&self) -> String {
        side_diff(&self.current, &self.incoming)
    }
}

fn side_diff(current: &str, incoming: &str) -> String {
    similar::TextDiff::from_lines(current, incoming)
        .unified_diff()
        .context_radius(3)
        .header("current", "incoming")
        .to_string()
}

/// Which side of a conflict to keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    Current,
    Incoming,
}

impl Choice {
    pub fn as_str(&self) -> &str {
        match self {
            Choice::Current => "current",
            Choice::Incoming => "incoming",
        }
    }
}

impl fmt::Display for Choice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Choice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "current" => Ok(Choice::Current),
            "incoming" => Ok(Choice::Incoming),
            other => Err(format!("unknown choice '{}', expected current or incoming", other)),
        }
    }
}

/// Coarse classification of what kind of file is conflicted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    Ui,
    Code,
    Config,
}

/// Complexity bucket derived from the number of conflicts in a file.
/// Ordered Low < Medium < High.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    Medium,
    High,
}

impl Complexity {
    /// At most one conflict is low, up to three is medium, anything more is high.
    pub fn from_count(count: usize) -> Self {
        match count {
            0..=1 => Complexity::Low,
            2..=3 => Complexity::Medium,
            _ => Complexity::High,
        }
    }
}

/// The two competing sides of one conflict, as shown to reviewers and layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnippetPair {
    pub current: String,
    pub incoming: String,
}

impl SnippetPair {
    pub fn unified_diff(&self) -> String {
        side_diff(&self.current, &self.incoming)
    }
}

/// Per-file summary produced by the analyzer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictMetadata {
    pub path: PathBuf,
    pub conflict_type: ConflictType,
    pub complexity: Complexity,
    pub snippets: Vec<SnippetPair>,
}

/// Why a file was proposed as context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateReason {
    DirectDependency,
    SemanticSimilarity,
    ArchitecturalPattern,
    RecentChange,
}

impl CandidateReason {
    pub fn as_str(&self) -> &str {
        match self {
            CandidateReason::DirectDependency => "direct_dependency",
            CandidateReason::SemanticSimilarity => "semantic_similarity",
            CandidateReason::ArchitecturalPattern => "architectural_pattern",
            CandidateReason::RecentChange => "recent_change",
        }
    }
}

impl fmt::Display for CandidateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file proposed as context for resolving a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateEntry {
    pub path: PathBuf,
    pub reason: CandidateReason,
}

/// Final action chosen for a conflicted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    KeepCurrent,
    KeepIncoming,
    ManualReview,
}

impl Decision {
    pub fn as_str(&self) -> &str {
        match self {
            Decision::KeepCurrent => "keep_current",
            Decision::KeepIncoming => "keep_incoming",
            Decision::ManualReview => "manual_review",
        }
    }

    /// The side this decision keeps, or `None` when a human has to look.
    pub fn choice(&self) -> Option<Choice> {
        match self {
            Decision::KeepCurrent => Some(Choice::Current),
            Decision::KeepIncoming => Some(Choice::Incoming),
            Decision::ManualReview => None,
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complexity_boundaries() {
        assert_eq!(Complexity::from_count(0), Complexity::Low);
        assert_eq!(Complexity::from_count(1), Complexity::Low);
        assert_eq!(Complexity::from_count(2), Complexity::Medium);
        assert_eq!(Complexity::from_count(3), Complexity::Medium);
        assert_eq!(Complexity::from_count(4), Complexity::High);
    }

    #[test]
    fn test_choice_parsing() {
        assert_eq!("current".parse::<Choice>().unwrap(), Choice::Current);
        assert_eq!("incoming".parse::<Choice>().unwrap(), Choice::Incoming);
        assert!("theirs".parse::<Choice>().is_err());
    }

    #[test]
    fn test_decision_serializes_snake_case() {
        let json = serde_json::to_string(&Decision::ManualReview).unwrap();
        assert_eq!(json, "\"manual_review\"");
        assert_eq!(Decision::KeepIncoming.choice(), Some(Choice::Incoming));
        assert_eq!(Decision::ManualReview.choice(), None);
    }

    #[test]
    fn test_unified_diff_mentions_both_sides() {
        let conflict = MergeConflict {
            current: "foo()\n".into(),
            incoming: "bar()\n".into(),
            base: None,
            position: 0,
        };
        let diff = conflict.unified_diff();
        assert!(diff.contains("-foo()"));
        assert!(diff.contains("+bar()"));
    }
}
