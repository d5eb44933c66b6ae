//! In-memory term-frequency similarity index.
//!
//! Each indexed document is reduced to a bag of lower-cased whitespace tokens.
//! A shared document-frequency table counts, for every term, how many indexed
//! documents contain it. Queries are scored by cosine similarity where each
//! term is weighted by `tf * (1 / df)`, so terms present in many documents
//! contribute less.
//!
//! The index is not synchronized; callers sharing one instance across threads
//! must serialize access themselves.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Term -> occurrence count for one document.
pub type DocumentVector = HashMap<String, u32>;

/// Split on whitespace and lower-case every token.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace().map(str::to_lowercase).collect()
}

fn term_frequencies(text: &str) -> DocumentVector {
    let mut vector = DocumentVector::new();
    for token in tokenize(text) {
        *vector.entry(token).or_insert(0) += 1;
    }
    vector
}

#[derive(Debug, Default)]
pub struct SimilarityIndex {
    /// Documents in first-insertion order; ties in queries follow this order.
    documents: Vec<(PathBuf, DocumentVector)>,
    positions: HashMap<PathBuf, usize>,
    document_frequency: HashMap<String, usize>,
}

impl SimilarityIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index (or re-index) the document at `path`.
    ///
    /// Re-indexing keeps the document's original insertion position.
    pub fn add(&mut self, path: impl AsRef<Path>, text: &str) {
        let path = path.as_ref();
        let vector = term_frequencies(text);

        // The stale term set must be released before the new one is counted.
        if let Some(&pos) = self.positions.get(path) {
            let old = std::mem::take(&mut self.documents[pos].1);
            self.release_terms(&old);
            self.count_terms(&vector);
            self.documents[pos].1 = vector;
        } else {
            self.count_terms(&vector);
            self.positions.insert(path.to_path_buf(), self.documents.len());
            self.documents.push((path.to_path_buf(), vector));
        }
    }

    /// Drop a document from the index. Returns whether it was present.
    pub fn remove(&mut self, path: impl AsRef<Path>) -> bool {
        let Some(pos) = self.positions.remove(path.as_ref()) else {
            return false;
        };
        let (_, vector) = self.documents.remove(pos);
        self.release_terms(&vector);
        for (shifted, (p, _)) in self.documents.iter().enumerate().skip(pos) {
            self.positions.insert(p.clone(), shifted);
        }
        true
    }

    /// Paths of the `k` documents most similar to `text`, best first.
    pub fn query(&self, text: &str, k: usize) -> Vec<PathBuf> {
        self.query_scored(text, k)
            .into_iter()
            .map(|(path, _)| path)
            .collect()
    }

    /// Like [`query`](Self::query) but also returns the similarity scores.
    pub fn query_scored(&self, text: &str, k: usize) -> Vec<(PathBuf, f64)> {
        if k == 0 {
            return Vec::new();
        }
        let query = term_frequencies(text);

        let mut scored: Vec<(usize, f64)> = self
            .documents
            .iter()
            .enumerate()
            .map(|(pos, (_, vector))| (pos, self.cosine(&query, vector)))
            .collect();

        // Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));

        scored
            .into_iter()
            .take(k)
            .map(|(pos, score)| (self.documents[pos].0.clone(), score))
            .collect()
    }

    /// Number of indexed documents containing `term`.
    pub fn document_frequency(&self, term: &str) -> usize {
        self.document_frequency.get(term).copied().unwrap_or(0)
    }

    pub fn contains(&self, path: impl AsRef<Path>) -> bool {
        self.positions.contains_key(path.as_ref())
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn count_terms(&mut self, vector: &DocumentVector) {
        for term in vector.keys() {
            *self.document_frequency.entry(term.clone()).or_insert(0) += 1;
        }
    }

    fn release_terms(&mut self, vector: &DocumentVector) {
        for term in vector.keys() {
            if let Some(count) = self.document_frequency.get_mut(term) {
                *count = count.saturating_sub(1);
                if *count == 0 {
                    self.document_frequency.remove(term);
                }
            }
        }
    }

    /// Inverse document frequency; unseen terms count as df = 1.
    fn idf(&self, term: &str) -> f64 {
        let df = self.document_frequency(term).max(1);
        1.0 / df as f64
    }

    fn cosine(&self, a: &DocumentVector, b: &DocumentVector) -> f64 {
        let norm = |v: &DocumentVector| -> f64 {
            v.iter()
                .map(|(term, &tf)| {
                    let w = tf as f64 * self.idf(term);
                    w * w
                })
                .sum::<f64>()
                .sqrt()
        };

        let norm_a = norm(a);
        let norm_b = norm(b);
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }

        let dot: f64 = a
            .iter()
            .filter_map(|(term, &tf_a)| {
                b.get(term).map(|&tf_b| {
                    let idf = self.idf(term);
                    (tf_a as f64 * idf) * (tf_b as f64 * idf)
                })
            })
            .sum();

        dot / (norm_a * norm_b)
    }
}
