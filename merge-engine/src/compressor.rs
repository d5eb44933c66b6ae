//! Context-size compression with a deterministic fallback.
//!
//! Sizes are counted in characters. The compressor first checks whether the
//! texts already fit; if not it asks a [`Generator`] for a summary and keeps
//! it only when it fits the budget. Every other outcome, including generator
//! errors, ends in hard truncation of the raw concatenation.

use std::sync::Arc;

/// External text-generation service.
#[async_trait::async_trait]
pub trait Generator: Send + Sync {
    /// Generate text for `prompt`; `size_hint` is the desired maximum length
    /// in characters.
    async fn generate(&self, prompt: &str, size_hint: usize) -> anyhow::Result<String>;
}

const SEPARATOR: &str = "\n\n";

pub struct ContextCompressor {
    generator: Option<Arc<dyn Generator>>,
}

impl ContextCompressor {
    pub fn new(generator: Arc<dyn Generator>) -> Self {
        Self {
            generator: Some(generator),
        }
    }

    /// Compressor that always truncates.
    pub fn truncating() -> Self {
        Self { generator: None }
    }

    /// Fit `texts` into `budget` characters.
    ///
    /// Returns the input unchanged when it already fits, otherwise a single
    /// string of at most `budget` characters.
    pub async fn compress(&self, texts: &[String], budget: usize) -> Vec<String> {
        let joined = texts.join(SEPARATOR);
        if joined.chars().count() <= budget {
            return texts.to_vec();
        }

        if let Some(summary) = self.summarize(&joined, budget).await {
            return vec![summary];
        }

        tracing::debug!(budget, "Falling back to truncation");
        vec![truncate_chars(&joined, budget).to_string()]
    }

    async fn summarize(&self, joined: &str, budget: usize) -> Option<String> {
        let generator = self.generator.as_ref()?;
        let excerpt = truncate_chars(joined, budget.saturating_mul(2));
        let prompt = format!(
            "Summarize the following code/context to under {} characters while preserving key APIs and intent. Return raw text only.\n\n{}",
            budget, excerpt
        );

        match generator.generate(&prompt, budget).await {
            Ok(summary) if !summary.trim().is_empty() && summary.chars().count() <= budget => {
                Some(summary)
            }
            Ok(summary) => {
                tracing::debug!(
                    len = summary.chars().count(),
                    budget,
                    "Summary unusable, discarding"
                );
                None
            }
            Err(e) => {
                tracing::warn!(error = %e, "Summarizer failed");
                None
            }
        }
    }
}

/// Longest prefix of `text` with at most `max_chars` characters.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}
