//! Sequential reasoning chain and decision synthesis.
//!
//! A [`DecisionEngine`] runs an ordered list of [`ReasoningLayer`]s over one
//! [`ReasoningContext`]. Each layer sees every record committed before it and
//! returns a [`LayerOutput`]; the engine alone appends that output to the
//! context, so records are never overwritten or reordered.
//!
//! After each layer the engine folds the layer's confidence (if any) into a
//! running mean. Once at least two layers have reported and the mean reaches
//! the caller's threshold, the chain stops early with `keep_current`.
//! Otherwise the final mean decides between `keep_current` (>= 0.5) and
//! `manual_review`. The engine never chooses `keep_incoming` on its own.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::{EngineError, EngineResult};
use crate::types::{ConflictMetadata, Decision};

/// Minimum number of confident layers before an early exit is allowed.
const EARLY_EXIT_MIN_LAYERS: usize = 2;
/// Mean confidence at or above which a completed chain keeps the current side.
const KEEP_CURRENT_FLOOR: f64 = 0.5;

/// Confidence threshold validated to lie within `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct Threshold(f64);

impl Threshold {
    pub fn new(value: f64) -> EngineResult<Self> {
        if (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(EngineError::InvalidThreshold(value))
        }
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Threshold {
    type Error = EngineError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

/// What the engine is reasoning about.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictRef {
    pub path: PathBuf,
    pub metadata: ConflictMetadata,
    /// Compressed surrounding context, possibly empty.
    pub context: Vec<String>,
}

/// Result a layer hands back to the engine.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayerOutput {
    pub confidence: Option<f64>,
    pub analysis: Value,
}

impl LayerOutput {
    pub fn new(confidence: Option<f64>, analysis: Value) -> Self {
        Self {
            confidence,
            analysis,
        }
    }

    /// Adapt a JSON object produced by a generation service.
    ///
    /// The confidence is read from `"<layer>_confidence"`, falling back to
    /// `"confidence"` only when the layer key is absent. A present but
    /// non-numeric value yields no confidence.
    pub fn from_json(layer: &str, analysis: Value) -> Self {
        let confidence = match analysis.get(format!("{}_confidence", layer)) {
            Some(value) => value.as_f64(),
            None => analysis.get("confidence").and_then(Value::as_f64),
        };
        Self {
            confidence,
            analysis,
        }
    }
}

/// One committed entry in the reasoning context.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerRecord {
    pub layer: String,
    /// Usable confidence after validation, if the layer reported one.
    pub confidence: Option<f64>,
    pub analysis: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Ordered, append-only record of one resolution attempt.
#[derive(Debug, Clone, Serialize)]
pub struct ReasoningContext {
    conflict: ConflictRef,
    records: Vec<LayerRecord>,
}

impl ReasoningContext {
    pub fn new(conflict: ConflictRef) -> Self {
        Self {
            conflict,
            records: Vec::new(),
        }
    }

    pub fn conflict(&self) -> &ConflictRef {
        &self.conflict
    }

    /// Records committed so far, oldest first.
    pub fn records(&self) -> &[LayerRecord] {
        &self.records
    }

    pub fn get(&self, layer: &str) -> Option<&LayerRecord> {
        self.records.iter().find(|r| r.layer == layer)
    }

    fn commit(&mut self, record: LayerRecord) {
        debug_assert!(self.get(&record.layer).is_none());
        self.records.push(record);
    }
}

/// An independent analysis stage in the reasoning chain.
#[async_trait::async_trait]
pub trait ReasoningLayer: Send + Sync {
    /// Unique name; also the prefix of the layer's confidence key.
    fn name(&self) -> &str;

    async fn analyze(&self, context: &ReasoningContext) -> anyhow::Result<LayerOutput>;
}

/// Outcome of one pass through the chain.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionResult {
    pub decision: Decision,
    pub confidence: f64,
    pub justification: String,
    pub context: ReasoningContext,
}

pub struct DecisionEngine {
    layers: Vec<Arc<dyn ReasoningLayer>>,
}

impl DecisionEngine {
    /// Build an engine; layer names must be unique.
    pub fn new(layers: Vec<Arc<dyn ReasoningLayer>>) -> EngineResult<Self> {
        let mut names = HashSet::new();
        for layer in &layers {
            if !names.insert(layer.name().to_string()) {
                return Err(EngineError::DuplicateLayer(layer.name().to_string()));
            }
        }
        Ok(Self { layers })
    }

    pub fn layer_names(&self) -> Vec<&str> {
        self.layers.iter().map(|l| l.name()).collect()
    }

    /// Run the chain for `conflict` and synthesize a decision.
    pub async fn reason_through_merge(
        &self,
        conflict: ConflictRef,
        threshold: Threshold,
    ) -> DecisionResult {
        let mut context = ReasoningContext::new(conflict);
        let mut mean = RunningMean::default();

        for layer in &self.layers {
            let name = layer.name().to_string();
            let record = match layer.analyze(&context).await {
                Ok(output) => LayerRecord {
                    layer: name.clone(),
                    confidence: output.confidence.and_then(usable_confidence),
                    analysis: output.analysis,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(layer = %name, error = %e, "Reasoning layer failed");
                    LayerRecord {
                        layer: name.clone(),
                        confidence: None,
                        analysis: Value::Null,
                        error: Some(e.to_string()),
                    }
                }
            };

            if let Some(confidence) = record.confidence {
                mean.push(confidence);
            }
            tracing::debug!(
                layer = %name,
                confidence = ?record.confidence,
                mean = mean.value(),
                "Layer committed"
            );
            context.commit(record);

            if mean.count >= EARLY_EXIT_MIN_LAYERS && mean.value() >= threshold.value() {
                let confidence = mean.value();
                tracing::info!(layer = %name, confidence, "Early exit from reasoning chain");
                return DecisionResult {
                    decision: Decision::KeepCurrent,
                    confidence,
                    justification: format!(
                        "early exit after layer '{}': mean confidence {:.3} over {} layers reached threshold {:.3}",
                        name,
                        confidence,
                        mean.count,
                        threshold.value()
                    ),
                    context,
                };
            }
        }

        let confidence = mean.value();
        // Completed chains lean towards the current side; there is no path to
        // keep_incoming here.
        let (decision, justification) = if mean.count == 0 {
            (
                Decision::ManualReview,
                "no layer reported a usable confidence".to_string(),
            )
        } else if confidence >= KEEP_CURRENT_FLOOR {
            (
                Decision::KeepCurrent,
                format!(
                    "mean confidence {:.3} over {} layers is at least {:.1}",
                    confidence, mean.count, KEEP_CURRENT_FLOOR
                ),
            )
        } else {
            (
                Decision::ManualReview,
                format!(
                    "mean confidence {:.3} over {} layers is below {:.1}",
                    confidence, mean.count, KEEP_CURRENT_FLOOR
                ),
            )
        };

        DecisionResult {
            decision,
            confidence,
            justification,
            context,
        }
    }
}

/// Non-finite values are discarded; finite ones are clamped into `[0, 1]`.
fn usable_confidence(value: f64) -> Option<f64> {
    value.is_finite().then(|| value.clamp(0.0, 1.0))
}

#[derive(Debug, Default, Clone, Copy)]
struct RunningMean {
    sum: f64,
    count: usize,
}

impl RunningMean {
    fn push(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Complexity, ConflictType};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Reply {
        Confidence(Option<f64>),
        Json(Value),
        Fail,
    }

    struct Scripted {
        name: &'static str,
        reply: Reply,
        calls: Arc<AtomicUsize>,
        seen: Arc<std::sync::Mutex<Vec<String>>>,
    }

    impl Scripted {
        fn new(name: &'static str, reply: Reply) -> Self {
            Self {
                name,
                reply,
                calls: Arc::new(AtomicUsize::new(0)),
                seen: Arc::new(std::sync::Mutex::new(Vec::new())),
            }
        }
    }

    #[async_trait::async_trait]
    impl ReasoningLayer for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn analyze(&self, context: &ReasoningContext) -> anyhow::Result<LayerOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.seen.lock().unwrap() = context.records().iter().map(|r| r.layer.clone()).collect();
            match &self.reply {
                Reply::Confidence(c) => Ok(LayerOutput::new(*c, json!({ "layer": self.name }))),
                Reply::Json(v) => Ok(LayerOutput::from_json(self.name, v.clone())),
                Reply::Fail => anyhow::bail!("service unavailable"),
            }
        }
    }

    fn conflict() -> ConflictRef {
        ConflictRef {
            path: PathBuf::from("src/app.ts"),
            metadata: ConflictMetadata {
                path: PathBuf::from("src/app.ts"),
                conflict_type: ConflictType::Code,
                complexity: Complexity::Low,
                snippets: Vec::new(),
            },
            context: Vec::new(),
        }
    }

    fn engine(layers: Vec<Scripted>) -> DecisionEngine {
        DecisionEngine::new(
            layers
                .into_iter()
                .map(|l| Arc::new(l) as Arc<dyn ReasoningLayer>)
                .collect(),
        )
        .unwrap()
    }

    fn threshold(v: f64) -> Threshold {
        Threshold::new(v).unwrap()
    }

    #[test]
    fn test_threshold_bounds() {
        assert!(Threshold::new(0.0).is_ok());
        assert!(Threshold::new(1.0).is_ok());
        assert!(matches!(
            Threshold::new(1.2),
            Err(EngineError::InvalidThreshold(_))
        ));
        assert!(Threshold::new(-0.1).is_err());
        assert!(Threshold::try_from(f64::NAN).is_err());
    }

    #[test]
    fn test_duplicate_layer_names_rejected() {
        let layers: Vec<Arc<dyn ReasoningLayer>> = vec![
            Arc::new(Scripted::new("meta", Reply::Confidence(None))),
            Arc::new(Scripted::new("meta", Reply::Confidence(None))),
        ];
        assert!(matches!(
            DecisionEngine::new(layers),
            Err(EngineError::DuplicateLayer(name)) if name == "meta"
        ));
    }

    #[test]
    fn test_from_json_confidence_lookup() {
        let out = LayerOutput::from_json("impact", json!({ "impact_confidence": 0.7, "confidence": 0.1 }));
        assert_eq!(out.confidence, Some(0.7));

        let out = LayerOutput::from_json("impact", json!({ "confidence": 0.4 }));
        assert_eq!(out.confidence, Some(0.4));

        let out = LayerOutput::from_json("impact", json!({ "impact_confidence": "high" }));
        assert_eq!(out.confidence, None);

        // A present layer key shadows the generic one even when unusable.
        let out = LayerOutput::from_json(
            "impact",
            json!({ "impact_confidence": "high", "confidence": 0.4 }),
        );
        assert_eq!(out.confidence, None);

        let out = LayerOutput::from_json("impact", json!({ "raw": "not json" }));
        assert_eq!(out.confidence, None);
    }

    #[tokio::test]
    async fn test_early_exit_skips_remaining_layers() {
        let third = Scripted::new("meta", Reply::Confidence(Some(0.1)));
        let third_calls = third.calls.clone();
        let engine = engine(vec![
            Scripted::new("contextual", Reply::Confidence(Some(0.9))),
            Scripted::new("semantic", Reply::Confidence(Some(0.85))),
            third,
        ]);

        let result = engine.reason_through_merge(conflict(), threshold(0.8)).await;
        assert_eq!(result.decision, Decision::KeepCurrent);
        assert!((result.confidence - 0.875).abs() < 1e-9);
        assert!(result.justification.contains("semantic"));
        assert_eq!(third_calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.context.records().len(), 2);
    }

    #[tokio::test]
    async fn test_single_confident_layer_cannot_exit_early() {
        let second = Scripted::new("semantic", Reply::Confidence(None));
        let second_calls = second.calls.clone();
        let engine = engine(vec![
            Scripted::new("contextual", Reply::Confidence(Some(0.99))),
            second,
        ]);
        let result = engine.reason_through_merge(conflict(), threshold(0.5)).await;
        assert_eq!(second_calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.decision, Decision::KeepCurrent);
        assert!((result.confidence - 0.99).abs() < 1e-9);
        assert!(!result.justification.contains("early exit"));
    }

    #[tokio::test]
    async fn test_full_pass_low_mean_needs_review() {
        let engine = engine(vec![
            Scripted::new("contextual", Reply::Confidence(Some(0.3))),
            Scripted::new("semantic", Reply::Confidence(Some(0.4))),
            Scripted::new("impact", Reply::Confidence(Some(0.2))),
        ]);
        let result = engine.reason_through_merge(conflict(), threshold(0.8)).await;
        assert_eq!(result.decision, Decision::ManualReview);
        assert!((result.confidence - 0.3).abs() < 1e-9);
        assert_eq!(result.context.records().len(), 3);
    }

    #[tokio::test]
    async fn test_mean_between_half_and_threshold_keeps_current() {
        let engine = engine(vec![
            Scripted::new("contextual", Reply::Confidence(Some(0.6))),
            Scripted::new("semantic", Reply::Confidence(Some(0.7))),
        ]);
        let result = engine.reason_through_merge(conflict(), threshold(0.9)).await;
        assert_eq!(result.decision, Decision::KeepCurrent);
        assert!((result.confidence - 0.65).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_no_usable_confidence() {
        let engine = engine(vec![
            Scripted::new("contextual", Reply::Json(json!({ "contextual_confidence": "n/a" }))),
            Scripted::new("semantic", Reply::Fail),
        ]);
        let result = engine.reason_through_merge(conflict(), threshold(0.8)).await;
        assert_eq!(result.decision, Decision::ManualReview);
        assert_eq!(result.confidence, 0.0);
        let failed = result.context.get("semantic").unwrap();
        assert!(failed.error.as_deref().unwrap().contains("service unavailable"));
    }

    #[tokio::test]
    async fn test_failed_layer_does_not_stop_chain() {
        let engine = engine(vec![
            Scripted::new("contextual", Reply::Confidence(Some(0.9))),
            Scripted::new("semantic", Reply::Fail),
            Scripted::new("impact", Reply::Json(json!({ "confidence": 0.8 }))),
        ]);
        let result = engine.reason_through_merge(conflict(), threshold(0.8)).await;
        assert_eq!(result.decision, Decision::KeepCurrent);
        assert!(result.justification.contains("impact"));
        assert_eq!(result.context.records().len(), 3);
    }

    #[tokio::test]
    async fn test_layers_observe_previous_records_in_order() {
        let last = Scripted::new("meta", Reply::Confidence(None));
        let seen = last.seen.clone();
        let engine = engine(vec![
            Scripted::new("contextual", Reply::Confidence(None)),
            Scripted::new("semantic", Reply::Confidence(None)),
            last,
        ]);
        let result = engine.reason_through_merge(conflict(), threshold(0.8)).await;
        assert_eq!(*seen.lock().unwrap(), vec!["contextual", "semantic"]);
        let names: Vec<&str> = result.context.records().iter().map(|r| r.layer.as_str()).collect();
        assert_eq!(names, vec!["contextual", "semantic", "meta"]);
        assert_eq!(result.context.conflict().path, PathBuf::from("src/app.ts"));
    }

    #[tokio::test]
    async fn test_confidence_sanitized() {
        let engine = engine(vec![
            Scripted::new("contextual", Reply::Confidence(Some(f64::NAN))),
            Scripted::new("semantic", Reply::Confidence(Some(1.7))),
            Scripted::new("impact", Reply::Confidence(Some(0.9))),
        ]);
        let result = engine.reason_through_merge(conflict(), threshold(0.9)).await;
        assert_eq!(result.context.get("contextual").unwrap().confidence, None);
        assert_eq!(result.context.get("semantic").unwrap().confidence, Some(1.0));
        assert_eq!(result.decision, Decision::KeepCurrent);
        assert!((result.confidence - 0.95).abs() < 1e-9);
        assert!(result.confidence <= 1.0);
    }

    #[tokio::test]
    async fn test_empty_chain() {
        let engine = DecisionEngine::new(Vec::new()).unwrap();
        let result = engine.reason_through_merge(conflict(), threshold(0.5)).await;
        assert_eq!(result.decision, Decision::ManualReview);
        assert_eq!(result.confidence, 0.0);
        assert!(result.context.records().is_empty());
    }
}
