use crate::client::JsonGenerator;
use crate::prompt::{layer_prompt, system_prompt};
use merge_engine::{LayerOutput, ReasoningContext, ReasoningLayer};
use std::sync::Arc;

/// Default phases, in chain order, with what each one is asked to weigh.
pub const DEFAULT_PHASES: [(&str, &str); 5] = [
    (
        "contextual",
        "Explain what each side of the conflict is trying to achieve given the surrounding code.",
    ),
    (
        "semantic",
        "Compare the behaviour of the two sides and say whether they are equivalent, complementary or contradictory.",
    ),
    (
        "impact",
        "Assess what breaks elsewhere in the codebase if the current side is kept and if the incoming side is kept.",
    ),
    (
        "consistency",
        "Check which side matches the conventions and APIs used by the related context.",
    ),
    (
        "meta",
        "Review the earlier phases for contradictions and state how much the chain as a whole can be trusted.",
    ),
];

/// Reasoning layer backed by a generation service.
pub struct LlmLayer {
    name: String,
    focus: String,
    system: String,
    generator: Arc<dyn JsonGenerator>,
}

impl LlmLayer {
    pub fn new(
        name: impl Into<String>,
        focus: impl Into<String>,
        project_kind: &str,
        generator: Arc<dyn JsonGenerator>,
    ) -> Self {
        Self {
            name: name.into(),
            focus: focus.into(),
            system: system_prompt(project_kind),
            generator,
        }
    }
}

#[async_trait::async_trait]
impl ReasoningLayer for LlmLayer {
    fn name(&self) -> &str {
        &self.name
    }

    async fn analyze(&self, context: &ReasoningContext) -> anyhow::Result<LayerOutput> {
        let prompt = layer_prompt(&self.name, &self.focus, context);
        let analysis = self.generator.generate_json(&self.system, &prompt).await?;
        let output = LayerOutput::from_json(&self.name, analysis);
        tracing::debug!(layer = %self.name, confidence = ?output.confidence, "Layer analysis received");
        Ok(output)
    }
}

/// The five default layers sharing one generator.
pub fn default_layers(
    generator: Arc<dyn JsonGenerator>,
    project_kind: &str,
) -> Vec<Arc<dyn ReasoningLayer>> {
    DEFAULT_PHASES
        .iter()
        .map(|(name, focus)| {
            Arc::new(LlmLayer::new(*name, *focus, project_kind, generator.clone()))
                as Arc<dyn ReasoningLayer>
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use merge_engine::{analyze_conflict, ConflictRef, Decision, DecisionEngine, Threshold};
    use serde_json::{json, Value};
    use std::path::Path;
    use std::sync::Mutex;

    /// Replies with a fixed confidence per phase and records every prompt.
    struct FakeGenerator {
        prompts: Mutex<Vec<String>>,
        confidence: f64,
    }

    #[async_trait::async_trait]
    impl JsonGenerator for FakeGenerator {
        async fn generate_json(&self, _system: &str, prompt: &str) -> anyhow::Result<Value> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            let phase = prompt
                .lines()
                .next()
                .and_then(|l| l.strip_prefix("REASONING PHASE: "))
                .unwrap_or("unknown")
                .to_lowercase();
            let mut reply = serde_json::Map::new();
            reply.insert(format!("{}_analysis", phase), json!("looks fine"));
            reply.insert(format!("{}_confidence", phase), json!(self.confidence));
            Ok(Value::Object(reply))
        }
    }

    fn conflict() -> ConflictRef {
        let path = Path::new("src/app.ts");
        ConflictRef {
            path: path.to_path_buf(),
            metadata: analyze_conflict(path, "<<<<<<< HEAD\na\n=======\nb\n>>>>>>> x\n"),
            context: Vec::new(),
        }
    }

    #[test]
    fn test_default_layer_order() {
        let generator = Arc::new(FakeGenerator {
            prompts: Mutex::new(Vec::new()),
            confidence: 0.5,
        });
        let engine = DecisionEngine::new(default_layers(generator, "react")).unwrap();
        assert_eq!(
            engine.layer_names(),
            vec!["contextual", "semantic", "impact", "consistency", "meta"]
        );
    }

    #[tokio::test]
    async fn test_layers_see_previous_records() {
        let generator = Arc::new(FakeGenerator {
            prompts: Mutex::new(Vec::new()),
            confidence: 0.6,
        });
        let engine = DecisionEngine::new(default_layers(generator.clone(), "react")).unwrap();
        let result = engine
            .reason_through_merge(conflict(), Threshold::new(0.9).unwrap())
            .await;

        assert_eq!(result.decision, Decision::KeepCurrent);
        assert_eq!(result.context.records().len(), 5);
        assert_eq!(result.context.get("impact").unwrap().confidence, Some(0.6));

        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("(none)"));
        assert!(prompts[4].contains("\"layer\":\"consistency\""));
    }

    #[tokio::test]
    async fn test_confident_layers_exit_early() {
        let generator = Arc::new(FakeGenerator {
            prompts: Mutex::new(Vec::new()),
            confidence: 0.95,
        });
        let engine = DecisionEngine::new(default_layers(generator.clone(), "generic")).unwrap();
        let result = engine
            .reason_through_merge(conflict(), Threshold::new(0.85).unwrap())
            .await;

        assert_eq!(result.decision, Decision::KeepCurrent);
        assert_eq!(result.context.records().len(), 2);
        assert_eq!(generator.prompts.lock().unwrap().len(), 2);
    }
}
