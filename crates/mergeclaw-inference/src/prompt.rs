use merge_engine::ReasoningContext;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

/// Build the messages array for the chat completions API.
pub fn build_messages(system: &str, prompt: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage {
            role: Role::System,
            content: system.to_string(),
        },
        ChatMessage {
            role: Role::User,
            content: prompt.to_string(),
        },
    ]
}

/// Conflicts beyond this many are summarized by count only.
const MAX_PROMPT_CONFLICTS: usize = 8;

pub fn system_prompt(project_kind: &str) -> String {
    format!(
        "You review git merge conflicts in a {} project. Answer with a single JSON object and nothing else.",
        project_kind
    )
}

/// Render the user prompt for one reasoning phase.
///
/// Contains the phase heading, the conflict summary with a diff per
/// conflict, the compressed context and every earlier layer record.
pub fn layer_prompt(phase: &str, focus: &str, context: &ReasoningContext) -> String {
    let conflict = context.conflict();
    let meta = &conflict.metadata;
    let mut out = String::new();

    let _ = writeln!(out, "REASONING PHASE: {}", phase.to_uppercase());
    let _ = writeln!(out, "{}", focus);
    let _ = writeln!(out);
    let _ = writeln!(out, "File: {}", conflict.path.display());
    let _ = writeln!(
        out,
        "Type: {:?}, complexity: {:?}, conflicts: {}",
        meta.conflict_type,
        meta.complexity,
        meta.snippets.len()
    );

    for (i, snippet) in meta.snippets.iter().take(MAX_PROMPT_CONFLICTS).enumerate() {
        let _ = writeln!(out, "\n## Conflict {}", i + 1);
        let _ = write!(out, "{}", snippet.unified_diff());
    }
    if meta.snippets.len() > MAX_PROMPT_CONFLICTS {
        let _ = writeln!(
            out,
            "\n({} more conflicts omitted)",
            meta.snippets.len() - MAX_PROMPT_CONFLICTS
        );
    }

    if !conflict.context.is_empty() {
        let _ = writeln!(out, "\n## Related context");
        for text in &conflict.context {
            let _ = writeln!(out, "{}", text);
        }
    }

    let _ = writeln!(out, "\n## Previous reasoning");
    if context.records().is_empty() {
        let _ = writeln!(out, "(none)");
    }
    for record in context.records() {
        let line = serde_json::to_string(record).unwrap_or_default();
        let _ = writeln!(out, "- {}", line);
    }

    let _ = writeln!(
        out,
        "\nRespond with JSON keys: {p}_analysis, {p}_reasoning_chain, {p}_confidence (a number between 0 and 1).",
        p = phase
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use merge_engine::{analyze_conflict, ConflictRef};
    use std::path::Path;

    fn context(text: &str, extra: Vec<String>) -> ReasoningContext {
        let path = Path::new("src/app.tsx");
        ReasoningContext::new(ConflictRef {
            path: path.to_path_buf(),
            metadata: analyze_conflict(path, text),
            context: extra,
        })
    }

    #[test]
    fn test_build_messages_roles() {
        let messages = build_messages("sys", "hello");
        let json = serde_json::to_value(&messages).unwrap();
        assert_eq!(json[0]["role"], "system");
        assert_eq!(json[1]["role"], "user");
        assert_eq!(json[1]["content"], "hello");
    }

    #[test]
    fn test_layer_prompt_contents() {
        let text = "<<<<<<< HEAD\nconst a = 1;\n=======\nconst a = 2;\n>>>>>>> feature\n";
        let ctx = context(text, vec!["export const b = 3;".into()]);
        let prompt = layer_prompt("semantic", "Compare behaviour.", &ctx);

        assert!(prompt.starts_with("REASONING PHASE: SEMANTIC"));
        assert!(prompt.contains("File: src/app.tsx"));
        assert!(prompt.contains("-const a = 1;"));
        assert!(prompt.contains("+const a = 2;"));
        assert!(prompt.contains("export const b = 3;"));
        assert!(prompt.contains("(none)"));
        assert!(prompt.contains("semantic_confidence"));
    }

    #[test]
    fn test_layer_prompt_caps_conflicts() {
        let block = "<<<<<<< HEAD\na\n=======\nb\n>>>>>>> x\n";
        let ctx = context(&block.repeat(10), Vec::new());
        let prompt = layer_prompt("impact", "", &ctx);
        assert!(prompt.contains("## Conflict 8"));
        assert!(!prompt.contains("## Conflict 9"));
        assert!(prompt.contains("(2 more conflicts omitted)"));
    }
}
