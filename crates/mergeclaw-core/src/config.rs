use merge_engine::Threshold;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory (relative to the repository root) holding settings, backups,
/// logs and the decision log.
pub const STATE_DIR: &str = ".imr";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub project: ProjectSettings,
    #[serde(default)]
    pub reasoning: ReasoningSettings,
    #[serde(default)]
    pub model: ModelSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectSettings {
    #[serde(default = "default_project_name")]
    pub name: String,
    /// Free-form project kind (react, vue, python, ...), passed to layers.
    #[serde(default = "default_project_kind")]
    pub kind: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            kind: default_project_kind(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningSettings {
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
    /// Character budget for compressed context.
    #[serde(default = "default_max_context_size")]
    pub max_context_size: usize,
    #[serde(default = "default_true")]
    pub enable_context_analysis: bool,
}

impl Default for ReasoningSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: default_confidence_threshold(),
            max_context_size: default_max_context_size(),
            enable_context_analysis: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Base URL of an OpenAI-compatible server.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Maximum requests per second; 0 disables throttling.
    #[serde(default = "default_rate_limit_qps")]
    pub rate_limit_qps: f64,
    /// Environment variable holding the API key, if the server needs one.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            max_tokens: default_max_tokens(),
            rate_limit_qps: default_rate_limit_qps(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_project_name() -> String {
    "Project".into()
}
fn default_project_kind() -> String {
    "generic".into()
}
fn default_confidence_threshold() -> f64 {
    0.85
}
fn default_max_context_size() -> usize {
    50_000
}
fn default_true() -> bool {
    true
}
fn default_endpoint() -> String {
    "http://127.0.0.1:11434".into()
}
fn default_model() -> String {
    "gemma3-1b".into()
}
fn default_max_tokens() -> u32 {
    8192
}
fn default_rate_limit_qps() -> f64 {
    2.0
}
fn default_api_key_env() -> String {
    "MERGECLAW_API_KEY".into()
}
fn default_timeout_secs() -> u64 {
    120
}

impl Settings {
    /// `<repo>/.imr/settings.json`
    pub fn path_for(repo: &Path) -> PathBuf {
        repo.join(STATE_DIR).join("settings.json")
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings, falling back to defaults when the file does not exist.
    pub fn load_or_default(path: &Path) -> anyhow::Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the engine must never see.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.threshold()?;
        if self.model.rate_limit_qps < 0.0 || !self.model.rate_limit_qps.is_finite() {
            anyhow::bail!(
                "model.rate_limit_qps must be a non-negative number, got {}",
                self.model.rate_limit_qps
            );
        }
        Ok(())
    }

    pub fn threshold(&self) -> anyhow::Result<Threshold> {
        Ok(Threshold::new(self.reasoning.confidence_threshold)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_file_uses_defaults() {
        let settings: Settings =
            serde_json::from_str(r#"{ "reasoning": { "confidence_threshold": 0.7 } }"#).unwrap();
        assert_eq!(settings.reasoning.confidence_threshold, 0.7);
        assert_eq!(settings.reasoning.max_context_size, 50_000);
        assert!(settings.reasoning.enable_context_analysis);
        assert_eq!(settings.model.max_tokens, 8192);
        assert_eq!(settings.project.name, "Project");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = Settings::path_for(dir.path());
        let mut settings = Settings::default();
        settings.project.kind = "react".into();
        settings.save(&path).unwrap();

        let loaded = Settings::load(&path).unwrap();
        assert_eq!(loaded.project.kind, "react");
        assert_eq!(loaded.reasoning.confidence_threshold, 0.85);
    }

    #[test]
    fn test_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_or_default(&Settings::path_for(dir.path())).unwrap();
        assert_eq!(settings.model.api_key_env, "MERGECLAW_API_KEY");
    }

    #[test]
    fn test_invalid_threshold_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{ "reasoning": { "confidence_threshold": 1.5 } }"#).unwrap();
        let err = Settings::load(&path).unwrap_err();
        assert!(err.to_string().contains("[0, 1]"));
    }

    #[test]
    fn test_negative_rate_limit_rejected() {
        let mut settings = Settings::default();
        settings.model.rate_limit_qps = -1.0;
        assert!(settings.validate().is_err());
    }
}
