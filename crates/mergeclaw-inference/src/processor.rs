use merge_engine::{
    analyze_conflict, resolve, Choice, ConflictRef, ContextManager, Decision, DecisionEngine,
    DecisionResult, Threshold,
};
use mergeclaw_core::record::{new_run_id, now_millis};
use mergeclaw_core::{BackupStore, DecisionLog, DecisionRecord, GitRepo};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Run the reasoning chain before choosing a side.
    pub auto: bool,
    pub threshold: Threshold,
    /// Side kept without reasoning, and whenever the chain asks for review.
    pub fallback: Choice,
    /// Character budget for gathered context.
    pub max_context_size: usize,
}

/// Decision engine plus the optional context source it reasons over.
pub struct Reasoner {
    pub engine: DecisionEngine,
    pub context: Option<ContextManager>,
}

/// Outcome for one file.
#[derive(Debug, Clone, Serialize)]
pub struct FileOutcome {
    pub file: PathBuf,
    pub choice: Choice,
    pub conflicts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<Decision>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
    pub backup: PathBuf,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolveSummary {
    pub run_id: String,
    pub resolved: Vec<FileOutcome>,
    pub failed: Vec<PathBuf>,
}

/// Resolve every file git reports as conflicted.
pub async fn resolve_conflicts(
    repo: &GitRepo,
    backups: &BackupStore,
    log: &DecisionLog,
    options: &ResolveOptions,
    reasoner: Option<&mut Reasoner>,
) -> anyhow::Result<ResolveSummary> {
    let files: Vec<PathBuf> = repo
        .detect_conflicts()?
        .into_iter()
        .map(|c| repo.root().join(c.path))
        .collect();
    tracing::info!(count = files.len(), "Detected conflicted files");
    Ok(resolve_files(&files, backups, log, options, reasoner).await)
}

/// Resolve `files` one at a time. A failing file is logged and recorded in
/// the summary; the rest of the run continues.
pub async fn resolve_files(
    files: &[PathBuf],
    backups: &BackupStore,
    log: &DecisionLog,
    options: &ResolveOptions,
    mut reasoner: Option<&mut Reasoner>,
) -> ResolveSummary {
    let mut summary = ResolveSummary {
        run_id: new_run_id(),
        ..Default::default()
    };

    for file in files {
        let reasoner = if options.auto { reasoner.as_deref_mut() } else { None };
        match resolve_file(file, backups, options, reasoner).await {
            Ok(outcome) => {
                tracing::info!(
                    file = %file.display(),
                    choice = %outcome.choice,
                    conflicts = outcome.conflicts,
                    "Resolved"
                );
                let record = DecisionRecord {
                    file: outcome.file.clone(),
                    choice: outcome.choice,
                    auto: outcome.decision.is_some(),
                    decision: outcome.decision,
                    confidence: outcome.confidence,
                    conflicts: outcome.conflicts,
                    run_id: summary.run_id.clone(),
                    timestamp: now_millis(),
                };
                if let Err(e) = log.append(&record).await {
                    tracing::error!(file = %file.display(), error = %e, "Failed to write decision log");
                }
                summary.resolved.push(outcome);
            }
            Err(e) => {
                tracing::error!(file = %file.display(), error = %e, "Failed to resolve file");
                summary.failed.push(file.clone());
            }
        }
    }

    summary
}

async fn resolve_file(
    file: &Path,
    backups: &BackupStore,
    options: &ResolveOptions,
    reasoner: Option<&mut Reasoner>,
) -> anyhow::Result<FileOutcome> {
    let backup = backups.backup(file).await?;
    let content = tokio::fs::read_to_string(file).await?;
    let metadata = analyze_conflict(file, &content);
    let conflicts = metadata.snippets.len();

    let result = match reasoner {
        Some(reasoner) => Some(reason(file, metadata, options, reasoner).await),
        None => None,
    };

    let choice = result
        .as_ref()
        .and_then(|r| r.decision.choice())
        .unwrap_or(options.fallback);

    let resolved = resolve(&content, choice);
    tokio::fs::write(file, resolved).await?;

    Ok(FileOutcome {
        file: file.to_path_buf(),
        choice,
        conflicts,
        decision: result.as_ref().map(|r| r.decision),
        confidence: result.as_ref().map(|r| r.confidence),
        justification: result.map(|r| r.justification),
        backup,
    })
}

async fn reason(
    file: &Path,
    metadata: merge_engine::ConflictMetadata,
    options: &ResolveOptions,
    reasoner: &mut Reasoner,
) -> DecisionResult {
    let context = match reasoner.context.as_mut() {
        Some(manager) => {
            manager
                .relevant_context(file, options.max_context_size)
                .await
                .context
        }
        None => Vec::new(),
    };

    let conflict = ConflictRef {
        path: file.to_path_buf(),
        metadata,
        context,
    };
    let result = reasoner
        .engine
        .reason_through_merge(conflict, options.threshold)
        .await;
    tracing::info!(
        file = %file.display(),
        decision = %result.decision,
        confidence = result.confidence,
        "{}",
        result.justification
    );
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use merge_engine::{LayerOutput, ReasoningContext, ReasoningLayer};
    use std::sync::Arc;

    struct Fixed(&'static str, f64);

    #[async_trait::async_trait]
    impl ReasoningLayer for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        async fn analyze(&self, _context: &ReasoningContext) -> anyhow::Result<LayerOutput> {
            Ok(LayerOutput::new(Some(self.1), serde_json::Value::Null))
        }
    }

    fn options(auto: bool, fallback: Choice) -> ResolveOptions {
        ResolveOptions {
            auto,
            threshold: Threshold::new(0.85).unwrap(),
            fallback,
            max_context_size: 1000,
        }
    }

    fn reasoner(confidence: f64) -> Reasoner {
        Reasoner {
            engine: DecisionEngine::new(vec![
                Arc::new(Fixed("a", confidence)) as Arc<dyn ReasoningLayer>,
                Arc::new(Fixed("b", confidence)),
            ])
            .unwrap(),
            context: None,
        }
    }

    const CONFLICTED: &str = "top\n<<<<<<< HEAD\nmine\n=======\ntheirs\n>>>>>>> branch\nbottom\n";

    async fn setup(dir: &Path) -> (BackupStore, DecisionLog, PathBuf) {
        let file = dir.join("app.ts");
        std::fs::write(&file, CONFLICTED).unwrap();
        let backups = BackupStore::new(dir, dir.join(".imr/backups")).await.unwrap();
        let log = DecisionLog::new(dir.join(".imr/decisions.log.jsonl"));
        (backups, log, file)
    }

    #[tokio::test]
    async fn test_manual_resolution_uses_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let (backups, log, file) = setup(dir.path()).await;

        let summary =
            resolve_files(&[file.clone()], &backups, &log, &options(false, Choice::Incoming), None)
                .await;

        assert_eq!(summary.resolved.len(), 1);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "top\ntheirs\nbottom\n");
        let backup = &summary.resolved[0].backup;
        assert_eq!(std::fs::read_to_string(backup).unwrap(), CONFLICTED);

        let records = log.read_all().await.unwrap();
        assert_eq!(records.len(), 1);
        assert!(!records[0].auto);
        assert_eq!(records[0].choice, Choice::Incoming);
        assert_eq!(records[0].run_id, summary.run_id);
    }

    #[tokio::test]
    async fn test_auto_confident_keeps_current() {
        let dir = tempfile::tempdir().unwrap();
        let (backups, log, file) = setup(dir.path()).await;
        let mut r = reasoner(0.9);

        let summary = resolve_files(
            &[file.clone()],
            &backups,
            &log,
            &options(true, Choice::Incoming),
            Some(&mut r),
        )
        .await;

        assert_eq!(std::fs::read_to_string(&file).unwrap(), "top\nmine\nbottom\n");
        let outcome = &summary.resolved[0];
        assert_eq!(outcome.decision, Some(Decision::KeepCurrent));
        assert!((outcome.confidence.unwrap() - 0.9).abs() < 1e-9);
        assert!(log.read_all().await.unwrap()[0].auto);
    }

    #[tokio::test]
    async fn test_manual_review_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let (backups, log, file) = setup(dir.path()).await;
        let mut r = reasoner(0.2);

        let summary = resolve_files(
            &[file.clone()],
            &backups,
            &log,
            &options(true, Choice::Incoming),
            Some(&mut r),
        )
        .await;

        assert_eq!(summary.resolved[0].decision, Some(Decision::ManualReview));
        assert_eq!(summary.resolved[0].choice, Choice::Incoming);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "top\ntheirs\nbottom\n");
    }

    #[tokio::test]
    async fn test_reasoner_ignored_without_auto() {
        let dir = tempfile::tempdir().unwrap();
        let (backups, log, file) = setup(dir.path()).await;
        let mut r = reasoner(0.9);

        let summary = resolve_files(
            &[file],
            &backups,
            &log,
            &options(false, Choice::Incoming),
            Some(&mut r),
        )
        .await;

        assert_eq!(summary.resolved[0].decision, None);
        assert_eq!(summary.resolved[0].choice, Choice::Incoming);
    }

    #[tokio::test]
    async fn test_failed_file_does_not_abort_run() {
        let dir = tempfile::tempdir().unwrap();
        let (backups, log, file) = setup(dir.path()).await;
        let missing = dir.path().join("missing.ts");

        let summary = resolve_files(
            &[missing.clone(), file.clone()],
            &backups,
            &log,
            &options(false, Choice::Current),
            None,
        )
        .await;

        assert_eq!(summary.failed, vec![missing]);
        assert_eq!(summary.resolved.len(), 1);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "top\nmine\nbottom\n");
        assert_eq!(log.read_all().await.unwrap().len(), 1);
    }
}
