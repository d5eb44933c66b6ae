use anyhow::Context;
use clap::{Parser, Subcommand};
use merge_engine::context::DEFAULT_INDEX_LIMIT;
use merge_engine::{
    analyze_conflict, Choice, ContextCompressor, ContextManager, DecisionEngine, ImportGraph,
    Threshold,
};
use mergeclaw_core::config::STATE_DIR;
use mergeclaw_core::logging::init_logging;
use mergeclaw_core::{BackupStore, DecisionLog, DecisionStats, GitRepo, Settings};
use mergeclaw_inference::{default_layers, resolve_conflicts, GenerationClient, Reasoner, ResolveOptions};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(
    name = "mergeclaw",
    about = "Resolve git merge conflicts, optionally with a reasoning model"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the git repository
    #[arg(long, global = true, default_value = ".")]
    repo: PathBuf,

    /// Log at debug level
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .imr, write default settings and install git hooks
    Init {
        /// Accept defaults without prompting
        #[arg(long, short)]
        yes: bool,
    },
    /// Print conflict metadata for one file, or for every conflicted file
    Analyze {
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Resolve every conflicted file in the repository
    Resolve {
        /// Run the reasoning chain to pick a side
        #[arg(long)]
        auto: bool,
        /// Override the configured early-exit threshold
        #[arg(long)]
        confidence_threshold: Option<f64>,
        /// Side to keep without reasoning or when review is needed
        #[arg(long, default_value = "current")]
        choice: Choice,
    },
    /// Show the files selected as context for a conflicted file
    Context {
        file: PathBuf,
        /// Character budget for the compressed context
        #[arg(long)]
        max_size: Option<usize>,
    },
    /// Show conflicted files and decision log statistics
    Status,
}

const PROJECT_KINDS: [&str; 7] = ["generic", "react", "vue", "angular", "node", "python", "rust"];

fn state_dir(repo: &Path) -> PathBuf {
    repo.join(STATE_DIR)
}

fn decision_log(repo: &Path) -> DecisionLog {
    DecisionLog::new(state_dir(repo).join("decisions.log.jsonl"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let repo = cli
        .repo
        .canonicalize()
        .with_context(|| format!("repository not found: {}", cli.repo.display()))?;

    let _guard = init_logging(&state_dir(&repo).join("logs"), cli.verbose)?;

    match &cli.command {
        Commands::Init { yes } => cmd_init(&repo, *yes).await,
        Commands::Analyze { file } => cmd_analyze(&repo, file.as_deref()).await,
        Commands::Resolve {
            auto,
            confidence_threshold,
            choice,
        } => cmd_resolve(&repo, *auto, *confidence_threshold, *choice).await,
        Commands::Context { file, max_size } => cmd_context(&repo, file, *max_size).await,
        Commands::Status => cmd_status(&repo).await,
    }
}

async fn cmd_init(repo: &Path, yes: bool) -> anyhow::Result<()> {
    let settings_path = Settings::path_for(repo);
    let mut settings = Settings::load_or_default(&settings_path)?;

    if !yes && std::io::stdin().is_terminal() {
        settings.project.name = dialoguer::Input::<String>::new()
            .with_prompt("Project name")
            .default(settings.project.name.clone())
            .interact_text()?;
        let current = PROJECT_KINDS
            .iter()
            .position(|k| *k == settings.project.kind)
            .unwrap_or(0);
        let idx = dialoguer::Select::new()
            .with_prompt("Project kind")
            .items(&PROJECT_KINDS)
            .default(current)
            .interact()?;
        settings.project.kind = PROJECT_KINDS[idx].to_string();
    }

    std::fs::create_dir_all(state_dir(repo).join("backups"))?;
    settings.save(&settings_path)?;
    println!("Settings written to {}", settings_path.display());

    if repo.join(".git").is_dir() {
        for hook in GitRepo::new(repo).install_hooks()? {
            println!("Installed {}", hook.display());
        }
    } else {
        tracing::warn!(repo = %repo.display(), "Not a git checkout; skipping hook installation");
    }
    Ok(())
}

async fn cmd_analyze(repo: &Path, file: Option<&Path>) -> anyhow::Result<()> {
    let files = match file {
        Some(f) => vec![f.to_path_buf()],
        None => GitRepo::new(repo)
            .detect_conflicts()?
            .into_iter()
            .map(|c| repo.join(c.path))
            .collect(),
    };

    let mut report = Vec::new();
    for path in files {
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => report.push(analyze_conflict(&path, &content)),
            Err(e) => tracing::warn!(file = %path.display(), error = %e, "Could not read file"),
        }
    }

    if file.is_some() {
        if let Some(metadata) = report.first() {
            println!("{}", serde_json::to_string_pretty(metadata)?);
        }
    } else {
        println!("{}", serde_json::to_string_pretty(&report)?);
    }
    Ok(())
}

async fn cmd_resolve(
    repo: &Path,
    auto: bool,
    confidence_threshold: Option<f64>,
    choice: Choice,
) -> anyhow::Result<()> {
    let settings = Settings::load_or_default(&Settings::path_for(repo))?;
    let threshold = match confidence_threshold {
        Some(value) => Threshold::new(value)?,
        None => settings.threshold()?,
    };
    let options = ResolveOptions {
        auto,
        threshold,
        fallback: choice,
        max_context_size: settings.reasoning.max_context_size,
    };

    let git = GitRepo::new(repo);
    let backups = BackupStore::new(repo, state_dir(repo).join("backups")).await?;
    let log = decision_log(repo);

    let mut reasoner = if auto {
        Some(build_reasoner(repo, &settings).await?)
    } else {
        None
    };

    let summary = resolve_conflicts(&git, &backups, &log, &options, reasoner.as_mut()).await?;
    if summary.resolved.is_empty() && summary.failed.is_empty() {
        println!("No conflicts detected.");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    if !summary.failed.is_empty() {
        anyhow::bail!("{} file(s) could not be resolved", summary.failed.len());
    }
    Ok(())
}

async fn build_reasoner(repo: &Path, settings: &Settings) -> anyhow::Result<Reasoner> {
    let client = Arc::new(GenerationClient::from_settings(&settings.model)?);
    match client.health_check().await {
        Ok(()) => tracing::info!(model = client.model(), "Generation server is reachable"),
        Err(e) => tracing::warn!(
            endpoint = %settings.model.endpoint,
            error = %e,
            "Generation server not reachable; layers will report errors"
        ),
    }

    let engine = DecisionEngine::new(default_layers(client.clone(), &settings.project.kind))?;
    let context = if settings.reasoning.enable_context_analysis {
        let mut manager = ContextManager::new(
            repo,
            Box::new(ImportGraph),
            Box::new(GitRepo::new(repo)),
            ContextCompressor::new(client),
        );
        manager.index_repository(DEFAULT_INDEX_LIMIT)?;
        Some(manager)
    } else {
        None
    };

    Ok(Reasoner { engine, context })
}

async fn cmd_context(repo: &Path, file: &Path, max_size: Option<usize>) -> anyhow::Result<()> {
    let settings = Settings::load_or_default(&Settings::path_for(repo))?;
    let file = file
        .canonicalize()
        .with_context(|| format!("file not found: {}", file.display()))?;

    let mut manager = ContextManager::new(
        repo,
        Box::new(ImportGraph),
        Box::new(GitRepo::new(repo)),
        ContextCompressor::truncating(),
    );
    manager.index_repository(DEFAULT_INDEX_LIMIT)?;

    let candidates = manager.select_candidates(&file);
    let budget = max_size.unwrap_or(settings.reasoning.max_context_size);
    let relevant = manager.relevant_context(&file, budget).await;
    let size: usize = relevant.context.iter().map(|c| c.chars().count()).sum();

    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({
            "file": file,
            "candidates": candidates,
            "readable": relevant.files,
            "contextChars": size,
            "budget": budget,
        }))?
    );
    Ok(())
}

async fn cmd_status(repo: &Path) -> anyhow::Result<()> {
    let settings_path = Settings::path_for(repo);
    let settings = Settings::load_or_default(&settings_path)?;

    let conflicts = match GitRepo::new(repo).detect_conflicts() {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "Could not query git status");
            Vec::new()
        }
    };
    let records = decision_log(repo).read_all().await?;
    let stats = DecisionStats::from_records(&records);

    println!("MergeClaw Status");
    println!("================");
    println!();
    println!("Repository: {}", repo.display());
    println!(
        "Settings:   {}",
        if settings_path.exists() {
            settings_path.display().to_string()
        } else {
            "defaults (run 'mergeclaw init')".to_string()
        }
    );
    println!("Model:      {} @ {}", settings.model.model, settings.model.endpoint);
    println!("Threshold:  {}", settings.reasoning.confidence_threshold);
    println!();
    println!("Conflicted files: {}", conflicts.len());
    for c in &conflicts {
        println!("  {} {}", c.status, c.path.display());
    }
    println!();
    println!("Decisions logged: {}", stats.total);
    println!("  automatic:      {}", stats.automatic);
    println!("  manual review:  {}", stats.manual_review);
    println!("  kept current:   {}", stats.kept_current);
    println!("  kept incoming:  {}", stats.kept_incoming);
    match stats.average_confidence {
        Some(avg) => println!("  avg confidence: {:.3}", avg),
        None => println!("  avg confidence: n/a"),
    }
    Ok(())
}
