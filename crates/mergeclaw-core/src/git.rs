use merge_engine::VersionHistory;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Commits scanned when looking for recently touched files.
const HISTORY_DEPTH: &str = "50";

const PRE_MERGE_COMMIT_HOOK: &str = "#!/bin/sh\n\
# Installed by mergeclaw: refuse to commit a merge that still has markers.\n\
if git diff --cached --name-only | xargs -r grep -l '^<<<<<<< ' 2>/dev/null; then\n\
  echo 'mergeclaw: conflict markers remain; run `mergeclaw resolve`' >&2\n\
  exit 1\n\
fi\n\
exit 0\n";

const POST_MERGE_HOOK: &str = "#!/bin/sh\n\
# Installed by mergeclaw.\n\
mergeclaw status >/dev/null 2>&1 || true\n\
exit 0\n";

/// A file git reports as unmerged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GitConflict {
    /// Path relative to the repository root, as git prints it.
    pub path: PathBuf,
    /// Two-letter porcelain status: `UU`, `AA` or `DD`.
    pub status: String,
}

/// Thin wrapper over the `git` executable for one working tree.
#[derive(Debug, Clone)]
pub struct GitRepo {
    root: PathBuf,
}

impl GitRepo {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run(&self, args: &[&str]) -> anyhow::Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.root)
            .output()?;
        if !output.status.success() {
            anyhow::bail!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn detect_conflicts(&self) -> anyhow::Result<Vec<GitConflict>> {
        // -z keeps paths unquoted, so spaces and non-ASCII names survive.
        let out = self.run(&["status", "--porcelain", "-z"])?;
        Ok(parse_unmerged(&out))
    }

    /// Write the merge hooks into `.git/hooks`, marking them executable.
    pub fn install_hooks(&self) -> anyhow::Result<Vec<PathBuf>> {
        let hooks_dir = self.root.join(".git").join("hooks");
        std::fs::create_dir_all(&hooks_dir)?;

        let mut installed = Vec::new();
        for (name, body) in [
            ("pre-merge-commit", PRE_MERGE_COMMIT_HOOK),
            ("post-merge", POST_MERGE_HOOK),
        ] {
            let path = hooks_dir.join(name);
            std::fs::write(&path, body)?;
            make_executable(&path)?;
            tracing::info!(hook = name, "Installed git hook");
            installed.push(path);
        }
        Ok(installed)
    }
}

impl VersionHistory for GitRepo {
    fn recent_files(&self, limit: usize) -> anyhow::Result<Vec<PathBuf>> {
        let out = self.run(&["log", "-n", HISTORY_DEPTH, "--name-only", "--pretty=format:"])?;
        Ok(parse_recent(&out, &self.root, limit))
    }
}

/// Parse NUL-separated `git status --porcelain -z` output.
fn parse_unmerged(porcelain: &str) -> Vec<GitConflict> {
    let mut conflicts = Vec::new();
    let mut entries = porcelain.split('\0').filter(|e| !e.is_empty());
    while let Some(entry) = entries.next() {
        let (Some(status), Some(path)) = (entry.get(..2), entry.get(3..)) else {
            continue;
        };
        // Renames and copies carry their source path as a separate entry.
        if status.starts_with('R') || status.starts_with('C') {
            entries.next();
            continue;
        }
        if matches!(status, "UU" | "AA" | "DD") && !path.is_empty() {
            conflicts.push(GitConflict {
                path: PathBuf::from(path),
                status: status.to_string(),
            });
        }
    }
    conflicts
}

/// Distinct names in first-seen order, joined to `root`, existing files only.
fn parse_recent(log: &str, root: &Path, limit: usize) -> Vec<PathBuf> {
    let mut seen = std::collections::HashSet::new();
    let mut files = Vec::new();
    for name in log.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if files.len() >= limit {
            break;
        }
        if !seen.insert(name) {
            continue;
        }
        let path = root.join(name);
        if path.is_file() {
            files.push(path);
        }
    }
    files
}

#[cfg(unix)]
fn make_executable(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> std::io::Result<()> {
    Ok(())
}
