use crate::record::DecisionRecord;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Copies of conflicted files taken before they are rewritten.
pub struct BackupStore {
    repo_root: PathBuf,
    dir: PathBuf,
}

impl BackupStore {
    pub async fn new(repo_root: impl AsRef<Path>, dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            repo_root: repo_root.as_ref().to_path_buf(),
            dir,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copy `file` into the backup directory and return the backup path.
    /// Uses tmp+rename so a crash never leaves a half-written backup.
    pub async fn backup(&self, file: &Path) -> anyhow::Result<PathBuf> {
        let content = fs::read(file).await?;
        let name = format!("{}.{}.bak", self.flat_name(file), crate::record::now_millis());
        let path = self.dir.join(&name);
        let tmp = self.dir.join(format!(".{}.tmp", name));
        fs::write(&tmp, &content).await?;
        fs::rename(&tmp, &path).await?;
        tracing::debug!(file = %file.display(), backup = %path.display(), "Backed up file");
        Ok(path)
    }

    /// Repository-relative path with separators replaced by `__`.
    fn flat_name(&self, file: &Path) -> String {
        let rel = file.strip_prefix(&self.repo_root).unwrap_or(file);
        rel.components()
            .filter_map(|c| match c {
                Component::Normal(part) => Some(part.to_string_lossy()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("__")
    }
}

/// Append-only JSON-lines log of resolve decisions.
pub struct DecisionLog {
    path: PathBuf,
}

impl DecisionLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, record: &DecisionRecord) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read every record back. A missing log is empty; malformed lines are
    /// logged and skipped.
    pub async fn read_all(&self) -> anyhow::Result<Vec<DecisionRecord>> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        for (n, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<DecisionRecord>(line) {
                Ok(r) => records.push(r),
                Err(e) => {
                    tracing::error!("Failed to parse decision log line {}: {}", n + 1, e);
                }
            }
        }
        Ok(records)
    }
}
