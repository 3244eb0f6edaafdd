//! File system utils.

use std::{
    fs::{File, OpenOptions},
    io::Write,
    path::Path,
};

use anyhow::Context;
use fs2::FileExt;

pub struct FsHandler;

impl FsHandler {
    /// Write `content` to `path` through a temporary file and a rename, so a
    /// reader never observes a partially written file.
    pub fn atomic_write(path: &Path, content: &[u8]) -> anyhow::Result<()> {
        let parent = path
            .parent()
            .context("File path must have a parent directory")?;
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create directory {}", parent.display()))?;

        let tmp_path = parent.join(format!(
            ".{}.tmp-{}",
            path.file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("state"),
            std::process::id(),
        ));

        {
            let mut file = File::create(&tmp_path)
                .context(format!("Failed to create {}", tmp_path.display()))?;
            file.write_all(content)
                .context(format!("Failed to write {}", tmp_path.display()))?;
            file.sync_all()
                .context(format!("Failed to sync {}", tmp_path.display()))?;
        }

        std::fs::rename(&tmp_path, path).context(format!(
            "Failed to move {} to {}",
            tmp_path.display(),
            path.display()
        ))?;

        tracing::trace!(path = %path.display(), bytes = content.len(), "File written");
        Ok(())
    }

    /// Take an exclusive advisory lock on `path`, creating it if needed.
    ///
    /// The lock is held for as long as the returned file is alive.
    pub fn lock_exclusive(path: &Path) -> anyhow::Result<File> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .context(format!("Failed to open lock file {}", path.display()))?;

        file.try_lock_exclusive().context(format!(
            "Another deployment holds the lock at {}",
            path.display()
        ))?;

        Ok(file)
    }

    /// Turn an identifier into a single, portable path component.
    pub fn path_component(id: &str) -> String {
        let component: String = id
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                    c
                } else {
                    '_'
                }
            })
            .collect();

        match component.as_str() {
            "" | "." | ".." => "_".to_string(),
            _ => component,
        }
    }
}
