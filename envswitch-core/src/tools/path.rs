/*!
Generic path-copy adapter for tools without bespoke logic.

The configured file or directory is stored inside the snapshot under its own
file name, so a restore can tell which of the two it is without looking at
the live location (which may not exist yet).
*/

use super::ToolAdapter;
use crate::metadata::{diff_metadata, Change, Metadata};
use crate::{fsutil, EnvSwitchError, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone)]
pub struct PathTool {
    name: String,
    path: PathBuf,
}

impl PathTool {
    pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, path: P) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entry_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.name.clone())
    }

    fn snapshot_entry(&self, dir: &Path) -> PathBuf {
        dir.join(self.entry_name())
    }

    /// Kind, file count, byte count and SHA-256 over relative paths and contents
    fn describe(root: &Path) -> Metadata {
        let mut meta = Metadata::new();
        if !root.exists() {
            return meta;
        }

        let mut hasher = Sha256::new();
        let mut files = 0usize;
        let mut bytes = 0u64;

        for entry in WalkDir::new(root).sort_by_file_name().into_iter().flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(content) = fs::read(entry.path()) else {
                continue;
            };
            let relative = entry.path().strip_prefix(root).unwrap_or(entry.path());
            hasher.update(relative.to_string_lossy().as_bytes());
            hasher.update([0u8]);
            hasher.update(&content);
            files += 1;
            bytes += content.len() as u64;
        }

        let kind = if root.is_dir() { "dir" } else { "file" };
        meta.insert("kind".into(), kind.into());
        meta.insert("files".into(), files.into());
        meta.insert(
            "bytes".into(),
            i64::try_from(bytes).unwrap_or(i64::MAX).into(),
        );
        meta.insert("sha256".into(), format!("{:x}", hasher.finalize()).into());
        meta
    }
}

impl ToolAdapter for PathTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_installed(&self) -> bool {
        self.path.exists()
    }

    fn snapshot(&self, dest: &Path) -> Result<()> {
        if !self.path.exists() {
            return Err(EnvSwitchError::source_missing(&self.name, &self.path));
        }
        fs::create_dir_all(dest)?;
        let entry = self.snapshot_entry(dest);

        if self.path.is_dir() {
            fsutil::copy_dir_recursive(&self.path, &entry)?;
        } else {
            fs::copy(&self.path, &entry)?;
        }
        Ok(())
    }

    fn restore(&self, src: &Path) -> Result<()> {
        self.validate_snapshot(src)?;
        let entry = self.snapshot_entry(src);
        fsutil::remove_path(&self.path)?;

        if entry.is_dir() {
            fsutil::copy_dir_recursive(&entry, &self.path)?;
        } else {
            fsutil::ensure_parent_dir(&self.path)?;
            fs::copy(&entry, &self.path)?;
        }
        Ok(())
    }

    fn validate_snapshot(&self, dir: &Path) -> Result<()> {
        let entry = self.snapshot_entry(dir);
        if dir.is_dir() && entry.exists() {
            Ok(())
        } else {
            Err(EnvSwitchError::invalid_snapshot(&self.name, entry))
        }
    }

    fn get_metadata(&self) -> Result<Metadata> {
        Ok(Self::describe(&self.path))
    }

    fn diff(&self, dir: &Path) -> Result<Vec<Change>> {
        self.validate_snapshot(dir)?;
        let snapshot = Self::describe(&self.snapshot_entry(dir));
        Ok(diff_metadata(&snapshot, &self.get_metadata()?))
    }
}
