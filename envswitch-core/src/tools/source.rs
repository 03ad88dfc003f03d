//! Whole-file / whole-directory copying shared by all adapters.

use crate::{fsutil, EnvSwitchError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Shape of a tool's live configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceKind {
    /// A single file, stored as `<snapshot>/<file name>`
    File,
    /// A directory, stored as the snapshot directory itself
    Dir,
}

/// Live configuration location of one tool and the markers a snapshot needs
#[derive(Debug, Clone)]
pub struct ConfigSource {
    tool: String,
    path: PathBuf,
    kind: SourceKind,
    /// Entries of which at least one must be present in a valid snapshot
    markers: Vec<String>,
}

impl ConfigSource {
    pub fn dir<S: Into<String>, P: Into<PathBuf>>(tool: S, path: P, markers: &[&str]) -> Self {
        Self {
            tool: tool.into(),
            path: path.into(),
            kind: SourceKind::Dir,
            markers: markers.iter().map(|m| m.to_string()).collect(),
        }
    }

    pub fn file<S: Into<String>, P: Into<PathBuf>>(tool: S, path: P) -> Self {
        let path = path.into();
        let markers = path
            .file_name()
            .map(|n| vec![n.to_string_lossy().to_string()])
            .unwrap_or_default();
        Self {
            tool: tool.into(),
            path,
            kind: SourceKind::File,
            markers,
        }
    }

    pub fn tool(&self) -> &str {
        &self.tool
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn kind(&self) -> SourceKind {
        self.kind
    }

    pub fn exists(&self) -> bool {
        match self.kind {
            SourceKind::File => self.path.is_file(),
            SourceKind::Dir => self.path.is_dir(),
        }
    }

    /// Where the tool's configuration sits inside a snapshot directory
    pub fn snapshot_root(&self, dir: &Path) -> PathBuf {
        match self.kind {
            SourceKind::File => dir.join(self.file_name()),
            SourceKind::Dir => dir.to_path_buf(),
        }
    }

    fn file_name(&self) -> String {
        self.markers.first().cloned().unwrap_or_else(|| self.tool.clone())
    }

    /// Copy the live configuration into `dest`
    pub fn snapshot_into(&self, dest: &Path) -> Result<()> {
        if !self.exists() {
            return Err(EnvSwitchError::source_missing(&self.tool, &self.path));
        }
        fs::create_dir_all(dest)?;

        match self.kind {
            SourceKind::File => {
                fs::copy(&self.path, self.snapshot_root(dest))?;
            }
            SourceKind::Dir => fsutil::copy_dir_recursive(&self.path, dest)?,
        }
        debug!(
            "Copied {} config {} -> {}",
            self.tool,
            self.path.display(),
            dest.display()
        );
        Ok(())
    }

    /// Check the snapshot directory and its markers
    pub fn validate(&self, dir: &Path) -> Result<()> {
        if !dir.is_dir() {
            return Err(EnvSwitchError::invalid_snapshot(&self.tool, dir));
        }
        if self.markers.is_empty() {
            return Ok(());
        }
        if self.markers.iter().any(|m| dir.join(m).exists()) {
            return Ok(());
        }
        Err(EnvSwitchError::invalid_snapshot(
            &self.tool,
            dir.join(&self.markers[0]),
        ))
    }

    /// Replace the live configuration with the snapshot in `dir`
    pub fn restore_from(&self, dir: &Path) -> Result<()> {
        self.validate(dir)?;
        fsutil::remove_path(&self.path)?;

        match self.kind {
            SourceKind::File => {
                fsutil::ensure_parent_dir(&self.path)?;
                fs::copy(self.snapshot_root(dir), &self.path)?;
            }
            SourceKind::Dir => fsutil::copy_dir_recursive(dir, &self.path)?,
        }
        debug!(
            "Restored {} config {} -> {}",
            self.tool,
            dir.display(),
            self.path.display()
        );
        Ok(())
    }
}
