/*!
Tool adapters and the registry that selects them.

This module defines the adapter abstraction (port) every external tool
implements, and the registry that builds the active set of adapters for one
invocation. Snapshot and restore are always whole-file or whole-directory
replacement, so restoring the same snapshot twice yields the same state.
*/

pub mod aws;
pub mod docker;
pub mod gcloud;
pub mod git;
mod ini;
pub mod kubectl;
pub mod path;
mod source;

pub use aws::AwsTool;
pub use docker::DockerTool;
pub use gcloud::GcloudTool;
pub use git::GitTool;
pub use kubectl::KubectlTool;
pub use path::PathTool;
pub use source::{ConfigSource, SourceKind};

use crate::config::SwitchConfig;
use crate::metadata::{diff_metadata, Change, Metadata};
use crate::{EnvSwitchError, Result};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Names of the adapters with bespoke logic
pub const BUILTIN_TOOL_NAMES: &[&str] = &["aws", "docker", "gcloud", "git", "kubectl"];

/// Capability contract for one external tool
///
/// # Errors
/// `snapshot` fails with `NotInstalled` when the tool is absent, with
/// `SourceMissing` when its live configuration does not exist, and with `Io`
/// on copy failure. A failed snapshot may leave a partial copy behind.
/// `validate_snapshot` fails with `InvalidSnapshot` naming the missing path.
pub trait ToolAdapter {
    /// Stable identifier matching the key used in an environment's tool map
    fn name(&self) -> &str;

    /// Whether the tool is present on this machine; no side effects
    fn is_installed(&self) -> bool;

    /// Copy the live configuration into `dest`, creating it when absent
    fn snapshot(&self, dest: &Path) -> Result<()>;

    /// Replace the live configuration with the snapshot in `src`
    ///
    /// Validates the snapshot first. Destructive: the previous live
    /// configuration is removed, not merged.
    fn restore(&self, src: &Path) -> Result<()>;

    /// Structural check that `dir` holds a usable snapshot
    fn validate_snapshot(&self, dir: &Path) -> Result<()>;

    /// Best-effort descriptive fields of the live configuration
    fn get_metadata(&self) -> Result<Metadata>;

    /// Metadata-level differences between the snapshot in `dir` and live state
    fn diff(&self, dir: &Path) -> Result<Vec<Change>>;
}

/// How an adapter decides whether its tool is installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Detection {
    /// An executable with this name is on `PATH`
    Executable(String),
    /// The live configuration exists
    ConfigPresent,
}

impl Detection {
    pub fn executable<S: Into<String>>(name: S) -> Self {
        Detection::Executable(name.into())
    }

    pub(crate) fn check(&self, source: &ConfigSource) -> bool {
        match self {
            Detection::Executable(binary) => which::which(binary).is_ok(),
            Detection::ConfigPresent => source.exists(),
        }
    }
}

/// A tool whose whole state is one [`ConfigSource`]
///
/// Implementors say where the configuration lives and how to summarize it;
/// capture, restore, validation and diffing come from the blanket
/// [`ToolAdapter`] impl below.
pub trait ConfigBacked {
    const NAME: &'static str;

    fn source(&self) -> &ConfigSource;

    fn detection(&self) -> &Detection;

    /// Descriptive fields read from a configuration rooted at `root`
    fn describe(root: &Path) -> Metadata;
}

impl<T: ConfigBacked> ToolAdapter for T {
    fn name(&self) -> &str {
        T::NAME
    }

    fn is_installed(&self) -> bool {
        self.detection().check(self.source())
    }

    fn snapshot(&self, dest: &Path) -> Result<()> {
        if !self.is_installed() {
            return Err(EnvSwitchError::not_installed(T::NAME));
        }
        self.source().snapshot_into(dest)
    }

    fn restore(&self, src: &Path) -> Result<()> {
        self.source().restore_from(src)
    }

    fn validate_snapshot(&self, dir: &Path) -> Result<()> {
        self.source().validate(dir)
    }

    fn get_metadata(&self) -> Result<Metadata> {
        Ok(T::describe(self.source().path()))
    }

    fn diff(&self, dir: &Path) -> Result<Vec<Change>> {
        self.validate_snapshot(dir)?;
        let snapshot = T::describe(&self.source().snapshot_root(dir));
        Ok(diff_metadata(&snapshot, &self.get_metadata()?))
    }
}

/// The active adapters for one invocation, keyed by name
pub struct ToolRegistry {
    tools: BTreeMap<String, Box<dyn ToolAdapter>>,
}

impl ToolRegistry {
    /// Build a registry from explicit adapters, dropping excluded names
    ///
    /// A later adapter with the same name replaces an earlier one.
    pub fn from_adapters<I>(adapters: I, excluded: &[String]) -> Self
    where
        I: IntoIterator<Item = Box<dyn ToolAdapter>>,
    {
        let mut tools = BTreeMap::new();
        for adapter in adapters {
            let name = adapter.name().to_string();
            if excluded.iter().any(|e| e == &name) {
                debug!("Tool '{}' excluded by configuration", name);
                continue;
            }
            tools.insert(name, adapter);
        }
        Self { tools }
    }

    /// The built-in adapters plus configured path tools, minus exclusions
    pub fn builtin(home: &Path, config: &SwitchConfig) -> Self {
        let mut adapters: Vec<Box<dyn ToolAdapter>> = vec![
            Box::new(KubectlTool::new(home)),
            Box::new(GcloudTool::new(home)),
            Box::new(AwsTool::new(home)),
            Box::new(DockerTool::new(home)),
            Box::new(GitTool::new(home)),
        ];
        for custom in &config.custom_tools {
            let path = expand_home(&custom.path, home);
            adapters.push(Box::new(PathTool::new(custom.name.clone(), path)));
        }
        Self::from_adapters(adapters, &config.exclude_tools)
    }

    pub fn get(&self, name: &str) -> Option<&dyn ToolAdapter> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn ToolAdapter> {
        self.tools.values().map(|t| t.as_ref())
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Names of registered tools that are installed
    pub fn installed(&self) -> Vec<String> {
        self.iter()
            .filter(|t| t.is_installed())
            .map(|t| t.name().to_string())
            .collect()
    }
}

impl fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Expand a leading `~/` against `home`
pub fn expand_home(path: &Path, home: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => home.join(rest),
        Err(_) => path.to_path_buf(),
    }
}
