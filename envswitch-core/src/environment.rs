/*!
Environment records and their on-disk store.

An environment is a directory under `environments/<name>/` holding a
`metadata.yaml` record and a `snapshots/` tree. The directory and the record
exist together or the environment is considered absent.
*/

use crate::layout::{Layout, SNAPSHOTS_DIR};
use crate::metadata::Metadata;
use crate::{fsutil, EnvSwitchError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fmt;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

/// Per-tool settings stored in an environment
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ToolConfig {
    pub enabled: bool,
    /// Snapshot location relative to the environment directory
    pub snapshot_path: PathBuf,
    /// Descriptive fields recorded by the adapter at capture time
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: Metadata,
}

impl ToolConfig {
    /// Enabled config with the conventional `snapshots/<tool>` location
    pub fn enabled_for(tool: &str) -> Self {
        Self {
            enabled: true,
            snapshot_path: Path::new(SNAPSHOTS_DIR).join(tool),
            metadata: Metadata::new(),
        }
    }

    /// Check that the snapshot location stays below `snapshots/`
    ///
    /// Capture replaces whatever sits at this location, so absolute paths,
    /// `..` and the `snapshots` directory itself are rejected.
    pub fn validate(&self, tool: &str) -> Result<()> {
        let mut components = self
            .snapshot_path
            .components()
            .filter(|c| !matches!(c, Component::CurDir));
        let inside = components.next() == Some(Component::Normal(OsStr::new(SNAPSHOTS_DIR)))
            && matches!(components.next(), Some(Component::Normal(_)))
            && components.all(|c| matches!(c, Component::Normal(_)));
        if inside {
            Ok(())
        } else {
            Err(EnvSwitchError::validation(format!(
                "snapshot path '{}' of tool '{}' must lie inside '{}/'",
                self.snapshot_path.display(),
                tool,
                SNAPSHOTS_DIR
            )))
        }
    }
}

/// Phase at which a hook runs
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum HookPhase {
    PreSwitch,
    PostSwitch,
    PreSnapshot,
    PostSnapshot,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HookPhase::PreSwitch => "pre_switch",
            HookPhase::PostSwitch => "post_switch",
            HookPhase::PreSnapshot => "pre_snapshot",
            HookPhase::PostSnapshot => "post_snapshot",
        };
        f.write_str(label)
    }
}

/// A user-defined command or script
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Hook {
    /// Shell command line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Script file run with the shell
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Hook {
    pub fn command<S: Into<String>>(command: S) -> Self {
        Self {
            command: Some(command.into()),
            ..Self::default()
        }
    }

    pub fn script<P: Into<PathBuf>>(script: P) -> Self {
        Self {
            script: Some(script.into()),
            ..Self::default()
        }
    }

    /// Short label used in logs and errors
    pub fn label(&self) -> String {
        if let Some(desc) = &self.description {
            return desc.clone();
        }
        match (&self.command, &self.script) {
            (Some(cmd), _) => cmd.clone(),
            (None, Some(script)) => script.display().to_string(),
            (None, None) => "<empty hook>".to_string(),
        }
    }
}

/// Hooks keyed by phase, each list run in declared order
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Hooks {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_switch: Vec<Hook>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_switch: Vec<Hook>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub pre_snapshot: Vec<Hook>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub post_snapshot: Vec<Hook>,
}

impl Hooks {
    pub fn for_phase(&self, phase: HookPhase) -> &[Hook] {
        match phase {
            HookPhase::PreSwitch => &self.pre_switch,
            HookPhase::PostSwitch => &self.post_switch,
            HookPhase::PreSnapshot => &self.pre_snapshot,
            HookPhase::PostSnapshot => &self.post_snapshot,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.pre_switch.is_empty()
            && self.post_switch.is_empty()
            && self.pre_snapshot.is_empty()
            && self.post_snapshot.is_empty()
    }
}

/// A named bundle of captured tool configuration
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Environment {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub last_used: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_snapshot: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tools: BTreeMap<String, ToolConfig>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env_vars: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Hooks::is_empty")]
    pub hooks: Hooks,
    /// Directory owned by this environment; derived from the layout on load
    #[serde(skip)]
    pub path: PathBuf,
}

impl Environment {
    /// New environment record rooted at `path`, with no tools
    pub fn new<S: Into<String>, P: Into<PathBuf>>(name: S, path: P) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            description: String::new(),
            created_at: now,
            updated_at: now,
            last_used: None,
            last_snapshot: None,
            tools: BTreeMap::new(),
            env_vars: BTreeMap::new(),
            hooks: Hooks::default(),
            path: path.into(),
        }
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Self {
        self.description = description.into();
        self
    }

    /// Enable `tool` with the conventional snapshot location
    pub fn with_tool(mut self, tool: &str) -> Self {
        self.tools.insert(tool.to_string(), ToolConfig::enabled_for(tool));
        self
    }

    /// Names of enabled tools, in name order
    pub fn enabled_tools(&self) -> impl Iterator<Item = (&str, &ToolConfig)> {
        self.tools
            .iter()
            .filter(|(_, cfg)| cfg.enabled)
            .map(|(name, cfg)| (name.as_str(), cfg))
    }

    /// Absolute snapshot directory for a tool config
    pub fn snapshot_dir(&self, tool: &ToolConfig) -> PathBuf {
        self.path.join(&tool.snapshot_path)
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.path.join(SNAPSHOTS_DIR)
    }

    pub fn env_vars_file(&self) -> PathBuf {
        self.snapshots_dir().join(crate::layout::ENV_VARS_FILE)
    }

    /// Validate the name and every tool's snapshot location
    pub fn validate(&self) -> Result<()> {
        validate_name(&self.name)?;
        for (tool, cfg) in &self.tools {
            cfg.validate(tool)?;
        }
        Ok(())
    }
}

/// Validate an environment name for use as a directory and archive prefix
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(EnvSwitchError::validation("environment name cannot be empty"));
    }
    if name.starts_with('.') {
        return Err(EnvSwitchError::validation(format!(
            "environment name '{name}' cannot start with '.'"
        )));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err(EnvSwitchError::validation(format!(
            "environment name '{name}' may only contain letters, digits, '-', '_' and '.'"
        )));
    }
    Ok(())
}

/// Loads and persists environment records under a layout
#[derive(Debug, Clone)]
pub struct EnvironmentStore {
    layout: Layout,
}

impl EnvironmentStore {
    pub fn new(layout: Layout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// True only when both the directory and its metadata file exist
    pub fn exists(&self, name: &str) -> bool {
        self.layout.environment_dir(name).is_dir() && self.layout.metadata_file(name).is_file()
    }

    pub fn load(&self, name: &str) -> Result<Environment> {
        if validate_name(name).is_err() || !self.exists(name) {
            return Err(EnvSwitchError::EnvironmentNotFound(name.to_string()));
        }
        let text = fs::read_to_string(self.layout.metadata_file(name))?;
        let mut env: Environment = serde_yaml::from_str(&text)?;
        env.validate()?;
        env.path = self.layout.environment_dir(name);
        Ok(env)
    }

    /// Persist the record to `<env.path>/metadata.yaml`
    pub fn save(&self, env: &Environment) -> Result<()> {
        env.validate()?;
        let yaml = serde_yaml::to_string(env)?;
        fs::create_dir_all(&env.path)?;
        fsutil::write_atomic(&env.path.join(crate::layout::METADATA_FILE), yaml.as_bytes())?;
        debug!("Saved metadata for environment '{}'", env.name);
        Ok(())
    }

    /// Create a new environment directory and record
    pub fn create(&self, env: Environment) -> Result<Environment> {
        validate_name(&env.name)?;
        if self.exists(&env.name) {
            return Err(EnvSwitchError::EnvironmentExists(env.name));
        }
        let mut env = env;
        env.path = self.layout.environment_dir(&env.name);
        fs::create_dir_all(env.path.join(SNAPSHOTS_DIR))?;
        self.save(&env)?;
        info!("Created environment '{}'", env.name);
        Ok(env)
    }

    /// Names of all environments present on disk, sorted
    pub fn list(&self) -> Result<Vec<String>> {
        let dir = self.layout.environments_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if self.exists(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    pub fn load_all(&self) -> Result<Vec<Environment>> {
        self.list()?.iter().map(|name| self.load(name)).collect()
    }

    /// Remove an environment directory
    ///
    /// Callers wanting a safety copy archive the environment first.
    pub fn remove(&self, name: &str) -> Result<()> {
        if !self.exists(name) {
            return Err(EnvSwitchError::EnvironmentNotFound(name.to_string()));
        }
        fsutil::remove_path(&self.layout.environment_dir(name))?;
        info!("Removed environment '{}'", name);
        Ok(())
    }
}
