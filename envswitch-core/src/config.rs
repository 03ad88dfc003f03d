//! Configuration for switching behaviour and tool selection
//!
//! This module provides the configuration loaded from `config.yaml` under the
//! envswitch root, plus the per-invocation options a caller passes to a switch.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::tools::BUILTIN_TOOL_NAMES;
use crate::EnvSwitchError;

/// Output format for log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter directive level (`error`, `warn`, `info`, `debug`, `trace`)
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Environment-variable capture settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct EnvVarsConfig {
    /// Whether captures record the tracked variables at all
    pub capture: bool,
    /// Variable names to record
    pub tracked: Vec<String>,
}

/// A path-copy tool declared by the user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomTool {
    pub name: String,
    /// File or directory to capture; `~/` is expanded against the home directory
    pub path: PathBuf,
}

/// Configuration structure for envswitch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchConfig {
    /// Number of archives kept after a switch; `0` disables cleanup
    pub backup_retention: i64,
    /// Archive the current environment before switching away from it
    pub auto_backup: bool,
    /// Tool names hidden from capture, restore and verification
    pub exclude_tools: Vec<String>,
    /// Check tool installation after every switch
    pub verify_after_switch: bool,
    /// How long a switch waits for another switch to release the lock
    pub lock_timeout_secs: u64,
    pub env_vars: EnvVarsConfig,
    pub custom_tools: Vec<CustomTool>,
    pub log: LogConfig,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            backup_retention: 10,
            auto_backup: true,
            exclude_tools: Vec::new(),
            verify_after_switch: false,
            lock_timeout_secs: 10,
            env_vars: EnvVarsConfig::default(),
            custom_tools: Vec::new(),
            log: LogConfig::default(),
        }
    }
}

impl SwitchConfig {
    /// Load configuration from a YAML file
    ///
    /// A missing file yields the default configuration. The loaded value is
    /// validated before it is returned.
    pub fn load(path: &Path) -> crate::Result<Self> {
        let config = match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => Self::default(),
            Ok(text) => serde_yaml::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => return Err(e.into()),
        };
        config.validate()?;
        Ok(config)
    }

    /// Write configuration as YAML
    pub fn save(&self, path: &Path) -> crate::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        crate::fsutil::write_atomic(path, yaml.as_bytes())
    }

    /// Whether `tool` is listed in `exclude_tools`
    pub fn is_excluded(&self, tool: &str) -> bool {
        self.exclude_tools.iter().any(|t| t == tool)
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        let mut seen = HashSet::new();
        for tool in &self.custom_tools {
            if tool.name.trim().is_empty() {
                return Err(EnvSwitchError::validation(
                    "custom tool name cannot be empty",
                ));
            }
            if BUILTIN_TOOL_NAMES.contains(&tool.name.as_str()) {
                return Err(EnvSwitchError::validation(format!(
                    "custom tool '{}' collides with a built-in tool",
                    tool.name
                )));
            }
            if !seen.insert(tool.name.as_str()) {
                return Err(EnvSwitchError::validation(format!(
                    "custom tool '{}' is declared twice",
                    tool.name
                )));
            }
            if tool.path.as_os_str().is_empty() {
                return Err(EnvSwitchError::validation(format!(
                    "custom tool '{}' has an empty path",
                    tool.name
                )));
            }
        }
        for name in &self.env_vars.tracked {
            if name.is_empty() || name.contains('=') {
                return Err(EnvSwitchError::validation(format!(
                    "invalid tracked variable name '{name}'"
                )));
            }
        }
        Ok(())
    }
}

/// Per-invocation switch flags supplied by the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchOptions {
    /// Report what would happen without touching any state
    pub dry_run: bool,
    /// Skip the pre-switch archive of the current environment
    pub no_backup: bool,
    /// Skip pre- and post-switch hooks
    pub no_hooks: bool,
    /// Check tool installation after switching
    pub verify: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = SwitchConfig::default();
        assert_eq!(config.backup_retention, 10);
        assert!(config.auto_backup);
        assert!(config.exclude_tools.is_empty());
        assert_eq!(config.log.format, LogFormat::Text);
    }

    #[test]
    fn test_load_missing_file_gives_defaults() {
        let temp_dir = TempDir::new().unwrap();
        let config = SwitchConfig::load(&temp_dir.path().join("config.yaml")).unwrap();
        assert_eq!(config, SwitchConfig::default());
    }

    #[test]
    fn test_load_partial_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        std::fs::write(
            &path,
            "backup_retention: 3\nexclude_tools: [gcloud]\nenv_vars:\n  capture: true\n  tracked: [AWS_PROFILE]\nlog:\n  format: json\n",
        )
        .unwrap();

        let config = SwitchConfig::load(&path).unwrap();
        assert_eq!(config.backup_retention, 3);
        assert!(config.is_excluded("gcloud"));
        assert!(!config.is_excluded("git"));
        assert!(config.env_vars.capture);
        assert_eq!(config.env_vars.tracked, vec!["AWS_PROFILE".to_string()]);
        assert_eq!(config.log.format, LogFormat::Json);
        assert_eq!(config.log.level, "info");
        assert!(config.auto_backup);
    }

    #[test]
    fn test_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.yaml");
        let mut config = SwitchConfig::default();
        config.verify_after_switch = true;
        config.custom_tools.push(CustomTool {
            name: "ssh".into(),
            path: PathBuf::from("~/.ssh/config"),
        });

        config.save(&path).unwrap();
        assert_eq!(SwitchConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_custom_tools() {
        let mut config = SwitchConfig::default();
        config.custom_tools.push(CustomTool {
            name: "git".into(),
            path: PathBuf::from("/tmp/x"),
        });
        assert!(config.validate().is_err());

        config.custom_tools = vec![
            CustomTool {
                name: "npm".into(),
                path: PathBuf::from("~/.npmrc"),
            },
            CustomTool {
                name: "npm".into(),
                path: PathBuf::from("~/.npmrc2"),
            },
        ];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("declared twice"));
    }

    #[test]
    fn test_validate_tracked_names() {
        let mut config = SwitchConfig::default();
        config.env_vars.tracked = vec!["BAD=NAME".into()];
        assert!(config.validate().is_err());
    }
}
