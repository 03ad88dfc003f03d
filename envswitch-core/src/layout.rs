//! On-disk layout of an envswitch root directory.

use std::path::{Path, PathBuf};

/// Environment variable that overrides the default root directory
pub const ROOT_ENV_VAR: &str = "ENVSWITCH_HOME";

pub const CONFIG_FILE: &str = "config.yaml";
pub const CURRENT_FILE: &str = "current.lock";
pub const LOCK_FILE: &str = ".switch.lock";
pub const HISTORY_FILE: &str = "history.yaml";
pub const METADATA_FILE: &str = "metadata.yaml";
pub const SNAPSHOTS_DIR: &str = "snapshots";
pub const ENV_VARS_FILE: &str = "env-vars.env";

/// Every persisted path, derived from a single root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// `$ENVSWITCH_HOME` when set, otherwise `~/.envswitch`
    pub fn default_root() -> Option<PathBuf> {
        if let Some(root) = std::env::var_os(ROOT_ENV_VAR).filter(|v| !v.is_empty()) {
            return Some(PathBuf::from(root));
        }
        dirs::home_dir().map(|home| home.join(".envswitch"))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(CONFIG_FILE)
    }

    pub fn environments_dir(&self) -> PathBuf {
        self.root.join("environments")
    }

    pub fn environment_dir(&self, name: &str) -> PathBuf {
        self.environments_dir().join(name)
    }

    pub fn metadata_file(&self, name: &str) -> PathBuf {
        self.environment_dir(name).join(METADATA_FILE)
    }

    pub fn archives_dir(&self) -> PathBuf {
        self.root.join("archives")
    }

    pub fn history_file(&self) -> PathBuf {
        self.root.join(HISTORY_FILE)
    }

    pub fn current_file(&self) -> PathBuf {
        self.root.join(CURRENT_FILE)
    }

    pub fn lock_file(&self) -> PathBuf {
        self.root.join(LOCK_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_hang_off_root() {
        let layout = Layout::new("/data/envswitch");
        assert_eq!(
            layout.metadata_file("work"),
            PathBuf::from("/data/envswitch/environments/work/metadata.yaml")
        );
        assert_eq!(
            layout.current_file(),
            PathBuf::from("/data/envswitch/current.lock")
        );
        assert_eq!(layout.archives_dir(), PathBuf::from("/data/envswitch/archives"));
        assert_eq!(
            layout.history_file(),
            PathBuf::from("/data/envswitch/history.yaml")
        );
    }
}
