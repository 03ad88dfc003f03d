//! AWS CLI adapter: captures `~/.aws` (config and credentials).

use super::{ini, ConfigBacked, ConfigSource, Detection};
use crate::metadata::Metadata;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

pub const NAME: &str = "aws";

#[derive(Debug, Clone)]
pub struct AwsTool {
    source: ConfigSource,
    detection: Detection,
}

impl AwsTool {
    pub fn new(home: &Path) -> Self {
        Self::with_config_dir(home.join(".aws"))
    }

    pub fn with_config_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            source: ConfigSource::dir(NAME, dir, &["config", "credentials"]),
            detection: Detection::executable("aws"),
        }
    }

    pub fn with_detection(mut self, detection: Detection) -> Self {
        self.detection = detection;
        self
    }

    /// Profile names from `config` (`[profile x]`, `[default]`) and `credentials`
    fn profiles(config_dir: &Path) -> BTreeSet<String> {
        let mut profiles = BTreeSet::new();
        for section in ini::read(&config_dir.join("config")).keys() {
            if section == "default" {
                profiles.insert(section.clone());
            } else if let Some(name) = section.strip_prefix("profile ") {
                profiles.insert(name.trim().to_string());
            }
        }
        for section in ini::read(&config_dir.join("credentials")).keys() {
            if !section.is_empty() {
                profiles.insert(section.clone());
            }
        }
        profiles
    }
}

impl ConfigBacked for AwsTool {
    const NAME: &'static str = NAME;

    fn source(&self) -> &ConfigSource {
        &self.source
    }

    fn detection(&self) -> &Detection {
        &self.detection
    }

    fn describe(config_dir: &Path) -> Metadata {
        let mut meta = Metadata::new();
        if !config_dir.is_dir() {
            return meta;
        }

        let profiles = Self::profiles(config_dir);
        meta.insert("profiles".into(), profiles.len().into());
        if !profiles.is_empty() {
            let names: Vec<&str> = profiles.iter().map(String::as_str).collect();
            meta.insert("profile_names".into(), names.join(",").into());
        }

        let config = ini::read(&config_dir.join("config"));
        if let Some(region) = ini::get(&config, "default", "region") {
            meta.insert("default_region".into(), region.into());
        }
        if let Some(output) = ini::get(&config, "default", "output") {
            meta.insert("default_output".into(), output.into());
        }
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ChangeKind, MetadataValue};
    use crate::tools::ToolAdapter;
    use std::fs;
    use tempfile::TempDir;

    fn aws_dir(temp_dir: &TempDir) -> PathBuf {
        let dir = temp_dir.path().join(".aws");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config"),
            "[default]\nregion = us-east-1\noutput = json\n\n[profile staging]\nregion = eu-west-1\n",
        )
        .unwrap();
        fs::write(
            dir.join("credentials"),
            "[default]\naws_access_key_id = AKIA\n[ci]\naws_access_key_id = AKIB\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_profiles_are_merged_across_files() {
        let temp_dir = TempDir::new().unwrap();
        let meta = AwsTool::with_config_dir(aws_dir(&temp_dir)).get_metadata().unwrap();

        assert_eq!(meta["profiles"], MetadataValue::Number(3));
        assert_eq!(meta["profile_names"], MetadataValue::from("ci,default,staging"));
        assert_eq!(meta["default_region"], MetadataValue::from("us-east-1"));
        assert_eq!(meta["default_output"], MetadataValue::from("json"));
    }

    #[test]
    fn test_restore_round_trip_and_diff() {
        let temp_dir = TempDir::new().unwrap();
        let dir = aws_dir(&temp_dir);
        let tool = AwsTool::with_config_dir(&dir).with_detection(Detection::ConfigPresent);
        let snap = temp_dir.path().join("snap");
        tool.snapshot(&snap).unwrap();

        fs::write(dir.join("config"), "[default]\nregion = ap-south-1\n").unwrap();
        let changes = tool.diff(&snap).unwrap();
        assert!(changes
            .iter()
            .any(|c| c.field == "default_region" && c.kind == ChangeKind::Modified));

        tool.restore(&snap).unwrap();
        assert!(tool.diff(&snap).unwrap().is_empty());
    }
}
