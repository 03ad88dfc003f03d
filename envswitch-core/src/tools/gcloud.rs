//! Google Cloud CLI adapter: captures `~/.config/gcloud`.

use super::{ini, ConfigBacked, ConfigSource, Detection};
use crate::metadata::Metadata;
use std::path::{Path, PathBuf};

pub const NAME: &str = "gcloud";

#[derive(Debug, Clone)]
pub struct GcloudTool {
    source: ConfigSource,
    detection: Detection,
}

impl GcloudTool {
    pub fn new(home: &Path) -> Self {
        Self::with_config_dir(home.join(".config").join("gcloud"))
    }

    pub fn with_config_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            source: ConfigSource::dir(NAME, dir, &["configurations"]),
            detection: Detection::executable("gcloud"),
        }
    }

    pub fn with_detection(mut self, detection: Detection) -> Self {
        self.detection = detection;
        self
    }
}

impl ConfigBacked for GcloudTool {
    const NAME: &'static str = NAME;

    fn source(&self) -> &ConfigSource {
        &self.source
    }

    fn detection(&self) -> &Detection {
        &self.detection
    }

    fn describe(config_dir: &Path) -> Metadata {
        let mut meta = Metadata::new();
        let configurations = config_dir.join("configurations");
        if !configurations.is_dir() {
            return meta;
        }

        let active = std::fs::read_to_string(config_dir.join("active_config"))
            .map(|s| s.trim().to_string())
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "default".to_string());

        if let Ok(entries) = std::fs::read_dir(&configurations) {
            let count = entries
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with("config_"))
                .count();
            meta.insert("configurations".into(), count.into());
        }

        let sections = ini::read(&configurations.join(format!("config_{active}")));
        meta.insert("active_configuration".into(), active.into());
        if let Some(account) = ini::get(&sections, "core", "account") {
            meta.insert("account".into(), account.into());
        }
        if let Some(project) = ini::get(&sections, "core", "project") {
            meta.insert("project".into(), project.into());
        }
        if let Some(region) = ini::get(&sections, "compute", "region") {
            meta.insert("region".into(), region.into());
        }
        meta
    }
}
