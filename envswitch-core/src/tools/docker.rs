//! Docker adapter: captures `~/.docker` (client config, contexts, registry auth).

use super::{ConfigBacked, ConfigSource, Detection};
use crate::metadata::Metadata;
use crate::Result;
use serde_json::Value;
use std::path::{Path, PathBuf};

pub const NAME: &str = "docker";

#[derive(Debug, Clone)]
pub struct DockerTool {
    source: ConfigSource,
    detection: Detection,
}

impl DockerTool {
    pub fn new(home: &Path) -> Self {
        Self::with_config_dir(home.join(".docker"))
    }

    pub fn with_config_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            source: ConfigSource::dir(NAME, dir, &["config.json"]),
            detection: Detection::executable("docker"),
        }
    }

    pub fn with_detection(mut self, detection: Detection) -> Self {
        self.detection = detection;
        self
    }

    fn read_config(config_dir: &Path) -> Result<Value> {
        let text = std::fs::read_to_string(config_dir.join("config.json"))?;
        Ok(serde_json::from_str(&text)?)
    }
}

impl ConfigBacked for DockerTool {
    const NAME: &'static str = NAME;

    fn source(&self) -> &ConfigSource {
        &self.source
    }

    fn detection(&self) -> &Detection {
        &self.detection
    }

    fn describe(config_dir: &Path) -> Metadata {
        let mut meta = Metadata::new();
        let Ok(config) = Self::read_config(config_dir) else {
            return meta;
        };

        let context = config
            .get("currentContext")
            .and_then(Value::as_str)
            .unwrap_or("default");
        meta.insert("current_context".into(), context.into());

        if let Some(auths) = config.get("auths").and_then(Value::as_object) {
            meta.insert("registries".into(), auths.len().into());
        }
        if let Some(store) = config.get("credsStore").and_then(Value::as_str) {
            meta.insert("credentials_store".into(), store.into());
        }
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataValue;
    use crate::tools::ToolAdapter;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_metadata_from_config_json() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".docker");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("config.json"),
            r#"{"auths":{"ghcr.io":{},"registry.corp.io":{}},"credsStore":"desktop","currentContext":"colima"}"#,
        )
        .unwrap();

        let meta = DockerTool::with_config_dir(&dir).get_metadata().unwrap();
        assert_eq!(meta["current_context"], MetadataValue::from("colima"));
        assert_eq!(meta["registries"], MetadataValue::Number(2));
        assert_eq!(meta["credentials_store"], MetadataValue::from("desktop"));
    }

    #[test]
    fn test_invalid_json_is_best_effort() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".docker");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.json"), "{not json").unwrap();

        assert!(DockerTool::with_config_dir(&dir).get_metadata().unwrap().is_empty());
    }

    #[test]
    fn test_default_context_when_unset() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join(".docker");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("config.json"), "{}").unwrap();

        let meta = DockerTool::with_config_dir(&dir).get_metadata().unwrap();
        assert_eq!(meta["current_context"], MetadataValue::from("default"));
        assert!(!meta.contains_key("registries"));
    }
}
