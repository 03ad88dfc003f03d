/*!
Kubernetes CLI adapter: captures the whole `~/.kube` directory.
*/

use super::{ConfigBacked, ConfigSource, Detection};
use crate::metadata::Metadata;
use serde_yaml::Value;
use std::path::{Path, PathBuf};

pub const NAME: &str = "kubectl";

/// Adapter for `kubectl` and its kubeconfig directory
#[derive(Debug, Clone)]
pub struct KubectlTool {
    source: ConfigSource,
    detection: Detection,
}

impl KubectlTool {
    /// Adapter for `<home>/.kube`
    pub fn new(home: &Path) -> Self {
        Self::with_config_dir(home.join(".kube"))
    }

    pub fn with_config_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            source: ConfigSource::dir(NAME, dir, &["config"]),
            detection: Detection::executable("kubectl"),
        }
    }

    /// Override how installation is detected
    pub fn with_detection(mut self, detection: Detection) -> Self {
        self.detection = detection;
        self
    }
}

impl ConfigBacked for KubectlTool {
    const NAME: &'static str = NAME;

    fn source(&self) -> &ConfigSource {
        &self.source
    }

    fn detection(&self) -> &Detection {
        &self.detection
    }

    fn describe(config_dir: &Path) -> Metadata {
        let mut meta = Metadata::new();
        let Ok(text) = std::fs::read_to_string(config_dir.join("config")) else {
            return meta;
        };
        let Ok(doc) = serde_yaml::from_str::<Value>(&text) else {
            return meta;
        };

        let contexts = doc.get("contexts").and_then(Value::as_sequence);
        if let Some(contexts) = contexts {
            meta.insert("contexts".into(), contexts.len().into());
        }

        let Some(current) = doc.get("current-context").and_then(Value::as_str) else {
            return meta;
        };
        meta.insert("current_context".into(), current.into());

        let active = contexts.and_then(|list| {
            list.iter()
                .find(|c| c.get("name").and_then(Value::as_str) == Some(current))
                .and_then(|c| c.get("context"))
        });
        if let Some(ctx) = active {
            if let Some(cluster) = ctx.get("cluster").and_then(Value::as_str) {
                meta.insert("cluster".into(), cluster.into());
            }
            if let Some(namespace) = ctx.get("namespace").and_then(Value::as_str) {
                meta.insert("namespace".into(), namespace.into());
            }
        }
        meta
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::MetadataValue;
    use crate::tools::ToolAdapter;
    use crate::EnvSwitchError;
    use tempfile::TempDir;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: staging
contexts:
  - name: staging
    context:
      cluster: eks-staging
      namespace: payments
  - name: prod
    context:
      cluster: eks-prod
"#;

    fn tool_in(temp_dir: &TempDir) -> KubectlTool {
        let dir = temp_dir.path().join(".kube");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("config"), KUBECONFIG).unwrap();
        KubectlTool::with_config_dir(dir).with_detection(Detection::ConfigPresent)
    }

    #[test]
    fn test_metadata_from_kubeconfig() {
        let temp_dir = TempDir::new().unwrap();
        let meta = tool_in(&temp_dir).get_metadata().unwrap();

        assert_eq!(meta["current_context"], MetadataValue::from("staging"));
        assert_eq!(meta["cluster"], MetadataValue::from("eks-staging"));
        assert_eq!(meta["namespace"], MetadataValue::from("payments"));
        assert_eq!(meta["contexts"], MetadataValue::Number(2));
    }

    #[test]
    fn test_diff_after_context_change() {
        let temp_dir = TempDir::new().unwrap();
        let tool = tool_in(&temp_dir);
        let snap = temp_dir.path().join("snap");
        tool.snapshot(&snap).unwrap();

        let live = temp_dir.path().join(".kube/config");
        std::fs::write(&live, KUBECONFIG.replace("current-context: staging", "current-context: prod")).unwrap();

        let changes = tool.diff(&snap).unwrap();
        let fields: Vec<&str> = changes.iter().map(|c| c.field.as_str()).collect();
        assert_eq!(fields, vec!["cluster", "current_context", "namespace"]);
    }

    #[test]
    fn test_not_installed_snapshot_fails() {
        let temp_dir = TempDir::new().unwrap();
        let tool = KubectlTool::new(temp_dir.path()).with_detection(Detection::ConfigPresent);
        let err = tool.snapshot(&temp_dir.path().join("snap")).unwrap_err();
        assert!(matches!(err, EnvSwitchError::NotInstalled { .. }));
    }

    #[test]
    fn test_missing_config_yields_empty_metadata() {
        let temp_dir = TempDir::new().unwrap();
        let tool = KubectlTool::new(temp_dir.path());
        assert!(tool.get_metadata().unwrap().is_empty());
    }
}
