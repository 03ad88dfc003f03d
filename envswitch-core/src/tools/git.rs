//! Git identity adapter: captures the global `~/.gitconfig` file.

use super::{ini, ConfigBacked, ConfigSource, Detection};
use crate::metadata::Metadata;
use std::path::{Path, PathBuf};

pub const NAME: &str = "git";

#[derive(Debug, Clone)]
pub struct GitTool {
    source: ConfigSource,
    detection: Detection,
}

impl GitTool {
    pub fn new(home: &Path) -> Self {
        Self::with_config_file(home.join(".gitconfig"))
    }

    pub fn with_config_file<P: Into<PathBuf>>(file: P) -> Self {
        Self {
            source: ConfigSource::file(NAME, file),
            detection: Detection::executable("git"),
        }
    }

    pub fn with_detection(mut self, detection: Detection) -> Self {
        self.detection = detection;
        self
    }
}

impl ConfigBacked for GitTool {
    const NAME: &'static str = NAME;

    fn source(&self) -> &ConfigSource {
        &self.source
    }

    fn detection(&self) -> &Detection {
        &self.detection
    }

    fn describe(config_file: &Path) -> Metadata {
        let mut meta = Metadata::new();
        if !config_file.is_file() {
            return meta;
        }
        let sections = ini::read(config_file);

        if let Some(name) = ini::get(&sections, "user", "name") {
            meta.insert("user_name".into(), name.into());
        }
        if let Some(email) = ini::get(&sections, "user", "email") {
            meta.insert("user_email".into(), email.into());
        }
        if let Some(key) = ini::get(&sections, "user", "signingkey") {
            meta.insert("signing_key".into(), key.into());
        }
        if let Some(sign) = ini::get(&sections, "commit", "gpgsign") {
            meta.insert("gpg_sign".into(), sign.eq_ignore_ascii_case("true").into());
        }
        meta
    }
}
