/*!
Error types for the envswitch core engine.
*/

use std::path::PathBuf;
use thiserror::Error;

/// Result type used throughout the envswitch core.
pub type Result<T> = std::result::Result<T, EnvSwitchError>;

/// Errors that can occur while capturing, restoring or switching environments.
#[derive(Error, Debug)]
pub enum EnvSwitchError {
    /// I/O errors during file operations
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization errors (metadata, history, config)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON errors while reading tool configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Directory traversal errors while archiving
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The tool behind an adapter is not available on this machine
    #[error("Tool '{tool}' is not installed")]
    NotInstalled { tool: String },

    /// The live configuration an adapter copies from does not exist
    #[error("Source configuration for '{tool}' not found at {}", path.display())]
    SourceMissing { tool: String, path: PathBuf },

    /// A snapshot directory lacks a required marker file or directory
    #[error("Invalid snapshot for '{tool}': missing {}", path.display())]
    InvalidSnapshot { tool: String, path: PathBuf },

    /// No environment with the given name exists
    #[error("Environment '{0}' not found")]
    EnvironmentNotFound(String),

    /// An environment with the given name already exists
    #[error("Environment '{0}' already exists")]
    EnvironmentExists(String),

    /// A hook exited unsuccessfully or could not be spawned
    #[error("Hook '{command}' failed: {reason}")]
    HookFailed { command: String, reason: String },

    /// Archive creation or extraction errors
    #[error("Archive error: {0}")]
    Archive(String),

    /// The switch lock could not be acquired in time
    #[error("Timed out after {waited_secs}s waiting for switch lock {}", path.display())]
    LockTimeout { path: PathBuf, waited_secs: u64 },

    /// Malformed env-var snapshot file
    #[error("Invalid env file {} line {line}: {reason}", path.display())]
    EnvFile {
        path: PathBuf,
        line: usize,
        reason: String,
    },

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// The tracing subscriber could not be installed
    #[error("Logging setup failed: {0}")]
    Logging(String),
}

impl EnvSwitchError {
    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new archive error
    pub fn archive<S: Into<String>>(msg: S) -> Self {
        Self::Archive(msg.into())
    }

    /// Create a new hook failure
    pub fn hook_failed<C: Into<String>, R: Into<String>>(command: C, reason: R) -> Self {
        Self::HookFailed {
            command: command.into(),
            reason: reason.into(),
        }
    }

    pub fn not_installed<S: Into<String>>(tool: S) -> Self {
        Self::NotInstalled { tool: tool.into() }
    }

    pub fn source_missing<S: Into<String>, P: Into<PathBuf>>(tool: S, path: P) -> Self {
        Self::SourceMissing {
            tool: tool.into(),
            path: path.into(),
        }
    }

    pub fn invalid_snapshot<S: Into<String>, P: Into<PathBuf>>(tool: S, path: P) -> Self {
        Self::InvalidSnapshot {
            tool: tool.into(),
            path: path.into(),
        }
    }
}
