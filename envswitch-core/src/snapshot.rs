/*!
Snapshot/restore engine: moves tool configuration between the live system
and an environment's `snapshots/` directory.

Per-tool failures never abort the loop. A machine missing one tool must still
be able to switch between environments that share the others.
*/

use crate::config::EnvVarsConfig;
use crate::environment::{Environment, EnvironmentStore, HookPhase};
use crate::tools::{ToolAdapter, ToolRegistry};
use crate::{envfile, fsutil, hooks, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Outcome of capturing one environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureReport {
    /// Tools whose snapshot succeeded
    pub captured: Vec<String>,
    /// Tools skipped as not installed or unknown to the registry
    pub skipped: Vec<String>,
    /// Tools whose snapshot failed, with the error text
    pub failed: Vec<(String, String)>,
    /// Number of tracked variables written
    pub env_vars: usize,
}

impl CaptureReport {
    pub fn count(&self) -> usize {
        self.captured.len()
    }
}

/// Outcome of restoring one environment
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: Vec<String>,
    /// Tools without a snapshot or unknown to the registry
    pub skipped: Vec<String>,
    /// Tools whose validation or restore failed, with the error text
    pub failed: Vec<(String, String)>,
    /// Variables set in this process
    pub env_vars: BTreeMap<String, String>,
}

impl RestoreReport {
    pub fn count(&self) -> usize {
        self.restored.len()
    }
}

/// Engine for capture and restore over the tools enabled in an environment
///
/// # Example
/// ```rust,no_run
/// use envswitch_core::{EnvironmentStore, Layout, SnapshotEngine, SwitchConfig, ToolRegistry};
///
/// let layout = Layout::new("/tmp/envswitch");
/// let store = EnvironmentStore::new(layout);
/// let config = SwitchConfig::default();
/// let registry = ToolRegistry::builtin(std::path::Path::new("/home/me"), &config);
/// let engine = SnapshotEngine::new(&registry, &store, &config.env_vars);
///
/// let mut env = store.load("work")?;
/// let report = engine.capture_all(&mut env)?;
/// println!("captured {} tools", report.count());
/// # Ok::<(), envswitch_core::EnvSwitchError>(())
/// ```
pub struct SnapshotEngine<'a> {
    registry: &'a ToolRegistry,
    store: &'a EnvironmentStore,
    env_vars: &'a EnvVarsConfig,
    run_hooks: bool,
}

impl<'a> SnapshotEngine<'a> {
    pub fn new(
        registry: &'a ToolRegistry,
        store: &'a EnvironmentStore,
        env_vars: &'a EnvVarsConfig,
    ) -> Self {
        Self {
            registry,
            store,
            env_vars,
            run_hooks: true,
        }
    }

    /// Enable or disable `pre_snapshot`/`post_snapshot` hooks
    pub fn with_hooks(mut self, enabled: bool) -> Self {
        self.run_hooks = enabled;
        self
    }

    /// Capture every enabled tool of `env` and persist its metadata
    ///
    /// Per-tool failures are logged and counted, never returned. The only
    /// error is a failure to write the environment record itself.
    pub fn capture_all(&self, env: &mut Environment) -> Result<CaptureReport> {
        env.validate()?;
        info!("Capturing environment '{}'", env.name);
        let mut report = CaptureReport::default();

        if self.run_hooks {
            if let Err(e) = hooks::run_hooks(&env.hooks.pre_snapshot, HookPhase::PreSnapshot, &env.name) {
                warn!("Pre-snapshot hook failed for '{}': {}", env.name, e);
            }
        }

        let names: Vec<String> = env.enabled_tools().map(|(n, _)| n.to_string()).collect();
        for name in names {
            let Some(adapter) = self.registry.get(&name) else {
                info!("Skipping '{}': not available in this registry", name);
                report.skipped.push(name);
                continue;
            };
            if !adapter.is_installed() {
                info!("Skipping '{}': not installed", name);
                report.skipped.push(name);
                continue;
            }

            let dest = env.snapshot_dir(&env.tools[&name]);
            match capture_tool(adapter, &dest) {
                Ok(()) => {
                    debug!("Captured '{}' into {}", name, dest.display());
                    match adapter.get_metadata() {
                        Ok(meta) => {
                            if let Some(cfg) = env.tools.get_mut(&name) {
                                cfg.metadata = meta;
                            }
                        }
                        Err(e) => warn!("Could not read metadata for '{}': {}", name, e),
                    }
                    report.captured.push(name);
                }
                Err(e) => {
                    warn!("Failed to capture '{}': {}", name, e);
                    report.failed.push((name, e.to_string()));
                }
            }
        }

        if self.env_vars.capture && !self.env_vars.tracked.is_empty() {
            let vars = read_tracked_vars(&self.env_vars.tracked);
            match envfile::write_env_file(&env.env_vars_file(), &vars) {
                Ok(()) => {
                    report.env_vars = vars.len();
                    env.env_vars = vars;
                }
                Err(e) => warn!("Failed to write env vars for '{}': {}", env.name, e),
            }
        }

        let now = Utc::now();
        if !report.captured.is_empty() {
            env.last_snapshot = Some(now);
        }
        env.updated_at = now;
        self.store.save(env)?;

        if self.run_hooks {
            if let Err(e) = hooks::run_hooks(&env.hooks.post_snapshot, HookPhase::PostSnapshot, &env.name) {
                warn!("Post-snapshot hook failed for '{}': {}", env.name, e);
            }
        }

        info!(
            "Captured {} tool(s) for '{}' ({} skipped, {} failed)",
            report.captured.len(),
            env.name,
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Restore every enabled tool of `env`, then its stored variables
    ///
    /// The tool loop always completes. The only error is a failure to load
    /// the stored variable file.
    pub fn restore_all(&self, env: &Environment) -> Result<RestoreReport> {
        env.validate()?;
        info!("Restoring environment '{}'", env.name);
        let mut report = RestoreReport::default();

        for (name, cfg) in env.enabled_tools() {
            let Some(adapter) = self.registry.get(name) else {
                info!("Skipping '{}': not available in this registry", name);
                report.skipped.push(name.to_string());
                continue;
            };

            let dir = env.snapshot_dir(cfg);
            if !dir.is_dir() {
                info!("Skipping '{}': no snapshot at {}", name, dir.display());
                report.skipped.push(name.to_string());
                continue;
            }
            if let Err(e) = adapter.validate_snapshot(&dir) {
                warn!("Skipping '{}': {}", name, e);
                report.failed.push((name.to_string(), e.to_string()));
                continue;
            }

            match adapter.restore(&dir) {
                Ok(()) => {
                    debug!("Restored '{}' from {}", name, dir.display());
                    report.restored.push(name.to_string());
                }
                Err(e) => {
                    warn!("Failed to restore '{}': {}", name, e);
                    report.failed.push((name.to_string(), e.to_string()));
                }
            }
        }

        if let Some(vars) = envfile::read_env_file(&env.env_vars_file())? {
            for (key, value) in &vars {
                std::env::set_var(key, value);
            }
            debug!("Applied {} variable(s) to this process", vars.len());
            report.env_vars = vars;
        }

        info!(
            "Restored {} tool(s) for '{}' ({} skipped, {} failed)",
            report.restored.len(),
            env.name,
            report.skipped.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

/// Snapshot into a staging sibling, then swap it in place of `dest`
///
/// A failed capture leaves the previous snapshot untouched.
fn capture_tool(adapter: &dyn ToolAdapter, dest: &Path) -> Result<()> {
    let file_name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| adapter.name().to_string());
    let staging = dest.with_file_name(format!(".{file_name}.partial"));
    fsutil::remove_path(&staging)?;

    if let Err(e) = adapter.snapshot(&staging) {
        if let Err(cleanup) = fsutil::remove_path(&staging) {
            debug!("Could not remove {}: {}", staging.display(), cleanup);
        }
        return Err(e);
    }
    fsutil::remove_path(dest)?;
    fs::rename(&staging, dest)?;
    Ok(())
}

fn read_tracked_vars(names: &[String]) -> BTreeMap<String, String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok().map(|v| (name.clone(), v)))
        .collect()
}
