/*!
Switch orchestration.

A switch moves the machine from the current environment to a target one:

1. resolve the target, returning early when it is already active or for a dry run
2. take the switch lock
3. archive the current environment (unless backups are off)
4. capture the current environment's live configuration
5. run the target's `pre_switch` hooks
6. restore the target's snapshots and variables
7. run the target's `post_switch` hooks (best-effort)
8. point `current.lock` at the target and record history

Failures in steps 4 to 6 abort the switch with a failure entry in the
history and leave the pointer alone.
*/

use crate::archive::ArchiveManager;
use crate::config::{SwitchConfig, SwitchOptions};
use crate::current::{CurrentPointer, SwitchLock};
use crate::environment::{Environment, EnvironmentStore, HookPhase, ToolConfig};
use crate::history::{HistoryLog, SwitchEntry};
use crate::layout::Layout;
use crate::metadata::Change;
use crate::snapshot::{CaptureReport, RestoreReport, SnapshotEngine};
use crate::tools::ToolRegistry;
use crate::{hooks, EnvSwitchError, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// How a switch call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchStatus {
    /// Target was already the current environment; nothing was touched
    AlreadyActive,
    /// Dry run; nothing was touched
    DryRun,
    Switched,
}

/// Installation state of one tool after a switch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCheck {
    pub tool: String,
    pub installed: bool,
}

#[derive(Debug, Clone)]
pub struct SwitchOutcome {
    pub status: SwitchStatus,
    pub from: Option<String>,
    pub to: String,
    pub tools_restored: usize,
    /// Tools whose restore failed, with the error text
    pub tools_failed: Vec<(String, String)>,
    pub backup: Option<PathBuf>,
    /// Present when verification was requested
    pub verification: Option<Vec<ToolCheck>>,
    pub duration: Duration,
}

impl SwitchOutcome {
    fn unchanged(status: SwitchStatus, from: Option<String>, to: &str, started: Instant) -> Self {
        Self {
            status,
            from,
            to: to.to_string(),
            tools_restored: 0,
            tools_failed: Vec::new(),
            backup: None,
            verification: None,
            duration: started.elapsed(),
        }
    }
}

/// Owns everything a switch needs for one invocation
pub struct Switcher {
    layout: Layout,
    config: SwitchConfig,
    registry: ToolRegistry,
    store: EnvironmentStore,
    archives: ArchiveManager,
    history: HistoryLog,
    pointer: CurrentPointer,
}

impl Switcher {
    pub fn new(layout: Layout, config: SwitchConfig, registry: ToolRegistry) -> Self {
        Self {
            store: EnvironmentStore::new(layout.clone()),
            archives: ArchiveManager::new(layout.archives_dir()),
            history: HistoryLog::new(layout.history_file()),
            pointer: CurrentPointer::new(layout.current_file()),
            layout,
            config,
            registry,
        }
    }

    /// Load `config.yaml` from the root and build the built-in registry
    /// against the user's home directory
    pub fn open(layout: Layout) -> Result<Self> {
        let config = SwitchConfig::load(&layout.config_file())?;
        let home = dirs::home_dir()
            .ok_or_else(|| EnvSwitchError::validation("cannot determine the home directory"))?;
        let registry = ToolRegistry::builtin(&home, &config);
        Ok(Self::new(layout, config, registry))
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn config(&self) -> &SwitchConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn store(&self) -> &EnvironmentStore {
        &self.store
    }

    pub fn archives(&self) -> &ArchiveManager {
        &self.archives
    }

    pub fn history(&self) -> &HistoryLog {
        &self.history
    }

    pub fn pointer(&self) -> &CurrentPointer {
        &self.pointer
    }

    fn engine(&self, hooks: bool) -> SnapshotEngine<'_> {
        SnapshotEngine::new(&self.registry, &self.store, &self.config.env_vars).with_hooks(hooks)
    }

    /// The environment named by the pointer
    ///
    /// A pointer naming a missing environment is reported and treated as unset.
    pub fn current(&self) -> Result<Option<Environment>> {
        let Some(name) = self.pointer.get()? else {
            return Ok(None);
        };
        match self.store.load(&name) {
            Ok(env) => Ok(Some(env)),
            Err(EnvSwitchError::EnvironmentNotFound(_)) => {
                warn!("Current environment '{}' no longer exists", name);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Switch from whatever the pointer names to `target`
    pub fn switch_to(&self, target: &str, opts: SwitchOptions) -> Result<SwitchOutcome> {
        let current = self.current()?;
        self.switch(current.as_ref(), target, opts)
    }

    /// Switch from `current` to `target`
    pub fn switch(
        &self,
        current: Option<&Environment>,
        target: &str,
        opts: SwitchOptions,
    ) -> Result<SwitchOutcome> {
        let started = Instant::now();
        let mut target_env = self.store.load(target)?;
        let from = current.map(|c| c.name.clone());

        if from.as_deref() == Some(target) {
            info!("Environment '{}' is already active", target);
            return Ok(SwitchOutcome::unchanged(SwitchStatus::AlreadyActive, from, target, started));
        }
        if opts.dry_run {
            info!(
                "Dry run: would switch {} -> {}",
                from.as_deref().unwrap_or("(none)"),
                target
            );
            return Ok(SwitchOutcome::unchanged(SwitchStatus::DryRun, from, target, started));
        }

        let _lock = SwitchLock::acquire(
            &self.layout.lock_file(),
            Duration::from_secs(self.config.lock_timeout_secs),
        )?;
        info!(
            "Switching {} -> {}",
            from.as_deref().unwrap_or("(none)"),
            target
        );

        let backup = match current {
            Some(cur) if self.config.auto_backup && !opts.no_backup => {
                match self.archives.create_archive(cur) {
                    Ok(archive) => Some(archive.path),
                    Err(e) => {
                        warn!("Backup of '{}' failed, continuing without one: {}", cur.name, e);
                        None
                    }
                }
            }
            _ => None,
        };

        let engine = self.engine(!opts.no_hooks);
        let abort = |e: EnvSwitchError| self.record_abort(from.as_deref(), target, e, &backup, started);

        if let Some(cur) = current {
            let mut cur = cur.clone();
            if let Err(e) = engine.capture_all(&mut cur) {
                return Err(abort(e));
            }
        }

        if !opts.no_hooks {
            if let Err(e) = hooks::run_hooks(&target_env.hooks.pre_switch, HookPhase::PreSwitch, target) {
                return Err(abort(e));
            }
        }

        let report = match engine.restore_all(&target_env) {
            Ok(report) => report,
            Err(e) => return Err(abort(e)),
        };

        if !opts.no_hooks {
            if let Err(e) = hooks::run_hooks(&target_env.hooks.post_switch, HookPhase::PostSwitch, target) {
                warn!("Post-switch hook failed for '{}': {}", target, e);
            }
        }

        if let Err(e) = self.pointer.set(target) {
            return Err(abort(e));
        }

        self.finalize(&mut target_env, from.as_deref(), &report, &backup, started);

        let verification = (opts.verify || self.config.verify_after_switch)
            .then(|| self.verify(&target_env));

        info!(
            "Switched to '{}' in {}ms ({} tool(s) restored)",
            target,
            started.elapsed().as_millis(),
            report.count()
        );
        Ok(SwitchOutcome {
            status: SwitchStatus::Switched,
            from,
            to: target.to_string(),
            tools_restored: report.count(),
            tools_failed: report.failed,
            backup,
            verification,
            duration: started.elapsed(),
        })
    }

    /// Bookkeeping after the pointer moved; every failure here is a warning
    fn finalize(
        &self,
        target: &mut Environment,
        from: Option<&str>,
        report: &RestoreReport,
        backup: &Option<PathBuf>,
        started: Instant,
    ) {
        let now = Utc::now();
        target.last_used = Some(now);
        target.updated_at = now;
        if let Err(e) = self.store.save(target) {
            warn!("Failed to update metadata for '{}': {}", target.name, e);
        }

        let entry = SwitchEntry::success(
            from,
            &target.name,
            backup.clone(),
            report.count(),
            started.elapsed(),
        );
        if let Err(e) = self.history.append(entry) {
            warn!("Failed to record switch history: {}", e);
        }

        if let Err(e) = self.archives.cleanup_old_archives(self.config.backup_retention) {
            warn!("Archive cleanup failed: {}", e);
        }
    }

    fn record_abort(
        &self,
        from: Option<&str>,
        to: &str,
        error: EnvSwitchError,
        backup: &Option<PathBuf>,
        started: Instant,
    ) -> EnvSwitchError {
        warn!("Switch to '{}' aborted: {}", to, error);
        let entry = SwitchEntry::failure(from, to, &error.to_string(), backup.clone(), started.elapsed());
        if let Err(e) = self.history.append(entry) {
            warn!("Failed to record failed switch: {}", e);
        }
        error
    }

    /// Installation state of each enabled tool the registry knows
    pub fn verify(&self, env: &Environment) -> Vec<ToolCheck> {
        env.enabled_tools()
            .filter_map(|(name, _)| self.registry.get(name))
            .map(|adapter| {
                let installed = adapter.is_installed();
                if !installed {
                    warn!("Tool '{}' is not installed", adapter.name());
                }
                ToolCheck {
                    tool: adapter.name().to_string(),
                    installed,
                }
            })
            .collect()
    }

    /// Create an environment and capture it straight away
    ///
    /// `tools` selects tools by name; `None` enables every installed tool.
    pub fn create_environment(
        &self,
        name: &str,
        description: &str,
        tools: Option<&[String]>,
    ) -> Result<(Environment, CaptureReport)> {
        let selected: Vec<String> = match tools {
            Some(names) => {
                if let Some(unknown) = names.iter().find(|n| !self.registry.contains(n)) {
                    return Err(EnvSwitchError::validation(format!(
                        "unknown or excluded tool '{unknown}'"
                    )));
                }
                names.to_vec()
            }
            None => self.registry.installed(),
        };

        let mut env = Environment::new(name, PathBuf::new()).with_description(description);
        for tool in &selected {
            env.tools.insert(tool.clone(), ToolConfig::enabled_for(tool));
        }
        let mut env = self.store.create(env)?;
        let report = self.engine(true).capture_all(&mut env)?;
        Ok((env, report))
    }

    /// Re-capture an existing environment from the live system
    pub fn snapshot(&self, name: &str) -> Result<CaptureReport> {
        let mut env = self.store.load(name)?;
        self.engine(true).capture_all(&mut env)
    }

    /// Per-tool differences between an environment's snapshots and the live system
    ///
    /// Tools without a usable snapshot are left out.
    pub fn diff(&self, name: &str) -> Result<BTreeMap<String, Vec<Change>>> {
        let env = self.store.load(name)?;
        let mut changes = BTreeMap::new();
        for (tool, cfg) in env.enabled_tools() {
            let Some(adapter) = self.registry.get(tool) else {
                continue;
            };
            match adapter.diff(&env.snapshot_dir(cfg)) {
                Ok(diff) => {
                    changes.insert(tool.to_string(), diff);
                }
                Err(e) => info!("No diff for '{}': {}", tool, e),
            }
        }
        Ok(changes)
    }

    /// Archive an environment, then delete it
    ///
    /// Clears the pointer when it named this environment. Returns the archive.
    pub fn delete_environment(&self, name: &str) -> Result<PathBuf> {
        let env = self.store.load(name)?;
        let archive = self.archives.create_archive(&env)?;
        self.store.remove(name)?;

        if self.pointer.get()?.as_deref() == Some(name) {
            self.pointer.clear()?;
            info!("Cleared current environment pointer");
        }
        Ok(archive.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{PathTool, ToolAdapter};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn switcher(root: &Path, live: &Path) -> Switcher {
        let adapters: Vec<Box<dyn ToolAdapter>> =
            vec![Box::new(PathTool::new("app", live.join("app.conf")))];
        Switcher::new(
            Layout::new(root),
            SwitchConfig::default(),
            ToolRegistry::from_adapters(adapters, &[]),
        )
    }

    #[test]
    fn test_unknown_target_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let sw = switcher(&temp_dir.path().join("root"), temp_dir.path());

        assert!(matches!(
            sw.switch_to("nowhere", SwitchOptions::default()),
            Err(EnvSwitchError::EnvironmentNotFound(_))
        ));
        assert!(sw.history().load().unwrap().is_empty());
        assert!(!sw.layout().lock_file().exists());
    }

    #[test]
    fn test_already_active_is_a_no_op() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("app.conf"), "a").unwrap();
        let sw = switcher(&temp_dir.path().join("root"), temp_dir.path());
        let (env, _) = sw.create_environment("work", "", None).unwrap();

        let outcome = sw.switch(Some(&env), "work", SwitchOptions::default()).unwrap();
        assert_eq!(outcome.status, SwitchStatus::AlreadyActive);
        assert!(sw.history().load().unwrap().is_empty());
        assert!(sw.pointer().get().unwrap().is_none());
    }

    #[test]
    fn test_create_selects_installed_tools_and_rejects_unknown() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("app.conf"), "a").unwrap();
        let sw = switcher(&temp_dir.path().join("root"), temp_dir.path());

        let (env, report) = sw.create_environment("work", "desk", None).unwrap();
        assert_eq!(env.tools.keys().collect::<Vec<_>>(), vec!["app"]);
        assert_eq!(report.count(), 1);
        assert_eq!(env.description, "desk");

        let err = sw
            .create_environment("other", "", Some(&["kubectl".to_string()]))
            .unwrap_err();
        assert!(matches!(err, EnvSwitchError::Validation(_)));
        assert!(!sw.store().exists("other"));
    }

    #[test]
    fn test_delete_archives_and_clears_pointer() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("app.conf"), "a").unwrap();
        let sw = switcher(&temp_dir.path().join("root"), temp_dir.path());
        sw.create_environment("work", "", None).unwrap();
        sw.pointer().set("work").unwrap();

        let archive = sw.delete_environment("work").unwrap();
        assert!(archive.is_file());
        assert!(!sw.store().exists("work"));
        assert!(sw.pointer().get().unwrap().is_none());
    }

    #[test]
    fn test_dangling_pointer_is_treated_as_unset() {
        let temp_dir = TempDir::new().unwrap();
        let sw = switcher(&temp_dir.path().join("root"), temp_dir.path());
        sw.pointer().set("vanished").unwrap();

        assert!(sw.current().unwrap().is_none());
    }

    #[test]
    fn test_diff_reports_live_changes() {
        let temp_dir = TempDir::new().unwrap();
        let live = temp_dir.path().join("app.conf");
        fs::write(&live, "one").unwrap();
        let sw = switcher(&temp_dir.path().join("root"), temp_dir.path());
        sw.create_environment("work", "", None).unwrap();

        assert!(sw.diff("work").unwrap()["app"].is_empty());
        fs::write(&live, "two").unwrap();
        assert_eq!(sw.diff("work").unwrap()["app"].len(), 1);
    }
}
