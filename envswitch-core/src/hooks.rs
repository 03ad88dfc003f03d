//! Synchronous execution of environment hooks.

use crate::environment::{Hook, HookPhase};
use crate::{EnvSwitchError, Result};
use std::process::Command;
use std::time::Instant;
use tracing::{debug, info};

/// Variable naming the environment being switched to, set for every hook
pub const TARGET_ENV_VAR: &str = "ENVSWITCH_TARGET";

/// Run `hooks` in order, stopping at the first failure
///
/// Each hook is a child process inheriting this process's environment and
/// standard streams, plus [`TARGET_ENV_VAR`]. There is no timeout.
pub fn run_hooks(hooks: &[Hook], phase: HookPhase, target: &str) -> Result<()> {
    if hooks.is_empty() {
        return Ok(());
    }
    info!("Running {} {} hook(s) for '{}'", hooks.len(), phase, target);

    for hook in hooks {
        run_hook(hook, target)?;
    }
    Ok(())
}

fn run_hook(hook: &Hook, target: &str) -> Result<()> {
    let label = hook.label();
    let mut command = build_command(hook).ok_or_else(|| {
        EnvSwitchError::hook_failed(&label, "hook has neither a command nor a script")
    })?;
    command.env(TARGET_ENV_VAR, target);

    let started = Instant::now();
    let status = command
        .status()
        .map_err(|e| EnvSwitchError::hook_failed(&label, format!("failed to spawn: {e}")))?;
    debug!(
        "Hook '{}' finished in {}ms with {}",
        label,
        started.elapsed().as_millis(),
        status
    );

    if status.success() {
        Ok(())
    } else {
        Err(EnvSwitchError::hook_failed(label, status.to_string()))
    }
}

#[cfg(unix)]
fn build_command(hook: &Hook) -> Option<Command> {
    let mut command = Command::new("sh");
    match (&hook.command, &hook.script) {
        (Some(line), _) if !line.trim().is_empty() => {
            command.arg("-c").arg(line);
        }
        (_, Some(script)) => {
            command.arg(script);
        }
        _ => return None,
    }
    Some(command)
}

#[cfg(windows)]
fn build_command(hook: &Hook) -> Option<Command> {
    let mut command = Command::new("cmd");
    match (&hook.command, &hook.script) {
        (Some(line), _) if !line.trim().is_empty() => {
            command.arg("/C").arg(line);
        }
        (_, Some(script)) => {
            command.arg("/C").arg(script);
        }
        _ => return None,
    }
    Some(command)
}
