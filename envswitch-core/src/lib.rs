/*!
# envswitch core

Capture, restore and switch between named command-line tool environments.

An environment is a named bundle of tool configuration (kubectl contexts,
gcloud configurations, AWS profiles, Docker contexts, git identity, plus any
user-declared file or directory) captured from the live system into
`~/.envswitch/environments/<name>/`. Switching saves the live state into the
current environment, restores the target's snapshots and moves the
`current.lock` pointer.

## Architecture

- Tool adapters implement [`ToolAdapter`] and are collected in a
  [`ToolRegistry`] built once per invocation
- The [`SnapshotEngine`] runs capture and restore over every enabled tool,
  tolerating per-tool failures
- [`ArchiveManager`] keeps tar.gz backups with retention
- [`Switcher`] orchestrates a switch under an advisory lock and records
  every attempt in the [`HistoryLog`]

## Usage

```rust,no_run
use envswitch_core::{Layout, SwitchOptions, Switcher};

let layout = Layout::new("/home/me/.envswitch");
let switcher = Switcher::open(layout)?;

let outcome = switcher.switch_to("work", SwitchOptions::default())?;
println!("restored {} tools in {:?}", outcome.tools_restored, outcome.duration);
# Ok::<(), envswitch_core::EnvSwitchError>(())
```
*/

pub mod archive;
pub mod config;
pub mod current;
pub mod envfile;
pub mod environment;
pub mod error;
pub mod fsutil;
pub mod history;
pub mod hooks;
pub mod layout;
pub mod metadata;
pub mod observability;
pub mod snapshot;
pub mod switch;
pub mod tools;

#[cfg(test)]
mod metadata_tests;

pub use archive::{restore_archive, Archive, ArchiveInfo, ArchiveManager};
pub use config::{CustomTool, EnvVarsConfig, LogConfig, LogFormat, SwitchConfig, SwitchOptions};
pub use current::{CurrentPointer, SwitchLock};
pub use environment::{Environment, EnvironmentStore, Hook, HookPhase, Hooks, ToolConfig};
pub use error::{EnvSwitchError, Result};
pub use history::{HistoryLog, SwitchEntry};
pub use layout::Layout;
pub use metadata::{Change, ChangeKind, Metadata, MetadataValue};
pub use snapshot::{CaptureReport, RestoreReport, SnapshotEngine};
pub use switch::{SwitchOutcome, SwitchStatus, Switcher, ToolCheck};
pub use tools::{Detection, ToolAdapter, ToolRegistry};
