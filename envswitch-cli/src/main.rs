/*!
envswitch CLI - capture and switch between command-line tool environments.

Every command works on the root given by `--root`, `ENVSWITCH_HOME`, or
`~/.envswitch`.
*/

use anyhow::{anyhow, Context};
use chrono::{DateTime, Local, Utc};
use clap::{Parser, Subcommand};
use envswitch_core::observability::init_logging;
use envswitch_core::{
    restore_archive, Layout, LogFormat, SwitchConfig, SwitchOptions, SwitchStatus, Switcher,
    ToolRegistry,
};
use std::io::{self, Write};
use std::path::PathBuf;
use tabled::{Table, Tabled};
use tracing::info;

#[derive(Parser)]
#[command(name = "envswitch")]
#[command(about = "Capture and switch between command-line tool environments")]
#[command(version)]
struct Cli {
    /// Root directory holding environments, archives and history
    #[arg(long, global = true, env = "ENVSWITCH_HOME")]
    root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List environments
    List,
    /// Show the active environment
    Current,
    /// Create an environment from the live configuration
    Create {
        name: String,
        #[arg(short, long, default_value = "")]
        description: String,
        /// Comma-separated tools to enable (default: every installed tool)
        #[arg(long, value_delimiter = ',')]
        tools: Option<Vec<String>>,
    },
    /// Re-capture an environment from the live configuration
    Snapshot { name: String },
    /// Switch to an environment
    Switch {
        name: String,
        /// Show what would happen without changing anything
        #[arg(long)]
        dry_run: bool,
        /// Skip archiving the current environment
        #[arg(long)]
        no_backup: bool,
        /// Skip pre- and post-switch hooks
        #[arg(long)]
        no_hooks: bool,
        /// Check tool installation afterwards
        #[arg(long)]
        verify: bool,
    },
    /// Compare an environment's snapshots with the live configuration
    Diff { name: String },
    /// Show recent switches
    History {
        #[arg(short = 'n', long, default_value_t = 10)]
        limit: i64,
        /// Erase the history
        #[arg(long)]
        clear: bool,
    },
    /// List archives, newest first
    Archives,
    /// Delete archives beyond the retention count
    Cleanup {
        /// Archives to keep (default: backup_retention from config)
        #[arg(long)]
        retention: Option<i64>,
    },
    /// Archive and then delete an environment
    Delete {
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },
    /// Extract an archive
    Import {
        archive: PathBuf,
        /// Destination directory (default: the environments directory)
        #[arg(long)]
        dest: Option<PathBuf>,
    },
}

#[derive(Tabled)]
struct EnvironmentRow {
    #[tabled(rename = "")]
    active: &'static str,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Tools")]
    tools: String,
    #[tabled(rename = "Last Used")]
    last_used: String,
    #[tabled(rename = "Description")]
    description: String,
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "When")]
    timestamp: String,
    #[tabled(rename = "From")]
    from: String,
    #[tabled(rename = "To")]
    to: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Tools")]
    tools: usize,
    #[tabled(rename = "Duration")]
    duration: String,
}

#[derive(Tabled)]
struct ArchiveRow {
    #[tabled(rename = "Archive")]
    name: String,
    #[tabled(rename = "Environment")]
    environment: String,
    #[tabled(rename = "Created")]
    modified: String,
    #[tabled(rename = "Size")]
    size: String,
}

fn main() -> Result<(), anyhow::Error> {
    let cli = Cli::parse();

    let root = cli
        .root
        .clone()
        .or_else(Layout::default_root)
        .ok_or_else(|| anyhow!("cannot determine the home directory; pass --root"))?;
    let layout = Layout::new(root);
    let config = SwitchConfig::load(&layout.config_file())
        .with_context(|| format!("loading {}", layout.config_file().display()))?;

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        config.log.format
    };
    init_logging(&config.log.level, format, cli.verbose)?;

    let home = dirs::home_dir().ok_or_else(|| anyhow!("cannot determine the home directory"))?;
    let registry = ToolRegistry::builtin(&home, &config);
    let switcher = Switcher::new(layout, config, registry);

    match cli.command {
        Commands::List => list_environments(&switcher)?,
        Commands::Current => show_current(&switcher)?,
        Commands::Create {
            name,
            description,
            tools,
        } => create_environment(&switcher, &name, &description, tools.as_deref())?,
        Commands::Snapshot { name } => snapshot_environment(&switcher, &name)?,
        Commands::Switch {
            name,
            dry_run,
            no_backup,
            no_hooks,
            verify,
        } => {
            let opts = SwitchOptions {
                dry_run,
                no_backup,
                no_hooks,
                verify,
            };
            switch_environment(&switcher, &name, opts)?
        }
        Commands::Diff { name } => diff_environment(&switcher, &name)?,
        Commands::History { limit, clear } => show_history(&switcher, limit, clear)?,
        Commands::Archives => list_archives(&switcher)?,
        Commands::Cleanup { retention } => cleanup_archives(&switcher, retention)?,
        Commands::Delete { name, force } => delete_environment(&switcher, &name, force)?,
        Commands::Import { archive, dest } => import_archive(&switcher, &archive, dest)?,
    }

    Ok(())
}

fn list_environments(switcher: &Switcher) -> Result<(), anyhow::Error> {
    let envs = switcher.store().load_all()?;
    if envs.is_empty() {
        println!("No environments found");
        return Ok(());
    }
    let current = switcher.pointer().get()?;

    let rows: Vec<EnvironmentRow> = envs
        .iter()
        .map(|env| EnvironmentRow {
            active: if current.as_deref() == Some(env.name.as_str()) {
                "*"
            } else {
                ""
            },
            name: env.name.clone(),
            tools: env
                .enabled_tools()
                .map(|(name, _)| name)
                .collect::<Vec<_>>()
                .join(","),
            last_used: env
                .last_used
                .map(format_timestamp)
                .unwrap_or_else(|| "never".to_string()),
            description: env.description.clone(),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

fn show_current(switcher: &Switcher) -> Result<(), anyhow::Error> {
    match switcher.current()? {
        Some(env) => {
            println!("{}", env.name);
            if !env.description.is_empty() {
                println!("  {}", env.description);
            }
        }
        None => println!("No active environment"),
    }
    Ok(())
}

fn create_environment(
    switcher: &Switcher,
    name: &str,
    description: &str,
    tools: Option<&[String]>,
) -> Result<(), anyhow::Error> {
    let (env, report) = switcher.create_environment(name, description, tools)?;
    println!(
        "✓ Created '{}' with {} tool(s) captured",
        env.name,
        report.count()
    );
    print_problems(&report.skipped, &report.failed);
    Ok(())
}

fn snapshot_environment(switcher: &Switcher, name: &str) -> Result<(), anyhow::Error> {
    let report = switcher.snapshot(name)?;
    println!("✓ Captured {} tool(s) into '{}'", report.count(), name);
    print_problems(&report.skipped, &report.failed);
    Ok(())
}

fn switch_environment(
    switcher: &Switcher,
    name: &str,
    opts: SwitchOptions,
) -> Result<(), anyhow::Error> {
    let outcome = switcher.switch_to(name, opts)?;
    let from = outcome.from.as_deref().unwrap_or("(none)");

    match outcome.status {
        SwitchStatus::AlreadyActive => println!("'{}' is already active", outcome.to),
        SwitchStatus::DryRun => println!("Would switch {} -> {}", from, outcome.to),
        SwitchStatus::Switched => {
            println!(
                "✓ Switched {} -> {} ({} tool(s) restored in {}ms)",
                from,
                outcome.to,
                outcome.tools_restored,
                outcome.duration.as_millis()
            );
            if let Some(backup) = &outcome.backup {
                println!("  Backup: {}", backup.display());
            }
            for (tool, reason) in &outcome.tools_failed {
                println!("  ✗ {tool}: {reason}");
            }
        }
    }

    if let Some(checks) = &outcome.verification {
        for check in checks {
            let mark = if check.installed { "✓" } else { "✗ not installed" };
            println!("  {} {}", check.tool, mark);
        }
    }
    Ok(())
}

fn diff_environment(switcher: &Switcher, name: &str) -> Result<(), anyhow::Error> {
    let diffs = switcher.diff(name)?;
    if diffs.values().all(Vec::is_empty) {
        println!("No differences between '{name}' and the live configuration");
        return Ok(());
    }
    for (tool, changes) in diffs.iter().filter(|(_, c)| !c.is_empty()) {
        println!("{tool}:");
        for change in changes {
            println!("  {change}");
        }
    }
    Ok(())
}

fn show_history(switcher: &Switcher, limit: i64, clear: bool) -> Result<(), anyhow::Error> {
    if clear {
        switcher.history().clear()?;
        println!("✓ History cleared");
        return Ok(());
    }

    let entries = switcher.history().get_last(limit)?;
    if entries.is_empty() {
        println!("No switches recorded");
        return Ok(());
    }
    let rows: Vec<HistoryRow> = entries
        .into_iter()
        .map(|e| HistoryRow {
            timestamp: format_timestamp(e.timestamp),
            from: e.from.unwrap_or_else(|| "-".to_string()),
            to: e.to,
            result: match e.error {
                None if e.success => "ok".to_string(),
                Some(err) => format!("failed: {err}"),
                None => "failed".to_string(),
            },
            tools: e.tools_count,
            duration: format!("{}ms", e.duration_ms),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

fn list_archives(switcher: &Switcher) -> Result<(), anyhow::Error> {
    let archives = switcher.archives().list_archives()?;
    if archives.is_empty() {
        println!("No archives found in {}", switcher.archives().dir().display());
        return Ok(());
    }
    let rows: Vec<ArchiveRow> = archives
        .into_iter()
        .map(|a| ArchiveRow {
            name: a.file_name,
            environment: a.environment.unwrap_or_else(|| "?".to_string()),
            modified: format_timestamp(a.modified),
            size: format_size(a.size),
        })
        .collect();
    println!("{}", Table::new(rows));
    Ok(())
}

fn cleanup_archives(switcher: &Switcher, retention: Option<i64>) -> Result<(), anyhow::Error> {
    let retention = retention.unwrap_or(switcher.config().backup_retention);
    let removed = switcher.archives().cleanup_old_archives(retention)?;
    println!("✓ Removed {removed} archive(s)");
    Ok(())
}

fn delete_environment(switcher: &Switcher, name: &str, force: bool) -> Result<(), anyhow::Error> {
    if !force {
        print!("Are you sure you want to delete environment '{name}'? (y/N): ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().to_lowercase().starts_with('y') {
            println!("Deletion cancelled");
            return Ok(());
        }
    }

    let archive = switcher.delete_environment(name)?;
    println!("✓ Environment '{name}' deleted");
    println!("  Archived to {}", archive.display());
    Ok(())
}

fn import_archive(
    switcher: &Switcher,
    archive: &std::path::Path,
    dest: Option<PathBuf>,
) -> Result<(), anyhow::Error> {
    let dest = dest.unwrap_or_else(|| switcher.layout().environments_dir());
    info!("Importing {} into {}", archive.display(), dest.display());
    restore_archive(archive, &dest)?;
    println!("✓ Extracted {} into {}", archive.display(), dest.display());
    Ok(())
}

fn print_problems(skipped: &[String], failed: &[(String, String)]) {
    if !skipped.is_empty() {
        println!("  Skipped: {}", skipped.join(", "));
    }
    for (tool, reason) in failed {
        println!("  ✗ {tool}: {reason}");
    }
}

fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS[unit_index])
    } else {
        format!("{:.1} {}", size, UNITS[unit_index])
    }
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
