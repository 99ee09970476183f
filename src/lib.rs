// src/lib.rs

pub mod broadcast;
pub mod cli;
pub mod config;
pub mod logging;
pub mod supervisor;
pub mod watch;

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Result;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::broadcast::Broadcast;
use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::supervisor::{CommandSpawner, Signal, StdinPrompt, Supervisor};
use crate::watch::{WatchFilter, WatchOptions};

/// Delay between attempts to (re)establish the filesystem watch.
const WATCH_RETRY_DELAY: Duration = Duration::from_secs(1);

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the restart/shutdown broadcast channel
/// - (optional) file watcher with its debounce + retry loop
/// - Ctrl-C handling
/// - the server process supervisor
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let root_dir = config_root_dir(&config_path);
    let signals: Broadcast<Signal> = Broadcast::new();

    // Optional file watcher (disabled in --no-watch mode).
    let _watch_task = if !args.no_watch {
        Some(spawn_watch_loop(&cfg, &root_dir, signals.clone())?)
    } else {
        info!("file watching disabled (--no-watch)");
        None
    };

    // Ctrl-C → graceful shutdown of the supervised server.
    {
        let signals = signals.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                eprintln!("failed to listen for Ctrl+C: {e}");
                return;
            }
            signals.send(&Signal::Shutdown);
        });
    }

    let server_cwd = match &cfg.server.cwd {
        Some(dir) => root_dir.join(dir),
        None => root_dir.clone(),
    };
    let spawner = CommandSpawner::new(cfg.server.command.clone(), cfg.server.args.clone())
        .current_dir(server_cwd);

    // The first spawn happens immediately; restarts then follow file changes
    // and the server's own exit codes.
    let supervisor = Supervisor::new(spawner, StdinPrompt::new(), signals);
    supervisor.run().await
}

/// Start the watch loop: file changes, debounced, become restart signals.
///
/// Watch failures (missing directory, permission denied, watch limit) must
/// not kill the dev loop: every failure is logged and the watch is retried
/// indefinitely after a short delay.
fn spawn_watch_loop(
    cfg: &ConfigFile,
    root_dir: &Path,
    signals: Broadcast<Signal>,
) -> Result<JoinHandle<()>> {
    let filter = WatchFilter::from_patterns(&cfg.watch.include, &cfg.watch.exclude)?;
    let options = WatchOptions {
        root: root_dir.join(&cfg.watch.path),
        debounce: Duration::from_millis(cfg.watch.debounce_ms),
        filter,
    };

    let handle = tokio::spawn(async move {
        loop {
            let change_signals = signals.clone();
            let result = watch::spawn_watcher(
                options.clone(),
                move || {
                    info!("file change detected; requesting restart");
                    change_signals.send(&Signal::Restart);
                },
                |err| error!(error = %err, "file watch error"),
            );

            match result {
                Ok(mut watcher) => {
                    watcher.closed().await;
                    warn!("file watcher stopped; restarting it");
                }
                Err(err) => error!(error = %err, "failed to start file watcher"),
            }

            tokio::time::sleep(WATCH_RETRY_DELAY).await;
        }
    });

    Ok(handle)
}

/// Figure out a sensible project root for watching and for the server's
/// working directory. Currently: directory containing the config file, or
/// `.`.
fn config_root_dir(config_path: &Path) -> PathBuf {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Simple dry-run output: print the effective server and watch settings.
fn print_dry_run(cfg: &ConfigFile) {
    println!("devloop dry-run");
    println!("  server.command = {}", cfg.server.command);
    if !cfg.server.args.is_empty() {
        println!("  server.args = {:?}", cfg.server.args);
    }
    if let Some(ref cwd) = cfg.server.cwd {
        println!("  server.cwd = {cwd}");
    }
    println!();
    println!("  watch.path = {}", cfg.watch.path);
    println!("  watch.debounce_ms = {}", cfg.watch.debounce_ms);
    if !cfg.watch.include.is_empty() {
        println!("  watch.include = {:?}", cfg.watch.include);
    }
    if !cfg.watch.exclude.is_empty() {
        println!("  watch.exclude = {:?}", cfg.watch.exclude);
    }

    debug!("dry-run complete (no execution)");
}
