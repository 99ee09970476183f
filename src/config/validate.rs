// src/config/validate.rs

use anyhow::{anyhow, Context, Result};

use crate::config::model::ConfigFile;
use crate::watch::WatchFilter;

/// Run basic semantic validation against a loaded configuration.
///
/// This checks:
/// - `[server].command` is non-empty
/// - `[watch].path` is non-empty
/// - `[watch].debounce_ms >= 1`
/// - `[watch].include` / `[watch].exclude` glob patterns compile
pub fn validate_config(cfg: &ConfigFile) -> Result<()> {
    validate_server(cfg)?;
    validate_watch(cfg)?;
    Ok(())
}

fn validate_server(cfg: &ConfigFile) -> Result<()> {
    if cfg.server.command.trim().is_empty() {
        return Err(anyhow!("[server].command must not be empty"));
    }
    Ok(())
}

fn validate_watch(cfg: &ConfigFile) -> Result<()> {
    if cfg.watch.path.trim().is_empty() {
        return Err(anyhow!("[watch].path must not be empty"));
    }

    if cfg.watch.debounce_ms == 0 {
        return Err(anyhow!("[watch].debounce_ms must be >= 1 (got 0)"));
    }

    // Compile the glob sets once up front so bad patterns fail at startup
    // rather than on the first file change.
    WatchFilter::from_patterns(&cfg.watch.include, &cfg.watch.exclude)
        .context("invalid [watch] glob patterns")?;

    Ok(())
}
