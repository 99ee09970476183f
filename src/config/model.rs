// src/config/model.rs

use serde::Deserialize;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// [server]
/// command = "bun"
/// args = ["./src/server.ts"]
///
/// [watch]
/// path = "src"
/// debounce_ms = 500
/// exclude = ["**/*.tmp"]
/// ```
///
/// The `[watch]` section is optional and has reasonable defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    /// The supervised server from `[server]`.
    pub server: ServerSection,

    /// File watching behaviour from `[watch]`.
    #[serde(default)]
    pub watch: WatchSection,
}

/// `[server]` section: the command the supervisor spawns and respawns.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Program to run.
    pub command: String,

    /// Arguments passed to the program.
    #[serde(default)]
    pub args: Vec<String>,

    /// Working directory for the server, relative to the config file.
    ///
    /// If omitted, the server runs in the config file's directory.
    #[serde(default)]
    pub cwd: Option<String>,
}

/// `[watch]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchSection {
    /// Directory to observe, relative to the config file.
    #[serde(default = "default_watch_path")]
    pub path: String,

    /// Quiet period (milliseconds) a burst of events must respect before a
    /// single restart signal is emitted. Must be > 0.
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// Glob patterns (relative to `path`) that count as relevant changes.
    ///
    /// Empty means every path under `path` is relevant.
    #[serde(default)]
    pub include: Vec<String>,

    /// Glob patterns (relative to `path`) whose changes are ignored.
    #[serde(default)]
    pub exclude: Vec<String>,
}

fn default_watch_path() -> String {
    "src".to_string()
}

fn default_debounce_ms() -> u64 {
    500
}

impl Default for WatchSection {
    fn default() -> Self {
        Self {
            path: default_watch_path(),
            debounce_ms: default_debounce_ms(),
            include: Vec::new(),
            exclude: Vec::new(),
        }
    }
}
