// src/supervisor/process.rs

use std::future::Future;
use std::path::PathBuf;
use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::{Child, Command};
use tracing::{debug, info};

/// A running server process owned by the supervisor.
pub trait ServerHandle: Send {
    /// Wait for the process to exit and return its exit code (`None` when it
    /// was terminated by a signal).
    fn wait(&mut self) -> impl Future<Output = Result<Option<i32>>> + Send;

    /// Request termination. Must tolerate the process having already exited;
    /// the race between an external kill and a natural exit is expected.
    fn kill(&mut self);
}

/// Spawns server processes for the supervisor.
pub trait ServerSpawner: Send {
    type Handle: ServerHandle;

    fn spawn(&mut self) -> Result<Self::Handle>;
}

/// Production spawner: runs `program args..` via `tokio::process::Command`
/// with inherited stdout/stderr so the server's logs reach the operator's
/// terminal, and a null stdin so the supervisor keeps the terminal's input
/// for its own prompt.
#[derive(Debug, Clone)]
pub struct CommandSpawner {
    program: String,
    args: Vec<String>,
    cwd: Option<PathBuf>,
}

impl CommandSpawner {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            cwd: None,
        }
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }
}

impl ServerSpawner for CommandSpawner {
    type Handle = ChildHandle;

    fn spawn(&mut self) -> Result<ChildHandle> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true);

        if let Some(dir) = &self.cwd {
            cmd.current_dir(dir);
        }

        let child = cmd
            .spawn()
            .with_context(|| format!("spawning server process '{}'", self.program))?;

        info!(pid = ?child.id(), program = %self.program, "server process started");

        Ok(ChildHandle { child })
    }
}

/// Handle to a spawned server process.
pub struct ChildHandle {
    child: Child,
}

impl ServerHandle for ChildHandle {
    fn wait(&mut self) -> impl Future<Output = Result<Option<i32>>> + Send {
        async move {
            let status = self
                .child
                .wait()
                .await
                .context("waiting for server process")?;
            debug!(?status, "server process exited");
            Ok(status.code())
        }
    }

    fn kill(&mut self) {
        // Already-exited is a normal race here, not an error.
        let _ = self.child.start_kill();
    }
}
