// src/supervisor/mod.rs

//! Server process supervision.
//!
//! [`Supervisor`] owns the lifecycle of exactly one server child process at a
//! time: it spawns the server, waits for its exit or for a broadcast
//! [`Signal`], and decides whether to respawn, prompt the operator, or
//! terminate.
//!
//! - [`intent`] decodes the exit-code contract with the server.
//! - [`process`] defines the spawn/wait/kill seam and its tokio-backed
//!   implementation.
//! - [`prompt`] defines the operator confirmation seam.

pub mod intent;
pub mod process;
pub mod prompt;

pub use intent::ExitIntent;
pub use process::{ChildHandle, CommandSpawner, ServerHandle, ServerSpawner};
pub use prompt::{OperatorPrompt, StdinPrompt};

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::broadcast::Broadcast;

/// Control signals understood by the supervisor, broadcast by the file
/// watcher (restart) and the Ctrl-C handler (shutdown).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Restart,
    Shutdown,
}

/// What ended the current wait on a running server.
enum WaitEvent {
    Exited(Option<i32>),
    RestartSignal,
    ShutdownSignal,
}

/// Supervises one server child process at a time.
///
/// All state (the broadcast channel, the spawner, the prompt) lives on the
/// instance, so independent supervisors can coexist and be driven by fakes
/// in tests.
pub struct Supervisor<S, P>
where
    S: ServerSpawner,
    P: OperatorPrompt,
{
    spawner: S,
    prompt: P,
    signals: Broadcast<Signal>,
}

impl<S, P> Supervisor<S, P>
where
    S: ServerSpawner,
    P: OperatorPrompt,
{
    pub fn new(spawner: S, prompt: P, signals: Broadcast<Signal>) -> Self {
        Self {
            spawner,
            prompt,
            signals,
        }
    }

    /// Run the supervision loop until the server requests shutdown, the
    /// operator declines a restart, or a shutdown signal arrives.
    ///
    /// Spawn failures are fatal and propagate; they are not retried here.
    ///
    /// Invariant: at most one child is live at any time. Every path that
    /// leaves an iteration first observes the current child's exit, so a new
    /// spawn never races a still-running previous child.
    pub async fn run(mut self) -> Result<()> {
        loop {
            let mut server = self.spawner.spawn()?;

            // The signal waiters are dropped (and unsubscribed) as soon as
            // the select completes. In particular no restart waiter exists
            // while the operator prompt below is outstanding, so signals
            // arriving during the prompt are dropped rather than queued.
            let event = tokio::select! {
                code = server.wait() => WaitEvent::Exited(code?),
                _ = self.signals.wait(Signal::Restart) => WaitEvent::RestartSignal,
                _ = self.signals.wait(Signal::Shutdown) => WaitEvent::ShutdownSignal,
            };

            let intent = match event {
                WaitEvent::Exited(code) => ExitIntent::from_code(code),
                WaitEvent::RestartSignal => {
                    info!("restart requested; stopping current server");
                    server.kill();
                    // The restart was requested externally, so the observed
                    // exit counts as a restart no matter what code the killed
                    // process reports.
                    let code = server.wait().await?;
                    debug!(?code, "killed server exited");
                    ExitIntent::Restart
                }
                WaitEvent::ShutdownSignal => {
                    info!("shutdown requested; stopping current server");
                    server.kill();
                    let code = server.wait().await?;
                    debug!(?code, "killed server exited");
                    return Ok(());
                }
            };

            match intent {
                ExitIntent::Restart => {
                    info!("server requested restart");
                }
                ExitIntent::Shutdown => {
                    info!("server requested shutdown");
                    return Ok(());
                }
                ExitIntent::Unknown(code) => {
                    warn!(?code, "server exited unexpectedly");
                    if !self.prompt.confirm_restart().await? {
                        info!("operator declined restart; exiting");
                        return Ok(());
                    }
                }
            }
        }
    }
}
