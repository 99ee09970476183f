// src/supervisor/prompt.rs

use std::future::Future;
use std::io::Write;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Operator confirmation seam used after an unexpected server exit.
pub trait OperatorPrompt: Send {
    /// Ask whether the server should be restarted. `Ok(true)` means restart.
    fn confirm_restart(&mut self) -> impl Future<Output = Result<bool>> + Send;
}

/// Production prompt: prints `Restart? (y/n)` and reads one line from the
/// terminal. Only a trimmed `"y"` restarts; anything else, including EOF,
/// declines.
#[derive(Debug, Default)]
pub struct StdinPrompt;

impl StdinPrompt {
    pub fn new() -> Self {
        Self
    }
}

impl OperatorPrompt for StdinPrompt {
    fn confirm_restart(&mut self) -> impl Future<Output = Result<bool>> + Send {
        async move {
            {
                let mut out = std::io::stdout();
                out.write_all(b"Restart? (y/n) ")
                    .context("writing operator prompt")?;
                out.flush().context("flushing operator prompt")?;
            }

            let mut line = String::new();
            let mut reader = BufReader::new(tokio::io::stdin());
            let read = reader
                .read_line(&mut line)
                .await
                .context("reading operator answer")?;

            Ok(read > 0 && line.trim() == "y")
        }
    }
}
