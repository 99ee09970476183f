// src/supervisor/intent.rs

/// Exit-code contract between the supervisor and the server it runs.
///
/// The server communicates through its exit status: `1` asks for a restart,
/// `2` asks for a full shutdown. Every other status, including plain `0`
/// and signal-death (no code at all), carries no instruction and is handed
/// to the operator. Decoding happens once at the boundary so the supervision
/// loop never compares raw numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitIntent {
    /// The server asked to be restarted (exit code 1).
    Restart,
    /// The server asked the whole dev loop to stop (exit code 2).
    Shutdown,
    /// Any other exit, with the reported code if there was one.
    Unknown(Option<i32>),
}

impl ExitIntent {
    pub fn from_code(code: Option<i32>) -> Self {
        match code {
            Some(1) => ExitIntent::Restart,
            Some(2) => ExitIntent::Shutdown,
            other => ExitIntent::Unknown(other),
        }
    }
}
