// ABOUTME: SSH-specific error types.
// ABOUTME: Covers connection, authentication, session negotiation and remote command failures.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("authentication failed: no valid credentials")]
    AuthenticationFailed,

    #[error("SSH agent not available: {0}")]
    AgentUnavailable(String),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("failed to create session: {0}")]
    SessionCreation(String),

    #[error("pseudo-terminal request failed: {0}")]
    PtyRequest(String),

    #[error("agent forwarding failed: {0}")]
    AgentForward(String),

    #[error("X11 forwarding failed: {0}")]
    X11Forward(String),

    #[error("server refused to execute command: {0}")]
    ExecRejected(String),

    #[error("remote command exited with status {0}")]
    ExitStatus(u32),

    #[error("remote command killed by signal {signal}{}", fmt_signal_message(.message))]
    ExitSignal { signal: String, message: String },

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the remote command was started before this error occurred.
    ///
    /// Errors raised while connecting, creating the session, negotiating
    /// session features or starting the command mean the command never ran.
    pub fn command_started(&self) -> bool {
        matches!(
            self,
            Error::ExitStatus(_)
                | Error::ExitSignal { .. }
                | Error::ChannelClosed
        )
    }
}

fn fmt_signal_message(message: &str) -> String {
    if message.is_empty() {
        String::new()
    } else {
        format!(": {message}")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
