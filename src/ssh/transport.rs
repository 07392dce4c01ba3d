// ABOUTME: Capability traits between the command runner and the SSH transport.
// ABOUTME: Defines Transport, ExecSession, SessionIo and the pty request parameters.

use super::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

/// Something that can open command-execution sessions over an established connection.
#[async_trait]
pub trait Transport: Send + Sync {
    type Session: ExecSession;

    /// Open a fresh execution session.
    async fn create_session(&self) -> Result<Self::Session>;
}

/// A single command-execution session.
///
/// Feature requests must be made before [`ExecSession::execute`]; a session
/// executes at most one command.
#[async_trait]
pub trait ExecSession: Send {
    /// Ask the remote side to allocate a pseudo-terminal.
    async fn request_pty(&mut self, request: &PtyRequest) -> Result<()>;

    /// Relay the local authentication agent to the remote side.
    async fn attach_agent_forwarding(&mut self) -> Result<()>;

    /// Tunnel the remote display back to the local X server.
    async fn attach_x11_forwarding(&mut self) -> Result<()>;

    /// Run `command` and block until it completes.
    ///
    /// Input chunks are written to the remote command until the input
    /// receiver closes, which signals end-of-file. Output and error bytes are
    /// pushed into their senders in the order the remote side produced them.
    async fn execute(&mut self, command: &str, io: SessionIo) -> Result<()>;
}

/// Channel endpoints wiring a session's standard streams to local pipelines.
#[derive(Debug)]
pub struct SessionIo {
    pub input: mpsc::Receiver<Bytes>,
    pub output: mpsc::Sender<Bytes>,
    pub error: mpsc::Sender<Bytes>,
}

/// Parameters for a pseudo-terminal request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtyRequest {
    pub term: String,
    pub columns: u32,
    pub rows: u32,
}

impl PtyRequest {
    pub const DEFAULT_TERM: &'static str = "xterm";

    /// Build a request matching a local terminal of the given size.
    ///
    /// The terminal type comes from `TERM`, falling back to `xterm`.
    pub fn for_size(columns: u16, rows: u16) -> Self {
        let term = std::env::var("TERM")
            .ok()
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| Self::DEFAULT_TERM.to_string());
        Self {
            term,
            columns: u32::from(columns),
            rows: u32::from(rows),
        }
    }
}
