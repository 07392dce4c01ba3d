// ABOUTME: Remote command execution over an established connection.
// ABOUTME: Session lifecycle, feature negotiation, stdio wiring and raw mode for a single command.

mod lease;
mod negotiate;
mod stdio;

pub use negotiate::{ExecOptions, FailurePolicy, Feature, Outcome, negotiate};
pub use stdio::{BoxedReader, BoxedWriter};

use crate::diagnostics::{Diagnostics, Warning};
use crate::ssh::{ExecSession, PtyRequest, Result, Transport};
use crate::terminal::{CrosstermTerminal, RawModeGuard, Terminal};
use lease::SessionLease;
use stdio::Streams;
use std::io;
use tokio::io::{AsyncRead, AsyncWrite};

/// A transport plus the settings for the commands run on it.
///
/// Runs one command at a time: [`Connection::run`] takes `&mut self`, so a
/// second command cannot start until the first has returned.
pub struct Connection<T: Transport, R: Terminal = CrosstermTerminal> {
    transport: T,
    terminal: R,
    session: Option<T::Session>,
    streams: Streams,
    options: ExecOptions,
    diagnostics: Diagnostics,
}

impl<T: Transport> Connection<T> {
    /// Wrap a transport, using the process's real terminal.
    pub fn new(transport: T) -> Self {
        Self::with_terminal(transport, CrosstermTerminal)
    }
}

impl<T: Transport, R: Terminal> Connection<T, R> {
    pub fn with_terminal(transport: T, terminal: R) -> Self {
        Self {
            transport,
            terminal,
            session: None,
            streams: Streams::default(),
            options: ExecOptions::default(),
            diagnostics: Diagnostics::default(),
        }
    }

    /// Feed the next command's input from `reader` instead of the process's stdin.
    ///
    /// Stream overrides are consumed by the next [`Connection::run`], whether
    /// or not it gets as far as executing the command.
    pub fn stdin(&mut self, reader: impl AsyncRead + Send + Unpin + 'static) -> &mut Self {
        self.streams.stdin = Some(Box::new(reader));
        self
    }

    /// Send the next command's output to `writer` instead of the process's stdout.
    ///
    /// The writer is shut down once the remote output ends.
    pub fn stdout(&mut self, writer: impl AsyncWrite + Send + Unpin + 'static) -> &mut Self {
        self.streams.stdout = Some(Box::new(writer));
        self
    }

    /// Send the next command's error output to `writer` instead of the process's stderr.
    pub fn stderr(&mut self, writer: impl AsyncWrite + Send + Unpin + 'static) -> &mut Self {
        self.streams.stderr = Some(Box::new(writer));
        self
    }

    pub fn options(&mut self, options: ExecOptions) -> &mut Self {
        self.options = options;
        self
    }

    pub fn tty(&mut self, tty: bool) -> &mut Self {
        self.options.tty = tty;
        self
    }

    pub fn forward_agent(&mut self, forward: bool) -> &mut Self {
        self.options.forward_agent = forward;
        self
    }

    pub fn forward_x11(&mut self, forward: bool) -> &mut Self {
        self.options.forward_x11 = forward;
        self
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Whether a session is parked for the next command.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Warnings collected by the most recent command.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    /// Open the session the next command will use, if none is open yet.
    pub async fn open_session(&mut self) -> Result<&mut T::Session> {
        lease::ensure_session(&mut self.session, &self.transport).await
    }

    /// Run `command` on the remote host and wait for it to finish.
    ///
    /// Fails before execution on session creation or pty allocation failure;
    /// otherwise the result is the remote command's outcome. Agent and X11
    /// forwarding failures, raw mode failures and output copy failures are
    /// recorded in [`Connection::diagnostics`] instead.
    pub async fn run(&mut self, command: &str) -> Result<()> {
        self.diagnostics = Diagnostics::default();
        // Overrides belong to this run even if it fails before execution.
        let streams = std::mem::take(&mut self.streams);

        let mut lease = SessionLease::acquire(&mut self.session, &self.transport).await?;

        let (columns, rows) = self.terminal.size();
        let pty = PtyRequest::for_size(columns, rows);
        negotiate(lease.session(), &self.options, &pty, &mut self.diagnostics).await?;

        let local_stdin = streams.stdin.is_none();
        let (session_io, pipelines) = stdio::wire(streams);

        let _raw_mode = if local_stdin {
            match RawModeGuard::enter(&mut self.terminal) {
                Ok(guard) => Some(guard),
                Err(e) if e.kind() == io::ErrorKind::Unsupported => {
                    tracing::debug!("Not entering raw mode: {}", e);
                    None
                }
                Err(e) => {
                    self.diagnostics
                        .warn(Warning::raw_mode(format!("failed to enter raw mode: {e}")));
                    None
                }
            }
        } else {
            None
        };

        tracing::debug!("Executing {:?}", command);
        let result = lease.session().execute(command, session_io).await;

        pipelines.finish(&mut self.diagnostics).await;
        result
    }
}
