// ABOUTME: Remote execution session over a single russh session channel.
// ABOUTME: Negotiates pty, agent and X11 requests and drives the exec channel to completion.

use super::error::{Error, Result};
use super::forward::ForwardTargets;
use super::transport::{ExecSession, PtyRequest, SessionIo};
use super::x11::{self, X11Display};
use async_trait::async_trait;
use bytes::Bytes;
use russh::client::Msg;
use russh::{Channel, ChannelMsg, Pty, Sig};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

const PTY_MODES: &[(Pty, u32)] = &[
    (Pty::ECHO, 1),
    (Pty::TTY_OP_ISPEED, 14400),
    (Pty::TTY_OP_OSPEED, 14400),
];

/// How the remote command ended.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RemoteExit {
    Status(u32),
    Signal { signal: String, message: String },
}

/// Tracks a running command's channel until it is complete.
///
/// Complete means both an exit report and EOF have arrived, the channel has
/// closed, or the server refused the `exec` request.
#[derive(Debug, Default)]
struct Completion {
    exit: Option<RemoteExit>,
    eof: bool,
    rejected: bool,
}

impl Completion {
    /// Record a control message. Returns true once the command is complete.
    fn observe(&mut self, msg: &ChannelMsg) -> bool {
        match msg {
            ChannelMsg::ExitStatus { exit_status } => {
                self.exit = Some(RemoteExit::Status(*exit_status));
            }
            ChannelMsg::ExitSignal {
                signal_name,
                error_message,
                ..
            } => {
                self.exit = Some(RemoteExit::Signal {
                    signal: signal_name_of(signal_name).to_string(),
                    message: error_message.clone(),
                });
            }
            ChannelMsg::Eof => self.eof = true,
            // The only request outstanding once exec is sent is exec itself.
            ChannelMsg::Failure if self.exit.is_none() => {
                self.rejected = true;
                return true;
            }
            ChannelMsg::Close => return true,
            _ => {}
        }
        self.exit.is_some() && self.eof
    }

    /// The command's result once the channel is done with.
    fn into_result(self) -> Result<()> {
        if self.rejected {
            return Err(Error::ExecRejected("exec request denied".to_string()));
        }
        match self.exit {
            Some(RemoteExit::Status(0)) => Ok(()),
            Some(RemoteExit::Status(code)) => Err(Error::ExitStatus(code)),
            Some(RemoteExit::Signal { signal, message }) => {
                Err(Error::ExitSignal { signal, message })
            }
            // Closed without an exit report: connection loss or abnormal termination.
            None => Err(Error::ChannelClosed),
        }
    }
}

/// The SSH name of a signal, without the `SIG` prefix.
fn signal_name_of(sig: &Sig) -> &str {
    match sig {
        Sig::ABRT => "ABRT",
        Sig::ALRM => "ALRM",
        Sig::FPE => "FPE",
        Sig::HUP => "HUP",
        Sig::ILL => "ILL",
        Sig::INT => "INT",
        Sig::KILL => "KILL",
        Sig::PIPE => "PIPE",
        Sig::QUIT => "QUIT",
        Sig::SEGV => "SEGV",
        Sig::TERM => "TERM",
        Sig::USR1 => "USR1",
        Sig::Custom(name) => name.as_str(),
    }
}

/// Interpret a message received while a want-reply request is outstanding.
///
/// `None` means the message is unrelated and the reply is still pending.
fn reply_to(msg: Option<&ChannelMsg>, fail: fn(String) -> Error) -> Option<Result<bool>> {
    match msg {
        Some(ChannelMsg::Success) => Some(Ok(true)),
        Some(ChannelMsg::Failure) => Some(Ok(false)),
        Some(ChannelMsg::Close) | Some(ChannelMsg::Eof) | None => Some(Err(fail(
            "channel closed before the server replied".to_string(),
        ))),
        Some(_) => None,
    }
}

/// Aborts the input writer when execution ends, however it ends.
struct InputWriter(JoinHandle<()>);

impl Drop for InputWriter {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Write input chunks to the channel, then send EOF when the input ends.
///
/// Runs apart from the read loop so a write waiting for window space never
/// stops the channel's messages from being read.
async fn write_input<W>(mut input: mpsc::Receiver<Bytes>, mut writer: W)
where
    W: AsyncWrite + Unpin,
{
    while let Some(chunk) = input.recv().await {
        if let Err(e) = writer.write_all(&chunk).await {
            tracing::debug!("Failed to send input: {}", e);
            return;
        }
    }
    if let Err(e) = writer.shutdown().await {
        tracing::debug!("Failed to send EOF: {}", e);
    }
}

/// One `session` channel, used for a single command.
pub struct RemoteSession {
    channel: Channel<Msg>,
    forwarding: Arc<ForwardTargets>,
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("channel", &self.channel.id())
            .finish()
    }
}

impl RemoteSession {
    pub(crate) fn new(channel: Channel<Msg>, forwarding: Arc<ForwardTargets>) -> Self {
        Self {
            channel,
            forwarding,
        }
    }

    /// Wait for the server's reply to a request sent with want-reply.
    ///
    /// Returns whether the request was accepted. A channel that goes away
    /// first is reported through `fail`, the waiting request's error kind.
    async fn await_reply(&mut self, fail: fn(String) -> Error) -> Result<bool> {
        loop {
            let msg = self.channel.wait().await;
            match reply_to(msg.as_ref(), fail) {
                Some(reply) => return reply,
                None => tracing::trace!("Ignoring {:?} while awaiting reply", msg),
            }
        }
    }
}

impl Drop for RemoteSession {
    fn drop(&mut self) {
        self.forwarding.clear();
    }
}

#[async_trait]
impl ExecSession for RemoteSession {
    async fn request_pty(&mut self, request: &PtyRequest) -> Result<()> {
        self.channel
            .request_pty(
                true,
                &request.term,
                request.columns,
                request.rows,
                0,
                0,
                PTY_MODES,
            )
            .await
            .map_err(|e| Error::PtyRequest(e.to_string()))?;

        if !self.await_reply(Error::PtyRequest).await? {
            return Err(Error::PtyRequest("server refused pty allocation".to_string()));
        }
        Ok(())
    }

    async fn attach_agent_forwarding(&mut self) -> Result<()> {
        let socket = std::env::var_os("SSH_AUTH_SOCK")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| Error::AgentForward("SSH_AUTH_SOCK is not set".to_string()))?;

        self.channel
            .agent_forward(true)
            .await
            .map_err(|e| Error::AgentForward(e.to_string()))?;

        if !self.await_reply(Error::AgentForward).await? {
            return Err(Error::AgentForward(
                "server refused agent forwarding".to_string(),
            ));
        }
        self.forwarding.set_agent(socket);
        Ok(())
    }

    async fn attach_x11_forwarding(&mut self) -> Result<()> {
        let display = std::env::var("DISPLAY")
            .ok()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| Error::X11Forward("DISPLAY is not set".to_string()))?;
        let parsed = X11Display::parse(&display)?;
        let cookie = x11::lookup_cookie(&display).await?;

        self.channel
            .request_x11(true, false, &cookie.protocol, &cookie.hex, parsed.screen)
            .await
            .map_err(|e| Error::X11Forward(e.to_string()))?;

        if !self.await_reply(Error::X11Forward).await? {
            return Err(Error::X11Forward("server refused X11 forwarding".to_string()));
        }
        self.forwarding.set_x11(parsed);
        Ok(())
    }

    async fn execute(&mut self, command: &str, io: SessionIo) -> Result<()> {
        let SessionIo {
            input,
            output,
            error,
        } = io;

        self.channel
            .exec(true, command)
            .await
            .map_err(|e| Error::ExecRejected(e.to_string()))?;

        let _input = InputWriter(tokio::spawn(write_input(
            input,
            self.channel.make_writer(),
        )));

        let mut completion = Completion::default();
        loop {
            match self.channel.wait().await {
                Some(ChannelMsg::Data { ref data }) => forward(&output, data).await,
                Some(ChannelMsg::ExtendedData { ref data, ext }) => {
                    if ext == 1 {
                        forward(&error, data).await;
                    }
                }
                Some(msg) => {
                    if completion.observe(&msg) {
                        break;
                    }
                }
                None => break,
            }
        }

        completion.into_result()
    }
}

/// Hand a chunk to an output pipeline. A pipeline that has stopped draining
/// only loses its own bytes.
async fn forward(sink: &mpsc::Sender<Bytes>, data: &[u8]) {
    if sink.send(Bytes::copy_from_slice(data)).await.is_err() {
        tracing::trace!("Output pipeline closed, discarding {} bytes", data.len());
    }
}
