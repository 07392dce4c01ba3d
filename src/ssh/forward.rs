// ABOUTME: Relays for server-initiated agent and X11 channels.
// ABOUTME: Tunnels each forwarded channel to the local agent socket or X server.

use super::error::Result;
use super::x11::{X11Display, X11Target};
use parking_lot::Mutex;
use russh::client::Msg;
use russh::{Channel, ChannelMsg};
use std::path::PathBuf;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpStream, UnixStream};

/// Local endpoints that forwarded channels are relayed to.
///
/// Set by a session once the server has accepted the forwarding request and
/// cleared when that session ends.
#[derive(Debug, Default)]
pub(crate) struct ForwardTargets {
    agent: Mutex<Option<PathBuf>>,
    x11: Mutex<Option<X11Display>>,
}

impl ForwardTargets {
    pub(crate) fn set_agent(&self, socket: PathBuf) {
        *self.agent.lock() = Some(socket);
    }

    pub(crate) fn set_x11(&self, display: X11Display) {
        *self.x11.lock() = Some(display);
    }

    pub(crate) fn clear(&self) {
        self.agent.lock().take();
        self.x11.lock().take();
    }

    /// Relay a server-opened agent channel to the local agent.
    pub(crate) fn accept_agent(&self, channel: Channel<Msg>) {
        let Some(socket) = self.agent.lock().clone() else {
            tracing::warn!("Rejecting agent channel: agent forwarding was not requested");
            return;
        };
        tokio::spawn(async move {
            match UnixStream::connect(&socket).await {
                Ok(stream) => {
                    if let Err(e) = relay(channel, stream).await {
                        tracing::debug!("Agent relay error: {}", e);
                    }
                }
                Err(e) => tracing::warn!("Failed to connect to local agent {:?}: {}", socket, e),
            }
        });
    }

    /// Relay a server-opened X11 channel to the local display.
    pub(crate) fn accept_x11(&self, channel: Channel<Msg>) {
        let Some(display) = self.x11.lock().clone() else {
            tracing::warn!("Rejecting X11 channel: X11 forwarding was not requested");
            return;
        };
        tokio::spawn(async move {
            let result = match display.target {
                X11Target::Unix(path) => match UnixStream::connect(&path).await {
                    Ok(stream) => relay(channel, stream).await,
                    Err(e) => Err(e.into()),
                },
                X11Target::Tcp { host, port } => {
                    match TcpStream::connect((host.as_str(), port)).await {
                        Ok(stream) => relay(channel, stream).await,
                        Err(e) => Err(e.into()),
                    }
                }
            };
            if let Err(e) = result {
                tracing::debug!("X11 relay error: {}", e);
            }
        });
    }
}

/// Copy bytes both ways between a channel and a local stream until either side closes.
async fn relay<S>(mut channel: Channel<Msg>, mut local_stream: S) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut stream_closed = false;
    let mut channel_closed = false;
    let mut buf = vec![0u8; 65536];

    loop {
        tokio::select! {
            r = local_stream.read(&mut buf), if !stream_closed => {
                match r {
                    Ok(0) => {
                        stream_closed = true;
                        let _ = channel.eof().await;
                        if channel_closed {
                            break;
                        }
                    }
                    Ok(n) => {
                        if let Err(e) = channel.data(&buf[..n]).await {
                            tracing::debug!("Channel data error: {}", e);
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::debug!("Local stream read error: {}", e);
                        break;
                    }
                }
            }

            msg = channel.wait(), if !channel_closed => {
                match msg {
                    Some(ChannelMsg::Data { ref data }) => {
                        if let Err(e) = local_stream.write_all(data).await {
                            tracing::debug!("Local stream write error: {}", e);
                            break;
                        }
                    }
                    Some(ChannelMsg::Eof) => {
                        channel_closed = true;
                        let _ = local_stream.shutdown().await;
                        if stream_closed {
                            break;
                        }
                    }
                    Some(ChannelMsg::Close) | None => break,
                    Some(_) => {}
                }
            }

            else => break,
        }
    }

    let _ = channel.close().await;
    Ok(())
}
