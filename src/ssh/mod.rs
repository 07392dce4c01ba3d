// ABOUTME: SSH transport for remote command execution.
// ABOUTME: Connection, authentication, execution sessions and forwarding relays.

mod client;
mod error;
mod forward;
mod session;
mod transport;
mod x11;

pub use client::{Client, SessionConfig};
pub use error::{Error, Result};
pub use session::RemoteSession;
pub use transport::{ExecSession, PtyRequest, SessionIo, Transport};
