// ABOUTME: Local X11 display resolution for X11 forwarding.
// ABOUTME: Parses DISPLAY and looks up the display's authentication cookie with xauth.

use super::error::{Error, Result};
use std::path::PathBuf;
use tokio::process::Command;

const X11_UNIX_DIR: &str = "/tmp/.X11-unix";
const X11_TCP_BASE_PORT: u16 = 6000;

/// Where the local X server listens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum X11Target {
    Unix(PathBuf),
    Tcp { host: String, port: u16 },
}

/// A parsed `DISPLAY` value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct X11Display {
    pub target: X11Target,
    pub screen: u32,
}

impl X11Display {
    /// Parse `[host]:display[.screen]`.
    ///
    /// An empty host or `unix` selects the local Unix socket; any other
    /// host is reached over TCP on port 6000 + display.
    pub(crate) fn parse(display: &str) -> Result<Self> {
        let invalid = || Error::X11Forward(format!("invalid DISPLAY value: {display:?}"));

        let colon = display.rfind(':').ok_or_else(invalid)?;
        let host = &display[..colon];
        let rest = &display[colon + 1..];

        let (number, screen) = match rest.split_once('.') {
            Some((number, screen)) => (number, screen.parse::<u32>().map_err(|_| invalid())?),
            None => (rest, 0),
        };
        let number = number.parse::<u16>().map_err(|_| invalid())?;

        let target = if host.is_empty() || host == "unix" {
            X11Target::Unix(PathBuf::from(format!("{X11_UNIX_DIR}/X{number}")))
        } else {
            let port = X11_TCP_BASE_PORT
                .checked_add(number)
                .ok_or_else(invalid)?;
            X11Target::Tcp {
                host: host.to_string(),
                port,
            }
        };

        Ok(Self { target, screen })
    }
}

/// Authentication data for an X11 display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct XauthCookie {
    pub protocol: String,
    pub hex: String,
}

/// Ask `xauth` for the cookie of `display`.
pub(crate) async fn lookup_cookie(display: &str) -> Result<XauthCookie> {
    let output = Command::new("xauth")
        .arg("list")
        .arg(display)
        .output()
        .await
        .map_err(|e| Error::X11Forward(format!("failed to run xauth: {e}")))?;

    if !output.status.success() {
        return Err(Error::X11Forward(format!(
            "xauth exited with {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    parse_xauth_list(&String::from_utf8_lossy(&output.stdout))
        .ok_or_else(|| Error::X11Forward(format!("no xauth cookie for display {display}")))
}

/// Pick the first MIT-MAGIC-COOKIE-1 entry from `xauth list` output.
pub(crate) fn parse_xauth_list(output: &str) -> Option<XauthCookie> {
    output.lines().find_map(|line| {
        let mut fields = line.split_whitespace();
        let _display = fields.next()?;
        let protocol = fields.next()?;
        let hex = fields.next()?;
        (protocol == "MIT-MAGIC-COOKIE-1").then(|| XauthCookie {
            protocol: protocol.to_string(),
            hex: hex.to_string(),
        })
    })
}
