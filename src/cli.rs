// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Destination, remote command, and the session feature flags.

use clap::Parser;
use rexec::exec::ExecOptions;
use rexec::output::OutputMode;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "rexec")]
#[command(about = "Run a command on a remote host over SSH")]
#[command(version)]
pub struct Cli {
    /// Remote host as [user@]host[:port]
    pub destination: String,

    /// Command to run on the remote host
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,

    /// Allocate a pseudo-terminal on the remote host
    #[arg(short = 't', long)]
    pub tty: bool,

    /// Forward the local SSH agent
    #[arg(short = 'A', long)]
    pub forward_agent: bool,

    /// Forward X11 display traffic
    #[arg(short = 'X', long)]
    pub forward_x11: bool,

    /// Port to connect to (overrides the destination's port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// User to log in as (overrides the destination's user)
    #[arg(short = 'l', long = "login")]
    pub user: Option<String>,

    /// Private key file
    #[arg(short = 'i', long)]
    pub identity: Option<PathBuf>,

    /// known_hosts file to verify the host key against
    #[arg(long)]
    pub known_hosts: Option<PathBuf>,

    /// Accept and remember an unknown host key
    #[arg(long)]
    pub accept_new_host: bool,

    /// Debug logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Only report errors
    #[arg(short, long, conflicts_with = "json")]
    pub quiet: bool,

    /// Report status as JSON lines on stderr
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    pub fn exec_options(&self) -> ExecOptions {
        ExecOptions {
            tty: self.tty,
            forward_agent: self.forward_agent,
            forward_x11: self.forward_x11,
        }
    }

    pub fn output_mode(&self) -> OutputMode {
        if self.json {
            OutputMode::Json
        } else if self.quiet {
            OutputMode::Quiet
        } else {
            OutputMode::Normal
        }
    }

    /// The remote command line, words joined by spaces as ssh(1) does.
    pub fn command_line(&self) -> String {
        self.command.join(" ")
    }
}
