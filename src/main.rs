// ABOUTME: Entry point for the rexec CLI application.
// ABOUTME: Parses arguments, connects, and runs one remote command.

mod cli;

use clap::Parser;
use cli::Cli;
use rexec::config::ServerConfig;
use rexec::error::{Error, Result};
use rexec::exec::Connection;
use rexec::output::Output;
use rexec::ssh::Client;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(cli.output_mode());
    output.start_timer();

    let code = match run(cli, &output).await {
        Ok(()) => 0,
        Err(e) => {
            if !matches!(e, Error::Ssh(rexec::ssh::Error::ExitStatus(_))) {
                output.error(&e.to_string());
            }
            e.exit_code()
        }
    };
    output.finished(code);
    std::process::exit(code);
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let server = ServerConfig::parse(&cli.destination).map_err(Error::InvalidDestination)?;

    let mut config = server.session_config().trust_on_first_use(cli.accept_new_host);
    if let Some(port) = cli.port {
        config = config.port(port);
    }
    if let Some(user) = &cli.user {
        config.user = user.clone();
    }
    if let Some(key) = &cli.identity {
        config = config.key_path(key);
    }
    if let Some(known_hosts) = &cli.known_hosts {
        config = config.known_hosts_path(known_hosts);
    }

    let client = Client::connect(config).await?;

    let mut connection = Connection::new(client);
    connection.options(cli.exec_options());
    let result = connection.run(&cli.command_line()).await;

    for warning in connection.diagnostics().warnings() {
        output.warning(&warning.message);
    }

    // Disconnect (non-fatal if it fails)
    if let Err(e) = connection.into_transport().disconnect().await {
        tracing::warn!("SSH disconnect failed: {}", e);
    }

    result.map_err(Error::from)
}
