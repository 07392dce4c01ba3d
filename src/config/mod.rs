// ABOUTME: Connection configuration for rexec.
// ABOUTME: Destination parsing; per-connection SSH settings live in ssh::SessionConfig.

mod server;

pub use server::ServerConfig;
