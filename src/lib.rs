// ABOUTME: Library root for rexec - run one remote command over SSH.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod error;
pub mod exec;
pub mod output;
pub mod ssh;
pub mod terminal;
