// ABOUTME: Application-wide error types for rexec.
// ABOUTME: Uses thiserror for ergonomic error handling and maps errors to process exit codes.

use thiserror::Error;

/// Exit code for failures on the local side, matching ssh(1).
pub const LOCAL_FAILURE_EXIT_CODE: i32 = 255;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid destination: {0}")]
    InvalidDestination(String),

    #[error(transparent)]
    Ssh(#[from] crate::ssh::Error),
}

impl Error {
    /// Process exit code to report for this error.
    ///
    /// A remote non-zero exit status is passed through; anything else is a
    /// local or transport failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Ssh(crate::ssh::Error::ExitStatus(code)) => {
                i32::try_from(*code).map_or(LOCAL_FAILURE_EXIT_CODE, |c| c.min(LOCAL_FAILURE_EXIT_CODE))
            }
            _ => LOCAL_FAILURE_EXIT_CODE,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
