//! Error type for cloud capability calls.

use thiserror::Error;

/// Errors that can occur while talking to an external capability.
#[derive(Debug, Error)]
pub enum CloudError {
    #[error("backend command {command:?} exited with status {status}: {stderr}")]
    Command {
        command: String,
        status: i32,
        stderr: String,
    },

    #[error("no command template configured for {0}")]
    NotConfigured(&'static str),

    #[error("failed to parse backend output: {0}")]
    Parse(String),

    #[error("capability unavailable: {0}")]
    Unavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
