use std::io;

use cloudfunc_core::BuildError;
use thiserror::Error;

use crate::adapters::ApiError;

/// Failures of a deploy or list call.
#[derive(Debug, Error)]
pub enum DeployError {
    /// Missing or invalid parameter. Nothing remote has been touched.
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Build(#[from] BuildError),

    /// Fetching the function failed for a reason other than "not found".
    #[error("cannot fetch function {name}: {source}")]
    Lookup { name: String, source: ApiError },

    #[error("staging storage error: {context}: {source}")]
    Storage { context: String, source: ApiError },

    #[error("{context}: {source}")]
    Rpc { context: String, source: ApiError },

    /// The long-running operation finished with an error.
    #[error("operation {name} failed (code {code}): {message}")]
    Operation {
        name: String,
        code: i32,
        message: String,
    },

    #[error("deploy cancelled")]
    Cancelled,

    #[error("command `{command}` failed: {status}")]
    Command { command: String, status: String },

    #[error("invalid app config: {0}")]
    AppConfig(#[from] serde_yaml_ng::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl DeployError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;
