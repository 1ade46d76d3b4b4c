use std::io;

use thiserror::Error;

/// Failures raised while turning a trigger into a deployable archive.
#[derive(Debug, Error)]
pub enum BuildError {
    /// A required parameter is missing or malformed. Raised before any work.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("cannot build binary: {message}\n{diagnostic}")]
    Toolchain { message: String, diagnostic: String },

    /// The compiled binary crashed or exited unexpectedly on startup.
    #[error("smoke test failed: {message}\n{output}")]
    SmokeTest { message: String, output: String },

    #[error("template asset not found: {0}")]
    Template(String),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BuildError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

pub type Result<T> = std::result::Result<T, BuildError>;
