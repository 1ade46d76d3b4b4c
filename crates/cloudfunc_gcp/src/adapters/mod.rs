//! Seams to the hosting platform: the functions API, staging object storage
//! and credentials. `rest` holds the HTTP implementations.

pub mod functions_api;
pub mod object_store;
pub mod rest;
pub mod token;

use thiserror::Error;

pub use functions_api::{CloudFunction, EventTrigger, FunctionsApi, HttpsTrigger, Operation};
pub use object_store::{ObjectBody, StagingStore};
pub use token::TokenProvider;

/// Failure of a remote call. `NotFound` is distinguished so callers can route
/// on it without inspecting messages.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("credentials error: {0}")]
    Credentials(String),
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
