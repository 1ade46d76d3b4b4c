//! Deploy side of cloud function packaging: the session client, the REST and
//! gcloud transports, and listing.

pub mod adapters;
pub mod client;
pub mod config;
pub mod deploy;
pub mod error;
pub mod list;

pub use client::DeployClient;
pub use config::{load_app_config, DeployConfig};
pub use deploy::api::{build_and_deploy, deploy, deploy_zip, DeployMode, DeployReport};
pub use deploy::cli::{CommandRunner, GcloudDeployer, ProcessRunner};
pub use error::{DeployError, Result};
pub use list::list_functions;
