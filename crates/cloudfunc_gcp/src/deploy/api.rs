//! Create-or-update through the functions API with the archive staged in
//! object storage.

use std::path::Path;

use cloudfunc_core::{build_to_temp_file, BuildOptions, Trigger, TriggerDescriptor};
use tokio::fs::File;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::{staging_key, staging_url, ENTRY_POINT, RUNTIME};
use crate::adapters::{CloudFunction, FunctionsApi, ObjectBody, Operation, StagingStore};
use crate::client::{cancellable, DeployClient};
use crate::error::{DeployError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployMode {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployReport {
    pub function: String,
    pub mode: DeployMode,
    pub source_archive_url: String,
}

/// Deploy the archive read from `artifact` as function `name` with `trigger`.
///
/// `artifact` is streamed into the staging object and is not read until the
/// upload starts. A lookup that fails with anything other than "not found"
/// aborts before any mutation. The staging object is removed once the create
/// or update has settled, whatever its outcome.
pub async fn deploy<F, S>(
    client: &DeployClient<F, S>,
    name: &str,
    trigger: &Trigger,
    artifact: impl AsyncRead + Send + Sync + Unpin + 'static,
    cancel: &CancellationToken,
) -> Result<DeployReport>
where
    F: FunctionsApi,
    S: StagingStore,
{
    trigger.validate()?;
    let descriptor = trigger.remote_trigger_descriptor(client.project());
    deploy_archive(client, name, &descriptor, Box::new(artifact), cancel).await
}

/// Deploy an already built archive behind an HTTPS trigger.
pub async fn deploy_zip<F, S>(
    client: &DeployClient<F, S>,
    name: &str,
    path: &Path,
    cancel: &CancellationToken,
) -> Result<DeployReport>
where
    F: FunctionsApi,
    S: StagingStore,
{
    let archive = File::open(path).await?;
    deploy_archive(
        client,
        name,
        &TriggerDescriptor::Https,
        Box::new(archive),
        cancel,
    )
    .await
}

/// Build with the local Go toolchain, then [`deploy`].
pub async fn build_and_deploy<F, S>(
    client: &DeployClient<F, S>,
    name: &str,
    trigger: &Trigger,
    options: &BuildOptions,
    cancel: &CancellationToken,
) -> Result<DeployReport>
where
    F: FunctionsApi,
    S: StagingStore,
{
    trigger.validate()?;
    let build_trigger = trigger.clone();
    let build_options = options.clone();
    let archive =
        tokio::task::spawn_blocking(move || build_to_temp_file(&build_trigger, &build_options));
    let archive = cancellable(cancel, archive)
        .await?
        .map_err(std::io::Error::other)??;
    let artifact = File::from_std(archive.reopen()?);
    deploy(client, name, trigger, artifact, cancel).await
}

async fn deploy_archive<F, S>(
    client: &DeployClient<F, S>,
    name: &str,
    descriptor: &TriggerDescriptor,
    archive: ObjectBody,
    cancel: &CancellationToken,
) -> Result<DeployReport>
where
    F: FunctionsApi,
    S: StagingStore,
{
    if name.trim().is_empty() {
        return Err(DeployError::config("function name not specified"));
    }
    let id = client.function_id(name);

    let lookup = cancellable(cancel, client.functions().get_function(&id)).await?;
    let (mut function, mode) = match lookup {
        Ok(existing) => (existing, DeployMode::Updated),
        Err(error) if error.is_not_found() => (
            CloudFunction::seed(id.as_str(), ENTRY_POINT, RUNTIME),
            DeployMode::Created,
        ),
        Err(source) => return Err(DeployError::Lookup { name: id, source }),
    };
    function.entry_point = ENTRY_POINT.to_string();
    function.apply_trigger(descriptor);

    let bucket = client.staging_bucket(cancel).await?;
    let key = staging_key(name);
    let upload = client.storage().write_object(&bucket, &key, archive);
    match cancellable(cancel, upload).await {
        Ok(Ok(())) => {}
        Ok(Err(source)) => {
            return Err(DeployError::Storage {
                context: format!("upload {}", staging_url(&bucket, &key)),
                source,
            })
        }
        Err(cancelled) => {
            remove_staging_object(client.storage(), &bucket, &key).await;
            return Err(cancelled);
        }
    }
    info!(bucket = %bucket, key = %key, "artifact_uploaded");

    let source_archive_url = staging_url(&bucket, &key);
    function.set_source_archive(source_archive_url.clone());

    let outcome = submit(client, &function, mode, cancel).await;
    remove_staging_object(client.storage(), &bucket, &key).await;
    outcome?;

    Ok(DeployReport {
        function: id,
        mode,
        source_archive_url,
    })
}

async fn submit<F, S>(
    client: &DeployClient<F, S>,
    function: &CloudFunction,
    mode: DeployMode,
    cancel: &CancellationToken,
) -> Result<()>
where
    F: FunctionsApi,
    S: StagingStore,
{
    let operation = match mode {
        DeployMode::Created => {
            let location = client.location();
            cancellable(cancel, client.functions().create_function(&location, function))
                .await?
                .map_err(|source| DeployError::Rpc {
                    context: format!("create function {}", function.name),
                    source,
                })?
        }
        DeployMode::Updated => cancellable(cancel, client.functions().update_function(function))
            .await?
            .map_err(|source| DeployError::Rpc {
                context: format!("update function {}", function.name),
                source,
            })?,
    };
    wait_operation(client, operation, cancel).await
}

async fn wait_operation<F, S>(
    client: &DeployClient<F, S>,
    mut operation: Operation,
    cancel: &CancellationToken,
) -> Result<()>
where
    F: FunctionsApi,
    S: StagingStore,
{
    let mut polls = 0u32;
    while !operation.done {
        cancellable(cancel, tokio::time::sleep(client.config().poll_interval)).await?;
        let name = operation.name.clone();
        operation = cancellable(cancel, client.functions().get_operation(&name))
            .await?
            .map_err(|source| DeployError::Rpc {
                context: format!("poll operation {name}"),
                source,
            })?;
        polls += 1;
    }

    if let Some(status) = operation.error {
        return Err(DeployError::Operation {
            name: operation.name,
            code: status.code,
            message: status.message,
        });
    }
    info!(operation = %operation.name, polls, "operation_completed");
    Ok(())
}

/// Best effort: a failure is logged and never replaces the deploy result.
async fn remove_staging_object(storage: &impl StagingStore, bucket: &str, key: &str) {
    if let Err(error) = storage.delete_object(bucket, key).await {
        warn!(bucket, key, error = %error, "staging_cleanup_failed");
    }
}
