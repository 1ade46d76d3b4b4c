use tokio_util::sync::CancellationToken;

use crate::adapters::{CloudFunction, FunctionsApi};
use crate::client::cancellable;
use crate::error::{DeployError, Result};

pub fn list_location(project: &str) -> String {
    format!("projects/{project}/locations/-")
}

/// All functions deployed in `project`, across regions.
pub async fn list_functions(
    functions: &impl FunctionsApi,
    project: &str,
    cancel: &CancellationToken,
) -> Result<Vec<CloudFunction>> {
    if project.trim().is_empty() {
        return Err(DeployError::config("project not specified"));
    }
    let location = list_location(project);
    cancellable(cancel, functions.list_functions(&location))
        .await?
        .map_err(|source| DeployError::Rpc {
            context: format!("list functions in {location}"),
            source,
        })
}

/// `name`'s last segment, the status and the trigger, tab separated.
pub fn summary_line(function: &CloudFunction) -> String {
    let short = function.name.rsplit('/').next().unwrap_or(&function.name);
    let status = function
        .extra
        .get("status")
        .and_then(|value| value.as_str())
        .unwrap_or("UNKNOWN");
    let trigger = match (&function.https_trigger, &function.event_trigger) {
        (Some(https), _) => https.url.clone().unwrap_or_else(|| "https".to_string()),
        (None, Some(event)) => format!("{} {}", event.event_type, event.resource),
        (None, None) => "-".to_string(),
    };
    format!("{short}\t{status}\t{trigger}")
}
