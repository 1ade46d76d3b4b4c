use async_trait::async_trait;
use cloudfunc_core::TriggerDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ApiError;

/// Source locations other than `sourceArchiveUrl`. The API accepts only one.
const OTHER_SOURCE_FIELDS: &[&str] = &["sourceUploadUrl", "sourceRepository"];

/// Remote function resource. Fields this tool does not manage are kept in
/// `extra` so an update writes them back untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudFunction {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub entry_point: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_archive_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub https_trigger: Option<HttpsTrigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_trigger: Option<EventTrigger>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HttpsTrigger {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventTrigger {
    pub event_type: String,
    pub resource: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CloudFunction {
    /// Minimal resource for the create path.
    pub fn seed(name: impl Into<String>, entry_point: &str, runtime: &str) -> Self {
        Self {
            name: name.into(),
            entry_point: entry_point.to_string(),
            runtime: Some(runtime.to_string()),
            ..Self::default()
        }
    }

    pub fn set_source_archive(&mut self, url: impl Into<String>) {
        for field in OTHER_SOURCE_FIELDS {
            self.extra.remove(*field);
        }
        self.source_archive_url = Some(url.into());
    }

    /// Replace whatever trigger the resource had with `descriptor`.
    pub fn apply_trigger(&mut self, descriptor: &TriggerDescriptor) {
        match descriptor {
            TriggerDescriptor::Https => {
                if self.https_trigger.is_none() {
                    self.https_trigger = Some(HttpsTrigger::default());
                }
                self.event_trigger = None;
            }
            TriggerDescriptor::Event {
                event_type,
                resource,
            } => {
                self.https_trigger = None;
                self.event_trigger = Some(EventTrigger {
                    event_type: event_type.clone(),
                    resource: resource.clone(),
                    extra: Map::new(),
                });
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub name: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<OperationStatus>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OperationStatus {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

#[async_trait]
pub trait FunctionsApi: Send + Sync {
    async fn get_function(&self, name: &str) -> Result<CloudFunction, ApiError>;

    async fn create_function(
        &self,
        location: &str,
        function: &CloudFunction,
    ) -> Result<Operation, ApiError>;

    async fn update_function(&self, function: &CloudFunction) -> Result<Operation, ApiError>;

    async fn list_functions(&self, location: &str) -> Result<Vec<CloudFunction>, ApiError>;

    async fn get_operation(&self, name: &str) -> Result<Operation, ApiError>;
}
