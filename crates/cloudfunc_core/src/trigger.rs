//! Invocation triggers: the closed set of ways a deployed function is called.
//!
//! Every variant answers the same four questions:
//!
//! - **`generate_entry_source`**: the `impl.go` that binds the user package into
//!   the shim skeleton.
//! - **`build_tags`**: which shim handler files the compiler must include.
//! - **`remote_trigger_descriptor`**: how the hosting platform routes events.
//! - **`cli_deploy_flags`**: the same routing, expressed as deploy-tool flags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{BuildError, Result};
use crate::target::Target;

pub const PUBSUB_PUBLISH_EVENT: &str = "providers/cloud.pubsub/eventTypes/topic.publish";
pub const STORAGE_CHANGE_EVENT: &str = "providers/cloud.storage/eventTypes/object.change";
pub const STORAGE_EVENT_PREFIX: &str = "google.storage.object.";

/// How the hosting platform routes invocations to the function.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerDescriptor {
    Https,
    /// Event delivery of `event_type` occurring on `resource`.
    Event { event_type: String, resource: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpTrigger {
    pub target: Target,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopicTrigger {
    pub target: Target,
    pub topic_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageTrigger {
    pub target: Target,
    pub bucket_name: String,
    /// Optional event-type filter. `None` means the bucket-wide change trigger.
    #[serde(default)]
    pub event: Option<StorageEvent>,
}

/// Object lifecycle events a storage trigger may be narrowed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageEvent {
    Finalize,
    Delete,
    Archive,
    MetadataUpdate,
}

impl StorageEvent {
    fn suffix(self) -> &'static str {
        match self {
            Self::Finalize => "finalize",
            Self::Delete => "delete",
            Self::Archive => "archive",
            Self::MetadataUpdate => "metadataUpdate",
        }
    }

    /// Fully qualified event type, e.g. `google.storage.object.finalize`.
    pub fn event_type(self) -> String {
        format!("{STORAGE_EVENT_PREFIX}{}", self.suffix())
    }
}

impl fmt::Display for StorageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.event_type())
    }
}

impl FromStr for StorageEvent {
    type Err = BuildError;

    /// Accepts both the short (`finalize`) and prefixed form.
    fn from_str(value: &str) -> Result<Self> {
        let short = value.strip_prefix(STORAGE_EVENT_PREFIX).unwrap_or(value);
        match short {
            "finalize" => Ok(Self::Finalize),
            "delete" => Ok(Self::Delete),
            "archive" => Ok(Self::Archive),
            "metadataUpdate" => Ok(Self::MetadataUpdate),
            other => Err(BuildError::config(format!("unknown storage event '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    Http(HttpTrigger),
    Topic(TopicTrigger),
    Storage(StorageTrigger),
}

impl Trigger {
    pub fn http(target: Target) -> Self {
        Self::Http(HttpTrigger { target })
    }

    pub fn topic(target: Target, topic_id: impl Into<String>) -> Self {
        Self::Topic(TopicTrigger {
            target,
            topic_id: topic_id.into(),
        })
    }

    pub fn storage(target: Target, bucket_name: impl Into<String>) -> Self {
        Self::Storage(StorageTrigger {
            target,
            bucket_name: bucket_name.into(),
            event: None,
        })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::Topic(_) => "pubsub",
            Self::Storage(_) => "storage",
        }
    }

    pub fn target(&self) -> &Target {
        match self {
            Self::Http(t) => &t.target,
            Self::Topic(t) => &t.target,
            Self::Storage(t) => &t.target,
        }
    }

    /// Reject triggers that cannot be built or deployed. Called before any
    /// side effect.
    pub fn validate(&self) -> Result<()> {
        if self.target().package.trim().is_empty() {
            return Err(BuildError::config("package not specified"));
        }
        if let Some(symbol) = self.target().symbol() {
            if !is_exported_identifier(symbol) {
                return Err(BuildError::config(format!(
                    "handler '{symbol}' is not an exported Go identifier"
                )));
            }
        }
        match self {
            Self::Http(_) => Ok(()),
            Self::Topic(t) => {
                if t.topic_id.trim().is_empty() {
                    return Err(BuildError::config("topic not specified"));
                }
                require_symbol(&t.target, "pubsub")
            }
            Self::Storage(t) => {
                if t.bucket_name.trim().is_empty() {
                    return Err(BuildError::config("bucket not specified"));
                }
                require_symbol(&t.target, "storage")
            }
        }
    }

    pub fn generate_entry_source(&self) -> String {
        let target = self.target();
        let register = match self {
            Self::Http(_) => "HandleHTTP",
            Self::Topic(_) => "HandlePubSub",
            Self::Storage(_) => "HandleStorage",
        };
        match target.symbol() {
            None => format!(
                "package main\n\nimport _ {}\n",
                quote_go_string(&target.package)
            ),
            Some(symbol) => format!(
                "package main\n\nimport p {}\n\nfunc init() {{\n\t{register}(p.{symbol})\n}}\n",
                quote_go_string(&target.package)
            ),
        }
    }

    pub fn build_tags(&self) -> Vec<String> {
        match self {
            Self::Http(_) => Vec::new(),
            Self::Topic(_) => vec!["pubsub".to_string()],
            Self::Storage(_) => vec!["storage".to_string()],
        }
    }

    pub fn remote_trigger_descriptor(&self, project: &str) -> TriggerDescriptor {
        match self {
            Self::Http(_) => TriggerDescriptor::Https,
            Self::Topic(t) => TriggerDescriptor::Event {
                event_type: PUBSUB_PUBLISH_EVENT.to_string(),
                resource: format!("projects/{project}/topics/{}", t.topic_id),
            },
            Self::Storage(t) => match t.event {
                None => TriggerDescriptor::Event {
                    event_type: STORAGE_CHANGE_EVENT.to_string(),
                    resource: format!("projects/{project}/buckets/{}", t.bucket_name),
                },
                Some(event) => TriggerDescriptor::Event {
                    event_type: event.event_type(),
                    resource: format!("projects/_/buckets/{}", t.bucket_name),
                },
            },
        }
    }

    pub fn cli_deploy_flags(&self) -> Vec<String> {
        match self {
            Self::Http(_) => vec!["--trigger-http".to_string()],
            Self::Topic(t) => vec!["--trigger-topic".to_string(), t.topic_id.clone()],
            Self::Storage(t) => match t.event {
                None => vec!["--trigger-bucket".to_string(), t.bucket_name.clone()],
                Some(event) => vec![
                    "--trigger-resource".to_string(),
                    t.bucket_name.clone(),
                    "--trigger-event".to_string(),
                    event.event_type(),
                ],
            },
        }
    }
}

fn require_symbol(target: &Target, kind: &str) -> Result<()> {
    if target.symbol().is_none() {
        return Err(BuildError::config(format!(
            "{kind} trigger needs a handler symbol (e.g. {}.Handler)",
            target.package
        )));
    }
    Ok(())
}

fn is_exported_identifier(symbol: &str) -> bool {
    let mut chars = symbol.chars();
    chars.next().is_some_and(char::is_uppercase)
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Go interpreted string literal. JSON escaping is a subset Go accepts.
fn quote_go_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}
