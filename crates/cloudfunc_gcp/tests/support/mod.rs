#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use cloudfunc_core::{Target, Trigger};
use cloudfunc_gcp::adapters::functions_api::OperationStatus;
use cloudfunc_gcp::adapters::{
    ApiError, CloudFunction, FunctionsApi, ObjectBody, Operation, StagingStore,
};
use cloudfunc_gcp::{CommandRunner, DeployClient, DeployConfig};

pub const PROJECT: &str = "acme";

pub type FakeClient = DeployClient<FakeFunctions, FakeStorage>;

pub fn config() -> DeployConfig {
    DeployConfig::new(PROJECT).with_poll_interval(Duration::from_millis(1))
}

pub fn client(functions: FakeFunctions, storage: FakeStorage) -> FakeClient {
    DeployClient::new(config(), functions, storage).expect("client should build")
}

pub fn http_trigger() -> Trigger {
    Trigger::http(Target::new("example.com/hello", None))
}

pub fn topic_trigger(topic: &str) -> Trigger {
    Trigger::topic(
        Target::new("example.com/orders", Some("Handle".to_string())),
        topic,
    )
}

// ── Functions API fake ─────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub enum FunctionCall {
    Get(String),
    Create {
        location: String,
        function: CloudFunction,
    },
    Update(CloudFunction),
    List(String),
    GetOperation(String),
}

#[derive(Default)]
struct FunctionsState {
    functions: BTreeMap<String, CloudFunction>,
    operations: BTreeMap<String, u32>,
    calls: Vec<FunctionCall>,
}

/// In-memory functions API that records every call.
#[derive(Default)]
pub struct FakeFunctions {
    state: Mutex<FunctionsState>,
    get_error: Option<ApiError>,
    submit_error: Option<ApiError>,
    operation_error: Option<OperationStatus>,
    polls_until_done: u32,
}

impl FakeFunctions {
    pub fn with_function(self, function: CloudFunction) -> Self {
        self.lock().functions.insert(function.name.clone(), function);
        self
    }

    pub fn failing_get(mut self, error: ApiError) -> Self {
        self.get_error = Some(error);
        self
    }

    pub fn failing_submit(mut self, error: ApiError) -> Self {
        self.submit_error = Some(error);
        self
    }

    pub fn failing_operation(mut self, code: i32, message: &str) -> Self {
        self.operation_error = Some(OperationStatus {
            code,
            message: message.to_string(),
        });
        self
    }

    pub fn with_polls(mut self, polls: u32) -> Self {
        self.polls_until_done = polls;
        self
    }

    pub fn calls(&self) -> Vec<FunctionCall> {
        self.lock().calls.clone()
    }

    pub fn stored(&self) -> Vec<CloudFunction> {
        self.lock().functions.values().cloned().collect()
    }

    pub fn creates(&self) -> usize {
        self.count(|call| matches!(call, FunctionCall::Create { .. }))
    }

    pub fn updates(&self) -> usize {
        self.count(|call| matches!(call, FunctionCall::Update(_)))
    }

    pub fn polls(&self) -> usize {
        self.count(|call| matches!(call, FunctionCall::GetOperation(_)))
    }

    fn count(&self, predicate: impl Fn(&FunctionCall) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FunctionsState> {
        self.state.lock().expect("fake functions mutex poisoned")
    }

    fn submit(&self, function: &CloudFunction) -> Result<Operation, ApiError> {
        if let Some(error) = &self.submit_error {
            return Err(error.clone());
        }
        let mut state = self.lock();
        state
            .functions
            .insert(function.name.clone(), function.clone());
        let name = format!("operations/{}", state.operations.len() + 1);
        state
            .operations
            .insert(name.clone(), self.polls_until_done);
        Ok(self.operation(name, self.polls_until_done))
    }

    fn operation(&self, name: String, remaining: u32) -> Operation {
        let done = remaining == 0;
        Operation {
            name,
            done,
            error: if done {
                self.operation_error.clone()
            } else {
                None
            },
        }
    }
}

#[async_trait]
impl FunctionsApi for FakeFunctions {
    async fn get_function(&self, name: &str) -> Result<CloudFunction, ApiError> {
        let mut state = self.lock();
        state.calls.push(FunctionCall::Get(name.to_string()));
        if let Some(error) = &self.get_error {
            return Err(error.clone());
        }
        state
            .functions
            .get(name)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(name.to_string()))
    }

    async fn create_function(
        &self,
        location: &str,
        function: &CloudFunction,
    ) -> Result<Operation, ApiError> {
        self.lock().calls.push(FunctionCall::Create {
            location: location.to_string(),
            function: function.clone(),
        });
        self.submit(function)
    }

    async fn update_function(&self, function: &CloudFunction) -> Result<Operation, ApiError> {
        self.lock()
            .calls
            .push(FunctionCall::Update(function.clone()));
        self.submit(function)
    }

    async fn list_functions(&self, location: &str) -> Result<Vec<CloudFunction>, ApiError> {
        let mut state = self.lock();
        state.calls.push(FunctionCall::List(location.to_string()));
        Ok(state.functions.values().cloned().collect())
    }

    async fn get_operation(&self, name: &str) -> Result<Operation, ApiError> {
        let remaining = {
            let mut state = self.lock();
            state
                .calls
                .push(FunctionCall::GetOperation(name.to_string()));
            let remaining = state
                .operations
                .get_mut(name)
                .ok_or_else(|| ApiError::NotFound(name.to_string()))?;
            *remaining = remaining.saturating_sub(1);
            *remaining
        };
        Ok(self.operation(name.to_string(), remaining))
    }
}

// ── Staging storage fake ───────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageCall {
    GetBucket(String),
    CreateBucket {
        project: String,
        bucket: String,
        storage_class: String,
        location: String,
    },
    Write {
        bucket: String,
        key: String,
        bytes: usize,
    },
    Delete {
        bucket: String,
        key: String,
    },
}

#[derive(Default)]
struct StorageState {
    buckets: BTreeSet<String>,
    objects: BTreeMap<(String, String), Vec<u8>>,
    calls: Vec<StorageCall>,
}

/// In-memory object storage that records every call.
#[derive(Default)]
pub struct FakeStorage {
    state: Mutex<StorageState>,
    write_error: Option<ApiError>,
    delete_error: Option<ApiError>,
    hang_writes: bool,
}

impl FakeStorage {
    pub fn with_bucket(self, bucket: &str) -> Self {
        self.lock().buckets.insert(bucket.to_string());
        self
    }

    pub fn failing_write(mut self, error: ApiError) -> Self {
        self.write_error = Some(error);
        self
    }

    pub fn failing_delete(mut self, error: ApiError) -> Self {
        self.delete_error = Some(error);
        self
    }

    /// Writes never complete; used to exercise cancellation.
    pub fn hanging_writes(mut self) -> Self {
        self.hang_writes = true;
        self
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.lock().calls.clone()
    }

    pub fn objects(&self) -> Vec<(String, String)> {
        self.lock().objects.keys().cloned().collect()
    }

    pub fn bucket_lookups(&self) -> usize {
        self.lock()
            .calls
            .iter()
            .filter(|call| matches!(call, StorageCall::GetBucket(_)))
            .count()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                StorageCall::Delete { key, .. } => Some(key.clone()),
                _ => None,
            })
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, StorageState> {
        self.state.lock().expect("fake storage mutex poisoned")
    }
}

#[async_trait]
impl StagingStore for FakeStorage {
    async fn get_bucket(&self, bucket: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.calls.push(StorageCall::GetBucket(bucket.to_string()));
        if state.buckets.contains(bucket) {
            Ok(())
        } else {
            Err(ApiError::NotFound(bucket.to_string()))
        }
    }

    async fn create_bucket(
        &self,
        project: &str,
        bucket: &str,
        storage_class: &str,
        location: &str,
    ) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.calls.push(StorageCall::CreateBucket {
            project: project.to_string(),
            bucket: bucket.to_string(),
            storage_class: storage_class.to_string(),
            location: location.to_string(),
        });
        state.buckets.insert(bucket.to_string());
        Ok(())
    }

    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        mut body: ObjectBody,
    ) -> Result<(), ApiError> {
        let mut contents = Vec::new();
        body.read_to_end(&mut contents)
            .await
            .map_err(|error| ApiError::Transport(error.to_string()))?;
        {
            let mut state = self.lock();
            state.calls.push(StorageCall::Write {
                bucket: bucket.to_string(),
                key: key.to_string(),
                bytes: contents.len(),
            });
            if let Some(error) = &self.write_error {
                return Err(error.clone());
            }
            state
                .objects
                .insert((bucket.to_string(), key.to_string()), contents);
        }
        if self.hang_writes {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.calls.push(StorageCall::Delete {
            bucket: bucket.to_string(),
            key: key.to_string(),
        });
        if let Some(error) = &self.delete_error {
            return Err(error.clone());
        }
        state.objects.remove(&(bucket.to_string(), key.to_string()));
        Ok(())
    }
}

// ── Command runner fake ────────────────────────────────────────────

/// Records commands; the first whose `program` and first argument match
/// `fail_on` exits with status 1.
#[derive(Default)]
pub struct RecordingRunner {
    commands: Mutex<Vec<Vec<String>>>,
    fail_on: Option<(&'static str, &'static str)>,
}

impl RecordingRunner {
    pub fn failing_on(program: &'static str, subcommand: &'static str) -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            fail_on: Some((program, subcommand)),
        }
    }

    /// Each command as `program` followed by its arguments.
    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().expect("runner mutex poisoned").clone()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, program: &str, args: &[String]) -> io::Result<Option<i32>> {
        let mut command = vec![program.to_string()];
        command.extend(args.iter().cloned());
        self.commands
            .lock()
            .expect("runner mutex poisoned")
            .push(command);

        let failed = self.fail_on.is_some_and(|(fail_program, fail_sub)| {
            program == fail_program && args.first().map(String::as_str) == Some(fail_sub)
        });
        Ok(Some(if failed { 1 } else { 0 }))
    }
}
