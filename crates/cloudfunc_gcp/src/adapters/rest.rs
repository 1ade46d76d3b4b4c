//! HTTP implementations of [`FunctionsApi`] and [`StagingStore`] against the
//! Cloud Functions v1 and Cloud Storage JSON APIs.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Body, Client, RequestBuilder, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::functions_api::{CloudFunction, FunctionsApi, Operation};
use super::object_store::{ObjectBody, StagingStore};
use super::token::TokenProvider;
use super::ApiError;

pub const FUNCTIONS_ENDPOINT: &str = "https://cloudfunctions.googleapis.com/v1";
pub const STORAGE_ENDPOINT: &str = "https://storage.googleapis.com/storage/v1";
pub const UPLOAD_ENDPOINT: &str = "https://storage.googleapis.com/upload/storage/v1";

/// Fields an update is allowed to change.
const UPDATE_MASK: &str = "entryPoint,sourceArchiveUrl,httpsTrigger,eventTrigger";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub functions: String,
    pub storage: String,
    pub upload: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            functions: FUNCTIONS_ENDPOINT.to_string(),
            storage: STORAGE_ENDPOINT.to_string(),
            upload: UPLOAD_ENDPOINT.to_string(),
        }
    }
}

/// One authenticated HTTP client serving both APIs.
#[derive(Clone)]
pub struct GcpRestClient {
    http: Client,
    token: Arc<dyn TokenProvider>,
    endpoints: Endpoints,
}

impl GcpRestClient {
    pub fn new(token: Arc<dyn TokenProvider>) -> Result<Self, ApiError> {
        Self::with_endpoints(token, Endpoints::default())
    }

    pub fn with_endpoints(
        token: Arc<dyn TokenProvider>,
        endpoints: Endpoints,
    ) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|error| ApiError::Transport(error.to_string()))?;
        Ok(Self {
            http,
            token,
            endpoints,
        })
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, ApiError> {
        let token = self.token.access_token().await?;
        let response = request
            .bearer_auth(token)
            .send()
            .await
            .map_err(|error| ApiError::Transport(error.to_string()))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body);
        if status == StatusCode::NOT_FOUND {
            Err(ApiError::NotFound(message))
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                message,
            })
        }
    }

    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ApiError> {
        self.send(request)
            .await?
            .json::<T>()
            .await
            .map_err(|error| ApiError::Transport(format!("invalid response body: {error}")))
    }
}

#[async_trait]
impl FunctionsApi for GcpRestClient {
    async fn get_function(&self, name: &str) -> Result<CloudFunction, ApiError> {
        let url = endpoint_url(&self.endpoints.functions, name.split('/'))?;
        self.send_json(self.http.get(url)).await
    }

    async fn create_function(
        &self,
        location: &str,
        function: &CloudFunction,
    ) -> Result<Operation, ApiError> {
        let url = endpoint_url(
            &self.endpoints.functions,
            location.split('/').chain(["functions"]),
        )?;
        debug!(location, function = %function.name, "create_function");
        self.send_json(self.http.post(url).json(function)).await
    }

    async fn update_function(&self, function: &CloudFunction) -> Result<Operation, ApiError> {
        let mut url = endpoint_url(&self.endpoints.functions, function.name.split('/'))?;
        url.query_pairs_mut().append_pair("updateMask", UPDATE_MASK);
        debug!(function = %function.name, "update_function");
        self.send_json(self.http.patch(url).json(function)).await
    }

    async fn list_functions(&self, location: &str) -> Result<Vec<CloudFunction>, ApiError> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Page {
            #[serde(default)]
            functions: Vec<CloudFunction>,
            #[serde(default)]
            next_page_token: Option<String>,
        }

        let mut functions = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut url = endpoint_url(
                &self.endpoints.functions,
                location.split('/').chain(["functions"]),
            )?;
            if let Some(token) = &page_token {
                url.query_pairs_mut().append_pair("pageToken", token);
            }
            let page: Page = self.send_json(self.http.get(url)).await?;
            functions.extend(page.functions);
            match page.next_page_token.filter(|token| !token.is_empty()) {
                Some(token) => page_token = Some(token),
                None => return Ok(functions),
            }
        }
    }

    async fn get_operation(&self, name: &str) -> Result<Operation, ApiError> {
        let url = endpoint_url(&self.endpoints.functions, name.split('/'))?;
        self.send_json(self.http.get(url)).await
    }
}

#[async_trait]
impl StagingStore for GcpRestClient {
    async fn get_bucket(&self, bucket: &str) -> Result<(), ApiError> {
        let url = endpoint_url(&self.endpoints.storage, ["b", bucket])?;
        self.send(self.http.get(url)).await.map(|_| ())
    }

    async fn create_bucket(
        &self,
        project: &str,
        bucket: &str,
        storage_class: &str,
        location: &str,
    ) -> Result<(), ApiError> {
        let mut url = endpoint_url(&self.endpoints.storage, ["b"])?;
        url.query_pairs_mut().append_pair("project", project);
        let body = json!({
            "name": bucket,
            "storageClass": storage_class,
            "location": location,
        });
        self.send(self.http.post(url).json(&body)).await.map(|_| ())
    }

    async fn write_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
    ) -> Result<(), ApiError> {
        let mut url = endpoint_url(&self.endpoints.upload, ["b", bucket, "o"])?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);
        let request = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "application/zip")
            .body(Body::wrap_stream(ReaderStream::new(body)));
        self.send(request).await.map(|_| ())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), ApiError> {
        let url = endpoint_url(&self.endpoints.storage, ["b", bucket, "o", key])?;
        self.send(self.http.delete(url)).await.map(|_| ())
    }
}

/// `base` with each segment appended and percent-encoded on its own, so an
/// object key containing `/` stays a single segment.
fn endpoint_url<'a>(
    base: &str,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, ApiError> {
    let mut url = Url::parse(base)
        .map_err(|error| ApiError::Transport(format!("invalid endpoint {base}: {error}")))?;
    url.path_segments_mut()
        .map_err(|_| ApiError::Transport(format!("endpoint {base} cannot take a path")))?
        .pop_if_empty()
        .extend(segments.into_iter().filter(|segment| !segment.is_empty()));
    Ok(url)
}

/// The `error.message` of a Google API error body, or the raw body.
fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }

    #[derive(Deserialize)]
    struct Detail {
        #[serde(default)]
        message: String,
    }

    serde_json::from_str::<Envelope>(body)
        .ok()
        .map(|envelope| envelope.error.message)
        .filter(|message| !message.is_empty())
        .unwrap_or_else(|| body.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_names_become_path_segments() {
        let url = endpoint_url(
            FUNCTIONS_ENDPOINT,
            "projects/p/locations/us-central1/functions/hello".split('/'),
        )
        .expect("url");
        assert_eq!(
            url.as_str(),
            "https://cloudfunctions.googleapis.com/v1/projects/p/locations/us-central1/functions/hello"
        );
    }

    #[test]
    fn object_keys_are_encoded_as_one_segment() {
        let url = endpoint_url(STORAGE_ENDPOINT, ["b", "p-staging", "o", "dir/hello-1.zip"])
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://storage.googleapis.com/storage/v1/b/p-staging/o/dir%2Fhello-1.zip"
        );
    }

    #[test]
    fn extracts_google_error_message() {
        let body = r#"{"error":{"code":404,"message":"Function hello not found","status":"NOT_FOUND"}}"#;
        assert_eq!(error_message(body), "Function hello not found");
        assert_eq!(error_message(" upstream timeout \n"), "upstream timeout");
    }
}
