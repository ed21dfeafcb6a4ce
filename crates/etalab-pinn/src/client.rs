//! REST client for the PINN benchmark server.

use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

use crate::error::{Error, Result};
use crate::logs::LogStream;
use crate::model::{
    BenchmarkConfig, DocId, Documentation, MeshKind, MeshUploaded, Metrics, RunDetails,
    RunSummary, ServiceInfo, StatusMessage, TrainingStarted,
};

/// Default request timeout. Training start can take a while to spawn.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Path of the log stream WebSocket, relative to the base URL.
const LOGS_PATH: &str = "ws/logs";

/// Extension the server accepts for mesh uploads.
const MESH_EXTENSION: &str = ".msh";

/// Client for the benchmark server's REST API.
#[derive(Debug, Clone)]
pub struct DashboardClient {
    http: Client,
    base_url: Url,
}

impl DashboardClient {
    /// Create a client for the server at `base_url` with the default timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    /// Create a client with an explicit request timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the HTTP client cannot be built.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(Error::InvalidUrl(format!(
                "unsupported scheme {}",
                base_url.scheme()
            )));
        }
        // Url::join replaces the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    /// The normalised base URL.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// WebSocket URL of the log stream (`ws://` or `wss://`).
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be derived from the base URL.
    pub fn logs_url(&self) -> Result<Url> {
        let mut url = self.endpoint(LOGS_PATH)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::InvalidUrl(format!("cannot use {scheme} for {url}")))?;
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        debug!(%url, "GET");
        let response = self.http.get(url).send().await?;
        Ok(check(response).await?.json().await?)
    }

    async fn post_json<B, T>(&self, path: &str, body: Option<&B>) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let mut request = self.http.post(url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        Ok(check(response).await?.json().await?)
    }

    /// Fetch the service banner from `GET /`.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn service_info(&self) -> Result<ServiceInfo> {
        self.get_json("").await
    }

    /// Fetch the current benchmark configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn config(&self) -> Result<BenchmarkConfig> {
        self.get_json("config").await
    }

    /// Save the benchmark configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects the config.
    pub async fn save_config(&self, config: &BenchmarkConfig) -> Result<StatusMessage> {
        let status: StatusMessage = self.post_json("config", Some(config)).await?;
        info!(problem = %config.problem, "Saved benchmark configuration");
        Ok(status)
    }

    /// Fetch the metrics of the latest run.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn metrics(&self) -> Result<Metrics> {
        self.get_json("metrics").await
    }

    /// List mesh files available on the server.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn meshes(&self) -> Result<Vec<String>> {
        self.get_json("meshes").await
    }

    /// Ask the server to generate one of its built-in meshes.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn generate_mesh(&self, kind: MeshKind) -> Result<StatusMessage> {
        let body = serde_json::json!({ "type": kind });
        let status = self.post_json("mesh/generate", Some(&body)).await?;
        info!(%kind, "Requested mesh generation");
        Ok(status)
    }

    /// Upload a `.msh` file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is not a `.msh` file, cannot be read, or
    /// the upload fails.
    pub async fn upload_mesh(&self, path: &Path) -> Result<MeshUploaded> {
        let filename = mesh_file_name(path)?;
        let data = tokio::fs::read(path).await?;
        let size = data.len();

        let part = Part::bytes(data)
            .file_name(filename.clone())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);

        let response = self
            .http
            .post(self.endpoint("mesh/upload")?)
            .multipart(form)
            .send()
            .await?;
        let uploaded: MeshUploaded = check(response).await?.json().await?;
        info!(filename = %filename, bytes = size, "Uploaded mesh");
        Ok(uploaded)
    }

    /// List finished runs, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn runs(&self) -> Result<Vec<RunSummary>> {
        let mut runs: Vec<RunSummary> = self.get_json("runs").await?;
        runs.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(runs)
    }

    /// Fetch the details of one run.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid, the run does not exist, or the
    /// request fails.
    pub async fn run(&self, run_id: &str) -> Result<RunDetails> {
        validate_run_id(run_id)?;
        self.get_json(&format!("runs/{run_id}")).await
    }

    /// Delete a run and its artefacts.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is invalid, the run does not exist, or the
    /// request fails.
    pub async fn delete_run(&self, run_id: &str) -> Result<StatusMessage> {
        validate_run_id(run_id)?;
        let url = self.endpoint(&format!("runs/{run_id}"))?;
        let response = self.http.delete(url).send().await?;
        let status: StatusMessage = check(response).await?.json().await?;
        info!(run_id, "Deleted run");
        Ok(status)
    }

    /// Start a training process with the saved configuration.
    ///
    /// The server answers `200` with `status: "error"` when a run is already
    /// in progress; callers should check [`TrainingStarted::is_started`].
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn start_training(&self) -> Result<TrainingStarted> {
        self.post_json::<(), _>("train", None).await
    }

    /// Stop the running training process.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn stop_training(&self) -> Result<StatusMessage> {
        self.post_json::<(), _>("stop", None).await
    }

    /// Fetch one of the project documents.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is missing or the request fails.
    pub async fn documentation(&self, doc: DocId) -> Result<Documentation> {
        self.get_json(&format!("docs/{doc}")).await
    }

    /// Open the training log WebSocket.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub async fn stream_logs(&self) -> Result<LogStream> {
        LogStream::connect(&self.logs_url()?).await
    }
}

/// Turn a non-success response into [`Error::Api`], preferring the `detail`
/// field of a JSON error body.
async fn check(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let (status, detail) = api_failure(response).await;
    Err(Error::Api { status, detail })
}

/// Status code and message of a failed response.
///
/// The message is the `detail` field of a JSON body when there is one,
/// otherwise the raw body, otherwise the status reason phrase.
pub async fn api_failure(response: Response) -> (u16, String) {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| v.get("detail").and_then(|d| d.as_str()).map(str::to_string))
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.canonical_reason().unwrap_or("unknown error").to_string()
            } else {
                body
            }
        });
    (status.as_u16(), detail)
}

fn run_id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_.\-]+$").expect("run id pattern is valid"))
}

/// Reject run ids that would escape the `runs/` path segment.
///
/// # Errors
///
/// Returns [`Error::InvalidRunId`] for empty ids, ids with characters other
/// than `[A-Za-z0-9_.-]`, or ids starting with `.` (`runs/.` resolves to the
/// run list itself).
pub fn validate_run_id(run_id: &str) -> Result<()> {
    if run_id.starts_with('.') || run_id.contains("..") || !run_id_pattern().is_match(run_id) {
        return Err(Error::InvalidRunId(run_id.to_string()));
    }
    Ok(())
}

fn mesh_file_name(path: &Path) -> Result<String> {
    let invalid = |reason: &str| Error::InvalidMesh {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| invalid("file name is not valid UTF-8"))?;
    if !name.ends_with(MESH_EXTENSION) {
        return Err(invalid("only .msh files are allowed"));
    }
    Ok(name.to_string())
}
