//! Remote conversion through the CloudConvert v2 job API.
//!
//! One conversion is one job with three tasks:
//!
//! 1. `import/upload`: the response carries a signed form the input is posted to
//! 2. `convert`: source and target format tags
//! 3. `export/url`: a temporary download URL for the result
//!
//! The job is polled with exponential backoff until it finishes, fails or
//! the configured timeout elapses.

use crate::config::ConverterConfig;
use crate::error::{FileShiftError, StrategyError};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::path::Path;
use tokio::time::{sleep, Duration, Instant};
use tracing::{debug, info};

const IMPORT_TASK: &str = "import-file";
const CONVERT_TASK: &str = "convert-file";
const EXPORT_TASK: &str = "export-file";

/// A remote conversion service.
///
/// Implemented by [`CloudConvertClient`]; tests and embedders can supply
/// their own implementation through
/// [`crate::dispatch::Dispatcher::with_remote`].
#[async_trait]
pub trait RemoteConverter: Send + Sync {
    /// Whether a credential is present. Unconfigured services are skipped
    /// by the dispatcher without counting as a failed attempt.
    fn is_configured(&self) -> bool;

    /// Convert the file at `input` from `source_tag` to `target_tag`
    /// (lower-case extensions such as `docx`, `pdf`, `png`).
    async fn convert(
        &self,
        input: &Path,
        source_tag: &str,
        target_tag: &str,
    ) -> Result<Vec<u8>, StrategyError>;
}

/// HTTP client for the CloudConvert v2 API.
pub struct CloudConvertClient {
    http: reqwest::Client,
    api_key: Option<String>,
    base_url: String,
    poll_interval: Duration,
    timeout: Duration,
}

impl std::fmt::Debug for CloudConvertClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudConvertClient")
            .field("configured", &self.api_key.is_some())
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl CloudConvertClient {
    pub fn from_config(config: &ConverterConfig) -> Result<Self, FileShiftError> {
        let timeout = Duration::from_secs(config.remote_timeout_secs.max(1));
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FileShiftError::Internal(format!("HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_key: config
                .remote_api_key
                .clone()
                .filter(|_| config.remote_configured()),
            base_url: config.remote_base_url.trim_end_matches('/').to_string(),
            poll_interval: Duration::from_millis(config.remote_poll_interval_ms.max(10)),
            timeout,
        })
    }

    fn api_key(&self) -> Result<&str, StrategyError> {
        self.api_key.as_deref().ok_or(StrategyError::RemoteUnavailable)
    }

    async fn create_job(&self, source_tag: &str, target_tag: &str) -> Result<Value, StrategyError> {
        let url = format!("{}/v2/jobs", self.base_url);
        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.api_key()?)
            .json(&job_request(source_tag, target_tag))
            .send()
            .await
            .map_err(|e| StrategyError::RemoteTransfer(format!("job creation: {e}")))?;

        let status = resp.status();
        let body: Value = resp
            .json()
            .await
            .map_err(|e| StrategyError::RemoteJob(format!("unreadable job response: {e}")))?;
        if !status.is_success() {
            return Err(StrategyError::RemoteJob(format!(
                "job creation rejected ({status}): {}",
                api_message(&body).unwrap_or("no detail")
            )));
        }
        Ok(body)
    }

    async fn upload(&self, job: &Value, input: &Path) -> Result<(), StrategyError> {
        let (url, params) = upload_form(job)
            .ok_or_else(|| StrategyError::RemoteJob("job has no upload form".into()))?;

        let file = tokio::fs::File::open(input)
            .await
            .map_err(|e| StrategyError::RemoteTransfer(format!("cannot open input: {e}")))?;
        let len = file
            .metadata()
            .await
            .map_err(|e| StrategyError::RemoteTransfer(format!("cannot stat input: {e}")))?
            .len();
        let file_name = input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());

        let mut form = Form::new();
        for (k, v) in params {
            form = form.text(k, v);
        }
        form = form.part(
            "file",
            Part::stream_with_length(reqwest::Body::from(file), len).file_name(file_name),
        );

        let resp = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| StrategyError::RemoteTransfer(format!("upload: {e}")))?;
        if !resp.status().is_success() {
            return Err(StrategyError::RemoteTransfer(format!(
                "upload rejected ({})",
                resp.status()
            )));
        }
        debug!("Uploaded {} bytes", len);
        Ok(())
    }

    /// Poll until the job leaves the waiting/processing states.
    async fn wait(&self, job_id: &str) -> Result<Value, StrategyError> {
        let url = format!("{}/v2/jobs/{}", self.base_url, job_id);
        let deadline = Instant::now() + self.timeout;
        let max_delay = self.poll_interval * 8;
        let mut delay = self.poll_interval;

        loop {
            sleep(delay).await;

            let body: Value = self
                .http
                .get(&url)
                .bearer_auth(self.api_key()?)
                .send()
                .await
                .map_err(|e| StrategyError::RemoteTransfer(format!("job status: {e}")))?
                .json()
                .await
                .map_err(|e| StrategyError::RemoteJob(format!("unreadable job status: {e}")))?;

            match job_status(&body) {
                Some("finished") => return Ok(body),
                Some("error") => {
                    return Err(StrategyError::RemoteJob(
                        failure_message(&body).unwrap_or_else(|| "job failed".to_string()),
                    ))
                }
                status => debug!("Job {}: {}", job_id, status.unwrap_or("unknown")),
            }

            if Instant::now() + delay > deadline {
                return Err(StrategyError::RemoteJob(format!(
                    "timed out after {}s waiting for job {job_id}",
                    self.timeout.as_secs()
                )));
            }
            delay = (delay * 2).min(max_delay);
        }
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, StrategyError> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| StrategyError::RemoteTransfer(format!("download: {e}")))?;
        if !resp.status().is_success() {
            return Err(StrategyError::RemoteTransfer(format!(
                "download rejected ({})",
                resp.status()
            )));
        }
        let bytes = resp
            .bytes()
            .await
            .map_err(|e| StrategyError::RemoteTransfer(format!("download: {e}")))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl RemoteConverter for CloudConvertClient {
    fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn convert(
        &self,
        input: &Path,
        source_tag: &str,
        target_tag: &str,
    ) -> Result<Vec<u8>, StrategyError> {
        self.api_key()?;

        let job = self.create_job(source_tag, target_tag).await?;
        let job_id = job_id(&job)
            .ok_or_else(|| StrategyError::RemoteJob("job response has no id".into()))?
            .to_string();
        info!("Remote job {} created ({} → {})", job_id, source_tag, target_tag);

        self.upload(&job, input).await?;
        let finished = self.wait(&job_id).await?;

        let url = export_url(&finished).ok_or_else(|| {
            StrategyError::RemoteJob("job finished without an output file".into())
        })?;
        let bytes = self.download(url).await?;
        info!("Remote job {} done: {} bytes", job_id, bytes.len());
        Ok(bytes)
    }
}

// ── Job document helpers ─────────────────────────────────────────────────────

/// Request body for a three-task upload → convert → export job.
pub fn job_request(source_tag: &str, target_tag: &str) -> Value {
    json!({
        "tasks": {
            IMPORT_TASK: { "operation": "import/upload" },
            CONVERT_TASK: {
                "operation": "convert",
                "input": IMPORT_TASK,
                "input_format": source_tag,
                "output_format": target_tag,
            },
            EXPORT_TASK: { "operation": "export/url", "input": CONVERT_TASK },
        },
        "tag": "fileshift",
    })
}

fn tasks(job: &Value) -> impl Iterator<Item = &Value> {
    job.pointer("/data/tasks")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn task<'a>(job: &'a Value, name: &str) -> Option<&'a Value> {
    tasks(job).find(|t| t.get("name").and_then(Value::as_str) == Some(name))
}

fn job_id(job: &Value) -> Option<&str> {
    job.pointer("/data/id").and_then(Value::as_str)
}

fn job_status(job: &Value) -> Option<&str> {
    job.pointer("/data/status").and_then(Value::as_str)
}

fn api_message(body: &Value) -> Option<&str> {
    body.get("message").and_then(Value::as_str)
}

/// Upload URL and form fields from the import task.
pub fn upload_form(job: &Value) -> Option<(&str, Vec<(String, String)>)> {
    let form = task(job, IMPORT_TASK)?.pointer("/result/form")?;
    let url = form.get("url")?.as_str()?;
    let params = form
        .get("parameters")
        .and_then(Value::as_object)
        .map(|m| {
            m.iter()
                .map(|(k, v)| {
                    let v = match v {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    (k.clone(), v)
                })
                .collect()
        })
        .unwrap_or_default();
    Some((url, params))
}

/// Download URL of the first exported file.
pub fn export_url(job: &Value) -> Option<&str> {
    task(job, EXPORT_TASK)?
        .pointer("/result/files/0/url")?
        .as_str()
}

/// Message of the first failed task, falling back to the job-level message.
pub fn failure_message(job: &Value) -> Option<String> {
    tasks(job)
        .find(|t| t.get("status").and_then(Value::as_str) == Some("error"))
        .and_then(|t| {
            let message = t.get("message").and_then(Value::as_str)?;
            Some(match t.get("code").and_then(Value::as_str) {
                Some(code) => format!("{message} ({code})"),
                None => message.to_string(),
            })
        })
        .or_else(|| job.pointer("/data/message").and_then(Value::as_str).map(String::from))
}
