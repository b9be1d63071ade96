//! Remote document parsing through the LlamaParse API.
//!
//! Flow: upload the file, poll the job until it settles, then fetch the
//! per-page JSON result.

use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;

use super::Segment;
use crate::error::{DocQaError, Result};

pub const DEFAULT_LLAMA_PARSE_URL: &str = "https://api.cloud.llamaindex.ai/api/parsing";

#[derive(Debug, Clone)]
pub struct RemoteParserConfig {
    pub api_key: String,
    pub base_url: String,
    pub poll_interval: Duration,
    pub max_polls: u32,
}

impl RemoteParserConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_LLAMA_PARSE_URL.to_string(),
            poll_interval: Duration::from_secs(2),
            max_polls: 150,
        }
    }
}

#[derive(Deserialize)]
struct JobStatus {
    id: String,
    status: String,
}

#[derive(Deserialize)]
struct JsonResult {
    pages: Vec<PageResult>,
}

#[derive(Deserialize)]
struct PageResult {
    page: u32,
    #[serde(default)]
    text: String,
}

pub struct RemoteParser {
    client: Client,
    config: RemoteParserConfig,
}

impl RemoteParser {
    pub fn new(client: Client, config: RemoteParserConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &Path, url: &str) -> Result<T> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(&self.config.api_key)
            .send()
            .await
            .map_err(|e| DocQaError::parse(path, e))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DocQaError::parse(
                path,
                format!("parsing service error: {} - {}", status, body),
            ));
        }
        resp.json().await.map_err(|e| DocQaError::parse(path, e))
    }

    async fn upload(&self, path: &Path) -> Result<String> {
        let bytes = std::fs::read(path).map_err(|e| DocQaError::parse(path, e))?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("document")
            .to_string();
        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));

        let resp = self
            .client
            .post(self.url("/upload"))
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| DocQaError::parse(path, e))?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(DocQaError::parse(
                path,
                format!("upload rejected: {} - {}", status, body),
            ));
        }
        let job: JobStatus = resp.json().await.map_err(|e| DocQaError::parse(path, e))?;
        Ok(job.id)
    }

    async fn wait_for(&self, path: &Path, job_id: &str) -> Result<()> {
        let url = self.url(&format!("/job/{job_id}"));
        for attempt in 0..self.config.max_polls {
            let job: JobStatus = self.get_json(path, &url).await?;
            match job.status.as_str() {
                "SUCCESS" => return Ok(()),
                "ERROR" | "CANCELED" => {
                    return Err(DocQaError::parse(
                        path,
                        format!("parsing job {} ended with {}", job.id, job.status),
                    ))
                }
                _ => {
                    tracing::debug!(job_id, attempt, status = %job.status, "waiting for parse job");
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
        }
        Err(DocQaError::parse(
            path,
            format!("parsing job {job_id} did not finish in time"),
        ))
    }

    /// Parse a file remotely into one segment per page.
    pub async fn parse(&self, path: &Path) -> Result<Vec<Segment>> {
        let job_id = self.upload(path).await?;
        tracing::info!(path = %path.display(), job_id = %job_id, "submitted to remote parser");
        self.wait_for(path, &job_id).await?;

        let result: JsonResult = self
            .get_json(path, &self.url(&format!("/job/{job_id}/result/json")))
            .await?;
        Ok(result
            .pages
            .into_iter()
            .filter(|p| !p.text.trim().is_empty())
            .map(|p| Segment::new(p.text, path).with_meta("page_number", p.page))
            .collect())
    }
}
