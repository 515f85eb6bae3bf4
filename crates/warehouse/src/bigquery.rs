//! BigQuery REST client for load jobs.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ferry_core::config::GcpConfig;
use ferry_core::{CreateDisposition, SourceFormat, WriteDisposition};

use crate::auth::{token_provider, TokenProvider};
use crate::client::{JobHandle, JobStatus, LoadRequest, WarehouseClient};
use crate::error::WarehouseError;

const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com";

// ── Wire types ────────────────────────────────────────────────

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    project_id: String,
    job_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    location: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct TableReference<'a> {
    project_id: &'a str,
    dataset_id: &'a str,
    table_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadConfiguration<'a> {
    source_uris: &'a [String],
    destination_table: TableReference<'a>,
    create_disposition: &'static str,
    write_disposition: &'static str,
    source_format: &'static str,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    autodetect: bool,
}

#[derive(Debug, Serialize)]
struct JobConfiguration<'a> {
    load: LoadConfiguration<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InsertJob<'a> {
    job_reference: JobReference,
    configuration: JobConfiguration<'a>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl ErrorProto {
    fn describe(&self) -> String {
        match (&self.reason, &self.message) {
            (Some(reason), Some(message)) => format!("{reason}: {message}"),
            (None, Some(message)) => message.clone(),
            (Some(reason), None) => reason.clone(),
            (None, None) => "unknown error".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatusWire {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobResource {
    job_reference: JobReference,
    #[serde(default)]
    status: JobStatusWire,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ErrorProto,
}

fn source_format(format: SourceFormat) -> &'static str {
    match format {
        SourceFormat::Csv => "CSV",
        SourceFormat::Json => "NEWLINE_DELIMITED_JSON",
        SourceFormat::Parquet => "PARQUET",
    }
}

fn create_disposition(d: CreateDisposition) -> &'static str {
    match d {
        CreateDisposition::CreateIfNeeded => "CREATE_IF_NEEDED",
        CreateDisposition::CreateNever => "CREATE_NEVER",
    }
}

fn write_disposition(d: WriteDisposition) -> &'static str {
    match d {
        WriteDisposition::WriteAppend => "WRITE_APPEND",
        WriteDisposition::WriteTruncate => "WRITE_TRUNCATE",
        WriteDisposition::WriteEmpty => "WRITE_EMPTY",
    }
}

fn status_from_wire(status: &JobStatusWire) -> JobStatus {
    match status.state.as_str() {
        "DONE" => JobStatus::Done {
            error: status.error_result.as_ref().map(ErrorProto::describe),
        },
        "RUNNING" => JobStatus::Running,
        _ => JobStatus::Pending,
    }
}

/// Best-effort message from a non-2xx API response body.
fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error.describe())
        .unwrap_or_else(|_| format!("{status}: {body}"))
}

// ── Client ────────────────────────────────────────────────────

/// BigQuery `jobs.insert` / `jobs.get` over REST.
pub struct BigQueryClient {
    http: reqwest::Client,
    endpoint: String,
    location: Option<String>,
    tokens: Arc<dyn TokenProvider>,
}

impl BigQueryClient {
    pub fn new(
        endpoint: Option<&str>,
        location: Option<String>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let endpoint = endpoint
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .unwrap_or(DEFAULT_ENDPOINT)
            .trim_end_matches('/')
            .to_string();
        info!(endpoint = %endpoint, location = ?location, "BigQuery client initialized");
        Self {
            http: reqwest::Client::new(),
            endpoint,
            location,
            tokens,
        }
    }

    pub fn from_config(gcp: &GcpConfig) -> Result<Self, WarehouseError> {
        Ok(Self::new(
            gcp.big_query_endpoint.as_deref(),
            gcp.location.clone().filter(|l| !l.trim().is_empty()),
            token_provider(gcp)?,
        ))
    }

    fn jobs_url(&self, project_id: &str) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/jobs",
            self.endpoint,
            urlencoding::encode(project_id)
        )
    }

    async fn authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder, WarehouseError> {
        Ok(match self.tokens.token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }
}

#[async_trait]
impl WarehouseClient for BigQueryClient {
    async fn submit_load(&self, request: &LoadRequest) -> Result<JobHandle, WarehouseError> {
        let destination = &request.destination;
        let submit_err = |reason: String| WarehouseError::Submit {
            destination: destination.to_string(),
            reason,
        };

        let body = InsertJob {
            job_reference: JobReference {
                project_id: destination.project_id.clone(),
                job_id: format!("ferry_{}", uuid::Uuid::new_v4().simple()),
                location: self.location.clone(),
            },
            configuration: JobConfiguration {
                load: LoadConfiguration {
                    source_uris: &request.source_uris,
                    destination_table: TableReference {
                        project_id: &destination.project_id,
                        dataset_id: &destination.dataset,
                        table_id: &destination.table,
                    },
                    create_disposition: create_disposition(request.options.create_disposition),
                    write_disposition: write_disposition(request.options.write_disposition),
                    source_format: source_format(request.options.source_format),
                    autodetect: request.options.auto_detect,
                },
            },
        };

        debug!(
            destination = %destination,
            job_id = %body.job_reference.job_id,
            compression = ?request.options.compression,
            "submitting load job"
        );
        let http = self
            .authorized(self.http.post(self.jobs_url(&destination.project_id)).json(&body))
            .await?;
        let response = http.send().await.map_err(|e| submit_err(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| submit_err(e.to_string()))?;
        if !status.is_success() {
            return Err(submit_err(api_error_message(status, &text)));
        }

        let job: JobResource =
            serde_json::from_str(&text).map_err(|e| submit_err(format!("bad response: {e}")))?;
        let handle = JobHandle {
            project_id: job.job_reference.project_id,
            job_id: job.job_reference.job_id,
            location: job.job_reference.location.or_else(|| self.location.clone()),
        };
        info!(destination = %destination, job = %handle, "Load job submitted");
        Ok(handle)
    }

    async fn job_status(&self, handle: &JobHandle) -> Result<JobStatus, WarehouseError> {
        let poll_err = |reason: String| WarehouseError::Poll {
            job_id: handle.job_id.clone(),
            reason,
        };

        let url = format!(
            "{}/{}",
            self.jobs_url(&handle.project_id),
            urlencoding::encode(&handle.job_id)
        );
        let mut request = self.http.get(url);
        if let Some(location) = &handle.location {
            request = request.query(&[("location", location)]);
        }
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(|e| poll_err(e.to_string()))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| poll_err(e.to_string()))?;
        if !status.is_success() {
            return Err(poll_err(api_error_message(status, &text)));
        }

        let job: JobResource =
            serde_json::from_str(&text).map_err(|e| poll_err(format!("bad response: {e}")))?;
        Ok(status_from_wire(&job.status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferry_core::{LoadOptions, TableRef};

    #[test]
    fn insert_body_matches_rest_shape() {
        let uris = vec!["gs://tmp/data/user.csv".to_string()];
        let mut options = LoadOptions::new(SourceFormat::Json);
        options.auto_detect = true;
        let table = TableRef {
            project_id: "p".into(),
            dataset: "d".into(),
            table: "t".into(),
        };
        let body = InsertJob {
            job_reference: JobReference {
                project_id: "p".into(),
                job_id: "ferry_1".into(),
                location: None,
            },
            configuration: JobConfiguration {
                load: LoadConfiguration {
                    source_uris: &uris,
                    destination_table: TableReference {
                        project_id: &table.project_id,
                        dataset_id: &table.dataset,
                        table_id: &table.table,
                    },
                    create_disposition: create_disposition(options.create_disposition),
                    write_disposition: write_disposition(options.write_disposition),
                    source_format: source_format(options.source_format),
                    autodetect: options.auto_detect,
                },
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["jobReference"]["jobId"], "ferry_1");
        assert!(json["jobReference"].get("location").is_none());
        let load = &json["configuration"]["load"];
        assert_eq!(load["sourceUris"][0], "gs://tmp/data/user.csv");
        assert_eq!(load["destinationTable"]["datasetId"], "d");
        assert_eq!(load["createDisposition"], "CREATE_IF_NEEDED");
        assert_eq!(load["writeDisposition"], "WRITE_APPEND");
        assert_eq!(load["sourceFormat"], "NEWLINE_DELIMITED_JSON");
        assert_eq!(load["autodetect"], true);
    }

    #[test]
    fn status_mapping() {
        let done: JobResource = serde_json::from_str(
            r#"{"jobReference":{"projectId":"p","jobId":"j"},"status":{"state":"DONE"}}"#,
        )
        .unwrap();
        assert_eq!(status_from_wire(&done.status), JobStatus::Done { error: None });

        let failed: JobResource = serde_json::from_str(
            r#"{"jobReference":{"projectId":"p","jobId":"j"},
                "status":{"state":"DONE","errorResult":{"reason":"invalid","message":"bad row"}}}"#,
        )
        .unwrap();
        assert_eq!(
            status_from_wire(&failed.status),
            JobStatus::Done {
                error: Some("invalid: bad row".into())
            }
        );

        let running: JobResource = serde_json::from_str(
            r#"{"jobReference":{"projectId":"p","jobId":"j"},"status":{"state":"RUNNING"}}"#,
        )
        .unwrap();
        assert_eq!(status_from_wire(&running.status), JobStatus::Running);
    }

    #[test]
    fn api_error_prefers_structured_message() {
        let body = r#"{"error":{"code":404,"message":"Not found: Dataset p:d","status":"NOT_FOUND"}}"#;
        assert_eq!(
            api_error_message(reqwest::StatusCode::NOT_FOUND, body),
            "Not found: Dataset p:d"
        );
        assert_eq!(
            api_error_message(reqwest::StatusCode::BAD_GATEWAY, "oops"),
            "502 Bad Gateway: oops"
        );
    }

    #[test]
    fn endpoint_is_normalised() {
        let client = BigQueryClient::new(
            Some("http://localhost:9050/"),
            None,
            Arc::new(crate::auth::AnonymousToken),
        );
        assert_eq!(
            client.jobs_url("proj"),
            "http://localhost:9050/bigquery/v2/projects/proj/jobs"
        );
    }
}
