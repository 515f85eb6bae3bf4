use std::env;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use base64::engine::general_purpose;
use base64::Engine as _;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::job::SourceFormat;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

/// `true` when the option is absent or holds only whitespace.
pub fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}

/// Fill `target` from `fallback` when `target` is blank.
fn fill_blank(target: &mut Option<String>, fallback: Option<String>) {
    if is_blank(target) {
        *target = fallback;
    }
}

fn env_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}").expect("static env pattern")
    })
}

/// Expand `${VAR}` and `${VAR:-default}` references in raw config text.
///
/// Unset variables without a default expand to the empty string.
pub fn expand_env(raw: &str) -> String {
    env_pattern()
        .replace_all(raw, |caps: &Captures<'_>| {
            env_opt(&caps[1])
                .or_else(|| caps.get(2).map(|m| m.as_str().to_string()))
                .unwrap_or_default()
        })
        .into_owned()
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name of the queue receiving object-created notifications.
    pub queue_name: String,
    pub cloud: CloudConfig,
    /// Rule defaults merged into every entry of `rules`.
    pub s3: Option<S3SourceConfig>,
    pub big_query: Option<BigQueryConfig>,
    pub option: Option<JobOptionConfig>,
    /// Routing rules, evaluated in order.
    pub rules: Vec<RuleConfig>,
    pub receiver: ReceiverConfig,
    pub loader: LoaderConfig,
}

impl Config {
    /// Read, env-expand and parse a YAML config file, then apply env fallbacks.
    ///
    /// Profile is read from `FERRY_PROFILE`. When set (e.g. `PROD`), every
    /// fallback key is first looked up as `{PROFILE}_{KEY}`, then `{KEY}`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_yaml_str(&raw)?;
        let profile = env_or("FERRY_PROFILE", "").to_uppercase();
        config.apply_env_defaults(&profile);
        Ok(config)
    }

    /// Parse YAML text after `${VAR}` expansion. No env fallbacks are applied.
    pub fn from_yaml_str(raw: &str) -> Result<Self, ConfigError> {
        let expanded = expand_env(raw);
        Ok(serde_yaml::from_str(&expanded)?)
    }

    /// Fill unset cloud settings and the default project from the environment.
    pub fn apply_env_defaults(&mut self, profile: &str) {
        let aws = &mut self.cloud.aws;
        if aws.region.trim().is_empty() {
            aws.region = profiled_env_opt(profile, "AWS_REGION").unwrap_or_default();
        }
        fill_blank(&mut aws.access_key_id, profiled_env_opt(profile, "AWS_ACCESS_KEY_ID"));
        fill_blank(
            &mut aws.secret_access_key,
            profiled_env_opt(profile, "AWS_SECRET_ACCESS_KEY"),
        );
        fill_blank(&mut aws.session_token, profiled_env_opt(profile, "AWS_SESSION_TOKEN"));
        let endpoint = profiled_env_opt(profile, "AWS_ENDPOINT_URL");
        fill_blank(&mut aws.s3_endpoint, endpoint.clone());
        fill_blank(&mut aws.sqs_endpoint, endpoint);

        let gcp = &mut self.cloud.gcp;
        if gcp.credential_path.is_none() {
            gcp.credential_path =
                profiled_env_opt(profile, "GOOGLE_APPLICATION_CREDENTIALS").map(PathBuf::from);
        }

        let big_query = self.big_query.get_or_insert_with(BigQueryConfig::default);
        fill_blank(&mut big_query.project_id, profiled_env_opt(profile, "GCP_PROJECT_ID"));
    }

    /// Fail unless a queue name is configured (queue-driven modes only).
    pub fn require_queue_name(&self) -> Result<&str, ConfigError> {
        let name = self.queue_name.trim();
        if name.is_empty() {
            return Err(ConfigError::Invalid("queue_name is not defined".into()));
        }
        Ok(name)
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded:");
        tracing::info!("  queue:       name={}", self.queue_name);
        tracing::info!(
            "  aws:         region={}, s3_endpoint={}, sqs_endpoint={}",
            self.cloud.aws.region,
            self.cloud.aws.s3_endpoint.as_deref().unwrap_or("(default)"),
            self.cloud.aws.sqs_endpoint.as_deref().unwrap_or("(default)")
        );
        tracing::info!(
            "  gcp:         bigquery_endpoint={}, credential={}, anonymous={}",
            self.cloud.gcp.big_query_endpoint.as_deref().unwrap_or("(default)"),
            if self.cloud.gcp.has_credential() { "set" } else { "(none)" },
            self.cloud.gcp.without_authentication
        );
        tracing::info!("  rules:       {}", self.rules.len());
    }
}

// ── Cloud ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CloudConfig {
    pub aws: AwsConfig,
    pub gcp: GcpConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AwsConfig {
    pub region: String,
    pub disable_ssl: bool,
    pub s3_force_path_style: bool,
    pub s3_endpoint: Option<String>,
    pub sqs_endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
}

impl AwsConfig {
    /// Normalise an endpoint override: adds a scheme honouring `disable_ssl`.
    pub fn endpoint_url(&self, endpoint: &Option<String>) -> Option<String> {
        let endpoint = endpoint.as_deref().map(str::trim).filter(|e| !e.is_empty())?;
        if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            Some(endpoint.to_string())
        } else if self.disable_ssl {
            Some(format!("http://{endpoint}"))
        } else {
            Some(format!("https://{endpoint}"))
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GcpConfig {
    /// Skip authentication entirely (emulators).
    pub without_authentication: bool,
    pub big_query_endpoint: Option<String>,
    /// Storage API base URL override (emulators).
    pub gcs_endpoint: Option<String>,
    /// Service-account key: inline JSON or its base64 encoding.
    pub credential: Option<String>,
    /// Path to a service-account key file.
    pub credential_path: Option<PathBuf>,
    /// BigQuery job location (e.g. `US`, `asia-northeast1`).
    pub location: Option<String>,
}

impl GcpConfig {
    pub fn has_credential(&self) -> bool {
        !is_blank(&self.credential) || self.credential_path.is_some()
    }

    /// Service-account key JSON from `credential` (inline or base64) or
    /// `credential_path`. `None` when neither is configured.
    pub fn credential_json(&self) -> Result<Option<String>, ConfigError> {
        if let Some(raw) = self.credential.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            return decode_credential(raw).map(Some);
        }
        match &self.credential_path {
            Some(path) => std::fs::read_to_string(path)
                .map(Some)
                .map_err(|source| ConfigError::Io {
                    path: path.display().to_string(),
                    source,
                }),
            None => Ok(None),
        }
    }
}

fn decode_credential(raw: &str) -> Result<String, ConfigError> {
    if raw.starts_with('{') {
        return Ok(raw.to_string());
    }
    let bytes = general_purpose::STANDARD
        .decode(raw)
        .map_err(|e| ConfigError::Invalid(format!("gcp.credential is neither JSON nor base64: {e}")))?;
    String::from_utf8(bytes)
        .map_err(|e| ConfigError::Invalid(format!("gcp.credential is not UTF-8: {e}")))
}

// ── Rules ─────────────────────────────────────────────────────

/// Source side of a rule. Exactly one of `key_prefix` / `key_regexp` must
/// survive default merging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct S3SourceConfig {
    pub region: Option<String>,
    pub bucket: Option<String>,
    pub key_prefix: Option<String>,
    pub key_regexp: Option<String>,
}

/// Destination table template; each field may contain `$N` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BigQueryConfig {
    pub project_id: Option<String>,
    pub dataset: Option<String>,
    pub table: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobOptionConfig {
    /// Staging bucket template (may contain `$N` placeholders).
    pub temporary_bucket: Option<String>,
    pub gzip: Option<bool>,
    pub auto_detect: Option<bool>,
    pub source_format: Option<SourceFormat>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleConfig {
    pub s3: Option<S3SourceConfig>,
    pub big_query: Option<BigQueryConfig>,
    pub option: Option<JobOptionConfig>,
}

// ── Receiver ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// Long-poll wait per receive call, in seconds (0..=20).
    pub wait_time_seconds: i32,
    /// Visibility timeout override for received messages.
    pub visibility_timeout_secs: Option<i32>,
    pub ack_retry: RetryConfig,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            wait_time_seconds: 20,
            visibility_timeout_secs: None,
            ack_retry: RetryConfig::default(),
        }
    }
}

/// Exponential backoff settings for acknowledge retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub interval_ms: u64,
    /// Fractional jitter applied to each delay (0.05 = ±5%).
    pub jitter: f64,
    pub max_retries: u32,
    pub max_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            interval_ms: 500,
            jitter: 0.05,
            max_retries: 5,
            max_interval_ms: 10_000,
        }
    }
}

// ── Loader ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    pub poll_interval_ms: u64,
    pub max_poll_interval_ms: u64,
    /// Give up waiting for a submitted load job after this many seconds.
    pub timeout_seconds: u64,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 500,
            max_poll_interval_ms: 5_000,
            timeout_seconds: 3_600,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
queue_name: ferry-test
cloud:
  aws:
    region: ap-northeast-1
    s3_endpoint: localhost:9000
    disable_ssl: true
s3:
  bucket: ferry.bucket.test
big_query:
  project_id: ferry-test-gcp
  dataset: test
option:
  temporary_bucket: ferry-import-tmp
  source_format: csv
rules:
  - s3:
      key_prefix: data/user
    big_query:
      table: user
  - s3:
      key_regexp: data/(.+)/part-([0-9]+).csv
    big_query:
      table: $1_$2
"#;

    #[test]
    fn parses_sample_config() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        assert_eq!(config.queue_name, "ferry-test");
        assert_eq!(config.rules.len(), 2);
        assert_eq!(
            config.option.as_ref().unwrap().source_format,
            Some(SourceFormat::Csv)
        );
        assert_eq!(config.receiver.wait_time_seconds, 20);
        assert_eq!(config.receiver.ack_retry.max_retries, 5);
        // `$1_$2` is a placeholder template, not an env reference.
        assert_eq!(
            config.rules[1].big_query.as_ref().unwrap().table.as_deref(),
            Some("$1_$2")
        );
    }

    #[test]
    fn endpoint_gets_scheme_from_disable_ssl() {
        let config = Config::from_yaml_str(SAMPLE).unwrap();
        let aws = &config.cloud.aws;
        assert_eq!(
            aws.endpoint_url(&aws.s3_endpoint).as_deref(),
            Some("http://localhost:9000")
        );
        assert_eq!(aws.endpoint_url(&aws.sqs_endpoint), None);
    }

    #[test]
    fn expand_env_uses_default_when_unset() {
        let out = expand_env("bucket: ${FERRY_TEST_SURELY_UNSET_VAR:-fallback}");
        assert_eq!(out, "bucket: fallback");
        let out = expand_env("bucket: '${FERRY_TEST_SURELY_UNSET_VAR}'");
        assert_eq!(out, "bucket: ''");
    }

    #[test]
    fn expand_env_reads_environment() {
        std::env::set_var("FERRY_TEST_EXPAND_QUEUE", "from-env");
        let out = expand_env("queue_name: ${FERRY_TEST_EXPAND_QUEUE:-nope}");
        assert_eq!(out, "queue_name: from-env");
        std::env::remove_var("FERRY_TEST_EXPAND_QUEUE");
    }

    #[test]
    fn profiled_env_prefers_prefixed_key() {
        std::env::set_var("FERRYTEST_GCP_PROJECT_ID", "profiled-project");
        let mut config = Config::from_yaml_str("queue_name: q").unwrap();
        config.apply_env_defaults("FERRYTEST");
        assert_eq!(
            config.big_query.unwrap().project_id.as_deref(),
            Some("profiled-project")
        );
        std::env::remove_var("FERRYTEST_GCP_PROJECT_ID");
    }

    #[test]
    fn configured_project_is_not_overridden() {
        std::env::set_var("FERRYKEEP_GCP_PROJECT_ID", "env-project");
        let mut config = Config::from_yaml_str(SAMPLE).unwrap();
        config.apply_env_defaults("FERRYKEEP");
        assert_eq!(
            config.big_query.unwrap().project_id.as_deref(),
            Some("ferry-test-gcp")
        );
        std::env::remove_var("FERRYKEEP_GCP_PROJECT_ID");
    }

    #[test]
    fn require_queue_name_rejects_blank() {
        let config = Config::from_yaml_str("queue_name: '  '").unwrap();
        assert!(config.require_queue_name().is_err());
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, SAMPLE).unwrap();
        let config = Config::load(&path).unwrap();
        assert_eq!(config.require_queue_name().unwrap(), "ferry-test");
    }

    #[test]
    fn credential_accepts_json_and_base64() {
        let json = r#"{"type":"service_account","client_email":"a@b"}"#;
        let inline = GcpConfig {
            credential: Some(json.to_string()),
            ..Default::default()
        };
        assert_eq!(inline.credential_json().unwrap().as_deref(), Some(json));

        let encoded = GcpConfig {
            credential: Some(general_purpose::STANDARD.encode(json)),
            ..Default::default()
        };
        assert_eq!(encoded.credential_json().unwrap().as_deref(), Some(json));

        let garbage = GcpConfig {
            credential: Some("not base64!".into()),
            ..Default::default()
        };
        assert!(garbage.credential_json().is_err());
        assert_eq!(GcpConfig::default().credential_json().unwrap(), None);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let err = Config::load("/definitely/not/here.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
