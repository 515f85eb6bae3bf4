//! A validated routing rule.

use std::fmt;

use regex::Regex;
use tracing::{debug, info};

use ferry_core::config::{is_blank, RuleConfig};
use ferry_core::{Compression, Job, LoadOptions, ObjectLocator, SourceFormat, TableRef};

use crate::error::{Result, RuleError};
use crate::expand::expand;
use crate::matcher::{CaptureGroups, KeyMatcher};

/// One source matcher plus its staging and warehouse templates.
///
/// Built once at startup from a merged [`RuleConfig`]; immutable afterwards.
#[derive(Debug, Clone)]
pub struct Rule {
    bucket: String,
    region: Option<String>,
    matcher: KeyMatcher,
    staging_bucket: String,
    project_id: String,
    dataset: String,
    table: String,
    options: LoadOptions,
}

fn required(value: &Option<String>, index: usize, field: &'static str) -> Result<String> {
    if is_blank(value) {
        return Err(RuleError::Missing { index, field });
    }
    Ok(value.as_deref().unwrap_or_default().trim().to_string())
}

impl Rule {
    /// Validate a merged rule config. `index` is the rule's position, used in errors.
    pub fn from_config(index: usize, config: &RuleConfig) -> Result<Self> {
        let s3 = config.s3.as_ref().ok_or(RuleError::Missing { index, field: "s3" })?;
        let bq = config
            .big_query
            .as_ref()
            .ok_or(RuleError::Missing { index, field: "big_query" })?;
        let opt = config
            .option
            .as_ref()
            .ok_or(RuleError::Missing { index, field: "option" })?;

        let bucket = required(&s3.bucket, index, "s3.bucket")?;
        let matcher = match (is_blank(&s3.key_prefix), is_blank(&s3.key_regexp)) {
            (false, false) => return Err(RuleError::AmbiguousMatcher { index }),
            (true, true) => {
                return Err(RuleError::Missing {
                    index,
                    field: "s3.key_prefix or s3.key_regexp",
                })
            }
            (false, true) => KeyMatcher::Prefix(required(&s3.key_prefix, index, "s3.key_prefix")?),
            (true, false) => {
                let pattern = s3.key_regexp.as_deref().unwrap_or_default();
                let re = Regex::new(pattern)
                    .map_err(|source| RuleError::InvalidRegex { index, source })?;
                KeyMatcher::Regex(re)
            }
        };

        let source_format = opt.source_format.ok_or(RuleError::Missing {
            index,
            field: "option.source_format",
        })?;
        let auto_detect = opt.auto_detect.unwrap_or(false);
        if auto_detect && !source_format.supports_auto_detect() {
            info!(rule = index, %source_format, "auto_detect works only when source_format is csv or json");
        }

        let mut options = LoadOptions::new(source_format);
        options.auto_detect = auto_detect;
        options.compression = if opt.gzip.unwrap_or(false) {
            Compression::Gzip
        } else {
            Compression::None
        };

        Ok(Self {
            bucket,
            region: s3.region.clone().filter(|r| !r.trim().is_empty()),
            matcher,
            staging_bucket: required(&opt.temporary_bucket, index, "option.temporary_bucket")?,
            project_id: required(&bq.project_id, index, "big_query.project_id")?,
            dataset: required(&bq.dataset, index, "big_query.dataset")?,
            table: required(&bq.table, index, "big_query.table")?,
            options,
        })
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Region of the source bucket, when the rule pins one.
    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn matcher(&self) -> &KeyMatcher {
        &self.matcher
    }

    pub fn source_format(&self) -> SourceFormat {
        self.options.source_format
    }

    /// Match a locator: scheme must be `s3` and the bucket must be the rule's.
    pub fn matches(&self, locator: &ObjectLocator) -> Option<CaptureGroups> {
        if !locator.is_s3() {
            return None;
        }
        if locator.bucket != self.bucket {
            debug!(source = %locator, rule = %self, "bucket mismatch");
            return None;
        }
        let captures = self.matcher.captures(&locator.key);
        if captures.is_none() {
            debug!(source = %locator, rule = %self, "key does not match");
        }
        captures
    }

    /// Expand the templates with `captures` into a job for `source`.
    ///
    /// The staging object keeps the source key inside the expanded staging bucket.
    pub fn job_for(&self, source: &ObjectLocator, captures: &CaptureGroups) -> Job {
        Job {
            source: source.clone(),
            staging: ObjectLocator::gcs(expand(&self.staging_bucket, captures), source.key.clone()),
            destination: TableRef {
                project_id: expand(&self.project_id, captures),
                dataset: expand(&self.dataset, captures),
                table: expand(&self.table, captures),
            },
            options: self.options.clone(),
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "s3://{}/{} => {}.{}.{}",
            self.bucket, self.matcher, self.project_id, self.dataset, self.table
        )
    }
}
