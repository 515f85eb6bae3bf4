//! Import jobs: one source object, its staging copy, and a warehouse table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::locator::ObjectLocator;

/// Payload format of the staged object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    /// Delimited text.
    Csv,
    /// Newline-delimited JSON records.
    Json,
    /// Columnar.
    Parquet,
}

impl SourceFormat {
    /// Schema auto-detection only applies to self-describing-less formats.
    pub fn supports_auto_detect(&self) -> bool {
        matches!(self, SourceFormat::Csv | SourceFormat::Json)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "csv",
            SourceFormat::Json => "json",
            SourceFormat::Parquet => "parquet",
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(SourceFormat::Csv),
            "json" => Ok(SourceFormat::Json),
            "parquet" => Ok(SourceFormat::Parquet),
            other => Err(format!("unsupported source format: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    None,
    Gzip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreateDisposition {
    #[default]
    CreateIfNeeded,
    CreateNever,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteDisposition {
    #[default]
    WriteAppend,
    WriteTruncate,
    WriteEmpty,
}

/// Per-job load settings handed to the warehouse.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadOptions {
    pub source_format: SourceFormat,
    pub compression: Compression,
    pub auto_detect: bool,
    pub create_disposition: CreateDisposition,
    pub write_disposition: WriteDisposition,
}

impl LoadOptions {
    pub fn new(source_format: SourceFormat) -> Self {
        Self {
            source_format,
            compression: Compression::None,
            auto_detect: false,
            create_disposition: CreateDisposition::default(),
            write_disposition: WriteDisposition::default(),
        }
    }
}

/// Fully-qualified warehouse table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableRef {
    pub project_id: String,
    pub dataset: String,
    pub table: String,
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.project_id, self.dataset, self.table)
    }
}

/// One unit of import work produced by matching one rule against one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub source: ObjectLocator,
    pub staging: ObjectLocator,
    pub destination: TableRef,
    pub options: LoadOptions,
}

impl fmt::Display for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "transport from {} to {}, and load to {}",
            self.source, self.staging, self.destination
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_format_parses_case_insensitive() {
        assert_eq!("CSV".parse::<SourceFormat>().unwrap(), SourceFormat::Csv);
        assert_eq!("parquet".parse::<SourceFormat>().unwrap(), SourceFormat::Parquet);
        assert!("avro".parse::<SourceFormat>().is_err());
    }

    #[test]
    fn auto_detect_support() {
        assert!(SourceFormat::Csv.supports_auto_detect());
        assert!(SourceFormat::Json.supports_auto_detect());
        assert!(!SourceFormat::Parquet.supports_auto_detect());
    }

    #[test]
    fn default_dispositions_are_append_and_create() {
        let opts = LoadOptions::new(SourceFormat::Csv);
        assert_eq!(opts.create_disposition, CreateDisposition::CreateIfNeeded);
        assert_eq!(opts.write_disposition, WriteDisposition::WriteAppend);
        assert_eq!(opts.compression, Compression::None);
    }

    #[test]
    fn job_display() {
        let job = Job {
            source: ObjectLocator::s3("src", "data/user.txt"),
            staging: ObjectLocator::gcs("tmp", "data/user.txt"),
            destination: TableRef {
                project_id: "proj".into(),
                dataset: "test".into(),
                table: "user".into(),
            },
            options: LoadOptions::new(SourceFormat::Csv),
        };
        assert_eq!(
            job.to_string(),
            "transport from s3://src/data/user.txt to gs://tmp/data/user.txt, and load to proj.test.user"
        );
    }
}
