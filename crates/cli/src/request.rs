//! Import request files: objects to import without a queue notification.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use ferry_core::ObjectLocator;

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    #[serde(default)]
    pub records: Vec<ImportRecord>,
}

#[derive(Debug, Deserialize)]
pub struct ImportRecord {
    pub bucket: String,
    pub key: String,
}

impl ImportRequest {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read request file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse request file {}", path.display()))
    }

    pub fn locators(&self) -> Vec<ObjectLocator> {
        self.records
            .iter()
            .map(|r| ObjectLocator::s3(r.bucket.clone(), r.key.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn reads_records_as_s3_locators() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"records":[{{"bucket":"b","key":"data/user/a.csv"}},{{"bucket":"b","key":"data/user/b.csv"}}]}}"#
        )
        .unwrap();

        let request = ImportRequest::from_file(file.path()).unwrap();
        let locators: Vec<String> = request.locators().iter().map(|l| l.to_string()).collect();
        assert_eq!(locators, vec!["s3://b/data/user/a.csv", "s3://b/data/user/b.csv"]);
    }

    #[test]
    fn malformed_file_names_the_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "records: []").unwrap();
        let err = ImportRequest::from_file(file.path()).unwrap_err();
        assert!(err.to_string().contains("failed to parse request file"));
    }
}
