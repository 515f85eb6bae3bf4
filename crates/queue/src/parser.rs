//! Parse S3 "object created" notification bodies into source locators.

use serde::Deserialize;
use tracing::debug;

use ferry_core::ObjectLocator;

use crate::consumer::QueueMessage;
use crate::error::QueueError;

/// The subset of the S3 event notification envelope we read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct S3Event {
    #[serde(rename = "Records", default)]
    pub records: Vec<S3EventRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3EventRecord {
    #[serde(rename = "eventName", default)]
    pub event_name: Option<String>,
    pub s3: S3Entity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Entity {
    pub bucket: S3Bucket,
    pub object: S3Object,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Bucket {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Object {
    /// URL-encoded as delivered by S3.
    pub key: String,
    #[serde(default)]
    pub size: Option<u64>,
}

/// Decode a notification key to its literal form.
///
/// Only keys containing `%` are decoded (form encoding, so `+` is a space).
/// A malformed escape falls back to the raw key.
pub fn decode_key(raw: &str) -> String {
    if !raw.contains('%') {
        return raw.to_string();
    }
    if !has_valid_escapes(raw) {
        debug!(key = raw, "key has a malformed escape, using raw key");
        return raw.to_string();
    }
    match urlencoding::decode(&raw.replace('+', " ")) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            debug!(key = raw, error = %e, "key is not valid percent-encoding, using raw key");
            raw.to_string()
        }
    }
}

fn has_valid_escapes(raw: &str) -> bool {
    let bytes = raw.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let valid = bytes
                .get(i + 1..i + 3)
                .is_some_and(|hex| hex.iter().all(u8::is_ascii_hexdigit));
            if !valid {
                return false;
            }
            i += 3;
        } else {
            i += 1;
        }
    }
    true
}

/// Parse a message body into one `s3://` locator per event record.
///
/// Bodies without `Records` (e.g. the S3 test event) yield no locators.
pub fn parse_locators(msg: &QueueMessage) -> Result<Vec<ObjectLocator>, QueueError> {
    let event: S3Event = serde_json::from_str(&msg.body).map_err(|e| QueueError::Parse {
        message_id: msg.message_id.clone(),
        reason: e.to_string(),
    })?;

    Ok(event
        .records
        .into_iter()
        .map(|record| ObjectLocator::s3(record.s3.bucket.name, decode_key(&record.s3.object.key)))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn make_message(body: &str) -> QueueMessage {
        QueueMessage {
            message_id: "msg-1".to_string(),
            body: body.to_string(),
            receipt_handle: "handle-1".to_string(),
            sent_at: Utc::now(),
            receive_count: 1,
        }
    }

    const EVENT: &str = r#"{
      "Records": [
        {
          "eventVersion": "2.1",
          "eventSource": "aws:s3",
          "eventName": "ObjectCreated:Put",
          "s3": {
            "bucket": { "name": "ferry.bucket.test", "arn": "arn:aws:s3:::ferry.bucket.test" },
            "object": { "key": "data/user/snapshot_at%3D20200210/part+0001.csv", "size": 1024 }
          }
        },
        {
          "eventName": "ObjectCreated:Put",
          "s3": {
            "bucket": { "name": "other" },
            "object": { "key": "plain/key+with+plus.csv" }
          }
        }
      ]
    }"#;

    #[test]
    fn parses_records_in_order() {
        let locators = parse_locators(&make_message(EVENT)).unwrap();
        assert_eq!(locators.len(), 2);
        assert_eq!(
            locators[0].to_string(),
            "s3://ferry.bucket.test/data/user/snapshot_at=20200210/part 0001.csv"
        );
        // No '%' means no decoding at all.
        assert_eq!(locators[1].key, "plain/key+with+plus.csv");
    }

    #[test]
    fn malformed_escape_falls_back_to_raw() {
        assert_eq!(decode_key("data/100%zz.csv"), "data/100%zz.csv");
        assert_eq!(decode_key("a+b%2"), "a+b%2");
        assert_eq!(decode_key("data/a%20b.csv"), "data/a b.csv");
    }

    #[test]
    fn test_event_has_no_locators() {
        let body = r#"{"Service":"Amazon S3","Event":"s3:TestEvent","Bucket":"b"}"#;
        assert!(parse_locators(&make_message(body)).unwrap().is_empty());
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = parse_locators(&make_message("not json")).unwrap_err();
        match err {
            QueueError::Parse { message_id, .. } => assert_eq!(message_id, "msg-1"),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
