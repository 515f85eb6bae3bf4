//! Routing scenarios driven from YAML config, as an operator would write it.

use ferry_core::{Config, ObjectLocator};
use ferry_rules::{Resolver, RuleError};

const CONFIG: &str = r#"
queue_name: ferry-test
s3:
  region: ap-northeast-1
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
      key_regexp: data/(.+)/part-([0-9]+)\.csv
    big_query:
      table: $1_$2
"#;

fn resolver(yaml: &str) -> Resolver {
    let config = Config::from_yaml_str(yaml).expect("config parses");
    Resolver::from_config(&config).expect("rules validate")
}

fn loc(uri: &str) -> ObjectLocator {
    uri.parse().expect("valid locator")
}

#[test]
fn resolves_default_config() {
    let jobs = resolver(CONFIG).resolve(&[
        loc("s3://dummy/dummy.txt"),
        loc("s3://ferry.bucket.test/dummy.txt"),
        loc("s3://ferry.bucket.test/data/user.txt"),
        loc("s3://ferry.bucket.test/data/hoge/part-0001.csv"),
        loc("s3://ferry.bucket.test/data/hoge/xxxx.txt"),
    ]);
    let actual: Vec<String> = jobs.iter().map(ToString::to_string).collect();
    assert_eq!(
        actual,
        vec![
            "transport from s3://ferry.bucket.test/data/user.txt to gs://ferry-import-tmp/data/user.txt, and load to ferry-test-gcp.test.user",
            "transport from s3://ferry.bucket.test/data/hoge/part-0001.csv to gs://ferry-import-tmp/data/hoge/part-0001.csv, and load to ferry-test-gcp.test.hoge_0001",
        ]
    );
}

#[test]
fn prefix_scenario() {
    let yaml = r#"
rules:
  - s3: { bucket: b, key_prefix: data/user }
    big_query: { project_id: p, dataset: test, table: user }
    option: { temporary_bucket: tmp, source_format: csv }
"#;
    let jobs = resolver(yaml).resolve(&[loc("s3://b/data/user/part-0001.csv")]);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].destination.dataset, "test");
    assert_eq!(jobs[0].destination.table, "user");
    assert_eq!(jobs[0].staging.to_string(), "gs://tmp/data/user/part-0001.csv");
}

#[test]
fn regex_scenario() {
    let yaml = r#"
rules:
  - s3: { bucket: b, key_regexp: 'data/(.+)/snapshot_at=(\d{8})/.+' }
    big_query: { project_id: p, dataset: test, table: $1_$2 }
    option: { temporary_bucket: tmp, source_format: json }
"#;
    let jobs = resolver(yaml).resolve(&[loc("s3://b/data/user/snapshot_at=20200210/part-0001.csv")]);
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].destination.to_string(), "p.test.user_20200210");
}

#[test]
fn two_matching_rules_fan_out() {
    let yaml = r#"
big_query: { project_id: p, dataset: test }
option: { source_format: csv }
rules:
  - s3: { bucket: b, key_prefix: data/ }
    big_query: { table: raw }
    option: { temporary_bucket: tmp-raw }
  - s3: { bucket: b, key_regexp: 'data/(\w+)/' }
    big_query: { table: $1 }
    option: { temporary_bucket: tmp-$1 }
"#;
    let jobs = resolver(yaml).resolve(&[loc("s3://b/data/user/part-0001.csv")]);
    let tables: Vec<_> = jobs.iter().map(|j| j.destination.table.as_str()).collect();
    assert_eq!(tables, vec!["raw", "user"]);
    assert_eq!(jobs[0].staging.bucket, "tmp-raw");
    assert_eq!(jobs[1].staging.bucket, "tmp-user");
}

#[test]
fn no_match_is_empty_not_error() {
    let jobs = resolver(CONFIG).resolve(&[loc("s3://elsewhere/data/user.txt")]);
    assert!(jobs.is_empty());
}

#[test]
fn resolve_is_pure() {
    let r = resolver(CONFIG);
    let input = [
        loc("s3://ferry.bucket.test/data/user.txt"),
        loc("s3://ferry.bucket.test/data/a/part-1.csv"),
    ];
    assert_eq!(r.resolve(&input), r.resolve(&input));
}

#[test]
fn rule_with_both_matchers_fails_validation() {
    let yaml = r#"
rules:
  - s3: { bucket: b, key_prefix: data/, key_regexp: 'data/.+' }
    big_query: { project_id: p, dataset: d, table: t }
    option: { temporary_bucket: tmp, source_format: csv }
"#;
    let config = Config::from_yaml_str(yaml).unwrap();
    let err = Resolver::from_config(&config).unwrap_err();
    assert!(matches!(err, RuleError::AmbiguousMatcher { index: 0 }));
}

#[test]
fn unsupported_source_format_fails_parse() {
    let yaml = r#"
option: { source_format: avro }
"#;
    assert!(Config::from_yaml_str(yaml).is_err());
}

#[test]
fn bucket_regions_come_from_rules() {
    let regions = resolver(CONFIG).bucket_regions();
    assert_eq!(
        regions.get("ferry.bucket.test").map(String::as_str),
        Some("ap-northeast-1")
    );
}
