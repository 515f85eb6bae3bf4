//! Fill rule fields from the top-level defaults.

use ferry_core::config::{
    is_blank, BigQueryConfig, Config, JobOptionConfig, RuleConfig, S3SourceConfig,
};

/// Merge `defaults` into every blank field of `rule`.
///
/// The key matcher is merged as a unit: the default's prefix/regexp pair is
/// only inherited when the rule names neither.
pub fn merge_rule(rule: &RuleConfig, defaults: &RuleConfig) -> RuleConfig {
    RuleConfig {
        s3: merge_block(rule.s3.as_ref(), defaults.s3.as_ref(), merge_s3),
        big_query: merge_block(
            rule.big_query.as_ref(),
            defaults.big_query.as_ref(),
            merge_big_query,
        ),
        option: merge_block(rule.option.as_ref(), defaults.option.as_ref(), merge_option),
    }
}

/// Rules from `config` with the top-level blocks merged in, in config order.
pub fn merged_rules(config: &Config) -> Vec<RuleConfig> {
    let defaults = RuleConfig {
        s3: config.s3.clone(),
        big_query: config.big_query.clone(),
        option: config.option.clone(),
    };
    config
        .rules
        .iter()
        .map(|rule| merge_rule(rule, &defaults))
        .collect()
}

fn merge_block<T: Clone>(
    own: Option<&T>,
    fallback: Option<&T>,
    merge: fn(&mut T, &T),
) -> Option<T> {
    match (own, fallback) {
        (Some(own), Some(fallback)) => {
            let mut merged = own.clone();
            merge(&mut merged, fallback);
            Some(merged)
        }
        (Some(own), None) => Some(own.clone()),
        (None, fallback) => fallback.cloned(),
    }
}

fn fill(target: &mut Option<String>, fallback: &Option<String>) {
    if is_blank(target) {
        target.clone_from(fallback);
    }
}

fn merge_s3(s3: &mut S3SourceConfig, other: &S3SourceConfig) {
    fill(&mut s3.region, &other.region);
    fill(&mut s3.bucket, &other.bucket);
    if is_blank(&s3.key_prefix) && is_blank(&s3.key_regexp) {
        s3.key_prefix.clone_from(&other.key_prefix);
        s3.key_regexp.clone_from(&other.key_regexp);
    }
}

fn merge_big_query(bq: &mut BigQueryConfig, other: &BigQueryConfig) {
    fill(&mut bq.project_id, &other.project_id);
    fill(&mut bq.dataset, &other.dataset);
    fill(&mut bq.table, &other.table);
}

fn merge_option(opt: &mut JobOptionConfig, other: &JobOptionConfig) {
    fill(&mut opt.temporary_bucket, &other.temporary_bucket);
    opt.gzip = opt.gzip.or(other.gzip);
    opt.auto_detect = opt.auto_detect.or(other.auto_detect);
    opt.source_format = opt.source_format.or(other.source_format);
}
