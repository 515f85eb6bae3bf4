//! Ordered rule set applied to notification locators.

use std::collections::HashMap;

use tracing::{debug, info};

use ferry_core::{Config, Job, ObjectLocator};

use crate::error::Result;
use crate::merge::merged_rules;
use crate::rule::Rule;

/// Applies rules, in configured order, to batches of source locators.
///
/// Resolution is pure: no I/O and no mutable state, so the same input always
/// yields the same jobs.
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    rules: Vec<Rule>,
}

impl Resolver {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    /// Merge defaults into every configured rule and validate it.
    pub fn from_config(config: &Config) -> Result<Self> {
        let rules = merged_rules(config)
            .iter()
            .enumerate()
            .map(|(index, rule)| Rule::from_config(index, rule))
            .collect::<Result<Vec<_>>>()?;
        for rule in &rules {
            info!(rule = %rule, "rule loaded");
        }
        Ok(Self::new(rules))
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// One job per (locator, matching rule), locators outer, rules inner.
    ///
    /// A locator matching several rules fans out to several jobs. No match
    /// at all yields an empty list, not an error.
    pub fn resolve(&self, locators: &[ObjectLocator]) -> Vec<Job> {
        let mut jobs = Vec::with_capacity(locators.len());
        for locator in locators {
            debug!(source = %locator, "resolving");
            for rule in &self.rules {
                if let Some(captures) = rule.matches(locator) {
                    debug!(source = %locator, rule = %rule, "rule matched");
                    jobs.push(rule.job_for(locator, &captures));
                }
            }
        }
        jobs
    }

    /// Source-bucket regions pinned by rules, for building regional clients.
    pub fn bucket_regions(&self) -> HashMap<String, String> {
        self.rules
            .iter()
            .filter_map(|rule| Some((rule.bucket().to_string(), rule.region()?.to_string())))
            .collect()
    }
}
