//! Key matchers: prefix or compiled regular expression.

use std::fmt;
use std::ops::Deref;

use regex::Regex;

/// Ordered strings captured by a successful match.
///
/// Index 0 is always present: the whole regex match, or the full key for
/// prefix matchers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureGroups(Vec<String>);

impl CaptureGroups {
    pub fn new(groups: Vec<String>) -> Self {
        Self(groups)
    }
}

impl Deref for CaptureGroups {
    type Target = [String];

    fn deref(&self) -> &[String] {
        &self.0
    }
}

/// How a rule selects keys within its bucket.
#[derive(Debug, Clone)]
pub enum KeyMatcher {
    Prefix(String),
    Regex(Regex),
}

impl KeyMatcher {
    /// Match `key`, returning the capture groups on success.
    ///
    /// Prefix mode ignores a single leading and a single trailing `/` on the
    /// key but captures the key untouched.
    pub fn captures(&self, key: &str) -> Option<CaptureGroups> {
        match self {
            KeyMatcher::Prefix(prefix) => {
                let trimmed = key.strip_prefix('/').unwrap_or(key);
                let trimmed = trimmed.strip_suffix('/').unwrap_or(trimmed);
                trimmed
                    .starts_with(prefix.as_str())
                    .then(|| CaptureGroups::new(vec![key.to_string()]))
            }
            KeyMatcher::Regex(re) => re.captures(key).map(|caps| {
                CaptureGroups::new(
                    caps.iter()
                        .map(|m| m.map_or_else(String::new, |m| m.as_str().to_string()))
                        .collect(),
                )
            }),
        }
    }

    pub fn is_match(&self, key: &str) -> bool {
        self.captures(key).is_some()
    }
}

impl fmt::Display for KeyMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyMatcher::Prefix(prefix) => f.write_str(prefix),
            KeyMatcher::Regex(re) => f.write_str(re.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex(pattern: &str) -> KeyMatcher {
        KeyMatcher::Regex(Regex::new(pattern).unwrap())
    }

    #[test]
    fn prefix_captures_full_key() {
        let m = KeyMatcher::Prefix("data/user".into());
        let caps = m.captures("data/user/part-0001.csv").unwrap();
        assert_eq!(&caps[..], &["data/user/part-0001.csv".to_string()]);
    }

    #[test]
    fn prefix_trims_single_separators() {
        let m = KeyMatcher::Prefix("data/user".into());
        assert!(m.is_match("/data/user/part.csv"));
        // Capture keeps the original key.
        let caps = m.captures("/data/user/").unwrap();
        assert_eq!(caps[0], "/data/user/");
        assert!(!m.is_match("//data/user/part.csv"));
        assert!(!m.is_match("data/other/part.csv"));
    }

    #[test]
    fn regex_reports_whole_match_and_groups() {
        let m = regex(r"data/(.+)/snapshot_at=(\d{8})/.+");
        let caps = m
            .captures("data/user/snapshot_at=20200210/part-0001.csv")
            .unwrap();
        assert_eq!(caps.len(), 3);
        assert_eq!(caps[0], "data/user/snapshot_at=20200210/part-0001.csv");
        assert_eq!(caps[1], "user");
        assert_eq!(caps[2], "20200210");
    }

    #[test]
    fn non_participating_group_is_empty() {
        let m = regex(r"data/(a)?(b)");
        let caps = m.captures("data/b").unwrap();
        assert_eq!(&caps[..], &["data/b".to_string(), String::new(), "b".to_string()]);
    }

    #[test]
    fn regex_is_unanchored() {
        let m = regex(r"part-(\d+)\.csv");
        let caps = m.captures("data/hoge/part-0001.csv").unwrap();
        assert_eq!(caps[0], "part-0001.csv");
        assert!(!m.is_match("data/hoge/xxxx.txt"));
    }
}
