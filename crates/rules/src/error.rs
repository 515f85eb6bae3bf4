/// Errors raised while building rules from configuration.
///
/// All of these are fatal at startup; matching itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// A required field is missing or blank after default merging.
    #[error("rule[{index}]: {field} is not defined")]
    Missing { index: usize, field: &'static str },

    /// Both `key_prefix` and `key_regexp` were set on the same rule.
    #[error("rule[{index}]: s3.key_prefix and s3.key_regexp are mutually exclusive")]
    AmbiguousMatcher { index: usize },

    #[error("rule[{index}]: s3.key_regexp is invalid: {source}")]
    InvalidRegex {
        index: usize,
        #[source]
        source: regex::Error,
    },

    /// Rule validation error not covered above.
    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result alias for rule operations.
pub type Result<T> = std::result::Result<T, RuleError>;
