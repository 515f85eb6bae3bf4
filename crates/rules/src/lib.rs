//! Object routing: which source objects are imported, and where they land.
//!
//! This crate provides:
//! - Default merging of the top-level `s3` / `big_query` / `option` blocks into each rule
//! - Rule validation with one-time regex compilation
//! - Prefix and regular-expression key matchers producing capture groups
//! - `$N` placeholder expansion into staging and warehouse destinations
//! - The ordered [`Resolver`] turning locators into jobs

pub mod error;
pub mod expand;
pub mod matcher;
pub mod merge;
pub mod resolver;
pub mod rule;

pub use error::{Result, RuleError};
pub use expand::expand;
pub use matcher::{CaptureGroups, KeyMatcher};
pub use resolver::Resolver;
pub use rule::Rule;
