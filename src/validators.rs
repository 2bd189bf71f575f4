//! Ready-made response validators
//!
//! Each function returns a closure usable with
//! [`TaskBuilder::validate`](crate::TaskBuilder::validate).

use regex::Regex;

use crate::error::{Error, Result};
use crate::types::ItemId;

/// Accept any non-empty body
pub fn non_empty() -> impl Fn(&str, &ItemId, &str) -> bool + Send + Sync + 'static {
    |content, _, _| !content.is_empty()
}

/// Accept bodies containing `needle`
pub fn contains(needle: impl Into<String>) -> impl Fn(&str, &ItemId, &str) -> bool + Send + Sync + 'static {
    let needle = needle.into();
    move |content, _, _| content.contains(needle.as_str())
}

/// Accept bodies matching a regular expression
///
/// Fails with [`Error::InvalidConfiguration`] if the pattern does not compile.
pub fn matches(pattern: &str) -> Result<impl Fn(&str, &ItemId, &str) -> bool + Send + Sync + 'static> {
    let re = Regex::new(pattern)
        .map_err(|e| Error::invalid("validators", format!("Invalid pattern '{}': {}", pattern, e)))?;
    Ok(move |content: &str, _: &ItemId, _: &str| re.is_match(content))
}

/// Accept bodies that parse as JSON
pub fn json() -> impl Fn(&str, &ItemId, &str) -> bool + Send + Sync + 'static {
    |content, _, _| serde_json::from_str::<serde_json::Value>(content).is_ok()
}
