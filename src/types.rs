//! Core types for fetch-dl

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

/// Stable identity of one item in a [`Task`](crate::Task)
///
/// Ids are integers or strings. A string that is the canonical decimal form of
/// an integer (`"42"`, `"-7"`, but not `"042"` or `"+7"`) is normalized to the
/// integer variant, so `"42"` and `42` name the same item and the same cache key.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged, try_from = "serde_json::Value")]
pub enum ItemId {
    /// Integer id
    Int(i64),
    /// String id
    Str(String),
}

impl ItemId {
    fn from_string(s: String) -> Self {
        match s.parse::<i64>() {
            Ok(n) if n.to_string() == s => ItemId::Int(n),
            _ => ItemId::Str(s),
        }
    }
}

impl From<i64> for ItemId {
    fn from(id: i64) -> Self {
        ItemId::Int(id)
    }
}

impl From<i32> for ItemId {
    fn from(id: i32) -> Self {
        ItemId::Int(i64::from(id))
    }
}

impl From<u32> for ItemId {
    fn from(id: u32) -> Self {
        ItemId::Int(i64::from(id))
    }
}

impl TryFrom<u64> for ItemId {
    type Error = Error;

    fn try_from(id: u64) -> Result<Self> {
        i64::try_from(id)
            .map(ItemId::Int)
            .map_err(|_| Error::invalid("id", format!("Invalid item id: {} is out of range", id)))
    }
}

impl TryFrom<usize> for ItemId {
    type Error = Error;

    fn try_from(id: usize) -> Result<Self> {
        u64::try_from(id)
            .map_err(|_| Error::invalid("id", format!("Invalid item id: {} is out of range", id)))
            .and_then(ItemId::try_from)
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self::from_string(id)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self::from_string(id.to_string())
    }
}

impl TryFrom<serde_json::Value> for ItemId {
    type Error = Error;

    /// Accepts JSON integers and strings only; everything else is not a stable identity.
    fn try_from(value: serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(ItemId::Int)
                .ok_or_else(|| Error::invalid("id", format!("Invalid item id: {}", n))),
            serde_json::Value::String(s) => Ok(ItemId::from(s)),
            other => Err(Error::invalid(
                "id",
                format!("Invalid item id: {} is not an integer or string", other),
            )),
        }
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ItemId::Int(n) => write!(f, "{}", n),
            ItemId::Str(s) => f.write_str(s),
        }
    }
}

/// Scalar value of a transport option
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    /// Boolean flag
    Bool(bool),
    /// Integer value
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    Str(String),
}

impl OptionValue {
    /// Numeric value as seconds, accepting integers and floats
    pub fn as_secs_f64(&self) -> Option<f64> {
        match self {
            OptionValue::Int(n) => Some(*n as f64),
            OptionValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

impl From<bool> for OptionValue {
    fn from(v: bool) -> Self {
        OptionValue::Bool(v)
    }
}

impl From<i64> for OptionValue {
    fn from(v: i64) -> Self {
        OptionValue::Int(v)
    }
}

impl From<i32> for OptionValue {
    fn from(v: i32) -> Self {
        OptionValue::Int(i64::from(v))
    }
}

impl From<f64> for OptionValue {
    fn from(v: f64) -> Self {
        OptionValue::Float(v)
    }
}

impl From<&str> for OptionValue {
    fn from(v: &str) -> Self {
        OptionValue::Str(v.to_string())
    }
}

impl From<String> for OptionValue {
    fn from(v: String) -> Self {
        OptionValue::Str(v)
    }
}

impl std::fmt::Display for OptionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OptionValue::Bool(b) => write!(f, "{}", b),
            OptionValue::Int(n) => write!(f, "{}", n),
            OptionValue::Float(x) => write!(f, "{}", x),
            OptionValue::Str(s) => f.write_str(s),
        }
    }
}

/// Transport options passed verbatim to the transport for every request
pub type TransportOptions = BTreeMap<String, OptionValue>;

/// Terminal outcome for one item
///
/// Exactly one of [`successful`](Self::successful), [`failed`](Self::failed) and
/// [`skipped`](Self::skipped) holds, and content exists only on success.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "content", rename_all = "snake_case")]
pub enum FetchResult {
    /// Fetched (or served from cache) and accepted by every validator
    Successful(String),
    /// Rejected on every attempt up to the retry limit
    Failed,
    /// Served from cache as a known-bad entry inside its throttle window
    Skipped,
}

impl FetchResult {
    /// Accepted content, or [`Error::EmptyContent`] for failed and skipped items
    pub fn content(&self) -> Result<&str> {
        match self {
            FetchResult::Successful(content) => Ok(content),
            _ => Err(Error::EmptyContent),
        }
    }

    /// Owned variant of [`content`](Self::content)
    pub fn into_content(self) -> Result<String> {
        match self {
            FetchResult::Successful(content) => Ok(content),
            _ => Err(Error::EmptyContent),
        }
    }

    /// True if the item was fetched or served from cache with valid content
    pub fn successful(&self) -> bool {
        matches!(self, FetchResult::Successful(_))
    }

    /// True if every attempt was rejected
    pub fn failed(&self) -> bool {
        matches!(self, FetchResult::Failed)
    }

    /// True if the item was suppressed by a poison marker
    pub fn skipped(&self) -> bool {
        matches!(self, FetchResult::Skipped)
    }
}
