use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FeedbackError, Result};

// --- Wire types ---

/// A single feedback record as returned by the feedback list endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawFeedbackItem {
    pub feedback_id: String,
    pub timestamp: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub replay_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    /// Fields this crate does not interpret, kept verbatim.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A feedback record with its timestamp parsed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedbackItem {
    pub feedback_id: String,
    pub timestamp: DateTime<Utc>,
    pub message: Option<String>,
    pub contact_email: Option<String>,
    pub url: Option<String>,
    pub replay_id: Option<String>,
    pub status: Option<String>,
    pub project_id: Option<String>,
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl FeedbackItem {
    /// Cache key: milliseconds since the Unix epoch.
    pub fn timestamp_key(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}

/// Signature of the raw-record hydration step.
pub type Hydrate = fn(RawFeedbackItem) -> Result<FeedbackItem>;

/// Default hydration: parse the ISO-8601 timestamp, move everything else across.
pub fn hydrate_feedback_record(raw: RawFeedbackItem) -> Result<FeedbackItem> {
    let timestamp = DateTime::parse_from_rfc3339(&raw.timestamp)
        .map_err(|e| {
            FeedbackError::Parse(format!(
                "feedback {} has invalid timestamp {:?}: {e}",
                raw.feedback_id, raw.timestamp
            ))
        })?
        .with_timezone(&Utc);

    Ok(FeedbackItem {
        feedback_id: raw.feedback_id,
        timestamp,
        message: raw.message,
        contact_email: raw.contact_email,
        url: raw.url,
        replay_id: raw.replay_id,
        status: raw.status,
        project_id: raw.project_id,
        extra: raw.extra,
    })
}

// --- Request / response ---

/// Server-side ordering of a page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    /// Oldest first (`timestamp`).
    Ascending,
    /// Newest first (`-timestamp`).
    Descending,
}

impl Sort {
    pub fn as_param(&self) -> &'static str {
        match self {
            Sort::Ascending => "timestamp",
            Sort::Descending => "-timestamp",
        }
    }
}

/// Cursor sent with every request. Paging is driven by time windows instead.
pub const RESET_CURSOR: &str = "0:0:0";

/// Query keys the loader always sets itself; filters using them are dropped.
const RESERVED_KEYS: &[&str] = &["statsPeriod", "start", "end", "cursor", "per_page", "sort"];

/// One window request against the feedback list endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ListRequest {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub sort: Sort,
    pub per_page: u32,
    pub filters: Vec<(String, String)>,
}

impl ListRequest {
    /// Query-string pairs in the order they go on the wire.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs: Vec<(String, String)> = self
            .filters
            .iter()
            .filter(|(key, _)| !RESERVED_KEYS.contains(&key.as_str()))
            .cloned()
            .collect();

        pairs.push(("cursor".to_string(), RESET_CURSOR.to_string()));
        pairs.push(("per_page".to_string(), self.per_page.to_string()));
        pairs.push(("sort".to_string(), self.sort.as_param().to_string()));
        pairs.push(("start".to_string(), iso_millis(&self.start)));
        pairs.push(("end".to_string(), iso_millis(&self.end)));
        pairs
    }
}

/// `2024-01-01T00:00:00.000Z`
pub fn iso_millis(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Raw response of one list call: body plus the two metadata headers.
#[derive(Debug, Clone, Default)]
pub struct FeedbackPage {
    pub records: Vec<RawFeedbackItem>,
    /// `X-Hits`
    pub hits_header: Option<String>,
    /// `Link`
    pub link_header: Option<String>,
}
