//! User-selected filter for the feedback list and its time-window resolution.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FeedbackError, Result};

/// Filter selected by the user: a time range plus opaque server-side filters.
///
/// The range is either absolute (`start`/`end`) or relative (`stats_period`,
/// e.g. `"24h"`). `QueryView::default()` selects no range at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryView {
    pub start: Option<String>,
    pub end: Option<String>,
    #[serde(rename = "statsPeriod")]
    pub stats_period: Option<String>,
    /// Passed through verbatim. Keys may repeat.
    #[serde(default)]
    pub filters: Vec<(String, String)>,
}

impl QueryView {
    /// Relative range ending now.
    pub fn stats_period(period: impl Into<String>) -> Self {
        Self {
            stats_period: Some(period.into()),
            ..Default::default()
        }
    }

    /// Absolute range.
    pub fn absolute(start: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            start: Some(start.into()),
            end: Some(end.into()),
            ..Default::default()
        }
    }

    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }

    /// Decode from URL query pairs. `start`, `end` and `statsPeriod` select
    /// the range (empty values count as absent); everything else is a filter.
    pub fn from_query_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut view = QueryView::default();
        for (key, value) in pairs {
            let key = key.into();
            let value = value.into();
            match key.as_str() {
                "start" => assign_non_empty(&mut view.start, value),
                "end" => assign_non_empty(&mut view.end, value),
                "statsPeriod" => assign_non_empty(&mut view.stats_period, value),
                _ => view.filters.push((key, value)),
            }
        }
        view
    }

    /// Whether the view selects a time range the loader can fetch.
    pub fn has_time_range(&self) -> bool {
        non_empty(&self.start).is_some() || non_empty(&self.stats_period).is_some()
    }

    /// Start of the window: absolute `start`, else `now - statsPeriod`.
    pub fn resolve_start(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        if let Some(start) = non_empty(&self.start) {
            return parse_instant(start);
        }
        if let Some(period) = non_empty(&self.stats_period) {
            let duration = parse_stats_period(period)?;
            return now.checked_sub_signed(duration).ok_or_else(|| {
                FeedbackError::InvalidQuery(format!("statsPeriod {period:?} is out of range"))
            });
        }
        Err(FeedbackError::InvalidQuery(
            "must pass either start or statsPeriod".to_string(),
        ))
    }

    /// End of the window: absolute `end`, else `now`.
    pub fn resolve_end(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        match non_empty(&self.end) {
            Some(end) => parse_instant(end),
            None => Ok(now),
        }
    }
}

fn assign_non_empty(slot: &mut Option<String>, value: String) {
    if !value.is_empty() {
        *slot = Some(value);
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Parse a relative period such as `30m`, `24h`, `14d` or `2w`.
pub fn parse_stats_period(period: &str) -> Result<Duration> {
    let digits_end = period
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(period.len());
    let (digits, unit) = period.split_at(digits_end);

    let invalid = || FeedbackError::InvalidQuery(format!("invalid statsPeriod {period:?}"));
    let value: i64 = digits.parse().map_err(|_| invalid())?;

    let duration = match unit {
        "m" => Duration::try_minutes(value),
        "h" => Duration::try_hours(value),
        "d" => Duration::try_days(value),
        "w" => Duration::try_weeks(value),
        _ => None,
    };
    duration.ok_or_else(invalid)
}

/// Parse an absolute instant. Values without an offset are taken as UTC.
pub fn parse_instant(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(value) {
        return Ok(at.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(naive.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            return Ok(midnight.and_utc());
        }
    }
    Err(FeedbackError::InvalidQuery(format!("invalid date {value:?}")))
}
