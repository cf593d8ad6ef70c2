use std::env;

use crate::error::{FeedbackError, Result};
use crate::query::QueryView;

const DEFAULT_API_URL: &str = "https://sentry.io/api/0";
const DEFAULT_STATS_PERIOD: &str = "24h";

/// Client configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub auth_token: Option<String>,
    pub organization: String,
    pub stats_period: String,
    /// Search string sent as the `query` filter.
    pub search: Option<String>,
}

impl ClientConfig {
    /// Load configuration from environment variables.
    /// `FEEDBACK_ORG` is required; everything else has a default.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            api_url: get("FEEDBACK_API_URL").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            auth_token: get("FEEDBACK_AUTH_TOKEN"),
            organization: get("FEEDBACK_ORG").ok_or_else(|| {
                FeedbackError::Config("FEEDBACK_ORG environment variable is required".to_string())
            })?,
            stats_period: get("FEEDBACK_STATS_PERIOD")
                .unwrap_or_else(|| DEFAULT_STATS_PERIOD.to_string()),
            search: get("FEEDBACK_QUERY"),
        })
    }

    /// Query view described by this config.
    pub fn query_view(&self) -> QueryView {
        let view = QueryView::stats_period(&self.stats_period);
        match self.search {
            Some(ref search) => view.with_filter("query", search),
            None => view,
        }
    }

    /// Log the effective configuration with the token masked.
    pub fn log_redacted(&self) {
        tracing::info!(
            api_url = %self.api_url,
            organization = %self.organization,
            stats_period = %self.stats_period,
            search = self.search.as_deref().unwrap_or(""),
            auth_token = self.auth_token.as_deref().map_or("<unset>", |_| "<redacted>"),
            "Loaded feedback client config"
        );
    }
}
