use std::time::Duration;

use async_trait::async_trait;

use crate::config::ClientConfig;
use crate::error::{FeedbackError, Result};
use crate::traits::FeedbackApi;
use crate::types::{FeedbackPage, ListRequest, RawFeedbackItem};

const HITS_HEADER: &str = "X-Hits";
const LINK_HEADER: &str = "Link";

pub struct FeedbackClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl FeedbackClient {
    pub fn new(base_url: &str, token: Option<&str>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.map(String::from),
        })
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(&config.api_url, config.auth_token.as_deref())
    }

    fn list_url(&self, organization: &str) -> String {
        format!("{}/organizations/{}/feedback/", self.base_url, organization)
    }
}

#[async_trait]
impl FeedbackApi for FeedbackClient {
    async fn list_feedback(
        &self,
        organization: &str,
        request: &ListRequest,
    ) -> Result<FeedbackPage> {
        let url = self.list_url(organization);
        let mut builder = self.client.get(&url).query(&request.query_pairs());
        if let Some(ref token) = self.token {
            builder = builder.bearer_auth(token);
        }

        let resp = builder.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FeedbackError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let header = |name: &str| {
            resp.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(String::from)
        };
        let hits_header = header(HITS_HEADER);
        let link_header = header(LINK_HEADER);

        let records: Option<Vec<RawFeedbackItem>> = resp.json().await?;
        tracing::debug!(
            organization,
            records = records.as_ref().map_or(0, Vec::len),
            hits = hits_header.as_deref().unwrap_or("-"),
            "Fetched feedback page"
        );

        Ok(FeedbackPage {
            records: records.unwrap_or_default(),
            hits_header,
            link_header,
        })
    }
}
