use async_trait::async_trait;

use crate::error::Result;
use crate::types::{FeedbackPage, ListRequest};

/// Transport for the feedback list endpoint.
///
/// Implemented by `FeedbackClient` (HTTP) and by in-memory fakes in tests.
#[async_trait]
pub trait FeedbackApi: Send + Sync {
    /// `GET /organizations/{organization}/feedback/` for one time window.
    async fn list_feedback(&self, organization: &str, request: &ListRequest)
        -> Result<FeedbackPage>;
}
