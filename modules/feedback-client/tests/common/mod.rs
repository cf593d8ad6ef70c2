// In-memory FeedbackApi for loader and list tests.
//
// Responses are queued in order; an exhausted queue answers with an empty
// page. `hold_next_request()` parks the next call until `release()` so tests
// can observe a fetch while it is in flight.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio::sync::Notify;

use feedback_client::{FeedbackApi, FeedbackError, FeedbackPage, ListRequest, RawFeedbackItem};

pub const NEXT_LINK: &str = "<https://sentry.io/api/0/organizations/acme/feedback/?cursor=0:0:1>; rel=\"previous\"; results=\"false\"; cursor=\"0:0:1\", <https://sentry.io/api/0/organizations/acme/feedback/?cursor=0:10:0>; rel=\"next\"; results=\"true\"; cursor=\"0:10:0\"";
pub const LAST_LINK: &str = "<https://sentry.io/api/0/organizations/acme/feedback/?cursor=0:0:1>; rel=\"previous\"; results=\"false\"; cursor=\"0:0:1\", <https://sentry.io/api/0/organizations/acme/feedback/?cursor=0:10:0>; rel=\"next\"; results=\"false\"; cursor=\"0:10:0\"";

pub struct MockFeedbackApi {
    responses: Mutex<VecDeque<Result<FeedbackPage, FeedbackError>>>,
    requests: Mutex<Vec<(String, ListRequest)>>,
    hold: AtomicBool,
    entered: Notify,
    released: Notify,
}

impl MockFeedbackApi {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            hold: AtomicBool::new(false),
            entered: Notify::new(),
            released: Notify::new(),
        }
    }

    pub fn respond(self, page: FeedbackPage) -> Self {
        self.push(Ok(page));
        self
    }

    pub fn push(&self, response: Result<FeedbackPage, FeedbackError>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<(String, ListRequest)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn last_request(&self) -> ListRequest {
        self.requests
            .lock()
            .unwrap()
            .last()
            .map(|(_, r)| r.clone())
            .expect("no request recorded")
    }

    pub fn hold_next_request(&self) {
        self.hold.store(true, Ordering::SeqCst);
    }

    /// Resolves once a held request has reached the transport.
    pub async fn wait_until_in_flight(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.released.notify_one();
    }
}

#[async_trait]
impl FeedbackApi for MockFeedbackApi {
    async fn list_feedback(
        &self,
        organization: &str,
        request: &ListRequest,
    ) -> Result<FeedbackPage, FeedbackError> {
        self.requests
            .lock()
            .unwrap()
            .push((organization.to_string(), request.clone()));

        if self.hold.swap(false, Ordering::SeqCst) {
            self.entered.notify_one();
            self.released.notified().await;
        }

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(FeedbackPage::default()))
    }
}

pub fn record(id: &str, at: DateTime<Utc>) -> RawFeedbackItem {
    RawFeedbackItem {
        feedback_id: id.to_string(),
        timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
        message: Some(format!("feedback {id}")),
        contact_email: None,
        url: None,
        replay_id: None,
        status: Some("unresolved".to_string()),
        project_id: None,
        extra: Default::default(),
    }
}

pub fn page(records: Vec<RawFeedbackItem>, hits: &str, link: Option<&str>) -> FeedbackPage {
    FeedbackPage {
        records,
        hits_header: Some(hits.to_string()),
        link_header: link.map(String::from),
    }
}

/// Now, truncated to whole milliseconds so it survives a cache round trip.
pub fn now_millis() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(Utc::now().timestamp_millis()).unwrap()
}
