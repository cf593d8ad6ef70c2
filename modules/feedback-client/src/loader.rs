//! Bidirectional paginated loader over the feedback list endpoint.
//!
//! Items are cached by timestamp. `fetch_next` pages towards older items,
//! `fetch_prev` towards newer ones, and a single in-flight guard is shared by
//! every fetch: a request made while another is outstanding is dropped.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::link_header::{decode_integer, has_next_page};
use crate::observer::{Observers, Subscription};
use crate::query::QueryView;
use crate::state::{reduce, Direction, FetchedPage, LoaderEvent, LoaderSnapshot, LoaderState};
use crate::traits::FeedbackApi;
use crate::types::{hydrate_feedback_record, FeedbackItem, Hydrate, ListRequest, Sort};

/// Default page size.
pub const PER_PAGE: u32 = 10;

pub struct FeedbackLoader {
    api: Arc<dyn FeedbackApi>,
    organization: String,
    query: QueryView,
    hydrate: Hydrate,
    state: Mutex<LoaderState>,
    observers: Observers<LoaderSnapshot>,
}

impl FeedbackLoader {
    /// Build an idle loader. Nothing is fetched until `load_initial`.
    pub fn new(
        api: Arc<dyn FeedbackApi>,
        organization: impl Into<String>,
        query: QueryView,
        initial_date: DateTime<Utc>,
    ) -> Self {
        Self {
            api,
            organization: organization.into(),
            query,
            hydrate: hydrate_feedback_record,
            state: Mutex::new(LoaderState::new(initial_date)),
            observers: Observers::new(),
        }
    }

    /// Build a loader and run its initial fetch.
    pub async fn open(
        api: Arc<dyn FeedbackApi>,
        organization: impl Into<String>,
        query: QueryView,
        initial_date: DateTime<Utc>,
    ) -> Result<Self> {
        let loader = Self::new(api, organization, query, initial_date);
        loader.load_initial().await?;
        Ok(loader)
    }

    /// Replace the raw-record hydration step.
    pub fn with_hydrator(mut self, hydrate: Hydrate) -> Self {
        self.hydrate = hydrate;
        self
    }

    fn state(&self) -> MutexGuard<'_, LoaderState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch `[start, initial_date)` newest first. Does nothing when the
    /// query view selects no time range.
    pub async fn load_initial(&self) -> Result<()> {
        if !self.query.has_time_range() {
            tracing::debug!(organization = %self.organization, "No time range selected, staying idle");
            return Ok(());
        }

        let request = ListRequest {
            start: self.query.resolve_start(Utc::now())?,
            end: self.initial_date(),
            sort: Sort::Descending,
            per_page: PER_PAGE,
            filters: self.query.filters.clone(),
        };
        self.fetch_and_apply(Direction::Initial, request).await
    }

    /// Load items older than everything cached.
    ///
    /// Skipped until the initial fetch has reported that more exist, and
    /// once paging is exhausted.
    pub async fn fetch_next(&self, per_page: u32) -> Result<()> {
        let end = {
            let state = self.state();
            if state.has_more != Some(true) {
                return Ok(());
            }
            state.min_datetime().unwrap_or(state.initial_date())
        };

        let request = ListRequest {
            start: self.query.resolve_start(Utc::now())?,
            end,
            sort: Sort::Descending,
            per_page,
            filters: self.query.filters.clone(),
        };
        self.fetch_and_apply(Direction::Older, request).await
    }

    /// Load items newer than everything cached. Skipped only once a newer
    /// fetch has reported there is nothing left.
    pub async fn fetch_prev(&self, per_page: u32) -> Result<()> {
        let start = {
            let state = self.state();
            if state.has_prev == Some(false) {
                return Ok(());
            }
            state.max_datetime().unwrap_or(state.initial_date())
        };

        let request = ListRequest {
            start,
            end: self.query.resolve_end(Utc::now())?,
            sort: Sort::Ascending,
            per_page,
            filters: self.query.filters.clone(),
        };
        self.fetch_and_apply(Direction::Newer, request).await
    }

    async fn fetch_and_apply(&self, direction: Direction, request: ListRequest) -> Result<()> {
        let Some(page) = self.fetch(direction, &request).await? else {
            return Ok(());
        };

        let snapshot = {
            let mut state = self.state();
            reduce(
                &mut state,
                &LoaderEvent::PageArrived {
                    direction,
                    page,
                    now: Utc::now(),
                },
            );
            state.snapshot()
        };

        tracing::debug!(
            organization = %self.organization,
            ?direction,
            loaded = snapshot.feedbacks.len(),
            has_more = ?snapshot.has_more,
            has_prev = ?snapshot.has_prev,
            "Feedback page applied"
        );
        self.observers.notify(&snapshot);
        Ok(())
    }

    /// Run one request. Returns `Ok(None)` without touching the network when
    /// another fetch is already in flight.
    async fn fetch(&self, direction: Direction, request: &ListRequest) -> Result<Option<FetchedPage>> {
        {
            let mut state = self.state();
            if state.is_fetching {
                tracing::debug!(?direction, "Fetch already in flight, dropping request");
                return Ok(None);
            }
            reduce(&mut state, &LoaderEvent::FetchStarted(direction));
        }

        // Releases the guard on error and when this future is dropped mid-request.
        let in_flight = InFlight {
            loader: self,
            direction,
            settled: false,
        };

        match self.request_page(request).await {
            Ok(page) => {
                in_flight.settle();
                Ok(Some(page))
            }
            Err(e) => {
                tracing::warn!(organization = %self.organization, ?direction, error = %e, "Feedback fetch failed");
                Err(e)
            }
        }
    }

    async fn request_page(&self, request: &ListRequest) -> Result<FetchedPage> {
        tracing::debug!(
            organization = %self.organization,
            start = %request.start,
            end = %request.end,
            sort = request.sort.as_param(),
            per_page = request.per_page,
            "Requesting feedback window"
        );

        let response = self.api.list_feedback(&self.organization, request).await?;

        let hits = decode_integer(response.hits_header.as_deref(), 0);
        let has_next_page = has_next_page(response.link_header.as_deref());
        let items = response
            .records
            .into_iter()
            .map(self.hydrate)
            .collect::<Result<Vec<FeedbackItem>>>()?;

        Ok(FetchedPage {
            items,
            has_next_page,
            hits,
        })
    }

    /// Replace (`Some`) or remove (`None`) the visible item with this id.
    /// The replacement is stored under the old item's timestamp. Returns
    /// `false` when no visible item matches.
    pub fn set_feedback(&self, feedback_id: &str, feedback: Option<FeedbackItem>) -> bool {
        let snapshot = {
            let mut state = self.state();
            let Some(key) = state.visible_key(feedback_id) else {
                return false;
            };
            let event = match feedback {
                Some(item) => LoaderEvent::FeedbackReplaced { key, item },
                None => LoaderEvent::FeedbackRemoved { key },
            };
            reduce(&mut state, &event);
            state.snapshot()
        };

        self.observers.notify(&snapshot);
        true
    }

    /// Move the anchor to the newest cached item so that everything fetched
    /// so far becomes visible. No-op on an empty cache.
    pub fn reset_initial_timestamp(&self) {
        let snapshot = {
            let mut state = self.state();
            let Some(max) = state.max_datetime() else {
                return;
            };
            if max == state.initial_date() {
                return;
            }
            reduce(&mut state, &LoaderEvent::Reanchored { initial_date: max });
            state.snapshot()
        };

        self.observers.notify(&snapshot);
    }

    /// Subscribe to state changes. Keep the returned handle alive for as long
    /// as notifications are wanted.
    pub fn on_change(
        &self,
        handler: impl Fn(&LoaderSnapshot) + Send + Sync + 'static,
    ) -> Subscription {
        self.observers.subscribe(handler)
    }

    pub fn feedbacks(&self) -> Vec<FeedbackItem> {
        self.state().feedbacks()
    }

    pub fn snapshot(&self) -> LoaderSnapshot {
        self.state().snapshot()
    }

    pub fn has_more(&self) -> Option<bool> {
        self.state().has_more
    }

    pub fn has_prev(&self) -> Option<bool> {
        self.state().has_prev
    }

    pub fn total_hits(&self) -> Option<u64> {
        self.state().total_hits
    }

    pub fn is_fetching_next(&self) -> bool {
        self.state().is_fetching_next
    }

    pub fn is_fetching_prev(&self) -> bool {
        self.state().is_fetching_prev
    }

    pub fn initial_date(&self) -> DateTime<Utc> {
        self.state().initial_date()
    }

    /// Number of cached items, including those at or after the anchor.
    pub fn cached_len(&self) -> usize {
        self.state().cache_len()
    }

    pub fn query(&self) -> &QueryView {
        &self.query
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }
}

/// Owns the in-flight guard for one request. Unless settled, dropping it
/// records the request as failed so later fetches are not blocked.
struct InFlight<'a> {
    loader: &'a FeedbackLoader,
    direction: Direction,
    settled: bool,
}

impl InFlight<'_> {
    /// The page arrived; the caller applies it, which clears the guard.
    fn settle(mut self) {
        self.settled = true;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::debug!(direction = ?self.direction, "Feedback fetch abandoned, releasing guard");
            reduce(
                &mut self.loader.state(),
                &LoaderEvent::FetchFailed(self.direction),
            );
        }
    }
}
