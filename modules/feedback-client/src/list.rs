//! Row-oriented view over a `FeedbackLoader` for virtualized lists.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::loader::FeedbackLoader;
use crate::observer::Subscription;
use crate::query::QueryView;
use crate::state::LoaderSnapshot;
use crate::traits::FeedbackApi;
use crate::types::FeedbackItem;

/// What a list consumer renders. `ListSnapshot::default()` is the empty list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListSnapshot {
    pub items: Vec<FeedbackItem>,
    pub total_hits: Option<u64>,
    pub is_fetching_next: bool,
    pub is_fetching_prev: bool,
}

impl ListSnapshot {
    fn from_loader(snapshot: &LoaderSnapshot) -> Self {
        Self {
            items: snapshot.feedbacks.clone(),
            total_hits: snapshot.total_hits,
            is_fetching_next: snapshot.is_fetching_next,
            is_fetching_prev: snapshot.is_fetching_prev,
        }
    }

    pub fn count_loaded_rows(&self) -> usize {
        self.items.len()
    }

    pub fn get_row(&self, index: usize) -> Option<&FeedbackItem> {
        self.items.get(index)
    }

    pub fn is_row_loaded(&self, index: usize) -> bool {
        index < self.items.len()
    }
}

pub struct FeedbackList {
    api: Arc<dyn FeedbackApi>,
    loader: FeedbackLoader,
    snapshot: Arc<Mutex<ListSnapshot>>,
    _subscription: Subscription,
}

impl FeedbackList {
    /// Create a loader for `(query, initial_date)`, subscribe to it, and run
    /// its initial fetch.
    pub async fn open(
        api: Arc<dyn FeedbackApi>,
        organization: impl Into<String>,
        query: QueryView,
        initial_date: DateTime<Utc>,
    ) -> Result<Self> {
        let loader = FeedbackLoader::new(api.clone(), organization, query, initial_date);
        let snapshot = Arc::new(Mutex::new(ListSnapshot::default()));

        let subscription = {
            let snapshot = snapshot.clone();
            loader.on_change(move |change| {
                *snapshot.lock().unwrap_or_else(PoisonError::into_inner) =
                    ListSnapshot::from_loader(change);
            })
        };

        loader.load_initial().await?;

        Ok(Self {
            api,
            loader,
            snapshot,
            _subscription: subscription,
        })
    }

    /// Swap in a fresh loader when the query or anchor changed. The previous
    /// loader and its cache are dropped.
    pub async fn retarget(&mut self, query: QueryView, initial_date: DateTime<Utc>) -> Result<()> {
        if *self.loader.query() == query && self.loader.initial_date() == initial_date {
            return Ok(());
        }

        tracing::debug!(organization = %self.loader.organization(), "Query changed, replacing loader");
        let organization = self.loader.organization().to_string();
        *self = Self::open(self.api.clone(), organization, query, initial_date).await?;
        Ok(())
    }

    pub fn snapshot(&self) -> ListSnapshot {
        self.snapshot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn count_loaded_rows(&self) -> usize {
        self.snapshot().count_loaded_rows()
    }

    pub fn get_row(&self, index: usize) -> Option<FeedbackItem> {
        self.snapshot().get_row(index).cloned()
    }

    pub fn is_row_loaded(&self, index: usize) -> bool {
        self.snapshot().is_row_loaded(index)
    }

    /// Request rows `[start_index, stop_index)` by fetching that many older items.
    pub async fn load_more_rows(&self, start_index: usize, stop_index: usize) -> Result<()> {
        let per_page = stop_index.saturating_sub(start_index).max(1);
        let per_page = u32::try_from(per_page).unwrap_or(u32::MAX);
        self.loader.fetch_next(per_page).await
    }

    pub async fn load_newer(&self, per_page: u32) -> Result<()> {
        self.loader.fetch_prev(per_page).await
    }

    pub fn set_feedback(&self, feedback_id: &str, feedback: Option<FeedbackItem>) -> bool {
        self.loader.set_feedback(feedback_id, feedback)
    }

    pub fn total_hits(&self) -> Option<u64> {
        self.snapshot().total_hits
    }

    pub fn is_fetching_next(&self) -> bool {
        self.snapshot().is_fetching_next
    }

    pub fn is_fetching_prev(&self) -> bool {
        self.snapshot().is_fetching_prev
    }

    /// Errors surface as `Err` from the async calls, never as list state.
    pub fn is_error(&self) -> bool {
        false
    }

    pub fn is_loading(&self) -> bool {
        false
    }

    pub fn query(&self) -> &QueryView {
        self.loader.query()
    }

    pub fn loader(&self) -> &FeedbackLoader {
        &self.loader
    }
}
