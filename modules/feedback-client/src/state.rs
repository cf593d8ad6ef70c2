//! Loader state and the pure reducer that transforms it.
//!
//! Async fetches never touch state directly: they produce a `LoaderEvent`
//! that `reduce` applies in one step.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::FeedbackItem;

/// Which way a fetch pages relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Construction-time fetch of `[start, initial_date)`.
    Initial,
    /// Older items, below the cache minimum.
    Older,
    /// Newer items, above the cache maximum.
    Newer,
}

/// A hydrated page plus its pagination metadata.
#[derive(Debug, Clone, Default)]
pub struct FetchedPage {
    pub items: Vec<FeedbackItem>,
    pub has_next_page: bool,
    pub hits: u64,
}

#[derive(Debug, Clone)]
pub enum LoaderEvent {
    FetchStarted(Direction),
    PageArrived {
        direction: Direction,
        page: FetchedPage,
        now: DateTime<Utc>,
    },
    FetchFailed(Direction),
    FeedbackReplaced { key: i64, item: FeedbackItem },
    FeedbackRemoved { key: i64 },
    Reanchored { initial_date: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub struct LoaderState {
    cache: BTreeMap<i64, FeedbackItem>,
    initial_date: DateTime<Utc>,
    pub has_more: Option<bool>,
    pub has_prev: Option<bool>,
    pub total_hits: Option<u64>,
    pub is_fetching: bool,
    pub is_fetching_next: bool,
    pub is_fetching_prev: bool,
    /// Bumped on every cache or anchor mutation.
    pub version: u64,
}

impl LoaderState {
    pub fn new(initial_date: DateTime<Utc>) -> Self {
        Self {
            cache: BTreeMap::new(),
            initial_date,
            has_more: None,
            has_prev: None,
            total_hits: None,
            is_fetching: false,
            is_fetching_next: false,
            is_fetching_prev: false,
            version: 0,
        }
    }

    pub fn initial_date(&self) -> DateTime<Utc> {
        self.initial_date
    }

    /// Number of cached items, visible or not.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Cached items older than the anchor, newest first. Recomputed from the
    /// cache on every call; clone the iterator to walk it again.
    pub fn visible(&self) -> impl DoubleEndedIterator<Item = &FeedbackItem> + Clone + '_ {
        self.cache
            .range(..self.initial_date.timestamp_millis())
            .rev()
            .map(|(_, item)| item)
    }

    pub fn feedbacks(&self) -> Vec<FeedbackItem> {
        self.visible().cloned().collect()
    }

    pub fn min_datetime(&self) -> Option<DateTime<Utc>> {
        self.cache
            .first_key_value()
            .and_then(|(key, _)| DateTime::from_timestamp_millis(*key))
    }

    pub fn max_datetime(&self) -> Option<DateTime<Utc>> {
        self.cache
            .last_key_value()
            .and_then(|(key, _)| DateTime::from_timestamp_millis(*key))
    }

    /// Cache key of the visible item with this id.
    pub fn visible_key(&self, feedback_id: &str) -> Option<i64> {
        self.visible()
            .find(|item| item.feedback_id == feedback_id)
            .map(|item| item.timestamp_key())
    }

    pub fn snapshot(&self) -> LoaderSnapshot {
        LoaderSnapshot {
            feedbacks: self.feedbacks(),
            has_more: self.has_more,
            has_prev: self.has_prev,
            total_hits: self.total_hits,
            is_fetching_next: self.is_fetching_next,
            is_fetching_prev: self.is_fetching_prev,
            initial_date: self.initial_date,
            version: self.version,
        }
    }

    fn set_direction_flag(&mut self, direction: Direction, on: bool) {
        match direction {
            Direction::Initial => {}
            Direction::Older => self.is_fetching_next = on,
            Direction::Newer => self.is_fetching_prev = on,
        }
    }
}

/// Point-in-time copy of the loader's observable state, handed to subscribers.
#[derive(Debug, Clone, Serialize)]
pub struct LoaderSnapshot {
    pub feedbacks: Vec<FeedbackItem>,
    pub has_more: Option<bool>,
    pub has_prev: Option<bool>,
    pub total_hits: Option<u64>,
    pub is_fetching_next: bool,
    pub is_fetching_prev: bool,
    pub initial_date: DateTime<Utc>,
    pub version: u64,
}

/// Apply one event. No I/O.
pub fn reduce(state: &mut LoaderState, event: &LoaderEvent) {
    match event {
        LoaderEvent::FetchStarted(direction) => {
            state.is_fetching = true;
            state.set_direction_flag(*direction, true);
        }
        LoaderEvent::PageArrived {
            direction,
            page,
            now,
        } => {
            for item in &page.items {
                state.cache.insert(item.timestamp_key(), item.clone());
            }
            state.version += 1;
            state.is_fetching = false;
            state.set_direction_flag(*direction, false);

            match direction {
                Direction::Initial | Direction::Older => {
                    if *direction == Direction::Initial {
                        state.total_hits = Some(page.hits);
                    }
                    // Anything cached in the past may have older neighbours.
                    let oldest_in_past = state.min_datetime().is_some_and(|min| min < *now);
                    state.has_more = Some(page.has_next_page || oldest_in_past);
                }
                Direction::Newer => {
                    let newest_in_past = state.max_datetime().is_some_and(|max| max < *now);
                    state.has_prev = Some(page.has_next_page || newest_in_past);
                }
            }
        }
        LoaderEvent::FetchFailed(direction) => {
            state.is_fetching = false;
            state.set_direction_flag(*direction, false);
        }
        LoaderEvent::FeedbackReplaced { key, item } => {
            state.cache.insert(*key, item.clone());
            state.version += 1;
        }
        LoaderEvent::FeedbackRemoved { key } => {
            if state.cache.remove(key).is_some() {
                state.version += 1;
            }
        }
        LoaderEvent::Reanchored { initial_date } => {
            state.initial_date = *initial_date;
            state.version += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn item(id: &str, at: DateTime<Utc>) -> FeedbackItem {
        FeedbackItem {
            feedback_id: id.to_string(),
            timestamp: at,
            message: None,
            contact_email: None,
            url: None,
            replay_id: None,
            status: None,
            project_id: None,
            extra: Default::default(),
        }
    }

    fn arrived(direction: Direction, items: Vec<FeedbackItem>, has_next_page: bool) -> LoaderEvent {
        LoaderEvent::PageArrived {
            direction,
            page: FetchedPage {
                hits: items.len() as u64,
                items,
                has_next_page,
            },
            now: now(),
        }
    }

    #[test]
    fn test_visible_is_descending_and_below_anchor() {
        let mut state = LoaderState::new(now());
        reduce(
            &mut state,
            &arrived(
                Direction::Initial,
                vec![
                    item("b", now() - Duration::minutes(20)),
                    item("future", now() + Duration::minutes(5)),
                    item("a", now() - Duration::minutes(30)),
                    item("c", now() - Duration::minutes(10)),
                    item("edge", now()),
                ],
                false,
            ),
        );

        let ids: Vec<&str> = state.visible().map(|i| i.feedback_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "b", "a"]);
        assert_eq!(state.cache_len(), 5);

        // Restartable.
        let visible = state.visible();
        assert_eq!(visible.clone().count(), visible.count());
    }

    #[test]
    fn test_same_timestamp_last_write_wins() {
        let at = now() - Duration::minutes(1);
        let mut state = LoaderState::new(now());
        reduce(&mut state, &arrived(Direction::Initial, vec![item("first", at)], false));
        reduce(&mut state, &arrived(Direction::Older, vec![item("second", at)], false));
        assert_eq!(state.feedbacks().len(), 1);
        assert_eq!(state.feedbacks()[0].feedback_id, "second");
    }

    #[test]
    fn test_initial_page_sets_hits_and_has_more() {
        let mut state = LoaderState::new(now());
        reduce(&mut state, &LoaderEvent::FetchStarted(Direction::Initial));
        assert!(state.is_fetching);
        assert!(!state.is_fetching_next);

        let mut event = arrived(
            Direction::Initial,
            vec![item("a", now() - Duration::hours(1))],
            true,
        );
        if let LoaderEvent::PageArrived { page, .. } = &mut event {
            page.hits = 42;
        }
        reduce(&mut state, &event);

        assert_eq!(state.total_hits, Some(42));
        assert_eq!(state.has_more, Some(true));
        assert_eq!(state.has_prev, None);
        assert!(!state.is_fetching);
    }

    #[test]
    fn test_older_page_with_past_minimum_keeps_paging() {
        let mut state = LoaderState::new(now());
        reduce(&mut state, &arrived(Direction::Initial, vec![item("a", now() - Duration::hours(1))], true));
        reduce(&mut state, &LoaderEvent::FetchStarted(Direction::Older));
        assert!(state.is_fetching_next);

        reduce(&mut state, &arrived(Direction::Older, vec![item("b", now() - Duration::hours(2))], false));
        assert_eq!(state.has_more, Some(true));
        assert!(!state.is_fetching_next);
        assert_eq!(state.total_hits, Some(1), "older pages do not touch total_hits");
    }

    #[test]
    fn test_initial_page_without_next_link_keeps_paging_past_items() {
        let mut state = LoaderState::new(now());
        let mut event = arrived(
            Direction::Initial,
            vec![
                item("a", now() - Duration::hours(1)),
                item("b", now() - Duration::hours(2)),
                item("c", now() - Duration::hours(3)),
            ],
            false,
        );
        if let LoaderEvent::PageArrived { page, .. } = &mut event {
            page.hits = 42;
        }
        reduce(&mut state, &event);

        assert_eq!(state.total_hits, Some(42));
        assert_eq!(state.has_more, Some(true));
    }

    #[test]
    fn test_empty_page_without_next_link_ends_paging() {
        let mut state = LoaderState::new(now());
        reduce(&mut state, &arrived(Direction::Initial, vec![], false));
        assert_eq!(state.has_more, Some(false));

        reduce(&mut state, &arrived(Direction::Initial, vec![], true));
        assert_eq!(state.has_more, Some(true));
    }

    #[test]
    fn test_older_page_with_future_minimum_ends_paging() {
        let mut state = LoaderState::new(now() + Duration::hours(2));
        reduce(&mut state, &arrived(Direction::Older, vec![item("a", now() + Duration::hours(1))], false));
        assert_eq!(state.has_more, Some(false));
    }

    #[test]
    fn test_newer_page_sets_has_prev() {
        let mut state = LoaderState::new(now());
        reduce(&mut state, &LoaderEvent::FetchStarted(Direction::Newer));
        assert!(state.is_fetching_prev);

        reduce(&mut state, &arrived(Direction::Newer, vec![], false));
        assert_eq!(state.has_prev, Some(false), "empty cache has no maximum");

        reduce(&mut state, &arrived(Direction::Newer, vec![item("a", now() - Duration::minutes(1))], false));
        assert_eq!(state.has_prev, Some(true), "window can still grow towards now");

        reduce(&mut state, &arrived(Direction::Newer, vec![item("z", now() + Duration::minutes(1))], false));
        assert_eq!(state.has_prev, Some(false));
        assert!(!state.is_fetching_prev);
    }

    #[test]
    fn test_failed_fetch_only_clears_flags() {
        let mut state = LoaderState::new(now());
        reduce(&mut state, &arrived(Direction::Initial, vec![item("a", now() - Duration::hours(1))], true));
        let version = state.version;

        reduce(&mut state, &LoaderEvent::FetchStarted(Direction::Older));
        reduce(&mut state, &LoaderEvent::FetchFailed(Direction::Older));

        assert!(!state.is_fetching);
        assert!(!state.is_fetching_next);
        assert_eq!(state.has_more, Some(true));
        assert_eq!(state.cache_len(), 1);
        assert_eq!(state.version, version);
    }

    #[test]
    fn test_min_max_datetime() {
        let mut state = LoaderState::new(now());
        assert_eq!(state.min_datetime(), None);
        assert_eq!(state.max_datetime(), None);

        let old = now() - Duration::hours(3);
        let new = now() - Duration::hours(1);
        reduce(&mut state, &arrived(Direction::Initial, vec![item("n", new), item("o", old)], false));
        assert_eq!(state.min_datetime(), Some(old));
        assert_eq!(state.max_datetime(), Some(new));
    }

    #[test]
    fn test_reanchor_changes_visible_window() {
        let mut state = LoaderState::new(now() - Duration::hours(2));
        reduce(
            &mut state,
            &arrived(
                Direction::Initial,
                vec![item("old", now() - Duration::hours(3)), item("new", now() - Duration::hours(1))],
                false,
            ),
        );
        assert_eq!(state.feedbacks().len(), 1);

        reduce(&mut state, &LoaderEvent::Reanchored { initial_date: now() });
        assert_eq!(state.feedbacks().len(), 2);
        assert_eq!(state.visible_key("new"), Some((now() - Duration::hours(1)).timestamp_millis()));
    }
}
