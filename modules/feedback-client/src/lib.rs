//! Client for the user feedback feed: an HTTP transport, a bidirectional
//! paginated loader with a timestamp-keyed cache, and a row-oriented list
//! adapter on top of it.

pub mod client;
pub mod config;
pub mod error;
pub mod link_header;
pub mod list;
pub mod loader;
pub mod observer;
pub mod query;
pub mod state;
pub mod traits;
pub mod types;

pub use client::FeedbackClient;
pub use config::ClientConfig;
pub use error::{FeedbackError, Result};
pub use list::{FeedbackList, ListSnapshot};
pub use loader::{FeedbackLoader, PER_PAGE};
pub use observer::Subscription;
pub use query::QueryView;
pub use state::{Direction, LoaderSnapshot};
pub use traits::FeedbackApi;
pub use types::{
    hydrate_feedback_record, FeedbackItem, FeedbackPage, ListRequest, RawFeedbackItem, Sort,
};
