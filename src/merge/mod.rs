//! Builds one merged podcast feed out of a public and a personalized feed.
//!
//! - [`reconcile`](reconcile::reconcile) folds both channels into one
//!   [`ChannelDescriptor`], taking nearly everything from the public feed
//! - [`merge_entries`] interleaves both episode lists by publish date and
//!   numbers them
//!
//! The result is a [`MergedFeed`], which is immutable once built and is what
//! the cache stores and the renderers consume.

mod entries;
mod reconcile;

use chrono::{DateTime, Utc};
use std::fmt;

use crate::feed::SourceFeed;

pub use entries::{merge_entries, MalformedEntryError, MergedEntry};
pub use reconcile::{reconcile, ChannelDescriptor, DEFAULT_TTL};

/// Which upstream feed something came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeedOrigin {
    Public,
    Personal,
}

impl fmt::Display for FeedOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedOrigin::Public => f.write_str("public"),
            FeedOrigin::Personal => f.write_str("personal"),
        }
    }
}

/// Human-facing names used in the merged channel and in error details.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLabels {
    /// Default title for links re-emitted from the public feed.
    pub public: String,
    /// Title of the `related` link pointing at the personalized feed.
    pub personal: String,
    /// Value of the merged feed's `<generator>`.
    pub generator: String,
}

impl Default for SourceLabels {
    fn default() -> Self {
        Self {
            public: "Acast Feed".to_string(),
            personal: "Patreon Feed".to_string(),
            generator: "Acast and Patreon".to_string(),
        }
    }
}

/// The unified feed: one channel plus the ordered, numbered episodes.
#[derive(Debug, Clone)]
pub struct MergedFeed {
    pub channel: ChannelDescriptor,
    pub entries: Vec<MergedEntry>,
}

impl MergedFeed {
    /// Reconciles both channels and merges both entry lists.
    ///
    /// `now` becomes the channel's last build date.
    pub fn build(
        mut public: SourceFeed,
        mut personal: SourceFeed,
        labels: &SourceLabels,
        now: DateTime<Utc>,
    ) -> Self {
        let public_entries = std::mem::take(&mut public.entries);
        let personal_entries = std::mem::take(&mut personal.entries);

        let channel = reconcile(&public, &personal, labels, now);
        let entries = merge_entries(public_entries, personal_entries);

        Self { channel, entries }
    }
}
