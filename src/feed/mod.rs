//! Upstream feed retrieval and parsing.
//!
//! - [`model`] - in-memory representation of a fetched feed (`SourceFeed`)
//! - [`parser`] - RSS/Atom parsing built on `quick-xml`, including the iTunes
//!   podcast namespace
//! - [`fetcher`] - HTTP retrieval with a timeout and a body size cap
//!
//! # Example
//!
//! ```ignore
//! use feedmerge::feed::{fetch_feed, FetchLimits};
//!
//! let client = reqwest::Client::new();
//! let feed = fetch_feed(&client, "https://example.com/rss", FetchLimits::default()).await?;
//! println!("{} episodes", feed.entries.len());
//! ```

mod fetcher;
mod model;
mod parser;

pub use fetcher::{fetch_feed, FetchError, FetchLimits, DEFAULT_MAX_FEED_SIZE, DEFAULT_TIMEOUT};
pub use model::{
    Category, Image, Link, Person, SourceEntry, SourceFeed, Summary, ITUNES_CATEGORY_SCHEME,
};
pub use parser::{parse_feed, ParseError};
