use chrono::{DateTime, Utc};
use thiserror::Error;

use super::FeedOrigin;
use crate::feed::{Link, SourceEntry, Summary};

/// Episode type assumed when the source entry carries none.
const DEFAULT_EPISODE_TYPE: &str = "full";
/// Season assumed when the source entry carries none.
const DEFAULT_SEASON: u32 = 1;

/// An entry that cannot take part in the merge.
#[derive(Debug, Error)]
#[error("Entry '{id}' from the {origin} feed has no usable publish date")]
pub struct MalformedEntryError {
    pub id: String,
    pub origin: FeedOrigin,
}

/// One episode of the merged feed.
#[derive(Debug, Clone, PartialEq)]
pub struct MergedEntry {
    /// 1-based position in the merged, date-ordered list.
    pub episode: u32,
    pub origin: FeedOrigin,
    pub title: Option<String>,
    pub links: Vec<Link>,
    pub summary: Option<Summary>,
    pub id: String,
    pub id_is_permalink: bool,
    pub published: DateTime<Utc>,
    pub season: u32,
    pub explicit: Option<bool>,
    pub duration: Option<String>,
    pub episode_type: String,
    pub itunes_title: Option<String>,
    pub subtitle: Option<String>,
    pub image: Option<String>,
}

impl MergedEntry {
    fn from_source(
        entry: SourceEntry,
        origin: FeedOrigin,
        published: DateTime<Utc>,
        episode: u32,
    ) -> Self {
        Self {
            episode,
            origin,
            title: entry.title,
            links: entry.links,
            summary: entry.summary,
            id: entry.id,
            id_is_permalink: entry.id_is_permalink,
            published,
            season: entry.season.unwrap_or(DEFAULT_SEASON),
            explicit: entry.explicit,
            duration: entry.duration,
            episode_type: entry
                .episode_type
                .unwrap_or_else(|| DEFAULT_EPISODE_TYPE.to_string()),
            itunes_title: entry.itunes_title,
            subtitle: entry.subtitle,
            image: entry.image,
        }
    }

    /// Links with `rel="enclosure"`, i.e. the episode's media files.
    pub fn enclosures(&self) -> impl Iterator<Item = &Link> {
        self.links.iter().filter(|l| l.rel() == "enclosure")
    }
}

fn published_at(
    entry: &SourceEntry,
    origin: FeedOrigin,
) -> Result<DateTime<Utc>, MalformedEntryError> {
    entry.published.ok_or_else(|| MalformedEntryError {
        id: entry.id.clone(),
        origin,
    })
}

/// Interleaves public and personal entries by publish date.
///
/// Public entries are placed before personal ones and the list is then
/// stable-sorted by publish date, so entries published at the same instant
/// keep public-before-personal order. Episode numbers are assigned 1..=N in
/// the final order.
///
/// Entries without a publish date are logged and left out; the rest of the
/// merge is unaffected.
pub fn merge_entries(public: Vec<SourceEntry>, personal: Vec<SourceEntry>) -> Vec<MergedEntry> {
    let tagged = public
        .into_iter()
        .map(|e| (FeedOrigin::Public, e))
        .chain(personal.into_iter().map(|e| (FeedOrigin::Personal, e)));

    let mut dated: Vec<(DateTime<Utc>, FeedOrigin, SourceEntry)> = Vec::new();
    for (origin, entry) in tagged {
        match published_at(&entry, origin) {
            Ok(published) => dated.push((published, origin, entry)),
            Err(e) => tracing::warn!(error = %e, "Skipping malformed entry"),
        }
    }

    // `sort_by_key` is stable: equal timestamps keep concatenation order.
    dated.sort_by_key(|(published, _, _)| *published);

    dated
        .into_iter()
        .zip(1u32..)
        .map(|((published, origin, entry), episode)| {
            MergedEntry::from_source(entry, origin, published, episode)
        })
        .collect()
}
