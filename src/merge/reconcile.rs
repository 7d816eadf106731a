use chrono::{DateTime, Utc};

use super::SourceLabels;
use crate::feed::{Category, Image, Link, Person, SourceFeed};

/// TTL advertised when the public feed does not carry one.
pub const DEFAULT_TTL: u32 = 60;

/// Channel-level metadata of the merged feed.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelDescriptor {
    pub title: String,
    pub description: String,
    pub subtitle: Option<String>,
    pub itunes_summary: Option<String>,
    pub language: Option<String>,
    pub rights: Option<String>,
    pub generator: String,
    pub ttl: u32,
    pub links: Vec<Link>,
    pub author: Person,
    pub managing_editor: Option<String>,
    pub owner: Person,
    pub image: Option<Image>,
    pub itunes_image: Option<String>,
    pub categories: Vec<Category>,
    pub explicit: Option<bool>,
    pub show_type: Option<String>,
    pub last_build: DateTime<Utc>,
}

impl ChannelDescriptor {
    /// First `alternate` link, used as the RSS `<link>`.
    pub fn alternate_link(&self) -> Option<&Link> {
        self.links.iter().find(|l| l.rel() == "alternate")
    }
}

/// Folds the public and personalized channels into one descriptor.
///
/// Everything comes from `public` except the subtitle (the public feed format
/// has none) and one extra `related` link pointing at the personalized feed's
/// `self` link. When `personal` has no `self` link, no `related` link is added.
pub fn reconcile(
    public: &SourceFeed,
    personal: &SourceFeed,
    labels: &SourceLabels,
    now: DateTime<Utc>,
) -> ChannelDescriptor {
    let mut links: Vec<Link> = public
        .links
        .iter()
        .map(|link| Link {
            title: link.title.clone().or_else(|| Some(labels.public.clone())),
            ..link.clone()
        })
        .collect();

    match personal.self_link() {
        Some(href) => links.push(Link {
            rel: Some("related".to_string()),
            href: href.to_string(),
            media_type: Some("application/rss+xml".to_string()),
            length: None,
            title: Some(labels.personal.clone()),
        }),
        None => tracing::debug!("Personal feed has no self link, omitting related link"),
    }

    let description = public.description.clone().unwrap_or_default();

    ChannelDescriptor {
        title: public.title.clone().unwrap_or_default(),
        itunes_summary: public.description.clone(),
        description,
        subtitle: personal.subtitle.clone(),
        language: public.language.clone(),
        rights: public.rights.clone(),
        generator: labels.generator.clone(),
        ttl: public.ttl.unwrap_or(DEFAULT_TTL),
        links,
        author: public.author.clone(),
        managing_editor: public.author.email.clone(),
        owner: public.author.clone(),
        image: public.image.clone(),
        itunes_image: public.image.as_ref().map(|i| i.url.clone()),
        categories: public.categories.clone(),
        explicit: public.explicit,
        show_type: public.show_type.clone(),
        last_build: now,
    }
}
