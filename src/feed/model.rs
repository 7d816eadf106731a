use chrono::{DateTime, Utc};

/// A link object as it appears on a channel or an entry.
///
/// RSS `<link>` text becomes `rel="alternate"`, RSS `<enclosure>` becomes
/// `rel="enclosure"`, and `atom:link` keeps whatever attributes it carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Link {
    pub rel: Option<String>,
    pub href: String,
    pub media_type: Option<String>,
    pub length: Option<u64>,
    pub title: Option<String>,
}

impl Link {
    pub fn alternate(href: impl Into<String>) -> Self {
        Self {
            rel: Some("alternate".to_string()),
            href: href.into(),
            ..Self::default()
        }
    }

    /// The link's relation, with Atom's implicit `alternate` applied.
    pub fn rel(&self) -> &str {
        self.rel.as_deref().unwrap_or("alternate")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Person {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Person {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Image {
    pub url: String,
    pub title: Option<String>,
    pub link: Option<String>,
}

/// A category tag. iTunes categories carry [`ITUNES_CATEGORY_SCHEME`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Category {
    pub term: String,
    pub scheme: Option<String>,
    pub label: Option<String>,
    /// Term of the enclosing iTunes category, for subcategories.
    pub parent: Option<String>,
}

pub const ITUNES_CATEGORY_SCHEME: &str = "http://www.itunes.com/";

impl Category {
    pub fn is_itunes(&self) -> bool {
        self.scheme.as_deref() == Some(ITUNES_CATEGORY_SCHEME)
    }
}


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub value: String,
    pub mime_type: String,
}

/// One fetched and parsed feed document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceFeed {
    pub title: Option<String>,
    pub description: Option<String>,
    pub subtitle: Option<String>,
    pub language: Option<String>,
    pub rights: Option<String>,
    pub ttl: Option<u32>,
    pub author: Person,
    pub image: Option<Image>,
    pub links: Vec<Link>,
    pub categories: Vec<Category>,
    pub explicit: Option<bool>,
    pub show_type: Option<String>,
    pub entries: Vec<SourceEntry>,
}

impl SourceFeed {
    /// The href of the first `rel="self"` link, if any.
    pub fn self_link(&self) -> Option<&str> {
        self.links
            .iter()
            .find(|l| l.rel() == "self")
            .map(|l| l.href.as_str())
    }
}

/// One episode as published upstream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceEntry {
    pub title: Option<String>,
    pub links: Vec<Link>,
    pub summary: Option<Summary>,
    pub id: String,
    pub id_is_permalink: bool,
    pub published: Option<DateTime<Utc>>,
    pub season: Option<u32>,
    pub explicit: Option<bool>,
    pub duration: Option<String>,
    pub episode_type: Option<String>,
    pub itunes_title: Option<String>,
    pub subtitle: Option<String>,
    pub image: Option<String>,
}
