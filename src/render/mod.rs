//! Serialization of a [`MergedFeed`](crate::merge::MergedFeed) to RSS 2.0
//! and Atom 1.0, both carrying the iTunes podcast extension.

mod atom;
mod rss;
mod xml;

use thiserror::Error;

use crate::feed::Category;
use xml::XmlWriter;

pub use atom::render_atom;
pub use rss::render_rss;

pub(crate) const ATOM_NS: &str = "http://www.w3.org/2005/Atom";
pub(crate) const CONTENT_NS: &str = "http://purl.org/rss/1.0/modules/content/";
pub(crate) const ITUNES_NS: &str = "http://www.itunes.com/dtds/podcast-1.0.dtd";

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to write feed XML: {0}")]
    Write(String),
}

fn explicit_flag(explicit: bool) -> &'static str {
    if explicit {
        "true"
    } else {
        "false"
    }
}

/// Writes `itunes:category` elements with subcategories nested in their parent.
fn write_itunes_categories(w: &mut XmlWriter, categories: &[Category]) -> Result<(), RenderError> {
    let itunes: Vec<&Category> = categories.iter().filter(|c| c.is_itunes()).collect();
    for top in itunes.iter().filter(|c| c.parent.is_none()) {
        let text = [("text", top.term.as_str())];
        let children: Vec<&str> = itunes
            .iter()
            .filter(|c| c.parent.as_deref() == Some(top.term.as_str()))
            .map(|c| c.term.as_str())
            .collect();
        if children.is_empty() {
            w.empty("itunes:category", &text)?;
            continue;
        }
        w.start("itunes:category", &text)?;
        for child in children {
            w.empty("itunes:category", &[("text", child)])?;
        }
        w.end("itunes:category")?;
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use crate::feed::{Category, Image, Link, Person, Summary, ITUNES_CATEGORY_SCHEME};
    use crate::merge::{ChannelDescriptor, FeedOrigin, MergedEntry, MergedFeed};
    use crate::render::xml::XmlWriter;
    use chrono::{TimeZone, Utc};

    /// A small merged feed: one public and one personal episode.
    pub(crate) fn sample_feed() -> MergedFeed {
        let host = Person {
            name: Some("Host".into()),
            email: Some("host@example.com".into()),
        };
        let channel = ChannelDescriptor {
            title: "Public Show".into(),
            description: "All about the show".into(),
            subtitle: Some("For supporters".into()),
            itunes_summary: Some("All about the show".into()),
            language: Some("de".into()),
            rights: None,
            generator: "Acast and Patreon".into(),
            ttl: 60,
            links: vec![
                Link {
                    title: Some("Acast Feed".into()),
                    ..Link::alternate("https://show.example.com")
                },
                Link {
                    rel: Some("self".into()),
                    href: "https://public.example.com/rss".into(),
                    media_type: Some("application/rss+xml".into()),
                    length: None,
                    title: Some("Acast Feed".into()),
                },
                Link {
                    rel: Some("related".into()),
                    href: "https://personal.example.com/rss".into(),
                    media_type: Some("application/rss+xml".into()),
                    length: None,
                    title: Some("Patreon Feed".into()),
                },
            ],
            author: host.clone(),
            managing_editor: host.email.clone(),
            owner: host,
            image: Some(Image {
                url: "https://show.example.com/cover.jpg".into(),
                title: None,
                link: None,
            }),
            itunes_image: Some("https://show.example.com/cover.jpg".into()),
            categories: vec![
                Category {
                    term: "Comedy".into(),
                    scheme: Some(ITUNES_CATEGORY_SCHEME.into()),
                    label: None,
                    parent: None,
                },
                Category {
                    term: "Leisure".into(),
                    scheme: Some(ITUNES_CATEGORY_SCHEME.into()),
                    label: None,
                    parent: None,
                },
                Category {
                    term: "Hobbies".into(),
                    scheme: Some(ITUNES_CATEGORY_SCHEME.into()),
                    label: None,
                    parent: Some("Leisure".into()),
                },
            ],
            explicit: Some(false),
            show_type: Some("episodic".into()),
            last_build: Utc.with_ymd_and_hms(2024, 2, 1, 8, 30, 0).unwrap(),
        };

        let public = MergedEntry {
            episode: 1,
            origin: FeedOrigin::Public,
            title: Some("Public one".into()),
            links: vec![
                Link::alternate("https://show.example.com/1"),
                Link {
                    rel: Some("enclosure".into()),
                    href: "https://cdn.example.com/1.mp3".into(),
                    media_type: Some("audio/mpeg".into()),
                    length: Some(1234),
                    title: None,
                },
            ],
            summary: Some(Summary {
                value: "<p>First & best</p>".into(),
                mime_type: "text/html".into(),
            }),
            id: "ep-public-1".into(),
            id_is_permalink: false,
            published: Utc.with_ymd_and_hms(2024, 1, 15, 12, 0, 0).unwrap(),
            season: 1,
            explicit: Some(false),
            duration: Some("30:00".into()),
            episode_type: "full".into(),
            itunes_title: Some("Public one".into()),
            subtitle: None,
            image: None,
        };
        let personal = MergedEntry {
            episode: 2,
            origin: FeedOrigin::Personal,
            title: Some("Personal one".into()),
            links: vec![Link::alternate("https://personal.example.com/posts/2")],
            summary: None,
            id: "https://personal.example.com/posts/2".into(),
            id_is_permalink: true,
            published: Utc.with_ymd_and_hms(2024, 1, 16, 9, 0, 0).unwrap(),
            season: 2,
            explicit: None,
            duration: None,
            episode_type: "bonus".into(),
            itunes_title: None,
            subtitle: Some("Extra".into()),
            image: Some("https://personal.example.com/2.jpg".into()),
        };

        MergedFeed {
            channel,
            entries: vec![public, personal],
        }
    }

    #[test]
    fn test_itunes_subcategory_nested_in_parent() {
        let mut w = XmlWriter::new();
        super::write_itunes_categories(&mut w, &sample_feed().channel.categories).unwrap();
        let xml = String::from_utf8(w.finish()).unwrap();
        let compact: String = xml.split_whitespace().collect::<Vec<_>>().join(" ");
        assert_eq!(
            compact,
            r#"<itunes:category text="Comedy"/> <itunes:category text="Leisure"> <itunes:category text="Hobbies"/> </itunes:category>"#
        );
    }

    #[test]
    fn test_explicit_flag() {
        assert_eq!(super::explicit_flag(true), "true");
        assert_eq!(super::explicit_flag(false), "false");
    }
}
