use super::xml::{attrs, XmlWriter};
use super::{
    explicit_flag, write_itunes_categories, RenderError, ATOM_NS, CONTENT_NS, ITUNES_NS,
};
use crate::feed::{Link, Person};
use crate::merge::{ChannelDescriptor, MergedEntry, MergedFeed};

/// Serializes a merged feed as RSS 2.0 with the iTunes podcast extension.
pub fn render_rss(feed: &MergedFeed) -> Result<Vec<u8>, RenderError> {
    let mut w = XmlWriter::new();
    w.declaration()?;
    w.start(
        "rss",
        &[
            ("xmlns:atom", ATOM_NS),
            ("xmlns:content", CONTENT_NS),
            ("xmlns:itunes", ITUNES_NS),
            ("version", "2.0"),
        ],
    )?;
    w.start("channel", &[])?;

    write_channel(&mut w, &feed.channel)?;
    for entry in &feed.entries {
        write_item(&mut w, entry)?;
    }

    w.end("channel")?;
    w.end("rss")?;
    Ok(w.finish())
}

fn write_channel(w: &mut XmlWriter, channel: &ChannelDescriptor) -> Result<(), RenderError> {
    let home = channel
        .alternate_link()
        .or_else(|| channel.links.first())
        .map(|l| l.href.as_str())
        .unwrap_or_default();

    w.text_element("title", &[], &channel.title)?;
    w.text_element("link", &[], home)?;
    w.text_element("description", &[], &channel.description)?;

    for link in channel.links.iter().filter(|l| l.rel() != "alternate") {
        write_atom_link(w, link)?;
    }
    for category in &channel.categories {
        w.text_element(
            "category",
            &attrs(&[("domain", category.scheme.as_deref())]),
            &category.term,
        )?;
    }

    w.optional("copyright", channel.rights.as_deref())?;
    w.text_element("docs", &[], "http://www.rssboard.org/rss-specification")?;
    w.text_element("generator", &[], &channel.generator)?;

    if let Some(image) = &channel.image {
        w.start("image", &[])?;
        w.text_element("url", &[], &image.url)?;
        w.text_element("title", &[], image.title.as_deref().unwrap_or(&channel.title))?;
        w.text_element("link", &[], image.link.as_deref().unwrap_or(home))?;
        w.end("image")?;
    }

    w.optional("language", channel.language.as_deref())?;
    w.text_element("lastBuildDate", &[], &channel.last_build.to_rfc2822())?;
    if let Some(editor) = managing_editor(channel) {
        w.text_element("managingEditor", &[], &editor)?;
    }
    w.text_element("ttl", &[], &channel.ttl.to_string())?;

    w.optional("itunes:author", channel.author.name.as_deref())?;
    write_itunes_categories(w, &channel.categories)?;
    if let Some(href) = &channel.itunes_image {
        w.empty("itunes:image", &[("href", href.as_str())])?;
    }
    if let Some(explicit) = channel.explicit {
        w.text_element("itunes:explicit", &[], explicit_flag(explicit))?;
    }
    write_owner(w, &channel.owner)?;
    w.optional("itunes:subtitle", channel.subtitle.as_deref())?;
    w.optional("itunes:summary", channel.itunes_summary.as_deref())?;
    w.optional("itunes:type", channel.show_type.as_deref())?;
    Ok(())
}

fn write_item(w: &mut XmlWriter, entry: &MergedEntry) -> Result<(), RenderError> {
    w.start("item", &[])?;

    w.optional("title", entry.title.as_deref())?;
    if let Some(link) = entry.links.iter().find(|l| l.rel() == "alternate") {
        w.text_element("link", &[], &link.href)?;
    }
    if let Some(summary) = &entry.summary {
        w.text_element("description", &[], &summary.value)?;
    }

    let permalink = if entry.id_is_permalink { "true" } else { "false" };
    w.text_element("guid", &[("isPermaLink", permalink)], &entry.id)?;

    for enclosure in entry.enclosures() {
        let length = enclosure.length.unwrap_or(0).to_string();
        w.empty(
            "enclosure",
            &attrs(&[
                ("url", Some(enclosure.href.as_str())),
                ("length", Some(length.as_str())),
                ("type", enclosure.media_type.as_deref()),
            ]),
        )?;
    }

    w.text_element("pubDate", &[], &entry.published.to_rfc2822())?;

    w.optional("itunes:title", entry.itunes_title.as_deref())?;
    w.optional("itunes:duration", entry.duration.as_deref())?;
    w.text_element("itunes:episode", &[], &entry.episode.to_string())?;
    w.text_element("itunes:episodeType", &[], &entry.episode_type)?;
    if let Some(explicit) = entry.explicit {
        w.text_element("itunes:explicit", &[], explicit_flag(explicit))?;
    }
    if let Some(href) = &entry.image {
        w.empty("itunes:image", &[("href", href.as_str())])?;
    }
    w.text_element("itunes:season", &[], &entry.season.to_string())?;
    w.optional("itunes:subtitle", entry.subtitle.as_deref())?;

    w.end("item")
}

fn write_atom_link(w: &mut XmlWriter, link: &Link) -> Result<(), RenderError> {
    let length = link.length.map(|l| l.to_string());
    w.empty(
        "atom:link",
        &attrs(&[
            ("href", Some(link.href.as_str())),
            ("rel", Some(link.rel())),
            ("type", link.media_type.as_deref()),
            ("title", link.title.as_deref()),
            ("length", length.as_deref()),
        ]),
    )
}

fn write_owner(w: &mut XmlWriter, owner: &Person) -> Result<(), RenderError> {
    if owner.is_empty() {
        return Ok(());
    }
    w.start("itunes:owner", &[])?;
    w.optional("itunes:name", owner.name.as_deref())?;
    w.optional("itunes:email", owner.email.as_deref())?;
    w.end("itunes:owner")
}

/// RSS wants `email (Name)` here.
fn managing_editor(channel: &ChannelDescriptor) -> Option<String> {
    let email = channel.managing_editor.as_deref()?;
    Some(match channel.author.name.as_deref() {
        Some(name) => format!("{email} ({name})"),
        None => email.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::parse_feed;
    use crate::render::tests::sample_feed;
    use pretty_assertions::assert_eq;

    fn rendered() -> String {
        String::from_utf8(render_rss(&sample_feed()).unwrap()).unwrap()
    }

    #[test]
    fn test_channel_header() {
        let xml = rendered();
        assert!(xml.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(xml.contains(r#"xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd""#));
        assert!(xml.contains("<link>https://show.example.com</link>"));
        assert!(xml.contains("<generator>Acast and Patreon</generator>"));
        assert!(xml.contains("<ttl>60</ttl>"));
        assert!(xml.contains("<managingEditor>host@example.com (Host)</managingEditor>"));
        assert!(xml.contains("<itunes:explicit>false</itunes:explicit>"));
        assert!(xml.contains(r#"<itunes:category text="Comedy"/>"#));
    }

    #[test]
    fn test_related_link_emitted_as_atom_link() {
        let xml = rendered();
        assert!(xml.contains(
            r#"<atom:link href="https://personal.example.com/rss" rel="related" type="application/rss+xml" title="Patreon Feed"/>"#
        ));
    }

    #[test]
    fn test_item_fields() {
        let xml = rendered();
        assert!(xml.contains(r#"<guid isPermaLink="false">ep-public-1</guid>"#));
        assert!(xml.contains(
            r#"<enclosure url="https://cdn.example.com/1.mp3" length="1234" type="audio/mpeg"/>"#
        ));
        assert!(xml.contains("<pubDate>Mon, 15 Jan 2024 12:00:00 +0000</pubDate>"));
        assert!(xml.contains("<itunes:episode>2</itunes:episode>"));
        assert!(xml.contains("<itunes:episodeType>bonus</itunes:episodeType>"));
        assert!(xml.contains("<itunes:duration>30:00</itunes:duration>"));
    }

    #[test]
    fn test_markup_in_summary_is_escaped() {
        let xml = rendered();
        assert!(xml.contains("<description>&lt;p&gt;First &amp; best&lt;/p&gt;</description>"));
    }

    #[test]
    fn test_output_parses_back() {
        let feed = sample_feed();
        let parsed = parse_feed(&render_rss(&feed).unwrap()).unwrap();

        assert_eq!(parsed.title.as_deref(), Some("Public Show"));
        assert_eq!(parsed.subtitle.as_deref(), Some("For supporters"));
        assert_eq!(parsed.explicit, Some(false));

        let titles: Vec<_> = parsed
            .entries
            .iter()
            .map(|e| e.title.clone().unwrap_or_default())
            .collect();
        assert_eq!(titles, vec!["Public one", "Personal one"]);
        assert_eq!(parsed.entries[0].published, Some(feed.entries[0].published));
        assert_eq!(parsed.entries[1].episode_type.as_deref(), Some("bonus"));
        assert_eq!(parsed.entries[0].id, "ep-public-1");
        assert!(!parsed.entries[0].id_is_permalink);
    }

    #[test]
    fn test_nested_itunes_category_parses_back() {
        let xml = rendered();
        assert!(xml.contains(r#"<itunes:category text="Leisure">"#));

        let parsed = parse_feed(xml.as_bytes()).unwrap();
        let hobbies: Vec<_> = parsed
            .categories
            .iter()
            .filter(|c| c.term == "Hobbies" && c.parent.is_some())
            .collect();
        assert_eq!(hobbies.len(), 1);
        assert_eq!(hobbies[0].parent.as_deref(), Some("Leisure"));
    }
}
