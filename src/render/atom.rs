use chrono::{DateTime, SecondsFormat, Utc};

use super::xml::{attrs, XmlWriter};
use super::{explicit_flag, write_itunes_categories, RenderError, ATOM_NS, ITUNES_NS};
use crate::feed::{Link, Summary};
use crate::merge::{ChannelDescriptor, MergedEntry, MergedFeed};

/// Serializes a merged feed as Atom 1.0 with the iTunes podcast extension.
pub fn render_atom(feed: &MergedFeed) -> Result<Vec<u8>, RenderError> {
    let channel = &feed.channel;
    let mut w = XmlWriter::new();
    w.declaration()?;
    w.start(
        "feed",
        &attrs(&[
            ("xmlns", Some(ATOM_NS)),
            ("xmlns:itunes", Some(ITUNES_NS)),
            ("xml:lang", channel.language.as_deref()),
        ]),
    )?;

    write_header(&mut w, channel)?;
    for entry in &feed.entries {
        write_entry(&mut w, entry)?;
    }

    w.end("feed")?;
    Ok(w.finish())
}

/// The feed id: the `self` link, else the first link, else the title.
fn feed_id(channel: &ChannelDescriptor) -> &str {
    channel
        .links
        .iter()
        .find(|l| l.rel() == "self")
        .or_else(|| channel.links.first())
        .map_or(channel.title.as_str(), |l| l.href.as_str())
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn write_header(w: &mut XmlWriter, channel: &ChannelDescriptor) -> Result<(), RenderError> {
    w.text_element("id", &[], feed_id(channel))?;
    w.text_element("title", &[], &channel.title)?;
    w.text_element("updated", &[], &timestamp(&channel.last_build))?;

    if !channel.author.is_empty() {
        w.start("author", &[])?;
        w.optional("name", channel.author.name.as_deref())?;
        w.optional("email", channel.author.email.as_deref())?;
        w.end("author")?;
    }
    for link in &channel.links {
        write_link(w, link)?;
    }
    for category in &channel.categories {
        w.empty(
            "category",
            &attrs(&[
                ("term", Some(category.term.as_str())),
                ("scheme", category.scheme.as_deref()),
                ("label", category.label.as_deref()),
            ]),
        )?;
    }

    w.text_element("generator", &[], &channel.generator)?;
    if let Some(image) = &channel.image {
        w.text_element("logo", &[], &image.url)?;
    }
    w.optional("rights", channel.rights.as_deref())?;
    if !channel.description.is_empty() {
        w.text_element("subtitle", &[], &channel.description)?;
    }

    w.optional("itunes:author", channel.author.name.as_deref())?;
    write_itunes_categories(w, &channel.categories)?;
    if let Some(href) = &channel.itunes_image {
        w.empty("itunes:image", &[("href", href.as_str())])?;
    }
    if let Some(explicit) = channel.explicit {
        w.text_element("itunes:explicit", &[], explicit_flag(explicit))?;
    }
    if !channel.owner.is_empty() {
        w.start("itunes:owner", &[])?;
        w.optional("itunes:name", channel.owner.name.as_deref())?;
        w.optional("itunes:email", channel.owner.email.as_deref())?;
        w.end("itunes:owner")?;
    }
    w.optional("itunes:subtitle", channel.subtitle.as_deref())?;
    w.optional("itunes:summary", channel.itunes_summary.as_deref())?;
    w.optional("itunes:type", channel.show_type.as_deref())?;
    Ok(())
}

fn write_entry(w: &mut XmlWriter, entry: &MergedEntry) -> Result<(), RenderError> {
    w.start("entry", &[])?;

    let title = entry
        .title
        .as_deref()
        .or(entry.itunes_title.as_deref())
        .unwrap_or_default();
    let published = timestamp(&entry.published);

    w.text_element("id", &[], &entry.id)?;
    w.text_element("title", &[], title)?;
    w.text_element("updated", &[], &published)?;
    for link in &entry.links {
        write_link(w, link)?;
    }
    if let Some(summary) = &entry.summary {
        write_summary(w, summary)?;
    }
    w.text_element("published", &[], &published)?;

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

    w.end("entry")
}

fn write_link(w: &mut XmlWriter, link: &Link) -> Result<(), RenderError> {
    let length = link.length.map(|l| l.to_string());
    w.empty(
        "link",
        &attrs(&[
            ("href", Some(link.href.as_str())),
            ("rel", Some(link.rel())),
            ("type", link.media_type.as_deref()),
            ("title", link.title.as_deref()),
            ("length", length.as_deref()),
        ]),
    )
}

fn write_summary(w: &mut XmlWriter, summary: &Summary) -> Result<(), RenderError> {
    // Escaped XHTML is still valid `html` content.
    let kind = match summary.mime_type.as_str() {
        "text/plain" => "text",
        _ => "html",
    };
    w.text_element("summary", &[("type", kind)], &summary.value)
}
