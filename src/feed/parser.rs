use chrono::{DateTime, Utc};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use super::model::{
    Category, Image, Link, Person, SourceEntry, SourceFeed, Summary, ITUNES_CATEGORY_SCHEME,
};

/// SEC-003: Maximum element nesting depth accepted in a feed document.
const MAX_FEED_DEPTH: usize = 64;

/// Errors that can occur while turning a feed body into a [`SourceFeed`].
#[derive(Debug, Error)]
pub enum ParseError {
    /// The body is not well-formed XML.
    #[error("XML parse error: {0}")]
    Xml(String),
    /// The root element is neither `<rss>`, `<rdf:RDF>` nor `<feed>`.
    #[error("Root element <{0}> is not an RSS or Atom feed")]
    NotAFeed(String),
    /// The body contains no root element at all.
    #[error("Document has no root element")]
    Empty,
    /// SEC-003: Nesting depth exceeds safety limit.
    #[error("Feed nesting depth exceeds maximum of {0} levels")]
    MaxDepthExceeded(usize),
}

impl From<quick_xml::Error> for ParseError {
    fn from(e: quick_xml::Error) -> Self {
        ParseError::Xml(e.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flavor {
    Rss,
    Atom,
}

/// Parses an RSS 2.0 (or RSS 1.0/RDF) or Atom 1.0 document.
///
/// Besides the core channel and item elements this reads the iTunes podcast
/// namespace (`itunes:*`), RSS enclosures, `atom:link` elements embedded in
/// RSS, and the `isPermaLink` flag of RSS guids.
///
/// Entries are returned in document order. Entries whose publish date is
/// missing or unparseable are still returned with `published: None`; it is
/// up to the merger to decide what to do with them.
///
/// # Errors
///
/// - [`ParseError::Xml`] if the body is not well-formed XML
/// - [`ParseError::NotAFeed`] if the root element is not a feed
/// - [`ParseError::Empty`] if there is no root element
/// - [`ParseError::MaxDepthExceeded`] for pathologically nested documents
pub fn parse_feed(bytes: &[u8]) -> Result<SourceFeed, ParseError> {
    // SEC-002: quick-xml (0.37) never expands <!ENTITY> declarations; only the
    // five XML builtins are resolved by `unescape()`.
    let mut reader = Reader::from_reader(bytes);
    // Whitespace between text and CDATA is significant; `into_text` trims the
    // element's text once it is complete.
    reader.config_mut().trim_text(false);

    let mut state: Option<FeedState> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let element = Element::read(&e, &reader)?;
                match state.as_mut() {
                    None => state = Some(FeedState::for_root(element)?),
                    Some(s) => s.open(element)?,
                }
            }
            Event::Empty(e) => {
                let element = Element::read(&e, &reader)?;
                match state.as_mut() {
                    None => state = Some(FeedState::for_root(element)?),
                    Some(s) => {
                        s.open(element)?;
                        s.close();
                    }
                }
            }
            Event::Text(t) => {
                if let Some(s) = state.as_mut() {
                    s.text(&t.unescape()?);
                }
            }
            Event::CData(c) => {
                if let Some(s) = state.as_mut() {
                    s.text(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Event::End(_) => {
                if let Some(s) = state.as_mut() {
                    s.close();
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    state.map(FeedState::finish).ok_or(ParseError::Empty)
}

/// An open element: its qualified name, attributes and accumulated text.
struct Element {
    name: String,
    attrs: Vec<(String, String)>,
    text: String,
}

impl Element {
    fn read<R>(e: &BytesStart<'_>, reader: &Reader<R>) -> Result<Self, ParseError> {
        let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
        let mut attrs = Vec::new();
        for attr_result in e.attributes() {
            let attr = match attr_result {
                Ok(attr) => attr,
                Err(err) => {
                    tracing::debug!(element = %name, error = %err, "Skipping malformed attribute");
                    continue;
                }
            };
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .decode_and_unescape_value(reader.decoder())?
                .into_owned();
            attrs.push((key, value));
        }
        Ok(Self {
            name,
            attrs,
            text: String::new(),
        })
    }

    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn local(&self) -> &str {
        local_name(&self.name)
    }

    fn is_itunes(&self) -> bool {
        self.name.starts_with("itunes:")
    }

    /// `atom:link` (or `atom10:link`) embedded in an RSS document.
    fn is_embedded_atom_link(&self) -> bool {
        matches!(self.name.split_once(':'), Some((prefix, "link")) if prefix.starts_with("atom"))
    }

    fn into_text(self) -> Option<String> {
        let trimmed = self.text.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    /// Builds a link from Atom-style attributes.
    fn to_link(&self) -> Option<Link> {
        let href = self.attr("href")?.trim();
        if href.is_empty() {
            return None;
        }
        Some(Link {
            rel: self.attr("rel").map(str::to_string),
            href: href.to_string(),
            media_type: self.attr("type").map(str::to_string),
            length: self.attr("length").and_then(|l| l.trim().parse().ok()),
            title: self.attr("title").map(str::to_string),
        })
    }

    fn to_enclosure(&self) -> Option<Link> {
        let href = self.attr("url")?.trim();
        if href.is_empty() {
            return None;
        }
        Some(Link {
            rel: Some("enclosure".to_string()),
            href: href.to_string(),
            media_type: self.attr("type").map(str::to_string),
            length: self.attr("length").and_then(|l| l.trim().parse().ok()),
            title: None,
        })
    }
}

fn local_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, local)| local)
}

/// Entry being assembled plus fields that only resolve once it closes.
#[derive(Default)]
struct EntryDraft {
    entry: SourceEntry,
    has_guid: bool,
    itunes_summary: Option<String>,
    content: Option<Summary>,
    updated: Option<DateTime<Utc>>,
}

impl EntryDraft {
    fn finish(mut self) -> SourceEntry {
        if self.entry.summary.is_none() {
            self.entry.summary = self.content.or_else(|| {
                self.itunes_summary.map(|value| Summary {
                    value,
                    mime_type: "text/plain".to_string(),
                })
            });
        }
        if self.entry.published.is_none() {
            self.entry.published = self.updated;
        }
        if !self.has_guid && self.entry.id.is_empty() {
            // No guid: identify the episode by its first link, or its title.
            self.entry.id = self
                .entry
                .links
                .first()
                .map(|l| l.href.clone())
                .or_else(|| self.entry.title.clone())
                .unwrap_or_default();
            self.entry.id_is_permalink = false;
        }
        self.entry
    }
}

/// Channel-level values collected from several elements.
#[derive(Default)]
struct ChannelExtras {
    itunes_summary: Option<String>,
    itunes_author: Option<String>,
    itunes_image: Option<String>,
    managing_editor: Option<Person>,
    owner: Person,
    author: Person,
    image_url: Option<String>,
    image_title: Option<String>,
    image_link: Option<String>,
    icon: Option<String>,
}

struct FeedState {
    flavor: Flavor,
    feed: SourceFeed,
    extras: ChannelExtras,
    entry: Option<EntryDraft>,
    stack: Vec<Element>,
}

impl FeedState {
    fn for_root(root: Element) -> Result<Self, ParseError> {
        let flavor = match root.local() {
            "rss" | "RDF" => Flavor::Rss,
            "feed" => Flavor::Atom,
            _ => return Err(ParseError::NotAFeed(root.name)),
        };
        let mut feed = SourceFeed::default();
        if flavor == Flavor::Atom {
            feed.language = root.attr("xml:lang").map(str::to_string);
        }
        Ok(Self {
            flavor,
            feed,
            extras: ChannelExtras::default(),
            entry: None,
            stack: vec![root],
        })
    }

    fn entry_element(&self) -> &'static str {
        match self.flavor {
            Flavor::Rss => "item",
            Flavor::Atom => "entry",
        }
    }

    fn open(&mut self, element: Element) -> Result<(), ParseError> {
        if self.stack.len() >= MAX_FEED_DEPTH {
            return Err(ParseError::MaxDepthExceeded(MAX_FEED_DEPTH));
        }
        if element.local() == self.entry_element() && self.entry.is_none() {
            self.entry = Some(EntryDraft::default());
        }
        // Handled on open so nested subcategories follow their parent.
        if self.entry.is_none() && element.name == "itunes:category" {
            self.push_itunes_category(&element);
        }
        self.stack.push(element);
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some(top) = self.stack.last_mut() {
            top.text.push_str(text);
        }
    }

    fn close(&mut self) {
        let Some(element) = self.stack.pop() else {
            return;
        };
        let parent = self
            .stack
            .last()
            .map(|p| p.name.clone())
            .unwrap_or_default();

        if element.local() == self.entry_element() {
            if let Some(draft) = self.entry.take() {
                self.feed.entries.push(draft.finish());
            }
            return;
        }

        if self.entry.is_some() {
            if local_name(&parent) == self.entry_element() {
                self.entry_field(element);
            }
            return;
        }

        match self.flavor {
            Flavor::Rss => self.rss_channel_field(element, &parent),
            Flavor::Atom => self.atom_feed_field(element, &parent),
        }
    }

    fn rss_channel_field(&mut self, element: Element, parent: &str) {
        match (parent, element.name.as_str()) {
            ("image", "url") => self.extras.image_url = element.into_text(),
            ("image", "title") => self.extras.image_title = element.into_text(),
            ("image", "link") => self.extras.image_link = element.into_text(),
            ("itunes:owner", "itunes:name") => self.extras.owner.name = element.into_text(),
            ("itunes:owner", "itunes:email") => self.extras.owner.email = element.into_text(),
            ("channel", _) => match element.name.as_str() {
                "title" => set_once(&mut self.feed.title, element.into_text()),
                "description" => {
                    // An itunes:subtitle, wherever it appears, takes precedence.
                    let description = element.into_text();
                    set_once(&mut self.feed.subtitle, description.clone());
                    set_once(&mut self.feed.description, description);
                }
                "language" => set_once(&mut self.feed.language, element.into_text()),
                "copyright" => set_once(&mut self.feed.rights, element.into_text()),
                "ttl" => {
                    if let Some(ttl) = element.into_text().and_then(|t| t.parse().ok()) {
                        self.feed.ttl = Some(ttl);
                    }
                }
                "managingEditor" => {
                    self.extras.managing_editor = element.into_text().map(|t| parse_person(&t));
                }
                "link" => {
                    if let Some(href) = element.into_text() {
                        self.feed.links.push(Link::alternate(href));
                    }
                }
                "category" => {
                    let scheme = element.attr("domain").map(str::to_string);
                    if let Some(term) = element.into_text() {
                        self.feed.categories.push(Category {
                            term,
                            scheme,
                            ..Category::default()
                        });
                    }
                }
                _ if element.is_embedded_atom_link() => {
                    if let Some(link) = element.to_link() {
                        self.feed.links.push(link);
                    }
                }
                _ if element.is_itunes() => self.channel_itunes_field(element),
                _ => {}
            },
            _ => {}
        }
    }

    fn atom_feed_field(&mut self, element: Element, parent: &str) {
        match (parent, element.name.as_str()) {
            ("author", "name") => self.extras.author.name = element.into_text(),
            ("author", "email") => self.extras.author.email = element.into_text(),
            ("itunes:owner", "itunes:name") => self.extras.owner.name = element.into_text(),
            ("itunes:owner", "itunes:email") => self.extras.owner.email = element.into_text(),
            ("feed", _) => match element.name.as_str() {
                "title" => set_once(&mut self.feed.title, element.into_text()),
                "subtitle" => {
                    let subtitle = element.into_text();
                    set_once(&mut self.feed.description, subtitle.clone());
                    set_once(&mut self.feed.subtitle, subtitle);
                }
                "rights" => set_once(&mut self.feed.rights, element.into_text()),
                "logo" => self.extras.image_url = element.into_text(),
                "icon" => self.extras.icon = element.into_text(),
                "link" => {
                    if let Some(link) = element.to_link() {
                        self.feed.links.push(link);
                    }
                }
                "category" => {
                    if let Some(term) = element.attr("term").filter(|t| !t.is_empty()) {
                        self.feed.categories.push(Category {
                            term: term.to_string(),
                            scheme: element.attr("scheme").map(str::to_string),
                            label: element.attr("label").map(str::to_string),
                            parent: None,
                        });
                    }
                }
                _ if element.is_itunes() => self.channel_itunes_field(element),
                _ => {}
            },
            _ => {}
        }
    }

    fn channel_itunes_field(&mut self, element: Element) {
        match element.name.as_str() {
            "itunes:image" => {
                self.extras.itunes_image = element.attr("href").map(str::to_string);
            }
            "itunes:summary" => self.extras.itunes_summary = element.into_text(),
            // iTunes subtitle wins over an Atom <subtitle>
            "itunes:subtitle" => {
                if let Some(subtitle) = element.into_text() {
                    self.feed.subtitle = Some(subtitle);
                }
            }
            "itunes:author" => self.extras.itunes_author = element.into_text(),
            "itunes:explicit" => {
                self.feed.explicit = element.into_text().and_then(|t| parse_explicit(&t));
            }
            "itunes:type" => self.feed.show_type = element.into_text(),
            _ => {}
        }
    }

    fn push_itunes_category(&mut self, element: &Element) {
        if let Some(text) = element.attr("text").filter(|t| !t.is_empty()) {
            // Called before `element` is pushed, so the top of the stack is its parent.
            let parent = self
                .stack
                .last()
                .filter(|p| p.name == "itunes:category")
                .and_then(|p| p.attr("text"))
                .map(str::to_string);
            self.feed.categories.push(Category {
                term: text.to_string(),
                scheme: Some(ITUNES_CATEGORY_SCHEME.to_string()),
                label: None,
                parent,
            });
        }
    }

    fn entry_field(&mut self, element: Element) {
        let flavor = self.flavor;
        let Some(draft) = self.entry.as_mut() else {
            return;
        };
        let entry = &mut draft.entry;

        match element.name.as_str() {
            "title" => set_once(&mut entry.title, element.into_text()),
            "link" if flavor == Flavor::Rss => {
                if let Some(href) = element.into_text() {
                    entry.links.push(Link::alternate(href));
                }
            }
            "link" => {
                if let Some(link) = element.to_link() {
                    entry.links.push(link);
                }
            }
            "enclosure" => {
                if let Some(link) = element.to_enclosure() {
                    entry.links.push(link);
                }
            }
            "description" => {
                if let Some(value) = element.into_text() {
                    entry.summary = Some(Summary {
                        value,
                        mime_type: "text/html".to_string(),
                    });
                }
            }
            "summary" => {
                let mime_type = atom_text_mime(element.attr("type"));
                if let Some(value) = element.into_text() {
                    entry.summary = Some(Summary { value, mime_type });
                }
            }
            "content" => {
                let mime_type = atom_text_mime(element.attr("type"));
                if let Some(value) = element.into_text() {
                    draft.content = Some(Summary { value, mime_type });
                }
            }
            "guid" => {
                let permalink = element
                    .attr("isPermaLink")
                    .map_or(true, |v| !v.trim().eq_ignore_ascii_case("false"));
                if let Some(id) = element.into_text() {
                    entry.id = id;
                    entry.id_is_permalink = permalink;
                    draft.has_guid = true;
                }
            }
            "id" => {
                if let Some(id) = element.into_text() {
                    entry.id = id;
                    entry.id_is_permalink = false;
                    draft.has_guid = true;
                }
            }
            "pubDate" | "published" => {
                entry.published = element.into_text().and_then(|t| parse_timestamp(&t));
            }
            "updated" => draft.updated = element.into_text().and_then(|t| parse_timestamp(&t)),
            "itunes:season" => entry.season = element.into_text().and_then(|t| t.parse().ok()),
            "itunes:explicit" => {
                entry.explicit = element.into_text().and_then(|t| parse_explicit(&t));
            }
            "itunes:duration" => entry.duration = element.into_text(),
            "itunes:episodeType" => entry.episode_type = element.into_text(),
            "itunes:title" => entry.itunes_title = element.into_text(),
            "itunes:subtitle" => entry.subtitle = element.into_text(),
            "itunes:summary" => draft.itunes_summary = element.into_text(),
            "itunes:image" => entry.image = element.attr("href").map(str::to_string),
            _ if element.is_embedded_atom_link() => {
                if let Some(link) = element.to_link() {
                    entry.links.push(link);
                }
            }
            _ => {}
        }
    }

    fn finish(mut self) -> SourceFeed {
        let extras = self.extras;
        let feed = &mut self.feed;

        if feed.description.is_none() {
            feed.description = extras.itunes_summary;
        }

        let editor = extras.managing_editor.unwrap_or_default();
        feed.author = Person {
            name: extras
                .author
                .name
                .or(extras.itunes_author)
                .or(editor.name)
                .or(extras.owner.name),
            email: extras.author.email.or(extras.owner.email).or(editor.email),
        };

        let url = extras
            .image_url
            .or(extras.itunes_image)
            .or(extras.icon);
        feed.image = url.map(|url| Image {
            url,
            title: extras.image_title,
            link: extras.image_link,
        });

        self.feed
    }
}

fn set_once(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}

/// Parses an RSS (RFC 2822) or Atom (RFC 3339) timestamp into UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    DateTime::parse_from_rfc2822(raw)
        .or_else(|_| DateTime::parse_from_rfc3339(raw))
        .map(|dt| dt.with_timezone(&Utc))
        .ok()
}

fn parse_explicit(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "yes" | "true" | "explicit" => Some(true),
        "no" | "false" | "clean" => Some(false),
        _ => None,
    }
}

/// Splits an RSS `managingEditor` value of the form `email (Name)`.
fn parse_person(raw: &str) -> Person {
    let raw = raw.trim();
    if let Some((email, name)) = raw.split_once('(') {
        let name = name.trim_end_matches(')').trim();
        let email = email.trim();
        Person {
            name: (!name.is_empty()).then(|| name.to_string()),
            email: (!email.is_empty()).then(|| email.to_string()),
        }
    } else if raw.contains('@') {
        Person {
            name: None,
            email: Some(raw.to_string()),
        }
    } else {
        Person {
            name: Some(raw.to_string()),
            email: None,
        }
    }
}

fn atom_text_mime(kind: Option<&str>) -> String {
    match kind.map(str::trim) {
        None | Some("") | Some("text") => "text/plain".to_string(),
        Some("html") => "text/html".to_string(),
        Some("xhtml") => "application/xhtml+xml".to_string(),
        Some(other) => other.to_string(),
    }
}
