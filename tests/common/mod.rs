//! Shared upstream fixtures for the integration tests.
//!
//! One `MockServer` plays both upstreams: the public feed at
//! `/public.rss` and the personalized feed at `/personal.rss?auth=...`.

#![allow(dead_code)]

use feedmerge::cache::FeedCache;
use feedmerge::feed::FetchLimits;
use feedmerge::merge::SourceLabels;
use feedmerge::service::{FeedSources, MergeService};
use std::num::NonZeroUsize;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const CREDENTIAL: &str = "supporter-token";

pub const PUBLIC_RSS: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Public Show</title>
    <link>https://show.example.com</link>
    <description>The public episodes</description>
    <atom:link rel="self" href="https://public.example.com/rss" type="application/rss+xml"/>
    <language>en</language>
    <itunes:author>Host</itunes:author>
    <itunes:explicit>no</itunes:explicit>
    <item>
      <title>T1</title>
      <guid isPermaLink="false">t1</guid>
      <pubDate>Mon, 01 Jan 2024 10:00:00 +0000</pubDate>
      <enclosure url="https://cdn.example.com/t1.mp3" length="100" type="audio/mpeg"/>
    </item>
    <item>
      <title>T3</title>
      <guid isPermaLink="false">t3</guid>
      <pubDate>Wed, 03 Jan 2024 10:00:00 +0000</pubDate>
    </item>
  </channel>
</rss>"#;

pub fn personal_rss(with_self_link: bool) -> String {
    let self_link = if with_self_link {
        r#"<atom:link rel="self" href="https://personal.example.com/rss?auth=x" type="application/rss+xml"/>"#
    } else {
        ""
    };
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0" xmlns:atom="http://www.w3.org/2005/Atom" xmlns:itunes="http://www.itunes.com/dtds/podcast-1.0.dtd">
  <channel>
    <title>Personal Show</title>
    <link>https://personal.example.com</link>
    <description>Supporter episodes</description>
    <itunes:subtitle>For supporters</itunes:subtitle>
    {self_link}
    <item>
      <title>T2</title>
      <guid isPermaLink="false">t2</guid>
      <pubDate>Tue, 02 Jan 2024 10:00:00 +0000</pubDate>
      <itunes:episodeType>bonus</itunes:episodeType>
    </item>
  </channel>
</rss>"#
    )
}

/// The personal feed with only an RSS `<description>`, no `itunes:subtitle`.
pub fn personal_rss_without_subtitle() -> String {
    personal_rss(true).replace("<itunes:subtitle>For supporters</itunes:subtitle>", "")
}

pub fn public_mock(response: ResponseTemplate) -> Mock {
    Mock::given(method("GET"))
        .and(path("/public.rss"))
        .respond_with(response)
}

pub fn personal_mock(credential: &str, response: ResponseTemplate) -> Mock {
    Mock::given(method("GET"))
        .and(path("/personal.rss"))
        .and(query_param("auth", credential))
        .respond_with(response)
}

pub fn rss(body: impl Into<String>) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "application/rss+xml")
        .set_body_string(body.into())
}

/// A service whose upstreams both point at `server`.
pub fn service(server: &MockServer, ttl: Duration) -> MergeService {
    let public = Url::parse(&format!("{}/public.rss", server.uri())).unwrap();
    let personal = format!("{}/personal.rss?auth={{auth}}", server.uri());

    MergeService::new(
        reqwest::Client::new(),
        FeedSources::new(public, personal),
        SourceLabels::default(),
        FetchLimits {
            timeout: Duration::from_secs(5),
            ..FetchLimits::default()
        },
        FeedCache::new(ttl, NonZeroUsize::new(16).unwrap()),
    )
}
