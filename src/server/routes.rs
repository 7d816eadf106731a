use axum::{
    extract::{Query, State},
    http::header,
    response::{IntoResponse, Response},
};
use secrecy::SecretString;
use serde::Deserialize;

use super::{error::AppError, AppState};
use crate::merge::MergedFeed;
use crate::render::{render_atom, render_rss, RenderError};

const RSS_CONTENT_TYPE: &str = "application/rss+xml; charset=utf-8";
const ATOM_CONTENT_TYPE: &str = "application/atom+xml; charset=utf-8";

/// `?auth=<credential>`. A missing parameter is rejected with 400 by the
/// `Query` extractor.
#[derive(Deserialize)]
pub struct FeedQuery {
    auth: String,
}

#[derive(Debug, Clone, Copy)]
enum FeedFormat {
    Rss,
    Atom,
}

impl FeedFormat {
    fn content_type(self) -> &'static str {
        match self {
            FeedFormat::Rss => RSS_CONTENT_TYPE,
            FeedFormat::Atom => ATOM_CONTENT_TYPE,
        }
    }

    fn render(self, feed: &MergedFeed) -> Result<Vec<u8>, RenderError> {
        match self {
            FeedFormat::Rss => render_rss(feed),
            FeedFormat::Atom => render_atom(feed),
        }
    }
}

pub async fn rss_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, AppError> {
    serve_feed(&state, query, FeedFormat::Rss).await
}

pub async fn atom_feed(
    State(state): State<AppState>,
    Query(query): Query<FeedQuery>,
) -> Result<Response, AppError> {
    serve_feed(&state, query, FeedFormat::Atom).await
}

async fn serve_feed(
    state: &AppState,
    query: FeedQuery,
    format: FeedFormat,
) -> Result<Response, AppError> {
    let credential = SecretString::from(query.auth);
    let feed = state
        .merged_feed(&credential)
        .await
        .map_err(|e| AppError::from_merge(e, state.labels()))?;

    let body = format.render(&feed)?;
    tracing::debug!(format = ?format, bytes = body.len(), "Serving merged feed");

    let cache_control = format!("public, max-age={}", state.cache_ttl().as_secs());
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CACHE_CONTROL, cache_control),
        ],
        body,
    )
        .into_response())
}
