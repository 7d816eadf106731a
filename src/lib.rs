//! Merges a public podcast feed with a per-subscriber feed and serves the
//! result as RSS 2.0 or Atom 1.0.

pub mod cache;
pub mod config;
pub mod feed;
pub mod merge;
pub mod render;
pub mod server;
pub mod service;
