//! Core of a multi-user feed sync server.
//!
//! The crate ingests external RSS/Atom feeds into a shared, deduplicated
//! article store and serves each subscribed user an incremental view of what
//! changed since they last looked, with per-user read state tracked
//! independently of the shared article data.
//!
//! Layers, bottom up:
//!
//! - [`storage`] - sqlx/SQLite persistence for feeds, articles, authors,
//!   subscriptions, and read states
//! - [`feed`] - downloading, parsing, and reconciling feed documents, plus
//!   feed/OPML validity checks
//! - [`sync`] - the incremental fetch protocol (watermarks, read flags)
//! - [`service`] - the operations exposed to API controllers
//!
//! HTTP routing, account creation, and token authentication live outside this
//! crate; callers arrive with a pre-authenticated user id.

pub mod config;
pub mod feed;
pub mod service;
pub mod storage;
pub mod sync;
pub mod util;
