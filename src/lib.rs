//! Gleaner syncs each registered account's social-graph timelines into a
//! deduplicated SQLite store and materializes per-credential artifacts:
//! an Atom link feed, an OPML outline-of-feeds, and push refreshes.

pub mod config;
pub mod extract;
pub mod feed;
pub mod jobs;
pub mod provider;
pub mod push;
pub mod storage;
pub mod sync;
pub mod util;
