// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod board;
pub mod config;
pub mod digest;
pub mod github;
pub mod ingest;
pub mod run;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::digest::render_digest;
pub use crate::ingest::fetch::{Fetch, HttpFetcher};
pub use crate::ingest::types::{ErrorRecord, Item};
pub use crate::ingest::{collect_items, CollectContext};
pub use crate::run::{run_topic, shortlist, RunOptions, TopicRunReport};
