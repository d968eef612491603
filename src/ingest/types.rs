// src/ingest/types.rs
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// One normalized piece of content, whatever feed format it came from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Item {
    pub source: String,    // "arxiv" | "rss"
    pub source_id: String, // id of the configured source
    pub title: String,
    pub summary: String,
    pub url: String,
    /// Kept exactly as the feed wrote it; never parsed.
    pub published: String,
    pub authors: Vec<String>,
    pub fetched_at: String,
}

/// One line of `errors.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorRecord {
    pub source_id: String,
    pub kind: String,
    pub error: String,
}

/// RFC 3339 UTC timestamp with microseconds, e.g. `2026-02-05T19:42:57.123456+00:00`.
pub fn fetched_at_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
