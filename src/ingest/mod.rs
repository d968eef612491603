// src/ingest/mod.rs
pub mod fetch;
pub mod filter;
pub mod providers;
pub mod types;
pub mod xml;

use anyhow::Result;
use metrics::{describe_counter, describe_histogram};
use once_cell::sync::OnceCell;
use std::path::Path;
use tracing::debug;

use crate::config::{SourceConfig, SourceKind};
use crate::ingest::fetch::Fetch;
use crate::ingest::types::Item;

/// One-time metrics registration (so series show up once a recorder is installed).
pub(crate) fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!(
            "collect_items_total",
            "Items accepted by the keyword filter, all sources."
        );
        describe_counter!(
            "collect_source_errors_total",
            "Sources whose fetch or parse failed."
        );
        describe_histogram!("collect_parse_ms", "Feed parse time in milliseconds.");
    });
}

/// Everything a collector needs besides its own source entry.
pub struct CollectContext<'a> {
    /// Directory for raw captures of this (date, topic).
    pub raw_dir: &'a Path,
    /// Run-wide offline toggle; arXiv sources read their fixture instead.
    pub offline: bool,
    pub fetcher: &'a dyn Fetch,
}

/// Route one source to its collector. Unknown kinds collect nothing.
///
/// Errors from fetching or parsing are returned as-is; containing them is the
/// caller's job.
pub async fn collect_items(source: &SourceConfig, ctx: &CollectContext<'_>) -> Result<Vec<Item>> {
    ensure_metrics_described();
    match &source.kind {
        SourceKind::Arxiv(params) => providers::arxiv::collect(source, params, ctx).await,
        SourceKind::Feed(params) => providers::feed::collect(source, params, ctx).await,
        SourceKind::Unknown(kind) => {
            debug!(source_id = %source.id, kind = %kind, "unknown source kind; nothing collected");
            Ok(Vec::new())
        }
    }
}
