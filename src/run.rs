// src/run.rs
//! Daily run for one topic: collect every enabled source in order, keep the
//! survivors, write the artifact set.

use anyhow::Result;
use metrics::counter;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{load_topic, TopicConfig};
use crate::digest::render_digest;
use crate::ingest::fetch::Fetch;
use crate::ingest::types::{ErrorRecord, Item};
use crate::ingest::{collect_items, CollectContext};
use crate::store;

pub const ITEMS_FILE: &str = "items.jsonl";
pub const SHORTLIST_FILE: &str = "shortlist.jsonl";
pub const ERRORS_FILE: &str = "errors.jsonl";
pub const DIGEST_FILE: &str = "digest.md";

/// Process-level settings for a run, resolved once by the caller.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub data_dir: PathBuf,
    pub topics_dir: PathBuf,
    /// `YYYY-MM-DD`
    pub date: String,
    pub offline: bool,
}

impl RunOptions {
    pub fn raw_dir(&self, topic_id: &str) -> PathBuf {
        self.data_dir.join("raw").join(&self.date).join(topic_id)
    }

    pub fn processed_dir(&self, topic_id: &str) -> PathBuf {
        processed_dir(&self.data_dir, &self.date, topic_id)
    }
}

pub fn processed_dir(data_dir: &Path, date: &str, topic_id: &str) -> PathBuf {
    data_dir.join("processed").join(date).join(topic_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicRunReport {
    pub topic_id: String,
    pub processed_dir: PathBuf,
    pub items: usize,
    pub shortlisted: usize,
    pub errors: usize,
}

/// First `min(k, len)` items, order kept.
pub fn shortlist(items: &[Item], k: usize) -> &[Item] {
    &items[..k.min(items.len())]
}

/// Load `topics_dir/<topic_id>.toml` and run it. A bad topic file aborts.
pub async fn run_topic(
    opts: &RunOptions,
    topic_id: &str,
    fetcher: &dyn Fetch,
) -> Result<TopicRunReport> {
    let cfg = load_topic(&opts.topics_dir, topic_id)?;
    run_topic_config(opts, &cfg, fetcher).await
}

/// Run an already loaded topic.
///
/// Source failures are logged, appended to `errors.jsonl` and skipped; the
/// errors log is never truncated, so reruns of the same date keep adding to it.
pub async fn run_topic_config(
    opts: &RunOptions,
    cfg: &TopicConfig,
    fetcher: &dyn Fetch,
) -> Result<TopicRunReport> {
    let raw_dir = opts.raw_dir(&cfg.id);
    let processed_dir = opts.processed_dir(&cfg.id);
    store::ensure_dir(&raw_dir)?;
    store::ensure_dir(&processed_dir)?;

    let ctx = CollectContext {
        raw_dir: &raw_dir,
        offline: opts.offline,
        fetcher,
    };

    let mut all_items: Vec<Item> = Vec::new();
    let mut errors = 0usize;
    for src in cfg.sources.iter().filter(|s| s.enabled) {
        match collect_items(src, &ctx).await {
            Ok(mut items) => {
                info!(
                    topic = %cfg.id,
                    source_id = %src.id,
                    items = items.len(),
                    "source collected"
                );
                all_items.append(&mut items);
            }
            Err(e) => {
                warn!(
                    topic = %cfg.id,
                    source_id = %src.id,
                    kind = %src.declared_kind,
                    error = ?e,
                    "source failed"
                );
                counter!("collect_source_errors_total").increment(1);
                errors += 1;
                let rec = ErrorRecord {
                    source_id: src.id.clone(),
                    kind: src.declared_kind.clone(),
                    error: format!("{e:#}"),
                };
                store::append_jsonl(&processed_dir.join(ERRORS_FILE), &[rec])?;
            }
        }
    }

    let short = shortlist(&all_items, cfg.top_k);
    store::write_jsonl(&processed_dir.join(ITEMS_FILE), &all_items)?;
    store::write_jsonl(&processed_dir.join(SHORTLIST_FILE), short)?;
    store::write_text(
        &processed_dir.join(DIGEST_FILE),
        &render_digest(&cfg.title, &opts.date, short),
    )?;

    info!(
        topic = %cfg.id,
        date = %opts.date,
        items = all_items.len(),
        shortlisted = short.len(),
        errors,
        "topic run finished"
    );

    Ok(TopicRunReport {
        topic_id: cfg.id.clone(),
        processed_dir,
        items: all_items.len(),
        shortlisted: short.len(),
        errors,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items(n: usize) -> Vec<Item> {
        (0..n)
            .map(|i| Item {
                source: "rss".into(),
                source_id: "s".into(),
                title: format!("t{i}"),
                summary: String::new(),
                url: String::new(),
                published: String::new(),
                authors: vec![],
                fetched_at: String::new(),
            })
            .collect()
    }

    #[test]
    fn shortlist_is_a_prefix() {
        let all = items(5);
        for k in 0..8 {
            let s = shortlist(&all, k);
            assert_eq!(s.len(), k.min(5));
            assert_eq!(s, &all[..s.len()]);
        }
        assert!(shortlist(&[], 3).is_empty());
    }

    #[test]
    fn paths_partition_by_date_then_topic() {
        let opts = RunOptions {
            data_dir: PathBuf::from("data"),
            topics_dir: PathBuf::from("topics"),
            date: "2024-05-01".into(),
            offline: false,
        };
        assert_eq!(opts.raw_dir("ai"), PathBuf::from("data/raw/2024-05-01/ai"));
        assert_eq!(
            opts.processed_dir("ai"),
            PathBuf::from("data/processed/2024-05-01/ai")
        );
    }
}
