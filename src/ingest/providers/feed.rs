// src/ingest/providers/feed.rs
//! Generic RSS 2.0 / Atom collector.

use anyhow::{Context, Result};
use metrics::{counter, histogram};
use tracing::debug;

use crate::config::{FeedParams, SourceConfig};
use crate::ingest::fetch::write_raw;
use crate::ingest::filter::KeywordFilter;
use crate::ingest::types::{fetched_at_now, Item};
use crate::ingest::xml::{parse_document, Element, ATOM_NS};
use crate::ingest::CollectContext;

const ATOM: Option<&str> = Some(ATOM_NS);

pub async fn collect(
    source: &SourceConfig,
    params: &FeedParams,
    ctx: &CollectContext<'_>,
) -> Result<Vec<Item>> {
    if params.url.is_empty() {
        debug!(source_id = %source.id, "feed source has no url; skipping");
        return Ok(Vec::new());
    }

    let bytes = ctx.fetcher.fetch(&params.url).await?;
    write_raw(&ctx.raw_dir.join(format!("{}.xml", source.id)), &bytes)?;

    parse_feed(
        &bytes,
        &source.id,
        &KeywordFilter::new(&source.filter),
        source.max_results,
    )
}

/// Parse an Atom or RSS 2.0 document, stopping once `max_results` items
/// have passed the filter.
pub fn parse_feed(
    bytes: &[u8],
    source_id: &str,
    filter: &KeywordFilter,
    max_results: usize,
) -> Result<Vec<Item>> {
    let t0 = std::time::Instant::now();
    let root = parse_document(bytes).context("parsing feed xml")?;

    let out = if root.tag().to_lowercase().contains("feed") {
        parse_atom(&root, source_id, filter, max_results)
    } else if let Some(channel) = root.child(None, "channel") {
        parse_rss(channel, source_id, filter, max_results)
    } else {
        Vec::new()
    };

    histogram!("collect_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("collect_items_total").increment(out.len() as u64);
    Ok(out)
}

fn parse_atom(root: &Element, source_id: &str, filter: &KeywordFilter, max: usize) -> Vec<Item> {
    let mut out = Vec::new();
    for entry in root.children_named(ATOM, "entry") {
        let title = entry.first_text(ATOM, &["title"]);
        let summary = entry.first_text(ATOM, &["summary", "content"]);
        // updated first, unlike arXiv
        let published = entry.first_text(ATOM, &["updated", "published"]);
        let url = pick_atom_link(entry);

        if !filter.accepts(&title, &summary) {
            continue;
        }
        out.push(item(source_id, title, summary, url, published));
        if out.len() >= max {
            break;
        }
    }
    out
}

/// First `alternate` link (missing rel counts as alternate); otherwise the
/// first link with any href.
fn pick_atom_link(entry: &Element) -> String {
    let mut fallback: Option<&str> = None;
    for link in entry.children_named(ATOM, "link") {
        let href = link.attr("href").unwrap_or_default().trim();
        if href.is_empty() {
            continue;
        }
        if link.attr("rel").filter(|r| !r.is_empty()).unwrap_or("alternate").trim() == "alternate" {
            return href.to_string();
        }
        fallback.get_or_insert(href);
    }
    fallback.unwrap_or_default().to_string()
}

fn parse_rss(channel: &Element, source_id: &str, filter: &KeywordFilter, max: usize) -> Vec<Item> {
    let mut out = Vec::new();
    for it in channel.children_named(None, "item") {
        let title = it.first_text(None, &["title"]);
        let summary = it.first_text(None, &["description"]);
        let published = it.first_text(None, &["pubDate"]);
        let url = it.first_text(None, &["link"]);

        if !filter.accepts(&title, &summary) {
            continue;
        }
        out.push(item(source_id, title, summary, url, published));
        if out.len() >= max {
            break;
        }
    }
    out
}

fn item(source_id: &str, title: String, summary: String, url: String, published: String) -> Item {
    Item {
        source: "rss".to_string(),
        source_id: source_id.to_string(),
        title,
        summary,
        url,
        published,
        authors: Vec::new(),
        fetched_at: fetched_at_now(),
    }
}
