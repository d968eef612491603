// src/ingest/providers/arxiv.rs
use anyhow::{Context, Result};
use metrics::{counter, histogram};
use reqwest::Url;
use std::collections::HashMap;
use tracing::debug;

use crate::config::{ArxivParams, SourceConfig};
use crate::ingest::fetch::write_raw;
use crate::ingest::filter::KeywordFilter;
use crate::ingest::types::{fetched_at_now, Item};
use crate::ingest::xml::{parse_document, Element, ATOM_NS};
use crate::ingest::CollectContext;

pub const ARXIV_API: &str = "https://export.arxiv.org/api/query";
const ATOM: Option<&str> = Some(ATOM_NS);

/// Export API URL for a query, capped at `max_results`.
pub fn api_url(params: &ArxivParams, max_results: usize) -> Result<Url> {
    Url::parse_with_params(
        ARXIV_API,
        &[
            ("search_query", params.query.clone()),
            ("start", "0".to_string()),
            ("max_results", max_results.to_string()),
            ("sortBy", params.sort_by.clone()),
            ("sortOrder", params.sort_order.clone()),
        ],
    )
    .context("building arxiv api url")
}

/// Fetch (or read the offline fixture), capture raw, parse and filter.
pub async fn collect(
    source: &SourceConfig,
    params: &ArxivParams,
    ctx: &CollectContext<'_>,
) -> Result<Vec<Item>> {
    if params.query.is_empty() {
        debug!(source_id = %source.id, "arxiv source has no query; skipping");
        return Ok(Vec::new());
    }

    let bytes = if params.offline || ctx.offline {
        debug!(
            source_id = %source.id,
            fixture = %params.fixture_path.display(),
            "arxiv offline fixture"
        );
        tokio::fs::read(&params.fixture_path)
            .await
            .with_context(|| format!("reading arxiv fixture {}", params.fixture_path.display()))?
    } else {
        let url = api_url(params, source.max_results)?;
        ctx.fetcher.fetch(url.as_str()).await?
    };

    write_raw(&ctx.raw_dir.join(format!("{}.atom.xml", source.id)), &bytes)?;

    parse_entries(&bytes, &source.id, &KeywordFilter::new(&source.filter))
}

/// Parse an arXiv Atom response. Every accepted entry is returned; the cap
/// lives in the request, not here.
pub fn parse_entries(bytes: &[u8], source_id: &str, filter: &KeywordFilter) -> Result<Vec<Item>> {
    let t0 = std::time::Instant::now();
    let root = parse_document(bytes).context("parsing arxiv atom xml")?;

    let mut out = Vec::new();
    for entry in root.children_named(ATOM, "entry") {
        let title = entry.child_text(ATOM, "title");
        let summary = entry.child_text(ATOM, "summary");
        if !filter.accepts(&title, &summary) {
            continue;
        }

        let mut published = entry.child_text(ATOM, "published");
        if published.is_empty() {
            published = entry.child_text(ATOM, "updated");
        }

        let links = links_by_rel(entry);
        let url = links
            .get("alternate")
            .or_else(|| links.get("related"))
            .cloned()
            .unwrap_or_default();

        let authors = entry
            .children_named(ATOM, "author")
            .map(|a| a.child_text(ATOM, "name"))
            .filter(|n| !n.is_empty())
            .collect();

        out.push(Item {
            source: "arxiv".to_string(),
            source_id: source_id.to_string(),
            title,
            summary,
            url,
            published,
            authors,
            fetched_at: fetched_at_now(),
        });
    }

    histogram!("collect_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
    counter!("collect_items_total").increment(out.len() as u64);
    Ok(out)
}

/// rel -> href for links with a non-empty href; a missing rel means
/// `alternate` and later links overwrite earlier ones with the same rel.
fn links_by_rel(entry: &Element) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for link in entry.children_named(ATOM, "link") {
        let href = link.attr("href").unwrap_or_default().trim();
        if href.is_empty() {
            continue;
        }
        let rel = link.attr("rel").filter(|r| !r.is_empty()).unwrap_or("alternate").trim();
        out.insert(rel.to_string(), href.to_string());
    }
    out
}
