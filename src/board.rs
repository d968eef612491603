// src/board.rs
//! Static HTML board over the processed-output tree.
//!
//! Reads `data/processed/<date>/<topic>/{digest.md,shortlist.jsonl}`, the
//! latest imported issue links and the topic list, and writes a page plus
//! its data payload under `docs/boards/`. Presentation only: nothing here
//! fetches or filters.

use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use html_escape::encode_quoted_attribute as h;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::topic::{guess_topic_title, list_topic_ids};
use crate::ingest::types::Item;
use crate::run::{DIGEST_FILE, SHORTLIST_FILE};
use crate::store;

pub const DEFAULT_MAX_DAYS: usize = 14;
const BOARD_TITLE: &str = "postcast · Daily Board";

/// Page style; kept inline so a board is one HTML file plus its data script.
const BOARD_CSS: &str = "\
body{margin:0;font:15px/1.5 system-ui,sans-serif;color:#1d1d1f;background:#f6f6f8}\
.board{max-width:1080px;margin:0 auto;padding:24px}\
.board header h1{margin:0 0 4px}\
.board nav{position:sticky;top:0;background:#f6f6f8;padding:8px 0;border-bottom:1px solid #ddd}\
.board nav a{margin-right:14px;text-decoration:none;color:#0a58ca}\
.board section{margin:28px 0}\
.card{background:#fff;border:1px solid #e3e3e8;border-radius:8px;padding:14px}\
.muted{color:#6e6e73}\
.table{width:100%;border-collapse:collapse}\
.table th,.table td{text-align:left;vertical-align:top;padding:6px 8px;border-bottom:1px solid #eee}\
.kpi-grid{display:grid;grid-template-columns:repeat(auto-fit,minmax(200px,1fr));gap:12px}\
.kpi{background:#fff;border:1px solid #e3e3e8;border-radius:8px;padding:12px}\
.kpi .v{font-size:28px;font-weight:600}";

/// Renders `window[data-var]` into every `[data-board]` element: a header
/// from `meta`, a nav bar and one section per block. Block HTML is trusted;
/// it was escaped when the payload was built.
const BOARD_RENDERER_JS: &str = "\
(function () {
  function el(tag, cls, text) {
    var n = document.createElement(tag);
    if (cls) n.className = cls;
    if (text) n.textContent = text;
    return n;
  }
  document.querySelectorAll('[data-board]').forEach(function (root) {
    var data = window[root.getAttribute('data-var')];
    if (!data || !Array.isArray(data.blocks)) {
      root.appendChild(el('p', 'muted', 'Board data missing.'));
      return;
    }
    var meta = data.meta || {};
    root.className = 'board';
    var header = el('header');
    header.appendChild(el('h1', '', meta.title || 'Board'));
    header.appendChild(el('div', 'muted', [meta.subtitle, meta.generated_at].filter(Boolean).join(' · ')));
    root.appendChild(header);
    var nav = el('nav');
    root.appendChild(nav);
    data.blocks.forEach(function (b) {
      var a = el('a', '', b.nav || b.id);
      a.href = '#' + b.id;
      nav.appendChild(a);
      var sec = el('section');
      sec.id = b.id;
      sec.innerHTML = (b.data && b.data.html) || '';
      root.appendChild(sec);
    });
  });
})();";

#[derive(Debug, Clone)]
pub struct BoardOptions {
    /// Project root holding `data/`, `topics/` and `docs/`.
    pub root: PathBuf,
    pub max_days: usize,
    pub generated_at: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DigestEntry {
    pub date: String,
    pub topic_id: String,
    pub topic_title: String,
    pub has_digest: bool,
    pub has_shortlist: bool,
    pub items: Vec<Item>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueLinks {
    #[serde(default)]
    pub links: Vec<IssueLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueLink {
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone)]
pub struct IssueImport {
    pub path: PathBuf,
    /// `None` when the file could not be parsed.
    pub data: Option<IssueLinks>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoardPaths {
    pub html: PathBuf,
    pub data: PathBuf,
    pub entry: PathBuf,
}

fn sorted_subdirs(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .map(|rd| {
            rd.flatten()
                .filter(|e| e.path().is_dir())
                .filter_map(|e| e.file_name().to_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

/// Newest `max_days` dates, topics sorted within each date.
pub fn collect_digests(root: &Path, max_days: usize) -> Vec<DigestEntry> {
    let base = root.join("data").join("processed");
    let topics_dir = root.join("topics");

    let mut dates = sorted_subdirs(&base);
    dates.reverse();
    dates.truncate(max_days);

    let mut out = Vec::new();
    for date in dates {
        let date_dir = base.join(&date);
        for topic_id in sorted_subdirs(&date_dir) {
            let topic_dir = date_dir.join(&topic_id);
            let digest = topic_dir.join(DIGEST_FILE);
            let shortlist = topic_dir.join(SHORTLIST_FILE);
            if !digest.exists() && !shortlist.exists() {
                continue;
            }
            out.push(DigestEntry {
                date: date.clone(),
                topic_title: guess_topic_title(&topics_dir, &topic_id),
                topic_id,
                has_digest: digest.exists(),
                has_shortlist: shortlist.exists(),
                items: store::read_jsonl_lossy(&shortlist),
            });
        }
    }
    out
}

/// Last (by name) `data/sources/issue-*.links.json`.
pub fn latest_issue_import(root: &Path) -> Option<IssueImport> {
    let dir = root.join("data").join("sources");
    let mut files: Vec<PathBuf> = fs::read_dir(&dir)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("issue-") && n.ends_with(".links.json"))
        })
        .collect();
    files.sort();
    let path = files.pop()?;
    let data = fs::read_to_string(&path)
        .ok()
        .and_then(|s| serde_json::from_str(&s).ok());
    Some(IssueImport { path, data })
}

/// Link from `docs/boards/` back into the processed tree.
fn rel_link(date: &str, topic_id: &str, file: &str) -> String {
    format!("../../data/processed/{date}/{topic_id}/{file}")
}

pub fn render_digests(entries: &[DigestEntry]) -> String {
    if entries.is_empty() {
        return "<div class=\"card\"><div class=\"muted\">No digests yet.</div></div>".to_string();
    }

    let mut by_topic: BTreeMap<&str, Vec<&DigestEntry>> = BTreeMap::new();
    for e in entries {
        by_topic.entry(e.topic_id.as_str()).or_default().push(e);
    }

    let mut parts = Vec::new();
    for (topic_id, mut group) in by_topic {
        group.sort_by(|a, b| b.date.cmp(&a.date));
        parts.push("<details open>".to_string());
        parts.push(format!(
            "<summary><b>{}</b> <span class=\"muted\">({})</span></summary>",
            h(&group[0].topic_title),
            h(topic_id)
        ));
        parts.push("<div style=\"margin-top:10px\">".to_string());
        parts.push("<table class=\"table\">".to_string());
        parts.push(
            "<thead><tr><th>Date</th><th>Count</th><th>Open</th><th>Top</th></tr></thead>".to_string(),
        );
        parts.push("<tbody>".to_string());
        for e in group {
            let mut open = Vec::new();
            if e.has_digest {
                open.push(format!(
                    "<a href=\"{}\">digest.md</a>",
                    h(&rel_link(&e.date, &e.topic_id, DIGEST_FILE))
                ));
            }
            if e.has_shortlist {
                open.push(format!(
                    "<a href=\"{}\">shortlist.jsonl</a>",
                    h(&rel_link(&e.date, &e.topic_id, SHORTLIST_FILE))
                ));
            }
            let top: Vec<String> = e
                .items
                .iter()
                .take(3)
                .filter_map(|it| {
                    let t = it.title.trim().replace('\n', " ");
                    let u = it.url.trim();
                    match (t.is_empty(), u.is_empty()) {
                        (true, _) => None,
                        (false, false) => Some(format!(
                            "<a href=\"{}\" target=\"_blank\" rel=\"noreferrer\">{}</a>",
                            h(u),
                            h(&t)
                        )),
                        (false, true) => Some(h(&t).into_owned()),
                    }
                })
                .collect();
            let top_html = if top.is_empty() {
                "<span class=\"muted\">(empty)</span>".to_string()
            } else {
                top.join("<br />")
            };
            parts.push(format!(
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                h(&e.date),
                e.items.len(),
                open.join(" · "),
                top_html
            ));
        }
        parts.push("</tbody></table></div></details>".to_string());
    }
    parts.join("\n")
}

pub fn render_sources(import: Option<&IssueImport>) -> String {
    let Some((path, data)) = import.and_then(|i| i.data.as_ref().map(|d| (&i.path, d))) else {
        return "<div class=\"card\"><div class=\"muted\">No imported issue sources (or the import could not be parsed).</div></div>".to_string();
    };

    let mut by_kind: BTreeMap<String, Vec<&str>> = BTreeMap::new();
    for l in &data.links {
        let url = l.url.trim();
        if url.is_empty() {
            continue;
        }
        let kind = match l.kind.trim() {
            "" => "web",
            k => k,
        };
        by_kind.entry(kind.to_string()).or_default().push(url);
    }
    let mut groups: Vec<(String, Vec<&str>)> = by_kind.into_iter().collect();
    // biggest group first, then by kind
    groups.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(&b.0)));

    let rows: String = groups
        .iter()
        .map(|(kind, urls)| {
            let preview = urls
                .iter()
                .take(8)
                .map(|u| {
                    format!(
                        "<a href=\"{0}\" target=\"_blank\" rel=\"noreferrer\">{0}</a>",
                        h(u)
                    )
                })
                .collect::<Vec<_>>()
                .join("<br />");
            format!(
                "<tr><td><b>{}</b></td><td>{}</td><td>{}</td></tr>",
                h(kind),
                urls.len(),
                preview
            )
        })
        .collect();

    format!(
        "<div class=\"card\"><div class=\"muted\">Latest import: <code>{}</code></div><hr />\
         <table class=\"table\"><thead><tr><th>Kind</th><th>Count</th><th>Preview</th></tr></thead>\
         <tbody>{rows}</tbody></table></div>",
        h(&path.display().to_string())
    )
}

/// `path` if free, else `stem-2.ext` … `stem-98.ext`.
fn unique_path(path: PathBuf) -> Result<PathBuf> {
    if !path.exists() {
        return Ok(path);
    }
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_string();
    let ext = path.extension().and_then(|s| s.to_str()).map(str::to_string);
    let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
    for i in 2..99 {
        let name = match &ext {
            Some(ext) => format!("{stem}-{i}.{ext}"),
            None => format!("{stem}-{i}"),
        };
        let candidate = parent.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    bail!("unable to pick a unique filename for {}", path.display())
}

/// Board payload consumed by the page script.
pub fn board_data(
    opts: &BoardOptions,
    board_id: &str,
    entries: &[DigestEntry],
    import: Option<&IssueImport>,
) -> Value {
    let stamp = opts.generated_at.format("%Y-%m-%d %H:%M").to_string();
    let latest = entries.first().map(|e| e.date.as_str()).unwrap_or("-");
    let topic_count = entries
        .iter()
        .map(|e| e.topic_id.as_str())
        .collect::<std::collections::BTreeSet<_>>()
        .len();
    let item_count: usize = entries.iter().map(|e| e.items.len()).sum();

    let topics_list: String = list_topic_ids(&opts.root.join("topics"))
        .unwrap_or_default()
        .iter()
        .map(|id| {
            format!(
                "<li><code>topics/{}.toml</code> · {}</li>",
                h(id),
                h(&guess_topic_title(&opts.root.join("topics"), id))
            )
        })
        .collect();

    let overview = format!(
        "<h2>Overview</h2><div class=\"kpi-grid\">\
         <div class=\"kpi\"><div class=\"k\">Latest date</div><div class=\"v\">{}</div><div class=\"muted\">From data/processed</div></div>\
         <div class=\"kpi\"><div class=\"k\">Topics</div><div class=\"v\">{topic_count}</div><div class=\"muted\">With digests</div></div>\
         <div class=\"kpi\"><div class=\"k\">Shortlist items</div><div class=\"v\">{item_count}</div><div class=\"muted\">Across last {} days</div></div>\
         </div>",
        h(latest),
        opts.max_days
    );
    let runbook = "<h2>Runbook</h2><div class=\"card\"><ol>\
         <li><b>Daily run</b>: <code>postcast run --topic ai_papers</code></li>\
         <li><b>Import issue links</b>: <code>postcast import-issue-links --owner OWNER --repo REPO --number N --env-file .env</code></li>\
         <li><b>Build this board</b>: <code>postcast board</code></li>\
         </ol></div>";

    json!({
        "version": "postcast-board@v1",
        "meta": {
            "id": board_id,
            "title": BOARD_TITLE,
            "subtitle": "Multi-topic daily digests (text-first)",
            "generated_at": stamp,
            "tags": ["board", "digest", "automation"],
        },
        "blocks": [
            { "id": "overview", "nav": "Overview", "type": "html", "data": { "html": overview } },
            { "id": "topics", "nav": "Topics", "type": "html",
              "data": { "html": format!("<h2>Topics</h2><div class=\"card\"><ul>{topics_list}</ul></div>") } },
            { "id": "digests", "nav": "Digests", "type": "html",
              "data": { "html": format!("<h2>Digests (last {} days)</h2>{}", opts.max_days, render_digests(entries)) } },
            { "id": "sources", "nav": "Sources", "type": "html",
              "data": { "html": format!("<h2>Imported sources</h2>{}", render_sources(import)) } },
            { "id": "runbook", "nav": "Runbook", "type": "html", "data": { "html": runbook } },
        ],
    })
}

/// Write the board page, its data script and the `docs/board.html` redirect.
pub fn build_board(opts: &BoardOptions) -> Result<BoardPaths> {
    let board_id = format!("board-{}", opts.generated_at.format("%Y%m%d-%H%M%S"));
    let out_dir = opts.root.join("docs").join("boards");
    store::ensure_dir(&out_dir)?;
    let html_path = unique_path(out_dir.join(format!("{board_id}.html")))?;
    let data_path = unique_path(out_dir.join(format!("{board_id}.data.js")))?;

    let entries = collect_digests(&opts.root, opts.max_days);
    let import = latest_issue_import(&opts.root);
    let data = board_data(opts, &board_id, &entries, import.as_ref());

    let payload = serde_json::to_string_pretty(&data).context("serializing board data")?;
    store::write_text(&data_path, &format!("window.postcastBoardData = {payload};\n"))?;

    let data_name = data_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    store::write_text(
        &html_path,
        &format!(
            "<!doctype html>\n<html lang=\"en\">\n  <head>\n    <meta charset=\"utf-8\" />\n    \
             <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />\n    \
             <title>{}</title>\n    <style>{}</style>\n  </head>\n  <body>\n    \
             <div data-board data-var=\"postcastBoardData\"></div>\n    \
             <script src=\"{}\"></script>\n    <script>\n{}\n    </script>\n  </body>\n</html>\n",
            h(BOARD_TITLE),
            BOARD_CSS,
            h(data_name),
            BOARD_RENDERER_JS
        ),
    )?;

    let html_name = html_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    let entry = opts.root.join("docs").join("board.html");
    store::write_text(
        &entry,
        &format!(
            "<!doctype html>\n<html lang=\"en\">\n  <head>\n    <meta charset=\"utf-8\" />\n    \
             <meta http-equiv=\"refresh\" content=\"0; url=boards/{0}\" />\n    \
             <title>Board Redirect</title>\n  </head>\n  <body>\n    \
             <p><a href=\"boards/{0}\">Open the latest board</a></p>\n  </body>\n</html>\n",
            h(html_name)
        ),
    )?;

    Ok(BoardPaths {
        html: html_path,
        data: data_path,
        entry,
    })
}
