// src/config/topic.rs
//! Topic configuration: one TOML file per topic under `topics/`.
//!
//! Files are parsed into a loose raw shape first and then validated once into
//! [`TopicConfig`], whose sources carry a tagged [`SourceKind`] with only the
//! fields that kind needs. Collectors never read raw keys.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_TOPICS_DIR: &str = "topics";
pub const DEFAULT_TOP_K: usize = 8;
pub const DEFAULT_MAX_RESULTS: usize = 50;
pub const DEFAULT_SORT_BY: &str = "submittedDate";
pub const DEFAULT_SORT_ORDER: &str = "descending";
pub const DEFAULT_ARXIV_FIXTURE: &str = "fixtures/arxiv_sample.atom.xml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("topic config not found: {0}")]
    NotFound(PathBuf),
    #[error("reading topic config {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid topic config {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("duplicate source id `{id}` in {path}")]
    DuplicateSourceId { path: PathBuf, id: String },
    #[error("listing topics in {path}: {source}")]
    ListTopics {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A validated topic.
#[derive(Debug, Clone, PartialEq)]
pub struct TopicConfig {
    pub id: String,
    pub title: String,
    pub sources: Vec<SourceConfig>,
    pub top_k: usize,
}

/// One configured feed or query.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceConfig {
    pub id: String,
    /// `kind` exactly as written in the file (used in error records).
    pub declared_kind: String,
    pub enabled: bool,
    pub filter: FilterSpec,
    pub max_results: usize,
    pub kind: SourceKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SourceKind {
    Arxiv(ArxivParams),
    /// `rss`, `atom` and `feed` all route here.
    Feed(FeedParams),
    /// Kinds this build does not know; collected as nothing.
    Unknown(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArxivParams {
    /// Empty means "not configured": nothing is fetched.
    pub query: String,
    pub sort_by: String,
    pub sort_order: String,
    pub offline: bool,
    pub fixture_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedParams {
    /// Empty means "not configured": nothing is fetched.
    pub url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub include_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
}

// ---- raw file shape ----

#[derive(Debug, Deserialize)]
struct RawTopic {
    #[serde(default)]
    meta: RawMeta,
    #[serde(default)]
    sources: Vec<RawSource>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMeta {
    id: Option<String>,
    title: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSource {
    id: Option<String>,
    #[serde(default)]
    kind: String,
    #[serde(default = "default_true")]
    enabled: bool,
    query: Option<String>,
    sort_by: Option<String>,
    sort_order: Option<String>,
    url: Option<String>,
    #[serde(default)]
    include_keywords: Vec<String>,
    #[serde(default)]
    exclude_keywords: Vec<String>,
    max_results: Option<toml::Value>,
    top_k: Option<toml::Value>,
    offline: Option<toml::Value>,
    fixture_path: Option<String>,
}

fn default_true() -> bool {
    true
}

/// Path of the config file for `topic_id` inside `topics_dir`.
pub fn topic_path(topics_dir: &Path, topic_id: &str) -> PathBuf {
    topics_dir.join(format!("{topic_id}.toml"))
}

/// Load and validate `topics_dir/<topic_id>.toml`.
pub fn load_topic(topics_dir: &Path, topic_id: &str) -> Result<TopicConfig, ConfigError> {
    let path = topic_path(topics_dir, topic_id);
    if !path.exists() {
        return Err(ConfigError::NotFound(path));
    }
    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;
    parse_topic(&content, topic_id, &path)
}

/// Parse topic TOML. `fallback_id` is used when `[meta] id` is absent.
pub fn parse_topic(
    content: &str,
    fallback_id: &str,
    path: &Path,
) -> Result<TopicConfig, ConfigError> {
    let raw: RawTopic = toml::from_str(content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    let id = raw
        .meta
        .id
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| fallback_id.to_string());
    let title = raw
        .meta
        .title
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| id.clone());

    // Last entry with a usable `top_k` wins, disabled entries included.
    let mut top_k = DEFAULT_TOP_K;
    let mut seen = HashSet::new();
    let mut sources = Vec::with_capacity(raw.sources.len());
    for rs in raw.sources {
        if let Some(v) = rs.top_k.as_ref() {
            match int_from_value(v) {
                Some(k) => top_k = k.max(0) as usize,
                None => warn!(value = %v, "ignoring unusable top_k"),
            }
        }
        let src = validate_source(rs);
        if !seen.insert(src.id.clone()) {
            return Err(ConfigError::DuplicateSourceId {
                path: path.to_path_buf(),
                id: src.id,
            });
        }
        sources.push(src);
    }

    Ok(TopicConfig {
        id,
        title,
        sources,
        top_k,
    })
}

fn validate_source(rs: RawSource) -> SourceConfig {
    let normalized = rs.kind.trim().to_lowercase();
    let kind = match normalized.as_str() {
        "arxiv" => SourceKind::Arxiv(ArxivParams {
            query: rs.query.unwrap_or_default().trim().to_string(),
            sort_by: non_empty_or(rs.sort_by, DEFAULT_SORT_BY),
            sort_order: non_empty_or(rs.sort_order, DEFAULT_SORT_ORDER),
            offline: rs.offline.as_ref().is_some_and(is_truthy),
            fixture_path: PathBuf::from(non_empty_or(rs.fixture_path, DEFAULT_ARXIV_FIXTURE)),
        }),
        "rss" | "atom" | "feed" => SourceKind::Feed(FeedParams {
            url: rs.url.unwrap_or_default().trim().to_string(),
        }),
        _ => SourceKind::Unknown(normalized.clone()),
    };

    let id = rs.id.filter(|s| !s.is_empty()).unwrap_or_else(|| match &kind {
        SourceKind::Arxiv(_) => "arxiv".to_string(),
        SourceKind::Feed(_) => "feed".to_string(),
        SourceKind::Unknown(k) => k.clone(),
    });

    SourceConfig {
        id,
        declared_kind: rs.kind,
        enabled: rs.enabled,
        filter: FilterSpec {
            include_keywords: rs.include_keywords,
            exclude_keywords: rs.exclude_keywords,
        },
        max_results: max_results_from(rs.max_results.as_ref()),
        kind,
    }
}

fn non_empty_or(v: Option<String>, default: &str) -> String {
    v.map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// An integer, or a string holding one.
fn int_from_value(v: &toml::Value) -> Option<i64> {
    match v {
        toml::Value::Integer(i) => Some(*i),
        toml::Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Positive integer-like values are kept; missing, zero, negative or
/// unparsable values mean the default.
fn max_results_from(v: Option<&toml::Value>) -> usize {
    let Some(v) = v else {
        return DEFAULT_MAX_RESULTS;
    };
    match int_from_value(v) {
        Some(n) if n > 0 => n as usize,
        Some(_) => DEFAULT_MAX_RESULTS,
        None => {
            warn!(value = %v, "ignoring unusable max_results");
            DEFAULT_MAX_RESULTS
        }
    }
}

/// `true`, or one of the strings `1` / `true` / `yes` (any case).
fn is_truthy(v: &toml::Value) -> bool {
    match v {
        toml::Value::Boolean(b) => *b,
        toml::Value::Integer(i) => *i == 1,
        toml::Value::String(s) => matches!(s.trim().to_lowercase().as_str(), "1" | "true" | "yes"),
        _ => false,
    }
}

/// Sorted file stems of `*.toml` in `topics_dir`.
pub fn list_topic_ids(topics_dir: &Path) -> Result<Vec<String>, ConfigError> {
    let entries = fs::read_dir(topics_dir).map_err(|source| ConfigError::ListTopics {
        path: topics_dir.to_path_buf(),
        source,
    })?;
    let mut ids: Vec<String> = entries
        .flatten()
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some("toml"))
        .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(str::to_string))
        .collect();
    ids.sort();
    Ok(ids)
}

/// Display title of a topic, or the id when the file is missing or unreadable.
pub fn guess_topic_title(topics_dir: &Path, topic_id: &str) -> String {
    let path = topic_path(topics_dir, topic_id);
    fs::read_to_string(path)
        .ok()
        .and_then(|s| toml::from_str::<toml::Table>(&s).ok())
        .and_then(|t| {
            t.get("meta")
                .and_then(|m| m.get("title"))
                .and_then(|v| v.as_str())
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| topic_id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[meta]
id = "ai_papers"
title = "AI Papers"

[[sources]]
id = "arxiv_ai"
kind = " ArXiv "
query = "cat:cs.AI"
include_keywords = ["LLM"]
top_k = 5

[[sources]]
id = "blog"
kind = "rss"
url = " https://example.test/feed.xml "
max_results = 0
enabled = false
top_k = "3"

[[sources]]
id = "later"
kind = "podcast"
top_k = "many"
"#;

    fn parse(s: &str) -> Result<TopicConfig, ConfigError> {
        parse_topic(s, "fallback", Path::new("topics/test.toml"))
    }

    #[test]
    fn sources_validate_into_tagged_kinds() {
        let cfg = parse(SAMPLE).unwrap();
        assert_eq!(cfg.id, "ai_papers");
        assert_eq!(cfg.title, "AI Papers");
        assert_eq!(cfg.sources.len(), 3);

        let arxiv = &cfg.sources[0];
        assert_eq!(arxiv.declared_kind, " ArXiv ");
        match &arxiv.kind {
            SourceKind::Arxiv(p) => {
                assert_eq!(p.query, "cat:cs.AI");
                assert_eq!(p.sort_by, DEFAULT_SORT_BY);
                assert_eq!(p.sort_order, DEFAULT_SORT_ORDER);
                assert!(!p.offline);
                assert_eq!(p.fixture_path, PathBuf::from(DEFAULT_ARXIV_FIXTURE));
            }
            other => panic!("expected arxiv, got {other:?}"),
        }
        assert_eq!(arxiv.filter.include_keywords, vec!["LLM".to_string()]);
        assert_eq!(arxiv.max_results, DEFAULT_MAX_RESULTS);

        let blog = &cfg.sources[1];
        assert!(!blog.enabled);
        assert_eq!(blog.max_results, DEFAULT_MAX_RESULTS);
        assert_eq!(
            blog.kind,
            SourceKind::Feed(FeedParams {
                url: "https://example.test/feed.xml".into()
            })
        );

        assert_eq!(cfg.sources[2].kind, SourceKind::Unknown("podcast".into()));
    }

    #[test]
    fn top_k_is_last_usable_value() {
        let cfg = parse(SAMPLE).unwrap();
        // "many" is ignored, so the disabled source's "3" stands.
        assert_eq!(cfg.top_k, 3);
    }

    #[test]
    fn defaults_apply_without_meta_or_top_k() {
        let cfg = parse("[[sources]]\nkind = \"feed\"\nurl = \"file:///tmp/x.xml\"\n").unwrap();
        assert_eq!(cfg.id, "fallback");
        assert_eq!(cfg.title, "fallback");
        assert_eq!(cfg.top_k, DEFAULT_TOP_K);
        assert_eq!(cfg.sources[0].id, "feed");
        assert!(cfg.sources[0].enabled);
    }

    #[test]
    fn max_results_accepts_integer_like_values() {
        for (raw, expected) in [
            ("10", 10),
            ("\"25\"", 25),
            ("\" 7 \"", 7),
            ("0", DEFAULT_MAX_RESULTS),
            ("-5", DEFAULT_MAX_RESULTS),
            ("\"-5\"", DEFAULT_MAX_RESULTS),
            ("\"lots\"", DEFAULT_MAX_RESULTS),
            ("2.5", DEFAULT_MAX_RESULTS),
        ] {
            let s = format!("[[sources]]\nkind = \"rss\"\nurl = \"u\"\nmax_results = {raw}\n");
            let cfg = parse(&s).unwrap();
            assert_eq!(cfg.sources[0].max_results, expected, "max_results = {raw}");
        }
    }

    #[test]
    fn offline_accepts_bool_and_truthy_strings() {
        for (raw, expected) in [("true", true), ("\"yes\"", true), ("\"1\"", true), ("\"no\"", false)] {
            let s = format!("[[sources]]\nkind = \"arxiv\"\nquery = \"q\"\noffline = {raw}\n");
            let cfg = parse(&s).unwrap();
            match &cfg.sources[0].kind {
                SourceKind::Arxiv(p) => assert_eq!(p.offline, expected, "offline = {raw}"),
                other => panic!("expected arxiv, got {other:?}"),
            }
        }
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let s = "[[sources]]\nid = \"a\"\nkind = \"rss\"\n[[sources]]\nid = \"a\"\nkind = \"arxiv\"\n";
        let err = parse(s).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateSourceId { ref id, .. } if id == "a"));
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let err = parse("[[sources]\nid = ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn missing_file_and_listing() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_topic(dir.path(), "nope").unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));

        fs::write(dir.path().join("b.toml"), "[meta]\ntitle = \"Bee\"\n").unwrap();
        fs::write(dir.path().join("a.toml"), "").unwrap();
        fs::write(dir.path().join("notes.md"), "").unwrap();
        assert_eq!(list_topic_ids(dir.path()).unwrap(), vec!["a", "b"]);
        assert_eq!(guess_topic_title(dir.path(), "b"), "Bee");
        assert_eq!(guess_topic_title(dir.path(), "a"), "a");
        assert_eq!(guess_topic_title(dir.path(), "zzz"), "zzz");
    }
}
