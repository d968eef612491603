// src/ingest/filter.rs
use crate::config::FilterSpec;

/// Lower-case, trim and collapse whitespace runs to a single space.
pub fn normalize_keyword_text(s: &str) -> String {
    s.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Include/exclude substring filter over `title + "\n" + summary`.
///
/// Terms are normalized once and blank terms never match. A non-empty include
/// list made only of blanks therefore rejects everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordFilter {
    include: Vec<String>,
    exclude: Vec<String>,
    include_configured: bool,
}

impl KeywordFilter {
    pub fn new(spec: &FilterSpec) -> Self {
        Self::from_terms(&spec.include_keywords, &spec.exclude_keywords)
    }

    pub fn from_terms<S: AsRef<str>>(include: &[S], exclude: &[S]) -> Self {
        let norm = |terms: &[S]| {
            terms
                .iter()
                .map(|t| normalize_keyword_text(t.as_ref()))
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>()
        };
        Self {
            include: norm(include),
            exclude: norm(exclude),
            include_configured: !include.is_empty(),
        }
    }

    pub fn accepts(&self, title: &str, summary: &str) -> bool {
        self.accepts_text(&format!("{title}\n{summary}"))
    }

    pub fn accepts_text(&self, text: &str) -> bool {
        let t = normalize_keyword_text(text);
        if self.include_configured && !self.include.iter().any(|k| t.contains(k.as_str())) {
            return false;
        }
        !self.exclude.iter().any(|k| t.contains(k.as_str()))
    }
}
