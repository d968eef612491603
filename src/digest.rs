// src/digest.rs
//! Markdown digest for one topic and date. Pure: no clock, no IO.

use crate::ingest::types::Item;

pub const EMPTY_PLACEHOLDER: &str = "- (no matches yet; adjust keywords or sources)";
pub const NOTES_LINE: &str =
    "- Text-first minimal loop: fetch → keyword filter → digest (LLM re-ranking and scripts can come later).";

pub fn render_digest(topic_title: &str, date: &str, items: &[Item]) -> String {
    let mut lines: Vec<String> = vec![
        format!("# {topic_title}"),
        date.to_string(),
        String::new(),
        "## Today's picks".to_string(),
    ];

    if items.is_empty() {
        lines.push(EMPTY_PLACEHOLDER.to_string());
        return finish(&lines);
    }

    for (i, it) in items.iter().enumerate() {
        let n = i + 1;
        let title = it.title.trim().replace('\n', " ");
        let url = it.url.trim();
        if url.is_empty() {
            lines.push(format!("{n}. {title}"));
        } else {
            lines.push(format!("{n}. [{title}]({url})"));
        }

        let src = match it.source_id.trim() {
            "" => it.source.trim(),
            s => s,
        };
        let meta: Vec<&str> = [it.published.trim(), src]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect();
        if !meta.is_empty() {
            lines.push(format!("   - {}", meta.join(" · ")));
        }
    }

    lines.push(String::new());
    lines.push("## Notes".to_string());
    lines.push(NOTES_LINE.to_string());
    finish(&lines)
}

fn finish(lines: &[String]) -> String {
    format!("{}\n", lines.join("\n").trim())
}
