// src/github.rs
//! Thin GitHub REST helpers: import links posted in an issue thread and
//! create (or look up) a repository.

use anyhow::{Context, Result};
use chrono::Utc;
use once_cell::sync::OnceCell;
use regex::Regex;
use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::info;

use crate::config::Token;
use crate::store;

pub const GITHUB_API: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const USER_AGENT: &str = "postcast/0.1 (github)";

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("token invalid or blocked (GET /user => {status})")]
    TokenRejected { status: u16, body: String },
    #[error("failed checking repository existence (GET /repos => {status})")]
    ExistenceCheck { status: u16, body: String },
    #[error("create repo failed ({status})")]
    CreateFailed { status: u16, body: String },
    #[error("GitHub API error {status}: {body}")]
    Api { status: u16, body: String },
}

impl GithubError {
    /// Response body excerpt, for stderr diagnostics.
    pub fn body(&self) -> &str {
        match self {
            Self::TokenRejected { body, .. }
            | Self::ExistenceCheck { body, .. }
            | Self::CreateFailed { body, .. }
            | Self::Api { body, .. } => body,
        }
    }
}

fn excerpt(body: &str, max: usize) -> String {
    body.chars().take(max).collect()
}

#[derive(Clone)]
pub struct GithubClient {
    http: Client,
    api_base: String,
    token: Token,
}

impl GithubClient {
    pub fn new(token: Token) -> Result<Self> {
        Self::with_base(token, GITHUB_API)
    }

    pub fn with_base(token: Token, api_base: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(30))
            .build()
            .context("building github client")?;
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.api_base, path))
            .bearer_auth(self.token.expose())
            .header("Accept", "application/vnd.github+json")
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    /// Send and return (status, body) without judging the status.
    async fn send(&self, req: RequestBuilder) -> Result<(StatusCode, String)> {
        let rsp = req.send().await.context("github request")?;
        let status = rsp.status();
        let body = rsp.text().await.context("reading github response")?;
        Ok((status, body))
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(&self, path: &str) -> Result<T> {
        let (status, body) = self.send(self.request(Method::GET, path)).await?;
        if !status.is_success() {
            return Err(GithubError::Api {
                status: status.as_u16(),
                body: excerpt(&body, 500),
            }
            .into());
        }
        serde_json::from_str(&body).with_context(|| format!("decoding GET {path}"))
    }
}

// ---- issue link import ----

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub owner: String,
    pub repo: String,
    pub number: u64,
}

#[derive(Debug, Deserialize)]
struct IssueBody {
    #[serde(default)]
    body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkEntry {
    pub url: String,
    pub kind: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinksFile {
    pub issue: IssueRef,
    pub fetched_at: String,
    pub count: usize,
    pub links: Vec<LinkEntry>,
}

#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub json_path: PathBuf,
    pub txt_path: PathBuf,
    pub count: usize,
}

fn url_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| Regex::new(r#"(?i)https?://[^\s\]\)"'>]+"#).expect("url regex"))
}

/// URLs in `text`, trailing punctuation stripped.
pub fn extract_urls(text: &str) -> Vec<String> {
    url_re()
        .find_iter(text)
        .map(|m| {
            m.as_str()
                .trim_end_matches(['.', ',', ';', ':', '!', '?', ')', '"', '>', '\''])
                .to_string()
        })
        .filter(|u| !u.is_empty())
        .collect()
}

pub fn dedupe_keep_order(urls: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    urls.into_iter().filter(|u| seen.insert(u.clone())).collect()
}

pub fn guess_kind(url: &str) -> &'static str {
    let u = url.to_lowercase();
    if ["/rss", "feed", ".atom", "feeds.feedburner.com"]
        .iter()
        .any(|k| u.contains(k))
        || u.ends_with(".xml")
    {
        "feed"
    } else if u.contains("github.com") {
        "github"
    } else if u.contains("arxiv.org") {
        "arxiv"
    } else {
        "web"
    }
}

/// Fetch an issue and its comments, extract every linked URL and write
/// `issue-<owner>-<repo>-<n>-<stamp>.links.json` + `.urls.txt` into `out_dir`.
pub async fn import_issue_links(
    client: &GithubClient,
    issue: &IssueRef,
    out_dir: &Path,
) -> Result<ImportOutcome> {
    let base = format!("/repos/{}/{}/issues/{}", issue.owner, issue.repo, issue.number);
    let head: IssueBody = client.get_json(&base).await?;
    let comments: Vec<IssueBody> = client
        .get_json(&format!("{base}/comments?per_page=100"))
        .await?;

    let all: Vec<String> = std::iter::once(&head)
        .chain(comments.iter())
        .flat_map(|b| extract_urls(b.body.as_deref().unwrap_or_default()))
        .collect();
    let urls = dedupe_keep_order(all);
    let links: Vec<LinkEntry> = urls
        .iter()
        .map(|u| LinkEntry {
            url: u.clone(),
            kind: guess_kind(u).to_string(),
        })
        .collect();

    let now = Utc::now();
    let stem = format!(
        "issue-{}-{}-{}-{}",
        issue.owner,
        issue.repo,
        issue.number,
        now.format("%Y%m%d-%H%M%S")
    );
    let json_path = out_dir.join(format!("{stem}.links.json"));
    let txt_path = out_dir.join(format!("{stem}.urls.txt"));

    let file = LinksFile {
        issue: issue.clone(),
        fetched_at: now.to_rfc3339(),
        count: links.len(),
        links,
    };
    let body = serde_json::to_string_pretty(&file).context("serializing links file")?;
    store::write_text(&json_path, &format!("{body}\n"))?;
    store::write_text(&txt_path, &format!("{}\n", urls.join("\n")))?;

    info!(
        owner = %issue.owner,
        repo = %issue.repo,
        number = issue.number,
        count = file.count,
        "issue links imported"
    );
    Ok(ImportOutcome {
        json_path,
        txt_path,
        count: file.count,
    })
}

// ---- repo creation ----

#[derive(Debug, Clone)]
pub struct CreateRepo {
    pub owner: String,
    pub name: String,
    pub private: bool,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepoUrls {
    #[serde(default)]
    pub ssh_url: String,
    #[serde(default)]
    pub html_url: String,
}

#[derive(Debug, Deserialize)]
struct User {
    login: String,
}

/// Return the repo's URLs, creating it first when it does not exist.
pub async fn create_repo(client: &GithubClient, req: &CreateRepo) -> Result<RepoUrls> {
    let (status, body) = client.send(client.request(Method::GET, "/user")).await?;
    if status != StatusCode::OK {
        return Err(GithubError::TokenRejected {
            status: status.as_u16(),
            body: excerpt(&body, 800),
        }
        .into());
    }
    let user: User = serde_json::from_str(&body).context("decoding GET /user")?;

    let (status, body) = client
        .send(client.request(Method::GET, &format!("/repos/{}/{}", req.owner, req.name)))
        .await?;
    if status == StatusCode::OK {
        info!(owner = %req.owner, name = %req.name, "repository already exists");
        return serde_json::from_str(&body).context("decoding repository");
    }
    if status != StatusCode::NOT_FOUND {
        return Err(GithubError::ExistenceCheck {
            status: status.as_u16(),
            body: excerpt(&body, 800),
        }
        .into());
    }

    let path = if req.owner == user.login {
        "/user/repos".to_string()
    } else {
        format!("/orgs/{}/repos", req.owner)
    };
    let payload = json!({
        "name": req.name,
        "description": req.description,
        "private": req.private,
        "has_issues": false,
        "has_projects": false,
        "has_wiki": false,
        "auto_init": false,
    });
    let (status, body) = client
        .send(client.request(Method::POST, &path).json(&payload))
        .await?;
    if status != StatusCode::CREATED {
        return Err(GithubError::CreateFailed {
            status: status.as_u16(),
            body: excerpt(&body, 1200),
        }
        .into());
    }
    info!(owner = %req.owner, name = %req.name, private = req.private, "repository created");
    serde_json::from_str(&body).context("decoding created repository")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_extracted_and_trailing_punctuation_stripped() {
        let text = "See https://a.test/x. Also (https://b.test/y) and \"http://c.test/z\"!\n\
                    [link](https://d.test/feed.xml), HTTPS://E.TEST/Up";
        assert_eq!(
            extract_urls(text),
            vec![
                "https://a.test/x",
                "https://b.test/y",
                "http://c.test/z",
                "https://d.test/feed.xml",
                "HTTPS://E.TEST/Up",
            ]
        );
    }

    #[test]
    fn dedupe_keeps_first_occurrence() {
        let v = vec!["b".to_string(), "a".into(), "b".into(), "c".into(), "a".into()];
        assert_eq!(dedupe_keep_order(v), vec!["b", "a", "c"]);
    }

    #[test]
    fn kinds_are_guessed_from_url_shape() {
        assert_eq!(guess_kind("https://blog.test/rss"), "feed");
        assert_eq!(guess_kind("https://feeds.feedburner.com/x"), "feed");
        assert_eq!(guess_kind("https://x.test/index.XML"), "feed");
        assert_eq!(guess_kind("https://github.com/a/b"), "github");
        assert_eq!(guess_kind("https://arxiv.org/abs/1"), "arxiv");
        assert_eq!(guess_kind("https://example.test/"), "web");
    }
}
