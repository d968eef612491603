// src/ingest/fetch.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use std::time::Duration;

pub const USER_AGENT: &str = "postcast/0.1 (+https://example.invalid)";
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Turns a locator (`file://...` or an http(s) URL) into raw bytes.
#[async_trait]
pub trait Fetch: Send + Sync {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>>;
}

/// Default fetcher: local read for `file://`, one plain GET otherwise.
/// No retries.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(FETCH_TIMEOUT)
            .build()
            .context("building http client")?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetch for HttpFetcher {
    async fn fetch(&self, locator: &str) -> Result<Vec<u8>> {
        if let Some(path) = locator.strip_prefix("file://") {
            return tokio::fs::read(path)
                .await
                .with_context(|| format!("reading {path}"));
        }
        let body = self
            .client
            .get(locator)
            .send()
            .await
            .with_context(|| format!("GET {locator}"))?
            .error_for_status()
            .with_context(|| format!("GET {locator}"))?
            .bytes()
            .await
            .with_context(|| format!("reading body of {locator}"))?;
        Ok(body.to_vec())
    }
}

/// Persist a raw payload, creating parent directories as needed.
pub fn write_raw(path: &Path, bytes: &[u8]) -> Result<()> {
    crate::store::write_bytes(path, bytes)
        .with_context(|| format!("writing raw capture {}", path.display()))
}
