// src/config/token.rs
//! GitHub token resolution: explicit flag, then process env, then a
//! KEY=VALUE env file. The token value never reaches logs or stdout.

use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("missing token (use --token, set ${0}, or pass --env-file)")]
    Missing(String),
    #[error("env file not found: {0}")]
    EnvFileNotFound(PathBuf),
    #[error("reading env file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
}

/// Bearer token. `Debug` and `Display` are redacted.
#[derive(Clone, PartialEq, Eq)]
pub struct Token(String);

impl Token {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(***)")
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("***")
    }
}

/// Read `KEY=VALUE` pairs from an env file. Lines that do not parse are skipped.
pub fn read_env_file(path: &Path) -> Result<Vec<(String, String)>, TokenError> {
    if !path.exists() {
        return Err(TokenError::EnvFileNotFound(path.to_path_buf()));
    }
    let iter = dotenvy::from_path_iter(path).map_err(|source| TokenError::EnvFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(iter
        .filter_map(Result::ok)
        .map(|(k, v)| (k, v.trim().to_string()))
        .collect())
}

/// Resolve a token in order: `explicit`, `$env_name`, `env_name` inside `env_file`.
///
/// A named env file that does not exist is an error even when an earlier
/// source would have produced a token.
pub fn resolve_token(
    explicit: Option<&str>,
    env_name: &str,
    env_file: Option<&Path>,
) -> Result<Token, TokenError> {
    let from_file = match env_file {
        Some(p) => read_env_file(p)?,
        None => Vec::new(),
    };

    let candidate = explicit
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .or_else(|| {
            std::env::var(env_name)
                .ok()
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
        })
        .or_else(|| {
            from_file
                .into_iter()
                .find(|(k, _)| k == env_name)
                .map(|(_, v)| v)
                .filter(|s| !s.is_empty())
        });

    candidate
        .map(Token::new)
        .ok_or_else(|| TokenError::Missing(env_name.to_string()))
}
