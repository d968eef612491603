// src/config/mod.rs
pub mod token;
pub mod topic;

pub use token::{resolve_token, Token, TokenError};
pub use topic::{
    load_topic, ArxivParams, ConfigError, FeedParams, FilterSpec, SourceConfig, SourceKind,
    TopicConfig,
};
