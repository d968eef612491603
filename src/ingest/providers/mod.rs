// src/ingest/providers/mod.rs
pub mod arxiv;
pub mod feed;
