//! Harvest links from loosely formatted notes, deduplicate them by canonical
//! address, and retrieve what each surviving link points to.

pub mod commands;
pub mod config;
pub mod dedup;
pub mod error;
pub mod extractor;
pub mod http_client;
pub mod link_table;
pub mod manifest;
pub mod naming;
pub mod normalizer;
pub mod pipeline;
pub mod renderer;
pub mod sources;
pub mod summary;

pub use config::HarvestConfig;
pub use error::HarvestError;
